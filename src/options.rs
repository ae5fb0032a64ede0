//! Rasterization options.
//!
//! [`Options`] is the small option surface callers can request: target
//! size, a sub-element or export-area selection, and an explicit output path.
//! It has three jobs:
//!
//! - **Decoding** from a loosely-typed map (front matter, template
//!   parameters, CLI `--set` pairs) with best-effort coercion.
//! - **Arguments**: [`Options::to_args`] renders the Inkscape flags, in a
//!   fixed order.
//! - **Naming**: [`Options::derive_out_path`] computes where the raster
//!   lands, so differently-sized variants of one SVG never collide.
//!
//! Unset fields use sentinels (`0`, empty string, `None`, `false`) and are
//! never rendered into arguments or file names.
//!
//! ## Output naming
//!
//! ```text
//! icons/logo.svg  width=100            → icons/logo-100.png
//! icons/logo.svg  width=100 height=50  → icons/logo-100x50.png
//! icons/logo.svg  element_id=mark      → icons/logo-mark.png
//! icons/logo.svg  export_area=page     → icons/logo-page.png
//! icons/logo.svg  (nothing set)        → icons/logo.png
//! ```
//!
//! Element ids are reduced to ASCII alphanumerics, `-` and `_` before they
//! reach a file name.
//!
//! The name prefix is an override chain, not a combination: element id,
//! then export area, then the snap marker. When several are set only the
//! last one survives, so `element_id=mark export_area_snap=true` yields
//! `logo-snap.png`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Extension appended to every derived output path.
const RASTER_EXTENSION: &str = ".png";

/// A value in the options map could not be coerced to its field type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for option `{field}`: {reason}")]
pub struct ConfigDecodeError {
    pub field: String,
    pub reason: String,
}

/// Which area of the document to export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportArea {
    /// The whole page (`--export-area-page`).
    Page,
    /// The bounding box of all drawn objects (`--export-area-drawing`).
    Drawing,
    /// An explicit region, passed through as `--export-area=<spec>`.
    Region(String),
}

impl ExportArea {
    /// Parse the user-facing string form. Empty means "not set".
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" => None,
            "page" => Some(Self::Page),
            "drawing" => Some(Self::Drawing),
            other => Some(Self::Region(other.to_string())),
        }
    }

    /// Command-line flag for this area.
    pub fn to_arg(&self) -> String {
        match self {
            Self::Page => "--export-area-page".to_string(),
            Self::Drawing => "--export-area-drawing".to_string(),
            Self::Region(spec) => format!("--export-area={spec}"),
        }
    }

    /// File-name token for this area.
    ///
    /// Region specs are arbitrary (`0:0:10:10`), so every character that is
    /// not ASCII alphanumeric becomes a dash.
    pub fn label(&self) -> String {
        match self {
            Self::Page => "page".to_string(),
            Self::Drawing => "drawing".to_string(),
            Self::Region(spec) => {
                let sanitized: String = spec
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                    .collect();
                format!("area-{sanitized}")
            }
        }
    }
}

/// Options for one SVG → PNG transformation.
///
/// Field order matters: it is the canonical serialization order used for
/// the [transformation key](crate::key::TransformationKey).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Explicit output path. Overrides all derived naming when non-empty.
    pub target_path: String,
    /// Export width in pixels (`-w`). `0` = unset.
    pub width: u32,
    /// Export height in pixels (`-h`). `0` = unset.
    pub height: u32,
    /// Export only the object with this id (`-i`). Empty = unset.
    pub element_id: String,
    /// Area to export. `None` = no export-area flag, the tool's default.
    pub export_area: Option<ExportArea>,
    /// Snap the export area outwards to the nearest integer pixel.
    pub export_area_snap: bool,
}

impl Options {
    /// Decode options from a loosely-typed map.
    ///
    /// `None` or an empty map yields `Options::default()`. Keys are matched
    /// case-insensitively with `_` and `-` ignored, so `targetPath`,
    /// `TargetPath` and `target_path` are the same key. Unknown keys are
    /// skipped.
    pub fn decode(map: Option<&Map<String, Value>>) -> Result<Self, ConfigDecodeError> {
        let mut opts = Self::default();
        let Some(map) = map else {
            return Ok(opts);
        };

        for (key, value) in map {
            match normalize_key(key).as_str() {
                "targetpath" => opts.target_path = weak_string(key, value)?,
                "width" => opts.width = weak_u32(key, value)?,
                "height" => opts.height = weak_u32(key, value)?,
                "elementid" => opts.element_id = weak_string(key, value)?,
                "exportarea" => opts.export_area = ExportArea::parse(&weak_string(key, value)?),
                "exportareasnap" => opts.export_area_snap = weak_bool(key, value)?,
                _ => {}
            }
        }
        Ok(opts)
    }

    /// Render the option flags in their fixed order:
    /// width, height, element id, export area, snap.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.width > 0 {
            args.push("-w".to_string());
            args.push(self.width.to_string());
        }
        if self.height > 0 {
            args.push("-h".to_string());
            args.push(self.height.to_string());
        }
        if !self.element_id.is_empty() {
            args.push("-i".to_string());
            args.push(self.element_id.clone());
        }
        if let Some(area) = &self.export_area {
            args.push(area.to_arg());
        }
        if self.export_area_snap {
            args.push("--export-area-snap".to_string());
        }
        args
    }

    /// The string that replaces the source extension: name prefix, size
    /// suffix, then `.png`.
    pub fn out_path_suffix(&self) -> String {
        let mut prefix = String::new();
        if !self.element_id.is_empty() {
            prefix = format!("-{}", file_token(&self.element_id));
        }
        if let Some(area) = &self.export_area {
            prefix = format!("-{}", area.label());
        }
        if self.export_area_snap {
            prefix = "-snap".to_string();
        }

        let size = match (self.width, self.height) {
            (0, 0) => String::new(),
            (w, 0) => format!("-{w}"),
            (0, h) => format!("-{h}"),
            (w, h) => format!("-{w}x{h}"),
        };

        format!("{prefix}{size}{RASTER_EXTENSION}")
    }

    /// Compute the output path for a resource currently at `current`.
    ///
    /// A non-empty `target_path` is returned verbatim; otherwise the
    /// extension of `current` is replaced by [`out_path_suffix`](Self::out_path_suffix).
    pub fn derive_out_path(&self, current: &str) -> String {
        if !self.target_path.is_empty() {
            return self.target_path.clone();
        }
        replace_extension(current, &self.out_path_suffix())
    }
}

/// Element ids reach file names with anything but ASCII alphanumerics,
/// `-` and `_` replaced by `-`, so an id can never add a path segment.
fn file_token(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Replace the extension of the last path segment with `ext`.
///
/// `ext` is appended as-is, so it should carry its own leading dot or dash.
/// Paths without an extension get `ext` appended.
pub fn replace_extension(path: &str, ext: &str) -> String {
    let name_start = path.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let stem_end = path[name_start..]
        .rfind('.')
        .map(|i| name_start + i)
        .unwrap_or(path.len());
    format!("{}{}", &path[..stem_end], ext)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode_error(field: &str, reason: String) -> ConfigDecodeError {
    ConfigDecodeError {
        field: field.to_string(),
        reason,
    }
}

fn weak_u32(field: &str, value: &Value) -> Result<u32, ConfigDecodeError> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(u32::from(*b)),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).map_err(|_| decode_error(field, format!("{u} is out of range")))
            } else if let Some(f) = n.as_f64()
                && f.fract() == 0.0
                && (0.0..=f64::from(u32::MAX)).contains(&f)
            {
                Ok(f as u32)
            } else {
                Err(decode_error(
                    field,
                    format!("expected a non-negative integer, got {n}"),
                ))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            trimmed
                .parse::<u32>()
                .map_err(|e| decode_error(field, format!("cannot parse {s:?} as an integer: {e}")))
        }
        Value::Array(_) | Value::Object(_) => Err(decode_error(
            field,
            format!("expected a number, got {}", value_kind(value)),
        )),
    }
}

fn weak_string(field: &str, value: &Value) -> Result<String, ConfigDecodeError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => Err(decode_error(
            field,
            format!("expected a string, got {}", value_kind(value)),
        )),
    }
}

fn weak_bool(field: &str, value: &Value) -> Result<bool, ConfigDecodeError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "f" | "false" => Ok(false),
            "1" | "t" | "true" => Ok(true),
            _ => Err(decode_error(
                field,
                format!("cannot parse {s:?} as a boolean"),
            )),
        },
        Value::Array(_) | Value::Object(_) => Err(decode_error(
            field,
            format!("expected a boolean, got {}", value_kind(value)),
        )),
    }
}
