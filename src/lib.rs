//! # svg-raster
//!
//! Rasterizes SVG resources to PNG by driving an external vector-graphics
//! tool (Inkscape) as a subprocess.
//!
//! The core is a single pipeline stage: given a source reader and a
//! destination writer it renders the SVG with the requested size, element
//! and export area, and reports a cache key that identifies the result. A
//! batch driver and CLI sit on top for building whole directories.
//!
//! ```text
//! Options ──→ SvgTransformation ──→ Exchange ──→ <tool> subprocess
//!   │               │                  ├─ stream: stdin → stdout
//!   └─ key          └─ out path        └─ staged: temp in → temp out
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`options`] | Option model, lenient decoding, argument and output-path derivation |
//! | [`key`] | Deterministic transformation identity |
//! | [`transform`] | The pipeline stage: tool check, configure, execute |
//! | [`bridge`] | Tool lookup, version probe, stream and staged exchanges |
//! | [`config`] | `config.toml` loading, stock defaults, validation |
//! | [`cache`] | Content-addressed result cache for batch builds |
//! | [`process`] | Parallel batch rendering of a source tree |
//! | [`output`] | CLI output formatting |
//! | [`types`] | Shared media types |
//!
//! # Design Decisions
//!
//! ## A Missing Tool Is Not an Error
//!
//! Build machines often lack Inkscape. When the binary cannot be found the
//! stage returns [`TransformError::ToolUnavailable`](transform::TransformError::ToolUnavailable)
//! before spawning anything or touching the destination, and the batch
//! driver substitutes a pre-built PNG when one is checked in.
//!
//! ## Two Exchange Strategies
//!
//! Older Inkscape releases stream through `-` sentinels; newer ones need
//! real files. The strategy is picked once per [`Rasterizer`](transform::Rasterizer)
//! from config or by probing `--version`, and the staged variant is the
//! fallback whenever the version is unknown.
//!
//! ## Shell-Out, Not Link
//!
//! Rendering SVG faithfully (filters, text, masks) is the tool's job. The
//! crate only owns process plumbing: pipes without deadlock, temp files that
//! always get cleaned up, and errors that carry the tool's stderr.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod key;
pub mod options;
pub mod output;
pub mod process;
pub mod transform;
pub mod types;
