//! SVG → PNG transformation stage.
//!
//! This is the unit the host pipeline calls. It knows nothing about caching
//! or scheduling: the pipeline asks for a [`key`](ResourceTransformation::key)
//! to look up a cached result, and calls
//! [`transform`](ResourceTransformation::transform) on a miss.
//!
//! ## Stages
//!
//! ```text
//! NotStarted → ToolCheck ─┬→ Unavailable                (ToolUnavailable, non-fatal)
//!                         └→ Configured → Executing ─┬→ Succeeded
//!                                                    └→ Failed
//! ```
//!
//! - **ToolCheck**: look the binary up. If it is missing nothing is spawned,
//!   no temp file is created and the destination is not touched; the caller
//!   gets [`TransformError::ToolUnavailable`] and can substitute a pre-built
//!   asset.
//! - **Configured**: declare media types, derive the output path, render
//!   the option flags.
//! - **Executing**: hand the context's reader and writer to the exchange
//!   strategy.
//!
//! There are no retries here; that is the caller's policy.

use crate::bridge::{self, BridgeError, Exchange};
use crate::config::RasterConfig;
use crate::key::TransformationKey;
use crate::options::{ConfigDecodeError, Options, replace_extension};
use crate::types::MediaType;
use serde_json::{Map, Value};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::OnceLock;
use thiserror::Error;

/// Operation name baked into every key this stage produces.
pub const TRANSFORMATION_NAME: &str = "svg2png";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Option decode error: {0}")]
    ConfigDecode(#[from] ConfigDecodeError),
    #[error("Feature not available: `{binary}` not found")]
    ToolUnavailable { binary: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{tool}` failed ({status}): {stderr}")]
    ToolExecution {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("`{tool}` exited successfully but produced no output")]
    EmptyOutput { tool: String },
}

impl TransformError {
    /// True for the "tool missing, use a fallback" signal.
    pub fn is_feature_not_available(&self) -> bool {
        matches!(self, Self::ToolUnavailable { .. })
    }
}

impl From<BridgeError> for TransformError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotFound(binary) => Self::ToolUnavailable { binary },
            BridgeError::Io(e) => Self::Io(e),
            BridgeError::ToolFailed {
                tool,
                status,
                stderr,
            } => Self::ToolExecution {
                tool,
                status,
                stderr,
            },
            BridgeError::EmptyOutput(tool) => Self::EmptyOutput { tool },
        }
    }
}

/// Where a single transformation currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    ToolCheck,
    Unavailable,
    Configured,
    Executing,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::ToolCheck => "tool-check",
            Self::Unavailable => "unavailable",
            Self::Configured => "configured",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Mutable state of one transformation, owned by the pipeline.
pub struct TransformCtx<'a> {
    /// Path of the source resource, for logs.
    pub source_path: String,
    pub in_media_type: MediaType,
    pub out_media_type: MediaType,
    /// Output path; starts as the source path, the stage rewrites it.
    pub out_path: String,
    pub from: &'a mut (dyn Read + Send),
    pub to: &'a mut dyn Write,
}

impl<'a> TransformCtx<'a> {
    /// Context for the resource at `path`. The output path starts equal to
    /// the source path.
    pub fn new(path: &str, from: &'a mut (dyn Read + Send), to: &'a mut dyn Write) -> Self {
        Self {
            source_path: path.to_string(),
            in_media_type: MediaType::Svg,
            out_media_type: MediaType::Svg,
            out_path: path.to_string(),
            from,
            to,
        }
    }

    /// Replace the extension of `out_path` with `ext`.
    pub fn replace_out_path_extension(&mut self, ext: &str) {
        self.out_path = replace_extension(&self.out_path, ext);
    }
}

/// A transformation the host pipeline can cache and run.
pub trait ResourceTransformation {
    /// Cache identity of this transformation instance.
    fn key(&self) -> TransformationKey;

    fn transform(&self, ctx: &mut TransformCtx<'_>) -> Result<(), TransformError>;
}

/// Client for SVG rasterization. Owns the configuration and the exchange
/// strategy, which is selected on first use and reused afterwards.
pub struct Rasterizer {
    config: RasterConfig,
    exchange: OnceLock<Box<dyn Exchange>>,
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self {
            config,
            exchange: OnceLock::new(),
        }
    }

    /// Use `exchange` instead of selecting one from the config.
    pub fn with_exchange(config: RasterConfig, exchange: Box<dyn Exchange>) -> Self {
        Self {
            config,
            exchange: OnceLock::from(exchange),
        }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Locate the configured tool.
    pub fn locate_tool(&self) -> Result<PathBuf, TransformError> {
        Ok(bridge::locate(&self.config.tool.binary)?)
    }

    /// The exchange strategy for `tool`, selecting it on first call.
    pub fn exchange(&self, tool: &Path) -> &dyn Exchange {
        self.exchange
            .get_or_init(|| bridge::select_exchange(&self.config, tool))
            .as_ref()
    }

    /// Build a transformation for `options`.
    pub fn process(&self, options: Options) -> SvgTransformation<'_> {
        SvgTransformation {
            client: self,
            options,
        }
    }

    /// Decode a loosely-typed option map and build a transformation.
    pub fn process_map(
        &self,
        map: Option<&Map<String, Value>>,
    ) -> Result<SvgTransformation<'_>, TransformError> {
        Ok(self.process(Options::decode(map)?))
    }
}

/// One SVG → PNG transformation.
pub struct SvgTransformation<'a> {
    client: &'a Rasterizer,
    options: Options,
}

impl SvgTransformation<'_> {
    pub fn options(&self) -> &Options {
        &self.options
    }

    fn enter(&self, ctx: &TransformCtx<'_>, stage: Stage) {
        log::debug!("{}: {stage}", ctx.source_path);
    }
}

impl ResourceTransformation for SvgTransformation<'_> {
    fn key(&self) -> TransformationKey {
        TransformationKey::new(TRANSFORMATION_NAME, &self.options)
    }

    fn transform(&self, ctx: &mut TransformCtx<'_>) -> Result<(), TransformError> {
        self.enter(ctx, Stage::NotStarted);

        self.enter(ctx, Stage::ToolCheck);
        let tool = match self.client.locate_tool() {
            Ok(tool) => tool,
            Err(e) => {
                self.enter(ctx, Stage::Unavailable);
                log::warn!("{e}; {} left for a pre-built fallback", ctx.source_path);
                return Err(e);
            }
        };

        ctx.in_media_type = MediaType::Svg;
        ctx.out_media_type = MediaType::Png;
        if self.options.target_path.is_empty() {
            ctx.replace_out_path_extension(&self.options.out_path_suffix());
        } else {
            ctx.out_path = self.options.target_path.clone();
        }
        let args = self.options.to_args();
        self.enter(ctx, Stage::Configured);

        let exchange = self.client.exchange(&tool);
        self.enter(ctx, Stage::Executing);
        match exchange.run(&tool, &args, &mut *ctx.from, &mut *ctx.to) {
            Ok(()) => {
                self.enter(ctx, Stage::Succeeded);
                Ok(())
            }
            Err(e) => {
                self.enter(ctx, Stage::Failed);
                Err(e.into())
            }
        }
    }
}
