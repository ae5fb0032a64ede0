//! Subprocess bridge to the external rasterizer.
//!
//! | Concern | Where |
//! |---|---|
//! | **Find the binary** | [`tool::locate`] (`which`) |
//! | **Probe capability** | [`tool::probe_version`] (`<tool> --version`) |
//! | **Pipes** | [`StreamExchange`]: stdin/stdout with `-` sentinels |
//! | **Temp files** | [`StagedExchange`]: `-e <out> <in>` |
//!
//! The strategy is chosen once per [`Rasterizer`](crate::transform::Rasterizer)
//! by [`select_exchange`]: explicit config wins, otherwise the probed version
//! decides. Inkscape 0.x reliably streams through `-`; 1.x changed its
//! stdin/stdout conventions, so it, and anything we cannot identify, gets
//! the staged exchange.

pub mod exchange;
pub mod staged;
pub mod stream;
pub mod tool;

pub use exchange::{BridgeError, Exchange};
pub use staged::StagedExchange;
pub use stream::StreamExchange;
pub use tool::{ToolVersion, locate, probe_version};

use crate::config::{ExchangeKind, RasterConfig};
use std::path::Path;

/// Pick the exchange strategy for `tool` according to `config`.
///
/// Only [`ExchangeKind::Auto`] spawns the tool (for `--version`).
pub fn select_exchange(config: &RasterConfig, tool: &Path) -> Box<dyn Exchange> {
    let stream = || Box::new(StreamExchange::new(config.tool.stream_form)) as Box<dyn Exchange>;
    let staged = || {
        Box::new(StagedExchange::new(
            config.staging.dir(),
            &config.staging.prefix,
        )) as Box<dyn Exchange>
    };

    match config.tool.exchange {
        ExchangeKind::Stream => stream(),
        ExchangeKind::Staged => staged(),
        ExchangeKind::Auto => match probe_version(tool) {
            Some(version) if version.major == 0 => {
                log::debug!("{} {version}: using stream exchange", tool.display());
                stream()
            }
            Some(version) => {
                log::debug!("{} {version}: using staged exchange", tool.display());
                staged()
            }
            None => {
                log::debug!(
                    "could not determine version of {}, using staged exchange",
                    tool.display()
                );
                staged()
            }
        },
    }
}
