//! Shared types used across the transformation stage and the build driver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared media type of a resource flowing through the pipeline.
///
/// Only the two types this stage deals with are modelled: the SVG it
/// consumes and the PNG it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Svg,
    Png,
}

impl MediaType {
    /// MIME type string, e.g. `image/svg+xml`.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
        }
    }

    /// Canonical file extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => ".svg",
            Self::Png => ".png",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_strings() {
        assert_eq!(MediaType::Svg.mime(), "image/svg+xml");
        assert_eq!(MediaType::Png.to_string(), "image/png");
    }

    #[test]
    fn extensions_have_leading_dot() {
        assert_eq!(MediaType::Svg.extension(), ".svg");
        assert_eq!(MediaType::Png.extension(), ".png");
    }
}
