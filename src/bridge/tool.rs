//! Locating and probing the external rasterizer.

use super::exchange::BridgeError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Resolve `binary` (a bare name searched on `PATH`, or a path) to an
/// executable.
pub fn locate(binary: &str) -> Result<PathBuf, BridgeError> {
    which::which(binary).map_err(|e| {
        log::debug!("lookup of `{binary}` failed: {e}");
        BridgeError::NotFound(binary.to_string())
    })
}

/// Version reported by `<tool> --version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse a version out of `--version` output.
///
/// Accepts `Inkscape 1.2.2 (b0a8486541, 2022-12-01)`, `Inkscape 0.92.4 ...`,
/// or a bare `1.0` anywhere in the text. Missing minor/patch components
/// default to zero.
pub fn parse_version(text: &str) -> Option<ToolVersion> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let after_name = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("inkscape"))
        .and_then(|i| tokens.get(i + 1))
        .and_then(|t| parse_dotted(t));
    after_name.or_else(|| tokens.iter().find_map(|t| parse_dotted(t)))
}

fn parse_dotted(token: &str) -> Option<ToolVersion> {
    // Trailing qualifiers like `1.0beta2` or `0.92.4,` keep their numeric lead.
    let numeric: &str = token
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()?;
    if !numeric.contains('.') {
        return None;
    }
    let mut parts = numeric.split('.').filter(|p| !p.is_empty());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    Some(ToolVersion {
        major,
        minor,
        patch,
    })
}

/// Run `<tool> --version` and parse the answer.
///
/// stdin is closed so a tool that ignores `--version` and waits on input
/// cannot hang the probe. Any failure yields `None`.
pub fn probe_version(tool: &Path) -> Option<ToolVersion> {
    let output = Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        log::debug!("`{} --version` exited with {}", tool.display(), output.status);
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout).or_else(|| {
        // Some builds print the banner on stderr.
        parse_version(&String::from_utf8_lossy(&output.stderr))
    });
    log::debug!("probed {}: {:?}", tool.display(), version);
    version
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u32, minor: u32, patch: u32) -> ToolVersion {
        ToolVersion {
            major,
            minor,
            patch,
        }
    }

    #[test]
    fn parse_modern_banner() {
        assert_eq!(
            parse_version("Inkscape 1.2.2 (b0a8486541, 2022-12-01)"),
            Some(v(1, 2, 2))
        );
    }

    #[test]
    fn parse_legacy_banner() {
        assert_eq!(
            parse_version("Inkscape 0.92.4 (5da689c313, 2019-01-14)\n"),
            Some(v(0, 92, 4))
        );
    }

    #[test]
    fn parse_two_component_version() {
        assert_eq!(parse_version("Inkscape 1.0"), Some(v(1, 0, 0)));
    }

    #[test]
    fn parse_version_with_qualifier() {
        assert_eq!(parse_version("Inkscape 1.0beta2 (2020)"), Some(v(1, 0, 0)));
    }

    #[test]
    fn parse_bare_version() {
        assert_eq!(parse_version("rasterizer version 3.1.4"), Some(v(3, 1, 4)));
    }

    #[test]
    fn parse_garbage() {
        assert_eq!(parse_version("usage: inkscape [OPTIONS]"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn versions_order() {
        assert!(v(0, 92, 4) < v(1, 0, 0));
        assert_eq!(v(1, 2, 0).to_string(), "1.2.0");
    }

    #[test]
    fn locate_missing_binary() {
        let err = locate("definitely-not-a-real-rasterizer-5f1c").unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(name) if name == "definitely-not-a-real-rasterizer-5f1c"));
    }

    #[test]
    fn locate_absolute_path() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(locate(exe.to_str().unwrap()).unwrap(), exe);
    }

    #[test]
    fn probe_missing_tool_is_none() {
        assert_eq!(
            probe_version(Path::new("/nonexistent/definitely-not-a-rasterizer")),
            None
        );
    }

    #[cfg(unix)]
    #[test]
    fn probe_stub_tool() {
        use crate::bridge::test_tools::write_script;
        let tmp = tempfile::TempDir::new().unwrap();
        let tool = write_script(tmp.path(), "fake-inkscape", "echo 'Inkscape 0.92.3 (2405546, 2018-03-11)'");
        assert_eq!(probe_version(&tool), Some(v(0, 92, 3)));
    }
}
