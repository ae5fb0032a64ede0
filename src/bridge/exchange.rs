//! Exchange strategy trait and shared error type.
//!
//! An [`Exchange`] runs the external tool once: it hands over the SVG bytes,
//! waits for the tool to finish, and delivers the PNG bytes. How the bytes
//! travel (pipes or temp files) is the strategy's business; callers only see
//! the reader and the writer.
//!
//! Implementations must leave the destination untouched when the tool fails.

use std::io::{Read, Write};
use std::path::Path;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("`{0}` not found on PATH")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{tool}` failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("`{0}` exited successfully but produced no output")]
    EmptyOutput(String),
}

impl BridgeError {
    pub(crate) fn tool_failed(tool: &Path, status: ExitStatus, stderr: &[u8]) -> Self {
        Self::ToolFailed {
            tool: tool.display().to_string(),
            status,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    pub(crate) fn empty_output(tool: &Path) -> Self {
        Self::EmptyOutput(tool.display().to_string())
    }
}

/// One way of exchanging payloads with the external tool.
pub trait Exchange: Send + Sync {
    /// Short name for logs and `check` output.
    fn name(&self) -> &'static str;

    /// Full argument vector for one invocation: the option flags followed
    /// by this strategy's input/output arguments. Staged exchanges learn
    /// their temp paths only at run time and render placeholders here.
    fn describe_args(&self, option_args: &[String]) -> Vec<String>;

    /// Run `tool` with `option_args`, feeding it `from` and writing its
    /// output to `to`.
    fn run(
        &self,
        tool: &Path,
        option_args: &[String],
        from: &mut (dyn Read + Send),
        to: &mut dyn Write,
    ) -> Result<(), BridgeError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock exchange that records invocations without spawning anything.
    /// Uses Mutex (not RefCell) so it is Sync like the real strategies.
    #[derive(Default)]
    pub struct MockExchange {
        /// Bytes written to the destination on success.
        pub output: Vec<u8>,
        /// When set, `run` fails with an IO error carrying this message.
        pub fail_with: Option<String>,
        pub invocations: Mutex<Vec<RecordedRun>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRun {
        pub tool: String,
        pub args: Vec<String>,
        pub input: Vec<u8>,
    }

    impl MockExchange {
        pub fn with_output(output: &[u8]) -> Self {
            Self {
                output: output.to_vec(),
                ..Self::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn get_invocations(&self) -> Vec<RecordedRun> {
            self.invocations.lock().unwrap().clone()
        }
    }

    impl Exchange for MockExchange {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn describe_args(&self, option_args: &[String]) -> Vec<String> {
            option_args.to_vec()
        }

        fn run(
            &self,
            tool: &Path,
            option_args: &[String],
            from: &mut (dyn Read + Send),
            to: &mut dyn Write,
        ) -> Result<(), BridgeError> {
            let mut input = Vec::new();
            from.read_to_end(&mut input)?;
            self.invocations.lock().unwrap().push(RecordedRun {
                tool: tool.to_string_lossy().to_string(),
                args: option_args.to_vec(),
                input,
            });

            if let Some(message) = &self.fail_with {
                return Err(BridgeError::Io(std::io::Error::other(message.clone())));
            }
            to.write_all(&self.output)?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_run() {
        let exchange = MockExchange::with_output(b"png");
        let mut from: &[u8] = b"<svg/>";
        let mut to = Vec::new();

        exchange
            .run(
                Path::new("/usr/bin/inkscape"),
                &["-w".to_string(), "10".to_string()],
                &mut from,
                &mut to,
            )
            .unwrap();

        assert_eq!(to, b"png");
        let runs = exchange.get_invocations();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].tool, "/usr/bin/inkscape");
        assert_eq!(runs[0].args, vec!["-w", "10"]);
        assert_eq!(runs[0].input, b"<svg/>");
    }

    #[test]
    fn mock_failure_leaves_destination_empty() {
        let exchange = MockExchange::failing("boom");
        let mut from: &[u8] = b"<svg/>";
        let mut to = Vec::new();

        let err = exchange
            .run(Path::new("inkscape"), &[], &mut from, &mut to)
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(to.is_empty());
    }
}
