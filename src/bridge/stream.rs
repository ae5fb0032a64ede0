//! Streaming exchange: SVG in through stdin, PNG out through stdout.
//!
//! The tool may start writing before it has read all of its input. If we
//! wrote stdin to completion before reading stdout, both pipe buffers could
//! fill and neither side would make progress. So one scoped thread copies
//! the source into stdin (closing it at EOF) while the calling thread waits
//! on the process and drains stdout and stderr.
//!
//! stdout is collected in memory and handed to the destination only after
//! the tool exits successfully.

use super::exchange::{BridgeError, Exchange};
use crate::config::StreamForm;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

impl StreamForm {
    /// The `-` sentinel arguments for this convention.
    pub fn sentinel_args(self) -> &'static [&'static str] {
        match self {
            Self::FileFlag => &["-f", "-", "-e", "-"],
            Self::Positional => &["-e", "-", "-"],
        }
    }
}

/// Pipe-based exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamExchange {
    form: StreamForm,
}

impl StreamExchange {
    pub fn new(form: StreamForm) -> Self {
        Self { form }
    }
}

impl Exchange for StreamExchange {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn describe_args(&self, option_args: &[String]) -> Vec<String> {
        let mut args = option_args.to_vec();
        args.extend(self.form.sentinel_args().iter().map(|s| s.to_string()));
        args
    }

    fn run(
        &self,
        tool: &Path,
        option_args: &[String],
        from: &mut (dyn Read + Send),
        to: &mut dyn Write,
    ) -> Result<(), BridgeError> {
        let args = self.describe_args(option_args);
        log::debug!("stream: {} {}", tool.display(), args.join(" "));

        let mut child = Command::new(tool)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin was not captured"))?;

        let (copied, output) = std::thread::scope(|scope| {
            let feeder = scope.spawn(move || {
                let copied = io::copy(from, &mut stdin);
                // Dropping stdin closes the pipe: the tool sees EOF.
                drop(stdin);
                copied
            });
            let output = child.wait_with_output();
            let copied = feeder
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin feeder thread panicked")));
            (copied, output)
        });

        let output = output?;
        if !output.status.success() {
            return Err(BridgeError::tool_failed(tool, output.status, &output.stderr));
        }

        match copied {
            Ok(bytes) => log::debug!("stream: fed {bytes} bytes, got {}", output.stdout.len()),
            // The tool may legitimately stop reading once it has what it
            // needs; a clean exit is what counts.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                log::debug!("stream: tool closed stdin early, exit was clean");
            }
            Err(e) => return Err(e.into()),
        }
        if output.stdout.is_empty() {
            return Err(BridgeError::empty_output(tool));
        }

        to.write_all(&output.stdout)?;
        to.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_flag_sentinels() {
        let exchange = StreamExchange::new(StreamForm::FileFlag);
        assert_eq!(
            exchange.describe_args(&["-w".into(), "16".into()]),
            vec!["-w", "16", "-f", "-", "-e", "-"]
        );
    }

    #[test]
    fn positional_sentinels() {
        let exchange = StreamExchange::new(StreamForm::Positional);
        assert_eq!(exchange.describe_args(&[]), vec!["-e", "-", "-"]);
    }

    #[test]
    fn spawn_failure_is_io_error() {
        let exchange = StreamExchange::default();
        let mut from: &[u8] = b"<svg/>";
        let mut to = Vec::new();
        let err = exchange
            .run(
                Path::new("/nonexistent/definitely-not-a-rasterizer"),
                &[],
                &mut from,
                &mut to,
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(to.is_empty());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::bridge::test_tools::write_script;
        use std::sync::mpsc;
        use std::time::Duration;
        use tempfile::TempDir;

        #[test]
        fn echo_tool_round_trips_large_payload() {
            let tmp = TempDir::new().unwrap();
            let tool = write_script(tmp.path(), "echo-tool", "exec cat");

            // 8 MiB, far beyond any pipe buffer, with a non-repeating-ish pattern.
            let payload: Vec<u8> = (0..8 * 1024 * 1024u32)
                .map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8)
                .collect();
            let expected = payload.clone();

            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let mut from: &[u8] = &payload;
                let mut to = Vec::new();
                let result = StreamExchange::default().run(&tool, &[], &mut from, &mut to);
                tx.send((result.map_err(|e| e.to_string()), to)).unwrap();
            });

            let (result, output) = rx
                .recv_timeout(Duration::from_secs(60))
                .expect("streaming exchange deadlocked");
            result.unwrap();
            assert_eq!(output.len(), expected.len());
            assert!(output == expected);
        }

        #[test]
        fn tool_arguments_include_sentinels() {
            let tmp = TempDir::new().unwrap();
            let tool = write_script(tmp.path(), "args-tool", r#"printf '%s\n' "$@""#);
            let mut from: &[u8] = b"";
            let mut to = Vec::new();

            StreamExchange::new(StreamForm::Positional)
                .run(&tool, &["-w".into(), "8".into()], &mut from, &mut to)
                .unwrap();
            assert_eq!(String::from_utf8(to).unwrap(), "-w\n8\n-e\n-\n-\n");
        }

        #[test]
        fn non_zero_exit_reports_status_and_stderr() {
            let tmp = TempDir::new().unwrap();
            let tool = write_script(
                tmp.path(),
                "failing-tool",
                "cat > /dev/null; printf 'partial'; echo 'bad svg' >&2; exit 3",
            );
            let mut from: &[u8] = b"<svg/>";
            let mut to = Vec::new();

            let err = StreamExchange::default()
                .run(&tool, &[], &mut from, &mut to)
                .unwrap_err();
            match err {
                BridgeError::ToolFailed { status, stderr, .. } => {
                    assert_eq!(status.code(), Some(3));
                    assert_eq!(stderr, "bad svg");
                }
                other => panic!("expected ToolFailed, got {other:?}"),
            }
            assert!(to.is_empty(), "partial output must not reach the destination");
        }

        #[test]
        fn tool_ignoring_stdin_still_succeeds() {
            let tmp = TempDir::new().unwrap();
            let tool = write_script(tmp.path(), "no-read-tool", "printf 'png'");
            let payload = vec![b'x'; 4 * 1024 * 1024];
            let mut from: &[u8] = &payload;
            let mut to = Vec::new();

            StreamExchange::default()
                .run(&tool, &[], &mut from, &mut to)
                .unwrap();
            assert_eq!(to, b"png");
        }

        #[test]
        fn clean_exit_without_output_is_an_error() {
            let tmp = TempDir::new().unwrap();
            let tool = write_script(tmp.path(), "silent-tool", "cat > /dev/null; exit 0");
            let mut from: &[u8] = b"<svg/>";
            let mut to = Vec::new();

            let err = StreamExchange::default()
                .run(&tool, &[], &mut from, &mut to)
                .unwrap_err();
            assert!(matches!(err, BridgeError::EmptyOutput(ref t) if t.ends_with("silent-tool")));
            assert!(to.is_empty());
        }
    }
}
