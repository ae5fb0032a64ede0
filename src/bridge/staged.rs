//! Staged exchange: SVG and PNG go through temp files.
//!
//! Not every Inkscape build honours `-` as a stdin/stdout sentinel, so this
//! is the fallback that works everywhere:
//!
//! ```text
//! <tool> <option flags> -e <prefix>-outXXXXXX.png <prefix>-inXXXXXX.svg
//! ```
//!
//! Both temp files are owned by [`tempfile::TempPath`] guards and removed
//! when `run` returns, whichever way it returns.

use super::exchange::{BridgeError, Exchange};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Temp-file-based exchange.
#[derive(Debug, Clone)]
pub struct StagedExchange {
    dir: PathBuf,
    prefix: String,
}

impl StagedExchange {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
        }
    }
}

impl Exchange for StagedExchange {
    fn name(&self) -> &'static str {
        "staged"
    }

    fn describe_args(&self, option_args: &[String]) -> Vec<String> {
        let mut args = option_args.to_vec();
        args.push("-e".to_string());
        args.push(format!("<{}-out*.png>", self.prefix));
        args.push(format!("<{}-in*.svg>", self.prefix));
        args
    }

    fn run(
        &self,
        tool: &Path,
        option_args: &[String],
        from: &mut (dyn Read + Send),
        to: &mut dyn Write,
    ) -> Result<(), BridgeError> {
        let mut input = tempfile::Builder::new()
            .prefix(&format!("{}-in", self.prefix))
            .suffix(".svg")
            .tempfile_in(&self.dir)?;
        io::copy(from, input.as_file_mut())?;
        input.as_file_mut().flush()?;
        // Close the handle so the tool can open it on every platform; the
        // guard still deletes the file.
        let input = input.into_temp_path();

        let output = tempfile::Builder::new()
            .prefix(&format!("{}-out", self.prefix))
            .suffix(".png")
            .tempfile_in(&self.dir)?
            .into_temp_path();

        log::debug!(
            "staged: {} {} -e {} {}",
            tool.display(),
            option_args.join(" "),
            output.display(),
            input.display()
        );

        let result = Command::new(tool)
            .args(option_args)
            .arg("-e")
            .arg(output.as_os_str())
            .arg(input.as_os_str())
            .stdin(Stdio::null())
            .output()?;

        if !result.status.success() {
            return Err(BridgeError::tool_failed(tool, result.status, &result.stderr));
        }

        let mut rendered = File::open(&output)?;
        // The output temp file exists before the tool runs, so a tool that
        // exits 0 without exporting leaves it empty.
        if rendered.metadata()?.len() == 0 {
            return Err(BridgeError::empty_output(tool));
        }
        io::copy(&mut rendered, to)?;
        to.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn describe_args_places_output_before_input() {
        let exchange = StagedExchange::new("/tmp", "svg-raster");
        assert_eq!(
            exchange.describe_args(&["-h".into(), "20".into()]),
            vec![
                "-h",
                "20",
                "-e",
                "<svg-raster-out*.png>",
                "<svg-raster-in*.svg>"
            ]
        );
    }

    #[test]
    fn spawn_failure_removes_temp_files() {
        let staging = TempDir::new().unwrap();
        let exchange = StagedExchange::new(staging.path(), "t");
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
        assert!(leftover_files(staging.path()).is_empty());
        assert!(to.is_empty());
    }

    #[test]
    fn missing_staging_dir_is_io_error() {
        let staging = TempDir::new().unwrap();
        let exchange = StagedExchange::new(staging.path().join("missing"), "t");
        let mut from: &[u8] = b"<svg/>";
        let mut to = Vec::new();
        let err = exchange
            .run(Path::new("inkscape"), &[], &mut from, &mut to)
            .unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::bridge::test_tools::{STAGED_COPY_TOOL, write_script};

        #[test]
        fn copies_output_file_and_cleans_up() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            let tool = write_script(tools.path(), "copy-tool", STAGED_COPY_TOOL);
            let exchange = StagedExchange::new(staging.path(), "svg-raster");

            let mut from: &[u8] = b"<svg>payload</svg>";
            let mut to = Vec::new();
            exchange
                .run(&tool, &["-w".into(), "10".into()], &mut from, &mut to)
                .unwrap();

            assert_eq!(to, b"<svg>payload</svg>");
            assert!(leftover_files(staging.path()).is_empty());
        }

        #[test]
        fn tool_sees_prefixed_temp_names() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            // Write the argument list into the output file.
            let tool = write_script(
                tools.path(),
                "args-tool",
                r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-e" ]; then out="$2"; fi
  last="$1"; shift
done
printf '%s\n%s\n' "$(basename "$out")" "$(basename "$last")" > "$out""#,
            );
            let exchange = StagedExchange::new(staging.path(), "job");

            let mut from: &[u8] = b"<svg/>";
            let mut to = Vec::new();
            exchange.run(&tool, &[], &mut from, &mut to).unwrap();

            let text = String::from_utf8(to).unwrap();
            let mut lines = text.lines();
            let out_name = lines.next().unwrap();
            let in_name = lines.next().unwrap();
            assert!(out_name.starts_with("job-out") && out_name.ends_with(".png"));
            assert!(in_name.starts_with("job-in") && in_name.ends_with(".svg"));
        }

        #[test]
        fn tool_failure_cleans_up_and_leaves_destination_untouched() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            let tool = write_script(
                tools.path(),
                "failing-tool",
                "echo 'cannot parse' >&2; exit 1",
            );
            let exchange = StagedExchange::new(staging.path(), "svg-raster");

            let mut from: &[u8] = b"<svg/>";
            let mut to = Vec::new();
            let err = exchange.run(&tool, &[], &mut from, &mut to).unwrap_err();

            match err {
                BridgeError::ToolFailed { status, stderr, .. } => {
                    assert_eq!(status.code(), Some(1));
                    assert_eq!(stderr, "cannot parse");
                }
                other => panic!("expected ToolFailed, got {other:?}"),
            }
            assert!(to.is_empty());
            assert!(leftover_files(staging.path()).is_empty());
        }

        #[test]
        fn clean_exit_without_output_is_an_error() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            let tool = write_script(tools.path(), "silent-tool", "exit 0");
            let exchange = StagedExchange::new(staging.path(), "svg-raster");

            let mut from: &[u8] = b"<svg/>";
            let mut to = Vec::new();
            let err = exchange.run(&tool, &[], &mut from, &mut to).unwrap_err();

            assert!(matches!(err, BridgeError::EmptyOutput(_)));
            assert!(to.is_empty());
            assert!(leftover_files(staging.path()).is_empty());
        }

        #[test]
        fn concurrent_runs_do_not_collide() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            let tool = write_script(tools.path(), "copy-tool", STAGED_COPY_TOOL);
            let exchange = StagedExchange::new(staging.path(), "svg-raster");

            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|i| {
                        let exchange = &exchange;
                        let tool = &tool;
                        scope.spawn(move || {
                            let payload = format!("<svg id=\"{i}\"/>");
                            let mut from: &[u8] = payload.as_bytes();
                            let mut to = Vec::new();
                            exchange.run(tool, &[], &mut from, &mut to).unwrap();
                            assert_eq!(to, payload.as_bytes());
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });

            assert!(leftover_files(staging.path()).is_empty());
        }
    }
}
