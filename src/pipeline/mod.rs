//! External PDF compilation pipeline.
//!
//! Materializes the `.tex` source and figure assets into a uniquely named
//! ephemeral workspace, then runs the fixed pass sequence
//! `pdflatex -> biber -> pdflatex -> pdflatex` with a per-pass timeout.
//! A non-zero exit or timeout in any pass is logged and tolerated; only
//! the presence of the final PDF artifact decides success. The workspace
//! is destroyed on every exit path, and cleanup failures are logged, never
//! surfaced.

use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tempfile::Builder;

use crate::utils::RenderError;

const JOB_NAME: &str = "manuscript";
const FIGURES_DIR: &str = "figures";
/// Directory prefix stripped from asset names before materialization
const ASSET_PREFIX: &str = "figures/";
const PASS_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_DIAGNOSTIC_LINES: usize = 20;

/// A named image referenced by the `.tex` source.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Outcome of one toolchain pass. A pass "succeeds" only with a zero exit,
/// but any outcome short of a missing binary lets the sequence continue.
#[derive(Debug, Clone, Copy)]
pub struct PassResult {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl PassResult {
    fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Compile LaTeX source to PDF bytes.
pub fn render_pdf(tex_source: &str, assets: &[ImageAsset]) -> Result<Vec<u8>, RenderError> {
    let never = AtomicBool::new(false);
    render_pdf_cancellable(tex_source, assets, &never)
}

/// Like [`render_pdf`], but checks `cancel` before each pass boundary.
pub fn render_pdf_cancellable(
    tex_source: &str,
    assets: &[ImageAsset],
    cancel: &AtomicBool,
) -> Result<Vec<u8>, RenderError> {
    let workspace = Builder::new().prefix("manutex-").tempdir()?;
    let result = run_pipeline(workspace.path(), tex_source, assets, cancel);
    if let Err(err) = workspace.close() {
        warn!("compilation workspace cleanup failed: {}", err);
    }
    result
}

fn run_pipeline(
    dir: &Path,
    tex_source: &str,
    assets: &[ImageAsset],
    cancel: &AtomicBool,
) -> Result<Vec<u8>, RenderError> {
    materialize(dir, tex_source, assets)?;

    let tex_file = format!("{}.tex", JOB_NAME);
    let passes: [(&str, Vec<&str>); 4] = [
        (
            "pdflatex",
            vec!["-interaction=nonstopmode", tex_file.as_str()],
        ),
        ("biber", vec![JOB_NAME]),
        (
            "pdflatex",
            vec!["-interaction=nonstopmode", tex_file.as_str()],
        ),
        (
            "pdflatex",
            vec!["-interaction=nonstopmode", tex_file.as_str()],
        ),
    ];

    for (index, (binary, args)) in passes.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(RenderError::failed("PDF rendering cancelled", Vec::new()));
        }
        match run_pass(binary, args, dir, PASS_TIMEOUT) {
            Ok(result) if result.succeeded() => {
                debug!("pass {} ({}) completed", index + 1, binary);
            }
            Ok(result) if result.timed_out => {
                warn!(
                    "pass {} ({}) timed out after {:?}, continuing",
                    index + 1,
                    binary,
                    PASS_TIMEOUT
                );
            }
            Ok(result) => {
                warn!(
                    "pass {} ({}) exited with {:?}, continuing",
                    index + 1,
                    binary,
                    result.exit_code
                );
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if index == 0 {
                    return Err(RenderError::ToolchainMissing {
                        binary: binary.to_string(),
                    });
                }
                // Later passes may be optional (no citations -> no biber
                // needed); the artifact check decides
                warn!("pass {} binary '{}' not found, continuing", index + 1, binary);
            }
            Err(err) => {
                warn!("pass {} ({}) failed to run: {}, continuing", index + 1, binary, err);
            }
        }
    }

    let pdf_path = dir.join(format!("{}.pdf", JOB_NAME));
    if pdf_path.exists() {
        let bytes = fs::read(&pdf_path)?;
        info!("PDF rendered ({} bytes)", bytes.len());
        return Ok(bytes);
    }

    let diagnostics = extract_diagnostics(&dir.join(format!("{}.log", JOB_NAME)));
    let message = if diagnostics.is_empty() {
        "PDF compilation failed and no diagnostic output was found".to_string()
    } else {
        "PDF compilation failed".to_string()
    };
    Err(RenderError::failed(message, diagnostics))
}

fn materialize(dir: &Path, tex_source: &str, assets: &[ImageAsset]) -> Result<(), RenderError> {
    fs::write(dir.join(format!("{}.tex", JOB_NAME)), tex_source)?;
    if assets.is_empty() {
        return Ok(());
    }
    let figures = dir.join(FIGURES_DIR);
    fs::create_dir_all(&figures)?;
    for asset in assets {
        let trimmed = asset.name.strip_prefix(ASSET_PREFIX).unwrap_or(&asset.name);
        let Some(file_name) = Path::new(trimmed).file_name() else {
            warn!("skipping asset with unusable name: {}", asset.name);
            continue;
        };
        fs::write(figures.join(file_name), &asset.bytes)?;
    }
    Ok(())
}

/// Run one pass under a timeout, polling the child instead of blocking so
/// a hung tool cannot stall the pipeline.
fn run_pass(binary: &str, args: &[&str], dir: &Path, timeout: Duration) -> io::Result<PassResult> {
    let mut child = Command::new(binary)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(PassResult {
                exit_code: status.code(),
                timed_out: false,
            });
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(PassResult {
                exit_code: None,
                timed_out: true,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Pull hard-error lines out of the toolchain log, best effort.
fn extract_diagnostics(log_path: &Path) -> Vec<String> {
    match fs::read_to_string(log_path) {
        Ok(content) => content
            .lines()
            .filter(|line| line.starts_with('!') || line.contains("Error:"))
            .take(MAX_DIAGNOSTIC_LINES)
            .map(|line| line.to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_result_success_predicate() {
        let ok = PassResult {
            exit_code: Some(0),
            timed_out: false,
        };
        assert!(ok.succeeded());
        let warned = PassResult {
            exit_code: Some(1),
            timed_out: false,
        };
        assert!(!warned.succeeded());
        let hung = PassResult {
            exit_code: None,
            timed_out: true,
        };
        assert!(!hung.succeeded());
    }

    #[test]
    fn test_run_pass_reports_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = run_pass("false", &[], dir.path(), Duration::from_secs(5)).expect("spawn");
        assert!(!result.timed_out);
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_run_pass_missing_binary_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_pass(
            "definitely-not-a-real-binary",
            &[],
            dir.path(),
            Duration::from_secs(1),
        )
        .expect_err("missing binary");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_run_pass_timeout_kills_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let start = Instant::now();
        let result = run_pass("sleep", &["30"], dir.path(), Duration::from_millis(200))
            .expect("spawn sleep");
        assert!(result.timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_extract_diagnostics_filters_error_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("manuscript.log");
        fs::write(
            &log,
            "This is pdfTeX\n! Undefined control sequence.\nl.10 \\badcmd\nPackage biblatex Error: something\nharmless line\n",
        )
        .expect("write log");
        let diagnostics = extract_diagnostics(&log);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].starts_with('!'));
    }

    #[test]
    fn test_extract_diagnostics_missing_log_is_empty() {
        let diagnostics = extract_diagnostics(Path::new("/nonexistent/manuscript.log"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_asset_prefix_stripped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = vec![ImageAsset {
            name: "figures/plot.png".to_string(),
            bytes: vec![1, 2, 3],
        }];
        materialize(dir.path(), "\\documentclass{article}", &assets).expect("materialize");
        assert!(dir.path().join("figures").join("plot.png").exists());
    }
}
