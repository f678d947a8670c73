use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{RenderError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run ffmpeg to completion, turning a non-zero exit into a `TranscodeFailure`
/// that carries ffmpeg's stderr. The child is killed as soon as `cancel` fires.
pub fn run_ffmpeg(step: &'static str, args: &[String], cancel: &CancelToken) -> Result<()> {
    cancel.check()?;
    debug!(step, args = %args.join(" "), "running ffmpeg");

    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RenderError::TranscodeFailure {
            step,
            stderr: format!("failed to execute ffmpeg: {e}"),
        })?;

    // Drained on its own thread so a chatty ffmpeg never blocks on a full pipe.
    let stderr = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            warn!(step, "ffmpeg killed, build cancelled");
            return Err(RenderError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    };

    if !status.success() {
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        return Err(RenderError::TranscodeFailure {
            step,
            stderr: format!("ffmpeg exited with {status}: {}", stderr.trim()),
        });
    }

    Ok(())
}

/// True when `bin -version` runs successfully.
pub fn is_tool_on_path(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Format seconds the way the filters expect: shortest exact representation.
pub(crate) fn secs(value: f64) -> String {
    format!("{value}")
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn secs_uses_shortest_form() {
        assert_eq!(secs(3.0), "3");
        assert_eq!(secs(2.5), "2.5");
        assert_eq!(secs(0.125), "0.125");
    }

    #[test]
    fn missing_tool_is_not_on_path() {
        assert!(!is_tool_on_path("reelcut-no-such-tool"));
    }

    #[test]
    fn cancelled_token_never_spawns() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_ffmpeg("render", &args(&["-version"]), &cancel).unwrap_err();
        assert!(matches!(err, RenderError::Cancelled));
    }

    #[test]
    fn failing_ffmpeg_reports_transcode_failure() {
        if !is_tool_on_path("ffmpeg") {
            eprintln!("Skipping run_ffmpeg failure test: ffmpeg not available");
            return;
        }
        let err = run_ffmpeg(
            "render",
            &args(&["-i", "/tmp/does_not_exist_reelcut_input.mp4"]),
            &CancelToken::new(),
        )
        .unwrap_err();
        match err {
            RenderError::TranscodeFailure { step, stderr } => {
                assert_eq!(step, "render");
                assert!(stderr.contains("does_not_exist_reelcut_input"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancel_kills_running_ffmpeg() {
        if !is_tool_on_path("ffmpeg") {
            eprintln!("Skipping cancel test: ffmpeg not available");
            return;
        }
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = run_ffmpeg(
            "render",
            &args(&[
                "-re", "-f", "lavfi", "-i", "color=c=black:s=16x16", "-t", "60", "-f", "null", "-",
            ]),
            &cancel,
        )
        .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, RenderError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(20));
    }
}
