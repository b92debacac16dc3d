//! External-command plumbing and temp-path generation.
//!
//! Every privileged or host-global operation in this crate (`losetup`,
//! `mount`, `dosbox`, `Xvfb`, `xdotool`, `ffmpeg`) goes through these two
//! runners so that failure reporting is uniform: nonzero exit becomes a
//! [`DosError::CommandFailed`] carrying the command line and trimmed stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::process::Command;
use tracing::debug;

use crate::error::{DosError, Result};

/// Run an external command silently, wait for it, and map nonzero exit to
/// an error. Stdout is discarded.
pub async fn run_command(program: &str, args: &[&str]) -> Result<()> {
    run_command_inner(program, args, &[]).await.map(|_| ())
}

/// Run an external command with extra environment variables.
pub async fn run_command_env(program: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<()> {
    run_command_inner(program, args, envs).await.map(|_| ())
}

/// Run an external command and return its captured stdout on success.
///
/// Used where the command's output must be parsed before proceeding, e.g.
/// the loop-device path printed by `losetup --show`.
pub async fn run_command_capture(program: &str, args: &[&str]) -> Result<String> {
    run_command_inner(program, args, &[]).await
}

async fn run_command_inner(program: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
    let rendered = render(program, args);
    debug!(command = %rendered, "running external command");

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let output = cmd.output().await.map_err(|source| DosError::Spawn {
        command: rendered.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(DosError::CommandFailed {
            command: rendered,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn render(program: &str, args: &[&str]) -> String {
    let mut s = String::from(program);
    for arg in args {
        s.push(' ');
        s.push_str(arg);
    }
    s
}

// ---------------------------------------------------------------------------
// Temp paths
// ---------------------------------------------------------------------------

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique path under `dir` without creating anything on disk.
///
/// Uniqueness comes from the process id, a monotonic counter and the clock;
/// two controller instances in the same process never collide.
pub fn generate_temp_path(dir: &Path, suffix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let count = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "dosbatch-{}-{count}-{nanos}{suffix}",
        std::process::id()
    ))
}
