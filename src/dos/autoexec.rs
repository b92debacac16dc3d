//! Boot-script composition and replay.
//!
//! Commands reach the guest by rewriting `AUTOEXEC.BAT` on the mounted
//! disk before boot. Rewrites are replace-then-append: the pristine
//! baseline captured during `setup()` is restored first, then the new
//! lines are appended, so the commands run on the next boot are exactly
//! the most recent list and never a superset of earlier calls.
//!
//! `auto_exec` terminates every script with `REBOOT.COM`. The guest has no
//! return-code channel; the reboot making the DOSBox process exit is the
//! only defined "run complete" signal, so that final line must never be
//! dropped.

use tokio::fs;
use tracing::debug;

use crate::dos::Dos;
use crate::error::{DosError, Result};

/// DOS line-ending convention.
const AUTOEXEC_EOL: &str = "\r\n";

/// Ten-second keypress-or-timeout pause, injected before the reboot in
/// debug mode so a human can read the screen.
const DEBUG_PAUSE_CMD: &str = "choice /N /Ty,10";

/// Scripted reboot: makes DOSBox exit, signalling the end of the run.
const REBOOT_CMD: &str = "REBOOT.COM";

/// Build the final command list for one run: the caller's lines, the debug
/// pause when requested, and the terminating reboot.
pub(crate) fn compose_run_script<S: AsRef<str>>(lines: &[S], debug: bool) -> Vec<String> {
    let mut script: Vec<String> = lines.iter().map(|l| l.as_ref().to_string()).collect();
    if debug {
        script.push(DEBUG_PAUSE_CMD.to_string());
    }
    script.push(REBOOT_CMD.to_string());
    script
}

impl Dos {
    /// Rewrite `AUTOEXEC.BAT` to the pristine baseline plus `lines`.
    ///
    /// Mounts the disk when needed and unmounts again only if this call
    /// performed the mount.
    pub async fn append_to_autoexec<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        self.ensure_setup()?;
        // Always Some after setup(); treat absence as a setup-order bug.
        let baseline = self
            .autoexec_baseline
            .clone()
            .ok_or(DosError::SetupNotRun)?;

        let (_, already_mounted) = self.mount_hd().await?;

        let mut contents = baseline;
        let joined = lines
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join(AUTOEXEC_EOL);
        contents.push_str(&joined);

        let written = fs::write(&self.autoexec_path, contents)
            .await
            .map_err(|e| DosError::file(&self.autoexec_path, e));
        self.release_mount(already_mounted, written).await?;

        debug!(lines = lines.len(), "autoexec rewritten");
        Ok(())
    }

    /// Run `lines` inside the guest and wait for completion.
    ///
    /// Writes the composed script (caller lines, optional debug pause,
    /// terminating `REBOOT.COM`), boots DOSBox and awaits its exit. The
    /// disk is unmounted for the whole run.
    pub async fn auto_exec<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        let script = compose_run_script(lines, self.config.debug);
        self.append_to_autoexec(&script).await?;
        self.start().await?;
        self.wait_exit().await
    }
}
