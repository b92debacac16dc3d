//! DOSBox process supervision.
//!
//! `start()` boots the guest from the instance's config as a detached
//! child process. Unless running in debug mode, the emulator is pointed at
//! a freshly spawned Xvfb display whose number is published to the port
//! file, which is what enables key injection and recording against a
//! headless host. The wall-clock timeout is enforced in `wait_exit()`:
//! a run that never reaches its scripted `REBOOT.COM` is killed.
//!
//! Exit notification is a one-shot channel per subscriber. Receivers
//! obtained while the guest is alive resolve after it exits, in
//! subscription order; receivers obtained while idle resolve immediately.

use std::path::Path;
use std::process::Stdio;

use tokio::fs;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use crate::dos::{DiskState, Dos};
use crate::error::{DosError, Result};

/// Serialises Xvfb display allocation across controller instances in this
/// process; the scan-then-spawn step is not atomic on its own.
static DISPLAY_LOCK: Mutex<()> = Mutex::const_new(());

/// Display slots probed for a free Xvfb server.
const DISPLAY_LOW: u32 = 90;
const DISPLAY_HIGH: u32 = 190;

const XVFB_SCREEN: &str = "1024x768x24";

/// Time given to Xvfb to create its socket before DOSBox connects.
const XVFB_STARTUP_GRACE: Duration = Duration::from_millis(500);

impl Dos {
    /// Launch DOSBox against the staged configuration.
    ///
    /// Returns without waiting; every `start()` must be paired with
    /// [`Dos::wait_exit`] or [`Dos::stop`] (or use [`Dos::auto_exec`],
    /// which starts and waits). The timeout, auxiliary-process reaping
    /// and exit-subscriber resolution all happen in that exit path: a
    /// guest that exits on its own while nobody is awaiting stays a
    /// zombie and leaves subscribers pending until one of the two is
    /// called.
    ///
    /// # Errors
    ///
    /// [`DosError::AlreadyRunning`] if a guest is alive,
    /// [`DosError::DiskMounted`] if the host still holds the disk.
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_setup()?;
        match &self.state {
            DiskState::GuestRunning => return Err(DosError::AlreadyRunning),
            DiskState::MountedAtHost { .. } => return Err(DosError::DiskMounted),
            DiskState::Unset => {}
        }

        let mut cmd = Command::new("dosbox");
        cmd.arg("-conf").arg(&self.conf_path).stdin(Stdio::null());

        if self.config.debug {
            // Debug runs on the real display with console output visible.
            if self.config.record_path.is_some() {
                warn!("recording is only available on a virtual display; debug run not recorded");
            }
        } else {
            let display = self.launch_virtual_display().await?;
            fs::write(&self.port_file, display.to_string())
                .await
                .map_err(|e| DosError::file(&self.port_file, e))?;

            if let Some(record_path) = self.config.record_path.clone() {
                self.launch_recorder(display, &record_path)?;
            }

            cmd.env("DISPLAY", format!(":{display}"))
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.kill_auxiliaries().await;
                return Err(DosError::Spawn {
                    command: "dosbox".to_string(),
                    source,
                });
            }
        };

        info!(conf = %self.conf_path.display(), "DOSBox started");
        self.child = Some(child);
        self.state = DiskState::GuestRunning;
        Ok(())
    }

    /// Wait for the guest to exit, killing it when the configured timeout
    /// elapses. Either way the exit path runs: auxiliary processes are
    /// reaped, the disk returns to idle, and every queued exit
    /// subscription resolves in FIFO order.
    pub async fn wait_exit(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Err(DosError::NotRunning);
        };

        match timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "DOSBox exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for DOSBox"),
            Err(_) => {
                warn!(timeout = ?self.config.timeout, "DOSBox run timed out, killing");
                let _ = child.kill().await;
            }
        }

        self.finish_exit().await;
        Ok(())
    }

    /// One-shot exit notification.
    ///
    /// While a guest is running the receiver resolves after it exits;
    /// subscriptions resolve in the order they were taken. With no guest
    /// running the receiver is resolved immediately.
    pub fn subscribe_exit(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if self.state.is_guest_running() {
            self.exit_subscribers.push(tx);
        } else {
            let _ = tx.send(());
        }
        rx
    }

    /// Forcibly terminate a running guest.
    ///
    /// # Errors
    ///
    /// [`DosError::NotRunning`] when there is nothing to stop.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Err(DosError::NotRunning);
        };
        if let Err(e) = child.kill().await {
            warn!(error = %e, "kill failed; process may already be gone");
        }
        self.finish_exit().await;
        Ok(())
    }

    async fn finish_exit(&mut self) {
        self.kill_auxiliaries().await;
        self.state = DiskState::Unset;
        for tx in self.exit_subscribers.drain(..) {
            let _ = tx.send(());
        }
    }

    /// Allocate a free display slot and spawn Xvfb on it. Runs under the
    /// process-wide display lock so two instances never claim one slot.
    async fn launch_virtual_display(&mut self) -> Result<u32> {
        let _guard = DISPLAY_LOCK.lock().await;

        let display_num = find_free_display()?;
        let mut xvfb = Command::new("Xvfb");
        xvfb.arg(format!(":{display_num}"))
            .args(["-screen", "0", XVFB_SCREEN, "-nolisten", "tcp"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = xvfb.spawn().map_err(|source| DosError::Spawn {
            command: format!("Xvfb :{display_num}"),
            source,
        })?;
        self.xvfb_child = Some(child);

        sleep(XVFB_STARTUP_GRACE).await;
        debug!(display = display_num, "virtual display up");
        Ok(display_num)
    }

    fn launch_recorder(&mut self, display_num: u32, record_path: &Path) -> Result<()> {
        let input = format!(":{display_num}");
        let mut ffmpeg = Command::new("ffmpeg");
        ffmpeg
            .args(["-y", "-loglevel", "error", "-f", "x11grab"])
            .args(["-video_size", "1024x768", "-r", "30", "-i", &input])
            .arg(record_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = ffmpeg.spawn().map_err(|source| DosError::Spawn {
            command: "ffmpeg".to_string(),
            source,
        })?;
        self.ffmpeg_child = Some(child);
        debug!(display = display_num, record = %record_path.display(), "recording virtual display");
        Ok(())
    }

    async fn kill_auxiliaries(&mut self) {
        kill_and_reap(self.ffmpeg_child.take()).await;
        kill_and_reap(self.xvfb_child.take()).await;
    }
}

async fn kill_and_reap(child: Option<Child>) {
    if let Some(mut child) = child {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Find a display number with no X server on it, checking both the
/// conventional lock file and the abstract socket directory.
fn find_free_display() -> Result<u32> {
    for n in DISPLAY_LOW..DISPLAY_HIGH {
        let lock = format!("/tmp/.X{n}-lock");
        let socket = format!("/tmp/.X11-unix/X{n}");
        if !Path::new(&lock).exists() && !Path::new(&socket).exists() {
            return Ok(n);
        }
    }
    Err(DosError::NoFreeDisplay {
        low: DISPLAY_LOW,
        high: DISPLAY_HIGH,
    })
}
