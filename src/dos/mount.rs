//! Loop-device attachment and host-side mounting of the disk image.
//!
//! While DOSBox is down, the FAT image is attached to a loop device
//! (`losetup -Pf`) and its first partition mounted so ordinary host file
//! operations can reach the guest filesystem. Loop devices are a scarce,
//! host-global namespace: the attach step runs under a process-wide mutex
//! so concurrent controller instances never race on device allocation, and
//! the device path printed by `losetup --show` must parse before anything
//! else proceeds.

use std::path::PathBuf;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::dos::{DiskState, Dos};
use crate::error::{DosError, Result};
use crate::util::{run_command, run_command_capture};

/// Serialises loop-device attachment across all controller instances in
/// this process. `losetup -f` picks "the first unused device"; two
/// concurrent attaches could otherwise both observe the same free slot.
static LOOP_LOCK: Mutex<()> = Mutex::const_new(());

/// Host uid given ownership of the mounted FAT files.
const MOUNT_UID: u32 = 7777;

impl Dos {
    /// Mount the disk image's first partition on the host.
    ///
    /// Returns the mount-point path and whether the disk was already
    /// mounted. Callers that receive `already_mounted = true` must not
    /// unmount afterwards; the mount belongs to a caller further up.
    ///
    /// # Errors
    ///
    /// [`DosError::GuestRunning`] if DOSBox currently owns the disk;
    /// attach/mount command failures otherwise.
    pub async fn mount_hd(&mut self) -> Result<(PathBuf, bool)> {
        match &self.state {
            DiskState::MountedAtHost { .. } => {
                return Ok((self.mount_dir.clone(), true));
            }
            DiskState::GuestRunning => return Err(DosError::GuestRunning),
            DiskState::Unset => {}
        }

        fs::create_dir_all(&self.mount_dir)
            .await
            .map_err(|e| DosError::file(&self.mount_dir, e))?;

        let hd = self.hd_path.to_string_lossy().into_owned();
        let loop_device = {
            let _guard = LOOP_LOCK.lock().await;
            let raw = run_command_capture("losetup", &["-Pf", "--show", &hd]).await?;
            parse_loop_device(&raw)?
        };

        let partition = format!("{loop_device}p1");
        let uid_opt = format!("uid={MOUNT_UID}");
        let mount_dir = self.mount_dir.to_string_lossy().into_owned();
        if let Err(e) = run_command(
            "sudo",
            &["mount", "-t", "vfat", "-o", &uid_opt, &partition, &mount_dir],
        )
        .await
        {
            // Don't leak the loop device when the mount itself fails.
            let _ = run_command("losetup", &["-d", &loop_device]).await;
            return Err(e);
        }

        info!(%loop_device, mount = %self.mount_dir.display(), "disk mounted");
        self.state = DiskState::MountedAtHost { loop_device };
        Ok((self.mount_dir.clone(), false))
    }

    /// Unmount the disk and detach its loop device. No-op when not
    /// mounted.
    pub async fn unmount_hd(&mut self) -> Result<()> {
        let DiskState::MountedAtHost { loop_device } = &self.state else {
            return Ok(());
        };
        let loop_device = loop_device.clone();

        let mount_dir = self.mount_dir.to_string_lossy().into_owned();
        run_command("sudo", &["umount", &mount_dir]).await?;
        run_command("losetup", &["-d", &loop_device]).await?;

        debug!(%loop_device, "disk unmounted");
        self.state = DiskState::Unset;
        Ok(())
    }
}

/// Parse the device path from `losetup --show` output.
///
/// A failure here must abort the mount; continuing with a stale or default
/// device would touch somebody else's block device.
fn parse_loop_device(raw: &str) -> Result<String> {
    let line = raw.trim();
    let digits = line
        .strip_prefix("/dev/loop")
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
    match digits {
        Some(_) => Ok(line.to_string()),
        None => Err(DosError::LoopParse(raw.to_string())),
    }
}
