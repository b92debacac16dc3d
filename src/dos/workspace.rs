//! Workspace and image lifecycle: `setup()` and `teardown()`.
//!
//! `setup()` materialises an ephemeral working directory holding a private
//! copy of the master disk image and its DOSBox configuration, then appends
//! the `imgmount`/`boot` lines that make the copy bootable as drive C. The
//! master files are never modified, so any number of sessions can share
//! them.

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::dos::Dos;
use crate::error::{DosError, Result};

/// Disk geometry DOSBox needs to imgmount the FAT image as a hard drive.
const IMGMOUNT_GEOMETRY: &str = "-size 512,63,16,520 -t hdd -fs fat";

impl Dos {
    /// Prepare the ephemeral workspace. Idempotent: a second call is a
    /// no-op.
    ///
    /// Creates the working directory, copies the master image and config,
    /// appends the mount-and-boot instructions to the config copy, and
    /// captures the pristine `AUTOEXEC.BAT` baseline (one mount/read/
    /// unmount cycle). Any failure here is fatal for the session.
    pub async fn setup(&mut self) -> Result<()> {
        if self.setup_done {
            debug!("setup already done, skipping");
            return Ok(());
        }

        fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| DosError::file(&self.work_dir, e))?;

        fs::copy(&self.config.master_hd_path, &self.hd_path)
            .await
            .map_err(|e| DosError::file(&self.config.master_hd_path, e))?;
        fs::copy(&self.config.master_conf_path, &self.conf_path)
            .await
            .map_err(|e| DosError::file(&self.config.master_conf_path, e))?;

        // Leading newline in case the master config lacks a trailing one.
        let boot_lines = format!(
            "\nimgmount C {} {IMGMOUNT_GEOMETRY}\nboot -l c\n",
            self.hd_path.display()
        );
        let mut conf = fs::OpenOptions::new()
            .append(true)
            .open(&self.conf_path)
            .await
            .map_err(|e| DosError::file(&self.conf_path, e))?;
        conf.write_all(boot_lines.as_bytes())
            .await
            .map_err(|e| DosError::file(&self.conf_path, e))?;
        conf.flush()
            .await
            .map_err(|e| DosError::file(&self.conf_path, e))?;

        self.setup_done = true;

        // Capture the pristine boot script now, so every later rewrite can
        // restore it first. Populated exactly once for the lifetime of the
        // instance.
        let (_, already_mounted) = self.mount_hd().await?;
        let raw = fs::read(&self.autoexec_path)
            .await
            .map_err(|e| DosError::file(&self.autoexec_path, e))?;
        self.autoexec_baseline = Some(String::from_utf8_lossy(&raw).into_owned());
        if !already_mounted {
            self.unmount_hd().await?;
        }

        info!(work_dir = %self.work_dir.display(), "workspace ready");
        Ok(())
    }

    /// Tear the session down: unmount if needed, then delete the working
    /// directory and the display port file. Safe to call repeatedly; all
    /// cleanup is best-effort, failures are logged, not propagated.
    pub async fn teardown(&mut self) -> Result<()> {
        if let Err(e) = self.unmount_hd().await {
            warn!(error = %e, "could not unmount during teardown");
        }

        if let Err(e) = fs::remove_dir_all(&self.work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.work_dir.display(), error = %e, "could not remove work dir");
            }
        }
        if let Err(e) = fs::remove_file(&self.port_file).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.port_file.display(), error = %e, "could not remove port file");
            }
        }

        debug!("teardown complete");
        Ok(())
    }
}
