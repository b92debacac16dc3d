//! File transfer between host paths and the mounted guest filesystem.
//!
//! Every guest path is validated before any I/O: it must be relative with
//! no `..` or drive-letter components, so the joined path can never leave
//! the mount directory, and its final component must fit the FAT 8.3 rule
//! (base name at most 8 characters, extension at most 3). Each operation
//! mounts the disk when needed and unmounts it again only if this call
//! performed the mount, so transfers nest inside an outer mount without
//! tearing it down.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::dos::Dos;
use crate::error::{DosError, Result};

/// Check a guest path. Directory components are allowed, but the path must
/// stay inside the disk: absolute paths, `..` components and drive letters
/// are rejected. The final component is checked against the 8.3
/// constraint.
pub fn validate_dos_name(guest: &str) -> Result<()> {
    if guest.starts_with(['/', '\\']) || guest.contains(':') {
        return Err(DosError::InvalidDosName(guest.to_string()));
    }
    let mut name = "";
    for component in guest.split(['/', '\\']) {
        if component.is_empty() || component == ".." {
            return Err(DosError::InvalidDosName(guest.to_string()));
        }
        name = component;
    }
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };
    if base.len() > 8 || ext.len() > 3 {
        return Err(DosError::InvalidDosName(name.to_string()));
    }
    Ok(())
}

/// Final path component of a guest path, used as the host-side file name
/// when pulling batches of files off the disk.
fn guest_basename(guest: &str) -> &str {
    guest.rsplit(['/', '\\']).next().unwrap_or(guest)
}

impl Dos {
    /// Copy a host file onto the DOS hard disk at `guest` (path relative
    /// to the root of drive C).
    pub async fn copy_to_hd(&mut self, host: &Path, guest: &str) -> Result<()> {
        self.ensure_setup()?;
        validate_dos_name(guest)?;

        let (mount_dir, already_mounted) = self.mount_hd().await?;
        let dest = mount_dir.join(guest);
        let copied = fs::copy(host, &dest)
            .await
            .map(|_| ())
            .map_err(|e| DosError::file(&dest, e));
        self.release_mount(already_mounted, copied).await?;

        debug!(host = %host.display(), guest, "copied file onto HD");
        Ok(())
    }

    /// Copy a single file off the DOS hard disk to the exact host path
    /// `dest`.
    pub async fn copy_from_hd(&mut self, guest: &str, dest: &Path) -> Result<()> {
        self.ensure_setup()?;
        validate_dos_name(guest)?;

        let (mount_dir, already_mounted) = self.mount_hd().await?;
        let src = mount_dir.join(guest);
        let copied = fs::copy(&src, dest)
            .await
            .map(|_| ())
            .map_err(|e| DosError::file(&src, e));
        self.release_mount(already_mounted, copied).await?;

        debug!(guest, dest = %dest.display(), "copied file off HD");
        Ok(())
    }

    /// Copy several files off the DOS hard disk into the directory
    /// `dest_dir`, each under its own base name. All guest paths are
    /// validated before any I/O takes place.
    pub async fn copy_many_from_hd<S: AsRef<str>>(
        &mut self,
        guests: &[S],
        dest_dir: &Path,
    ) -> Result<()> {
        self.ensure_setup()?;
        for guest in guests {
            validate_dos_name(guest.as_ref())?;
        }

        let (mount_dir, already_mounted) = self.mount_hd().await?;
        let copied = copy_batch(&mount_dir, guests, dest_dir).await;
        self.release_mount(already_mounted, copied).await
    }

    /// Read a file from the DOS hard disk into memory.
    pub async fn read_from_hd(&mut self, guest: &str) -> Result<Vec<u8>> {
        self.ensure_setup()?;
        validate_dos_name(guest)?;

        let (mount_dir, already_mounted) = self.mount_hd().await?;
        let src = mount_dir.join(guest);
        let read = fs::read(&src)
            .await
            .map_err(|e| DosError::file(&src, e));
        self.release_mount(already_mounted, read).await
    }

    /// Drop a mount this call took out, preserving the operation's own
    /// error over any unmount error. A mount that was already held by a
    /// caller above us is left alone.
    pub(crate) async fn release_mount<T>(
        &mut self,
        already_mounted: bool,
        op_result: Result<T>,
    ) -> Result<T> {
        if already_mounted {
            return op_result;
        }
        let unmounted = self.unmount_hd().await;
        match (op_result, unmounted) {
            (Err(op), _) => Err(op),
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(unmount)) => Err(unmount),
        }
    }
}

async fn copy_batch<S: AsRef<str>>(
    mount_dir: &Path,
    guests: &[S],
    dest_dir: &Path,
) -> Result<()> {
    for guest in guests {
        let guest = guest.as_ref();
        let src = mount_dir.join(guest);
        let dest: PathBuf = dest_dir.join(guest_basename(guest));
        fs::copy(&src, &dest)
            .await
            .map_err(|e| DosError::file(&src, e))?;
    }
    Ok(())
}
