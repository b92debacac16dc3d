//! Disk ownership state machine.
//!
//! The disk image is a single resource owned by exactly one party at a
//! time: nobody (`Unset`), the host via a loop mount (`MountedAtHost`), or
//! a booted DOSBox process (`GuestRunning`). Every controller operation
//! checks the state before acting and invalid transitions come back as
//! typed errors rather than being discovered mid-operation.
//!
//! ```text
//! Unset ──mount_hd()──► MountedAtHost ──unmount_hd()──► Unset
//! Unset ──start()─────► GuestRunning ──exit/stop()────► Unset
//! ```
//!
//! There is deliberately no edge between `MountedAtHost` and
//! `GuestRunning`: booting while the host holds the filesystem (or
//! mounting under a live guest) corrupts the FAT volume.

use std::fmt;

/// Current owner of the disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskState {
    /// Disk is idle: not mounted, no guest running.
    Unset,

    /// The image is attached to `loop_device` and its first partition is
    /// mounted on the host.
    MountedAtHost {
        /// Full device path, e.g. `/dev/loop3`.
        loop_device: String,
    },

    /// A DOSBox process booted from the image is alive.
    GuestRunning,
}

impl DiskState {
    pub fn is_mounted(&self) -> bool {
        matches!(self, DiskState::MountedAtHost { .. })
    }

    pub fn is_guest_running(&self) -> bool {
        matches!(self, DiskState::GuestRunning)
    }

    /// The host may take the mount only while the disk is idle.
    pub fn can_mount(&self) -> bool {
        matches!(self, DiskState::Unset)
    }

    /// The guest may boot only while the disk is idle.
    pub fn can_start(&self) -> bool {
        matches!(self, DiskState::Unset)
    }
}

impl fmt::Display for DiskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskState::Unset => write!(f, "unset"),
            DiskState::MountedAtHost { loop_device } => {
                write!(f, "mounted ({loop_device})")
            }
            DiskState::GuestRunning => write!(f, "guest-running"),
        }
    }
}
