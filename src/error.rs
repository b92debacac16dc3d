//! Error taxonomy for the DOS automation controller.
//!
//! Three families of failure, handled differently:
//!
//! * precondition violations (wrong lifecycle order, bad 8.3 name) are
//!   returned before any I/O takes place and are never retried;
//! * external-command failures (`losetup`, `mount`, `dosbox`, ...) are
//!   propagated to the caller, which owns any retry policy;
//! * best-effort paths (teardown cleanup, output copy-out, key injection)
//!   are logged by the caller and never surface as errors.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DosError>;

#[derive(Debug, Error)]
pub enum DosError {
    /// An operation was invoked before `setup()` completed.
    #[error("setup has not been run yet")]
    SetupNotRun,

    /// A guest path does not fit the FAT 8.3 constraint.
    #[error(
        "invalid DOS 8.3 filename `{0}`: base name can be at most 8 chars, \
         extension at most 3"
    )]
    InvalidDosName(String),

    /// Mount was requested while DOSBox owns the disk.
    #[error("DOSBox is currently running; the disk cannot be mounted")]
    GuestRunning,

    /// Start was requested while the host holds the disk mounted.
    #[error("hard disk image is mounted on the host; DOSBox cannot start")]
    DiskMounted,

    #[error("DOSBox is already running")]
    AlreadyRunning,

    #[error("DOSBox is not running")]
    NotRunning,

    /// `losetup --show` printed something that is not a loop device path.
    /// Continuing with a stale or default device would be unsafe, so this
    /// aborts the mount.
    #[error("could not parse a loop device from losetup output: {0:?}")]
    LoopParse(String),

    /// No free X display slot was found for the virtual framebuffer.
    #[error("no free X display slot between :{low} and :{high}")]
    NoFreeDisplay { low: u32, high: u32 },

    /// An external command exited nonzero.
    #[error("`{command}` failed (exit {code}): {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// An external command could not be spawned at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file I/O on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DosError {
    /// Helper for the common "I/O error on a known path" case.
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DosError::File {
            path: path.into(),
            source,
        }
    }
}
