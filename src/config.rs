//! Controller configuration.
//!
//! All fields are kept in a plain struct so callers can construct them
//! declaratively; there is no hidden mutable state.

use std::path::PathBuf;
use std::time::Duration;

/// Default supervisory timeout for one DOSBox run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Configuration for one [`crate::Dos`] automation session.
#[derive(Debug, Clone)]
pub struct DosConfig {
    /// Path to the master bootable FAT hard-disk image. A private copy is
    /// made at `setup()`; the master is never written to.
    pub master_hd_path: PathBuf,

    /// Path to the master `dosbox.conf`. Also copied at `setup()`, with
    /// `imgmount`/`boot` lines appended to the copy.
    pub master_conf_path: PathBuf,

    /// Directory under which the ephemeral workspace is created.
    /// Defaults to the OS temp directory; point it at a tmpfs for speed.
    pub tmp_dir: PathBuf,

    /// Wall-clock limit for one run. DOSBox is killed when exceeded.
    pub timeout: Duration,

    /// Debug mode: run DOSBox on the real display instead of Xvfb, keep its
    /// console output, and pause the autoexec before rebooting.
    pub debug: bool,

    /// When set, the Xvfb display is recorded to this file with ffmpeg.
    pub record_path: Option<PathBuf>,
}

impl DosConfig {
    /// Configuration with defaults: OS temp dir, 10-minute timeout, no
    /// debug, no recording.
    pub fn new(master_hd_path: impl Into<PathBuf>, master_conf_path: impl Into<PathBuf>) -> Self {
        Self {
            master_hd_path: master_hd_path.into(),
            master_conf_path: master_conf_path.into(),
            tmp_dir: std::env::temp_dir(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            record_path: None,
        }
    }
}
