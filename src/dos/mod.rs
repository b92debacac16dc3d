//! DOS automation controller.
//!
//! [`Dos`] drives one DOSBox session booted from a private copy of a master
//! FAT disk image. The guest has no programmatic API, so automation runs
//! over three channels only: files placed on the disk while it is
//! loop-mounted on the host, commands injected into `AUTOEXEC.BAT` before
//! boot, and keystrokes sent to the emulator window through Xvfb/xdotool.
//! A scripted `REBOOT.COM` at the end of the autoexec makes DOSBox exit,
//! which is the sole "run finished" signal.
//!
//! One instance covers one session and is discarded after `teardown()`.
//! All methods take `&mut self`: the borrow checker enforces the
//! single-threaded cooperative model, no two state transitions can be in
//! flight at once. The only sanctioned concurrency is pairing
//! [`Dos::auto_exec`] with the free function [`send_keys`], which touches
//! nothing but the display port file.

use std::path::{Path, PathBuf};

use tokio::process::Child;
use tokio::sync::oneshot;

use crate::config::DosConfig;
use crate::util::generate_temp_path;

mod autoexec;
mod keys;
mod mount;
mod quick_op;
mod state;
mod supervisor;
mod transfer;
mod workspace;

pub use keys::{send_keys, KeyInput, KeyOpts};
pub use quick_op::{FileIn, FileOut, QuickOp, Screenshot};
pub use state::DiskState;
pub use transfer::validate_dos_name;

/// Controller for one DOSBox automation session.
///
/// Construction is cheap and does not touch the filesystem; call
/// [`Dos::setup`] before anything else.
pub struct Dos {
    pub(crate) config: DosConfig,

    // Workspace paths, all derived once at construction.
    pub(crate) work_dir: PathBuf,
    pub(crate) hd_path: PathBuf,
    pub(crate) conf_path: PathBuf,
    pub(crate) mount_dir: PathBuf,
    pub(crate) autoexec_path: PathBuf,
    pub(crate) port_file: PathBuf,

    pub(crate) setup_done: bool,
    pub(crate) state: DiskState,

    /// Pristine `AUTOEXEC.BAT` contents, captured once during `setup()`.
    /// Every rewrite starts from this baseline so commands never
    /// accumulate across calls.
    pub(crate) autoexec_baseline: Option<String>,

    // Guest process plus the auxiliary display/recording processes that
    // live and die with it.
    pub(crate) child: Option<Child>,
    pub(crate) xvfb_child: Option<Child>,
    pub(crate) ffmpeg_child: Option<Child>,

    /// One-shot exit notifications, resolved in subscription order.
    pub(crate) exit_subscribers: Vec<oneshot::Sender<()>>,
}

impl Dos {
    pub fn new(config: DosConfig) -> Self {
        let work_dir = generate_temp_path(&config.tmp_dir, "");
        let hd_name = config
            .master_hd_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("hd.img"));
        let conf_name = config
            .master_conf_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("dosbox.conf"));
        let mount_dir = work_dir.join("hd");

        Self {
            hd_path: work_dir.join(hd_name),
            conf_path: work_dir.join(conf_name),
            autoexec_path: mount_dir.join("AUTOEXEC.BAT"),
            port_file: generate_temp_path(&config.tmp_dir, ".xport"),
            mount_dir,
            work_dir,
            config,
            setup_done: false,
            state: DiskState::Unset,
            autoexec_baseline: None,
            child: None,
            xvfb_child: None,
            ffmpeg_child: None,
            exit_subscribers: Vec::new(),
        }
    }

    /// Path of the file the supervisor publishes the Xvfb display number
    /// to. Hand this to [`send_keys`] for concurrent key injection.
    pub fn port_file(&self) -> &Path {
        &self.port_file
    }

    /// Current disk ownership state.
    pub fn state(&self) -> &DiskState {
        &self.state
    }

    pub(crate) fn ensure_setup(&self) -> crate::error::Result<()> {
        if self.setup_done {
            Ok(())
        } else {
            Err(crate::error::DosError::SetupNotRun)
        }
    }
}
