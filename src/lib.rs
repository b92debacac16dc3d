//! dosbatch: scripted automation of DOSBox sessions.
//!
//! Lets batch pipelines run legacy single-purpose DOS executables
//! (archive extractors, format converters) that only exist as DOS
//! binaries. The emulator has no programmatic API, so the controller works
//! through the disk itself: loop-mount the FAT image to exchange files,
//! rewrite `AUTOEXEC.BAT` to inject commands, boot DOSBox headless inside
//! Xvfb, optionally poke keys at its window with xdotool, and treat the
//! scripted `REBOOT.COM` making the process exit as the completion signal.
//!
//! Most callers want the one-shot facade:
//!
//! ```no_run
//! use dosbatch::{Dos, QuickOp, FileIn, FileOut};
//!
//! # async fn demo() -> dosbatch::Result<()> {
//! let op = QuickOp {
//!     in_files: vec![FileIn { host: "/tmp/pack.lzh".into(), guest: "PACK.LZH".into() }],
//!     cmds: vec!["LHA E PACK.LZH OUT.TXT".into()],
//!     out_files: vec![FileOut { guest: "OUT.TXT".into(), host: "/tmp/out.txt".into() }],
//!     ..QuickOp::new("/opt/dos/hd.img", "/opt/dos/dosbox.conf")
//! };
//! Dos::quick_op(op).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Requires `losetup`, password-less `sudo mount`/`umount` for the image,
//! `dosbox`, and (for headless runs) `Xvfb`, `xdotool` and `ffmpeg`.

pub mod config;
pub mod dos;
pub mod error;
pub mod logging;
pub mod util;
pub mod video;

pub use config::DosConfig;
pub use dos::{
    send_keys, validate_dos_name, DiskState, Dos, FileIn, FileOut, KeyInput, KeyOpts, QuickOp,
    Screenshot,
};
pub use error::{DosError, Result};
