//! One-shot orchestration facade.
//!
//! [`Dos::quick_op`] is the single entry point extraction recipes call:
//! stage a session, push inputs in, run the command list (with optional
//! key injection running alongside), pull outputs out, optionally grab a
//! screenshot from the session recording, and tear everything down again.
//! Output copy failures are tolerated: a command may legitimately produce
//! none of its listed outputs.
//!
//! `QuickOp` is serde-serialisable so recipes can also live as JSON files
//! driven by the CLI.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::config::DosConfig;
use crate::dos::keys::{send_keys, KeyInput, KeyOpts};
use crate::dos::Dos;
use crate::error::Result;
use crate::util::generate_temp_path;
use crate::video::extract_frame;

/// Host file pushed onto the disk before the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIn {
    pub host: PathBuf,
    /// Destination on drive C, 8.3-constrained.
    pub guest: String,
}

/// Guest file pulled off the disk after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOut {
    /// Source on drive C, 8.3-constrained.
    pub guest: String,
    pub host: PathBuf,
}

/// A single frame of the session recording, written as an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub path: PathBuf,
    /// 0-based frame index into the recording.
    #[serde(default)]
    pub frame: u32,
}

/// Everything one automation session needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickOp {
    pub master_hd: PathBuf,
    pub master_conf: PathBuf,

    #[serde(default)]
    pub in_files: Vec<FileIn>,
    #[serde(default)]
    pub out_files: Vec<FileOut>,

    /// Ordered DOS command lines for `AUTOEXEC.BAT`.
    #[serde(default)]
    pub cmds: Vec<String>,

    /// Keystrokes injected after boot; empty means none.
    #[serde(default)]
    pub keys: Vec<KeyInput>,
    #[serde(default)]
    pub key_opts: KeyOpts,

    /// Override of the default 10-minute run timeout, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub screenshot: Option<Screenshot>,
    /// Keep the full session recording at this path.
    #[serde(default)]
    pub video: Option<PathBuf>,

    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
}

impl QuickOp {
    /// An op with the given master image and config and everything else
    /// empty or defaulted; fill in fields with struct-update syntax.
    pub fn new(master_hd: impl Into<PathBuf>, master_conf: impl Into<PathBuf>) -> Self {
        Self {
            master_hd: master_hd.into(),
            master_conf: master_conf.into(),
            in_files: Vec::new(),
            out_files: Vec::new(),
            cmds: Vec::new(),
            keys: Vec::new(),
            key_opts: KeyOpts::default(),
            timeout_secs: None,
            screenshot: None,
            video: None,
            debug: false,
            tmp_dir: None,
        }
    }
}

impl Dos {
    /// Run one complete automation session.
    ///
    /// Teardown is attempted whether or not the session succeeded, so
    /// temporary resources do not leak across repeated invocations.
    pub async fn quick_op(op: QuickOp) -> Result<()> {
        let tmp_root = op
            .tmp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        // All session temporaries (workspace, port file, throwaway
        // recording) live under one scratch directory, so a single
        // remove_dir_all at the end cannot leave strays.
        let scratch_dir = generate_temp_path(&tmp_root, "");
        fs::create_dir_all(&scratch_dir).await?;

        let mut config = DosConfig::new(&op.master_hd, &op.master_conf);
        config.tmp_dir = scratch_dir.clone();
        config.debug = op.debug;
        if let Some(secs) = op.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }

        let record_path = plan_recording(&op, &scratch_dir);
        config.record_path = record_path.clone();

        let mut dos = Dos::new(config);
        let result = run_session(&mut dos, &op, record_path.as_deref()).await;

        if let Err(e) = dos.teardown().await {
            warn!(error = %e, "teardown after quick op failed");
        }
        if op.video.is_none() {
            if let Some(record_path) = &record_path {
                let _ = fs::remove_file(record_path).await;
            }
        }
        let _ = fs::remove_dir_all(&scratch_dir).await;

        result
    }
}

/// Decide where (and whether) the session is recorded. A caller-kept video
/// wins; a screenshot alone records to a temp file that is deleted after
/// the frame is extracted. Debug runs happen on the real display where no
/// recording exists, so both requests are skipped there rather than
/// failing later on a recording that was never made.
fn plan_recording(op: &QuickOp, scratch_dir: &std::path::Path) -> Option<PathBuf> {
    if op.debug {
        if op.video.is_some() || op.screenshot.is_some() {
            warn!("recording is unavailable in debug mode; skipping video/screenshot");
        }
        return None;
    }
    match (&op.video, &op.screenshot) {
        (Some(video), _) => Some(video.clone()),
        (None, Some(_)) => Some(generate_temp_path(scratch_dir, ".mp4")),
        (None, None) => None,
    }
}

async fn run_session(
    dos: &mut Dos,
    op: &QuickOp,
    record_path: Option<&std::path::Path>,
) -> Result<()> {
    dos.setup().await?;

    for file in &op.in_files {
        dos.copy_to_hd(&file.host, &file.guest).await?;
    }

    if op.keys.is_empty() {
        dos.auto_exec(&op.cmds).await?;
    } else {
        let port_file = dos.port_file().to_path_buf();
        let (run, ()) = tokio::join!(
            dos.auto_exec(&op.cmds),
            send_keys(&port_file, &op.keys, op.key_opts),
        );
        run?;
    }

    for file in &op.out_files {
        if let Err(e) = dos.copy_from_hd(&file.guest, &file.host).await {
            // The command may not have produced this output; not fatal.
            info!(guest = %file.guest, error = %e, "output file not copied");
        }
    }

    if let Some(shot) = &op.screenshot {
        if let Some(record_path) = record_path {
            extract_frame(record_path, &shot.path, shot.frame).await?;
        }
    }

    Ok(())
}
