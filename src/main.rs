//! dosbatch CLI: run one scripted DOSBox session from the command line.
//!
//! Either describe the whole session as a JSON op file (`--op recipe.json`,
//! the same shape recipes use programmatically) or assemble a simple one
//! from flags:
//!
//! ```text
//! dosbatch --image hd.img --conf dosbox.conf \
//!     --in /tmp/pack.lzh=PACK.LZH \
//!     --cmd "LHA E PACK.LZH" \
//!     --out OUT.TXT=/tmp/out.txt
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use dosbatch::{logging, Dos, FileIn, FileOut, QuickOp, Screenshot};

/// Run legacy DOS tools inside a scripted DOSBox session.
#[derive(Parser, Debug)]
#[command(name = "dosbatch", version, about = "Run legacy DOS tools inside a scripted DOSBox session")]
struct Args {
    /// JSON op file describing the whole session; other flags are ignored
    #[arg(long, conflicts_with_all = ["image", "conf"])]
    op: Option<PathBuf>,

    /// Master bootable FAT disk image
    #[arg(long, required_unless_present = "op")]
    image: Option<PathBuf>,

    /// Master dosbox.conf
    #[arg(long, required_unless_present = "op")]
    conf: Option<PathBuf>,

    /// Host file to push onto the disk, as HOST=GUEST (repeatable)
    #[arg(long = "in", value_name = "HOST=GUEST")]
    in_files: Vec<String>,

    /// Guest file to pull off the disk, as GUEST=HOST (repeatable)
    #[arg(long = "out", value_name = "GUEST=HOST")]
    out_files: Vec<String>,

    /// DOS command line to run, in order (repeatable)
    #[arg(long = "cmd", value_name = "LINE")]
    cmds: Vec<String>,

    /// Run timeout in seconds (default: 600)
    #[arg(long)]
    timeout: Option<u64>,

    /// Record the session to this video file
    #[arg(long)]
    video: Option<PathBuf>,

    /// Save a screenshot (one frame of the recording) to this image file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Show the DOSBox window and console output instead of running headless
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init();
    let args = Args::parse();

    let op = build_op(args)?;
    Dos::quick_op(op).await.context("DOS session failed")?;
    Ok(())
}

fn build_op(args: Args) -> Result<QuickOp> {
    if let Some(op_path) = &args.op {
        let raw = std::fs::read_to_string(op_path)
            .with_context(|| format!("reading op file {}", op_path.display()))?;
        let op = serde_json::from_str(&raw)
            .with_context(|| format!("parsing op file {}", op_path.display()))?;
        return Ok(op);
    }

    // required_unless_present guarantees these are set here.
    let image = args.image.expect("clap enforces --image");
    let conf = args.conf.expect("clap enforces --conf");

    let mut op = QuickOp::new(image, conf);
    for mapping in &args.in_files {
        let (host, guest) = parse_mapping(mapping)?;
        op.in_files.push(FileIn {
            host: PathBuf::from(host),
            guest: guest.to_string(),
        });
    }
    for mapping in &args.out_files {
        let (guest, host) = parse_mapping(mapping)?;
        op.out_files.push(FileOut {
            guest: guest.to_string(),
            host: PathBuf::from(host),
        });
    }
    op.cmds = args.cmds;
    op.timeout_secs = args.timeout;
    op.video = args.video;
    op.screenshot = args.screenshot.map(|path| Screenshot { path, frame: 0 });
    op.debug = args.debug;
    Ok(op)
}

fn parse_mapping(s: &str) -> Result<(&str, &str)> {
    match s.split_once('=') {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => Ok((left, right)),
        _ => bail!("invalid mapping `{s}`: expected the form LEFT=RIGHT"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_splits_on_first_equals() {
        assert_eq!(
            parse_mapping("/tmp/a.lzh=A.LZH").unwrap(),
            ("/tmp/a.lzh", "A.LZH")
        );
        assert!(parse_mapping("no-equals").is_err());
        assert!(parse_mapping("=RIGHT").is_err());
    }

    #[test]
    fn flags_assemble_an_op() {
        let args = Args::parse_from([
            "dosbatch",
            "--image",
            "hd.img",
            "--conf",
            "dosbox.conf",
            "--in",
            "/tmp/a.lzh=A.LZH",
            "--cmd",
            "LHA E A.LZH",
            "--out",
            "OUT.TXT=/tmp/out.txt",
            "--timeout",
            "120",
        ]);
        let op = build_op(args).unwrap();
        assert_eq!(op.master_hd, PathBuf::from("hd.img"));
        assert_eq!(op.in_files[0].guest, "A.LZH");
        assert_eq!(op.out_files[0].host, PathBuf::from("/tmp/out.txt"));
        assert_eq!(op.cmds, vec!["LHA E A.LZH"]);
        assert_eq!(op.timeout_secs, Some(120));
    }
}
