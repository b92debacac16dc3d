//! Integration tests for the DOS automation controller.
//!
//! These tests attach real loop devices and mount real FAT filesystems, so
//! they need `losetup`, `parted`, `mkfs.vfat`, password-less `sudo` and
//! root-equivalent privileges; the end-to-end tests additionally need a
//! bootable DOS disk image (with `REBOOT.COM` on it), `dosbox` and `Xvfb`.
//! They are gated with the `dos-integration-tests` feature flag.
//!
//! # Running
//!
//! ```bash
//! cargo test --features dos-integration-tests --test dos_integration
//! ```
//!
//! The loop-mount tests build their own scratch FAT image. The end-to-end
//! tests boot a real DOS image and are skipped unless
//! `DOSBATCH_TEST_HD_IMAGE` and `DOSBATCH_TEST_CONF` point at a bootable
//! master image and its dosbox.conf.

#![cfg(feature = "dos-integration-tests")]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::TempDir;
use tokio::process::Command;

use dosbatch::{DiskState, Dos, DosConfig, FileIn, FileOut, QuickOp};

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

/// Bootable master image for the dosbox end-to-end tests, if provided.
fn bootable_fixture() -> Option<(PathBuf, PathBuf)> {
    let hd = std::env::var("DOSBATCH_TEST_HD_IMAGE").ok()?;
    let conf = std::env::var("DOSBATCH_TEST_CONF").ok()?;
    Some((PathBuf::from(hd), PathBuf::from(conf)))
}

async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("spawning {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Build a partitioned FAT disk image containing only an `AUTOEXEC.BAT`
/// baseline, plus a minimal dosbox.conf next to it. This is enough for
/// every controller operation except actually booting DOSBox.
async fn build_master_fixture(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let img = dir.join("hd.img");
    let file = std::fs::File::create(&img)?;
    file.set_len(16 * 1024 * 1024)?;
    drop(file);

    let img_str = img.to_string_lossy().into_owned();
    run(
        "parted",
        &[
            "-s", &img_str, "mklabel", "msdos", "mkpart", "primary", "fat16", "1MiB", "100%",
        ],
    )
    .await?;

    let loop_dev = run("losetup", &["-Pf", "--show", &img_str]).await?;
    let loop_dev = loop_dev.trim().to_string();
    let partition = format!("{loop_dev}p1");

    let result = async {
        run("sudo", &["mkfs.vfat", &partition]).await?;

        let mnt = dir.join("fixture-mnt");
        std::fs::create_dir_all(&mnt)?;
        let mnt_str = mnt.to_string_lossy().into_owned();
        run("sudo", &["mount", "-t", "vfat", &partition, &mnt_str]).await?;
        let written = std::fs::write(mnt.join("AUTOEXEC.BAT"), "@ECHO OFF\r\n");
        let unmounted = run("sudo", &["umount", &mnt_str]).await;
        written?;
        unmounted?;
        Ok::<(), anyhow::Error>(())
    }
    .await;
    // Always detach the fixture loop device, success or not.
    let _ = run("losetup", &["-d", &loop_dev]).await;
    result?;

    let conf = dir.join("dosbox.conf");
    std::fs::write(&conf, "[sdl]\nusescancodes=true\n[autoexec]\n")?;
    Ok((img, conf))
}

fn controller(hd: &Path, conf: &Path, tmp: &Path) -> Dos {
    let mut config = DosConfig::new(hd, conf);
    config.tmp_dir = tmp.to_path_buf();
    Dos::new(config)
}

// ---------------------------------------------------------------------------
// Loop-mount lifecycle (no dosbox required)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn setup_is_idempotent_and_captures_baseline() -> Result<()> {
    let tmp = TempDir::new()?;
    let (hd, conf) = build_master_fixture(tmp.path()).await?;
    let mut dos = controller(&hd, &conf, tmp.path());

    dos.setup().await?;
    dos.setup().await?; // second call must be a no-op
    assert_eq!(*dos.state(), DiskState::Unset, "setup must end unmounted");

    dos.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn transfer_round_trips_bytes() -> Result<()> {
    let tmp = TempDir::new()?;
    let (hd, conf) = build_master_fixture(tmp.path()).await?;
    let mut dos = controller(&hd, &conf, tmp.path());
    dos.setup().await?;

    let payload = b"legacy archive payload\x01\x02\x03";
    let host_in = tmp.path().join("input.bin");
    std::fs::write(&host_in, payload)?;

    dos.copy_to_hd(&host_in, "IN.BIN").await?;
    assert_eq!(*dos.state(), DiskState::Unset, "transfer must unmount after itself");

    let read_back = dos.read_from_hd("IN.BIN").await?;
    assert_eq!(read_back, payload);

    let host_out = tmp.path().join("output.bin");
    dos.copy_from_hd("IN.BIN", &host_out).await?;
    assert_eq!(std::fs::read(&host_out)?, payload);

    dos.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn nested_transfer_leaves_outer_mount_held() -> Result<()> {
    let tmp = TempDir::new()?;
    let (hd, conf) = build_master_fixture(tmp.path()).await?;
    let mut dos = controller(&hd, &conf, tmp.path());
    dos.setup().await?;

    let host_in = tmp.path().join("input.bin");
    std::fs::write(&host_in, b"x")?;

    let (_, already) = dos.mount_hd().await?;
    assert!(!already, "first mount is ours");

    // Inner transfer finds the disk mounted and must leave it that way.
    dos.copy_to_hd(&host_in, "X.BIN").await?;
    assert!(dos.state().is_mounted(), "inner call must not steal the mount");

    dos.unmount_hd().await?;
    assert_eq!(*dos.state(), DiskState::Unset);

    dos.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn autoexec_replay_is_idempotent_on_disk() -> Result<()> {
    let tmp = TempDir::new()?;
    let (hd, conf) = build_master_fixture(tmp.path()).await?;
    let mut dos = controller(&hd, &conf, tmp.path());
    dos.setup().await?;

    dos.append_to_autoexec(&["LHA E A.LZH"]).await?;
    dos.append_to_autoexec(&["COPY A.TXT B.TXT"]).await?;

    let script = dos.read_from_hd("AUTOEXEC.BAT").await?;
    let script = String::from_utf8_lossy(&script);
    assert!(script.starts_with("@ECHO OFF\r\n"), "baseline must survive: {script}");
    assert!(script.contains("COPY A.TXT B.TXT"));
    assert!(
        !script.contains("LHA"),
        "first rewrite must not leak into the second: {script}"
    );

    dos.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn teardown_tolerates_a_busy_mount() -> Result<()> {
    let tmp = TempDir::new()?;
    let (hd, conf) = build_master_fixture(tmp.path()).await?;
    let mut dos = controller(&hd, &conf, tmp.path());
    dos.setup().await?;

    // An open handle on the mounted filesystem makes umount fail EBUSY.
    let (mount_dir, _) = dos.mount_hd().await?;
    let held = std::fs::File::open(mount_dir.join("AUTOEXEC.BAT"))?;

    // Cleanup is best-effort: the failed unmount must not abort teardown.
    dos.teardown().await?;
    assert!(dos.state().is_mounted(), "busy mount stays held");

    drop(held);
    dos.unmount_hd().await?;
    dos.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn teardown_removes_workspace_and_is_repeatable() -> Result<()> {
    let tmp = TempDir::new()?;
    let (hd, conf) = build_master_fixture(tmp.path()).await?;
    let mut dos = controller(&hd, &conf, tmp.path());
    dos.setup().await?;

    // Leave the disk mounted: teardown has to unmount before deleting.
    dos.mount_hd().await?;
    dos.teardown().await?;
    assert_eq!(*dos.state(), DiskState::Unset);
    dos.teardown().await?; // second teardown must not fail

    Ok(())
}

// ---------------------------------------------------------------------------
// End-to-end quick ops (bootable image + dosbox required)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quick_op_copies_file_through_the_guest() -> Result<()> {
    let Some((hd, conf)) = bootable_fixture() else {
        eprintln!("skipping: set DOSBATCH_TEST_HD_IMAGE and DOSBATCH_TEST_CONF");
        return Ok(());
    };
    let tmp = TempDir::new()?;

    let payload = b"round trip through DOS";
    let host_in = tmp.path().join("in.bin");
    let host_out = tmp.path().join("out.bin");
    std::fs::write(&host_in, payload)?;

    let op = QuickOp {
        in_files: vec![FileIn {
            host: host_in.clone(),
            guest: "IN.BIN".into(),
        }],
        cmds: vec!["COPY C:\\IN.BIN C:\\OUT.BIN".into()],
        out_files: vec![FileOut {
            guest: "OUT.BIN".into(),
            host: host_out.clone(),
        }],
        timeout_secs: Some(180),
        tmp_dir: Some(tmp.path().to_path_buf()),
        ..QuickOp::new(&hd, &conf)
    };
    Dos::quick_op(op).await?;

    let copied = std::fs::read(&host_out)
        .context("guest-side copy should have produced OUT.BIN")?;
    assert_eq!(copied, payload);
    Ok(())
}

#[tokio::test]
async fn quick_op_tolerates_missing_outputs() -> Result<()> {
    let Some((hd, conf)) = bootable_fixture() else {
        eprintln!("skipping: set DOSBATCH_TEST_HD_IMAGE and DOSBATCH_TEST_CONF");
        return Ok(());
    };
    let tmp = TempDir::new()?;
    let host_out = tmp.path().join("never-created.bin");

    let op = QuickOp {
        cmds: vec!["REM no output produced".into()],
        out_files: vec![FileOut {
            guest: "MISSING.BIN".into(),
            host: host_out.clone(),
        }],
        timeout_secs: Some(180),
        tmp_dir: Some(tmp.path().to_path_buf()),
        ..QuickOp::new(&hd, &conf)
    };

    // No fatal error even though the listed output never existed.
    Dos::quick_op(op).await?;
    assert!(!host_out.exists());
    Ok(())
}
