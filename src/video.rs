//! Screenshot extraction from a session recording.
//!
//! Runs are recorded off the Xvfb display with ffmpeg; when a caller only
//! wants a screenshot, one frame of that recording is pulled out here and
//! the recording itself is discarded by the facade.

use std::path::Path;

use crate::error::Result;
use crate::util::run_command;

/// Extract frame `frame` (0-based) of `video` into the image file `dest`.
/// The output format follows the destination extension (png, jpg, ...).
pub async fn extract_frame(video: &Path, dest: &Path, frame: u32) -> Result<()> {
    let select = format!("select=eq(n\\,{frame})");
    run_command(
        "ffmpeg",
        &[
            "-y",
            "-i",
            &video.to_string_lossy(),
            "-vf",
            &select,
            "-frames:v",
            "1",
            "-update",
            "1",
            &dest.to_string_lossy(),
        ],
    )
    .await
}
