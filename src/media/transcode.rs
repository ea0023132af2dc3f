//! ffmpeg wrappers
//!
//! Three fixed transformations: square video-note transcode, audio strip,
//! and voice-note extraction. ffmpeg output is only surfaced on failure.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::{Error, Result};

/// Crop/scale filter producing the 640x640 square Telegram expects for
/// video notes
const SQUARE_FILTER: &str = "scale='if(gt(iw,ih),-2,640)':'if(gt(iw,ih),640,-2)',crop=640:640";

async fn run_ffmpeg(args: &[&str]) -> Result<()> {
    tracing::debug!(?args, "running ffmpeg");
    let output = Command::new("ffmpeg")
        .arg("-y")
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Transcode(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(Error::Transcode(format!("ffmpeg exited with {}: {tail}", output.status)));
    }
    Ok(())
}

fn sibling(src: &Path, name: &str) -> PathBuf {
    src.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

/// Transcode any video source into a 640x640 video note
pub async fn make_video_note_square(src: &Path) -> Result<PathBuf> {
    let dst = sibling(src, "circle_640.mp4");
    run_ffmpeg(&[
        "-i",
        &src.to_string_lossy(),
        "-vf",
        SQUARE_FILTER,
        "-r",
        "30",
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-profile:v",
        "baseline",
        "-level:v",
        "3.1",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
        "-c:a",
        "aac",
        "-b:a",
        "96k",
        &dst.to_string_lossy(),
    ])
    .await?;
    Ok(dst)
}

/// Copy an mp4 without its audio track (no video re-encode)
pub async fn make_muted_copy(src: &Path) -> Result<PathBuf> {
    let stem = src
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let dst = sibling(src, &format!("{stem}_muted.mp4"));
    run_ffmpeg(&[
        "-i",
        &src.to_string_lossy(),
        "-c:v",
        "copy",
        "-an",
        &dst.to_string_lossy(),
    ])
    .await?;
    Ok(dst)
}

/// Extract the audio track as an Opus voice note
pub async fn extract_voice_ogg(src: &Path) -> Result<PathBuf> {
    let dst = sibling(src, "voice.ogg");
    run_ffmpeg(&[
        "-i",
        &src.to_string_lossy(),
        "-vn",
        "-c:a",
        "libopus",
        "-b:a",
        "64k",
        "-ar",
        "48000",
        "-ac",
        "1",
        &dst.to_string_lossy(),
    ])
    .await?;
    Ok(dst)
}
