//! Media tooling - transcoding and URL downloads
//!
//! External binaries (ffmpeg, yt-dlp) run as subprocesses; the relay only
//! hands them already-local files and picks up their output paths.

pub mod download;
pub mod transcode;

pub use download::{download_video_from_url, find_urls};
pub use transcode::{extract_voice_ogg, make_muted_copy, make_video_note_square};

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Create a unique scratch directory under the system temp dir
pub(crate) fn scratch_dir(prefix: &str) -> std::io::Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
