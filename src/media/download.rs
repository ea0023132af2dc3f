//! URL video downloads via yt-dlp

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;

use crate::{Error, Result};

const YTDLP_FORMAT: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b";

/// Extract http(s) URLs from message text
pub fn find_urls(text: &str) -> Vec<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let re = URL_RE.get_or_init(|| Regex::new(r"https?://\S+").expect("valid URL regex"));
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Download a video URL into a scratch directory as mp4.
///
/// Returns the downloaded file path; any yt-dlp failure (unsupported site,
/// geo block, network) is an `Error::Download` for the caller to swallow or
/// report.
pub async fn download_video_from_url(url: &str) -> Result<PathBuf> {
    let dir = super::scratch_dir("shadowlog-url")?;
    let template = dir.join("video.%(ext)s");

    tracing::debug!(url, "downloading via yt-dlp");
    let output = Command::new("yt-dlp")
        .arg("-f")
        .arg(YTDLP_FORMAT)
        .arg("--merge-output-format")
        .arg("mp4")
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--retries")
        .arg("3")
        .arg("--geo-bypass")
        .arg("-o")
        .arg(&template)
        .arg(url)
        .output()
        .await
        .map_err(|e| Error::Download(format!("failed to spawn yt-dlp: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Download(format!(
            "yt-dlp exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    // The merge step normalizes to mp4, but fall back to whatever single
    // file yt-dlp produced.
    let merged = dir.join("video.mp4");
    if merged.exists() {
        return Ok(merged);
    }
    for entry in std::fs::read_dir(&dir)?.filter_map(|e| e.ok()) {
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            return Ok(entry.path());
        }
    }
    Err(Error::Download(format!("yt-dlp produced no output for {url}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls() {
        let urls = find_urls("watch https://example.com/v/1 and http://a.b/c now");
        assert_eq!(urls, vec!["https://example.com/v/1", "http://a.b/c"]);
    }

    #[test]
    fn test_find_urls_empty() {
        assert!(find_urls("").is_empty());
        assert!(find_urls("no links here").is_empty());
    }
}
