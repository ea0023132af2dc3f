use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_TTL_DAYS;
use crate::resolver::DEFAULT_NEARBY_RADIUS;

const DEFAULT_POLL_TIMEOUT_SECS: u64 = 25;
const DEFAULT_DATABASE: &str = "shadowlog.sqlite3";
const DEFAULT_MEDIA_CACHE_DIR: &str = "media_cache";
const DEFAULT_RAW_UPDATES_LOG: &str = "updates.ndjson";
const DEFAULT_OWNER_FILE: &str = "owner_id.txt";

/// On-disk configuration; every field is optional and falls back to an
/// environment variable and then a default
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShadowlogConfig {
    pub bot_token: Option<String>,
    pub owner_id: Option<i64>,
    /// Legacy group target for audit output; the owner wins when both exist
    pub log_chat: Option<i64>,
    pub database: Option<String>,
    pub media_cache_dir: Option<String>,
    pub cache_ttl_days: Option<u64>,
    pub nearby_radius: Option<i64>,
    pub poll_timeout_secs: Option<u64>,
    /// NDJSON journal of raw updates; empty string disables it
    pub raw_updates_log: Option<String>,
    pub owner_file: Option<String>,
}

/// Fully-defaulted configuration the relay runs with
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bot_token: String,
    pub owner_id: Option<i64>,
    pub log_chat: Option<i64>,
    pub database: PathBuf,
    pub media_cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub nearby_radius: i64,
    pub poll_timeout_secs: u64,
    pub raw_updates_log: Option<PathBuf>,
    pub owner_file: PathBuf,
}

impl ShadowlogConfig {
    /// Fill unset fields from the environment
    pub fn overlay_env(mut self) -> Self {
        fn env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        if self.bot_token.is_none() {
            self.bot_token = env("BOT_TOKEN");
        }
        if self.owner_id.is_none() {
            self.owner_id = env("OWNER_ID").and_then(|s| s.parse().ok());
        }
        if self.log_chat.is_none() {
            self.log_chat = env("LOG_CHAT").and_then(|s| s.parse().ok());
        }
        if self.media_cache_dir.is_none() {
            self.media_cache_dir = env("MEDIA_CACHE_DIR");
        }
        if self.cache_ttl_days.is_none() {
            self.cache_ttl_days = env("CACHE_TTL_DAYS").and_then(|s| s.parse().ok());
        }
        if self.poll_timeout_secs.is_none() {
            self.poll_timeout_secs = env("POLL_TIMEOUT").and_then(|s| s.parse().ok());
        }
        if self.raw_updates_log.is_none() {
            self.raw_updates_log = env("RAW_UPDATES");
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(self.database.as_deref().unwrap_or(DEFAULT_DATABASE))
    }

    pub fn cache_settings(&self) -> (PathBuf, Duration) {
        let dir = PathBuf::from(
            self.media_cache_dir
                .as_deref()
                .unwrap_or(DEFAULT_MEDIA_CACHE_DIR),
        );
        let days = self.cache_ttl_days.unwrap_or(DEFAULT_CACHE_TTL_DAYS);
        (dir, Duration::from_secs(days * 86_400))
    }

    /// Apply defaults and require the token
    pub fn resolve(self) -> anyhow::Result<ResolvedConfig> {
        let bot_token = self
            .bot_token
            .clone()
            .context("no bot token: set BOT_TOKEN or bot_token in shadowlog.toml")?;
        let (media_cache_dir, cache_ttl) = self.cache_settings();
        let raw_updates_log = match self.raw_updates_log {
            Some(ref s) if s.is_empty() => None,
            Some(ref s) => Some(PathBuf::from(s)),
            None => Some(PathBuf::from(DEFAULT_RAW_UPDATES_LOG)),
        };

        Ok(ResolvedConfig {
            bot_token,
            owner_id: self.owner_id,
            log_chat: self.log_chat,
            database: self.database_path(),
            media_cache_dir,
            cache_ttl,
            nearby_radius: self.nearby_radius.unwrap_or(DEFAULT_NEARBY_RADIUS),
            poll_timeout_secs: self.poll_timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            raw_updates_log,
            owner_file: PathBuf::from(self.owner_file.as_deref().unwrap_or(DEFAULT_OWNER_FILE)),
        })
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("shadowlog.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ShadowlogConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ShadowlogConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ShadowlogConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_requires_token() {
        assert!(ShadowlogConfig::default().resolve().is_err());
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let resolved = ShadowlogConfig {
            bot_token: Some("000:TEST".to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(resolved.nearby_radius, DEFAULT_NEARBY_RADIUS);
        assert_eq!(resolved.cache_ttl, Duration::from_secs(7 * 86_400));
        assert_eq!(resolved.poll_timeout_secs, 25);
        assert_eq!(resolved.database, PathBuf::from("shadowlog.sqlite3"));
        assert_eq!(
            resolved.raw_updates_log,
            Some(PathBuf::from("updates.ndjson"))
        );
    }

    #[test]
    fn test_empty_journal_path_disables_it() {
        let resolved = ShadowlogConfig {
            bot_token: Some("000:TEST".to_string()),
            raw_updates_log: Some(String::new()),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(resolved.raw_updates_log, None);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("shadowlog.toml");
        let config = ShadowlogConfig {
            bot_token: Some("000:TEST".to_string()),
            cache_ttl_days: Some(3),
            nearby_radius: Some(5),
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.cache_ttl_days, Some(3));
        assert_eq!(loaded.nearby_radius, Some(5));
    }
}
