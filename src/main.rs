//! Shadowlog CLI - run the relay, sweep the cache, inspect the store

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use shadowlog::cache::MediaCache;
use shadowlog::config::{self, ShadowlogConfig};
use shadowlog::dispatch::Relay;
use shadowlog::storage::SnapshotStore;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "shadowlog")]
#[command(version = "0.1.0")]
#[command(about = "Telegram message shadow-store and deletion-audit relay")]
#[command(long_about = r#"
Shadowlog mirrors every message a bot observes into a durable side-store so
that edits and deletions can be reconstructed and reported to the bot owner:
  • Snapshot store keyed by (scope, chat, message)
  • Tiered fallback lookup for imprecise edit/delete callbacks
  • Best-effort media cache with age-based eviction

Example usage:
  shadowlog init
  BOT_TOKEN=123:abc shadowlog run
  shadowlog evict --days 7
  shadowlog stats
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling relay
    Run {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Sweep expired files out of the media cache
    Evict {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Retention window in days (overrides config)
        #[arg(long)]
        days: Option<u64>,
    },

    /// Show statistics about the snapshot store
    Stats {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to the database file (overrides config)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        /// Where to write the config
        #[arg(short, long, default_value = "shadowlog.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<ShadowlogConfig> {
    let config = config::load_config(path.map(PathBuf::as_path))?.unwrap_or_default();
    Ok(config.overlay_env())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { config } => {
            let resolved = load(config.as_ref())?.resolve()?;
            config::ensure_db_dir(&resolved.database)?;
            tracing::info!(
                database = %resolved.database.display(),
                cache = %resolved.media_cache_dir.display(),
                "starting relay"
            );

            let relay = Relay::new(resolved)?;
            relay.run().await?;
        }

        Commands::Evict { config, days } => {
            let config = load(config.as_ref())?;
            let (cache_dir, retention) = config.cache_settings();
            let retention = days
                .map(|d| Duration::from_secs(d * 86_400))
                .unwrap_or(retention);

            println!("🧹 Sweeping cache at {:?}...", cache_dir);
            let removed = MediaCache::new(cache_dir).evict(retention);
            println!("✅ Removed {} expired file(s).", removed);
        }

        Commands::Stats { config, database } => {
            let config = load(config.as_ref())?;
            let database = database.unwrap_or_else(|| config.database_path());
            let store = SnapshotStore::open(&database)?;
            let stats = store.stats()?;

            println!("📊 Shadowlog Statistics ({:?})", database);
            println!("------------------------------------");
            println!("{}", stats);
        }

        Commands::Init { path, force } => {
            let config = ShadowlogConfig::default();
            config::write_config(&path, &config, force)?;
            println!("✅ Wrote config template to {:?}", path);
            println!("   Set bot_token (or export BOT_TOKEN) before `shadowlog run`.");
        }
    }

    Ok(())
}
