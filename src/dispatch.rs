//! Dispatch loop - long poll, journal, route
//!
//! One sequential control loop: updates are processed strictly in order and
//! a handler failure for one update never stops the loop. Network failures
//! back off briefly and resume with the same offset.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};

use crate::cache::MediaCache;
use crate::commands;
use crate::config::ResolvedConfig;
use crate::ingest::Ingestor;
use crate::media;
use crate::owner::OwnerRegistry;
use crate::report::{self, Reporter};
use crate::resolver::Resolver;
use crate::snapshot::{MediaKind, unix_now};
use crate::storage::SnapshotStore;
use crate::telegram::{DeletedMessages, Message, TelegramClient, Update};
use crate::Result;

const POLL_BACKOFF: Duration = Duration::from_secs(2);

/// The running relay: owned storage handles plus the resolved configuration
pub struct Relay {
    pub(crate) store: SnapshotStore,
    pub(crate) cache: MediaCache,
    pub(crate) client: TelegramClient,
    pub(crate) owner: OwnerRegistry,
    pub(crate) config: ResolvedConfig,
}

impl Relay {
    pub fn new(config: ResolvedConfig) -> Result<Self> {
        let store = SnapshotStore::open(&config.database)?;
        let cache = MediaCache::new(config.media_cache_dir.clone());
        let client = TelegramClient::new(&config.bot_token)?;
        let owner = OwnerRegistry::new(
            config.owner_file.clone(),
            config.owner_id,
            config.log_chat,
        );
        Ok(Self {
            store,
            cache,
            client,
            owner,
            config,
        })
    }

    fn ingestor(&self) -> Ingestor<'_> {
        Ingestor::new(&self.store, &self.cache, &self.client)
    }

    fn reporter(&self) -> Reporter<'_> {
        Reporter::new(&self.client, &self.owner)
    }

    /// Run the polling loop forever
    pub async fn run(&self) -> Result<()> {
        match self.client.get_me().await {
            Ok(me) => tracing::info!(id = me.id, username = ?me.username, "bot authorized"),
            Err(e) => tracing::warn!(error = %e, "getMe failed, continuing anyway"),
        }

        self.reporter().announce("✅ Relay started.").await;
        self.cache.evict(self.config.cache_ttl);

        tracing::info!("poll loop started");
        let mut offset: Option<i64> = None;
        loop {
            let updates = match self
                .client
                .get_updates(offset, self.config.poll_timeout_secs)
                .await
            {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "poll failed, backing off");
                    tokio::time::sleep(POLL_BACKOFF).await;
                    continue;
                }
            };

            for raw in updates {
                if let Some(id) = raw.get("update_id").and_then(Value::as_i64) {
                    offset = Some(offset.map_or(id + 1, |o| o.max(id + 1)));
                }
                self.journal(&raw);

                let update: Update = match serde_json::from_value(raw) {
                    Ok(update) => update,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unparsable update");
                        continue;
                    }
                };
                if let Err(e) = self.route(&update).await {
                    tracing::error!(update_id = update.update_id, error = %e, "update handler failed");
                }
            }
        }
    }

    /// Append the raw update to the NDJSON journal
    fn journal(&self, raw: &Value) {
        let Some(path) = &self.config.raw_updates_log else {
            return;
        };
        let mut line = serde_json::Map::new();
        line.insert("ts".to_string(), json!(unix_now()));
        if let Value::Object(map) = raw {
            line.extend(map.clone());
        }
        if let Ok(encoded) = serde_json::to_string(&Value::Object(line)) {
            if let Err(e) = append_line(path, &encoded) {
                tracing::warn!(error = %e, "failed to journal update");
            }
        }
    }

    async fn route(&self, update: &Update) -> Result<()> {
        if let Some(cq) = &update.callback_query {
            return commands::handle_callback(self, cq).await;
        }
        if let Some(m) = &update.business_message {
            return self.handle_business_message(m).await;
        }
        if let Some(m) = &update.edited_business_message {
            return self.handle_edited(m).await;
        }
        if let Some(d) = &update.deleted_business_messages {
            return self.handle_deleted(d, true).await;
        }
        if update.business_connection.is_some() {
            tracing::debug!("business connection update, nothing to do");
            return Ok(());
        }
        if let Some(d) = &update.deleted_messages {
            return self.handle_deleted(d, false).await;
        }
        if let Some(m) = &update.edited_message {
            return self.handle_edited(m).await;
        }
        if let Some(m) = &update.message {
            return self.handle_message(m).await;
        }
        tracing::debug!(update_id = update.update_id, "unhandled update type");
        Ok(())
    }

    async fn handle_business_message(&self, envelope: &Message) -> Result<()> {
        let scope = envelope.scope();
        if scope.is_empty() {
            tracing::debug!("business message without connection id, skipping");
            return Ok(());
        }
        self.ingestor()
            .record_message(scope, envelope.effective(), true)
            .await
    }

    /// Plain chat message: record it, and offer media actions for anything
    /// with a usable video stream (including freshly downloaded URLs)
    async fn handle_message(&self, msg: &Message) -> Result<()> {
        let Some(chat_id) = msg.chat_id() else {
            return Ok(());
        };
        let text = msg.text_or_caption();
        let media_desc = msg.media();
        let mut recorded = false;
        let mut keyboard_sent = false;

        // Bare link: try to pull the video down so it outlives the link.
        if media_desc.is_none() && !text.is_empty() {
            if let Some(url) = media::find_urls(&text).into_iter().next() {
                match media::download_video_from_url(&url).await {
                    Ok(path) => {
                        self.ingestor().record_local_media(
                            "",
                            chat_id,
                            msg.message_id,
                            &text,
                            MediaKind::Document,
                            path,
                        )?;
                        recorded = true;
                        match commands::send_media_actions_keyboard(
                            &self.client,
                            chat_id,
                            msg.message_id,
                        )
                        .await
                        {
                            Ok(()) => keyboard_sent = true,
                            Err(e) => tracing::debug!(error = %e, "action keyboard failed"),
                        }
                    }
                    Err(e) => tracing::debug!(url, error = %e, "URL download skipped"),
                }
            }
        }

        if let Some((kind, _)) = &media_desc {
            if kind.is_video_like() && !keyboard_sent {
                self.ingestor().record_message("", msg, true).await?;
                recorded = true;
                if let Err(e) =
                    commands::send_media_actions_keyboard(&self.client, chat_id, msg.message_id)
                        .await
                {
                    tracing::debug!(error = %e, "action keyboard failed");
                }
            }
        }

        if commands::handle_command(self, msg, &text).await? {
            return Ok(());
        }

        if !recorded && (!text.is_empty() || media_desc.is_some()) {
            self.ingestor().record_message("", msg, true).await?;
        }
        Ok(())
    }

    /// Edited message (plain or business): fetch the old snapshot for the
    /// report, then re-upsert under the same key
    async fn handle_edited(&self, envelope: &Message) -> Result<()> {
        let scope = envelope.scope().to_string();
        let msg = envelope.effective();
        let Some(chat_id) = msg.chat_id() else {
            return Ok(());
        };

        let old_text = Resolver::new(&self.store)
            .with_radius(self.config.nearby_radius)
            .resolve(&scope, chat_id, msg.message_id)?
            .into_snapshot()
            .map(|s| s.text)
            .unwrap_or_default();

        self.ingestor().record_message(&scope, msg, false).await?;

        let chat_name = msg.chat.as_ref().and_then(|c| c.display_name());
        let actor_html =
            report::actor_link(msg.from.as_ref(), Some(chat_id), chat_name.as_deref());
        self.reporter()
            .report_edit(&actor_html, &old_text, &msg.text_or_caption())
            .await;
        Ok(())
    }

    async fn handle_deleted(&self, deleted: &DeletedMessages, business: bool) -> Result<()> {
        let scope = deleted.business_connection_id.as_deref().unwrap_or("");
        let Some(chat) = &deleted.chat else {
            tracing::debug!("deletion event without chat, skipping");
            return Ok(());
        };
        let chat_name = chat.display_name();
        let actor_html =
            report::actor_link(deleted.from.as_ref(), Some(chat.id), chat_name.as_deref());

        for message_id in &deleted.message_ids {
            let content = report::recover_content(
                &self.store,
                &self.cache,
                self.config.nearby_radius,
                scope,
                chat.id,
                *message_id,
            )?;
            self.reporter()
                .report_deletion(&actor_html, business, *message_id, content)
                .await;
        }
        Ok(())
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}
