//! Interactive bot commands and inline-keyboard callbacks
//!
//! Two command families: ownership (`/start`, `/owner`) and media actions
//! (`/circle`, `/voice`, plus the inline buttons attached to video-bearing
//! messages). Media actions reply in the chat that asked, not to the owner.

use std::path::{Path, PathBuf};

use crate::dispatch::Relay;
use crate::media;
use crate::resolver::Resolver;
use crate::snapshot::MediaRef;
use crate::telegram::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use crate::telegram::{CallbackQuery, Message, TelegramClient};
use crate::Result;

/// Attach the circle/voice action buttons under a video-bearing message
pub async fn send_media_actions_keyboard(
    client: &TelegramClient,
    chat_id: i64,
    reply_to: i64,
) -> Result<()> {
    let keyboard = InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton {
                text: "🎯 Circle".to_string(),
                callback_data: format!("c:{chat_id}:{reply_to}"),
            },
            InlineKeyboardButton {
                text: "🎵 Voice".to_string(),
                callback_data: format!("v:{chat_id}:{reply_to}"),
            },
        ]],
    };
    client
        .send_message_with(chat_id, "Pick an action:", Some(reply_to), Some(&keyboard))
        .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaAction {
    Circle,
    Voice,
}

/// Parse `c:{chat}:{msg}` / `v:{chat}:{msg}` callback payloads
fn parse_action(data: &str) -> Option<(MediaAction, i64, i64)> {
    let mut parts = data.splitn(3, ':');
    let action = match parts.next()? {
        "c" => MediaAction::Circle,
        "v" => MediaAction::Voice,
        _ => return None,
    };
    let chat_id = parts.next()?.parse().ok()?;
    let message_id = parts.next()?.parse().ok()?;
    Some((action, chat_id, message_id))
}

/// Handle an inline-keyboard callback
pub async fn handle_callback(relay: &Relay, cq: &CallbackQuery) -> Result<()> {
    let data = cq.data.as_deref().unwrap_or("");
    let Some((action, src_chat, src_msg)) = parse_action(data) else {
        relay
            .client
            .answer_callback(&cq.id, Some("Malformed action data."), true)
            .await?;
        return Ok(());
    };

    let snapshot = Resolver::new(&relay.store)
        .with_radius(relay.config.nearby_radius)
        .resolve("", src_chat, src_msg)?
        .into_snapshot();
    let media_ref = snapshot.and_then(|s| match (s.media_kind, s.media_ref) {
        (Some(kind), Some(media_ref)) if kind.is_video_like() => Some(media_ref),
        _ => None,
    });
    let Some(media_ref) = media_ref else {
        relay
            .client
            .answer_callback(&cq.id, Some("Media not found or unsupported."), true)
            .await?;
        return Ok(());
    };

    relay
        .client
        .answer_callback(&cq.id, Some("Working on it…"), false)
        .await?;

    let src = match media_ref {
        MediaRef::Local(path) => path,
        MediaRef::Platform(file_id) => download_by_file_id(&relay.client, &file_id).await?,
    };

    match action {
        MediaAction::Circle => reply_circle(relay, src_chat, src_msg, &src).await,
        MediaAction::Voice => reply_voice(relay, src_chat, src_msg, &src).await,
    }
}

/// Dispatch slash commands; returns true when the text was a command
pub async fn handle_command(relay: &Relay, msg: &Message, text: &str) -> Result<bool> {
    if text.starts_with("/start") {
        handle_start(relay, msg).await?;
        return Ok(true);
    }
    if text.starts_with("/owner") {
        handle_owner(relay, msg).await?;
        return Ok(true);
    }
    if text.starts_with("/circle") || text.starts_with("!circle") {
        handle_circle(relay, msg).await?;
        return Ok(true);
    }
    if text.starts_with("/voice") || text.starts_with("!voice") {
        handle_voice(relay, msg).await?;
        return Ok(true);
    }
    Ok(false)
}

async fn handle_start(relay: &Relay, msg: &Message) -> Result<()> {
    let Some(chat_id) = msg.chat_id() else {
        return Ok(());
    };
    let Some(user_id) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };

    let reply = match relay.owner.get() {
        None => {
            relay.owner.claim(user_id)?;
            format!(
                "👋 Hi! I log message edits and deletions.\n\n\
                 ✅ You are now the bot owner!\n🆔 Your id: <code>{user_id}</code>\n\n\
                 💡 Deletion reports will arrive in this private chat."
            )
        }
        Some(owner) => format!(
            "👋 Hi! I log message edits and deletions.\n\n\
             🆔 Your id: <code>{user_id}</code>\n👑 Bot owner: <code>{owner}</code>\n\n\
             💡 Deletion reports go to the owner."
        ),
    };
    relay.client.send_message(chat_id, &reply).await
}

async fn handle_owner(relay: &Relay, msg: &Message) -> Result<()> {
    let Some(chat_id) = msg.chat_id() else {
        return Ok(());
    };
    let Some(user_id) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };

    let reply = match relay.owner.get() {
        Some(owner) if owner == user_id => "✅ You are the bot owner.".to_string(),
        Some(owner) => format!(
            "❌ You are not the bot owner.\n👑 Current owner: <code>{owner}</code>"
        ),
        None => {
            relay.owner.claim(user_id)?;
            format!("✅ You are now the bot owner!\n🆔 Id: <code>{user_id}</code>")
        }
    };
    relay.client.send_message(chat_id, &reply).await
}

async fn handle_circle(relay: &Relay, msg: &Message) -> Result<()> {
    let Some(chat_id) = msg.chat_id() else {
        return Ok(());
    };
    let target = msg.reply_to_message.as_deref().unwrap_or(msg);

    let src = match source_video(&relay.client, target).await {
        Ok(Some(path)) => path,
        Ok(None) => {
            return relay
                .client
                .send_message_with(
                    chat_id,
                    "Attach or reply to a video/animation/video document (or send a link).",
                    Some(msg.message_id),
                    None,
                )
                .await;
        }
        Err(e) => return reply_error(relay, chat_id, msg.message_id, "Circle", &e).await,
    };

    match media::make_video_note_square(&src).await {
        Ok(out) => {
            relay
                .client
                .send_video_note_file(chat_id, &out, Some(msg.message_id))
                .await
        }
        Err(e) => reply_error(relay, chat_id, msg.message_id, "Circle", &e).await,
    }
}

async fn handle_voice(relay: &Relay, msg: &Message) -> Result<()> {
    let Some(chat_id) = msg.chat_id() else {
        return Ok(());
    };
    let target = msg.reply_to_message.as_deref().unwrap_or(msg);

    let src = match source_audio(&relay.client, target).await {
        Ok(Some(path)) => path,
        Ok(None) => {
            return relay
                .client
                .send_message_with(
                    chat_id,
                    "Attach or reply to media (video/audio/voice) or send a link.",
                    Some(msg.message_id),
                    None,
                )
                .await;
        }
        Err(e) => return reply_error(relay, chat_id, msg.message_id, "Voice", &e).await,
    };

    match media::extract_voice_ogg(&src).await {
        Ok(out) => {
            relay
                .client
                .send_voice_file(chat_id, &out, Some(msg.message_id))
                .await
        }
        Err(e) => reply_error(relay, chat_id, msg.message_id, "Voice", &e).await,
    }
}

async fn reply_circle(relay: &Relay, chat_id: i64, reply_to: i64, src: &Path) -> Result<()> {
    match media::make_video_note_square(src).await {
        Ok(out) => {
            relay
                .client
                .send_video_note_file(chat_id, &out, Some(reply_to))
                .await
        }
        Err(e) => reply_error(relay, chat_id, reply_to, "Circle", &e).await,
    }
}

async fn reply_voice(relay: &Relay, chat_id: i64, reply_to: i64, src: &Path) -> Result<()> {
    match media::extract_voice_ogg(src).await {
        Ok(out) => {
            relay
                .client
                .send_voice_file(chat_id, &out, Some(reply_to))
                .await
        }
        Err(e) => reply_error(relay, chat_id, reply_to, "Voice", &e).await,
    }
}

async fn reply_error(
    relay: &Relay,
    chat_id: i64,
    reply_to: i64,
    what: &str,
    error: &crate::Error,
) -> Result<()> {
    relay
        .client
        .send_message_with(
            chat_id,
            &format!("{what} failed: {error}"),
            Some(reply_to),
            None,
        )
        .await
}

async fn download_by_file_id(client: &TelegramClient, file_id: &str) -> Result<PathBuf> {
    let (url, file_name) = client.get_file(file_id).await?;
    client.download_file(&url, &file_name).await
}

/// Locate a video source on the target message: attached media first, then
/// the first URL in its text
async fn source_video(client: &TelegramClient, target: &Message) -> Result<Option<PathBuf>> {
    if let Some(file_id) = target.video_file_id() {
        return Ok(Some(download_by_file_id(client, &file_id).await?));
    }
    source_from_url(target).await
}

/// Like [`source_video`] but also accepts voice/audio attachments
async fn source_audio(client: &TelegramClient, target: &Message) -> Result<Option<PathBuf>> {
    if let Some(file_id) = target.video_file_id() {
        return Ok(Some(download_by_file_id(client, &file_id).await?));
    }
    if let Some(f) = &target.voice {
        return Ok(Some(download_by_file_id(client, &f.file_id).await?));
    }
    if let Some(f) = &target.audio {
        return Ok(Some(download_by_file_id(client, &f.file_id).await?));
    }
    source_from_url(target).await
}

async fn source_from_url(target: &Message) -> Result<Option<PathBuf>> {
    let text = target.text_or_caption();
    let Some(url) = media::find_urls(&text).into_iter().next() else {
        return Ok(None);
    };
    match media::download_video_from_url(&url).await {
        Ok(path) => Ok(Some(path)),
        Err(e) => {
            tracing::debug!(url, error = %e, "URL download failed");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        assert_eq!(
            parse_action("c:12:34"),
            Some((MediaAction::Circle, 12, 34))
        );
        assert_eq!(
            parse_action("v:-100555:7"),
            Some((MediaAction::Voice, -100555, 7))
        );
        assert_eq!(parse_action("x:1:2"), None);
        assert_eq!(parse_action("c:1"), None);
        assert_eq!(parse_action("c:one:2"), None);
        assert_eq!(parse_action(""), None);
    }
}
