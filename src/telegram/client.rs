//! Bot API HTTP client
//!
//! Thin reqwest wrapper: every call POSTs JSON to one method endpoint and
//! unwraps the `{ok, result, description}` envelope. Uploads go through
//! multipart with a generous timeout; downloads land in a scratch directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::types::{ApiResponse, FileInfo, InlineKeyboardMarkup, User};
use crate::media::scratch_dir;
use crate::snapshot::MediaKind;
use crate::{Error, Result};

const CALL_TIMEOUT: Duration = Duration::from_secs(60);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// HTTP client bound to one bot token
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    file_base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("shadowlog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: format!("https://api.telegram.org/bot{token}"),
            file_base: format!("https://api.telegram.org/file/bot{token}"),
        })
    }

    /// POST a method call and unwrap the API envelope
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
        timeout: Duration,
    ) -> Result<T> {
        tracing::debug!(method, "api call");
        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?
            .error_for_status()?;
        let body: ApiResponse<T> = resp.json().await?;
        if !body.ok {
            return Err(Error::Api(format!(
                "{method}: {}",
                body.description.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        body.result
            .ok_or_else(|| Error::Api(format!("{method}: empty result")))
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({}), CALL_TIMEOUT).await
    }

    /// Long-poll for updates.
    ///
    /// Returns raw JSON values so the dispatch loop can journal each update
    /// before parsing it. An empty `allowed_updates` list subscribes to every
    /// update type, including business deletions.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        poll_timeout_secs: u64,
    ) -> Result<Vec<Value>> {
        let mut params = Map::new();
        if let Some(offset) = offset {
            params.insert("offset".to_string(), json!(offset));
        }
        params.insert("timeout".to_string(), json!(poll_timeout_secs));
        params.insert("allowed_updates".to_string(), json!([]));

        self.call(
            "getUpdates",
            &Value::Object(params),
            Duration::from_secs(poll_timeout_secs + 15),
        )
        .await
    }

    /// Send an HTML-formatted message
    pub async fn send_message(&self, chat_id: i64, html: &str) -> Result<()> {
        self.send_message_with(chat_id, html, None, None).await
    }

    pub async fn send_message_with(
        &self,
        chat_id: i64,
        html: &str,
        reply_to: Option<i64>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut params = Map::new();
        params.insert("chat_id".to_string(), json!(chat_id));
        params.insert("text".to_string(), json!(html));
        params.insert("parse_mode".to_string(), json!("HTML"));
        params.insert("disable_web_page_preview".to_string(), json!(true));
        if let Some(reply_to) = reply_to {
            params.insert("reply_to_message_id".to_string(), json!(reply_to));
        }
        if let Some(markup) = reply_markup {
            params.insert("reply_markup".to_string(), serde_json::to_value(markup)?);
        }
        self.call::<Value>("sendMessage", &Value::Object(params), CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Re-send media by its platform file id
    pub async fn send_media_by_id(
        &self,
        kind: MediaKind,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let (method, field) = send_endpoint(kind);
        let mut params = Map::new();
        params.insert("chat_id".to_string(), json!(chat_id));
        params.insert(field.to_string(), json!(file_id));
        if kind == MediaKind::VideoNote {
            params.insert("length".to_string(), json!(640));
        } else if let Some(caption) = caption {
            params.insert("caption".to_string(), json!(caption));
            params.insert("parse_mode".to_string(), json!("HTML"));
        }
        self.call::<Value>(method, &Value::Object(params), CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Upload a local file through multipart
    async fn upload(
        &self,
        method: &str,
        field: &str,
        path: &Path,
        params: Map<String, Value>,
    ) -> Result<()> {
        tracing::debug!(method, file = %path.display(), "api upload");
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        let mut form = reqwest::multipart::Form::new()
            .part(field.to_string(), reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        for (key, value) in params {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, text);
        }

        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .timeout(TRANSFER_TIMEOUT)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        let body: ApiResponse<Value> = resp.json().await?;
        if !body.ok {
            return Err(Error::Api(format!(
                "{method}: {}",
                body.description.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        Ok(())
    }

    /// Upload and send a local media file
    pub async fn send_media_file(
        &self,
        kind: MediaKind,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<()> {
        let (method, field) = send_endpoint(kind);
        let mut params = Map::new();
        params.insert("chat_id".to_string(), json!(chat_id));
        if kind == MediaKind::VideoNote {
            params.insert("length".to_string(), json!(640));
        } else if let Some(caption) = caption {
            params.insert("caption".to_string(), json!(caption));
            params.insert("parse_mode".to_string(), json!("HTML"));
        }
        self.upload(method, field, path, params).await
    }

    pub async fn send_video_note_file(
        &self,
        chat_id: i64,
        path: &Path,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let mut params = Map::new();
        params.insert("chat_id".to_string(), json!(chat_id));
        params.insert("length".to_string(), json!(640));
        if let Some(reply_to) = reply_to {
            params.insert("reply_to_message_id".to_string(), json!(reply_to));
        }
        self.upload("sendVideoNote", "video_note", path, params).await
    }

    pub async fn send_voice_file(
        &self,
        chat_id: i64,
        path: &Path,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let mut params = Map::new();
        params.insert("chat_id".to_string(), json!(chat_id));
        if let Some(reply_to) = reply_to {
            params.insert("reply_to_message_id".to_string(), json!(reply_to));
        }
        self.upload("sendVoice", "voice", path, params).await
    }

    pub async fn answer_callback(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut params = Map::new();
        params.insert("callback_query_id".to_string(), json!(callback_query_id));
        if let Some(text) = text {
            params.insert("text".to_string(), json!(text));
        }
        if show_alert {
            params.insert("show_alert".to_string(), json!(true));
        }
        self.call::<Value>("answerCallbackQuery", &Value::Object(params), CALL_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Resolve a file id to a download URL and its base file name
    pub async fn get_file(&self, file_id: &str) -> Result<(String, String)> {
        let info: FileInfo = self
            .call("getFile", &json!({"file_id": file_id}), CALL_TIMEOUT)
            .await?;
        let path = info
            .file_path
            .ok_or_else(|| Error::Api("getFile: no file_path in result".to_string()))?;
        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Ok((format!("{}/{}", self.file_base, path), file_name))
    }

    /// Download a resolved file URL into a scratch directory
    pub async fn download_file(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let dir = scratch_dir("shadowlog-dl")?;
        let local = dir.join(file_name);
        tracing::debug!(url, to = %local.display(), "downloading file");

        let resp = self
            .http
            .get(url)
            .timeout(TRANSFER_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let bytes = resp.bytes().await?;
        tokio::fs::write(&local, &bytes).await?;
        Ok(local)
    }
}

/// Method endpoint and file field for each media kind
fn send_endpoint(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Photo => ("sendPhoto", "photo"),
        MediaKind::Video => ("sendVideo", "video"),
        MediaKind::Document => ("sendDocument", "document"),
        MediaKind::Voice => ("sendVoice", "voice"),
        MediaKind::Audio => ("sendAudio", "audio"),
        MediaKind::Animation => ("sendAnimation", "animation"),
        MediaKind::VideoNote => ("sendVideoNote", "video_note"),
    }
}
