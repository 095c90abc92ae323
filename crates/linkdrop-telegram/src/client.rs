//! Minimal Telegram Bot API client.
//!
//! JSON methods go through [`BotClient::call`]; file uploads stream the file
//! from disk as a multipart body and report bytes as they are handed to the
//! connection.

use std::path::Path;
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;

use linkdrop_core::{FileKind, OutgoingFile, UploadProgress};

use crate::error::{Result, TelegramError};
use crate::types::{
    AnswerCallbackParams, ApiResponse, EditMessageTextParams, GetUpdatesParams,
    InlineKeyboardMarkup, Message, SendMessageParams, Update, User,
};

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Timeout for ordinary JSON calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack on top of the long-poll timeout before the request is abandoned.
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Telegram's limit for message text.
const MAX_TEXT_LEN: usize = 4096;

/// Thin wrapper over `reqwest` for the handful of Bot API methods used.
#[derive(Clone)]
pub struct BotClient {
    http: reqwest::Client,
    base: String,
}

impl std::fmt::Debug for BotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token
        f.debug_struct("BotClient").finish_non_exhaustive()
    }
}

impl BotClient {
    pub fn new(token: &str, api_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    /// Call a JSON method and decode its `result`.
    pub async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?;
        decode(method, response).await
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({}), CALL_TIMEOUT).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &params, timeout + POLL_SLACK).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let params = SendMessageParams {
            chat_id,
            text: truncate(text),
            disable_web_page_preview: true,
            reply_markup,
        };
        self.call("sendMessage", &params, CALL_TIMEOUT).await
    }

    /// Edit a message's text. An unchanged text is not an error.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let params = EditMessageTextParams {
            chat_id,
            message_id,
            text: truncate(text),
            disable_web_page_preview: true,
            reply_markup,
        };
        match self
            .call::<_, serde_json::Value>("editMessageText", &params, CALL_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str, text: &str) -> Result<()> {
        let params = AnswerCallbackParams {
            callback_query_id,
            text: (!text.is_empty()).then_some(text),
        };
        self.call::<_, bool>("answerCallbackQuery", &params, CALL_TIMEOUT)
            .await
            .map(|_| ())
    }

    /// Upload a file as video or document, streaming it from disk.
    pub async fn send_file(
        &self,
        chat_id: i64,
        file: &OutgoingFile,
        progress: UploadProgress,
    ) -> Result<Message> {
        let (method, field) = match file.kind {
            FileKind::Video => ("sendVideo", "video"),
            FileKind::Document => ("sendDocument", "document"),
        };

        let part = file_part(&file.path, file.file_name.clone(), progress).await?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field, part);
        if let Some(caption) = &file.caption {
            form = form.text("caption", caption.clone());
        }
        if file.kind == FileKind::Video {
            form = form.text("supports_streaming", "true");
            if let Some(media) = &file.media {
                if let Some(duration) = media.duration {
                    form = form.text("duration", duration.as_secs().to_string());
                }
                form = form
                    .text("width", media.width.to_string())
                    .text("height", media.height.to_string());
            }
        }
        if let Some(thumbnail) = &file.thumbnail {
            // A preview is optional; the upload goes on without it
            match tokio::fs::read(thumbnail).await {
                Ok(bytes) => {
                    let part = Part::bytes(bytes)
                        .file_name("thumbnail.jpg")
                        .mime_str("image/jpeg")?;
                    form = form.part("thumbnail", part);
                }
                Err(e) => {
                    tracing::warn!(path = %thumbnail.display(), error = %e, "Cannot read thumbnail");
                }
            }
        }

        tracing::debug!(method, file = %file.file_name, "Uploading file");
        let response = self
            .http
            .post(self.url(method))
            .multipart(form)
            .send()
            .await?;
        decode(method, response).await
    }
}

/// Multipart part whose body streams `path` and reports progress.
async fn file_part(path: &Path, file_name: String, progress: UploadProgress) -> Result<Part> {
    let file = tokio::fs::File::open(path).await?;
    let total = file.metadata().await?.len();
    let mut sent = 0u64;

    progress(0, total);
    let stream = ReaderStream::new(file).inspect_ok(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
    });

    Ok(Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        .file_name(file_name)
        .mime_str("application/octet-stream")?)
}

/// Decode a Bot API envelope, mapping `ok: false` to typed errors.
async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
        TelegramError::Decode(format!("{method}: HTTP {status}: {e}"))
    })?;

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TelegramError::Decode(format!("{method}: missing result")));
    }

    if let Some(secs) = envelope.parameters.and_then(|p| p.retry_after) {
        tracing::warn!(method, retry_after = secs, "Telegram flood control");
        return Err(TelegramError::RetryAfter(Duration::from_secs(secs)));
    }

    Err(TelegramError::Api {
        code: envelope.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
        description: envelope
            .description
            .unwrap_or_else(|| "telegram returned ok=false".to_string()),
    })
}

/// Cut text to the message length limit on a char boundary.
fn truncate(text: &str) -> &str {
    if text.len() <= MAX_TEXT_LEN {
        return text;
    }
    let mut end = MAX_TEXT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use linkdrop_core::MediaInfo;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const TOKEN: &str = "123:abc";

    fn client(server: &MockServer) -> BotClient {
        BotClient::new(TOKEN, &server.base_url()).unwrap()
    }

    fn message_json(id: i64) -> serde_json::Value {
        json!({"ok": true, "result": {"message_id": id, "chat": {"id": 42}}})
    }

    #[tokio::test]
    async fn test_send_message_with_keyboard() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:abc/sendMessage")
                    .json_body_partial(
                        r#"{"chat_id": 42, "reply_markup": {"inline_keyboard": [[{"text": "Cancel", "callback_data": "cancel:7"}]]}}"#,
                    );
                then.status(200).json_body(message_json(77));
            })
            .await;

        let message = client(&server)
            .send_message(
                42,
                "Starting",
                Some(crate::types::cancel_keyboard(linkdrop_core::TaskId::new(7))),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(message.message_id, 77);
    }

    #[tokio::test]
    async fn test_not_modified_edit_is_ok() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123:abc/editMessageText");
                then.status(400).json_body(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: message is not modified"
                }));
            })
            .await;

        assert!(client(&server).edit_message_text(42, 1, "same", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_flood_control_maps_to_retry_after() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123:abc/sendMessage");
                then.status(429).json_body(json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 5",
                    "parameters": {"retry_after": 5}
                }));
            })
            .await;

        let err = client(&server).send_message(42, "hi", None).await.unwrap_err();
        assert!(matches!(err, TelegramError::RetryAfter(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_api_error_keeps_description() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123:abc/sendMessage");
                then.status(400).json_body(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: chat not found"
                }));
            })
            .await;

        let err = client(&server).send_message(1, "hi", None).await.unwrap_err();
        match err {
            TelegramError::Api { code, description } => {
                assert_eq!(code, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_document_streams_file_and_reports_progress() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:abc/sendDocument")
                    .body_contains("name=\"document\"; filename=\"notes.txt\"")
                    .body_contains("hello telegram");
                then.status(200).json_body(message_json(5));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello telegram").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: UploadProgress = Arc::new(move |sent, total| {
            sink.lock().unwrap().push((sent, total));
        });

        client(&server)
            .send_file(42, &OutgoingFile::from_path(&path), progress)
            .await
            .unwrap();

        mock.assert_async().await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&(0, 14)));
        assert_eq!(seen.last(), Some(&(14, 14)));
    }

    #[tokio::test]
    async fn test_send_video_carries_metadata_and_thumbnail() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:abc/sendVideo")
                    .body_contains("name=\"video\"; filename=\"clip.mp4\"")
                    .body_contains("name=\"duration\"\r\n\r\n75")
                    .body_contains("name=\"width\"\r\n\r\n1280")
                    .body_contains("name=\"thumbnail\"; filename=\"thumbnail.jpg\"")
                    .body_contains("fake-jpeg");
                then.status(200).json_body(message_json(6));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, "frames").unwrap();
        let thumb = dir.path().join("clip.thumb.jpg");
        std::fs::write(&thumb, "fake-jpeg").unwrap();

        let file = OutgoingFile::from_path(&path)
            .with_media(MediaInfo {
                duration: Some(Duration::from_secs(75)),
                width: 1280,
                height: 720,
            })
            .with_thumbnail(&thumb);
        client(&server)
            .send_file(42, &file, Arc::new(|_: u64, _: u64| {}))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreadable_thumbnail_does_not_block_upload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123:abc/sendVideo");
                then.status(200).json_body(message_json(7));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, "frames").unwrap();
        let file = OutgoingFile::from_path(&path).with_thumbnail(dir.path().join("missing.jpg"));

        client(&server)
            .send_file(42, &file, Arc::new(|_: u64, _: u64| {}))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_updates_decodes_messages() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:abc/getUpdates")
                    .json_body_partial(r#"{"offset": 10, "timeout": 0}"#);
                then.status(200).json_body(json!({
                    "ok": true,
                    "result": [{
                        "update_id": 10,
                        "message": {
                            "message_id": 3,
                            "chat": {"id": 42},
                            "from": {"id": 42, "is_bot": false, "first_name": "Ana"},
                            "text": "https://example.com/a.mp4"
                        }
                    }]
                }));
            })
            .await;

        let updates = client(&server)
            .get_updates(10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].message.as_ref().unwrap().text.as_deref(),
            Some("https://example.com/a.mp4")
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(3000);
        let cut = truncate(&long);
        assert!(cut.len() <= MAX_TEXT_LEN);
        assert!(cut.chars().all(|c| c == 'é'));
        assert_eq!(truncate("short"), "short");
    }
}
