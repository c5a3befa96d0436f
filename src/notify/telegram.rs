//! Telegram Bot API client: outbound sends and the inbound update stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DeliveryError, Destination, Markup, OutgoingMessage, Sink};
use crate::ingest::types::{ChannelPost, FetchError, FetchResult};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramApi {
    base_url: String,
    token: String,
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the token
        f.debug_struct("TelegramApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
    pub edited_channel_post: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

impl Message {
    /// Text or caption, whichever the message carries.
    pub fn text_content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    /// Public link: `t.me/<username>/<id>` or `t.me/c/<internal id>/<id>` for private channels.
    pub fn link(&self) -> Option<String> {
        if let Some(u) = &self.chat.username {
            return Some(format!("https://t.me/{}/{}", u, self.message_id));
        }
        let id = self.chat.id.to_string();
        id.strip_prefix("-100")
            .map(|internal| format!("https://t.me/c/{}/{}", internal, self.message_id))
    }

    pub fn to_channel_post(&self) -> Option<ChannelPost> {
        let text = self.text_content()?.to_string();
        Some(ChannelPost {
            chat: self.chat.id.to_string(),
            message_id: self.message_id,
            text,
            link: self.link(),
            timestamp: DateTime::<Utc>::from_timestamp(self.date, 0).unwrap_or_else(Utc::now),
        })
    }
}

fn delivery_error<T>(status: StatusCode, resp: &ApiResponse<T>) -> DeliveryError {
    let code = resp.error_code.unwrap_or(status.as_u16());
    let description = resp
        .description
        .clone()
        .unwrap_or_else(|| format!("HTTP {code}"));
    match code {
        429 => DeliveryError::RateLimited {
            retry_after: resp.parameters.as_ref().and_then(|p| p.retry_after),
        },
        403 => DeliveryError::Forbidden(description),
        _ => DeliveryError::Other(description),
    }
}

impl TelegramApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(TELEGRAM_API_URL, token, Duration::from_secs(10))
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: crate::ingest::http::build_client(timeout),
            timeout,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn post_send<B: Serialize>(&self, method: &str, body: &B) -> Result<(), DeliveryError> {
        let rsp = self
            .client
            .post(self.method_url(method))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            // strip the URL: it carries the token
            .map_err(|e| DeliveryError::Other(e.without_url().to_string()))?;
        let status = rsp.status();
        let parsed: ApiResponse<serde_json::Value> = rsp
            .json()
            .await
            .map_err(|e| DeliveryError::Other(format!("HTTP {status}: {}", e.without_url())))?;
        if status.is_success() && parsed.ok {
            Ok(())
        } else {
            Err(delivery_error(status, &parsed))
        }
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markup: Markup,
        disable_preview: bool,
    ) -> Result<(), DeliveryError> {
        let req = SendMessageRequest {
            chat_id,
            text,
            parse_mode: match markup {
                Markup::Html => Some("HTML"),
                Markup::Plain => None,
            },
            disable_web_page_preview: disable_preview,
        };
        self.post_send("sendMessage", &req).await
    }

    /// Photo with a plain caption (no `parse_mode`).
    pub async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let req = SendPhotoRequest {
            chat_id,
            photo: photo_url,
            caption,
        };
        self.post_send("sendPhoto", &req).await
    }

    /// Long-poll for updates after `offset`. `wait_secs` is the server-side hold.
    pub async fn get_updates(&self, offset: i64, wait_secs: u64) -> FetchResult<Vec<Update>> {
        let req = GetUpdatesRequest {
            offset,
            timeout: wait_secs,
            allowed_updates: &["message", "channel_post", "edited_channel_post"],
        };
        let hold = self.timeout + Duration::from_secs(wait_secs);
        let rsp = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(hold)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(hold)
                } else {
                    FetchError::Transport(e.without_url())
                }
            })?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let parsed: ApiResponse<Vec<Update>> = rsp
            .json()
            .await
            .map_err(|e| FetchError::malformed(e.without_url()))?;
        if !parsed.ok {
            return Err(FetchError::malformed(
                parsed.description.unwrap_or_else(|| "ok=false".into()),
            ));
        }
        Ok(parsed.result.unwrap_or_default())
    }
}

#[async_trait]
impl Sink for TelegramApi {
    async fn send(&self, dest: &Destination, msg: &OutgoingMessage) -> Result<(), DeliveryError> {
        match msg {
            OutgoingMessage::Text {
                text,
                markup,
                disable_preview,
            } => {
                self.send_message(dest.chat_id(), text, *markup, *disable_preview)
                    .await
            }
            OutgoingMessage::Photo { url, caption } => {
                self.send_photo(dest.chat_id(), url, caption).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(chat_id: i64, username: Option<&str>, text: Option<&str>) -> Message {
        Message {
            message_id: 42,
            date: 1_741_082_400,
            chat: Chat {
                id: chat_id,
                username: username.map(Into::into),
            },
            from: None,
            text: text.map(Into::into),
            caption: None,
        }
    }

    #[test]
    fn links_for_public_and_private_channels() {
        assert_eq!(
            msg(-1001234, Some("whale_alert_io"), None).link().as_deref(),
            Some("https://t.me/whale_alert_io/42")
        );
        assert_eq!(
            msg(-1001234, None, None).link().as_deref(),
            Some("https://t.me/c/1234/42")
        );
        assert_eq!(msg(777, None, None).link(), None);
    }

    #[test]
    fn only_text_bearing_messages_become_posts() {
        assert!(msg(-100, None, None).to_channel_post().is_none());
        assert!(msg(-100, None, Some("  ")).to_channel_post().is_none());
        let p = msg(-100, None, Some("hello")).to_channel_post().unwrap();
        assert_eq!(p.chat, "-100");
        assert_eq!(p.text, "hello");
    }

    #[test]
    fn error_mapping() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 5","parameters":{"retry_after":5}}"#;
        let parsed: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert_eq!(
            delivery_error(StatusCode::TOO_MANY_REQUESTS, &parsed),
            DeliveryError::RateLimited {
                retry_after: Some(5)
            }
        );

        let body = r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was kicked"}"#;
        let parsed: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert!(matches!(
            delivery_error(StatusCode::FORBIDDEN, &parsed),
            DeliveryError::Forbidden(_)
        ));
    }
}
