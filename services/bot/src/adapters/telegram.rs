//! services/bot/src/adapters/telegram.rs
//!
//! This module contains the adapter for the Telegram Bot API.
//! It implements the `NotificationTransport` port used by the scheduler and the
//! `ChatChannel` port the webhook layer replies through.

use async_trait::async_trait;
use lifeline_core::{
    domain::{MessageHandle, UserId},
    ports::{
        ChatChannel, MessageAction, NotificationTransport, OutboundMessage, PortError,
        PortResult,
    },
};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::LazyLock;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A thin Bot API client over `reqwest`.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

/// The envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramClient {
    /// Creates a new `TelegramClient` for `token` against `api_base`
    /// (normally `https://api.telegram.org`).
    pub fn new(client: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> PortResult<T> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Delivery(format!("Telegram {method} failed: {e}")))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| PortError::Delivery(format!("Invalid Telegram {method} response: {e}")))?;

        if !envelope.ok {
            let description = envelope.description.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => PortError::Unauthorized,
                _ => PortError::Delivery(format!("Telegram {method} {status}: {description}")),
            });
        }
        envelope
            .result
            .ok_or_else(|| PortError::Delivery(format!("Telegram {method} returned no result")))
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl NotificationTransport for TelegramClient {
    async fn send_message(&self, recipient: UserId, message: &OutboundMessage) -> PortResult<MessageHandle> {
        let mut body = json!({
            "chat_id": recipient.0,
            "text": markdown_to_html(&message.text),
            "parse_mode": "HTML",
        });
        if !message.actions.is_empty() {
            body["reply_markup"] = inline_keyboard(&message.actions);
        }
        let sent: SentMessage = self.call("sendMessage", body).await?;
        debug!(user_id = recipient.0, message_id = sent.message_id, "Telegram message sent");
        Ok(MessageHandle(sent.message_id))
    }

    async fn retract_message(&self, recipient: UserId, handle: MessageHandle) -> PortResult<()> {
        let body = json!({ "chat_id": recipient.0, "message_id": handle.0 });
        let _: bool = self.call("deleteMessage", body).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatChannel for TelegramClient {
    async fn edit_text(&self, recipient: UserId, handle: MessageHandle, text: &str) -> PortResult<()> {
        let body = json!({
            "chat_id": recipient.0,
            "message_id": handle.0,
            "text": markdown_to_html(text),
            "parse_mode": "HTML",
        });
        // Edits answer with either the message or `true`.
        let _: Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_action(&self, action_id: &str, toast: Option<&str>) -> PortResult<()> {
        let mut body = json!({ "callback_query_id": action_id });
        if let Some(text) = toast {
            body["text"] = Value::String(text.to_string());
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }
}

/// One button per row, in order.
fn inline_keyboard(actions: &[MessageAction]) -> Value {
    let rows: Vec<Value> = actions
        .iter()
        .map(|a| json!([{ "text": a.label, "callback_data": a.callback_data }]))
        .collect();
    json!({ "inline_keyboard": rows })
}

//=========================================================================================
// Markdown to Telegram HTML
//=========================================================================================

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+?)$").expect("valid header regex"));
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("valid bold regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+?)`").expect("valid code regex"));

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Converts `**bold**`, `__bold__`, `` `code` `` and `# headers` into Telegram HTML.
/// Everything else is escaped so user text can never inject markup.
pub fn markdown_to_html(text: &str) -> String {
    let escaped = escape_html(text);
    let headers = HEADER_RE.replace_all(&escaped, "<b>$1</b>");
    // Code first so markers inside code spans survive untouched.
    let mut out = String::with_capacity(headers.len());
    let mut last = 0;
    for caps in CODE_RE.captures_iter(&headers) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&bold(&headers[last..whole.start()]));
        out.push_str("<code>");
        out.push_str(inner.as_str());
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&bold(&headers[last..]));
    out
}

fn bold(segment: &str) -> String {
    BOLD_RE
        .replace_all(segment, |caps: &regex::Captures<'_>| {
            let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            format!("<b>{}</b>", inner)
        })
        .into_owned()
}
