//! Telegram channel — Bot API client for the gatekeeper.
//!
//! Inbound updates arrive either by long-polling `getUpdates` or through the
//! webhook receiver; both paths share [`parse_update`]. Outbound calls use
//! `sendMessage` (with an inline keyboard for choices) and
//! `answerCallbackQuery`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{Choice, EventStream, InboundEvent, Outbound};
use crate::error::ChannelError;
use crate::identity::SenderId;
use crate::users::SenderProfile;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll when Telegram gives no `retry_after`.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram Bot API client.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Builder: point at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST a Bot API method and check the `ok` flag of the response.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method}: {}", e.without_url()),
            })?;

        let status = resp.status();
        let data: Value = resp.json().await.map_err(|e| {
            ChannelError::Http(format!(
                "{method} returned unreadable body ({status}): {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} failed ({status}): {description}"),
            });
        }

        Ok(data)
    }

    /// Send a text message, splitting at Telegram's length limit. The reply
    /// markup, if any, is attached to the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last
                && let Some(markup) = &reply_markup
            {
                body["reply_markup"] = markup.clone();
            }
            self.call("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Register `url` as the webhook. Telegram echoes `secret` back in the
    /// `X-Telegram-Bot-Api-Secret-Token` header of every delivery.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret {
            body["secret_token"] = Value::String(secret.to_string());
        }
        self.call("setWebhook", &body)
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        tracing::info!(url, "Telegram webhook registered");
        Ok(())
    }

    /// Remove any webhook so `getUpdates` can be used.
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call("deleteWebhook", &serde_json::json!({}))
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    /// Start long-polling `getUpdates` and stream parsed events.
    pub fn start_polling(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel polling for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let results = match poll_results(&data) {
                    Ok(results) => results,
                    Err(rejection) => {
                        let delay = poll_retry_delay(&data);
                        tracing::warn!(retry_in = ?delay, "getUpdates rejected: {rejection}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Box::pin(stream)
    }
}

// ── Outbound implementation ─────────────────────────────────────────

#[async_trait]
impl Outbound for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        self.send_message(target, text, None).await
    }

    async fn send_choice(
        &self,
        target: &str,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChannelError> {
        self.send_message(target, text, Some(inline_keyboard(choices)))
            .await
    }

    async fn acknowledge_action(&self, action_id: &str, text: &str) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "callback_query_id": action_id });
        if !text.is_empty() {
            body["text"] = Value::String(text.to_string());
        }
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// One-row inline keyboard markup for `choices`.
fn inline_keyboard(choices: &[Choice]) -> Value {
    let row: Vec<Value> = choices
        .iter()
        .map(|c| {
            serde_json::json!({
                "text": c.label,
                "callback_data": c.action_tag,
            })
        })
        .collect();
    serde_json::json!({ "inline_keyboard": [row] })
}

/// The `result` array of a `getUpdates` reply, or why there is none.
fn poll_results(data: &Value) -> Result<&Vec<Value>, String> {
    if data.get("ok").and_then(Value::as_bool) != Some(true) {
        let code = data.get("error_code").and_then(Value::as_i64).unwrap_or_default();
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        return Err(format!("error {code}: {description}"));
    }
    data.get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| "reply has no result array".to_string())
}

/// How long to wait before polling again after a rejected `getUpdates`.
/// Honours `parameters.retry_after` (flood control), never less than a second.
fn poll_retry_delay(data: &Value) -> Duration {
    data.get("parameters")
        .and_then(|p| p.get("retry_after"))
        .and_then(Value::as_u64)
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or(POLL_ERROR_BACKOFF)
}

/// Extract the sender profile from a Bot API `User` object.
fn parse_user(user: &Value) -> Option<SenderProfile> {
    let id = user.get("id").and_then(Value::as_i64)?;
    let text = |key: &str| user.get(key).and_then(Value::as_str).map(String::from);

    Some(SenderProfile {
        id: SenderId::from(id),
        username: text("username"),
        first_name: text("first_name"),
        last_name: text("last_name"),
        language_code: text("language_code"),
        is_bot: user.get("is_bot").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn chat_id_of(message: &Value) -> Option<String> {
    message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
}

/// Turn one Bot API update into an inbound event.
///
/// Messages of any kind become `Message` events (non-text content yields an
/// empty text, captions count as text). Callback queries become `Action`
/// events. Updates without a sender are skipped.
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(message) = update.get("message") {
        let sender = parse_user(message.get("from")?)?;
        let text = message
            .get("text")
            .or_else(|| message.get("caption"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut event = InboundEvent::message(sender, text);
        if let Some(chat_id) = chat_id_of(message) {
            event = event.in_chat(chat_id);
        }
        return Some(event);
    }

    if let Some(query) = update.get("callback_query") {
        let sender = parse_user(query.get("from")?)?;
        let action_id = query.get("id").and_then(Value::as_str)?;
        let payload = query.get("data").and_then(Value::as_str).unwrap_or_default();
        let mut event = InboundEvent::action(sender, action_id, payload);
        if let Some(chat_id) = query.get("message").and_then(chat_id_of) {
            event = event.in_chat(chat_id);
        }
        return Some(event);
    }

    None
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&at| at > 0)
            .unwrap_or(cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
