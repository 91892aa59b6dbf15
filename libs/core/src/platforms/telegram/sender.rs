use async_trait::async_trait;
use serde_json::{Value, json};

use crate::egress::{AdapterError, MediaKind, MessagingAdapter, SendReceipt};
use crate::flow::{Button, ListSection};
use crate::platforms::{post_json, truncate_chars};
use crate::types::Platform;

/// Telegram Bot API client. Buttons and list rows both render as inline keyboards.
pub struct TelegramAdapter {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramAdapter {
    pub fn new(http: reqwest::Client, api_base: Option<String>, token: impl Into<String>) -> Self {
        let base = api_base.unwrap_or_else(|| "https://api.telegram.org".into());
        Self {
            http,
            api_base: base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn call(&self, method: &str, payload: Value) -> Result<SendReceipt, AdapterError> {
        post_json(
            &self.http,
            &self.api_base,
            build_api_url(&self.api_base, &self.token, method),
            None,
            payload,
            "/result/message_id",
        )
        .await
    }
}

fn build_api_url(api_base: &str, bot_token: &str, method: &str) -> String {
    format!("{api_base}/bot{bot_token}/{method}")
}

/// One button per row; `callback_data` is capped at 64 bytes by Telegram.
fn inline_keyboard<'a>(items: impl Iterator<Item = (&'a str, &'a str)>) -> Value {
    let rows: Vec<Value> = items
        .map(|(id, title)| {
            let mut data = id.to_string();
            while data.len() > 64 {
                data.pop();
            }
            json!([{ "text": title, "callback_data": data }])
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl MessagingAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt, AdapterError> {
        self.call("sendMessage", json!({ "chat_id": to, "text": text }))
            .await
    }

    async fn send_media_message(
        &self,
        to: &str,
        url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<SendReceipt, AdapterError> {
        let (method, field) = match kind {
            MediaKind::Image => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Audio => ("sendAudio", "audio"),
            MediaKind::Document => ("sendDocument", "document"),
        };
        let mut payload = json!({ "chat_id": to });
        payload[field] = json!(url);
        if !caption.is_empty() {
            payload["caption"] = json!(truncate_chars(caption, 1024));
        }
        self.call(method, payload).await
    }

    async fn send_button_message(
        &self,
        to: &str,
        text: &str,
        buttons: &[Button],
    ) -> Result<SendReceipt, AdapterError> {
        let keyboard = inline_keyboard(buttons.iter().map(|b| (b.id.as_str(), b.title.as_str())));
        self.call(
            "sendMessage",
            json!({ "chat_id": to, "text": text, "reply_markup": keyboard }),
        )
        .await
    }

    async fn send_list_message(
        &self,
        to: &str,
        text: &str,
        _button_label: &str,
        sections: &[ListSection],
    ) -> Result<SendReceipt, AdapterError> {
        let keyboard = inline_keyboard(
            sections
                .iter()
                .flat_map(|s| s.rows.iter())
                .map(|r| (r.id.as_str(), r.title.as_str())),
        );
        self.call(
            "sendMessage",
            json!({ "chat_id": to, "text": text, "reply_markup": keyboard }),
        )
        .await
    }

    async fn send_location_message(
        &self,
        to: &str,
        latitude: f64,
        longitude: f64,
        name: &str,
        address: &str,
    ) -> Result<SendReceipt, AdapterError> {
        if !name.is_empty() && !address.is_empty() {
            return self
                .call(
                    "sendVenue",
                    json!({
                        "chat_id": to,
                        "latitude": latitude,
                        "longitude": longitude,
                        "title": name,
                        "address": address,
                    }),
                )
                .await;
        }
        self.call(
            "sendLocation",
            json!({ "chat_id": to, "latitude": latitude, "longitude": longitude }),
        )
        .await
    }

    async fn mark_as_read(&self, _message_id: &str) -> Result<(), AdapterError> {
        // Bot API has no read receipts.
        Ok(())
    }
}
