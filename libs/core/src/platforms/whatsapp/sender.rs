use async_trait::async_trait;
use serde_json::{Value, json};

use crate::platforms::{post_json, truncate_chars};
use crate::egress::{AdapterError, MediaKind, MessagingAdapter, SendReceipt};
use crate::flow::{Button, ListRow, ListSection};
use crate::types::Platform;

const MAX_BUTTONS: usize = 3;
const MAX_LIST_ROWS: usize = 10;

/// WhatsApp Cloud API client bound to one business phone number.
pub struct WhatsAppAdapter {
    http: reqwest::Client,
    api_base: String,
    phone_id: String,
    token: String,
}

impl WhatsAppAdapter {
    pub fn new(
        http: reqwest::Client,
        api_base: Option<String>,
        phone_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base = api_base.unwrap_or_else(|| "https://graph.facebook.com/v19.0".into());
        Self {
            http,
            api_base: base.trim_end_matches('/').to_string(),
            phone_id: phone_id.into(),
            token: token.into(),
        }
    }

    fn build_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_id)
    }

    async fn post(&self, payload: Value) -> Result<SendReceipt, AdapterError> {
        post_json(
            &self.http,
            &self.api_base,
            self.build_url(),
            Some(&self.token),
            payload,
            "/messages/0/id",
        )
        .await
    }

    fn envelope(to: &str, kind: &str, body: Value) -> Value {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": kind,
        });
        payload[kind] = body;
        payload
    }
}

fn list_body(text: &str, button_label: &str, sections: &[ListSection]) -> Value {
    let mut remaining = MAX_LIST_ROWS;
    let sections: Vec<Value> = sections
        .iter()
        .filter_map(|section| {
            let rows: Vec<&ListRow> = section.rows.iter().take(remaining).collect();
            remaining -= rows.len();
            if rows.is_empty() {
                return None;
            }
            let rows: Vec<Value> = rows
                .into_iter()
                .map(|row| {
                    let mut r = json!({
                        "id": truncate_chars(&row.id, 200),
                        "title": truncate_chars(&row.title, 24),
                    });
                    if let Some(desc) = &row.description {
                        r["description"] = json!(truncate_chars(desc, 72));
                    }
                    r
                })
                .collect();
            Some(json!({
                "title": truncate_chars(&section.title, 24),
                "rows": rows,
            }))
        })
        .collect();
    json!({
        "type": "list",
        "body": { "text": text },
        "action": {
            "button": truncate_chars(button_label, 20),
            "sections": sections,
        }
    })
}

#[async_trait]
impl MessagingAdapter for WhatsAppAdapter {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt, AdapterError> {
        self.post(Self::envelope(
            to,
            "text",
            json!({ "preview_url": false, "body": text }),
        ))
        .await
    }

    async fn send_media_message(
        &self,
        to: &str,
        url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<SendReceipt, AdapterError> {
        let mut media = json!({ "link": url });
        if kind != MediaKind::Audio && !caption.is_empty() {
            media["caption"] = json!(caption);
        }
        self.post(Self::envelope(to, kind.as_str(), media)).await
    }

    async fn send_button_message(
        &self,
        to: &str,
        text: &str,
        buttons: &[Button],
    ) -> Result<SendReceipt, AdapterError> {
        if buttons.len() > MAX_BUTTONS {
            let rows = buttons
                .iter()
                .map(|b| ListRow {
                    id: b.id.clone(),
                    title: b.title.clone(),
                    description: None,
                })
                .collect();
            let section = ListSection {
                title: "Opciones".into(),
                rows,
            };
            return self
                .send_list_message(to, text, "Ver opciones", &[section])
                .await;
        }
        let buttons: Vec<Value> = buttons
            .iter()
            .map(|b| {
                json!({
                    "type": "reply",
                    "reply": { "id": b.id, "title": truncate_chars(&b.title, 20) }
                })
            })
            .collect();
        self.post(Self::envelope(
            to,
            "interactive",
            json!({
                "type": "button",
                "body": { "text": text },
                "action": { "buttons": buttons }
            }),
        ))
        .await
    }

    async fn send_list_message(
        &self,
        to: &str,
        text: &str,
        button_label: &str,
        sections: &[ListSection],
    ) -> Result<SendReceipt, AdapterError> {
        self.post(Self::envelope(
            to,
            "interactive",
            list_body(text, button_label, sections),
        ))
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
        self.post(Self::envelope(
            to,
            "location",
            json!({
                "latitude": latitude,
                "longitude": longitude,
                "name": name,
                "address": address,
            }),
        ))
        .await
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<(), AdapterError> {
        self.post(json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
        }))
        .await
        .map(|_| ())
    }
}
