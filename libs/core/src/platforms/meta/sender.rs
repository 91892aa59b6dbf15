use async_trait::async_trait;
use serde_json::{Value, json};

use crate::egress::{
    AdapterError, MediaKind, MessagingAdapter, SendReceipt, location_link, numbered_menu,
};
use crate::flow::{Button, ListSection};
use crate::platforms::{post_json, truncate_chars};
use crate::types::Platform;

const MAX_QUICK_REPLIES: usize = 13;

/// Send API client for Messenger and Instagram Direct.
///
/// Buttons and short lists become quick replies; longer lists a numbered menu.
pub struct MetaAdapter {
    platform: Platform,
    http: reqwest::Client,
    api_base: String,
    page_token: String,
}

impl MetaAdapter {
    pub fn new(
        platform: Platform,
        http: reqwest::Client,
        api_base: Option<String>,
        page_token: impl Into<String>,
    ) -> Self {
        let base = api_base.unwrap_or_else(|| "https://graph.facebook.com/v19.0".into());
        Self {
            platform,
            http,
            api_base: base.trim_end_matches('/').to_string(),
            page_token: page_token.into(),
        }
    }

    async fn send(&self, to: &str, message: Value) -> Result<SendReceipt, AdapterError> {
        post_json(
            &self.http,
            &self.api_base,
            format!("{}/me/messages", self.api_base),
            Some(&self.page_token),
            json!({
                "recipient": { "id": to },
                "messaging_type": "RESPONSE",
                "message": message,
            }),
            "/message_id",
        )
        .await
    }

    async fn quick_replies<'a>(
        &self,
        to: &str,
        text: &str,
        options: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Result<SendReceipt, AdapterError> {
        let replies: Vec<Value> = options
            .map(|(id, title)| {
                json!({
                    "content_type": "text",
                    "title": truncate_chars(title, 20),
                    "payload": id,
                })
            })
            .collect();
        self.send(to, json!({ "text": text, "quick_replies": replies }))
            .await
    }
}

#[async_trait]
impl MessagingAdapter for MetaAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt, AdapterError> {
        self.send(to, json!({ "text": text })).await
    }

    async fn send_media_message(
        &self,
        to: &str,
        url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<SendReceipt, AdapterError> {
        let attachment_type = match kind {
            MediaKind::Document => "file",
            other => other.as_str(),
        };
        let receipt = self
            .send(
                to,
                json!({
                    "attachment": {
                        "type": attachment_type,
                        "payload": { "url": url, "is_reusable": true }
                    }
                }),
            )
            .await?;
        if !caption.is_empty() {
            self.send_message(to, caption).await?;
        }
        Ok(receipt)
    }

    async fn send_button_message(
        &self,
        to: &str,
        text: &str,
        buttons: &[Button],
    ) -> Result<SendReceipt, AdapterError> {
        self.quick_replies(
            to,
            text,
            buttons
                .iter()
                .take(MAX_QUICK_REPLIES)
                .map(|b| (b.id.as_str(), b.title.as_str())),
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
        let total: usize = sections.iter().map(|s| s.rows.len()).sum();
        if total <= MAX_QUICK_REPLIES {
            let rows = sections.iter().flat_map(|s| s.rows.iter());
            return self
                .quick_replies(to, text, rows.map(|r| (r.id.as_str(), r.title.as_str())))
                .await;
        }
        self.send_message(to, &numbered_menu(text, sections)).await
    }

    async fn send_location_message(
        &self,
        to: &str,
        latitude: f64,
        longitude: f64,
        name: &str,
        address: &str,
    ) -> Result<SendReceipt, AdapterError> {
        self.send_message(to, &location_link(latitude, longitude, name, address))
            .await
    }

    async fn mark_as_read(&self, _message_id: &str) -> Result<(), AdapterError> {
        // Send API marks conversations seen per recipient, not per message.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::ListRow;

    fn adapter() -> MetaAdapter {
        MetaAdapter::new(
            Platform::Instagram,
            reqwest::Client::new(),
            Some("mock://graph".into()),
            "PAGE",
        )
    }

    #[tokio::test]
    async fn buttons_are_quick_replies() {
        let buttons = vec![
            Button { id: "a".into(), title: "Sí".into() },
            Button { id: "b".into(), title: "No".into() },
        ];
        let raw = adapter()
            .send_button_message("IG1", "¿Seguimos?", &buttons)
            .await
            .unwrap()
            .raw
            .unwrap();
        assert_eq!(raw["url"], "mock://graph/me/messages");
        let replies = raw["payload"]["message"]["quick_replies"].as_array().unwrap();
        assert_eq!(replies[0]["payload"], "a");
        assert_eq!(replies[1]["title"], "No");
    }

    #[tokio::test]
    async fn long_lists_fall_back_to_numbered_menu() {
        let rows: Vec<ListRow> = (1..=14)
            .map(|i| ListRow {
                id: format!("r{i}"),
                title: format!("Item {i}"),
                description: None,
            })
            .collect();
        let sections = vec![ListSection { title: "Todo".into(), rows }];
        let raw = adapter()
            .send_list_message("IG1", "Catálogo", "Ver", &sections)
            .await
            .unwrap()
            .raw
            .unwrap();
        let text = raw["payload"]["message"]["text"].as_str().unwrap();
        assert!(text.starts_with("Catálogo\n\n*Todo*\n1. Item 1"));
        assert!(text.ends_with("14. Item 14"));
    }
}
