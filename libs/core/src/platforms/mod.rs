//! Wire clients implementing [`MessagingAdapter`](crate::MessagingAdapter) per platform.
//!
//! An `api_base` starting with `mock://` short-circuits the HTTP call and
//! returns the request that would have been sent in [`SendReceipt::raw`].

pub mod meta;
pub mod telegram;
pub mod webchat;
pub mod whatsapp;

pub use meta::MetaAdapter;
pub use telegram::TelegramAdapter;
pub use webchat::WebChatAdapter;
pub use whatsapp::WhatsAppAdapter;

use serde_json::{Value, json};

use crate::egress::{AdapterError, SendReceipt};

pub(crate) fn is_mock(api_base: &str) -> bool {
    api_base.starts_with("mock://")
}

/// POSTs `payload` and pulls the provider message id from `id_pointer`.
pub(crate) async fn post_json(
    http: &reqwest::Client,
    api_base: &str,
    url: String,
    bearer: Option<&str>,
    payload: Value,
    id_pointer: &str,
) -> Result<SendReceipt, AdapterError> {
    if is_mock(api_base) {
        return Ok(SendReceipt {
            message_id: Some("mock".into()),
            raw: Some(json!({ "url": url, "payload": payload })),
        });
    }

    let mut request = http.post(&url).json(&payload);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(AdapterError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let raw: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let message_id = raw.pointer(id_pointer).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    Ok(SendReceipt {
        message_id,
        raw: Some(raw),
    })
}

/// Cuts `text` to at most `max` characters; platforms reject longer labels.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
