use serde_json::{Value, json};
use time::OffsetDateTime;

use super::{id_at, name_or_default, str_at, unknown_message};
use crate::types::{MessageType, Platform, UnifiedMessage};

/// Normalizes a widget post. The client-supplied `sessionId` is the identity.
///
/// ```
/// use hub_core::{MessageType, normalize_webchat};
/// use serde_json::json;
///
/// let m = normalize_webchat(&json!({"sessionId": "s-1", "text": "hola"}));
/// assert_eq!(m.external_id, "s-1");
/// assert_eq!(m.message_type, MessageType::Text);
/// ```
pub fn normalize_webchat(body: &Value) -> UnifiedMessage {
    let platform = Platform::WebChat;
    let external_id = id_at(body, &["sessionId"]).unwrap_or_default();
    let name = name_or_default(str_at(body, &["name"]), platform);
    let timestamp = str_at(body, &["timestamp"])
        .and_then(|t| OffsetDateTime::parse(t, &time::format_description::well_known::Rfc3339).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);

    let mut out = unknown_message(platform, external_id.clone(), name, "unknown", timestamp);
    out.message_id = id_at(body, &["messageId"]);
    out.platform_metadata = Some(json!({
        "session_id": external_id,
        "page_url": str_at(body, &["pageUrl"]),
    }));

    if let Some(text) = str_at(body, &["text"]) {
        out.message_type = MessageType::Text;
        out.message_text = text.to_string();
    }
    out
}
