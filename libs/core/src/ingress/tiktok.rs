use serde_json::{Value, json};

use super::{id_at, name_or_default, str_at, unix_seconds, unknown_message};
use crate::types::{MessageType, Platform, UnifiedMessage, placeholder_text};

/// Normalizes a Business Messaging `receive_message` event.
///
/// The event's `content` is either an object or a JSON-encoded string,
/// depending on API version; both are accepted.
pub fn normalize_tiktok(event: &Value) -> UnifiedMessage {
    let platform = Platform::TikTok;
    let decoded;
    let content = match event.get("content") {
        Some(Value::String(raw)) => {
            decoded = serde_json::from_str::<Value>(raw).unwrap_or(Value::Null);
            &decoded
        }
        Some(other) => other,
        None => &Value::Null,
    };

    let external_id = id_at(content, &["from_user", "id"])
        .or_else(|| id_at(content, &["from"]))
        .unwrap_or_default();
    let name = name_or_default(
        str_at(content, &["from_user", "display_name"])
            .or_else(|| str_at(content, &["from_user", "username"])),
        platform,
    );
    let timestamp = unix_seconds(
        content
            .get("timestamp")
            .or_else(|| event.get("create_time")),
    );
    let kind = str_at(content, &["message", "type"])
        .or_else(|| str_at(content, &["type"]))
        .unwrap_or("unknown");

    let mut out = unknown_message(platform, external_id.clone(), name, kind, timestamp);
    out.message_id = id_at(content, &["message", "message_id"])
        .or_else(|| id_at(content, &["message_id"]));
    out.platform_metadata = Some(json!({
        "conversation_id": id_at(content, &["conversation_id"]),
        "sender_id": external_id,
    }));

    let message = content.get("message").unwrap_or(content);
    match kind {
        "text" => {
            out.message_type = MessageType::Text;
            out.message_text = str_at(message, &["text"])
                .or_else(|| str_at(message, &["text", "body"]))
                .unwrap_or_default()
                .to_string();
        }
        "image" | "video" => {
            out.message_type = MessageType::from_media_kind(kind).unwrap_or(MessageType::Unknown);
            out.media_url = str_at(message, &[kind, "url"]).map(str::to_string);
            out.message_text = placeholder_text(kind);
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_string_encoded_content() {
        let event = json!({
            "event": "receive_message",
            "create_time": 1700000000,
            "content": "{\"conversation_id\":\"cv1\",\"from_user\":{\"id\":\"tt1\",\"display_name\":\"Sol\"},\"message\":{\"type\":\"text\",\"text\":\"hola\"}}"
        });
        let m = normalize_tiktok(&event);
        assert_eq!(m.external_id, "tt1");
        assert_eq!(m.contact_name, "Sol");
        assert_eq!(m.message_text, "hola");
        assert_eq!(m.timestamp.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_content_is_unknown() {
        let m = normalize_tiktok(&json!({"event": "receive_message"}));
        assert_eq!(m.message_type, MessageType::Unknown);
        assert_eq!(m.contact_name, "TikTok User");
    }
}
