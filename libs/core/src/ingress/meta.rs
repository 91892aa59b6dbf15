use serde_json::{Value, json};

use super::{id_at, name_or_default, str_at, unix_millis, unix_seconds, unknown_message};
use crate::types::{InteractiveReply, MessageType, Platform, UnifiedMessage, placeholder_text};

/// `object: "instagram"` is Instagram; everything else (`page`) is Messenger.
pub fn meta_platform(payload: &Value) -> Platform {
    match str_at(payload, &["object"]) {
        Some("instagram") => Platform::Instagram,
        _ => Platform::Messenger,
    }
}

/// Collects direct messages (`entry[].messaging[]`) and comments
/// (`entry[].changes[]` with `field: "comments"`) from a Graph webhook.
///
/// Echoes of messages the page itself sent are skipped.
pub fn extract_meta(payload: &Value) -> Vec<UnifiedMessage> {
    let platform = meta_platform(payload);
    let mut out = Vec::new();
    let entries = payload.get("entry").and_then(Value::as_array).into_iter().flatten();
    for entry in entries {
        for event in entry.get("messaging").and_then(Value::as_array).into_iter().flatten() {
            let is_echo = event
                .get("message")
                .and_then(|m| m.get("is_echo"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_echo || (event.get("message").is_none() && event.get("postback").is_none()) {
                continue;
            }
            out.push(normalize_meta_message(platform, event));
        }
        for change in entry.get("changes").and_then(Value::as_array).into_iter().flatten() {
            let field = str_at(change, &["field"]).unwrap_or_default();
            if field == "comments" || field == "feed" {
                if let Some(value) = change.get("value") {
                    out.push(normalize_meta_comment(platform, value));
                }
            }
        }
    }
    out
}

/// Normalizes one `messaging[]` event (message, quick reply or postback).
pub fn normalize_meta_message(platform: Platform, event: &Value) -> UnifiedMessage {
    let external_id = id_at(event, &["sender", "id"]).unwrap_or_default();
    let timestamp = unix_millis(event.get("timestamp"));
    let name = name_or_default(None, platform);
    let mut out = unknown_message(platform, external_id.clone(), name, "unknown", timestamp);
    out.platform_metadata = Some(json!({
        "sender_id": external_id,
        "recipient_id": id_at(event, &["recipient", "id"]),
        "kind": "message",
    }));

    if let Some(postback) = event.get("postback") {
        let title = str_at(postback, &["title"]).unwrap_or_default().to_string();
        out.message_id = id_at(postback, &["mid"]);
        out.message_type = MessageType::Text;
        out.interactive_data = Some(InteractiveReply {
            kind: "postback".into(),
            id: str_at(postback, &["payload"]).unwrap_or(&title).to_string(),
            title: title.clone(),
        });
        out.message_text = title;
        return out;
    }

    let Some(message) = event.get("message") else {
        return out;
    };
    out.message_id = id_at(message, &["mid"]);

    if let Some(text) = str_at(message, &["text"]) {
        out.message_type = MessageType::Text;
        out.message_text = text.to_string();
        if let Some(payload) = str_at(message, &["quick_reply", "payload"]) {
            out.interactive_data = Some(InteractiveReply {
                kind: "quick_reply".into(),
                id: payload.to_string(),
                title: text.to_string(),
            });
        }
        return out;
    }

    if let Some(attachment) = message
        .get("attachments")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    {
        let kind = str_at(attachment, &["type"]).unwrap_or("unknown");
        out.media_url = str_at(attachment, &["payload", "url"]).map(str::to_string);
        match MessageType::from_media_kind(kind) {
            Some(message_type) => {
                out.message_type = message_type;
                out.message_text = placeholder_text(kind);
            }
            None => out.message_text = placeholder_text(kind),
        }
    }
    out
}

/// Normalizes a comment change value; comments carry the author's username.
pub fn normalize_meta_comment(platform: Platform, value: &Value) -> UnifiedMessage {
    let external_id = id_at(value, &["from", "id"]).unwrap_or_default();
    let name = name_or_default(
        str_at(value, &["from", "username"]).or_else(|| str_at(value, &["from", "name"])),
        platform,
    );
    let timestamp = unix_seconds(value.get("created_time"));
    let mut out = unknown_message(platform, external_id.clone(), name, "comment", timestamp);
    out.message_type = MessageType::Comment;
    out.message_id = id_at(value, &["id"]).or_else(|| id_at(value, &["comment_id"]));
    out.message_text = str_at(value, &["text"])
        .or_else(|| str_at(value, &["message"]))
        .unwrap_or_default()
        .to_string();
    out.platform_metadata = Some(json!({
        "sender_id": external_id,
        "media_id": id_at(value, &["media", "id"]).or_else(|| id_at(value, &["post_id"])),
        "kind": "comment",
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_direct_message() {
        let body = json!({"object": "instagram", "entry": [{"messaging": [{
            "sender": {"id": "IGSID1"}, "recipient": {"id": "PAGE"},
            "timestamp": 1700000000123i64,
            "message": {"mid": "m1", "text": "hola"}
        }]}]});
        let msgs = extract_meta(&body);
        assert_eq!(msgs.len(), 1);
        let m = &msgs[0];
        assert_eq!(m.source_platform, Platform::Instagram);
        assert_eq!(m.external_id, "IGSID1");
        assert_eq!(m.contact_name, "Instagram User");
        assert_eq!(m.message_type, MessageType::Text);
        assert_eq!(m.timestamp.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn comment_is_distinguished_from_message() {
        let body = json!({"object": "instagram", "entry": [{"changes": [{
            "field": "comments",
            "value": {"id": "c1", "text": "precio?", "from": {"id": "U9", "username": "maria"}}
        }]}]});
        let m = &extract_meta(&body)[0];
        assert_eq!(m.message_type, MessageType::Comment);
        assert_eq!(m.contact_name, "maria");
        assert_eq!(m.platform_metadata.as_ref().unwrap()["kind"], "comment");
    }

    #[test]
    fn echoes_are_skipped() {
        let body = json!({"object": "page", "entry": [{"messaging": [{
            "sender": {"id": "PAGE"}, "message": {"mid": "m", "text": "x", "is_echo": true}
        }]}]});
        assert!(extract_meta(&body).is_empty());
    }

    #[test]
    fn quick_reply_keeps_payload() {
        let m = normalize_meta_message(
            Platform::Messenger,
            &json!({"sender": {"id": "P1"}, "message": {"text": "Sí", "quick_reply": {"payload": "a"}}}),
        );
        assert_eq!(m.message_text, "Sí");
        assert_eq!(m.interactive_data.unwrap().id, "a");
    }

    #[test]
    fn attachment_without_known_type_is_unknown() {
        let m = normalize_meta_message(
            Platform::Messenger,
            &json!({"sender": {"id": "P1"}, "message": {"attachments": [{"type": "fallback"}]}}),
        );
        assert_eq!(m.message_type, MessageType::Unknown);
        assert_eq!(m.message_text, "[FALLBACK]");
    }
}
