use serde_json::{Value, json};

use super::{id_at, name_or_default, str_at, unix_seconds, unknown_message};
use crate::types::{
    InteractiveReply, Location, MessageType, Platform, UnifiedMessage, placeholder_text,
};

const MEDIA_TYPES: [&str; 5] = ["image", "video", "audio", "document", "sticker"];

/// Walks `entry[].changes[].value.messages[]` of a Cloud API webhook.
///
/// ```
/// use hub_core::{MessageType, extract_whatsapp};
/// use serde_json::json;
///
/// let body = json!({"entry": [{"changes": [{"value": {
///     "contacts": [{"wa_id": "5215512345678", "profile": {"name": "Ana"}}],
///     "messages": [{"from": "5215512345678", "id": "wamid.1",
///                   "timestamp": "1700000000", "type": "text", "text": {"body": "Hola"}}]
/// }}]}]});
/// let messages = extract_whatsapp(&body);
/// assert_eq!(messages[0].contact_name, "Ana");
/// assert_eq!(messages[0].message_type, MessageType::Text);
/// ```
pub fn extract_whatsapp(payload: &Value) -> Vec<UnifiedMessage> {
    let mut out = Vec::new();
    for value in change_values(payload) {
        let Some(messages) = value.get("messages").and_then(Value::as_array) else {
            continue;
        };
        let contacts = value.get("contacts").and_then(Value::as_array);
        for message in messages {
            let from = str_at(message, &["from"]);
            let name = contacts.and_then(|contacts| {
                contacts
                    .iter()
                    .find(|c| str_at(c, &["wa_id"]) == from)
                    .or_else(|| contacts.first())
                    .and_then(|c| str_at(c, &["profile", "name"]))
            });
            out.push(normalize_whatsapp(message, name, value.get("metadata")));
        }
    }
    out
}

/// Recipient ids of `statuses[]` entries reporting a `read` receipt.
pub fn extract_whatsapp_read_receipts(payload: &Value) -> Vec<String> {
    change_values(payload)
        .filter_map(|value| value.get("statuses").and_then(Value::as_array))
        .flatten()
        .filter(|status| str_at(status, &["status"]) == Some("read"))
        .filter_map(|status| id_at(status, &["recipient_id"]))
        .collect()
}

fn change_values(payload: &Value) -> impl Iterator<Item = &Value> {
    payload
        .get("entry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("changes").and_then(Value::as_array))
        .flatten()
        .filter_map(|change| change.get("value"))
}

/// Normalizes one Cloud API message object.
pub fn normalize_whatsapp(
    message: &Value,
    contact_name: Option<&str>,
    metadata: Option<&Value>,
) -> UnifiedMessage {
    let platform = Platform::WhatsApp;
    let external_id = id_at(message, &["from"]).unwrap_or_default();
    let contact_name = name_or_default(contact_name, platform);
    let timestamp = unix_seconds(message.get("timestamp"));
    let kind = str_at(message, &["type"]).unwrap_or("unknown");

    let mut out = unknown_message(platform, external_id.clone(), contact_name, kind, timestamp);
    out.message_id = id_at(message, &["id"]);
    out.platform_metadata = Some(json!({
        "wa_id": external_id,
        "phone_number_id": metadata.and_then(|m| str_at(m, &["phone_number_id"])),
        "display_phone_number": metadata.and_then(|m| str_at(m, &["display_phone_number"])),
    }));

    match kind {
        "text" => {
            out.message_type = MessageType::Text;
            out.message_text = str_at(message, &["text", "body"]).unwrap_or_default().to_string();
        }
        "interactive" => {
            let interactive = message.get("interactive").unwrap_or(&Value::Null);
            let reply_kind = str_at(interactive, &["type"]).unwrap_or_default();
            if let Some(reply) = interactive.get(reply_kind) {
                let title = str_at(reply, &["title"]).unwrap_or_default().to_string();
                out.message_type = MessageType::Text;
                out.message_text = title.clone();
                out.interactive_data = Some(InteractiveReply {
                    kind: reply_kind.to_string(),
                    id: id_at(reply, &["id"]).unwrap_or_default(),
                    title,
                });
            }
        }
        "button" => {
            let text = str_at(message, &["button", "text"]).unwrap_or_default().to_string();
            out.message_type = MessageType::Text;
            out.interactive_data = Some(InteractiveReply {
                kind: "button".into(),
                id: str_at(message, &["button", "payload"])
                    .unwrap_or(&text)
                    .to_string(),
                title: text.clone(),
            });
            out.message_text = text;
        }
        "location" => {
            let loc = message.get("location").unwrap_or(&Value::Null);
            let lat = loc.get("latitude").and_then(Value::as_f64);
            let lng = loc.get("longitude").and_then(Value::as_f64);
            if let (Some(latitude), Some(longitude)) = (lat, lng) {
                let name = str_at(loc, &["name"]).map(str::to_string);
                out.message_type = MessageType::Location;
                out.message_text = name.clone().unwrap_or_else(|| placeholder_text(kind));
                out.location = Some(Location {
                    latitude,
                    longitude,
                    name,
                    address: str_at(loc, &["address"]).map(str::to_string),
                });
            }
        }
        media if MEDIA_TYPES.contains(&media) => {
            let body = message.get(media).unwrap_or(&Value::Null);
            if let Some(message_type) = MessageType::from_media_kind(media) {
                out.message_type = message_type;
            }
            out.media_url = str_at(body, &["link"])
                .or_else(|| str_at(body, &["id"]))
                .map(str::to_string);
            out.message_text = str_at(body, &["caption"])
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| placeholder_text(media));
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(message: Value) -> Value {
        json!({"entry": [{"changes": [{"value": {
            "metadata": {"phone_number_id": "PN1", "display_phone_number": "+1 555"},
            "contacts": [{"wa_id": "5215500000000", "profile": {"name": "Luis"}}],
            "messages": [message]
        }}]}]})
    }

    #[test]
    fn text_message_uses_unix_seconds() {
        let msgs = extract_whatsapp(&wrap(json!({
            "from": "5215500000000", "id": "wamid.A", "timestamp": "1700000000",
            "type": "text", "text": {"body": "Hola"}
        })));
        assert_eq!(msgs.len(), 1);
        let m = &msgs[0];
        assert_eq!(m.external_id, "5215500000000");
        assert_eq!(m.message_text, "Hola");
        assert_eq!(m.timestamp.unix_timestamp(), 1_700_000_000);
        assert_eq!(m.message_id.as_deref(), Some("wamid.A"));
        assert_eq!(m.platform_metadata.as_ref().unwrap()["phone_number_id"], "PN1");
    }

    #[test]
    fn button_reply_is_text_with_interactive_data() {
        let msgs = extract_whatsapp(&wrap(json!({
            "from": "5215500000000", "timestamp": "1700000000", "type": "interactive",
            "interactive": {"type": "button_reply", "button_reply": {"id": "a", "title": "Sí"}}
        })));
        let m = &msgs[0];
        assert_eq!(m.message_type, MessageType::Text);
        assert_eq!(m.message_text, "Sí");
        assert_eq!(m.interactive_data.as_ref().unwrap().id, "a");
    }

    #[test]
    fn image_without_caption_gets_placeholder() {
        let msgs = extract_whatsapp(&wrap(json!({
            "from": "5215500000000", "timestamp": "1700000000", "type": "image",
            "image": {"id": "MEDIA1", "mime_type": "image/jpeg"}
        })));
        let m = &msgs[0];
        assert_eq!(m.message_type, MessageType::Image);
        assert_eq!(m.message_text, "[IMAGE]");
        assert_eq!(m.media_url.as_deref(), Some("MEDIA1"));
    }

    #[test]
    fn unsupported_type_degrades_to_unknown() {
        let msgs = extract_whatsapp(&wrap(json!({
            "from": "5215500000000", "timestamp": "1700000000", "type": "reaction",
            "reaction": {"emoji": "👍"}
        })));
        assert_eq!(msgs[0].message_type, MessageType::Unknown);
        assert_eq!(msgs[0].message_text, "[REACTION]");
    }

    #[test]
    fn garbage_never_panics() {
        assert!(extract_whatsapp(&json!("nope")).is_empty());
        let m = normalize_whatsapp(&json!(42), None, None);
        assert_eq!(m.message_type, MessageType::Unknown);
        assert_eq!(m.contact_name, "WhatsApp User");
        assert!(m.external_id.is_empty());
    }

    #[test]
    fn read_receipts_are_collected() {
        let body = json!({"entry": [{"changes": [{"value": {"statuses": [
            {"status": "delivered", "recipient_id": "1"},
            {"status": "read", "recipient_id": "2"}
        ]}}]}]});
        assert_eq!(extract_whatsapp_read_receipts(&body), vec!["2".to_string()]);
    }
}
