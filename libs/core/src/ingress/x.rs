use serde_json::{Value, json};

use super::{id_at, name_or_default, str_at, unix_millis, unknown_message};
use crate::types::{MessageType, Platform, UnifiedMessage};

/// Direct messages from an Account Activity webhook (`direct_message_events[]`).
///
/// Events sent by the subscribed account itself (`for_user_id`) are skipped;
/// display names come from the `users` map that accompanies the events.
pub fn extract_x(payload: &Value) -> Vec<UnifiedMessage> {
    let platform = Platform::X;
    let own_id = id_at(payload, &["for_user_id"]);
    let users = payload.get("users");
    let events = payload
        .get("direct_message_events")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();

    let mut out = Vec::new();
    for event in events {
        if str_at(event, &["type"]) != Some("message_create") {
            continue;
        }
        let create = event.get("message_create").unwrap_or(&Value::Null);
        let sender = id_at(create, &["sender_id"]).unwrap_or_default();
        if own_id.as_deref() == Some(sender.as_str()) {
            continue;
        }
        let user = users.and_then(|u| u.get(&sender));
        let name = name_or_default(
            user.and_then(|u| str_at(u, &["name"]))
                .or_else(|| user.and_then(|u| str_at(u, &["screen_name"]))),
            platform,
        );
        let timestamp = unix_millis(event.get("created_timestamp"));
        let mut msg = unknown_message(platform, sender.clone(), name, "unknown", timestamp);
        msg.message_id = id_at(event, &["id"]);
        msg.platform_metadata = Some(json!({
            "sender_id": sender,
            "recipient_id": id_at(create, &["target", "recipient_id"]),
            "screen_name": user.and_then(|u| str_at(u, &["screen_name"])),
        }));

        let data = create.get("message_data").unwrap_or(&Value::Null);
        let text = str_at(data, &["text"]).unwrap_or_default();
        match data.get("attachment").and_then(|a| a.get("media")) {
            Some(media) => {
                let kind = str_at(media, &["type"]).unwrap_or("image");
                msg.message_type = match kind {
                    "photo" | "animated_gif" => MessageType::Image,
                    _ => MessageType::from_media_kind(kind).unwrap_or(MessageType::Unknown),
                };
                msg.media_url = str_at(media, &["media_url_https"]).map(str::to_string);
                if !text.is_empty() {
                    msg.message_text = text.to_string();
                }
            }
            None if data.get("text").is_some() => {
                msg.message_type = MessageType::Text;
                msg.message_text = text.to_string();
            }
            None => {}
        }
        out.push(msg);
    }
    out
}
