use serde::Deserialize;
use serde_json::{Value, json};

use super::{name_or_default, unix_seconds, unknown_message};
use crate::types::{
    InteractiveReply, Location, MessageType, Platform, UnifiedMessage, placeholder_text,
};

#[derive(Debug, Deserialize, Default)]
struct TelegramUpdate {
    #[serde(default)]
    message: Option<TelegramMessage>,
    #[serde(default)]
    edited_message: Option<TelegramMessage>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramMessage {
    #[serde(default)]
    message_id: Option<i64>,
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    chat: Option<TelegramChat>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    photo: Vec<FileRef>,
    #[serde(default)]
    video: Option<FileRef>,
    #[serde(default)]
    voice: Option<FileRef>,
    #[serde(default)]
    audio: Option<FileRef>,
    #[serde(default)]
    document: Option<FileRef>,
    #[serde(default)]
    sticker: Option<FileRef>,
    #[serde(default)]
    location: Option<TelegramLocation>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    from: TelegramUser,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

/// First + last name, else username, else the platform default.
fn display_name(user: Option<&TelegramUser>) -> String {
    let joined = user.map(|u| {
        [u.first_name.as_deref(), u.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    });
    let name = joined
        .filter(|n| !n.is_empty())
        .or_else(|| user.and_then(|u| u.username.clone()));
    name_or_default(name.as_deref(), Platform::Telegram)
}

/// Normalizes a Bot API `Update`. Inline keyboard presses become text replies.
///
/// ```
/// use hub_core::normalize_telegram;
/// use serde_json::json;
///
/// let m = normalize_telegram(&json!({"update_id": 1, "message": {
///     "message_id": 7, "date": 1700000000,
///     "from": {"id": 99, "first_name": "Ana", "last_name": "Ruiz"},
///     "chat": {"id": 99}, "text": "hola"
/// }}));
/// assert_eq!(m.external_id, "99");
/// assert_eq!(m.contact_name, "Ana Ruiz");
/// ```
pub fn normalize_telegram(update: &Value) -> UnifiedMessage {
    let platform = Platform::Telegram;
    let parsed: TelegramUpdate = match serde_json::from_value(update.clone()) {
        Ok(u) => u,
        Err(err) => {
            tracing::debug!(error = %err, "unparseable telegram update");
            TelegramUpdate::default()
        }
    };

    if let Some(query) = parsed.callback_query {
        let chat_id = query.message.as_ref().and_then(|m| m.chat.as_ref()).map(|c| c.id);
        let data = query.data.unwrap_or_default();
        let mut out = unknown_message(
            platform,
            query.from.id.to_string(),
            display_name(Some(&query.from)),
            "callback",
            unix_seconds(None),
        );
        out.message_type = MessageType::Text;
        out.message_text = data.clone();
        out.interactive_data = Some(InteractiveReply {
            kind: "callback_query".into(),
            id: data.clone(),
            title: data,
        });
        out.platform_metadata = Some(json!({
            "chat_id": chat_id,
            "username": query.from.username,
        }));
        return out;
    }

    let Some(msg) = parsed.message.or(parsed.edited_message) else {
        return unknown_message(
            platform,
            String::new(),
            display_name(None),
            "unknown",
            unix_seconds(None),
        );
    };

    let external_id = msg
        .from
        .as_ref()
        .map(|u| u.id)
        .or_else(|| msg.chat.as_ref().map(|c| c.id))
        .map(|id| id.to_string())
        .unwrap_or_default();
    let timestamp = unix_seconds(msg.date.map(Value::from).as_ref());
    let mut out = unknown_message(
        platform,
        external_id,
        display_name(msg.from.as_ref()),
        "unknown",
        timestamp,
    );
    out.message_id = msg.message_id.map(|id| id.to_string());
    out.platform_metadata = Some(json!({
        "chat_id": msg.chat.as_ref().map(|c| c.id),
        "username": msg.from.as_ref().and_then(|u| u.username.clone()),
    }));

    let caption = msg.caption.clone().filter(|c| !c.trim().is_empty());
    let media = [
        ("photo", msg.photo.last()),
        ("video", msg.video.as_ref()),
        ("voice", msg.voice.as_ref()),
        ("audio", msg.audio.as_ref()),
        ("document", msg.document.as_ref()),
        ("sticker", msg.sticker.as_ref()),
    ]
    .into_iter()
    .find_map(|(kind, file)| file.map(|f| (kind, f)));

    if let Some(text) = msg.text {
        out.message_type = MessageType::Text;
        out.message_text = text;
    } else if let Some((kind, file)) = media {
        out.message_type = MessageType::from_media_kind(kind).unwrap_or(MessageType::Unknown);
        out.media_url = Some(file.file_id.clone());
        out.message_text = caption.unwrap_or_else(|| placeholder_text(kind));
    } else if let Some(loc) = msg.location {
        out.message_type = MessageType::Location;
        out.message_text = placeholder_text("location");
        out.location = Some(Location {
            latitude: loc.latitude,
            longitude: loc.longitude,
            name: None,
            address: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_falls_back_to_username_then_default() {
        let m = normalize_telegram(&json!({"message": {
            "message_id": 1, "date": 1700000000,
            "from": {"id": 5, "username": "cami"}, "chat": {"id": 5}, "text": "hi"
        }}));
        assert_eq!(m.contact_name, "cami");

        let m = normalize_telegram(&json!({"message": {
            "message_id": 1, "date": 1700000000,
            "from": {"id": 5, "first_name": " "}, "chat": {"id": 5}, "text": "hi"
        }}));
        assert_eq!(m.contact_name, "Telegram User");
    }

    #[test]
    fn photo_uses_largest_size_and_caption() {
        let m = normalize_telegram(&json!({"message": {
            "message_id": 2, "date": 1700000000, "from": {"id": 5}, "chat": {"id": 5},
            "photo": [{"file_id": "small"}, {"file_id": "big"}], "caption": "mira"
        }}));
        assert_eq!(m.message_type, MessageType::Image);
        assert_eq!(m.media_url.as_deref(), Some("big"));
        assert_eq!(m.message_text, "mira");
    }

    #[test]
    fn callback_query_becomes_text() {
        let m = normalize_telegram(&json!({"callback_query": {
            "id": "cb", "from": {"id": 8, "first_name": "Leo"}, "data": "b",
            "message": {"message_id": 3, "chat": {"id": 8}}
        }}));
        assert_eq!(m.message_type, MessageType::Text);
        assert_eq!(m.message_text, "b");
        assert_eq!(m.external_id, "8");
    }

    #[test]
    fn malformed_update_is_unknown() {
        let m = normalize_telegram(&json!({"message": "broken"}));
        assert_eq!(m.message_type, MessageType::Unknown);
        assert_eq!(m.message_text, "[UNKNOWN]");
    }
}
