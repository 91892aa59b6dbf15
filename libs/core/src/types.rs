use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Messaging platforms the hub ingests from and replies through.
///
/// ```
/// use hub_core::Platform;
///
/// let p: Platform = "WhatsApp".parse().unwrap();
/// assert_eq!(p.as_str(), "whatsapp");
/// assert!(p.is_phone_oriented());
/// ```
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WhatsApp,
    Sms,
    Instagram,
    Messenger,
    Telegram,
    X,
    TikTok,
    WebChat,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::WhatsApp,
        Platform::Sms,
        Platform::Instagram,
        Platform::Messenger,
        Platform::Telegram,
        Platform::X,
        Platform::TikTok,
        Platform::WebChat,
    ];

    /// Returns the lowercase identifier used in routes, identity maps and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::WhatsApp => "whatsapp",
            Platform::Sms => "sms",
            Platform::Instagram => "instagram",
            Platform::Messenger => "messenger",
            Platform::Telegram => "telegram",
            Platform::X => "x",
            Platform::TikTok => "tiktok",
            Platform::WebChat => "webchat",
        }
    }

    /// Platforms whose external id is a phone number.
    pub fn is_phone_oriented(&self) -> bool {
        matches!(self, Platform::WhatsApp | Platform::Sms)
    }

    /// Display name used when the payload carries no usable contact name.
    pub fn default_contact_name(&self) -> &'static str {
        match self {
            Platform::WhatsApp => "WhatsApp User",
            Platform::Sms => "SMS User",
            Platform::Instagram => "Instagram User",
            Platform::Messenger => "Messenger User",
            Platform::Telegram => "Telegram User",
            Platform::X => "X User",
            Platform::TikTok => "TikTok User",
            Platform::WebChat => "Web Visitor",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| format!("unknown platform `{value}`"))
    }
}

/// Kind of content carried by an inbound message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Interactive,
    Button,
    Comment,
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::Document => "document",
            MessageType::Sticker => "sticker",
            MessageType::Location => "location",
            MessageType::Interactive => "interactive",
            MessageType::Button => "button",
            MessageType::Comment => "comment",
            MessageType::Unknown => "unknown",
        }
    }

    /// Maps a platform media kind (`image`, `video`, ...) onto a message type.
    pub fn from_media_kind(kind: &str) -> Option<Self> {
        match kind {
            "image" | "photo" => Some(MessageType::Image),
            "video" => Some(MessageType::Video),
            "audio" | "voice" => Some(MessageType::Audio),
            "document" | "file" => Some(MessageType::Document),
            "sticker" => Some(MessageType::Sticker),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Reply to an interactive element (button, list row, quick reply, postback).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractiveReply {
    pub kind: String,
    pub id: String,
    pub title: String,
}

/// Normalized inbound message, independent of the platform it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedMessage {
    pub source_platform: Platform,
    pub external_id: String,
    pub contact_name: String,
    pub message_text: String,
    pub message_type: MessageType,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive_data: Option<InteractiveReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl UnifiedMessage {
    /// Minimal text message; normalizers fill in the optional parts.
    pub fn text(
        platform: Platform,
        external_id: impl Into<String>,
        contact_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_platform: platform,
            external_id: external_id.into(),
            contact_name: contact_name.into(),
            message_text: text.into(),
            message_type: MessageType::Text,
            timestamp: OffsetDateTime::now_utc(),
            message_id: None,
            media_url: None,
            platform_metadata: None,
            interactive_data: None,
            location: None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.message_type == MessageType::Text
    }
}

/// Strips everything but ASCII digits from a phone-like identifier.
///
/// ```
/// assert_eq!(hub_core::normalize_phone("+52 (55) 1234-5678"), "525512345678");
/// ```
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Placeholder text used when a message type carries no text body.
pub fn placeholder_text(kind: &str) -> String {
    format!("[{}]", kind.to_uppercase())
}
