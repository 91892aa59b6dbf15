//! Pure mapping from raw platform webhook payloads to [`UnifiedMessage`]s.
//!
//! Every normalizer is total: malformed input degrades to an `unknown`
//! message with a `[TYPE]` placeholder instead of failing. Batch extractors
//! walk a full webhook body and skip entries that carry no message at all.

mod meta;
mod telegram;
mod tiktok;
mod webchat;
mod whatsapp;
mod x;

pub use meta::{extract_meta, meta_platform, normalize_meta_comment, normalize_meta_message};
pub use telegram::normalize_telegram;
pub use tiktok::normalize_tiktok;
pub use webchat::normalize_webchat;
pub use whatsapp::{extract_whatsapp, extract_whatsapp_read_receipts, normalize_whatsapp};
pub use x::extract_x;

use serde_json::Value;
use time::OffsetDateTime;

use crate::types::{MessageType, Platform, UnifiedMessage, placeholder_text};

pub(crate) fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str()
}

/// Reads an id that platforms send either as a string or a number.
pub(crate) fn id_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key)?;
    }
    match cur {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unix seconds (number or numeric string); ingestion time when absent or invalid.
pub(crate) fn unix_seconds(value: Option<&Value>) -> OffsetDateTime {
    value
        .and_then(int_of)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

/// Unix milliseconds (number or numeric string); ingestion time when absent or invalid.
pub(crate) fn unix_millis(value: Option<&Value>) -> OffsetDateTime {
    value
        .and_then(int_of)
        .and_then(|ms| OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

/// Fallback record for payloads the normalizer cannot interpret.
pub(crate) fn unknown_message(
    platform: Platform,
    external_id: String,
    contact_name: String,
    kind: &str,
    timestamp: OffsetDateTime,
) -> UnifiedMessage {
    UnifiedMessage {
        source_platform: platform,
        external_id,
        contact_name,
        message_text: placeholder_text(kind),
        message_type: MessageType::Unknown,
        timestamp,
        message_id: None,
        media_url: None,
        platform_metadata: None,
        interactive_data: None,
        location: None,
    }
}

pub(crate) fn name_or_default(name: Option<&str>, platform: Platform) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| platform.default_contact_name().to_string())
}
