use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::flow::{Button, ListSection};
use crate::types::Platform;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("platform rejected request: status={status} body={body}")]
    Rejected { status: u16, body: String },
    #[error("{platform} does not support {feature}")]
    Unsupported {
        platform: Platform,
        feature: &'static str,
    },
    #[error("adapter misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Transport(err.to_string())
    }
}

/// Provider answer to a send; adapters fill in what the platform returns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    pub raw: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }

    /// Parses an explicit media type, else guesses from the URL's extension.
    pub fn detect(explicit: Option<&str>, url: &str) -> Self {
        match explicit.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("image") => return MediaKind::Image,
            Some("video") => return MediaKind::Video,
            Some("audio") => return MediaKind::Audio,
            Some("document") | Some("file") => return MediaKind::Document,
            _ => {}
        }
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        let ext = path.rsplit('.').next().unwrap_or_default();
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" => MediaKind::Image,
            "mp4" | "mov" | "3gp" => MediaKind::Video,
            "mp3" | "ogg" | "aac" | "m4a" | "amr" => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }
}

/// Outbound capability of one platform.
///
/// Platforms without a native widget must degrade: lists become numbered
/// text menus, locations become map links.
#[async_trait]
pub trait MessagingAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt, AdapterError>;

    async fn send_media_message(
        &self,
        to: &str,
        url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<SendReceipt, AdapterError>;

    async fn send_button_message(
        &self,
        to: &str,
        text: &str,
        buttons: &[Button],
    ) -> Result<SendReceipt, AdapterError>;

    async fn send_list_message(
        &self,
        to: &str,
        text: &str,
        button_label: &str,
        sections: &[ListSection],
    ) -> Result<SendReceipt, AdapterError>;

    async fn send_location_message(
        &self,
        to: &str,
        latitude: f64,
        longitude: f64,
        name: &str,
        address: &str,
    ) -> Result<SendReceipt, AdapterError>;

    async fn mark_as_read(&self, message_id: &str) -> Result<(), AdapterError>;
}

/// Renders a list message as a numbered text menu.
///
/// ```
/// use hub_core::{ListRow, ListSection, numbered_menu};
///
/// let sections = vec![ListSection {
///     title: "Menú".into(),
///     rows: vec![
///         ListRow { id: "a".into(), title: "Pizza".into(), description: None },
///         ListRow { id: "b".into(), title: "Pasta".into(), description: Some("fresca".into()) },
///     ],
/// }];
/// assert_eq!(
///     numbered_menu("¿Qué quieres?", &sections),
///     "¿Qué quieres?\n\n*Menú*\n1. Pizza\n2. Pasta - fresca"
/// );
/// ```
pub fn numbered_menu(text: &str, sections: &[ListSection]) -> String {
    let mut out = text.to_string();
    let mut n = 0;
    for section in sections {
        out.push_str("\n\n*");
        out.push_str(&section.title);
        out.push('*');
        for row in &section.rows {
            n += 1;
            out.push_str(&format!("\n{n}. {}", row.title));
            if let Some(desc) = &row.description {
                out.push_str(&format!(" - {desc}"));
            }
        }
    }
    out
}

/// Map link used when a platform has no native location bubble.
pub fn location_link(latitude: f64, longitude: f64, name: &str, address: &str) -> String {
    let mut out = String::new();
    if !name.is_empty() {
        out.push_str(name);
        out.push('\n');
    }
    if !address.is_empty() {
        out.push_str(address);
        out.push('\n');
    }
    out.push_str(&format!(
        "https://maps.google.com/?q={latitude},{longitude}"
    ));
    out
}
