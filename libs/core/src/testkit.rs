//! In-process doubles for exercising the bot engine and webhook handlers.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::egress::{AdapterError, MediaKind, MessagingAdapter, SendReceipt};
use crate::flow::{Button, ListSection};
use crate::types::Platform;

/// One observed adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    Text {
        to: String,
        text: String,
    },
    Media {
        to: String,
        url: String,
        caption: String,
        kind: MediaKind,
    },
    Buttons {
        to: String,
        text: String,
        buttons: Vec<Button>,
    },
    List {
        to: String,
        text: String,
        button_label: String,
        sections: Vec<ListSection>,
    },
    Location {
        to: String,
        latitude: f64,
        longitude: f64,
        name: String,
        address: String,
    },
    MarkRead {
        message_id: String,
    },
}

impl AdapterCall {
    /// Body text for the message-bearing variants.
    pub fn text(&self) -> Option<&str> {
        match self {
            AdapterCall::Text { text, .. }
            | AdapterCall::Buttons { text, .. }
            | AdapterCall::List { text, .. } => Some(text),
            AdapterCall::Media { caption, .. } => Some(caption),
            _ => None,
        }
    }
}

/// Adapter that records every call instead of talking to a platform.
pub struct RecordingAdapter {
    platform: Platform,
    calls: Mutex<Vec<AdapterCall>>,
    fail_sends: AtomicBool,
    fail_read: AtomicBool,
}

impl RecordingAdapter {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            calls: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
        }
    }

    /// Subsequent sends return [`AdapterError::Transport`] (nothing is recorded).
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Subsequent read receipts fail (the attempt is still recorded).
    pub fn fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Texts of every message-bearing call, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.text().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: AdapterCall) -> Result<SendReceipt, AdapterError> {
        if self.fail_sends.load(Ordering::SeqCst) && !matches!(call, AdapterCall::MarkRead { .. })
        {
            return Err(AdapterError::Transport("recording adapter told to fail".into()));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(SendReceipt {
            message_id: Some(format!("rec-{}", uuid::Uuid::new_v4())),
            raw: None,
        })
    }
}

#[async_trait]
impl MessagingAdapter for RecordingAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<SendReceipt, AdapterError> {
        self.record(AdapterCall::Text {
            to: to.into(),
            text: text.into(),
        })
    }

    async fn send_media_message(
        &self,
        to: &str,
        url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<SendReceipt, AdapterError> {
        self.record(AdapterCall::Media {
            to: to.into(),
            url: url.into(),
            caption: caption.into(),
            kind,
        })
    }

    async fn send_button_message(
        &self,
        to: &str,
        text: &str,
        buttons: &[Button],
    ) -> Result<SendReceipt, AdapterError> {
        self.record(AdapterCall::Buttons {
            to: to.into(),
            text: text.into(),
            buttons: buttons.to_vec(),
        })
    }

    async fn send_list_message(
        &self,
        to: &str,
        text: &str,
        button_label: &str,
        sections: &[ListSection],
    ) -> Result<SendReceipt, AdapterError> {
        self.record(AdapterCall::List {
            to: to.into(),
            text: text.into(),
            button_label: button_label.into(),
            sections: sections.to_vec(),
        })
    }

    async fn send_location_message(
        &self,
        to: &str,
        latitude: f64,
        longitude: f64,
        name: &str,
        address: &str,
    ) -> Result<SendReceipt, AdapterError> {
        self.record(AdapterCall::Location {
            to: to.into(),
            latitude,
            longitude,
            name: name.into(),
            address: address.into(),
        })
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<(), AdapterError> {
        self.record(AdapterCall::MarkRead {
            message_id: message_id.into(),
        })?;
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(AdapterError::Rejected {
                status: 500,
                body: "read receipt failed".into(),
            });
        }
        Ok(())
    }
}
