//! Web widget channel. There is no push transport: the widget polls the
//! card history, so sends only acknowledge.

use async_trait::async_trait;

use crate::egress::{AdapterError, MediaKind, MessagingAdapter, SendReceipt};
use crate::flow::{Button, ListSection};
use crate::types::Platform;

#[derive(Debug, Default, Clone)]
pub struct WebChatAdapter;

#[async_trait]
impl MessagingAdapter for WebChatAdapter {
    fn platform(&self) -> Platform {
        Platform::WebChat
    }

    async fn send_message(&self, to: &str, _text: &str) -> Result<SendReceipt, AdapterError> {
        tracing::trace!(session = to, "webchat message queued for polling");
        Ok(SendReceipt::default())
    }

    async fn send_media_message(
        &self,
        _to: &str,
        _url: &str,
        _caption: &str,
        _kind: MediaKind,
    ) -> Result<SendReceipt, AdapterError> {
        Ok(SendReceipt::default())
    }

    async fn send_button_message(
        &self,
        _to: &str,
        _text: &str,
        _buttons: &[Button],
    ) -> Result<SendReceipt, AdapterError> {
        Ok(SendReceipt::default())
    }

    async fn send_list_message(
        &self,
        _to: &str,
        _text: &str,
        _button_label: &str,
        _sections: &[ListSection],
    ) -> Result<SendReceipt, AdapterError> {
        Ok(SendReceipt::default())
    }

    async fn send_location_message(
        &self,
        _to: &str,
        _latitude: f64,
        _longitude: f64,
        _name: &str,
        _address: &str,
    ) -> Result<SendReceipt, AdapterError> {
        Ok(SendReceipt::default())
    }

    async fn mark_as_read(&self, _message_id: &str) -> Result<(), AdapterError> {
        Ok(())
    }
}
