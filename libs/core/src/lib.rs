//! Shared model of the messaging hub.
//!
//! Holds the normalized inbound message, the conversation card and bot flow
//! documents, the per-platform normalizers that build [`UnifiedMessage`]s from
//! webhook bodies, and the [`MessagingAdapter`] contract with its wire clients.
pub mod adapter_registry;
pub mod card;
pub mod egress;
pub mod flow;
pub mod ingress;
pub mod platforms;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod types;
pub mod validate;

pub use adapter_registry::*;
pub use card::*;
pub use egress::*;
pub use flow::*;
pub use ingress::*;
pub use platforms::{MetaAdapter, TelegramAdapter, WebChatAdapter, WhatsAppAdapter};
#[cfg(any(test, feature = "testkit"))]
pub use testkit::{AdapterCall, RecordingAdapter};
pub use types::*;
pub use validate::*;
