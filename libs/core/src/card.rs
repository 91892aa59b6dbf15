use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

use crate::types::{MessageType, Platform};

/// Kanban lane a card is filed into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lane {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Author of a [`MessageEntry`].
///
/// On the wire the contact is `"user"` and both operators and the bot are
/// `"agent"`; the optional `actor` object keeps the distinction.
///
/// ```
/// use hub_core::{MessageEntry, MessageType, Sender};
///
/// let entry = MessageEntry::new(Sender::Bot(Some("bot-1".into())), "Hola", MessageType::Text);
/// let json = serde_json::to_value(&entry).unwrap();
/// assert_eq!(json["sender"], "agent");
/// assert_eq!(json["actor"]["kind"], "bot");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SenderWire", from = "SenderWire")]
pub enum Sender {
    Contact,
    Agent(Option<String>),
    Bot(Option<String>),
}

impl Sender {
    pub fn is_contact(&self) -> bool {
        matches!(self, Sender::Contact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireRole {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActorKind {
    Agent,
    Bot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Actor {
    kind: ActorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SenderWire {
    sender: WireRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<Actor>,
}

impl From<Sender> for SenderWire {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::Contact => SenderWire {
                sender: WireRole::User,
                actor: None,
            },
            Sender::Agent(id) => SenderWire {
                sender: WireRole::Agent,
                actor: Some(Actor {
                    kind: ActorKind::Agent,
                    id,
                }),
            },
            Sender::Bot(id) => SenderWire {
                sender: WireRole::Agent,
                actor: Some(Actor {
                    kind: ActorKind::Bot,
                    id,
                }),
            },
        }
    }
}

impl From<SenderWire> for Sender {
    fn from(wire: SenderWire) -> Self {
        match (wire.sender, wire.actor) {
            (WireRole::User, _) => Sender::Contact,
            (WireRole::Agent, Some(Actor {
                kind: ActorKind::Bot,
                id,
            })) => Sender::Bot(id),
            (WireRole::Agent, Some(actor)) => Sender::Agent(actor.id),
            (WireRole::Agent, None) => Sender::Agent(None),
        }
    }
}

/// One line of a card's conversation history. Entries are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    #[serde(flatten)]
    pub sender: Sender,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(
        default,
        rename = "media_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_message_id: Option<String>,
}

impl MessageEntry {
    pub fn new(sender: Sender, text: impl Into<String>, kind: MessageType) -> Self {
        Self {
            sender,
            text: text.into(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
            platform: None,
            media_url: None,
            whatsapp_message_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Active,
    Completed,
}

/// Position of the automated flow within a card's conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BotState {
    pub status: BotStatus,
    pub current_node_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_interaction: OffsetDateTime,
}

impl BotState {
    pub fn active_at(node_id: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            status: BotStatus::Active,
            current_node_id: Some(node_id.into()),
            last_interaction: now,
        }
    }

    pub fn completed(now: OffsetDateTime) -> Self {
        Self {
            status: BotStatus::Completed,
            current_node_id: None,
            last_interaction: now,
        }
    }

    /// True once `window` or more has elapsed since the last interaction.
    pub fn is_stale(&self, now: OffsetDateTime, window: Duration) -> bool {
        now - self.last_interaction >= window
    }
}

/// Persistent conversation record for one human contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCard {
    pub id: String,
    pub group_id: String,
    pub contact_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_phone: Option<String>,
    #[serde(default, rename = "platform_ids")]
    pub platform_ids: BTreeMap<Platform, String>,
    #[serde(default, rename = "platform_metadata")]
    pub platform_metadata: BTreeMap<Platform, Value>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_state: Option<BotState>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_read_at: Option<OffsetDateTime>,
    #[serde(
        default,
        rename = "last_interaction_source",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_interaction_source: Option<Platform>,
    #[serde(
        default,
        rename = "last_interaction_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_interaction_type: Option<MessageType>,
}

impl ConversationCard {
    /// Appends to the history and refreshes the derived summary fields.
    pub fn push_message(&mut self, entry: MessageEntry) {
        self.last_message = entry.text.clone();
        self.updated_at = entry.timestamp.max(self.updated_at);
        self.messages.push(entry);
    }

    /// Address the given platform's adapter should send to.
    pub fn recipient_for(&self, platform: Platform) -> Option<&str> {
        self.platform_ids
            .get(&platform)
            .map(String::as_str)
            .or_else(|| {
                platform
                    .is_phone_oriented()
                    .then_some(self.contact_number.as_deref())
                    .flatten()
            })
    }

    /// The bot state only counts when it is active and not older than `window`.
    pub fn live_bot_state(&self, now: OffsetDateTime, window: Duration) -> Option<&BotState> {
        self.bot_state
            .as_ref()
            .filter(|s| s.status == BotStatus::Active && !s.is_stale(now, window))
    }
}
