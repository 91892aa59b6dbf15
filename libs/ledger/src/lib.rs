//! Conversation ledger: the only writer of conversation cards.
//!
//! Identity resolution and default-lane lookup are plain reads performed
//! before the write; the write itself is a single [`CardStore::transact`]
//! against the resolved card id, so concurrent deliveries for one contact
//! serialize on that card.

mod bots;
mod memory;
mod seed;
mod store;

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hub_core::{
    BotState, ConversationCard, Lane, MessageEntry, MessageType, Platform, Sender,
    UnifiedMessage, normalize_phone,
};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

pub use bots::{BotRepository, MemoryBotRepository, SharedBotRepository, parse_bot_definition};
pub use memory::MemoryCardStore;
pub use seed::Seed;
pub use store::{CardMutation, CardStore, SharedCardStore};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("card {0} not found")]
    CardNotFound(String),
    #[error("bot {0} not found")]
    BotNotFound(String),
    #[error("no default lane: no lane matches `{keyword}` and none is positioned")]
    NoDefaultLane { keyword: String },
    #[error("store error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Case-insensitive substring identifying the lane new cards land in.
    pub default_lane_keyword: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_lane_keyword: "bandeja".into(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        let keyword = env::var("DEFAULT_LANE_KEYWORD")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| "bandeja".into());
        Self {
            default_lane_keyword: keyword,
        }
    }
}

/// Result of [`Ledger::upsert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub success: bool,
    pub card_id: String,
    pub is_new: bool,
}

#[derive(Clone)]
pub struct Ledger {
    store: SharedCardStore,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(store: SharedCardStore, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(Arc::new(MemoryCardStore::new()), config)
    }

    /// Attaches `message` to its contact's card, creating the card on first contact.
    ///
    /// A new card's id is derived from the contact identity, so concurrent
    /// first messages converge on one document: whichever transaction runs
    /// second finds the card already written and appends to it.
    pub async fn upsert(&self, message: &UnifiedMessage) -> Result<UpsertOutcome, LedgerError> {
        let platform = message.source_platform;
        let existing = self
            .find_by_identity(platform, &message.external_id)
            .await?;
        let lane = match existing {
            Some(_) => None,
            None => Some(self.default_lane().await?),
        };
        let card_id = existing
            .map(|card| card.id)
            .unwrap_or_else(|| identity_card_id(platform, &message.external_id));

        let created = Arc::new(AtomicBool::new(false));
        let msg = message.clone();
        let id = card_id.clone();
        let seen_vacant = created.clone();
        self.store
            .transact(
                &card_id,
                Box::new(move |current| match (current, lane) {
                    (Some(card), _) => Ok(apply_inbound(card, &msg)),
                    (None, Some(lane)) => {
                        seen_vacant.store(true, Ordering::SeqCst);
                        Ok(new_card(id, lane, &msg))
                    }
                    (None, None) => Err(LedgerError::CardNotFound(id)),
                }),
            )
            .await?;

        let is_new = created.load(Ordering::SeqCst);
        if is_new {
            hub_telemetry::record_card_created(platform.as_str());
            tracing::info!(card_id = %card_id, platform = %platform, "conversation card created");
        } else {
            tracing::debug!(card_id = %card_id, platform = %platform, "message appended");
        }
        Ok(UpsertOutcome {
            success: true,
            card_id,
            is_new,
        })
    }

    /// Identity map first; phone-oriented platforms then try the normalized
    /// digits and finally the legacy raw number.
    pub async fn find_by_identity(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<ConversationCard>, LedgerError> {
        if external_id.is_empty() {
            return Ok(None);
        }
        if let Some(card) = self.store.find_by_platform_id(platform, external_id).await? {
            return Ok(Some(card));
        }
        if !platform.is_phone_oriented() {
            return Ok(None);
        }
        let digits = normalize_phone(external_id);
        if !digits.is_empty() {
            if let Some(card) = self.store.find_by_normalized_phone(&digits).await? {
                return Ok(Some(card));
            }
        }
        self.store.find_by_contact_number(external_id).await
    }

    /// Keyword match on the lane name, else the lowest positioned lane.
    pub async fn default_lane(&self) -> Result<Lane, LedgerError> {
        let lanes = self.store.lanes().await?;
        let keyword = self.config.default_lane_keyword.to_lowercase();
        if let Some(lane) = lanes
            .iter()
            .find(|lane| lane.name.to_lowercase().contains(&keyword))
        {
            return Ok(lane.clone());
        }
        lanes
            .into_iter()
            .filter(|lane| lane.order.is_some())
            .min_by_key(|lane| lane.order)
            .ok_or(LedgerError::NoDefaultLane { keyword })
    }

    /// Stamps `lastReadAt` on the contact's card. Returns the card id if one matched.
    pub async fn update_read_status(
        &self,
        external_id: &str,
        platform: Platform,
    ) -> Result<Option<String>, LedgerError> {
        let Some(card) = self.find_by_identity(platform, external_id).await? else {
            tracing::debug!(external_id, platform = %platform, "read receipt for unknown contact");
            return Ok(None);
        };
        let now = OffsetDateTime::now_utc();
        self.mutate(&card.id, move |card| card.last_read_at = Some(now))
            .await?;
        Ok(Some(card.id))
    }

    pub async fn get_card(&self, card_id: &str) -> Result<Option<ConversationCard>, LedgerError> {
        self.store.get(card_id).await
    }

    pub async fn update_bot_state(
        &self,
        card_id: &str,
        state: BotState,
    ) -> Result<(), LedgerError> {
        self.mutate(card_id, move |card| card.bot_state = Some(state))
            .await
            .map(drop)
    }

    /// Appends an outbound entry authored by an operator or the bot.
    pub async fn append_agent_message(
        &self,
        card_id: &str,
        sender: Sender,
        text: &str,
    ) -> Result<ConversationCard, LedgerError> {
        let text = text.to_string();
        self.mutate(card_id, move |card| {
            let mut entry = MessageEntry::new(sender, text, MessageType::Text);
            entry.platform = card.last_interaction_source;
            card.push_message(entry);
        })
        .await
    }

    pub async fn save_custom_field(
        &self,
        card_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), LedgerError> {
        let (name, value) = (name.to_string(), value.to_string());
        self.mutate(card_id, move |card| {
            card.custom_fields.insert(name, value);
        })
        .await
        .map(drop)
    }

    pub async fn update_contact_name(&self, card_id: &str, name: &str) -> Result<(), LedgerError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(());
        }
        self.mutate(card_id, move |card| card.contact_name = name)
            .await
            .map(drop)
    }

    pub async fn lanes(&self) -> Result<Vec<Lane>, LedgerError> {
        self.store.lanes().await
    }

    pub async fn put_lane(&self, lane: Lane) -> Result<(), LedgerError> {
        self.store.put_lane(lane).await
    }

    /// Transaction on an existing card; a missing card is an error.
    async fn mutate(
        &self,
        card_id: &str,
        apply: impl FnOnce(&mut ConversationCard) + Send + 'static,
    ) -> Result<ConversationCard, LedgerError> {
        let id = card_id.to_string();
        self.store
            .transact(
                card_id,
                Box::new(move |current| {
                    let mut card = current.ok_or(LedgerError::CardNotFound(id))?;
                    apply(&mut card);
                    card.updated_at = card.updated_at.max(OffsetDateTime::now_utc());
                    Ok(card)
                }),
            )
            .await
    }
}

/// Card id for a contact seen for the first time.
///
/// Phone-oriented platforms key on the normalized digits so WhatsApp and SMS
/// first contacts from one number land on the same card.
fn identity_card_id(platform: Platform, external_id: &str) -> String {
    let digits = normalize_phone(external_id);
    let key = if platform.is_phone_oriented() && !digits.is_empty() {
        format!("phone:{digits}")
    } else {
        format!("{}:{external_id}", platform.as_str())
    };
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

fn inbound_entry(msg: &UnifiedMessage) -> MessageEntry {
    MessageEntry {
        sender: Sender::Contact,
        text: msg.message_text.clone(),
        kind: msg.message_type,
        timestamp: msg.timestamp,
        platform: Some(msg.source_platform),
        media_url: msg.media_url.clone(),
        whatsapp_message_id: match msg.source_platform {
            Platform::WhatsApp => msg.message_id.clone(),
            _ => None,
        },
    }
}

fn apply_inbound(mut card: ConversationCard, msg: &UnifiedMessage) -> ConversationCard {
    let platform = msg.source_platform;
    card.push_message(inbound_entry(msg));
    card.updated_at = card.updated_at.max(OffsetDateTime::now_utc());
    card.last_interaction_source = Some(platform);
    card.last_interaction_type = Some(msg.message_type);
    card.platform_ids.insert(platform, msg.external_id.clone());
    if let Some(meta) = &msg.platform_metadata {
        card.platform_metadata.insert(platform, meta.clone());
    }
    if platform.is_phone_oriented() {
        if card.contact_number.is_none() {
            card.contact_number = Some(msg.external_id.clone());
        }
        if card.normalized_phone.is_none() {
            card.normalized_phone = Some(normalize_phone(&msg.external_id));
        }
    }
    card
}

fn new_card(id: String, lane: Lane, msg: &UnifiedMessage) -> ConversationCard {
    let platform = msg.source_platform;
    let now = OffsetDateTime::now_utc();
    let name = msg.contact_name.trim();
    let card = ConversationCard {
        id,
        group_id: lane.id,
        contact_name: if name.is_empty() {
            platform.default_contact_name().to_string()
        } else {
            name.to_string()
        },
        contact_number: None,
        normalized_phone: None,
        platform_ids: Default::default(),
        platform_metadata: Default::default(),
        last_message: String::new(),
        messages: Vec::new(),
        bot_state: None,
        custom_fields: Default::default(),
        created_at: now,
        updated_at: now,
        last_read_at: None,
        last_interaction_source: None,
        last_interaction_type: None,
    };
    apply_inbound(card, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger_with_lanes() -> Ledger {
        let ledger = Ledger::in_memory(LedgerConfig::default());
        ledger
            .put_lane(Lane {
                id: "leads".into(),
                name: "Leads".into(),
                order: Some(0),
            })
            .await
            .unwrap();
        ledger
            .put_lane(Lane {
                id: "inbox".into(),
                name: "Bandeja de Entrada".into(),
                order: Some(3),
            })
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn keyword_lane_beats_ordering() {
        let ledger = ledger_with_lanes().await;
        assert_eq!(ledger.default_lane().await.unwrap().id, "inbox");
    }

    #[tokio::test]
    async fn lowest_order_when_no_keyword_match() {
        let ledger = Ledger::in_memory(LedgerConfig {
            default_lane_keyword: "inbox".into(),
        });
        for (id, order) in [("b", Some(5)), ("a", Some(2)), ("z", None)] {
            ledger
                .put_lane(Lane {
                    id: id.into(),
                    name: id.into(),
                    order,
                })
                .await
                .unwrap();
        }
        assert_eq!(ledger.default_lane().await.unwrap().id, "a");
    }

    #[tokio::test]
    async fn creating_without_lanes_is_fatal() {
        let ledger = Ledger::in_memory(LedgerConfig::default());
        let msg = UnifiedMessage::text(Platform::Telegram, "42", "Ana", "hola");
        let err = ledger.upsert(&msg).await.unwrap_err();
        assert!(matches!(err, LedgerError::NoDefaultLane { .. }));
    }

    #[tokio::test]
    async fn create_then_update_same_identity() {
        let ledger = ledger_with_lanes().await;
        let first = ledger
            .upsert(&UnifiedMessage::text(Platform::WhatsApp, "+52 55 1234 5678", "Ana", "Hola"))
            .await
            .unwrap();
        assert!(first.is_new);
        let second = ledger
            .upsert(&UnifiedMessage::text(Platform::WhatsApp, "+52 55 1234 5678", "Ana", "¿Sigues?"))
            .await
            .unwrap();
        assert!(!second.is_new);
        assert_eq!(first.card_id, second.card_id);

        let card = ledger.get_card(&first.card_id).await.unwrap().unwrap();
        assert_eq!(card.group_id, "inbox");
        assert_eq!(card.messages.len(), 2);
        assert_eq!(card.last_message, "¿Sigues?");
        assert_eq!(card.normalized_phone.as_deref(), Some("525512345678"));
        assert_eq!(card.last_interaction_source, Some(Platform::WhatsApp));
    }

    #[tokio::test]
    async fn non_phone_platforms_leave_phone_fields_empty() {
        let ledger = ledger_with_lanes().await;
        let out = ledger
            .upsert(&UnifiedMessage::text(Platform::Instagram, "IG1", "", "hey"))
            .await
            .unwrap();
        let card = ledger.get_card(&out.card_id).await.unwrap().unwrap();
        assert!(card.contact_number.is_none());
        assert_eq!(card.contact_name, "Instagram User");
    }

    #[tokio::test]
    async fn mutations_on_missing_card_fail() {
        let ledger = ledger_with_lanes().await;
        let err = ledger
            .save_custom_field("nope", "email", "a@b.com")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CardNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn agent_messages_keep_the_bot_distinct() {
        let ledger = ledger_with_lanes().await;
        let out = ledger
            .upsert(&UnifiedMessage::text(Platform::Telegram, "7", "Leo", "hola"))
            .await
            .unwrap();
        let card = ledger
            .append_agent_message(&out.card_id, Sender::Bot(Some("b1".into())), "Bienvenido")
            .await
            .unwrap();
        let last = card.messages.last().unwrap();
        assert_eq!(last.sender, Sender::Bot(Some("b1".into())));
        assert_eq!(last.platform, Some(Platform::Telegram));
        assert_eq!(card.last_message, "Bienvenido");
    }
}
