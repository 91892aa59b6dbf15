use std::sync::Arc;

use async_trait::async_trait;
use hub_core::{ConversationCard, Lane, Platform};

use crate::LedgerError;

/// Read-modify-write applied to one card document inside a transaction.
///
/// Receives the committed card (or `None` when the id is unused) and returns
/// the card to commit. Returning an error aborts without writing.
pub type CardMutation =
    Box<dyn FnOnce(Option<ConversationCard>) -> Result<ConversationCard, LedgerError> + Send>;

/// Document store holding cards and lanes.
///
/// Lookups are plain reads and must happen before [`CardStore::transact`];
/// the transaction itself only sees the single card it is keyed on.
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ConversationCard>, LedgerError>;

    async fn find_by_platform_id(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<ConversationCard>, LedgerError>;

    async fn find_by_normalized_phone(
        &self,
        digits: &str,
    ) -> Result<Option<ConversationCard>, LedgerError>;

    /// Legacy cards only stored the raw number the contact wrote from.
    async fn find_by_contact_number(
        &self,
        raw: &str,
    ) -> Result<Option<ConversationCard>, LedgerError>;

    /// Atomically applies `mutation` to the card stored under `id`.
    async fn transact(
        &self,
        id: &str,
        mutation: CardMutation,
    ) -> Result<ConversationCard, LedgerError>;

    /// Lanes ordered by explicit position, unpositioned lanes last.
    async fn lanes(&self) -> Result<Vec<Lane>, LedgerError>;

    async fn put_lane(&self, lane: Lane) -> Result<(), LedgerError>;
}

pub type SharedCardStore = Arc<dyn CardStore>;
