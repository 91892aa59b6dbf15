use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hub_core::{ConversationCard, Lane, Platform};

use crate::LedgerError;
use crate::store::{CardMutation, CardStore};

/// DashMap-backed store; a transaction holds the shard lock of its card.
#[derive(Default)]
pub struct MemoryCardStore {
    cards: DashMap<String, ConversationCard>,
    lanes: DashMap<String, Lane>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// Oldest card satisfying `pred`, so duplicate identities resolve stably.
    fn find_oldest(&self, pred: impl Fn(&ConversationCard) -> bool) -> Option<ConversationCard> {
        self.cards
            .iter()
            .filter(|entry| pred(entry.value()))
            .min_by_key(|entry| (entry.created_at, entry.id.clone()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl CardStore for MemoryCardStore {
    async fn get(&self, id: &str) -> Result<Option<ConversationCard>, LedgerError> {
        Ok(self.cards.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_platform_id(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<ConversationCard>, LedgerError> {
        Ok(self.find_oldest(|card| {
            card.platform_ids.get(&platform).map(String::as_str) == Some(external_id)
        }))
    }

    async fn find_by_normalized_phone(
        &self,
        digits: &str,
    ) -> Result<Option<ConversationCard>, LedgerError> {
        Ok(self.find_oldest(|card| card.normalized_phone.as_deref() == Some(digits)))
    }

    async fn find_by_contact_number(
        &self,
        raw: &str,
    ) -> Result<Option<ConversationCard>, LedgerError> {
        Ok(self.find_oldest(|card| card.contact_number.as_deref() == Some(raw)))
    }

    async fn transact(
        &self,
        id: &str,
        mutation: CardMutation,
    ) -> Result<ConversationCard, LedgerError> {
        let next = match self.cards.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = mutation(Some(occupied.get().clone()))?;
                ensure_same_id(id, &next)?;
                occupied.insert(next.clone());
                next
            }
            Entry::Vacant(vacant) => {
                let next = mutation(None)?;
                ensure_same_id(id, &next)?;
                vacant.insert(next.clone());
                next
            }
        };
        Ok(next)
    }

    async fn lanes(&self) -> Result<Vec<Lane>, LedgerError> {
        let mut lanes: Vec<Lane> = self.lanes.iter().map(|e| e.value().clone()).collect();
        lanes.sort_by(|a, b| {
            (a.order.is_none(), a.order, &a.id).cmp(&(b.order.is_none(), b.order, &b.id))
        });
        Ok(lanes)
    }

    async fn put_lane(&self, lane: Lane) -> Result<(), LedgerError> {
        self.lanes.insert(lane.id.clone(), lane);
        Ok(())
    }
}

fn ensure_same_id(id: &str, card: &ConversationCard) -> Result<(), LedgerError> {
    if card.id != id {
        return Err(LedgerError::Store(format!(
            "transaction on {id} produced card {}",
            card.id
        )));
    }
    Ok(())
}
