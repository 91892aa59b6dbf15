use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use hub_core::{ActiveBotPointer, BotDefinition};
use tokio::sync::RwLock;

use crate::LedgerError;

/// Source of bot definitions and of the single bot answering inbound traffic.
#[async_trait]
pub trait BotRepository: Send + Sync {
    async fn put_bot(&self, bot: BotDefinition) -> Result<(), LedgerError>;

    async fn get_bot(&self, id: &str) -> Result<Option<BotDefinition>, LedgerError>;

    /// Points the hub at `bot_id`; every other bot loses its active flag.
    async fn activate(&self, bot_id: &str) -> Result<ActiveBotPointer, LedgerError>;

    /// Follows the pointer, falling back to the most recently updated bot
    /// flagged active when no pointer has been written.
    async fn get_active_bot(&self) -> Result<Option<BotDefinition>, LedgerError>;
}

pub type SharedBotRepository = Arc<dyn BotRepository>;

#[derive(Default)]
pub struct MemoryBotRepository {
    bots: DashMap<String, BotDefinition>,
    pointer: RwLock<Option<ActiveBotPointer>>,
}

impl MemoryBotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_flagged_active(&self) -> Option<BotDefinition> {
        self.bots
            .iter()
            .filter(|entry| entry.is_active)
            .max_by_key(|entry| (entry.updated_at, entry.id.clone()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl BotRepository for MemoryBotRepository {
    async fn put_bot(&self, bot: BotDefinition) -> Result<(), LedgerError> {
        self.bots.insert(bot.id.clone(), bot);
        Ok(())
    }

    async fn get_bot(&self, id: &str) -> Result<Option<BotDefinition>, LedgerError> {
        Ok(self.bots.get(id).map(|entry| entry.value().clone()))
    }

    async fn activate(&self, bot_id: &str) -> Result<ActiveBotPointer, LedgerError> {
        let mut pointer = self.pointer.write().await;
        if !self.bots.contains_key(bot_id) {
            return Err(LedgerError::BotNotFound(bot_id.to_string()));
        }
        for mut entry in self.bots.iter_mut() {
            let active = entry.key() == bot_id;
            entry.value_mut().is_active = active;
        }
        let next = ActiveBotPointer {
            bot_id: bot_id.to_string(),
        };
        *pointer = Some(next.clone());
        tracing::info!(bot_id, "active bot switched");
        Ok(next)
    }

    async fn get_active_bot(&self) -> Result<Option<BotDefinition>, LedgerError> {
        let pointer = self.pointer.read().await.clone();
        if let Some(pointer) = pointer {
            match self.bots.get(&pointer.bot_id) {
                Some(bot) => return Ok(Some(bot.value().clone())),
                None => tracing::warn!(
                    bot_id = %pointer.bot_id,
                    "active bot pointer references a missing bot"
                ),
            }
        }
        Ok(self.newest_flagged_active())
    }
}

/// Parses a bot definition from YAML or JSON text.
pub fn parse_bot_definition(text: &str) -> Result<BotDefinition, LedgerError> {
    serde_yaml_bw::from_str(text).map_err(|err| LedgerError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::Flow;
    use time::macros::datetime;

    fn bot(id: &str, active: bool, updated: time::OffsetDateTime) -> BotDefinition {
        BotDefinition {
            id: id.into(),
            name: id.to_uppercase(),
            is_active: active,
            updated_at: updated,
            flow: Flow::default(),
        }
    }

    #[tokio::test]
    async fn legacy_flags_pick_most_recent() {
        let repo = MemoryBotRepository::new();
        repo.put_bot(bot("old", true, datetime!(2024-01-01 0:00 UTC)))
            .await
            .unwrap();
        repo.put_bot(bot("new", true, datetime!(2024-03-01 0:00 UTC)))
            .await
            .unwrap();
        repo.put_bot(bot("off", false, datetime!(2024-06-01 0:00 UTC)))
            .await
            .unwrap();
        let active = repo.get_active_bot().await.unwrap().unwrap();
        assert_eq!(active.id, "new");
    }

    #[tokio::test]
    async fn pointer_wins_over_flags() {
        let repo = MemoryBotRepository::new();
        repo.put_bot(bot("a", true, datetime!(2024-05-01 0:00 UTC)))
            .await
            .unwrap();
        repo.put_bot(bot("b", false, datetime!(2024-01-01 0:00 UTC)))
            .await
            .unwrap();
        repo.activate("b").await.unwrap();

        assert_eq!(repo.get_active_bot().await.unwrap().unwrap().id, "b");
        assert!(!repo.get_bot("a").await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn activating_unknown_bot_fails() {
        let repo = MemoryBotRepository::new();
        let err = repo.activate("ghost").await.unwrap_err();
        assert!(matches!(err, LedgerError::BotNotFound(id) if id == "ghost"));
        assert!(repo.get_active_bot().await.unwrap().is_none());
    }

    #[test]
    fn parses_yaml_definition() {
        let yaml = r#"
id: welcome
name: Welcome
isActive: true
updatedAt: "2024-05-01T10:00:00Z"
flow:
  nodes:
    - id: start
      type: startNode
    - id: hello
      type: textMessageNode
      data:
        content: "Hola {{nombre}}"
  edges:
    - source: start
      target: hello
"#;
        let bot = parse_bot_definition(yaml).unwrap();
        assert_eq!(bot.flow.nodes.len(), 2);
        assert_eq!(bot.flow.nodes[1].body(), "Hola {{nombre}}");
        assert!(parse_bot_definition("id: [").is_err());
    }
}
