use std::path::Path;

use anyhow::Context;
use hub_core::{BotDefinition, Lane};
use serde::Deserialize;

use crate::bots::BotRepository;
use crate::{Ledger, LedgerError};

/// Startup fixture: lanes, bot definitions and the bot to activate.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    #[serde(default)]
    pub lanes: Vec<Lane>,
    #[serde(default)]
    pub bots: Vec<BotDefinition>,
    #[serde(default)]
    pub active_bot_id: Option<String>,
}

impl Seed {
    /// YAML or JSON.
    pub fn parse(text: &str) -> Result<Self, LedgerError> {
        serde_yaml_bw::from_str(text).map_err(|err| LedgerError::Serialization(err.to_string()))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file at {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing seed file at {}", path.display()))
    }

    pub async fn apply(self, ledger: &Ledger, bots: &dyn BotRepository) -> Result<(), LedgerError> {
        let (lanes, bot_count) = (self.lanes.len(), self.bots.len());
        for lane in self.lanes {
            ledger.put_lane(lane).await?;
        }
        for bot in self.bots {
            bots.put_bot(bot).await?;
        }
        if let Some(bot_id) = self.active_bot_id {
            bots.activate(&bot_id).await?;
        }
        tracing::info!(lanes, bots = bot_count, "seed applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerConfig, MemoryBotRepository};

    #[tokio::test]
    async fn json_seed_activates_bot() {
        let seed = Seed::parse(
            r#"{
              "lanes": [{"id": "l1", "name": "Bandeja de entrada", "order": 0}],
              "bots": [{"id": "b1", "name": "B", "updatedAt": "2024-05-01T10:00:00Z",
                        "flow": {"nodes": [], "edges": []}}],
              "activeBotId": "b1"
            }"#,
        )
        .unwrap();
        let ledger = Ledger::in_memory(LedgerConfig::default());
        let bots = MemoryBotRepository::new();
        seed.apply(&ledger, &bots).await.unwrap();

        assert_eq!(ledger.lanes().await.unwrap().len(), 1);
        assert_eq!(bots.get_active_bot().await.unwrap().unwrap().id, "b1");
    }
}
