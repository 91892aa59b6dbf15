//! HTTP edge of the hub: platform webhooks, webhook verification and the
//! operator API, wired to the ledger and the bot engine.

pub mod config;
pub mod error;
pub mod http;
mod verify;
pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use hub_core::{
    AdapterRegistry, MetaAdapter, Platform, TelegramAdapter, WebChatAdapter, WhatsAppAdapter,
};
use hub_ledger::{BotRepository, Ledger, MemoryBotRepository, Seed, SharedBotRepository};
use hub_runner::{BotEngine, validate_flow};
use tracing::info;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::{GatewayState, build_router};
pub use verify::{SIGNATURE_HEADER, TELEGRAM_SECRET_HEADER};

/// One adapter per platform whose credentials are configured; web chat needs none.
pub fn build_adapters(config: &GatewayConfig, http: reqwest::Client) -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    if let Some(wa) = &config.whatsapp {
        registry.register(Arc::new(WhatsAppAdapter::new(
            http.clone(),
            wa.api_base.clone(),
            wa.phone_id.clone(),
            wa.token.clone(),
        )))?;
    }
    if let Some(meta) = &config.meta {
        for platform in [Platform::Instagram, Platform::Messenger] {
            registry.register(Arc::new(MetaAdapter::new(
                platform,
                http.clone(),
                meta.api_base.clone(),
                meta.page_token.clone(),
            )))?;
        }
    }
    if let Some(tg) = &config.telegram {
        registry.register(Arc::new(TelegramAdapter::new(
            http.clone(),
            tg.api_base.clone(),
            tg.bot_token.clone(),
        )))?;
    }
    registry.register(Arc::new(WebChatAdapter))?;
    Ok(registry)
}

/// Builds the in-memory stores, applies the seed file and wires the engine.
pub async fn bootstrap(config: &GatewayConfig) -> Result<Arc<GatewayState>> {
    let ledger = Ledger::in_memory(config.ledger.clone());
    let bots: SharedBotRepository = Arc::new(MemoryBotRepository::new());

    if let Some(path) = &config.seed_file {
        let seed = Seed::load_from_file(path)?;
        seed.apply(&ledger, bots.as_ref())
            .await
            .with_context(|| format!("applying seed {}", path.display()))?;
        info!(path = %path.display(), "seed data loaded");
    }

    match bots.get_active_bot().await? {
        Some(bot) => {
            for issue in validate_flow(&bot.flow) {
                tracing::warn!(bot_id = %bot.id, %issue, "active bot has a flow issue");
            }
            info!(bot_id = %bot.id, name = %bot.name, "active bot loaded");
        }
        None => info!("no active bot; inbound messages are only recorded"),
    }

    let adapters = build_adapters(config, reqwest::Client::new())?;
    info!(platforms = ?adapters.platforms(), "outbound adapters registered");

    Ok(Arc::new(GatewayState {
        engine: BotEngine::new(ledger.clone(), config.engine.clone()),
        ledger,
        bots,
        adapters,
        secrets: config.secrets.clone(),
    }))
}
