use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use hub_ledger::LedgerConfig;
use hub_runner::EngineConfig;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct WhatsAppSettings {
    pub phone_id: String,
    pub token: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MetaSettings {
    pub page_token: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub api_base: Option<String>,
}

/// Shared secrets used to authenticate inbound webhooks. Unset secrets
/// disable the corresponding check.
#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    pub whatsapp_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,
    pub meta_verify_token: Option<String>,
    pub meta_app_secret: Option<String>,
    pub telegram_secret_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub seed_file: Option<PathBuf>,
    pub engine: EngineConfig,
    pub ledger: LedgerConfig,
    pub whatsapp: Option<WhatsAppSettings>,
    pub meta: Option<MetaSettings>,
    pub telegram: Option<TelegramSettings>,
    pub secrets: WebhookSecrets,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            seed_file: None,
            engine: EngineConfig::default(),
            ledger: LedgerConfig::default(),
            whatsapp: None,
            meta: None,
            telegram: None,
            secrets: WebhookSecrets::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.engine = EngineConfig::from_env();
        config.ledger = LedgerConfig::from_env();
        Ok(config)
    }

    /// Reads the gateway's own variables through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = get("BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let addr = bind
            .parse()
            .with_context(|| format!("invalid BIND address `{bind}`"))?;

        let whatsapp = match (get("WA_PHONE_ID"), get("WA_TOKEN")) {
            (Some(phone_id), Some(token)) => Some(WhatsAppSettings {
                phone_id,
                token,
                api_base: get("WA_API_BASE"),
            }),
            _ => None,
        };
        let meta = get("META_PAGE_TOKEN").map(|page_token| MetaSettings {
            page_token,
            api_base: get("META_API_BASE"),
        });
        let telegram = get("TELEGRAM_BOT_TOKEN").map(|bot_token| TelegramSettings {
            bot_token,
            api_base: get("TELEGRAM_API_BASE"),
        });

        Ok(Self {
            addr,
            seed_file: get("HUB_SEED_FILE").map(PathBuf::from),
            whatsapp,
            meta,
            telegram,
            secrets: WebhookSecrets {
                whatsapp_verify_token: get("WA_VERIFY_TOKEN"),
                whatsapp_app_secret: get("WA_APP_SECRET"),
                meta_verify_token: get("META_VERIFY_TOKEN"),
                meta_app_secret: get("META_APP_SECRET"),
                telegram_secret_token: get("TELEGRAM_SECRET_TOKEN"),
            },
            ..Self::default()
        })
    }
}
