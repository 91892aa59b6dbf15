//! Logging and metrics plumbing shared by the hub's crates.
//!
//! [`install`] sets up the global `tracing` subscriber once per process; the
//! span and counter helpers keep field and metric names consistent between
//! the gateway and the bot engine.

use anyhow::Result;

mod config;
mod metrics;
mod tracing_init;

pub use config::TelemetryConfig;
pub use metrics::{
    ingress_span, record_adapter_error, record_bot_step, record_bot_turn, record_card_created,
    record_ingress, turn_span,
};
pub use tracing_init::init_telemetry;

/// Installs the process-wide subscriber configured from `RUST_LOG` and `LOG_FORMAT`.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(service_name))
}
