use anyhow::{Context, Result};
use axum::serve;
use hub_gateway::{GatewayConfig, bootstrap, build_router};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    hub_telemetry::install("hub-gateway")?;

    let config = GatewayConfig::from_env()?;
    let state = bootstrap(&config).await?;
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    info!("hub-gateway listening on {}", config.addr);

    serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
