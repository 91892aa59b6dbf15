use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Extension, Json, Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
};
use hub_core::{
    ActiveBotPointer, AdapterRegistry, ConversationCard, MessageEntry, Platform, Sender,
    extract_meta, extract_whatsapp, extract_whatsapp_read_receipts, extract_x, normalize_telegram,
    normalize_tiktok, normalize_webchat,
};
use hub_ledger::{Ledger, SharedBotRepository};
use hub_runner::{BotEngine, validate_flow};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::WebhookSecrets;
use crate::error::GatewayError;
use crate::verify::{
    VerifyQuery, verify_hub_signature, verify_subscription, verify_telegram_secret,
};
use crate::webhook::{IngestReport, ingest, ingest_all};

/// Everything a request handler needs; built once at startup.
pub struct GatewayState {
    pub ledger: Ledger,
    pub bots: SharedBotRepository,
    pub engine: BotEngine,
    pub adapters: AdapterRegistry,
    pub secrets: WebhookSecrets,
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    if state.adapters.is_empty() {
        tracing::warn!("no outbound adapters registered; bots cannot reply");
    }
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/webhooks/whatsapp",
            get(verify_whatsapp).post(receive_whatsapp),
        )
        .route("/webhooks/meta", get(verify_meta).post(receive_meta))
        .route("/webhooks/telegram", post(receive_telegram))
        .route("/webhooks/x", post(receive_x))
        .route("/webhooks/tiktok", post(receive_tiktok))
        .route("/webchat/messages", post(receive_webchat))
        .route("/webchat/{session_id}/messages", get(webchat_history))
        .route("/api/cards/{card_id}", get(get_card))
        .route("/api/cards/{card_id}/messages", post(post_agent_message))
        .route("/api/bots/active", put(activate_bot))
        .layer(Extension(state))
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn parse_json(body: &[u8]) -> Result<Value, GatewayError> {
    serde_json::from_slice(body).map_err(|err| GatewayError::BadRequest(format!("invalid JSON: {err}")))
}

async fn verify_whatsapp(
    Extension(state): Extension<Arc<GatewayState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, GatewayError> {
    verify_subscription(state.secrets.whatsapp_verify_token.as_deref(), &query)
}

async fn verify_meta(
    Extension(state): Extension<Arc<GatewayState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, GatewayError> {
    verify_subscription(state.secrets.meta_verify_token.as_deref(), &query)
}

async fn receive_whatsapp(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    verify_hub_signature(state.secrets.whatsapp_app_secret.as_deref(), &headers, &body)?;
    let payload = parse_json(&body)?;

    let reports = ingest_all(&state, extract_whatsapp(&payload)).await?;
    let mut read = 0;
    for recipient in extract_whatsapp_read_receipts(&payload) {
        if state
            .ledger
            .update_read_status(&recipient, Platform::WhatsApp)
            .await?
            .is_some()
        {
            read += 1;
        }
    }
    Ok(Json(json!({ "messages": reports, "readReceipts": read })))
}

async fn receive_meta(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, GatewayError> {
    verify_hub_signature(state.secrets.meta_app_secret.as_deref(), &headers, &body)?;
    let payload = parse_json(&body)?;
    ingest_all(&state, extract_meta(&payload)).await?;
    Ok("EVENT_RECEIVED")
}

async fn receive_telegram(
    Extension(state): Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, GatewayError> {
    verify_telegram_secret(state.secrets.telegram_secret_token.as_deref(), &headers)?;
    let payload = parse_json(&body)?;
    // Telegram redelivers on any non-2xx, so updates without a sender are acknowledged.
    ingest_all(&state, vec![normalize_telegram(&payload)]).await?;
    Ok(StatusCode::OK)
}

async fn receive_x(
    Extension(state): Extension<Arc<GatewayState>>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, GatewayError> {
    ingest_all(&state, extract_x(&payload)).await?;
    Ok(StatusCode::OK)
}

async fn receive_tiktok(
    Extension(state): Extension<Arc<GatewayState>>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, GatewayError> {
    ingest_all(&state, vec![normalize_tiktok(&payload)]).await?;
    Ok(StatusCode::OK)
}

async fn receive_webchat(
    Extension(state): Extension<Arc<GatewayState>>,
    Json(payload): Json<Value>,
) -> Result<Json<IngestReport>, GatewayError> {
    let report = ingest(&state, normalize_webchat(&payload)).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Number of entries the widget already has.
    #[serde(default)]
    after: usize,
}

async fn webchat_history(
    Extension(state): Extension<Arc<GatewayState>>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageEntry>>, GatewayError> {
    let card = state
        .ledger
        .find_by_identity(Platform::WebChat, &session_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("session {session_id}")))?;
    let messages = card.messages.into_iter().skip(query.after).collect();
    Ok(Json(messages))
}

async fn get_card(
    Extension(state): Extension<Arc<GatewayState>>,
    Path(card_id): Path<String>,
) -> Result<Json<ConversationCard>, GatewayError> {
    state
        .ledger
        .get_card(&card_id)
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("card {card_id}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentMessage {
    text: String,
    #[serde(default)]
    agent_id: Option<String>,
}

/// Operator reply: delivered on the channel the contact last wrote from.
async fn post_agent_message(
    Extension(state): Extension<Arc<GatewayState>>,
    Path(card_id): Path<String>,
    Json(body): Json<AgentMessage>,
) -> Result<Json<ConversationCard>, GatewayError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(GatewayError::BadRequest("text is required".into()));
    }
    let card = state
        .ledger
        .get_card(&card_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("card {card_id}")))?;
    let platform = card
        .last_interaction_source
        .ok_or_else(|| GatewayError::BadRequest("card has no inbound channel yet".into()))?;
    let adapter = state
        .adapters
        .get(platform)
        .ok_or_else(|| GatewayError::BadRequest(format!("no adapter registered for {platform}")))?;
    let recipient = card
        .recipient_for(platform)
        .ok_or_else(|| GatewayError::BadRequest(format!("card has no {platform} address")))?;

    if let Err(err) = adapter.send_message(recipient, text).await {
        hub_telemetry::record_adapter_error(platform.as_str());
        return Err(err.into());
    }
    let card = state
        .ledger
        .append_agent_message(&card_id, Sender::Agent(body.agent_id), text)
        .await?;
    tracing::info!(card_id = %card.id, platform = %platform, "operator message sent");
    Ok(Json(card))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivateBot {
    bot_id: String,
}

async fn activate_bot(
    Extension(state): Extension<Arc<GatewayState>>,
    Json(body): Json<ActivateBot>,
) -> Result<Json<ActiveBotPointer>, GatewayError> {
    let pointer = state.bots.activate(&body.bot_id).await?;
    if let Some(bot) = state.bots.get_bot(&pointer.bot_id).await? {
        for issue in validate_flow(&bot.flow) {
            tracing::warn!(bot_id = %bot.id, %issue, "activated bot has a flow issue");
        }
    }
    tracing::info!(bot_id = %pointer.bot_id, "active bot changed");
    Ok(Json(pointer))
}
