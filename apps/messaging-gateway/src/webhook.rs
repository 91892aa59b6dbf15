//! Glue shared by every platform webhook: normalized message in, ledger
//! upsert, then at most one bot turn.

use hub_core::{ConversationCard, Platform, UnifiedMessage};
use hub_ledger::UpsertOutcome;
use hub_runner::{EngineError, Turn, TurnOutcome};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::Instrument;

use crate::error::GatewayError;
use crate::http::GatewayState;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub card_id: String,
    pub is_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_outcome: Option<&'static str>,
}

/// Records `message` on its card and drives the active bot for text messages.
///
/// Bot failures are logged and reported as no outcome; only ledger failures
/// fail the delivery.
pub async fn ingest(
    state: &GatewayState,
    message: UnifiedMessage,
) -> Result<IngestReport, GatewayError> {
    if message.external_id.trim().is_empty() {
        return Err(GatewayError::BadRequest("message has no sender id".into()));
    }
    let platform = message.source_platform;
    let span = hub_telemetry::ingress_span(platform.as_str(), &message.external_id);
    async move {
        hub_telemetry::record_ingress(platform.as_str());
        let upserted = state.ledger.upsert(&message).await?;

        let bot_outcome = if message.is_text() {
            run_bot(state, &message, &upserted).await
        } else {
            tracing::debug!(
                message_type = message.message_type.as_str(),
                "non-text message; bot not triggered"
            );
            None
        };

        Ok(IngestReport {
            card_id: upserted.card_id,
            is_new: upserted.is_new,
            bot_outcome: bot_outcome.map(|o| o.as_str()),
        })
    }
    .instrument(span)
    .await
}

/// Ingests a batch, skipping entries without a sender instead of failing the delivery.
pub async fn ingest_all(
    state: &GatewayState,
    messages: Vec<UnifiedMessage>,
) -> Result<Vec<IngestReport>, GatewayError> {
    let mut reports = Vec::with_capacity(messages.len());
    for message in messages {
        match ingest(state, message).await {
            Ok(report) => reports.push(report),
            Err(GatewayError::BadRequest(reason)) => {
                tracing::warn!(%reason, "skipping webhook entry");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(reports)
}

/// Phone channels restart the bot on a new card, a missing bot state, or a
/// stale one; other channels only on a new card.
pub fn should_force_restart(
    card: &ConversationCard,
    platform: Platform,
    is_new: bool,
    staleness: time::Duration,
) -> bool {
    if is_new {
        return true;
    }
    if !platform.is_phone_oriented() {
        return false;
    }
    match &card.bot_state {
        None => true,
        Some(state) => state.is_stale(OffsetDateTime::now_utc(), staleness),
    }
}

async fn run_bot(
    state: &GatewayState,
    message: &UnifiedMessage,
    upserted: &UpsertOutcome,
) -> Option<TurnOutcome> {
    let platform = message.source_platform;
    let bot = match state.bots.get_active_bot().await {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            tracing::debug!("no active bot");
            return None;
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to load active bot");
            return None;
        }
    };
    let Some(adapter) = state.adapters.get(platform) else {
        tracing::warn!(platform = %platform, "no adapter registered; bot skipped");
        return None;
    };
    let card = match state.ledger.get_card(&upserted.card_id).await {
        Ok(Some(card)) => card,
        Ok(None) => {
            tracing::error!(card_id = %upserted.card_id, "card vanished after upsert");
            return None;
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to reload card");
            return None;
        }
    };

    let force_restart = should_force_restart(
        &card,
        platform,
        upserted.is_new,
        state.engine.config().staleness,
    );
    let recipient = card
        .recipient_for(platform)
        .unwrap_or(&message.external_id)
        .to_string();
    let turn = Turn {
        bot: &bot,
        recipient: &recipient,
        card: &card,
        text: &message.message_text,
        message_id: message.message_id.as_deref(),
        force_restart,
    };
    match state.engine.run_turn(adapter.as_ref(), turn).await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            if matches!(err, EngineError::Adapter(_)) {
                hub_telemetry::record_adapter_error(platform.as_str());
            }
            tracing::error!(error = %err, card_id = %card.id, "bot turn aborted");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::BotState;
    use std::collections::BTreeMap;

    fn card(bot_state: Option<BotState>) -> ConversationCard {
        let now = OffsetDateTime::now_utc();
        ConversationCard {
            id: "c".into(),
            group_id: "inbox".into(),
            contact_name: "Ana".into(),
            contact_number: None,
            normalized_phone: None,
            platform_ids: BTreeMap::new(),
            platform_metadata: BTreeMap::new(),
            last_message: String::new(),
            messages: Vec::new(),
            bot_state,
            custom_fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            last_read_at: None,
            last_interaction_source: None,
            last_interaction_type: None,
        }
    }

    #[test]
    fn phone_channels_restart_without_live_state() {
        let day = time::Duration::hours(24);
        let now = OffsetDateTime::now_utc();
        assert!(should_force_restart(&card(None), Platform::WhatsApp, false, day));
        assert!(!should_force_restart(&card(None), Platform::Telegram, false, day));

        let fresh = card(Some(BotState::active_at("n", now)));
        assert!(!should_force_restart(&fresh, Platform::Sms, false, day));
        assert!(should_force_restart(&fresh, Platform::Telegram, true, day));

        let stale = card(Some(BotState::active_at("n", now - time::Duration::hours(30))));
        assert!(should_force_restart(&stale, Platform::WhatsApp, false, day));
    }
}
