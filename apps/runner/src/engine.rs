use std::env;
use std::time::Duration as StdDuration;

use hub_core::{
    AdapterError, BotDefinition, BotState, ConversationCard, InputType, MediaKind,
    MessagingAdapter, Node, NodeKind, Sender, validate_input,
};
use hub_ledger::{Ledger, LedgerError};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::Instrument;

use crate::capture::{DEFAULT_ERROR_MESSAGE, is_name_variable, variable_name};
use crate::extract::{NamePatterns, extract_name};
use crate::graph::FlowIndex;
use crate::matching::{match_button, match_list_row};
use crate::pacing::{delay_node_duration, typing_delay};
use crate::template::{TemplateVars, render_template};

const DEFAULT_LIST_BUTTON: &str = "Ver opciones";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Age after which an active conversation restarts from the start node.
    pub staleness: time::Duration,
    /// Run-forward cap per turn.
    pub max_steps: usize,
    /// Pause after the read receipt before processing a reply.
    pub settle: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness: time::Duration::hours(24),
            max_steps: 15,
            settle: StdDuration::from_millis(500),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            staleness: env_parse::<i64>("BOT_STALENESS_HOURS")
                .map(time::Duration::hours)
                .unwrap_or(defaults.staleness),
            max_steps: env_parse("BOT_MAX_STEPS").unwrap_or(defaults.max_steps),
            settle: env_parse("BOT_SETTLE_MS")
                .map(StdDuration::from_millis)
                .unwrap_or(defaults.settle),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// One inbound reply to drive through the bot.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub bot: &'a BotDefinition,
    /// Platform address the adapter sends to.
    pub recipient: &'a str,
    /// Card state after the inbound message was recorded.
    pub card: &'a ConversationCard,
    pub text: &'a str,
    /// Provider id of the inbound message, for the read receipt.
    pub message_id: Option<&'a str>,
    /// Ignore any saved position and enter from the start node.
    pub force_restart: bool,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Waiting for the contact's reply at this node.
    Suspended { node_id: String },
    /// Graph exhausted; bot state marked completed.
    Completed,
    /// Capture validation failed; position unchanged.
    InvalidInput { node_id: String },
    /// Step cap reached; left at the last processed node.
    StepLimit { node_id: String },
    /// Nothing to do: no entry point or a node missing from the graph.
    Idle,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Suspended { .. } => "suspended",
            TurnOutcome::Completed => "completed",
            TurnOutcome::InvalidInput { .. } => "invalid_input",
            TurnOutcome::StepLimit { .. } => "step_limit",
            TurnOutcome::Idle => "idle",
        }
    }
}

enum Step {
    Continue,
    Suspend,
}

enum Resume {
    Next(String),
    Done(TurnOutcome),
}

/// Interprets a bot's flow graph one contact turn at a time.
///
/// The position lives in the card's [`BotState`]; each call reconstructs it,
/// consumes the reply, and runs forward until a node needs input or the
/// graph ends.
#[derive(Clone)]
pub struct BotEngine {
    ledger: Ledger,
    config: EngineConfig,
    names: &'static NamePatterns,
}

impl BotEngine {
    pub fn new(ledger: Ledger, config: EngineConfig) -> Self {
        Self {
            ledger,
            config,
            names: NamePatterns::builtin(),
        }
    }

    /// Uses a custom name-pattern set for capture nodes.
    pub fn with_name_patterns(mut self, names: &'static NamePatterns) -> Self {
        self.names = names;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run_turn(
        &self,
        adapter: &dyn MessagingAdapter,
        turn: Turn<'_>,
    ) -> Result<TurnOutcome, EngineError> {
        let span = hub_telemetry::turn_span(&turn.card.id, &turn.bot.id);
        let result = self.drive(adapter, turn).instrument(span).await;
        match &result {
            Ok(outcome) => hub_telemetry::record_bot_turn(outcome.as_str()),
            Err(_) => hub_telemetry::record_bot_turn("failed"),
        }
        result
    }

    async fn drive(
        &self,
        adapter: &dyn MessagingAdapter,
        turn: Turn<'_>,
    ) -> Result<TurnOutcome, EngineError> {
        let index = FlowIndex::build(&turn.bot.flow);
        let mut ctx = TurnCtx {
            adapter,
            turn,
            index: &index,
            vars: TemplateVars::from_card(turn.card),
        };

        let resume_at = if turn.force_restart {
            None
        } else {
            turn.card
                .live_bot_state(OffsetDateTime::now_utc(), self.config.staleness)
                .and_then(|state| state.current_node_id.clone())
        };

        let next = match resume_at {
            Some(node_id) => match self.process_input(&mut ctx, &node_id).await? {
                Resume::Next(next) => next,
                Resume::Done(outcome) => return Ok(outcome),
            },
            None => match index.entry() {
                Some(entry) => entry.to_string(),
                None => {
                    tracing::warn!("flow has no start node with an outgoing edge");
                    return Ok(TurnOutcome::Idle);
                }
            },
        };

        self.run_forward(&mut ctx, next).await
    }

    /// Applies the reply to the node the previous turn suspended at.
    async fn process_input(
        &self,
        ctx: &mut TurnCtx<'_>,
        node_id: &str,
    ) -> Result<Resume, EngineError> {
        if let Some(message_id) = ctx.turn.message_id {
            if let Err(err) = ctx.adapter.mark_as_read(message_id).await {
                tracing::warn!(error = %err, message_id, "read receipt failed");
            }
        }
        tokio::time::sleep(self.config.settle).await;

        let Some(node) = ctx.index.node(node_id) else {
            tracing::warn!(node_id, "saved bot position is not in the flow");
            return Ok(Resume::Done(TurnOutcome::Idle));
        };

        if node.kind == NodeKind::CaptureInputNode && !self.capture(ctx, node).await? {
            return Ok(Resume::Done(TurnOutcome::InvalidInput {
                node_id: node.id.clone(),
            }));
        }

        let edges = ctx.index.outgoing(node_id);
        let target = match edges.len() {
            0 => {
                self.complete(ctx.turn.card).await?;
                return Ok(Resume::Done(TurnOutcome::Completed));
            }
            1 => edges[0].target.clone(),
            _ => {
                let handle = match node.kind {
                    NodeKind::QuickReplyNode => match_button(&node.buttons(), ctx.turn.text)
                        .map(str::to_string),
                    NodeKind::ListMessageNode => match_list_row(&node.sections(), ctx.turn.text)
                        .map(str::to_string),
                    _ => None,
                };
                let matched = handle
                    .as_deref()
                    .and_then(|h| ctx.index.target_for_handle(node_id, h));
                if matched.is_none() {
                    tracing::debug!(node_id, "no option matched the reply; taking first edge");
                }
                matched
                    .unwrap_or(edges[0].target.as_str())
                    .to_string()
            }
        };
        Ok(Resume::Next(target))
    }

    /// Validates and stores a capture reply. Returns false when rejected.
    async fn capture(&self, ctx: &mut TurnCtx<'_>, node: &Node) -> Result<bool, EngineError> {
        let input_type = InputType::parse(node.str_field("inputType").as_deref());
        let reply = ctx.turn.text.trim();
        if !validate_input(input_type, reply) {
            let message = node
                .str_field("errorMessage")
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
            tracing::info!(node_id = %node.id, "capture input rejected");
            self.send_text(ctx, &message).await?;
            return Ok(false);
        }

        let var = variable_name(node);
        let card_id = &ctx.turn.card.id;
        if is_name_variable(&var) {
            let name = extract_name(reply, self.names);
            self.ledger.save_custom_field(card_id, &var, &name).await?;
            self.ledger.update_contact_name(card_id, &name).await?;
            ctx.vars.custom_fields.insert(var, name);
        } else {
            self.ledger.save_custom_field(card_id, &var, reply).await?;
            ctx.vars.custom_fields.insert(var, reply.to_string());
        }
        Ok(true)
    }

    async fn run_forward(
        &self,
        ctx: &mut TurnCtx<'_>,
        first: String,
    ) -> Result<TurnOutcome, EngineError> {
        let card_id = ctx.turn.card.id.clone();
        let mut current = Some(first);
        let mut steps = 0;
        let mut last_processed: Option<String> = None;

        while let Some(node_id) = current.take() {
            if steps >= self.config.max_steps {
                tracing::warn!(steps, node_id = %node_id, "step limit reached; stopping turn");
                return Ok(TurnOutcome::StepLimit {
                    node_id: last_processed.unwrap_or(node_id),
                });
            }
            let Some(node) = ctx.index.node(&node_id) else {
                tracing::warn!(node_id = %node_id, "edge points at a missing node");
                return Ok(TurnOutcome::Idle);
            };
            steps += 1;

            self.ledger
                .update_bot_state(
                    &card_id,
                    BotState::active_at(&node.id, OffsetDateTime::now_utc()),
                )
                .await?;
            hub_telemetry::record_bot_step(node.kind.as_str());
            tracing::debug!(node_id = %node.id, node_type = node.kind.as_str(), "executing node");

            if let Step::Suspend = self.execute(ctx, node).await? {
                return Ok(TurnOutcome::Suspended {
                    node_id: node.id.clone(),
                });
            }
            last_processed = Some(node.id.clone());

            current = match node.kind {
                NodeKind::ConditionNode => ctx
                    .index
                    .target_for_handle(&node.id, "true")
                    .or_else(|| ctx.index.default_target(&node.id)),
                _ => ctx.index.default_target(&node.id),
            }
            .map(str::to_string);
        }

        self.complete(ctx.turn.card).await?;
        Ok(TurnOutcome::Completed)
    }

    async fn execute(&self, ctx: &TurnCtx<'_>, node: &Node) -> Result<Step, EngineError> {
        let to = ctx.turn.recipient;
        match node.kind {
            NodeKind::TextMessageNode => {
                let text = render_template(&node.body(), &ctx.vars);
                self.typing(node, &text).await;
                if !text.trim().is_empty() {
                    self.send_text(ctx, &text).await?;
                }
                Ok(Step::Continue)
            }
            NodeKind::MediaMessageNode => {
                let caption = render_template(
                    &node.str_field("caption").unwrap_or_else(|| node.body()),
                    &ctx.vars,
                );
                self.typing(node, &caption).await;
                if let Some(url) = node.str_field("url") {
                    let kind = MediaKind::detect(node.str_field("mediaType").as_deref(), &url);
                    ctx.adapter
                        .send_media_message(to, &url, &caption, kind)
                        .await?;
                    self.log_outbound(ctx, &format!("[Archivo] {caption}")).await?;
                }
                Ok(Step::Continue)
            }
            NodeKind::QuickReplyNode => {
                let text = render_template(&node.body(), &ctx.vars);
                self.typing(node, &text).await;
                let buttons = node.buttons();
                if buttons.is_empty() {
                    if !text.trim().is_empty() {
                        self.send_text(ctx, &text).await?;
                    }
                    return Ok(Step::Continue);
                }
                ctx.adapter.send_button_message(to, &text, &buttons).await?;
                self.log_outbound(ctx, &text).await?;
                Ok(Step::Suspend)
            }
            NodeKind::ListMessageNode => {
                let text = render_template(&node.body(), &ctx.vars);
                self.typing(node, &text).await;
                let sections = node.sections();
                if sections.is_empty() {
                    if !text.trim().is_empty() {
                        self.send_text(ctx, &text).await?;
                    }
                    return Ok(Step::Continue);
                }
                let label = node
                    .str_field("buttonText")
                    .unwrap_or_else(|| DEFAULT_LIST_BUTTON.to_string());
                ctx.adapter
                    .send_list_message(to, &text, &label, &sections)
                    .await?;
                self.log_outbound(ctx, &text).await?;
                Ok(Step::Suspend)
            }
            NodeKind::LocationNode => {
                if let Some(latitude) = node.f64_field("latitude") {
                    let longitude = node.f64_field("longitude").unwrap_or_default();
                    let name = node.str_field("name").unwrap_or_default();
                    let address = node.str_field("address").unwrap_or_default();
                    ctx.adapter
                        .send_location_message(to, latitude, longitude, &name, &address)
                        .await?;
                    let label = if name.is_empty() {
                        "[Ubicación]".to_string()
                    } else {
                        format!("[Ubicación] {name}")
                    };
                    self.log_outbound(ctx, &label).await?;
                }
                Ok(Step::Continue)
            }
            NodeKind::DelayNode => {
                tokio::time::sleep(delay_node_duration(node)).await;
                Ok(Step::Continue)
            }
            NodeKind::CaptureInputNode => Ok(Step::Suspend),
            NodeKind::ConditionNode | NodeKind::StartNode | NodeKind::Unknown => {
                Ok(Step::Continue)
            }
        }
    }

    async fn typing(&self, node: &Node, text: &str) {
        if node.kind.emits_message() && node.typing_simulation() {
            tokio::time::sleep(typing_delay(text.chars().count())).await;
        }
    }

    async fn send_text(&self, ctx: &TurnCtx<'_>, text: &str) -> Result<(), EngineError> {
        ctx.adapter.send_message(ctx.turn.recipient, text).await?;
        self.log_outbound(ctx, text).await
    }

    async fn log_outbound(&self, ctx: &TurnCtx<'_>, text: &str) -> Result<(), EngineError> {
        self.ledger
            .append_agent_message(
                &ctx.turn.card.id,
                Sender::Bot(Some(ctx.turn.bot.id.clone())),
                text,
            )
            .await?;
        Ok(())
    }

    async fn complete(&self, card: &ConversationCard) -> Result<(), EngineError> {
        self.ledger
            .update_bot_state(&card.id, BotState::completed(OffsetDateTime::now_utc()))
            .await?;
        tracing::info!(card_id = %card.id, "bot flow completed");
        Ok(())
    }
}

struct TurnCtx<'a> {
    adapter: &'a dyn MessagingAdapter,
    turn: Turn<'a>,
    index: &'a FlowIndex<'a>,
    vars: TemplateVars,
}
