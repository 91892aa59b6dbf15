//! Flow interpreter for visual bots.
//!
//! A bot's graph is walked one contact turn at a time: [`BotEngine::run_turn`]
//! consumes the reply at the node the previous turn stopped at, then runs
//! forward through automatic nodes until one needs input or the graph ends.
//! The position is persisted on the conversation card through the ledger, so
//! the engine itself holds no per-contact state.

mod capture;
mod engine;
mod extract;
mod graph;
mod matching;
mod pacing;
mod template;

pub use capture::{DEFAULT_ERROR_MESSAGE, is_name_variable, variable_name};
pub use engine::{BotEngine, EngineConfig, EngineError, Turn, TurnOutcome};
pub use extract::{NamePatterns, extract_name};
pub use graph::{FlowIndex, FlowIssue, validate_flow};
pub use matching::{match_button, match_list_row};
pub use pacing::{delay_node_duration, typing_delay};
pub use template::{TemplateVars, render_template};
