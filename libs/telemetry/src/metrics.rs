use metrics::counter;
use tracing::Span;

/// Span wrapping one webhook delivery.
pub fn ingress_span(platform: &str, external_id: &str) -> Span {
    tracing::info_span!("ingress", platform = %platform, external_id = %external_id)
}

/// Span wrapping one bot engine turn.
pub fn turn_span(card_id: &str, bot_id: &str) -> Span {
    tracing::info_span!("bot.turn", card_id = %card_id, bot_id = %bot_id)
}

pub fn record_ingress(platform: &str) {
    counter!("hub_messages_ingressed_total", "platform" => platform.to_string()).increment(1);
}

pub fn record_card_created(platform: &str) {
    counter!("hub_cards_created_total", "platform" => platform.to_string()).increment(1);
}

pub fn record_bot_step(node_type: &'static str) {
    counter!("hub_bot_steps_total", "node_type" => node_type).increment(1);
}

/// `outcome` is one of the engine's turn outcomes (`suspended`, `completed`, ...).
pub fn record_bot_turn(outcome: &'static str) {
    counter!("hub_bot_turns_total", "outcome" => outcome).increment(1);
}

pub fn record_adapter_error(platform: &str) {
    counter!("hub_adapter_errors_total", "platform" => platform.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn spans_carry_identifying_fields() {
        let span = ingress_span("whatsapp", "5215500000000");
        let _guard = span.enter();
        tracing::info!("received");
        assert!(logs_contain("ingress"));
        assert!(logs_contain("5215500000000"));
    }

    #[test]
    fn recorders_are_noops_without_a_recorder() {
        record_ingress("telegram");
        record_card_created("telegram");
        record_bot_step("textMessageNode");
        record_bot_turn("completed");
        record_adapter_error("telegram");
    }
}
