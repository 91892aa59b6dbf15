use std::time::Duration;

use hub_core::Node;

const TYPING_BASE_MS: u64 = 100;
const TYPING_MIN_MS: u64 = 500;
const TYPING_MAX_MS: u64 = 2000;
const CHARS_PER_SECOND: u64 = 50;
const DEFAULT_DELAY_SECS: f64 = 2.0;

/// Simulated typing time for a message of `chars` characters: a fixed base
/// plus reading-speed time clamped to [500, 2000] ms.
///
/// ```
/// use hub_runner::typing_delay;
/// use std::time::Duration;
///
/// assert_eq!(typing_delay(0), Duration::from_millis(600));
/// assert_eq!(typing_delay(100_000), Duration::from_millis(2100));
/// ```
pub fn typing_delay(chars: usize) -> Duration {
    let scaled = (chars as u64).saturating_mul(1000) / CHARS_PER_SECOND;
    Duration::from_millis(TYPING_BASE_MS + scaled.clamp(TYPING_MIN_MS, TYPING_MAX_MS))
}

/// `data.duration` seconds, defaulting to 2. Negative or invalid values sleep zero.
pub fn delay_node_duration(node: &Node) -> Duration {
    let secs = node.f64_field("duration").unwrap_or(DEFAULT_DELAY_SECS);
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
