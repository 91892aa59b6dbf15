use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

/// Format a capture node expects from the contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    #[default]
    Text,
    Email,
}

impl InputType {
    /// Unrecognized or missing kinds accept any non-blank text.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("email") => InputType::Email,
            _ => InputType::Text,
        }
    }
}

/// Returns true when `input` is acceptable for `input_type`.
///
/// Blank input is never valid.
///
/// ```
/// use hub_core::{InputType, validate_input};
///
/// assert!(validate_input(InputType::Email, " a@b.com "));
/// assert!(!validate_input(InputType::Email, "notanemail"));
/// assert!(!validate_input(InputType::Text, "   "));
/// ```
pub fn validate_input(input_type: InputType, input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return false;
    }
    match input_type {
        InputType::Email => EMAIL.is_match(trimmed),
        InputType::Text => true,
    }
}
