//! Resolves a contact's reply against the options of an interactive node.

use hub_core::{Button, ListSection};

/// Handle of the button the reply selects: title match (case-insensitive,
/// trimmed) or exact id match.
pub fn match_button<'a>(buttons: &'a [Button], reply: &str) -> Option<&'a str> {
    let wanted = reply.trim().to_lowercase();
    buttons
        .iter()
        .find(|b| b.title.trim().to_lowercase() == wanted || b.id == reply)
        .map(|b| b.id.as_str())
}

/// Same rule as [`match_button`] across every row of every section.
pub fn match_list_row<'a>(sections: &'a [ListSection], reply: &str) -> Option<&'a str> {
    let wanted = reply.trim().to_lowercase();
    sections
        .iter()
        .flat_map(|s| s.rows.iter())
        .find(|r| r.title.trim().to_lowercase() == wanted || r.id == reply)
        .map(|r| r.id.as_str())
}
