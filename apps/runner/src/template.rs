use std::collections::BTreeMap;

use hub_core::{ConversationCard, Platform};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{?\s*([A-Za-z0-9_]+)\s*\}\}?").expect("placeholder regex compiles")
});

const DEFAULT_NAME: &str = "Amigo";

/// Values available to `{{var}}` / `{var}` placeholders during a turn.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub contact_name: Option<String>,
    pub contact_number: Option<String>,
    pub custom_fields: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn from_card(card: &ConversationCard) -> Self {
        // Placeholder names like "WhatsApp User" read worse than the greeting default.
        let generic = Platform::ALL
            .iter()
            .any(|p| p.default_contact_name() == card.contact_name);
        let name = card.contact_name.trim();
        Self {
            contact_name: (!generic && !name.is_empty()).then(|| name.to_string()),
            contact_number: card.contact_number.clone(),
            custom_fields: card.custom_fields.clone(),
        }
    }

    fn lookup(&self, var: &str) -> Option<String> {
        let field = self
            .custom_fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(var))
            .map(|(_, v)| v.clone());
        if field.is_some() {
            return field;
        }
        match var.to_ascii_lowercase().as_str() {
            "name" | "nombre" => Some(
                self.contact_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            ),
            "phone" => self.contact_number.clone(),
            _ => None,
        }
    }
}

/// Replaces placeholders with custom field values; `name`/`nombre` fall back to
/// the card's contact name, then to "Amigo". Unknown variables stay as written.
///
/// ```
/// use hub_runner::{TemplateVars, render_template};
///
/// let mut vars = TemplateVars::default();
/// vars.custom_fields.insert("nombre".into(), "Carlos".into());
/// assert_eq!(render_template("Hola {{Nombre}}!", &vars), "Hola Carlos!");
/// assert_eq!(render_template("Tel: {phone}", &vars), "Tel: {phone}");
/// ```
pub fn render_template(text: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            vars.lookup(&caps[1])
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
