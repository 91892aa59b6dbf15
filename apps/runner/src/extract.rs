//! Pulls a person's name out of a free-text reply.

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_VERBATIM_WORDS: usize = 3;
const MAX_FALLBACK_CHARS: usize = 50;

/// Words that end a captured name ("me llamo Ana y quiero...").
const CONNECTORS: [&str; 8] = ["y", "e", "and", "but", "pero", "mas", "que", "from"];

/// Locale-specific introductions; each pattern exposes the name as `name`.
#[derive(Debug, Clone)]
pub struct NamePatterns {
    patterns: Vec<Regex>,
}

static DEFAULT_PATTERNS: Lazy<NamePatterns> = Lazy::new(|| {
    NamePatterns::new([
        // es
        r"(?i)\b(?:me llamo|mi nombre es|mi nombre:)\s+(?P<name>.+)",
        // en
        r"(?i)\b(?:my name is|my name's|call me)\s+(?P<name>.+)",
        // pt
        r"(?i)(?:\bmeu nome é|\bme chamo|\bchamo-me)\s+(?P<name>.+)",
    ])
    .expect("built-in name patterns compile")
});

impl NamePatterns {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self, regex::Error> {
        let patterns = patterns
            .into_iter()
            .map(Regex::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Appends another locale's patterns.
    pub fn extend<'a>(
        mut self,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, regex::Error> {
        for pattern in patterns {
            self.patterns.push(Regex::new(pattern)?);
        }
        Ok(self)
    }

    /// Spanish, English and Portuguese introductions.
    pub fn builtin() -> &'static NamePatterns {
        &DEFAULT_PATTERNS
    }

    fn find(&self, input: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            let raw = re.captures(input)?.name("name")?.as_str();
            let name = clean_name(raw);
            (!name.is_empty()).then_some(name)
        })
    }
}

/// Up to three words of the captured tail, stopping at punctuation or a connector.
fn clean_name(raw: &str) -> String {
    let head = raw
        .split(|c: char| matches!(c, ',' | '.' | '!' | '?' | ';' | ':' | '\n'))
        .next()
        .unwrap_or_default();
    head.split_whitespace()
        .take_while(|w| !CONNECTORS.contains(&w.to_lowercase().as_str()))
        .take(MAX_VERBATIM_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Best-effort name from a reply.
///
/// Pattern matches win; otherwise short replies are taken verbatim and long
/// ones are truncated.
///
/// ```
/// use hub_runner::{NamePatterns, extract_name};
///
/// let patterns = NamePatterns::builtin();
/// assert_eq!(extract_name("Hola, me llamo Juan Pérez", patterns), "Juan Pérez");
/// assert_eq!(extract_name("ok", patterns), "ok");
/// ```
pub fn extract_name(input: &str, patterns: &NamePatterns) -> String {
    let trimmed = input.trim();
    if let Some(name) = patterns.find(trimmed) {
        return name;
    }
    if trimmed.split_whitespace().count() <= MAX_VERBATIM_WORDS {
        return trimmed.to_string();
    }
    if trimmed.chars().count() > MAX_FALLBACK_CHARS {
        let cut: String = trimmed.chars().take(MAX_FALLBACK_CHARS).collect();
        return format!("{cut}...");
    }
    trimmed.to_string()
}
