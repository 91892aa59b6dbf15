use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// A visual bot: metadata plus the flow graph it executes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BotDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub flow: Flow,
}

/// Explicit record naming the single bot that answers inbound messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBotPointer {
    pub bot_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    StartNode,
    TextMessageNode,
    MediaMessageNode,
    QuickReplyNode,
    ListMessageNode,
    LocationNode,
    DelayNode,
    ConditionNode,
    CaptureInputNode,
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::StartNode => "startNode",
            NodeKind::TextMessageNode => "textMessageNode",
            NodeKind::MediaMessageNode => "mediaMessageNode",
            NodeKind::QuickReplyNode => "quickReplyNode",
            NodeKind::ListMessageNode => "listMessageNode",
            NodeKind::LocationNode => "locationNode",
            NodeKind::DelayNode => "delayNode",
            NodeKind::ConditionNode => "conditionNode",
            NodeKind::CaptureInputNode => "captureInputNode",
            NodeKind::Unknown => "unknown",
        }
    }

    /// Node types that send a chat bubble and get typing simulation.
    pub fn emits_message(&self) -> bool {
        matches!(
            self,
            NodeKind::TextMessageNode
                | NodeKind::MediaMessageNode
                | NodeKind::QuickReplyNode
                | NodeKind::ListMessageNode
        )
    }

    /// Node types allowed to branch over several outgoing edges.
    pub fn branches(&self) -> bool {
        matches!(
            self,
            NodeKind::QuickReplyNode | NodeKind::ListMessageNode | NodeKind::ConditionNode
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, data: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            data: match data {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// String field; numbers are stringified, blank strings count as absent.
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric field, accepting numbers or numeric strings.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        match self.data.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Message body: `content`, falling back to `text`.
    pub fn body(&self) -> String {
        self.str_field("content")
            .or_else(|| self.str_field("text"))
            .unwrap_or_default()
    }

    /// Typing simulation is on unless explicitly disabled.
    pub fn typing_simulation(&self) -> bool {
        !matches!(self.data.get("typingSimulation"), Some(Value::Bool(false)))
    }

    /// Buttons with blank or `"undefined"` titles removed; a missing id falls back to the title.
    pub fn buttons(&self) -> Vec<Button> {
        let Some(Value::Array(items)) = self.data.get("buttons") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let title = usable_title(item.get("title").or_else(|| item.get("text")))?;
                let id = item
                    .get("id")
                    .and_then(scalar_string)
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| title.clone());
                Some(Button { id, title })
            })
            .collect()
    }

    /// List sections with blank rows and empty sections removed.
    ///
    /// Legacy nodes that only carry `options: [String]` get one synthetic section.
    pub fn sections(&self) -> Vec<ListSection> {
        if let Some(Value::Array(raw_sections)) = self.data.get("sections") {
            return raw_sections
                .iter()
                .enumerate()
                .filter_map(|(idx, section)| {
                    let rows: Vec<ListRow> = section
                        .get("rows")
                        .and_then(Value::as_array)
                        .map(|rows| rows.iter().filter_map(parse_row).collect())
                        .unwrap_or_default();
                    if rows.is_empty() {
                        return None;
                    }
                    let title = section
                        .get("title")
                        .and_then(scalar_string)
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| format!("Sección {}", idx + 1));
                    Some(ListSection { title, rows })
                })
                .collect();
        }

        let Some(Value::Array(options)) = self.data.get("options") else {
            return Vec::new();
        };
        let rows: Vec<ListRow> = options
            .iter()
            .enumerate()
            .filter_map(|(idx, opt)| {
                let title = usable_title(Some(opt))?;
                Some(ListRow {
                    id: format!("option_{idx}"),
                    title,
                    description: None,
                })
            })
            .collect();
        if rows.is_empty() {
            return Vec::new();
        }
        vec![ListSection {
            title: "Opciones".into(),
            rows,
        }]
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn usable_title(value: Option<&Value>) -> Option<String> {
    let title = scalar_string(value?)?;
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed == "undefined" {
        return None;
    }
    Some(trimmed.to_string())
}

fn parse_row(row: &Value) -> Option<ListRow> {
    let title = usable_title(row.get("title"))?;
    let id = row
        .get("id")
        .and_then(scalar_string)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| title.clone());
    let description = row
        .get("description")
        .and_then(scalar_string)
        .filter(|d| !d.trim().is_empty());
    Some(ListRow {
        id,
        title,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_kind_parses_camel_case_and_unknown() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "type": "quickReplyNode",
            "data": {}
        }))
        .unwrap();
        assert_eq!(node.kind, NodeKind::QuickReplyNode);

        let odd: Node = serde_json::from_value(json!({"id": "n2", "type": "webhookNode"})).unwrap();
        assert_eq!(odd.kind, NodeKind::Unknown);
    }

    #[test]
    fn buttons_drop_blank_and_undefined_titles() {
        let node = Node::new(
            "q",
            NodeKind::QuickReplyNode,
            json!({"buttons": [
                {"id": "a", "title": "Sí"},
                {"id": "b", "title": "  "},
                {"id": "c", "title": "undefined"},
                {"title": "Tal vez"}
            ]}),
        );
        let buttons = node.buttons();
        assert_eq!(
            buttons,
            vec![
                Button { id: "a".into(), title: "Sí".into() },
                Button { id: "Tal vez".into(), title: "Tal vez".into() },
            ]
        );
    }

    #[test]
    fn legacy_options_become_one_section() {
        let node = Node::new(
            "l",
            NodeKind::ListMessageNode,
            json!({"options": ["Ventas", "", "Soporte"]}),
        );
        let sections = node.sections();
        assert_eq!(sections.len(), 1);
        let titles: Vec<_> = sections[0].rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Ventas", "Soporte"]);
    }

    #[test]
    fn empty_sections_are_removed() {
        let node = Node::new(
            "l",
            NodeKind::ListMessageNode,
            json!({"sections": [
                {"title": "Vacía", "rows": [{"id": "x", "title": ""}]},
                {"title": "Menú", "rows": [{"id": "r1", "title": "Pizza", "description": "grande"}]}
            ]}),
        );
        let sections = node.sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Menú");
        assert_eq!(sections[0].rows[0].description.as_deref(), Some("grande"));
    }

    #[test]
    fn typing_simulation_defaults_on() {
        let on = Node::new("t", NodeKind::TextMessageNode, json!({}));
        let off = Node::new("t", NodeKind::TextMessageNode, json!({"typingSimulation": false}));
        assert!(on.typing_simulation());
        assert!(!off.typing_simulation());
    }
}
