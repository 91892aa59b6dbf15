use std::collections::HashMap;

use hub_core::{Edge, Flow, Node, NodeKind};
use thiserror::Error;

/// Structural problems found in a flow definition. None of them is fatal:
/// the engine treats a broken graph as "the conversation does not advance".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowIssue {
    #[error("flow has no startNode")]
    NoStartNode,
    #[error("flow has {0} startNodes; the first one is used")]
    MultipleStartNodes(usize),
    #[error("edge {from} -> {to} references an unknown node")]
    DanglingEdge { from: String, to: String },
    #[error("{kind} node {node_id} has {edges} outgoing edges but cannot branch")]
    AmbiguousBranch {
        node_id: String,
        kind: &'static str,
        edges: usize,
    },
}

/// Lists structural issues; callers log them when a bot is loaded.
pub fn validate_flow(flow: &Flow) -> Vec<FlowIssue> {
    let index = FlowIndex::build(flow);
    let mut issues = Vec::new();
    match index.starts.len() {
        0 => issues.push(FlowIssue::NoStartNode),
        1 => {}
        n => issues.push(FlowIssue::MultipleStartNodes(n)),
    }
    for edge in &flow.edges {
        if !index.nodes.contains_key(edge.source.as_str())
            || !index.nodes.contains_key(edge.target.as_str())
        {
            issues.push(FlowIssue::DanglingEdge {
                from: edge.source.clone(),
                to: edge.target.clone(),
            });
        }
    }
    for node in &flow.nodes {
        let edges = index.outgoing(&node.id).len();
        if edges > 1 && !node.kind.branches() {
            issues.push(FlowIssue::AmbiguousBranch {
                node_id: node.id.clone(),
                kind: node.kind.as_str(),
                edges,
            });
        }
    }
    issues
}

/// Adjacency index over a borrowed [`Flow`], built once per turn.
///
/// Every edge is indexed, including ones pointing at unknown nodes: following
/// such an edge stops the turn instead of looking like the end of the flow.
/// Outgoing edges keep their declaration order so "first edge" stays meaningful.
pub struct FlowIndex<'a> {
    nodes: HashMap<&'a str, &'a Node>,
    outgoing: HashMap<&'a str, Vec<&'a Edge>>,
    starts: Vec<&'a str>,
}

impl<'a> FlowIndex<'a> {
    pub fn build(flow: &'a Flow) -> Self {
        let mut nodes = HashMap::with_capacity(flow.nodes.len());
        let mut starts = Vec::new();
        for node in &flow.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
            if node.kind == NodeKind::StartNode {
                starts.push(node.id.as_str());
            }
        }
        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &flow.edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }
        Self {
            nodes,
            outgoing,
            starts,
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    pub fn outgoing(&self, id: &str) -> &[&'a Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Target of the first declared outgoing edge.
    pub fn default_target(&self, id: &str) -> Option<&'a str> {
        self.outgoing(id).first().map(|e| e.target.as_str())
    }

    /// Target of the edge keyed by `handle`, if any.
    pub fn target_for_handle(&self, id: &str, handle: &str) -> Option<&'a str> {
        self.outgoing(id)
            .iter()
            .find(|e| e.source_handle.as_deref() == Some(handle))
            .map(|e| e.target.as_str())
    }

    /// First real node: the target of the start node's outgoing edge.
    pub fn entry(&self) -> Option<&'a str> {
        let start = self.starts.first()?;
        self.default_target(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edge(source: &str, target: &str, handle: Option<&str>) -> Edge {
        Edge {
            source: source.into(),
            target: target.into(),
            source_handle: handle.map(str::to_string),
        }
    }

    fn sample() -> Flow {
        Flow {
            nodes: vec![
                Node::new("s", NodeKind::StartNode, json!({})),
                Node::new("q", NodeKind::QuickReplyNode, json!({})),
                Node::new("a", NodeKind::TextMessageNode, json!({})),
                Node::new("b", NodeKind::TextMessageNode, json!({})),
            ],
            edges: vec![
                edge("s", "q", None),
                edge("q", "a", Some("yes")),
                edge("q", "b", Some("no")),
                edge("a", "ghost", None),
            ],
        }
    }

    #[test]
    fn index_answers_adjacency_queries() {
        let flow = sample();
        let index = FlowIndex::build(&flow);
        assert_eq!(index.entry(), Some("q"));
        assert_eq!(index.outgoing("q").len(), 2);
        assert_eq!(index.target_for_handle("q", "no"), Some("b"));
        assert_eq!(index.default_target("q"), Some("a"));
        assert_eq!(index.default_target("a"), Some("ghost"));
        assert!(index.node("ghost").is_none());
        assert!(index.outgoing("b").is_empty());
    }

    #[test]
    fn validation_reports_dangling_and_ambiguous_edges() {
        let mut flow = sample();
        flow.edges.push(edge("b", "a", None));
        flow.edges.push(edge("b", "q", None));
        let issues = validate_flow(&flow);
        assert!(issues.contains(&FlowIssue::DanglingEdge {
            from: "a".into(),
            to: "ghost".into()
        }));
        assert!(issues.iter().any(|i| matches!(
            i,
            FlowIssue::AmbiguousBranch { node_id, edges: 2, .. } if node_id == "b"
        )));
        assert!(!issues.contains(&FlowIssue::NoStartNode));
    }

    #[test]
    fn missing_start_yields_no_entry() {
        let flow = Flow {
            nodes: vec![Node::new("a", NodeKind::TextMessageNode, json!({}))],
            edges: vec![],
        };
        assert!(FlowIndex::build(&flow).entry().is_none());
        assert_eq!(validate_flow(&flow), vec![FlowIssue::NoStartNode]);
    }
}
