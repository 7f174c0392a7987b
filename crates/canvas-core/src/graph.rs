use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delimiter wrapped around a label to mark it as a tool invocation node.
pub const TOOL_DELIMITER: char = '`';

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Agent,
    Tool,
}

impl NodeCategory {
    /// Category is derived from label shape, never stored alongside the node.
    pub fn of_label(label: &str) -> Self {
        let wrapped = label.len() >= 2
            && label.starts_with(TOOL_DELIMITER)
            && label.ends_with(TOOL_DELIMITER);
        if wrapped {
            NodeCategory::Tool
        } else {
            NodeCategory::Agent
        }
    }
}

/// Builds the tool node label for a call expression such as `search(x, y)`.
///
/// Everything before the first `(` is the callable name; an expression
/// without a parenthesis is used whole.
pub fn tool_label(call_expression: &str) -> String {
    let name = call_expression
        .split_once('(')
        .map(|(name, _)| name)
        .unwrap_or(call_expression);
    format!("{TOOL_DELIMITER}{name}{TOOL_DELIMITER}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    seq: u64,
    from: String,
    to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeView {
    pub id: String,
    pub label: String,
    #[serde(rename = "group")]
    pub category: NodeCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeView {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default = "default_arrows")]
    pub arrows: String,
}

fn default_arrows() -> String {
    "to".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

/// Agent/tool interaction graph: a node set plus a multiset of directed edges.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: BTreeSet<String>,
    edges: Vec<Edge>,
    next_seq: u64,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `agent → tool` for one tool call and returns the tool label.
    pub fn add_interaction(&mut self, agent_label: &str, tool_call_expression: &str) -> String {
        let tool = tool_label(tool_call_expression);
        self.link(agent_label, &tool);
        tool
    }

    pub fn add_message_edge(&mut self, from_label: &str, to_label: &str) {
        self.link(from_label, to_label);
    }

    fn link(&mut self, from: &str, to: &str) {
        self.nodes.insert(from.to_string());
        self.nodes.insert(to.to_string());
        self.edges.push(Edge {
            seq: self.next_seq,
            from: from.to_string(),
            to: to.to_string(),
        });
        self.next_seq += 1;
    }

    pub fn render(&self) -> GraphView {
        let nodes = self
            .nodes
            .iter()
            .map(|label| NodeView {
                id: label.clone(),
                label: label.clone(),
                category: NodeCategory::of_label(label),
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|edge| EdgeView {
                id: format!("e{}", edge.seq),
                from: edge.from.clone(),
                to: edge.to.clone(),
                arrows: default_arrows(),
            })
            .collect();
        GraphView { nodes, edges }
    }
}
