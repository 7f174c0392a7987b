use crate::error::CanvasError;
use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;

/// Receiver label addressing every agent at once.
pub const BROADCAST: &str = "all";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl MessagePriority {
    pub fn label(&self) -> &'static str {
        match self {
            MessagePriority::Low => "LOW",
            MessagePriority::Normal => "NORMAL",
            MessagePriority::High => "HIGH",
        }
    }
}

impl FromStr for MessagePriority {
    type Err = CanvasError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "low" => Ok(MessagePriority::Low),
            "normal" => Ok(MessagePriority::Normal),
            "high" => Ok(MessagePriority::High),
            _ => Err(CanvasError::InvalidPriority(input.to_string())),
        }
    }
}

/// Agent traffic, newest entry first.
///
/// Ordering is by insertion only; stamps are display text and never compared.
/// Reported text is HTML-escaped since the dashboard renders the log as markup.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: VecDeque<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        stamp: &str,
        from: &str,
        to: &str,
        body: &str,
        priority: MessagePriority,
    ) {
        let entry = format!(
            "- **{stamp} [{}] {} → {}**: {}\n",
            priority.label(),
            encode_text(from),
            encode_text(to),
            encode_text(body)
        );
        self.entries.push_front(entry);
    }

    pub fn append_step(&mut self, stamp: &str, agent: &str, thought: &str, tool_call: &str) {
        let entry = format!(
            "### {stamp} - {}\n**Thought:** {}\n**Action:** {}\n---\n",
            encode_text(agent),
            encode_text(thought),
            encode_text(tool_call)
        );
        self.entries.push_front(entry);
    }

    pub fn render(&self) -> String {
        self.entries.iter().map(String::as_str).collect()
    }
}
