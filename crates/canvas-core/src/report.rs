use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepReport {
    pub agent_name: String,
    #[serde(default)]
    pub thought: String,
    pub tool_call: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryWriteReport {
    pub tier: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileUpdateReport {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageReport {
    pub from_agent: String,
    pub to_agent: String,
    pub message: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "normal".to_string()
}

/// Startup snapshot of an agent system. Memory maps stay raw JSON until the
/// aggregator validates them so one bad tier cannot reject the whole report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FullSnapshotReport {
    pub workspace_tree: String,
    #[serde(default)]
    pub permanent_memory: Value,
    #[serde(default)]
    pub task_memory: Value,
    #[serde(default)]
    pub volatile_memory: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Report {
    Step(StepReport),
    MemoryWrite(MemoryWriteReport),
    FileUpdate(FileUpdateReport),
    MessageSent(MessageReport),
    FullSnapshot(FullSnapshotReport),
}

impl Report {
    pub fn kind(&self) -> &'static str {
        match self {
            Report::Step(_) => "step",
            Report::MemoryWrite(_) => "memory_write",
            Report::FileUpdate(_) => "file_update",
            Report::MessageSent(_) => "message_sent",
            Report::FullSnapshot(_) => "full_snapshot",
        }
    }
}
