use crate::graph::{GraphModel, GraphView};
use crate::memory::{MemoryLedger, MemoryTier};
use crate::messages::MessageLog;
use crate::workspace::WorkspaceView;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub permanent: String,
    pub task: String,
    pub volatile: String,
}

/// Self-contained copy of the canvas at one instant.
///
/// Field names are bound by the dashboard frontend and must stay stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub graph: GraphView,
    pub workspace: String,
    pub memory: MemorySnapshot,
    pub messages: String,
    #[serde(default)]
    pub revision: u64,
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn render(
    graph: &GraphModel,
    workspace: &WorkspaceView,
    memory: &MemoryLedger,
    messages: &MessageLog,
    revision: u64,
) -> Snapshot {
    Snapshot {
        graph: graph.render(),
        workspace: workspace.render(),
        memory: MemorySnapshot {
            permanent: memory.render(MemoryTier::Permanent).to_string(),
            task: memory.render(MemoryTier::Task).to_string(),
            volatile: memory.render(MemoryTier::Volatile).to_string(),
        },
        messages: messages.render(),
        revision,
    }
}
