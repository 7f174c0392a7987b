use crate::error::CanvasError;
use crate::graph::GraphModel;
use crate::memory::{parse_memory_map, MemoryLedger, MemoryMap, MemoryTier};
use crate::messages::{MessageLog, MessagePriority};
use crate::report::{FullSnapshotReport, Report};
use crate::snapshot::{self, Snapshot};
use crate::workspace::{parse_tree, WorkspaceView};
use chrono::Local;
use serde_json::Value;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Produces the display stamp attached to log entries.
pub type Clock = fn() -> String;

pub fn local_clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[derive(Debug, Default)]
struct CanvasModel {
    graph: GraphModel,
    memory: MemoryLedger,
    workspace: WorkspaceView,
    messages: MessageLog,
    revision: u64,
}

impl CanvasModel {
    fn render(&self) -> Snapshot {
        snapshot::render(
            &self.graph,
            &self.workspace,
            &self.memory,
            &self.messages,
            self.revision,
        )
    }
}

/// Process-wide accumulator of agent reports.
///
/// Every ingestion runs under the write lock and every snapshot under the read
/// lock, so a snapshot never observes half of a report.
#[derive(Debug)]
pub struct StateAggregator {
    model: RwLock<CanvasModel>,
    clock: Clock,
}

impl Default for StateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateAggregator {
    pub fn new() -> Self {
        Self::with_clock(local_clock)
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            model: RwLock::new(CanvasModel::default()),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CanvasModel> {
        self.model.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CanvasModel> {
        self.model.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn report_step(
        &self,
        agent_name: &str,
        thought: &str,
        tool_call: &str,
    ) -> Result<String, CanvasError> {
        let stamp = (self.clock)();
        let mut model = self.write();
        model.graph.add_interaction(agent_name, tool_call);
        model
            .messages
            .append_step(&stamp, agent_name, thought, tool_call);
        model.revision += 1;
        Ok(format!("Step from {agent_name} reported to Canvas."))
    }

    pub fn report_memory_write(
        &self,
        tier: &str,
        key: &str,
        value: &str,
    ) -> Result<String, CanvasError> {
        let parsed: MemoryTier = tier.parse()?;
        let stamp = (self.clock)();
        let mut model = self.write();
        model.memory.write(parsed, &stamp, key, value);
        model.revision += 1;
        Ok(format!("Memory write to '{parsed}' tier reported."))
    }

    pub fn report_file_update(&self, path: &str, content: &str) -> Result<String, CanvasError> {
        let mut model = self.write();
        model.workspace.update_file(path, content);
        model.revision += 1;
        Ok(format!("File update for {path} reported to Canvas."))
    }

    pub fn report_message_sent(
        &self,
        from_agent: &str,
        to_agent: &str,
        message: &str,
        priority: &str,
    ) -> Result<String, CanvasError> {
        let priority: MessagePriority = priority.parse()?;
        let stamp = (self.clock)();
        let mut model = self.write();
        model.graph.add_message_edge(from_agent, to_agent);
        model
            .messages
            .append(&stamp, from_agent, to_agent, message, priority);
        model.revision += 1;
        Ok("Message reported.".to_string())
    }

    /// Applies a startup snapshot on a best-effort basis.
    ///
    /// Each part (tree, then each memory tier) is validated on its own; the
    /// valid parts are applied together under one lock and the failures are
    /// returned as [`CanvasError::SnapshotIncomplete`]. Nothing is rolled back.
    pub fn report_full_snapshot(
        &self,
        workspace_tree: &str,
        permanent_memory: &Value,
        task_memory: &Value,
        volatile_memory: Option<&Value>,
    ) -> Result<String, CanvasError> {
        let mut errors = Vec::new();

        let tree = match parse_tree(workspace_tree) {
            Ok(tree) => Some(tree),
            Err(err) => {
                errors.push(err);
                None
            }
        };

        let payloads = [
            (MemoryTier::Permanent, Some(permanent_memory)),
            (MemoryTier::Task, Some(task_memory)),
            (MemoryTier::Volatile, volatile_memory),
        ];
        let mut tiers: Vec<(MemoryTier, MemoryMap)> = Vec::new();
        for (tier, payload) in payloads {
            let Some(payload) = payload else {
                continue;
            };
            match parse_memory_map(tier, payload) {
                Ok(Some(map)) => tiers.push((tier, map)),
                Ok(None) => {}
                Err(err) => errors.push(err),
            }
        }

        if tree.is_some() || !tiers.is_empty() {
            let mut model = self.write();
            if let Some(tree) = tree {
                model.workspace.set_tree(tree);
            }
            for (tier, map) in &tiers {
                model.memory.replace_tier(*tier, map);
            }
            model.revision += 1;
        }

        if errors.is_empty() {
            Ok("Full state snapshot received.".to_string())
        } else {
            Err(CanvasError::SnapshotIncomplete(errors))
        }
    }

    pub fn ingest(&self, report: &Report) -> Result<String, CanvasError> {
        match report {
            Report::Step(step) => {
                self.report_step(&step.agent_name, &step.thought, &step.tool_call)
            }
            Report::MemoryWrite(write) => {
                self.report_memory_write(&write.tier, &write.key, &write.value)
            }
            Report::FileUpdate(update) => self.report_file_update(&update.path, &update.content),
            Report::MessageSent(message) => self.report_message_sent(
                &message.from_agent,
                &message.to_agent,
                &message.message,
                &message.priority,
            ),
            Report::FullSnapshot(full) => self.apply_full_snapshot(full),
        }
    }

    pub fn apply_full_snapshot(&self, report: &FullSnapshotReport) -> Result<String, CanvasError> {
        self.report_full_snapshot(
            &report.workspace_tree,
            &report.permanent_memory,
            &report.task_memory,
            report.volatile_memory.as_ref(),
        )
    }

    /// Renders the whole canvas while holding the read lock once.
    pub fn snapshot(&self) -> Snapshot {
        self.read().render()
    }

    /// Count of successful mutations since start.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }
}
