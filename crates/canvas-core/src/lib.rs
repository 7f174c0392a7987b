//! Live model behind the agent canvas dashboard.
//!
//! Agents report steps, memory writes, file updates and messages; the
//! [`StateAggregator`] folds them into an interaction graph, three memory
//! tiers, a workspace projection and a message log, and renders a
//! [`Snapshot`] for the polling frontend.

pub mod aggregator;
pub mod error;
pub mod graph;
pub mod memory;
pub mod messages;
pub mod report;
pub mod snapshot;
pub mod workspace;

pub use aggregator::StateAggregator;
pub use error::CanvasError;
pub use report::{
    FileUpdateReport, FullSnapshotReport, MemoryWriteReport, MessageReport, Report, StepReport,
};
pub use snapshot::Snapshot;
