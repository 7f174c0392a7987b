use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanvasError {
    #[error("invalid memory tier '{0}' (expected permanent, task or volatile)")]
    InvalidTier(String),
    #[error("invalid priority '{0}' (expected low, normal or high)")]
    InvalidPriority(String),
    #[error("error parsing workspace tree: {0}")]
    MalformedTree(String),
    #[error("workspace tree nests {depth} levels deep, limit is {limit}")]
    TreeTooDeep { depth: usize, limit: usize },
    #[error("error parsing {tier} memory data: {reason}")]
    MalformedMemoryMap { tier: String, reason: String },
    #[error("snapshot applied partially: {}", join_errors(.0))]
    SnapshotIncomplete(Vec<CanvasError>),
}

fn join_errors(errors: &[CanvasError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
