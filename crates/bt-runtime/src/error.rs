use std::path::PathBuf;

use bt_core::NodeGuid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The tick loop ran past its wall-clock budget; usually a zero-duration repeat cycle.
    #[error("module `{module}` exceeded its tick budget after {elapsed_ms}ms with {pending} node(s) still queued")]
    TickBudgetExceeded {
        module: String,
        elapsed_ms: u64,
        pending: usize,
    },

    #[error("invalid graph `{module}`: {reason}")]
    Build { module: String, reason: String },

    #[error("state hook failed for node {node}: {source}")]
    NodeState {
        node: NodeGuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot for module `{found}` cannot be restored into module `{expected}`")]
    SnapshotMismatch { expected: String, found: String },

    #[error("module {0} is borrowed by a hook that is still running")]
    ModuleBusy(usize),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
