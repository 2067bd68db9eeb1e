//! Event-driven behavior graph runtime.
//!
//! A [`GraphModule`] owns an arena of nodes and schedules them: nodes are started by their
//! parents, updated from a FIFO tick queue while `Running`, suspended while `Waiting`, and
//! awakened when a child completes or a watched blackboard variable changes. A [`Graph`] groups a
//! root module with the subgraph modules it runs.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod module;
pub mod node;
pub mod nodes;
pub mod snapshot;

pub use builder::GraphBuilder;
pub use config::SchedulerConfig;
pub use context::NodeContext;
pub use error::{ConfigError, GraphError, Result};
pub use graph::{share, Graph, ModuleHandle};
pub use module::{GraphModule, StatusChanged, StatusListener};
pub use node::{Behavior, Node, NodeId, NodeKind};
pub use snapshot::{GraphSnapshot, ModuleSnapshot, NodeSnapshot};

pub use bt_core::{Blackboard, NodeGuid, Outcome, Status, TickContext};
