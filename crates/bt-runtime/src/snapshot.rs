use bt_core::{NodeGuid, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Saved scheduler state of one module: its live nodes and tick queue, keyed by node guid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub module: String,
    pub tick: u64,
    pub nodes: Vec<NodeSnapshot>,
    #[serde(default)]
    pub queue: Vec<NodeGuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeGuid,
    #[serde(default)]
    pub name: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl ModuleSnapshot {
    pub fn node(&self, id: NodeGuid) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains(&self, id: NodeGuid) -> bool {
        self.node(id).is_some()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Snapshot of every module of a [`Graph`](crate::Graph), root module first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub modules: Vec<ModuleSnapshot>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
