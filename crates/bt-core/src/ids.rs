use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const NODE_NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_0c3e_57a2_4f0e_9d31_b7e4_c2a8_10f5);

/// Stable identity of a node, assigned when the graph is built.
///
/// Used to correlate nodes across snapshots and in logs; scheduling uses dense arena indices
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeGuid(Uuid);

impl NodeGuid {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Deterministic guid for the `index`-th node built in `scope`.
    ///
    /// Rebuilding the same graph yields the same guids, which is what lets a snapshot taken from
    /// one instance be restored into another.
    pub fn derived(scope: &str, index: usize) -> Self {
        let name = format!("{scope}/{index}");
        Self(Uuid::new_v5(&NODE_NAMESPACE, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// 64-bit fold of the guid, suitable for seeding.
    pub fn stable_key(self) -> u64 {
        let v = self.0.as_u128();
        ((v >> 64) as u64) ^ (v as u64)
    }
}

impl fmt::Display for NodeGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable identity of a blackboard variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(Uuid);

impl VariableId {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
