use core::fmt;

use bt_core::{NodeGuid, Status, VariableChange};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::NodeContext;

/// Dense index of a node inside its module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural shape of a node. Child slots may be empty; an empty slot reports `Success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Action,
    Modifier { child: Option<NodeId> },
    Composite { children: Vec<Option<NodeId>> },
    /// The only kind that may have several parents.
    Join {
        parents: Vec<NodeId>,
        child: Option<NodeId>,
    },
}

impl NodeKind {
    pub fn is_join(&self) -> bool {
        matches!(self, NodeKind::Join { .. })
    }

    /// Child slots in declaration order, including empty ones.
    pub fn slots(&self) -> &[Option<NodeId>] {
        match self {
            NodeKind::Action => &[],
            NodeKind::Modifier { child } | NodeKind::Join { child, .. } => {
                std::slice::from_ref(child)
            }
            NodeKind::Composite { children } => children.as_slice(),
        }
    }

    /// Non-empty children in declaration order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.slots().iter().flatten().copied()
    }
}

/// Per-node hooks invoked by the scheduler.
///
/// A behavior is checked out of its arena slot for the duration of a hook, so hooks may freely
/// start, end or awaken any node (including their own children) through the [`NodeContext`].
pub trait Behavior: 'static {
    /// Begins an activation. The node's status is `Uninitialized` when this is called.
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status;

    /// Called when the node is popped from the tick queue (always `Running` at that point).
    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        cx.status()
    }

    /// Called once per activation when the node leaves the active set, for any reason.
    fn on_end(&mut self, _cx: &mut NodeContext<'_>) {}

    /// Joins only: another parent arrived while the join was already active.
    fn on_rejoin(&mut self, cx: &mut NodeContext<'_>) -> Status {
        cx.status()
    }

    /// A watched variable changed. Returning `true` awakens the node.
    fn on_notify(&mut self, _cx: &mut NodeContext<'_>, _change: &VariableChange) -> bool {
        true
    }

    /// Transient per-activation state to carry in a snapshot.
    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        Ok(None)
    }

    /// Restores [`Behavior::save_state`] output. Called once for every live node after the
    /// scheduler state is rebuilt, with `None` when the snapshot carried no state for it.
    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        _state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// One arena slot.
pub struct Node {
    pub(crate) guid: NodeGuid,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) status: Status,
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    /// Started with `Running` during the tick in progress; its first update is deferred.
    pub(crate) fresh: bool,
}

impl Node {
    pub(crate) fn new(guid: NodeGuid, name: String, kind: NodeKind, behavior: Box<dyn Behavior>) -> Self {
        Self {
            guid,
            name,
            kind,
            parent: None,
            status: Status::Uninitialized,
            behavior: Some(behavior),
            fresh: false,
        }
    }

    pub fn guid(&self) -> NodeGuid {
        self.guid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Every parent: the join's parent set, or the single structural parent.
    pub fn parents(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Join { parents, .. } => parents.as_slice(),
            _ => self.parent.as_slice(),
        }
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.kind.children()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("guid", &self.guid)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Short display name for a behavior type: last path segment, generics stripped.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
