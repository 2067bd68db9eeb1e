use bt_core::{Blackboard, NodeGuid, SplitMix64, Status, TickContext, VarRef};
use bt_tools::TraceEvent;

use crate::module::GraphModule;
use crate::node::{NodeId, NodeKind};

/// The view a [`Behavior`](crate::Behavior) hook gets of its module.
pub struct NodeContext<'m> {
    module: &'m mut GraphModule,
    node: NodeId,
    caller: Option<NodeId>,
}

impl<'m> NodeContext<'m> {
    pub(crate) fn new(module: &'m mut GraphModule, node: NodeId, caller: Option<NodeId>) -> Self {
        Self {
            module,
            node,
            caller,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn guid(&self) -> NodeGuid {
        self.module.nodes()[self.node.index()].guid
    }

    pub fn name(&self) -> &str {
        &self.module.nodes()[self.node.index()].name
    }

    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    /// Current status of this node.
    pub fn status(&self) -> Status {
        self.module.status(self.node)
    }

    /// The node whose `start_node` call led to this hook, if any.
    pub fn caller(&self) -> Option<NodeId> {
        self.caller
    }

    pub fn kind(&self) -> &NodeKind {
        &self.module.nodes()[self.node.index()].kind
    }

    pub fn child_count(&self) -> usize {
        self.kind().slots().len()
    }

    /// The `index`-th child slot; `None` for an empty or missing slot.
    pub fn child_at(&self, index: usize) -> Option<NodeId> {
        self.kind().slots().get(index).copied().flatten()
    }

    /// First child slot (modifiers and joins have exactly one).
    pub fn child(&self) -> Option<NodeId> {
        self.child_at(0)
    }

    pub fn parents(&self) -> &[NodeId] {
        self.module.nodes()[self.node.index()].parents()
    }

    pub fn status_of(&self, node: NodeId) -> Status {
        self.module.status(node)
    }

    /// Status of a child slot; an empty slot reads as `Success`.
    pub fn slot_status(&self, slot: Option<NodeId>) -> Status {
        match slot {
            Some(node) => self.module.status(node),
            None => Status::Success,
        }
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.module.is_active(node)
    }

    pub fn start_node(&mut self, node: NodeId) -> Status {
        self.module.start_node_from(Some(self.node), node)
    }

    /// Starts a child slot; an empty slot completes immediately with `Success`.
    pub fn start_child(&mut self, slot: Option<NodeId>) -> Status {
        match slot {
            Some(node) => self.start_node(node),
            None => Status::Success,
        }
    }

    pub fn end_node(&mut self, node: NodeId) {
        self.module.end_branch(node);
    }

    pub fn awake_node(&mut self, node: NodeId) -> bool {
        self.module.awake_node(node)
    }

    pub fn is_ending_branch(&self) -> bool {
        self.module.is_ending_branch()
    }

    pub fn blackboard(&self) -> &Blackboard {
        self.module.blackboard()
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        self.module.blackboard_mut()
    }

    pub fn tick(&self) -> &TickContext {
        self.module.tick_context()
    }

    /// Deterministic RNG for this node on the current tick.
    pub fn rng(&self, stream: u64) -> SplitMix64 {
        self.module.tick_context().rng_for_node(self.guid(), stream)
    }

    /// Awakens this node (through [`Behavior::on_notify`](crate::Behavior::on_notify)) whenever
    /// `var` changes. Watches are dropped when the node ends.
    pub fn watch<'v>(&mut self, var: impl Into<VarRef<'v>>) -> bool {
        self.module.watch(self.node, var)
    }

    pub fn unwatch<'v>(&mut self, var: impl Into<VarRef<'v>>) {
        self.module.unwatch(self.node, var);
    }

    pub fn trace(&mut self, tag: &'static str, a: u64, b: u64) {
        let event = TraceEvent::new(self.tick().tick, tag)
            .with_node(self.guid())
            .with_a(a)
            .with_b(b);
        bt_tools::emit(self.module.blackboard_mut(), event);
    }
}
