//! Scheduler for one graph module.
//!
//! Owns the node arena, the blackboard and the bookkeeping that drives status propagation:
//!
//! - `active`: nodes with a current activation (ordered, so rebuilds are deterministic).
//! - `to_tick`: FIFO of nodes to update this tick; awakened nodes jump to the front.
//! - `to_end` / `ended`: explicit stack and visited set for post-order branch termination.
//!
//! A node whose `Start` returns `Running` during a tick is not updated until the next tick; a
//! node awakened during a tick is updated in the same tick. Completion travels upward through
//! `awake_parents`, termination travels downward through `end_branch`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use bt_core::{Blackboard, NodeGuid, Status, TickContext, VarRef, VariableId};
use bt_tools::TraceEvent;
use serde_json::Value;

use crate::config::SchedulerConfig;
use crate::context::NodeContext;
use crate::error::{GraphError, Result};
use crate::node::{Behavior, Node, NodeId};
use crate::snapshot::{ModuleSnapshot, NodeSnapshot};

/// Batched notification fired once per tick (or per external start/end) when any status changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChanged {
    pub module: String,
    pub tick: u64,
    /// Nodes whose status changed, with their status at flush time.
    pub nodes: Vec<(NodeId, Status)>,
}

pub type StatusListener = Box<dyn FnMut(&StatusChanged)>;

pub struct GraphModule {
    name: String,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    guids: BTreeMap<NodeGuid, NodeId>,
    blackboard: Blackboard,
    config: SchedulerConfig,
    ctx: TickContext,

    active: BTreeSet<NodeId>,
    to_tick: VecDeque<NodeId>,
    to_end: Vec<NodeId>,
    ended: BTreeSet<NodeId>,
    /// Watching nodes per variable, with the variable version seen when the watch began.
    watches: BTreeMap<VariableId, BTreeMap<NodeId, u64>>,

    changed: BTreeSet<NodeId>,
    listeners: Vec<StatusListener>,
    dirty: bool,
    ticking: bool,
    ending_branch: bool,
}

impl GraphModule {
    pub(crate) fn from_parts(
        name: String,
        nodes: Vec<Node>,
        root: Option<NodeId>,
        blackboard: Blackboard,
        config: SchedulerConfig,
    ) -> Self {
        let guids = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.guid, NodeId(i as u32)))
            .collect();
        Self {
            name,
            nodes,
            root,
            guids,
            blackboard,
            config,
            ctx: TickContext::default(),
            active: BTreeSet::new(),
            to_tick: VecDeque::new(),
            to_end: Vec::new(),
            ended: BTreeSet::new(),
            watches: BTreeMap::new(),
            changed: BTreeSet::new(),
            listeners: Vec::new(),
            dirty: false,
            ticking: false,
            ending_branch: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn find(&self, guid: NodeGuid) -> Option<NodeId> {
        self.guids.get(&guid).copied()
    }

    /// First node carrying `name`.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|i| NodeId(i as u32))
    }

    /// `Uninitialized` for ids outside the arena.
    pub fn status(&self, id: NodeId) -> Status {
        self.node(id).map(Node::status).unwrap_or_default()
    }

    pub fn root_status(&self) -> Status {
        self.root.map(|root| self.status(root)).unwrap_or_default()
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        self.active.contains(&id)
    }

    /// Whether the root has a current activation.
    pub fn is_running(&self) -> bool {
        self.root.is_some_and(|root| self.active.contains(&root))
    }

    pub fn active_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.active.iter().copied()
    }

    pub fn queued_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.to_tick.iter().copied()
    }

    pub fn is_ending_branch(&self) -> bool {
        self.ending_branch
    }

    /// Some status changed since the last notification.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SchedulerConfig) {
        self.config = config;
    }

    pub fn tick_context(&self) -> &TickContext {
        &self.ctx
    }

    pub fn on_status_changed(&mut self, listener: impl FnMut(&StatusChanged) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Starts the root. Returns `Uninitialized` for an empty module.
    pub fn start(&mut self) -> Status {
        let Some(root) = self.root else {
            return Status::Uninitialized;
        };
        self.discard_unobserved_changes();
        let status = self.start_node_from(None, root);
        self.flush_status_changes();
        status
    }

    pub fn start_node(&mut self, node: NodeId) -> Status {
        let status = self.start_node_from(None, node);
        if !self.ticking {
            self.flush_status_changes();
        }
        status
    }

    /// Terminates `node` and every active descendant, children before parents.
    pub fn end_node(&mut self, node: NodeId) {
        self.end_branch(node);
        if !self.ticking {
            self.flush_status_changes();
        }
    }

    /// Ends the root's activation, clears the scheduler state and starts the root again.
    pub fn restart(&mut self) -> Status {
        if let Some(root) = self.root {
            self.end_branch(root);
        }
        self.reset();
        self.start()
    }

    /// Drains the tick queue once.
    ///
    /// Returns [`GraphError::TickBudgetExceeded`] when the drain ran past the configured budget;
    /// nodes still queued at that point keep their place for the next tick.
    pub fn tick(&mut self, ctx: &TickContext) -> Result<()> {
        self.ctx = *ctx;
        self.ticking = true;
        self.dispatch_changes();
        self.rebuild_node_lists();

        let budget = self.config.tick_budget();
        let started = Instant::now();
        let mut deferred = Vec::new();
        let mut outcome = Ok(());

        while let Some(node) = self.to_tick.pop_front() {
            if let Some(budget) = budget {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    self.to_tick.push_front(node);
                    outcome = Err(self.budget_exceeded(elapsed));
                    break;
                }
            }
            if !self.active.contains(&node) {
                continue;
            }
            let (fresh, status) = {
                let slot = &self.nodes[node.index()];
                (slot.fresh, slot.status)
            };
            if fresh {
                deferred.push(node);
                continue;
            }
            match status {
                Status::Running => {}
                Status::Waiting => self.set_status(node, Status::Running),
                _ => continue,
            }
            self.update_node(node);
            self.dispatch_changes();
        }
        self.ticking = false;

        for &node in &self.to_tick {
            self.nodes[node.index()].fresh = false;
        }
        for node in deferred {
            self.nodes[node.index()].fresh = false;
            if self.active.contains(&node)
                && self.nodes[node.index()].status == Status::Running
                && !self.to_tick.contains(&node)
            {
                self.to_tick.push_back(node);
            }
        }
        self.flush_status_changes();
        outcome
    }

    /// Queues `node` at the front of the tick queue if it is active, running or waiting, and not
    /// already queued or being ended.
    pub fn awake_node(&mut self, node: NodeId) -> bool {
        let Some(slot) = self.nodes.get(node.index()) else {
            return false;
        };
        if !self.active.contains(&node)
            || !slot.status.is_running()
            || self.to_end.contains(&node)
            || self.to_tick.contains(&node)
        {
            return false;
        }
        self.nodes[node.index()].fresh = false;
        self.to_tick.push_front(node);
        self.set_status(node, Status::Running);
        self.dirty = true;
        true
    }

    pub fn awake_parents(&mut self, node: NodeId) {
        let Some(slot) = self.nodes.get(node.index()) else {
            return;
        };
        let parents = slot.parents().to_vec();
        for parent in parents {
            self.awake_node(parent);
        }
    }

    /// Forgets every activation and pending blackboard change without calling `End`.
    /// Statuses are left as they are.
    pub fn reset(&mut self) {
        self.active.clear();
        self.to_tick.clear();
        self.to_end.clear();
        self.ended.clear();
        self.watches.clear();
        self.blackboard.clear_changes();
        self.ending_branch = false;
        for node in &mut self.nodes {
            node.fresh = false;
        }
    }

    /// Captures every live node (active and running or waiting) and the tick queue.
    pub fn serialize(&self) -> Result<ModuleSnapshot> {
        let mut nodes = Vec::new();
        for id in self.live_nodes() {
            let slot = &self.nodes[id.index()];
            let state = match slot.behavior.as_ref() {
                Some(behavior) => behavior.save_state().map_err(|source| GraphError::NodeState {
                    node: slot.guid,
                    source,
                })?,
                None => None,
            };
            nodes.push(NodeSnapshot {
                id: slot.guid,
                name: slot.name.clone(),
                status: slot.status,
                state,
            });
        }
        let queue = self
            .to_tick
            .iter()
            .map(|node| self.nodes[node.index()].guid)
            .collect();
        Ok(ModuleSnapshot {
            module: self.name.clone(),
            tick: self.ctx.tick,
            nodes,
            queue,
        })
    }

    /// Replaces the scheduler state with `snapshot`, then hands each live node its saved state.
    pub fn deserialize(&mut self, snapshot: &ModuleSnapshot) -> Result<()> {
        if snapshot.module != self.name {
            return Err(GraphError::SnapshotMismatch {
                expected: self.name.clone(),
                found: snapshot.module.clone(),
            });
        }
        self.reset();
        for index in 0..self.nodes.len() {
            self.set_status(NodeId(index as u32), Status::Uninitialized);
        }

        let mut states: BTreeMap<NodeId, Value> = BTreeMap::new();
        for entry in &snapshot.nodes {
            let Some(node) = self.find(entry.id) else {
                tracing::warn!(module = %self.name, node = %entry.id, name = %entry.name, "snapshot references an unknown node; skipped");
                continue;
            };
            if !entry.status.is_running() {
                tracing::warn!(module = %self.name, node = %entry.id, status = ?entry.status, "snapshot entry is not running; skipped");
                continue;
            }
            self.set_status(node, entry.status);
            self.active.insert(node);
            if let Some(state) = &entry.state {
                states.insert(node, state.clone());
            }
        }
        for guid in &snapshot.queue {
            match self.find(*guid) {
                Some(node) if self.active.contains(&node) && !self.to_tick.contains(&node) => {
                    self.to_tick.push_back(node);
                }
                Some(_) => {}
                None => {
                    tracing::warn!(module = %self.name, node = %guid, "queued node is unknown; skipped");
                }
            }
        }
        self.ctx.tick = snapshot.tick;
        tracing::debug!(
            module = %self.name,
            tick = snapshot.tick,
            active = self.active.len(),
            queued = self.to_tick.len(),
            "restored snapshot"
        );

        for node in self.live_nodes() {
            let state = states.remove(&node);
            let loaded = self.invoke(node, None, |behavior, cx| behavior.load_state(cx, state));
            if let Some(Err(source)) = loaded {
                return Err(GraphError::NodeState {
                    node: self.nodes[node.index()].guid,
                    source,
                });
            }
        }
        self.dirty = true;
        self.flush_status_changes();
        Ok(())
    }

    pub(crate) fn start_node_from(&mut self, caller: Option<NodeId>, node: NodeId) -> Status {
        let Some(slot) = self.nodes.get(node.index()) else {
            tracing::warn!(module = %self.name, node = %node, "start requested for a node outside the module");
            return Status::Failure;
        };
        let current = slot.status;

        let status = if self.active.contains(&node) {
            if !slot.kind.is_join() {
                tracing::warn!(module = %self.name, node = %slot.guid, name = %slot.name, "ignoring start of an already active node");
                return current;
            }
            self.invoke(node, caller, |behavior, cx| behavior.on_rejoin(cx))
                .unwrap_or(current)
        } else {
            tracing::debug!(module = %self.name, node = %slot.guid, name = %slot.name, "start");
            self.nodes[node.index()].fresh = false;
            self.set_status(node, Status::Uninitialized);
            self.active.insert(node);
            self.trace_node(node, "bt.node.start", 0);
            match self.invoke(node, caller, |behavior, cx| behavior.on_start(cx)) {
                Some(status) => status,
                None => {
                    tracing::warn!(module = %self.name, node = %node, "node started from inside its own hook");
                    Status::Failure
                }
            }
        };
        self.settle(node, status, true)
    }

    pub(crate) fn end_branch(&mut self, root: NodeId) {
        if root.index() >= self.nodes.len() || self.ended.contains(&root) {
            return;
        }
        let outermost = !self.ending_branch;
        self.ending_branch = true;

        // Nested passes (from `End` hooks) share `ended` and stop at their own stack base.
        let base = self.to_end.len();
        self.to_end.push(root);
        while self.to_end.len() > base {
            let Some(&top) = self.to_end.last() else {
                break;
            };
            if let Some(child) = self.next_child_to_end(top) {
                self.to_end.push(child);
                continue;
            }
            self.to_end.pop();
            self.finish_node(top);
        }

        if outermost {
            self.ending_branch = false;
            self.ended.clear();
        }
    }

    pub(crate) fn watch<'v>(&mut self, node: NodeId, var: impl Into<VarRef<'v>>) -> bool {
        let Some(id) = self.blackboard.resolve(var) else {
            tracing::warn!(module = %self.name, node = %node, "cannot watch an undefined variable");
            return false;
        };
        let version = self
            .blackboard
            .get_variable(id)
            .map_or(0, |variable| variable.version());
        self.watches.entry(id).or_default().entry(node).or_insert(version);
        true
    }

    pub(crate) fn unwatch<'v>(&mut self, node: NodeId, var: impl Into<VarRef<'v>>) {
        if let Some(id) = self.blackboard.resolve(var) {
            if let Some(watchers) = self.watches.get_mut(&id) {
                watchers.remove(&node);
            }
        }
    }

    fn settle(&mut self, node: NodeId, status: Status, started: bool) -> Status {
        if !self.active.contains(&node) {
            return self.status(node);
        }
        let status = if status == Status::Uninitialized {
            tracing::warn!(module = %self.name, node = %node, "hook returned Uninitialized; treating as Failure");
            Status::Failure
        } else {
            status
        };
        self.set_status(node, status);
        match status {
            Status::Success | Status::Failure => {
                self.end_branch(node);
                self.awake_parents(node);
            }
            Status::Running if started => {
                if !self.to_tick.contains(&node) {
                    self.to_tick.push_back(node);
                    self.nodes[node.index()].fresh = self.ticking;
                }
            }
            // A rejoin can suspend a join that was queued by its first arrival.
            Status::Waiting if started => {
                self.to_tick.retain(|&queued| queued != node);
                self.nodes[node.index()].fresh = false;
            }
            _ => {}
        }
        self.dirty = true;
        status
    }

    fn update_node(&mut self, node: NodeId) {
        match self.invoke(node, None, |behavior, cx| behavior.on_update(cx)) {
            Some(status) => {
                self.settle(node, status, false);
            }
            None => {
                tracing::warn!(module = %self.name, node = %node, "skipping update of a node whose hook is in progress");
            }
        }
    }

    fn rebuild_node_lists(&mut self) {
        let pending: Vec<NodeId> = self
            .active
            .iter()
            .copied()
            .filter(|node| {
                self.nodes[node.index()].status == Status::Running && !self.to_tick.contains(node)
            })
            .collect();
        self.to_tick.extend(pending);
    }

    fn next_child_to_end(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].children().find(|&child| {
            self.active.contains(&child)
                && self.nodes[child.index()].status.is_running()
                && !self.ended.contains(&child)
                && !self.to_end.contains(&child)
                && !self.held_by_other_parent(child, node)
        })
    }

    /// A join stays alive while any parent other than `via` is still active.
    fn held_by_other_parent(&self, node: NodeId, via: NodeId) -> bool {
        let slot = &self.nodes[node.index()];
        slot.kind.is_join()
            && slot
                .parents()
                .iter()
                .any(|&parent| parent != via && self.active.contains(&parent))
    }

    fn finish_node(&mut self, node: NodeId) {
        let removed = self.active.remove(&node);
        self.to_tick.retain(|&queued| queued != node);
        self.nodes[node.index()].fresh = false;
        if removed {
            let slot = &self.nodes[node.index()];
            tracing::debug!(module = %self.name, node = %slot.guid, name = %slot.name, status = ?slot.status, "end");
            let code = status_code(slot.status);
            self.trace_node(node, "bt.node.end", code);
            if self.invoke(node, None, |behavior, cx| behavior.on_end(cx)).is_none() {
                tracing::warn!(module = %self.name, node = %node, "node ended from inside its own hook; End skipped");
            }
            self.drop_watches(node);
        }
        self.ended.insert(node);
        self.dirty = true;
    }

    fn drop_watches(&mut self, node: NodeId) {
        self.watches.retain(|_, watchers| {
            watchers.remove(&node);
            !watchers.is_empty()
        });
    }

    /// Drops journaled changes while no node is active, so nothing replays them to a later watch.
    pub(crate) fn discard_unobserved_changes(&mut self) {
        if self.active.is_empty() {
            self.blackboard.clear_changes();
        }
    }

    fn dispatch_changes(&mut self) {
        while self.blackboard.has_changes() {
            for change in self.blackboard.drain_changes() {
                let Some(watchers) = self.watches.get(&change.variable) else {
                    continue;
                };
                let watchers: Vec<NodeId> = watchers
                    .iter()
                    .filter(|(_, since)| change.version > **since)
                    .map(|(node, _)| *node)
                    .collect();
                for node in watchers {
                    if !self.active.contains(&node) {
                        continue;
                    }
                    let wake = self
                        .invoke(node, None, |behavior, cx| behavior.on_notify(cx, &change))
                        .unwrap_or(false);
                    if wake {
                        self.awake_node(node);
                    }
                }
            }
        }
    }

    fn set_status(&mut self, node: NodeId, status: Status) {
        let slot = &mut self.nodes[node.index()];
        if slot.status != status {
            slot.status = status;
            self.changed.insert(node);
            self.dirty = true;
        }
    }

    fn flush_status_changes(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let nodes: Vec<(NodeId, Status)> = std::mem::take(&mut self.changed)
            .into_iter()
            .map(|node| (node, self.nodes[node.index()].status))
            .collect();
        let event = TraceEvent::new(self.ctx.tick, "bt.module.status_changed")
            .with_a(nodes.len() as u64);
        bt_tools::emit(&mut self.blackboard, event);
        if self.listeners.is_empty() {
            return;
        }
        let event = StatusChanged {
            module: self.name.clone(),
            tick: self.ctx.tick,
            nodes,
        };
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    fn budget_exceeded(&mut self, elapsed: Duration) -> GraphError {
        let elapsed_ms = elapsed.as_millis() as u64;
        let pending = self.to_tick.len();
        tracing::error!(
            module = %self.name,
            tick = self.ctx.tick,
            elapsed_ms,
            pending,
            "tick budget exceeded; remaining nodes carried to the next tick"
        );
        let event = TraceEvent::new(self.ctx.tick, "bt.tick.budget_exceeded")
            .with_a(pending as u64)
            .with_b(elapsed_ms);
        bt_tools::emit(&mut self.blackboard, event);
        GraphError::TickBudgetExceeded {
            module: self.name.clone(),
            elapsed_ms,
            pending,
        }
    }

    fn trace_node(&mut self, node: NodeId, tag: &'static str, code: u64) {
        let event = TraceEvent::new(self.ctx.tick, tag)
            .with_node(self.nodes[node.index()].guid)
            .with_a(node.0 as u64)
            .with_b(code);
        bt_tools::emit(&mut self.blackboard, event);
    }

    /// Nodes that are active and running or waiting, parents before children.
    fn live_nodes(&self) -> Vec<NodeId> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        let mut stack = Vec::new();
        let roots = self.root.into_iter().chain(self.active.iter().copied());
        for start in roots {
            stack.push(start);
            while let Some(node) = stack.pop() {
                let slot = &self.nodes[node.index()];
                if !self.active.contains(&node) || !slot.status.is_running() || !visited.insert(node)
                {
                    continue;
                }
                order.push(node);
                stack.extend(slot.children().rev());
            }
        }
        order
    }

    /// Checks the behavior out of its slot for the duration of `hook`.
    fn invoke<R>(
        &mut self,
        node: NodeId,
        caller: Option<NodeId>,
        hook: impl FnOnce(&mut dyn Behavior, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.nodes.get_mut(node.index())?.behavior.take()?;
        let result = hook(behavior.as_mut(), &mut NodeContext::new(self, node, caller));
        self.nodes[node.index()].behavior = Some(behavior);
        Some(result)
    }
}

fn status_code(status: Status) -> u64 {
    match status {
        Status::Uninitialized => 0,
        Status::Running => 1,
        Status::Waiting => 2,
        Status::Success => 3,
        Status::Failure => 4,
    }
}

impl std::fmt::Debug for GraphModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModule")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("active", &self.active)
            .field("to_tick", &self.to_tick)
            .finish_non_exhaustive()
    }
}
