use bt_core::{Blackboard, NodeGuid};

use crate::config::SchedulerConfig;
use crate::error::{GraphError, Result};
use crate::module::GraphModule;
use crate::node::{short_type_name, Behavior, Node, NodeId, NodeKind};

struct PendingNode {
    name: Option<String>,
    guid: Option<NodeGuid>,
    kind: NodeKind,
    behavior: Box<dyn Behavior>,
}

/// Assembles a [`GraphModule`] bottom-up: children are added before the nodes that reference them.
///
/// Parent links (including every join's parent set) are derived in [`GraphBuilder::build`], which
/// also rejects dangling references, cycles, shared non-join children and duplicate guids.
pub struct GraphBuilder {
    name: String,
    nodes: Vec<PendingNode>,
    root: Option<NodeId>,
    blackboard: Blackboard,
    config: SchedulerConfig,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            root: None,
            blackboard: Blackboard::new(),
            config: SchedulerConfig::default(),
        }
    }

    pub fn action(&mut self, behavior: impl Behavior) -> NodeId {
        self.push(NodeKind::Action, Box::new(behavior))
    }

    pub fn modifier(&mut self, behavior: impl Behavior, child: impl Into<Option<NodeId>>) -> NodeId {
        self.push(
            NodeKind::Modifier {
                child: child.into(),
            },
            Box::new(behavior),
        )
    }

    pub fn composite(
        &mut self,
        behavior: impl Behavior,
        children: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.composite_slots(behavior, children.into_iter().map(Some))
    }

    /// Composite whose slot list may contain empty (`None`) slots.
    pub fn composite_slots(
        &mut self,
        behavior: impl Behavior,
        slots: impl IntoIterator<Item = Option<NodeId>>,
    ) -> NodeId {
        self.push(
            NodeKind::Composite {
                children: slots.into_iter().collect(),
            },
            Box::new(behavior),
        )
    }

    pub fn join(&mut self, behavior: impl Behavior, child: impl Into<Option<NodeId>>) -> NodeId {
        self.push(
            NodeKind::Join {
                parents: Vec::new(),
                child: child.into(),
            },
            Box::new(behavior),
        )
    }

    pub fn named(&mut self, node: NodeId, name: impl Into<String>) -> &mut Self {
        if let Some(pending) = self.nodes.get_mut(node.index()) {
            pending.name = Some(name.into());
        }
        self
    }

    /// Overrides the derived guid of `node`.
    pub fn with_guid(&mut self, node: NodeId, guid: NodeGuid) -> &mut Self {
        if let Some(pending) = self.nodes.get_mut(node.index()) {
            pending.guid = Some(guid);
        }
        self
    }

    pub fn root(&mut self, node: NodeId) -> &mut Self {
        self.root = Some(node);
        self
    }

    pub fn config(&mut self, config: SchedulerConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn build(self) -> Result<GraphModule> {
        let Self {
            name,
            nodes,
            root,
            blackboard,
            config,
        } = self;
        let fail = |reason: String| GraphError::Build {
            module: name.clone(),
            reason,
        };
        let len = nodes.len();

        let mut parents: Vec<Vec<NodeId>> = vec![Vec::new(); len];
        for (index, pending) in nodes.iter().enumerate() {
            for child in pending.kind.children() {
                if child.index() >= len {
                    return Err(fail(format!("node {index} references missing child {child}")));
                }
                parents[child.index()].push(NodeId(index as u32));
            }
        }

        for (index, pending) in nodes.iter().enumerate() {
            let count = parents[index].len();
            if pending.kind.is_join() {
                parents[index].dedup();
            } else if count > 1 {
                return Err(fail(format!(
                    "node {index} has {count} parents; only joins may be shared"
                )));
            }
        }

        if let Some(node) = find_cycle(&nodes) {
            return Err(fail(format!("cycle through node {node}")));
        }

        let root = match root {
            Some(root) if root.index() >= len => {
                return Err(fail(format!("root {root} is not a node of this graph")));
            }
            Some(root) if !parents[root.index()].is_empty() => {
                return Err(fail(format!("root {root} has a parent")));
            }
            Some(root) => Some(root),
            None if len == 0 => None,
            None => return Err(fail("no root node set".to_string())),
        };

        if let Some(root) = root {
            let reachable = reachable_from(&nodes, root);
            for (index, seen) in reachable.iter().enumerate() {
                if !seen {
                    tracing::warn!(module = %name, node = index, "node is not reachable from the root");
                }
            }
        }

        let mut built = Vec::with_capacity(len);
        let mut guids = std::collections::BTreeSet::new();
        for (index, (pending, node_parents)) in nodes.into_iter().zip(parents).enumerate() {
            let guid = pending
                .guid
                .unwrap_or_else(|| NodeGuid::derived(&name, index));
            if !guids.insert(guid) {
                return Err(fail(format!("duplicate guid {guid} on node {index}")));
            }
            let node_name = pending
                .name
                .unwrap_or_else(|| short_type_name(pending.behavior.type_name()).to_string());
            let kind = match pending.kind {
                NodeKind::Join { child, .. } => NodeKind::Join {
                    parents: node_parents.clone(),
                    child,
                },
                kind => kind,
            };
            let mut node = Node::new(guid, node_name, kind, pending.behavior);
            if !node.kind.is_join() {
                node.parent = node_parents.first().copied();
            }
            built.push(node);
        }

        tracing::debug!(module = %name, nodes = len, "graph built");
        Ok(GraphModule::from_parts(name, built, root, blackboard, config))
    }

    fn push(&mut self, kind: NodeKind, behavior: Box<dyn Behavior>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PendingNode {
            name: None,
            guid: None,
            kind,
            behavior,
        });
        id
    }
}

fn reachable_from(nodes: &[PendingNode], root: NodeId) -> Vec<bool> {
    let mut seen = vec![false; nodes.len()];
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if std::mem::replace(&mut seen[node.index()], true) {
            continue;
        }
        stack.extend(nodes[node.index()].kind.children());
    }
    seen
}

/// Iterative three-colour DFS; returns a node on a cycle, if any.
fn find_cycle(nodes: &[PendingNode]) -> Option<NodeId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Open,
        Done,
    }

    let mut marks = vec![Mark::New; nodes.len()];
    for start in 0..nodes.len() {
        if marks[start] != Mark::New {
            continue;
        }
        // (node, next child position)
        let mut stack = vec![(start, 0usize)];
        marks[start] = Mark::Open;
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            top.1 += 1;
            match nodes[node].kind.slots().get(next) {
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
                Some(None) => {}
                Some(Some(child)) => match marks[child.index()] {
                    Mark::Open => return Some(*child),
                    Mark::Done => {}
                    Mark::New => {
                        marks[child.index()] = Mark::Open;
                        stack.push((child.index(), 0));
                    }
                },
            }
        }
    }
    None
}
