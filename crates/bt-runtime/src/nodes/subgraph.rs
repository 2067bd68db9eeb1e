use bt_core::{Blackboard, Status};

use crate::context::NodeContext;
use crate::graph::ModuleHandle;
use crate::node::Behavior;

type Binding = Box<dyn Fn(&Blackboard, &mut Blackboard) -> bool>;

/// Runs another module as a child: starts its root on start, ticks it on every update and ends it
/// when this node ends. Reports `Running` until the subgraph's root completes.
pub struct RunSubgraph {
    module: ModuleHandle,
    bindings: Vec<Binding>,
}

impl RunSubgraph {
    pub fn new(module: ModuleHandle) -> Self {
        Self {
            module,
            bindings: Vec::new(),
        }
    }

    /// Copies variable `from` of the calling module into variable `to` of the subgraph each time
    /// the subgraph starts.
    pub fn bind<T: Clone + 'static>(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let (from, to) = (from.into(), to.into());
        self.bindings.push(Box::new(move |parent, sub| {
            match parent.value::<T>(from.as_str()) {
                Some(value) => sub.set_variable_value(to.as_str(), value.clone()),
                None => false,
            }
        }));
        self
    }

    fn report(root: Status) -> Status {
        match root {
            Status::Success | Status::Failure => root,
            Status::Uninitialized => Status::Failure,
            Status::Running | Status::Waiting => Status::Running,
        }
    }
}

impl Behavior for RunSubgraph {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let Ok(mut sub) = self.module.try_borrow_mut() else {
            tracing::warn!(node = %cx.guid(), "subgraph is already executing; refusing to re-enter it");
            return Status::Failure;
        };
        for (index, binding) in self.bindings.iter().enumerate() {
            if !binding(cx.blackboard(), sub.blackboard_mut()) {
                tracing::warn!(node = %cx.guid(), subgraph = %sub.name(), binding = index, "subgraph binding was not applied");
            }
        }
        sub.reset();
        Self::report(sub.start())
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let Ok(mut sub) = self.module.try_borrow_mut() else {
            tracing::warn!(node = %cx.guid(), "subgraph is already executing; refusing to re-enter it");
            return Status::Failure;
        };
        let ctx = *cx.tick();
        if let Err(err) = sub.tick(&ctx) {
            tracing::error!(node = %cx.guid(), subgraph = %sub.name(), error = %err, "subgraph tick failed");
        }
        Self::report(sub.root_status())
    }

    fn on_end(&mut self, cx: &mut NodeContext<'_>) {
        let Ok(mut sub) = self.module.try_borrow_mut() else {
            tracing::warn!(node = %cx.guid(), "subgraph is executing; cannot end it");
            return;
        };
        if let Some(root) = sub.root() {
            if sub.is_running() {
                sub.end_node(root);
            }
        }
        sub.reset();
    }
}
