use std::cell::RefCell;
use std::rc::Rc;

use bt_core::{Status, TickContext, VarRef};
use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::module::GraphModule;
use crate::snapshot::{GraphSnapshot, ModuleSnapshot};

/// Shared handle onto a module. Subgraph nodes hold one alongside the owning [`Graph`].
pub type ModuleHandle = Rc<RefCell<GraphModule>>;

pub fn share(module: GraphModule) -> ModuleHandle {
    Rc::new(RefCell::new(module))
}

/// A root module plus the subgraph modules it runs.
///
/// Only the root module is ticked directly; subgraph modules are driven by the nodes that run
/// them. Variable lookups search the root module first, then each subgraph in order.
pub struct Graph {
    modules: Vec<ModuleHandle>,
}

impl Graph {
    pub fn new(root: GraphModule) -> Self {
        Self::from_handle(share(root))
    }

    pub fn from_handle(root: ModuleHandle) -> Self {
        Self {
            modules: vec![root],
        }
    }

    pub fn with_subgraph(mut self, module: ModuleHandle) -> Self {
        self.add_subgraph(module);
        self
    }

    pub fn add_subgraph(&mut self, module: ModuleHandle) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[ModuleHandle] {
        &self.modules
    }

    pub fn root_module(&self) -> &ModuleHandle {
        &self.modules[0]
    }

    pub fn start(&mut self) -> Result<Status> {
        Ok(self.root_mut()?.start())
    }

    pub fn tick(&mut self, ctx: &TickContext) -> Result<()> {
        self.root_mut()?.tick(ctx)
    }

    /// Ends the root branch, then clears the scheduler state of every module.
    pub fn end(&mut self) -> Result<()> {
        {
            let mut root = self.root_mut()?;
            if let Some(node) = root.root() {
                root.end_node(node);
            }
        }
        for (index, module) in self.modules.iter().enumerate() {
            module
                .try_borrow_mut()
                .map_err(|_| GraphError::ModuleBusy(index))?
                .reset();
        }
        Ok(())
    }

    pub fn restart(&mut self) -> Result<Status> {
        self.end()?;
        self.start()
    }

    pub fn is_running(&self) -> bool {
        self.modules[0]
            .try_borrow()
            .is_ok_and(|root| root.is_running())
    }

    pub fn root_status(&self) -> Status {
        self.modules[0]
            .try_borrow()
            .map(|root| root.root_status())
            .unwrap_or_default()
    }

    pub fn has_variable<'v>(&self, var: impl Into<VarRef<'v>>) -> bool {
        let var = var.into();
        self.modules.iter().any(|module| {
            module
                .try_borrow()
                .is_ok_and(|module| module.blackboard().contains(var))
        })
    }

    /// Value of the first variable matching `var`; `None` if that variable holds another type.
    pub fn get_variable<'v, T: Clone + 'static>(&self, var: impl Into<VarRef<'v>>) -> Option<T> {
        let var = var.into();
        for module in &self.modules {
            let Ok(module) = module.try_borrow() else {
                continue;
            };
            if module.blackboard().contains(var) {
                return module.blackboard().value::<T>(var).cloned();
            }
        }
        None
    }

    /// Writes the first variable matching `var`.
    pub fn set_variable_value<'v, T: 'static>(&self, var: impl Into<VarRef<'v>>, value: T) -> bool {
        let var = var.into();
        for module in &self.modules {
            let Ok(mut module) = module.try_borrow_mut() else {
                continue;
            };
            if module.blackboard().contains(var) {
                let written = module.blackboard_mut().set_variable_value(var, value);
                module.discard_unobserved_changes();
                return written;
            }
        }
        false
    }

    /// Publishes `message` on the first event channel matching `var`.
    pub fn send_event<'v>(&self, var: impl Into<VarRef<'v>>, message: Value) -> bool {
        let var = var.into();
        for module in &self.modules {
            let Ok(mut module) = module.try_borrow_mut() else {
                continue;
            };
            if module.blackboard().contains(var) {
                let sent = module.blackboard_mut().send_event(var, message);
                module.discard_unobserved_changes();
                return sent;
            }
        }
        false
    }

    pub fn serialize(&self) -> Result<GraphSnapshot> {
        let mut modules = Vec::with_capacity(self.modules.len());
        for (index, module) in self.modules.iter().enumerate() {
            let module = module
                .try_borrow()
                .map_err(|_| GraphError::ModuleBusy(index))?;
            modules.push(module.serialize()?);
        }
        Ok(GraphSnapshot { modules })
    }

    /// Restores each module from the snapshot entry with the same name.
    pub fn deserialize(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        for (index, module) in self.modules.iter().enumerate() {
            let mut module = module
                .try_borrow_mut()
                .map_err(|_| GraphError::ModuleBusy(index))?;
            match snapshot.modules.iter().find(|m| m.module == module.name()) {
                Some(saved) => module.deserialize(saved)?,
                None => {
                    tracing::warn!(module = %module.name(), "graph snapshot has no entry for module; leaving it reset");
                    let idle = ModuleSnapshot {
                        module: module.name().to_owned(),
                        tick: module.tick_context().tick,
                        nodes: Vec::new(),
                        queue: Vec::new(),
                    };
                    module.deserialize(&idle)?;
                }
            }
        }
        Ok(())
    }

    fn root_mut(&self) -> Result<std::cell::RefMut<'_, GraphModule>> {
        self.modules[0]
            .try_borrow_mut()
            .map_err(|_| GraphError::ModuleBusy(0))
    }
}
