use std::collections::BTreeSet;

use bt_core::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::NodeContext;
use crate::node::{Behavior, NodeId};
use crate::nodes::{load, save, wait_on};

#[derive(Debug, Serialize, Deserialize)]
struct Arrivals {
    arrived: BTreeSet<NodeId>,
    started: bool,
}

/// Join that starts its child once every parent has started it.
#[derive(Debug, Default, Clone)]
pub struct WaitForAll {
    arrived: BTreeSet<NodeId>,
    started: bool,
}

impl WaitForAll {
    pub fn new() -> Self {
        Self::default()
    }

    fn arrive(&mut self, cx: &mut NodeContext<'_>) -> Status {
        if let Some(caller) = cx.caller() {
            if cx.parents().contains(&caller) {
                self.arrived.insert(caller);
            }
        }
        if self.started {
            return wait_on(cx.slot_status(cx.child()));
        }
        if !cx.parents().iter().all(|parent| self.arrived.contains(parent)) {
            return Status::Waiting;
        }
        self.started = true;
        let child = cx.child();
        wait_on(cx.start_child(child))
    }
}

impl Behavior for WaitForAll {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.arrived.clear();
        self.started = false;
        self.arrive(cx)
    }

    fn on_rejoin(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.arrive(cx)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        if self.started {
            wait_on(cx.slot_status(cx.child()))
        } else {
            Status::Waiting
        }
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&Arrivals {
            arrived: self.arrived.clone(),
            started: self.started,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(state) = load::<Arrivals>(state)? {
            self.arrived = state.arrived;
            self.started = state.started;
        }
        Ok(())
    }
}

/// Join that starts its child on the first parent's arrival; later arrivals share the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitForAny;

impl Behavior for WaitForAny {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let child = cx.child();
        wait_on(cx.start_child(child))
    }

    fn on_rejoin(&mut self, cx: &mut NodeContext<'_>) -> Status {
        wait_on(cx.slot_status(cx.child()))
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        wait_on(cx.slot_status(cx.child()))
    }
}
