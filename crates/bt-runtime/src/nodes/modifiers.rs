use std::collections::VecDeque;

use bt_core::{Blackboard, Outcome, Status, VariableChange};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::NodeContext;
use crate::node::Behavior;
use crate::nodes::{load, save, wait_on};

/// Swaps the child's `Success` and `Failure`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inverter;

impl Behavior for Inverter {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let child = cx.child();
        wait_on(cx.start_child(child)).invert()
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        wait_on(cx.slot_status(cx.child())).invert()
    }
}

/// Reports a fixed outcome once the child completes, whatever the child returned.
#[derive(Debug, Clone, Copy)]
pub struct ForceStatus {
    outcome: Outcome,
}

impl ForceStatus {
    pub fn new(outcome: Outcome) -> Self {
        Self { outcome }
    }

    pub fn success() -> Self {
        Self::new(Outcome::Success)
    }

    pub fn failure() -> Self {
        Self::new(Outcome::Failure)
    }

    fn force(&self, child: Status) -> Status {
        if child.is_terminal() {
            self.outcome.into()
        } else {
            Status::Waiting
        }
    }
}

impl Behavior for ForceStatus {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let child = cx.child();
        let status = cx.start_child(child);
        self.force(status)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.force(cx.slot_status(cx.child()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Forever,
    Times(u32),
    UntilSuccess,
    UntilFailure,
}

#[derive(Debug, Serialize, Deserialize)]
struct RepeatState {
    completed: u32,
}

/// Restarts its child each time it completes.
///
/// A child that completes during its own `Start` is counted on the next update, so a repeat over
/// a zero-duration child keeps re-queuing itself within one tick until the tick budget trips.
#[derive(Debug, Clone)]
pub struct Repeat {
    mode: RepeatMode,
    completed: u32,
}

impl Repeat {
    pub fn new(mode: RepeatMode) -> Self {
        Self { mode, completed: 0 }
    }

    pub fn forever() -> Self {
        Self::new(RepeatMode::Forever)
    }

    pub fn times(count: u32) -> Self {
        Self::new(RepeatMode::Times(count))
    }

    /// Completed child activations in the current activation of the repeat.
    pub fn completed(&self) -> u32 {
        self.completed
    }

    fn step(&mut self, cx: &mut NodeContext<'_>, child_status: Status) -> Status {
        if !child_status.is_terminal() {
            return Status::Waiting;
        }
        self.completed = self.completed.saturating_add(1);
        let done = match self.mode {
            RepeatMode::Forever => false,
            RepeatMode::Times(count) => self.completed >= count,
            RepeatMode::UntilSuccess => child_status == Status::Success,
            RepeatMode::UntilFailure => child_status == Status::Failure,
        };
        if done {
            return Status::Success;
        }
        let child = cx.child();
        if cx.start_child(child).is_terminal() {
            Status::Running
        } else {
            Status::Waiting
        }
    }
}

impl Behavior for Repeat {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.completed = 0;
        if self.mode == RepeatMode::Times(0) {
            return Status::Success;
        }
        let child = cx.child();
        let status = cx.start_child(child);
        self.step(cx, status)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let status = cx.slot_status(cx.child());
        self.step(cx, status)
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&RepeatState {
            completed: self.completed,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(state) = load::<RepeatState>(state)? {
            self.completed = state.completed;
        }
        Ok(())
    }
}

/// Runs its child only while `predicate` holds over the blackboard.
///
/// The predicate is checked on start and on every update. Changes to the watched variables
/// re-check it immediately; once it fails the node completes with `Failure`, which ends the child.
pub struct Conditional<F> {
    predicate: F,
    watched: Vec<String>,
}

impl<F> Conditional<F>
where
    F: FnMut(&Blackboard) -> bool + 'static,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            watched: Vec::new(),
        }
    }

    pub fn watching(mut self, variable: impl Into<String>) -> Self {
        self.watched.push(variable.into());
        self
    }

    fn subscribe(&self, cx: &mut NodeContext<'_>) {
        for variable in &self.watched {
            cx.watch(variable.as_str());
        }
    }
}

impl<F> Behavior for Conditional<F>
where
    F: FnMut(&Blackboard) -> bool + 'static,
{
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        if !(self.predicate)(cx.blackboard()) {
            return Status::Failure;
        }
        self.subscribe(cx);
        let child = cx.child();
        wait_on(cx.start_child(child))
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        if !(self.predicate)(cx.blackboard()) {
            return Status::Failure;
        }
        wait_on(cx.slot_status(cx.child()))
    }

    fn on_notify(&mut self, cx: &mut NodeContext<'_>, _change: &VariableChange) -> bool {
        !(self.predicate)(cx.blackboard())
    }

    fn load_state(
        &mut self,
        cx: &mut NodeContext<'_>,
        _state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        self.subscribe(cx);
        Ok(())
    }
}

/// What [`StartOnEvent`] does with a message that arrives while its child is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventTrigger {
    /// Drop it.
    #[default]
    Default,
    /// End the child and start it again.
    Restart,
    /// Run the child for the first message only, then complete with the child's result.
    Once,
}

#[derive(Debug, Serialize, Deserialize)]
struct EventState {
    pending: VecDeque<Value>,
    child_started: bool,
}

/// Waits on an event channel and starts its child for each message.
///
/// Messages are queued in arrival order and consumed one per update; the queue is part of the
/// snapshot state.
#[derive(Debug, Clone)]
pub struct StartOnEvent {
    channel: String,
    trigger: EventTrigger,
    message_variable: Option<String>,
    pending: VecDeque<Value>,
    child_started: bool,
}

impl StartOnEvent {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            trigger: EventTrigger::Default,
            message_variable: None,
            pending: VecDeque::new(),
            child_started: false,
        }
    }

    pub fn with_trigger(mut self, trigger: EventTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Copies each consumed message into `variable` (which must hold a `serde_json::Value`)
    /// before the child starts.
    pub fn store_message_in(mut self, variable: impl Into<String>) -> Self {
        self.message_variable = Some(variable.into());
        self
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn launch(&mut self, cx: &mut NodeContext<'_>, message: Value) -> Option<Status> {
        if let Some(variable) = &self.message_variable {
            if !cx.blackboard_mut().set_variable_value(variable.as_str(), message) {
                tracing::warn!(node = %cx.guid(), variable = %variable, "could not store event message");
            }
        }
        self.child_started = true;
        let child = cx.child();
        let status = cx.start_child(child);
        if status.is_terminal() {
            self.child_started = false;
            if self.trigger == EventTrigger::Once {
                return Some(status);
            }
        }
        None
    }
}

impl Behavior for StartOnEvent {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.pending.clear();
        self.child_started = false;
        if !cx.watch(self.channel.as_str()) {
            tracing::warn!(node = %cx.guid(), channel = %self.channel, "event channel is not defined");
            return Status::Failure;
        }
        Status::Waiting
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let child = cx.child();
        if self.child_started {
            let status = cx.slot_status(child);
            if status.is_terminal() {
                self.child_started = false;
                if self.trigger == EventTrigger::Once {
                    return status;
                }
            }
        }

        if let Some(message) = self.pending.pop_front() {
            if self.child_started && self.trigger == EventTrigger::Restart {
                if let Some(child) = child {
                    cx.end_node(child);
                }
                self.child_started = false;
            }
            if self.child_started {
                tracing::debug!(node = %cx.guid(), channel = %self.channel, "child still running; event dropped");
            } else if let Some(done) = self.launch(cx, message) {
                return done;
            }
        }

        if self.pending.is_empty() {
            Status::Waiting
        } else {
            Status::Running
        }
    }

    fn on_notify(&mut self, _cx: &mut NodeContext<'_>, change: &VariableChange) -> bool {
        self.pending
            .push_back(change.message.clone().unwrap_or(Value::Null));
        true
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&EventState {
            pending: self.pending.clone(),
            child_started: self.child_started,
        })
    }

    fn load_state(
        &mut self,
        cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(state) = load::<EventState>(state)? {
            self.pending = state.pending;
            self.child_started = state.child_started;
        }
        cx.watch(self.channel.as_str());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RestartState {
    restart_pending: bool,
}

/// Restarts its child whenever `variable` changes; completes when the child does.
#[derive(Debug, Clone)]
pub struct RestartOnChange {
    variable: String,
    restart_pending: bool,
}

impl RestartOnChange {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            restart_pending: false,
        }
    }
}

impl Behavior for RestartOnChange {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.restart_pending = false;
        if !cx.watch(self.variable.as_str()) {
            tracing::warn!(node = %cx.guid(), variable = %self.variable, "restart variable is not defined");
        }
        let child = cx.child();
        wait_on(cx.start_child(child))
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let child = cx.child();
        if std::mem::take(&mut self.restart_pending) {
            if let Some(node) = child {
                if cx.is_active(node) {
                    cx.end_node(node);
                }
            }
            return wait_on(cx.start_child(child));
        }
        wait_on(cx.slot_status(child))
    }

    fn on_notify(&mut self, _cx: &mut NodeContext<'_>, _change: &VariableChange) -> bool {
        self.restart_pending = true;
        true
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&RestartState {
            restart_pending: self.restart_pending,
        })
    }

    fn load_state(
        &mut self,
        cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(state) = load::<RestartState>(state)? {
            self.restart_pending = state.restart_pending;
        }
        cx.watch(self.variable.as_str());
        Ok(())
    }
}
