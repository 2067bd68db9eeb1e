use bt_core::{Blackboard, Outcome, Status, TickContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::NodeContext;
use crate::node::Behavior;
use crate::nodes::{load, save};

/// Leaf that evaluates a predicate once per activation.
pub struct Condition<F> {
    cond: F,
}

impl<F> Condition<F> {
    pub fn new(cond: F) -> Self {
        Self { cond }
    }
}

impl<F> Behavior for Condition<F>
where
    F: FnMut(&TickContext, &Blackboard) -> bool + 'static,
{
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        Outcome::from((self.cond)(cx.tick(), cx.blackboard())).into()
    }
}

type StatusHook = Box<dyn FnMut(&mut NodeContext<'_>) -> Status>;
type EndHook = Box<dyn FnMut(&mut NodeContext<'_>)>;

/// Action assembled from closures.
pub struct FnAction {
    start: StatusHook,
    update: Option<StatusHook>,
    end: Option<EndHook>,
}

impl FnAction {
    pub fn new(start: impl FnMut(&mut NodeContext<'_>) -> Status + 'static) -> Self {
        Self {
            start: Box::new(start),
            update: None,
            end: None,
        }
    }

    /// Action that completes on start with `status`.
    pub fn returning(status: Status) -> Self {
        Self::new(move |_| status)
    }

    pub fn with_update(mut self, update: impl FnMut(&mut NodeContext<'_>) -> Status + 'static) -> Self {
        self.update = Some(Box::new(update));
        self
    }

    pub fn with_end(mut self, end: impl FnMut(&mut NodeContext<'_>) + 'static) -> Self {
        self.end = Some(Box::new(end));
        self
    }
}

impl Behavior for FnAction {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        (self.start)(cx)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        match self.update.as_mut() {
            Some(update) => update(cx),
            None => cx.status(),
        }
    }

    fn on_end(&mut self, cx: &mut NodeContext<'_>) {
        if let Some(end) = self.end.as_mut() {
            end(cx);
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Elapsed {
    elapsed: f32,
}

/// Succeeds once `seconds` of tick time have accumulated.
#[derive(Debug, Clone, Copy)]
pub struct Wait {
    seconds: f32,
    elapsed: f32,
}

impl Wait {
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds,
            elapsed: 0.0,
        }
    }
}

impl Behavior for Wait {
    fn on_start(&mut self, _cx: &mut NodeContext<'_>) -> Status {
        self.elapsed = 0.0;
        if self.seconds <= 0.0 {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.elapsed += cx.tick().dt_seconds;
        if self.elapsed >= self.seconds {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&Elapsed {
            elapsed: self.elapsed,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(state) = load::<Elapsed>(state)? {
            self.elapsed = state.elapsed;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Remaining {
    remaining: u32,
}

/// Succeeds after `ticks` updates.
#[derive(Debug, Clone, Copy)]
pub struct WaitTicks {
    ticks: u32,
    remaining: u32,
}

impl WaitTicks {
    pub fn new(ticks: u32) -> Self {
        Self {
            ticks,
            remaining: ticks,
        }
    }
}

impl Behavior for WaitTicks {
    fn on_start(&mut self, _cx: &mut NodeContext<'_>) -> Status {
        self.remaining = self.ticks;
        if self.remaining == 0 {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn on_update(&mut self, _cx: &mut NodeContext<'_>) -> Status {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&Remaining {
            remaining: self.remaining,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(state) = load::<Remaining>(state)? {
            self.remaining = state.remaining;
        }
        Ok(())
    }
}

/// Writes `value` into an existing variable; fails if it is missing or holds another type.
#[derive(Debug, Clone)]
pub struct SetVariable<T> {
    variable: String,
    value: T,
}

impl<T: Clone + 'static> SetVariable<T> {
    pub fn new(variable: impl Into<String>, value: T) -> Self {
        Self {
            variable: variable.into(),
            value,
        }
    }
}

impl<T: Clone + 'static> Behavior for SetVariable<T> {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let written = cx
            .blackboard_mut()
            .set_variable_value(self.variable.as_str(), self.value.clone());
        Outcome::from(written).into()
    }
}

/// Publishes `message` on an event channel.
#[derive(Debug, Clone)]
pub struct SendEvent {
    channel: String,
    message: Value,
}

impl SendEvent {
    pub fn new(channel: impl Into<String>, message: Value) -> Self {
        Self {
            channel: channel.into(),
            message,
        }
    }
}

impl Behavior for SendEvent {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let sent = cx
            .blackboard_mut()
            .send_event(self.channel.as_str(), self.message.clone());
        Outcome::from(sent).into()
    }
}

/// Stand-in for a behavior that could not be resolved when the graph was assembled. Always fails.
#[derive(Debug, Clone)]
pub struct Missing {
    requested: String,
}

impl Missing {
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
        }
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }
}

impl Behavior for Missing {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        tracing::warn!(node = %cx.guid(), requested = %self.requested, "running placeholder for a missing behavior");
        Status::Failure
    }
}
