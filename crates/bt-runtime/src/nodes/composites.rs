use bt_core::{DeterministicRng, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::NodeContext;
use crate::node::Behavior;
use crate::nodes::{load, save};

#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    current: usize,
}

/// Starts children from `*current` onward until one does not report `pass`.
fn advance(cx: &mut NodeContext<'_>, current: &mut usize, pass: Status) -> Status {
    while *current < cx.child_count() {
        let slot = cx.child_at(*current);
        let status = cx.start_child(slot);
        if status == pass {
            *current += 1;
        } else if status.is_terminal() {
            return status;
        } else {
            return Status::Waiting;
        }
    }
    pass
}

fn resume(cx: &mut NodeContext<'_>, current: &mut usize, pass: Status) -> Status {
    let status = cx.slot_status(cx.child_at(*current));
    if status == pass {
        *current += 1;
        advance(cx, current, pass)
    } else if status.is_terminal() {
        status
    } else {
        Status::Waiting
    }
}

/// Runs children in order; fails on the first failure.
#[derive(Debug, Default)]
pub struct Sequence {
    current: usize,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Behavior for Sequence {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.current = 0;
        advance(cx, &mut self.current, Status::Success)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        resume(cx, &mut self.current, Status::Success)
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&Cursor {
            current: self.current,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(cursor) = load::<Cursor>(state)? {
            self.current = cursor.current;
        }
        Ok(())
    }
}

/// Runs children in order; succeeds on the first success.
#[derive(Debug, Default)]
pub struct Selector {
    current: usize,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Behavior for Selector {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.current = 0;
        advance(cx, &mut self.current, Status::Failure)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        resume(cx, &mut self.current, Status::Failure)
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&Cursor {
            current: self.current,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(cursor) = load::<Cursor>(state)? {
            self.current = cursor.current;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelPolicy {
    RequireOne,
    RequireAll,
}

/// Starts every child at once. Children still running when it completes are ended with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallel {
    success: ParallelPolicy,
    failure: ParallelPolicy,
}

impl Default for Parallel {
    fn default() -> Self {
        Self::new(ParallelPolicy::RequireAll, ParallelPolicy::RequireOne)
    }
}

impl Parallel {
    pub fn new(success: ParallelPolicy, failure: ParallelPolicy) -> Self {
        Self { success, failure }
    }

    /// Result over the first `started` slots, or `None` while undecided.
    fn evaluate(&self, cx: &NodeContext<'_>, started: usize) -> Option<Status> {
        let total = cx.child_count();
        let (mut succeeded, mut failed) = (0, 0);
        for index in 0..started {
            match cx.slot_status(cx.child_at(index)) {
                Status::Success => succeeded += 1,
                Status::Failure => failed += 1,
                _ => {}
            }
        }
        let success = match self.success {
            ParallelPolicy::RequireOne => succeeded >= 1,
            ParallelPolicy::RequireAll => succeeded == total,
        };
        let failure = match self.failure {
            ParallelPolicy::RequireOne => failed >= 1,
            ParallelPolicy::RequireAll => failed == total,
        };
        if success {
            Some(Status::Success)
        } else if failure || (started == total && succeeded + failed == total) {
            Some(Status::Failure)
        } else {
            None
        }
    }
}

impl Behavior for Parallel {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let total = cx.child_count();
        for index in 0..total {
            let slot = cx.child_at(index);
            cx.start_child(slot);
            if let Some(done) = self.evaluate(cx, index + 1) {
                return done;
            }
        }
        self.evaluate(cx, total).unwrap_or(Status::Waiting)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.evaluate(cx, cx.child_count())
            .unwrap_or(Status::Waiting)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Shuffle {
    order: Vec<usize>,
    position: usize,
}

/// Selector over a per-activation shuffle of its children, drawn from the tick's node RNG.
#[derive(Debug, Default)]
pub struct RandomSelector {
    order: Vec<usize>,
    position: usize,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&mut self, cx: &mut NodeContext<'_>) -> Status {
        while let Some(&index) = self.order.get(self.position) {
            let slot = cx.child_at(index);
            match cx.start_child(slot) {
                Status::Failure => self.position += 1,
                Status::Success => return Status::Success,
                _ => return Status::Waiting,
            }
        }
        Status::Failure
    }
}

impl Behavior for RandomSelector {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.order = (0..cx.child_count()).collect();
        cx.rng(0).shuffle(&mut self.order);
        self.position = 0;
        self.run(cx)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        let Some(&index) = self.order.get(self.position) else {
            return Status::Failure;
        };
        match cx.slot_status(cx.child_at(index)) {
            Status::Failure => {
                self.position += 1;
                self.run(cx)
            }
            Status::Success => Status::Success,
            _ => Status::Waiting,
        }
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        save(&Shuffle {
            order: self.order.clone(),
            position: self.position,
        })
    }

    fn load_state(
        &mut self,
        _cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        if let Some(shuffle) = load::<Shuffle>(state)? {
            self.order = shuffle.order;
            self.position = shuffle.position;
        }
        Ok(())
    }
}
