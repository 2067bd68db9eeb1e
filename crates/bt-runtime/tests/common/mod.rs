#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bt_core::VariableChange;
use bt_runtime::{Behavior, NodeContext, Status, TickContext};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::default()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ctx(tick: u64) -> TickContext {
    TickContext::new(tick, 0.1)
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

pub fn count(log: &Log, entry: &str) -> usize {
    log.borrow().iter().filter(|e| *e == entry).count()
}

pub fn clear(log: &Log) {
    log.borrow_mut().clear();
}

/// Scripted leaf that records every hook call.
pub struct Probe {
    name: String,
    log: Log,
    on_start: Status,
    script: VecDeque<Status>,
    cycle: bool,
    fallback: Status,
}

impl Probe {
    /// Starts `Running` and keeps reporting `Running` until scripted otherwise.
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            on_start: Status::Running,
            script: VecDeque::new(),
            cycle: false,
            fallback: Status::Running,
        }
    }

    pub fn starting(mut self, status: Status) -> Self {
        self.on_start = status;
        self
    }

    /// Queues the result of the next update.
    pub fn then(mut self, status: Status) -> Self {
        self.script.push_back(status);
        self
    }

    /// Replays the update script forever.
    pub fn cycle(mut self) -> Self {
        self.cycle = true;
        self
    }

    pub fn otherwise(mut self, status: Status) -> Self {
        self.fallback = status;
        self
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{hook}:{}", self.name));
    }
}

impl Behavior for Probe {
    fn on_start(&mut self, _cx: &mut NodeContext<'_>) -> Status {
        self.record("start");
        self.on_start
    }

    fn on_update(&mut self, _cx: &mut NodeContext<'_>) -> Status {
        self.record("update");
        match self.script.pop_front() {
            Some(status) => {
                if self.cycle {
                    self.script.push_back(status);
                }
                status
            }
            None => self.fallback,
        }
    }

    fn on_end(&mut self, _cx: &mut NodeContext<'_>) {
        self.record("end");
    }
}

/// Wraps any behavior and records its start/update/end hooks.
pub struct Logged<B> {
    name: String,
    log: Log,
    inner: B,
}

impl<B: Behavior> Logged<B> {
    pub fn new(name: &str, log: &Log, inner: B) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            inner,
        }
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{hook}:{}", self.name));
    }
}

impl<B: Behavior> Behavior for Logged<B> {
    fn on_start(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.record("start");
        self.inner.on_start(cx)
    }

    fn on_update(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.record("update");
        self.inner.on_update(cx)
    }

    fn on_end(&mut self, cx: &mut NodeContext<'_>) {
        self.record("end");
        self.inner.on_end(cx);
    }

    fn on_rejoin(&mut self, cx: &mut NodeContext<'_>) -> Status {
        self.record("rejoin");
        self.inner.on_rejoin(cx)
    }

    fn on_notify(&mut self, cx: &mut NodeContext<'_>, change: &VariableChange) -> bool {
        self.inner.on_notify(cx, change)
    }

    fn save_state(&self) -> Result<Option<Value>, serde_json::Error> {
        self.inner.save_state()
    }

    fn load_state(
        &mut self,
        cx: &mut NodeContext<'_>,
        state: Option<Value>,
    ) -> Result<(), serde_json::Error> {
        self.inner.load_state(cx, state)
    }
}
