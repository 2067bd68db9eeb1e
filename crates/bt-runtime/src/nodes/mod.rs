//! Standard behaviors: composites, modifiers, actions, joins and the subgraph runner.

pub mod actions;
pub mod composites;
pub mod joins;
pub mod modifiers;
pub mod subgraph;

pub use actions::{Condition, FnAction, Missing, SendEvent, SetVariable, Wait, WaitTicks};
pub use composites::{Parallel, ParallelPolicy, RandomSelector, Selector, Sequence};
pub use joins::{WaitForAll, WaitForAny};
pub use modifiers::{
    Conditional, EventTrigger, ForceStatus, Inverter, Repeat, RepeatMode, RestartOnChange,
    StartOnEvent,
};
pub use subgraph::RunSubgraph;

use bt_core::Status;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Maps a child's status onto the status of a parent that is waiting on it.
pub(crate) fn wait_on(child: Status) -> Status {
    if child.is_terminal() {
        child
    } else {
        Status::Waiting
    }
}

pub(crate) fn save<T: Serialize>(state: &T) -> Result<Option<Value>, serde_json::Error> {
    serde_json::to_value(state).map(Some)
}

pub(crate) fn load<T: DeserializeOwned>(state: Option<Value>) -> Result<Option<T>, serde_json::Error> {
    state.map(serde_json::from_value).transpose()
}
