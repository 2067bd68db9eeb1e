//! Deterministic, engine-agnostic primitives shared by the behavior graph runtime.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod blackboard;
pub mod ids;
pub mod rng;
pub mod status;
pub mod tick;

pub use blackboard::{BbKey, Blackboard, ChangeListener, EventChannel, VarRef, Variable, VariableChange};
pub use ids::{NodeGuid, VariableId};
pub use rng::{DeterministicRng, SplitMix64};
pub use status::{Outcome, Status};
pub use tick::TickContext;
