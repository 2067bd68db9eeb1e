//! Tracing primitives for the behavior graph runtime.
//!
//! Events are plain data recorded during simulation and rendered later by tooling. They are routed
//! through well-known blackboard keys so the scheduler does not need a tooling dependency of its own.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{
    emit, NullTraceSink, TraceEvent, TraceLog, TraceSink, VecTraceSink, TRACE_LOG, TRACE_SINK,
};
