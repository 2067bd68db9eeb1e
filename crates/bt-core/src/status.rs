use serde::{Deserialize, Serialize};

/// Lifecycle status of a node within one activation.
///
/// A node moves `Uninitialized -> Running | Waiting -> (Running <-> Waiting)* -> Success | Failure`
/// and only returns to `Uninitialized` when it is started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Fresh; set right before `Start`.
    #[default]
    Uninitialized,
    /// Wants `Update` on the scheduler's next pass.
    Running,
    /// Suspended until explicitly awoken.
    Waiting,
    Success,
    Failure,
}

/// Terminal result of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failure,
}

impl From<Outcome> for Status {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Success => Status::Success,
            Outcome::Failure => Status::Failure,
        }
    }
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        if value {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

impl Status {
    /// `Running` or `Waiting`.
    pub fn is_running(self) -> bool {
        matches!(self, Status::Running | Status::Waiting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    pub fn outcome(self) -> Option<Outcome> {
        match self {
            Status::Success => Some(Outcome::Success),
            Status::Failure => Some(Outcome::Failure),
            _ => None,
        }
    }

    /// Swaps `Success` and `Failure`; every other status is returned unchanged.
    pub fn invert(self) -> Status {
        match self {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            other => other,
        }
    }
}
