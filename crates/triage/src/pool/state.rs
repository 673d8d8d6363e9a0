use portable_atomic::{AtomicU8, Ordering};
use serde::Serialize;

/// Lifecycle of a [`WorkerPool`](crate::WorkerPool).
///
/// Transitions only move forward: `Created -> Running -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LifecycleState {
    /// Constructed, workers not yet spawned.
    Created = 0,
    /// Accepting and processing jobs.
    Running = 1,
    /// Intake closed, workers finishing queued jobs.
    Draining = 2,
    /// Every worker has exited.
    Stopped = 3,
}

impl LifecycleState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl core::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) const fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the current state is already at or past it.
    /// Returns the state observed before the call.
    pub(crate) fn advance(&self, next: LifecycleState) -> LifecycleState {
        LifecycleState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }
}
