//! Per-control scheduling side table.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::form::ControlId;
use crate::schema::TestResults;

/// Scheduler-owned state for one control.
#[derive(Debug, Default)]
pub(crate) struct ScheduleState {
    /// Next async validity pass must not be suppressed.
    pub(crate) force: bool,
    /// Value the async rules last actually ran against.
    pub(crate) last_processed: Option<Value>,
    /// Async errors computed for `last_processed`.
    pub(crate) last_async_errors: Option<TestResults>,
    /// Requests an async validity pass without a value change.
    pub(crate) kick: Option<mpsc::UnboundedSender<()>>,
    pub(crate) stats: ScheduleStats,
}

/// Counters describing what the scheduler did for one control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleStats {
    /// Async validity passes that invoked the rules.
    pub async_runs: u64,
    /// Async validity passes answered from the last result.
    pub passthroughs: u64,
    /// Evaluations abandoned because a newer trigger arrived.
    pub superseded: u64,
    /// Dependency-driven validity refreshes.
    pub dependency_validity_runs: u64,
    /// Editability passes (dependency- or self-driven).
    pub editability_runs: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SideTable {
    states: Mutex<HashMap<ControlId, ScheduleState>>,
}

impl SideTable {
    pub(crate) fn with<R>(&self, id: ControlId, f: impl FnOnce(&mut ScheduleState) -> R) -> R {
        let mut guard = self.states.lock().expect("schedule state lock poisoned");
        f(guard.entry(id).or_default())
    }

    /// Read and clear the force flag.
    pub(crate) fn take_force(&self, id: ControlId) -> bool {
        self.with(id, |s| std::mem::take(&mut s.force))
    }

    pub(crate) fn mark_force(&self, id: ControlId) {
        self.with(id, |s| s.force = true);
    }

    /// Request an async validity pass; no-op without an async pipeline.
    pub(crate) fn kick(&self, id: ControlId) {
        let sender = self.with(id, |s| s.kick.clone());
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    pub(crate) fn stats(&self, id: ControlId) -> Option<ScheduleStats> {
        self.states
            .lock()
            .expect("schedule state lock poisoned")
            .get(&id)
            .map(|s| s.stats)
    }

    /// Forget controls that no longer exist.
    pub(crate) fn retain(&self, live: &HashSet<ControlId>) {
        self.states
            .lock()
            .expect("schedule state lock poisoned")
            .retain(|id, _| live.contains(id));
    }
}
