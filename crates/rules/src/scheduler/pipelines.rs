//! Per-category trigger pipelines, one spawned task each.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

use crate::evaluator::{EvaluationState, RuleEngine};
use crate::form::{ControlId, FormTree};
use crate::schema::{ChangeSettings, PropertyNode};

use super::state::SideTable;

/// What every pipeline of one scheduler shares.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) tree: Arc<FormTree>,
    pub(crate) states: SideTable,
}

// ── Stream helpers ──────────────────────────────────────────────────

/// Next value, skipping over lag. `None` once the control is gone.
async fn recv_latest(rx: &mut broadcast::Receiver<Value>) -> Option<Value> {
    loop {
        match rx.recv().await {
            Ok(value) => return Some(value),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                trace!(skipped, "change stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Wait for a value, then until `debounce` passes without another one.
/// Yields the last value of the burst.
async fn debounced(rx: &mut broadcast::Receiver<Value>, debounce: Duration) -> Option<Value> {
    let mut latest = recv_latest(rx).await?;
    if debounce.is_zero() {
        return Some(latest);
    }
    loop {
        match tokio::time::timeout(debounce, recv_latest(rx)).await {
            Ok(Some(value)) => latest = value,
            Ok(None) => return None,
            Err(_) => return Some(latest),
        }
    }
}

/// Debounced and, if configured, distinct-filtered values.
struct Filtered {
    rx: broadcast::Receiver<Value>,
    settings: ChangeSettings,
    last: Option<Value>,
}

impl Filtered {
    fn new(rx: broadcast::Receiver<Value>, settings: ChangeSettings) -> Self {
        Self {
            rx,
            settings,
            last: None,
        }
    }

    async fn next(&mut self) -> Option<Value> {
        loop {
            let value = debounced(&mut self.rx, self.settings.debounce()).await?;
            if self.settings.distinct_until_changed && self.last.as_ref() == Some(&value) {
                continue;
            }
            self.last = Some(value.clone());
            return Some(value);
        }
    }
}

// ── Pipelines ───────────────────────────────────────────────────────

/// A dependency changed: force the next async pass, refresh sync validity
/// without publishing a change, then request the async pass.
pub(crate) async fn dependency_validity(
    shared: Arc<Shared>,
    control: ControlId,
    dependency: ControlId,
    rx: broadcast::Receiver<Value>,
    settings: ChangeSettings,
) {
    let mut changes = Filtered::new(rx, settings);
    while changes.next().await.is_some() {
        trace!(control = %control, dependency = %dependency, "dependency changed; revalidating");
        shared.states.mark_force(control);
        shared.states.with(control, |s| s.stats.dependency_validity_runs += 1);
        shared.tree.update_value_and_validity(control);
        shared.states.kick(control);
    }
}

/// Re-run edit and view tests whenever `rx` yields. Used for dependency
/// changes and for the control's own changes.
pub(crate) async fn editability(
    shared: Arc<Shared>,
    control: ControlId,
    rx: broadcast::Receiver<Value>,
    settings: ChangeSettings,
) {
    let mut changes = Filtered::new(rx, settings);
    while changes.next().await.is_some() {
        shared.states.with(control, |s| s.stats.editability_runs += 1);
        shared.tree.refresh_editability(control);
    }
}

/// Own value change or explicit kick; `None` once either source is gone.
async fn next_trigger(
    values: &mut broadcast::Receiver<Value>,
    kicks: &mut mpsc::UnboundedReceiver<()>,
) -> Option<()> {
    tokio::select! {
        value = recv_latest(values) => value.map(|_| ()),
        kick = kicks.recv() => kick,
    }
}

/// Debounced async validity for one control.
///
/// A forced trigger skips the debounce and the distinct check. A trigger
/// arriving mid-evaluation abandons the running evaluation; its result is
/// never applied.
pub(crate) async fn async_validity(
    shared: Arc<Shared>,
    control: ControlId,
    property: Arc<PropertyNode>,
    mut values: broadcast::Receiver<Value>,
    mut kicks: mpsc::UnboundedReceiver<()>,
    settings: ChangeSettings,
) {
    let tree = &shared.tree;
    let states = &shared.states;
    let mut triggered = false;

    loop {
        if !triggered && next_trigger(&mut values, &mut kicks).await.is_none() {
            return;
        }
        triggered = false;
        let forced = states.take_force(control);
        tree.set_pending(control, true);

        let wait = if forced { Duration::ZERO } else { settings.debounce() };
        if !wait.is_zero() {
            match tokio::time::timeout(wait, next_trigger(&mut values, &mut kicks)).await {
                Ok(Some(())) => {
                    triggered = true;
                    continue;
                }
                Ok(None) => return,
                Err(_) => {}
            }
        }

        let (value, root) = tree.snapshot(control);
        if !forced && settings.distinct_until_changed {
            let cached = states.with(control, |s| {
                (s.last_processed.as_ref() == Some(&value)).then(|| s.last_async_errors.clone())
            });
            if let Some(errors) = cached {
                states.with(control, |s| s.stats.passthroughs += 1);
                trace!(control = %control, "value unchanged; reusing last async result");
                tree.apply_async_validity(control, errors);
                continue;
            }
        }

        states.with(control, |s| s.stats.async_runs += 1);
        tokio::select! {
            results = RuleEngine::run_tests_async(
                &value,
                &property.valid_tests,
                EvaluationState::with_root(&root),
            ) => {
                let errors = (!results.passed()).then_some(results);
                debug!(control = %control, valid = errors.is_none(), "async validity evaluated");
                states.with(control, |s| {
                    s.last_processed = Some(value.clone());
                    s.last_async_errors = errors.clone();
                });
                tree.apply_async_validity(control, errors);
            }
            next = next_trigger(&mut values, &mut kicks) => {
                if next.is_none() {
                    return;
                }
                trace!(control = %control, "async evaluation superseded");
                states.with(control, |s| s.stats.superseded += 1);
                if forced {
                    states.mark_force(control);
                }
                triggered = true;
            }
        }
    }
}
