//! Synchronous test passes and the effects they apply to control state.

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::evaluator::{EvaluationState, RuleEngine};
use crate::schema::{PropertyNode, Test, TestResults};

use super::control::{ControlId, ControlState};
use super::tree::FormTree;

fn valid_tests(p: &PropertyNode) -> &[Test] {
    &p.valid_tests
}

fn edit_tests(p: &PropertyNode) -> &[Test] {
    &p.edit_tests
}

fn view_tests(p: &PropertyNode) -> &[Test] {
    &p.view_tests
}

impl FormTree {
    /// Run one category of a control's tests synchronously against the
    /// current value. `None` for the root or unknown controls.
    fn run_sync(&self, id: ControlId, tests: fn(&PropertyNode) -> &[Test]) -> Option<TestResults> {
        let property = self.property(id)?;
        let tests = tests(property.as_ref());
        if tests.is_empty() {
            return Some(TestResults::default());
        }
        let value = self.value(id);
        let root = self.root_value();
        Some(RuleEngine::run_tests(&value, tests, EvaluationState::with_root(&root)))
    }

    /// Value plus root value, for asynchronous passes run elsewhere.
    pub(crate) fn snapshot(&self, id: ControlId) -> (Value, Value) {
        (self.value(id), self.root_value())
    }

    fn with_state<R>(&self, id: ControlId, f: impl FnOnce(&mut ControlState) -> R) -> Option<R> {
        let mut arena = self.write();
        arena.get_mut(id).map(|c| f(&mut c.state))
    }

    /// Re-run synchronous validity and record it, without publishing a
    /// value change.
    pub fn update_value_and_validity(&self, id: ControlId) -> Option<TestResults> {
        let results = self.run_sync(id, valid_tests)?;
        self.apply_validity(id, results.clone());
        Some(results)
    }

    /// Re-run editability and visibility tests and apply both.
    ///
    /// Returns whether the enabled state flipped.
    pub fn refresh_editability(&self, id: ControlId) -> bool {
        let flipped = self
            .run_sync(id, edit_tests)
            .is_some_and(|results| self.apply_editability(id, results.passed()));
        if let Some(results) = self.run_sync(id, view_tests) {
            self.apply_visibility(id, results.passed());
        }
        flipped
    }

    /// Initial synchronous pass over newly created controls.
    pub(crate) fn refresh_controls(&self, ids: &[ControlId]) {
        for id in ids {
            self.update_value_and_validity(*id);
            self.refresh_editability(*id);
        }
    }

    // ── Outbound effects ────────────────────────────────────────────

    pub fn apply_validity(&self, id: ControlId, results: TestResults) {
        self.with_state(id, |state| {
            state.sync_errors = (!results.passed()).then_some(results);
        });
    }

    /// Record an asynchronous validity outcome and clear `pending`.
    pub fn apply_async_validity(&self, id: ControlId, errors: Option<TestResults>) {
        self.with_state(id, |state| {
            state.async_errors = errors;
            state.pending = false;
        });
    }

    pub fn set_pending(&self, id: ControlId, pending: bool) {
        self.with_state(id, |state| state.pending = pending);
    }

    /// Enable or disable a control; returns `true` only if it flipped.
    pub fn apply_editability(&self, id: ControlId, editable: bool) -> bool {
        let flipped = self
            .with_state(id, |state| {
                let flipped = state.enabled != editable;
                state.enabled = editable;
                flipped
            })
            .unwrap_or(false);
        if flipped {
            debug!(control = %id, enabled = editable, "editability changed");
        }
        flipped
    }

    pub fn apply_visibility(&self, id: ControlId, visible: bool) -> bool {
        self.with_state(id, |state| {
            let flipped = state.visible != visible;
            state.visible = visible;
            flipped
        })
        .unwrap_or(false)
    }

    /// Attach an error from outside the engine. Engine passes never clear it.
    pub fn set_external_error(
        &self,
        id: ControlId,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.with_state(id, |state| {
            state.external_errors.insert(key.into(), message.into());
        })
        .ok_or(RuleError::UnknownControl(id))
    }

    /// Returns whether an error under `key` was present.
    pub fn clear_external_error(&self, id: ControlId, key: &str) -> Result<bool> {
        self.with_state(id, |state| state.external_errors.remove(key).is_some())
            .ok_or(RuleError::UnknownControl(id))
    }
}
