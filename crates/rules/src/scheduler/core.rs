//! [`RecomputeScheduler`]: owns every subscription attached to one form tree.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexSet;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::evaluator::RuleEngine;
use crate::form::{ControlId, FormTree, StructureChange, StructureObserver};
use crate::path::resolve_path;
use crate::schema::{PropertyNode, Test};

use super::pipelines::{self, Shared};
use super::state::{ScheduleStats, SideTable};
use super::subscription::Subscription;

/// Reactive recomputation for one [`FormTree`].
///
/// Create with [`attach`](RecomputeScheduler::attach). Dropping the
/// scheduler aborts every subscription it owns.
#[derive(Debug)]
pub struct RecomputeScheduler {
    shared: Arc<Shared>,
    /// Runtime every pipeline is spawned on, so structure edits can
    /// resubscribe from any thread.
    runtime: Handle,
    /// Rebuilt from scratch on every structural change.
    dependency_subscriptions: Mutex<HashMap<ControlId, Vec<Subscription>>>,
    /// Own-value pipelines; kept across rebuilds while the control lives.
    self_subscriptions: Mutex<HashMap<ControlId, Vec<Subscription>>>,
}

impl RecomputeScheduler {
    /// Subscribe every control of `tree`, schedule the initial async
    /// validity pass, and register for structure edits so dependency
    /// subscriptions are rebuilt before `insert_item`/`remove_item` return.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; pipelines are spawned on
    /// the runtime current at attach time.
    pub fn attach(tree: Arc<FormTree>) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            shared: Arc::new(Shared {
                tree,
                states: SideTable::default(),
            }),
            runtime: Handle::current(),
            dependency_subscriptions: Mutex::new(HashMap::new()),
            self_subscriptions: Mutex::new(HashMap::new()),
        });
        scheduler.rebuild();

        let weak: Weak<Self> = Arc::downgrade(&scheduler);
        let observer: Weak<dyn StructureObserver> = weak;
        scheduler.shared.tree.observe_structure(observer);
        scheduler
    }

    pub fn tree(&self) -> &Arc<FormTree> {
        &self.shared.tree
    }

    /// Tear down all dependency subscriptions and resubscribe against the
    /// current structure.
    ///
    /// Controls that no longer exist lose their pipelines and scheduling
    /// state. Controls seen for the first time get their own pipelines and
    /// an initial async validity pass.
    pub fn rebuild(&self) {
        let tree = &self.shared.tree;
        let live = tree.controls();
        let live_set: HashSet<ControlId> = live.iter().copied().collect();

        drop(std::mem::take(
            &mut *self
                .dependency_subscriptions
                .lock()
                .expect("dependency subscriptions lock poisoned"),
        ));
        self.shared.states.retain(&live_set);

        let mut dependencies = HashMap::new();
        let mut added = 0usize;
        {
            let mut own = self
                .self_subscriptions
                .lock()
                .expect("self subscriptions lock poisoned");
            own.retain(|id, _| live_set.contains(id));

            for id in &live {
                let Some(property) = tree.property(*id) else { continue };
                let subscriptions = self.subscribe_dependencies(*id, &property);
                if !subscriptions.is_empty() {
                    dependencies.insert(*id, subscriptions);
                }
                if !own.contains_key(id) {
                    own.insert(*id, self.subscribe_self(*id, &property));
                    added += 1;
                }
            }
        }

        let count: usize = dependencies.values().map(Vec::len).sum();
        *self
            .dependency_subscriptions
            .lock()
            .expect("dependency subscriptions lock poisoned") = dependencies;
        debug!(
            controls = live.len(),
            new_controls = added,
            dependency_subscriptions = count,
            "subscriptions rebuilt"
        );
    }

    /// Dependency subscriptions for one control.
    ///
    /// Paths resolve relative to the control's parent. Paths that do not
    /// resolve are dropped.
    fn subscribe_dependencies(&self, id: ControlId, property: &PropertyNode) -> Vec<Subscription> {
        let tree = &self.shared.tree;
        let policy = tree.policy(id);
        let anchor = tree.parent_of(id).unwrap_or_else(|| tree.root());

        let valid_paths = RuleEngine::dependency_properties(&property.valid_tests);
        let edit_paths: IndexSet<String> = RuleEngine::dependency_properties(&property.edit_tests)
            .into_iter()
            .chain(RuleEngine::dependency_properties(&property.view_tests))
            .collect();

        let mut subscriptions = Vec::new();
        for path in valid_paths {
            let Some((dependency, rx)) = self.resolve_dependency(id, anchor, &path) else { continue };
            let task = pipelines::dependency_validity(
                self.shared.clone(),
                id,
                dependency,
                rx,
                policy.dependency_valid,
            );
            subscriptions.push(Subscription::spawn(&self.runtime, task));
        }
        for path in edit_paths {
            let Some((_, rx)) = self.resolve_dependency(id, anchor, &path) else { continue };
            let task = pipelines::editability(self.shared.clone(), id, rx, policy.dependency_edit);
            subscriptions.push(Subscription::spawn(&self.runtime, task));
        }
        subscriptions
    }

    fn resolve_dependency(
        &self,
        id: ControlId,
        anchor: ControlId,
        path: &str,
    ) -> Option<(ControlId, broadcast::Receiver<serde_json::Value>)> {
        let tree = self.shared.tree.as_ref();
        let Some(dependency) = resolve_path(tree, anchor, path) else {
            debug!(control = %id, path = %path, "dependency path did not resolve; skipped");
            return None;
        };
        tree.subscribe(dependency).map(|rx| (dependency, rx))
    }

    /// Own-value pipelines for one control.
    fn subscribe_self(&self, id: ControlId, property: &Arc<PropertyNode>) -> Vec<Subscription> {
        let tree = &self.shared.tree;
        let policy = tree.policy(id);
        let mut subscriptions = Vec::new();

        if !property.edit_tests.is_empty() || !property.view_tests.is_empty() {
            if let Some(rx) = tree.subscribe(id) {
                let task = pipelines::editability(self.shared.clone(), id, rx, policy.self_edit);
                subscriptions.push(Subscription::spawn(&self.runtime, task));
            }
        }

        if property.valid_tests.iter().any(Test::has_async_rules) {
            if let Some(rx) = tree.subscribe(id) {
                let (kick, kicks) = mpsc::unbounded_channel();
                self.shared.states.with(id, |s| s.kick = Some(kick));
                let task = pipelines::async_validity(
                    self.shared.clone(),
                    id,
                    property.clone(),
                    rx,
                    kicks,
                    policy.self_async_valid,
                );
                subscriptions.push(Subscription::spawn(&self.runtime, task));
                self.shared.states.kick(id);
            }
        }
        subscriptions
    }

    /// Request an async validity pass that is not suppressed by the
    /// distinct-until-changed filter.
    pub fn force_revalidate(&self, id: ControlId) {
        self.shared.states.mark_force(id);
        self.shared.tree.update_value_and_validity(id);
        self.shared.states.kick(id);
    }

    /// Live dependency subscriptions across all controls.
    pub fn dependency_subscription_count(&self) -> usize {
        self.dependency_subscriptions
            .lock()
            .expect("dependency subscriptions lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Live own-value pipelines across all controls.
    pub fn self_subscription_count(&self) -> usize {
        self.self_subscriptions
            .lock()
            .expect("self subscriptions lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Counters for one control; `None` if the scheduler never touched it.
    pub fn stats(&self, id: ControlId) -> Option<ScheduleStats> {
        self.shared.states.stats(id)
    }
}

impl StructureObserver for RecomputeScheduler {
    fn structure_changed(&self, change: &StructureChange) {
        debug!(?change, "structure changed; rebuilding subscriptions");
        self.rebuild();
    }
}
