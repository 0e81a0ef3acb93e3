//! Control records and their observable state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::schema::{PropertyNode, TestResults};

/// Stable identity of a control within one [`FormTree`](super::FormTree).
///
/// Ids are never reused, so an id held across an array removal simply
/// stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ControlId(pub(crate) usize);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Public view of a control's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Field,
    Group,
    Array,
}

/// Structural change published when array elements come and go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureChange {
    Inserted { array: ControlId, index: usize },
    Removed { array: ControlId, index: usize },
}

/// Synchronous listener for structure edits.
///
/// Observers run after the tree is updated and before the edit publishes
/// any value change or returns to the caller.
pub trait StructureObserver: Send + Sync {
    fn structure_changed(&self, change: &StructureChange);
}

/// Observable per-control state written by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub enabled: bool,
    pub visible: bool,
    /// An asynchronous validity evaluation is in flight.
    pub pending: bool,
    /// Failed synchronous validity results, if any.
    pub sync_errors: Option<TestResults>,
    /// Failed asynchronous validity results, if any.
    pub async_errors: Option<TestResults>,
    /// Errors set by callers outside the engine, by key.
    pub external_errors: BTreeMap<String, String>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            enabled: true,
            visible: true,
            pending: false,
            sync_errors: None,
            async_errors: None,
            external_errors: BTreeMap::new(),
        }
    }
}

impl ControlState {
    pub fn is_valid(&self) -> bool {
        self.sync_errors.is_none() && self.async_errors.is_none() && self.external_errors.is_empty()
    }

    /// Failure messages from every source: sync, async, then external.
    pub fn messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = Vec::new();
        let engine = [&self.sync_errors, &self.async_errors];
        for results in engine.into_iter().flatten() {
            for message in results.messages() {
                if !messages.iter().any(|m| m == message) {
                    messages.push(message.to_string());
                }
            }
        }
        messages.extend(self.external_errors.values().cloned());
        messages
    }
}

#[derive(Debug)]
pub(crate) enum Children {
    None,
    Named(IndexMap<String, ControlId>),
    Indexed(Vec<ControlId>),
}

#[derive(Debug)]
pub(crate) struct Control {
    pub(crate) parent: Option<ControlId>,
    pub(crate) children: Children,
    /// Leaf value; groups and arrays assemble theirs from children.
    pub(crate) value: Value,
    /// `None` only for the root.
    pub(crate) property: Option<Arc<PropertyNode>>,
    pub(crate) state: ControlState,
    pub(crate) changes: broadcast::Sender<Value>,
}

impl Control {
    pub(crate) fn new(
        parent: Option<ControlId>,
        property: Option<Arc<PropertyNode>>,
        children: Children,
        value: Value,
        capacity: usize,
    ) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            parent,
            children,
            value,
            property,
            state: ControlState::default(),
            changes,
        }
    }

    pub(crate) fn kind(&self) -> ControlKind {
        match self.children {
            Children::None => ControlKind::Field,
            Children::Named(_) => ControlKind::Group,
            Children::Indexed(_) => ControlKind::Array,
        }
    }

    pub(crate) fn child_ids(&self) -> Vec<ControlId> {
        match &self.children {
            Children::None => Vec::new(),
            Children::Named(map) => map.values().copied().collect(),
            Children::Indexed(items) => items.clone(),
        }
    }
}
