//! Static property model: named fields, complex objects and array-item templates.

use std::time::Duration;

use fieldrules_core::EngineConfig;
use serde::{Deserialize, Serialize};

use super::test::Test;

/// Path segment used by array-item templates in place of an index.
pub const ARRAY_ITEM_SEGMENT: &str = "[]";

/// Named field vs. the unnamed template describing every array element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Named(String),
    ArrayItem,
}

/// What a property contains below itself.
#[derive(Debug, Clone, Default)]
pub enum PropertyShape {
    /// Leaf value.
    #[default]
    Value,
    /// Complex object with named children.
    Object(Vec<PropertyNode>),
    /// Array whose elements are all described by one template.
    Array(Box<PropertyNode>),
}

// ── Change policy ───────────────────────────────────────────────────

/// Debounce/distinct settings for one trigger category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSettings {
    pub debounce_milliseconds: u64,
    pub distinct_until_changed: bool,
}

impl ChangeSettings {
    pub fn new(debounce_milliseconds: u64, distinct_until_changed: bool) -> Self {
        Self {
            debounce_milliseconds,
            distinct_until_changed,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_milliseconds)
    }
}

/// Per-property recomputation settings, one slot per trigger category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePolicy {
    pub dependency_valid: ChangeSettings,
    pub dependency_edit: ChangeSettings,
    pub self_edit: ChangeSettings,
    pub self_async_valid: ChangeSettings,
}

impl ChangePolicy {
    /// Defaults taken from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        let p = &config.policy;
        Self {
            dependency_valid: ChangeSettings::new(
                p.dependency_valid_debounce_ms,
                p.dependency_distinct,
            ),
            dependency_edit: ChangeSettings::new(
                p.dependency_edit_debounce_ms,
                p.dependency_distinct,
            ),
            self_edit: ChangeSettings::new(p.self_edit_debounce_ms, p.self_edit_distinct),
            self_async_valid: ChangeSettings::new(
                p.self_async_valid_debounce_ms,
                p.self_async_valid_distinct,
            ),
        }
    }
}

// ── PropertyNode ────────────────────────────────────────────────────

/// One node of a model's property tree.
///
/// `absolute_path` and `owner_settings_name` are assigned when the
/// owning [`ModelSettings`](crate::model::ModelSettings) is finalised.
#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub kind: PropertyKind,
    pub absolute_path: String,
    pub owner_settings_name: Option<String>,
    pub valid_tests: Vec<Test>,
    pub edit_tests: Vec<Test>,
    pub view_tests: Vec<Test>,
    pub shape: PropertyShape,
    /// `None` means "use the engine defaults".
    pub change_policy: Option<ChangePolicy>,
}

impl PropertyNode {
    pub(crate) fn with_kind(kind: PropertyKind) -> Self {
        Self {
            kind,
            absolute_path: String::new(),
            owner_settings_name: None,
            valid_tests: Vec::new(),
            edit_tests: Vec::new(),
            view_tests: Vec::new(),
            shape: PropertyShape::Value,
            change_policy: None,
        }
    }

    /// Field name; `None` for array-item templates.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Named(name) => Some(name),
            PropertyKind::ArrayItem => None,
        }
    }

    pub fn is_array_item(&self) -> bool {
        self.kind == PropertyKind::ArrayItem
    }

    /// Segment this node contributes to absolute paths.
    pub fn segment(&self) -> &str {
        self.name().unwrap_or(ARRAY_ITEM_SEGMENT)
    }

    pub fn children(&self) -> &[PropertyNode] {
        match &self.shape {
            PropertyShape::Object(children) => children,
            _ => &[],
        }
    }

    pub fn array_item(&self) -> Option<&PropertyNode> {
        match &self.shape {
            PropertyShape::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Named child of an object-shaped node.
    pub fn child(&self, name: &str) -> Option<&PropertyNode> {
        self.children().iter().find(|c| c.name() == Some(name))
    }

    pub fn policy_or(&self, defaults: ChangePolicy) -> ChangePolicy {
        self.change_policy.unwrap_or(defaults)
    }

    /// Whether a concrete, indexed path (`nicknames.3.first`) is an
    /// instance of this node's path (`nicknames.[].first`).
    pub fn matches_path(&self, concrete: &str) -> bool {
        let pattern: Vec<&str> = self.absolute_path.split('.').collect();
        let concrete: Vec<&str> = concrete.split('.').collect();
        if pattern.len() != concrete.len() {
            return false;
        }
        pattern.iter().zip(&concrete).all(|(&p, &c)| {
            if p == ARRAY_ITEM_SEGMENT {
                c == ARRAY_ITEM_SEGMENT || c.parse::<usize>().is_ok()
            } else {
                p == c
            }
        })
    }

    /// Depth-first walk over this node and all descendants.
    pub fn walk(&self, visit: &mut dyn FnMut(&PropertyNode)) {
        visit(self);
        match &self.shape {
            PropertyShape::Value => {}
            PropertyShape::Object(children) => {
                for child in children {
                    child.walk(visit);
                }
            }
            PropertyShape::Array(item) => item.walk(visit),
        }
    }

    /// Assign absolute paths and owner below `parent_path`.
    pub(crate) fn assign_paths(&mut self, parent_path: &str, owner: &str) {
        self.absolute_path = join_path(parent_path, self.segment());
        self.owner_settings_name = Some(owner.to_string());
        let path = self.absolute_path.clone();
        match &mut self.shape {
            PropertyShape::Value => {}
            PropertyShape::Object(children) => {
                for child in children {
                    child.assign_paths(&path, owner);
                }
            }
            PropertyShape::Array(item) => item.assign_paths(&path, owner),
        }
    }
}

/// Dot-join a segment onto a parent path; the root path is `""`.
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", parent, segment)
    }
}
