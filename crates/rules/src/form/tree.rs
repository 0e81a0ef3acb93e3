//! [`FormTree`]: construction, navigation, values and structure edits.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use fieldrules_core::EngineConfig;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::model::{ModelSettings, ModelSettingsRegistry};
use crate::path::{parse_path, resolve_tokens, ControlNavigator};
use crate::schema::{ChangePolicy, PropertyNode, PropertyShape};

use super::control::{
    Children, Control, ControlId, ControlKind, ControlState, StructureChange, StructureObserver,
};

/// Arena of controls. Removed controls leave a `None` slot.
#[derive(Debug)]
pub(crate) struct Arena {
    controls: Vec<Option<Control>>,
    capacity: usize,
}

impl Arena {
    pub(crate) fn get(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: ControlId) -> Option<&mut Control> {
        self.controls.get_mut(id.0).and_then(Option::as_mut)
    }

    fn alloc(&mut self, control: Control) -> ControlId {
        let id = ControlId(self.controls.len());
        self.controls.push(Some(control));
        id
    }

    /// Build a control (and its subtree) for `shape`, seeded from `data`.
    fn build(
        &mut self,
        parent: Option<ControlId>,
        property: Option<Arc<PropertyNode>>,
        shape: &PropertyShape,
        data: &Value,
        created: &mut Vec<ControlId>,
    ) -> ControlId {
        let (children, value) = match shape {
            PropertyShape::Value => (Children::None, data.clone()),
            PropertyShape::Object(_) => (Children::Named(IndexMap::new()), Value::Null),
            PropertyShape::Array(_) => (Children::Indexed(Vec::new()), Value::Null),
        };
        let id = self.alloc(Control::new(parent, property, children, value, self.capacity));
        created.push(id);

        let children = match shape {
            PropertyShape::Value => return id,
            PropertyShape::Object(properties) => {
                let mut named = IndexMap::new();
                for child in properties {
                    let Some(name) = child.name() else { continue };
                    let child = Arc::new(child.clone());
                    let data = data.get(name).unwrap_or(&Value::Null);
                    let child_id = self.build(Some(id), Some(child.clone()), &child.shape, data, created);
                    named.insert(name.to_string(), child_id);
                }
                Children::Named(named)
            }
            PropertyShape::Array(item) => {
                let template = Arc::new((**item).clone());
                let elements = data.as_array().map(Vec::as_slice).unwrap_or_default();
                let items = elements
                    .iter()
                    .map(|element| {
                        self.build(Some(id), Some(template.clone()), &template.shape, element, created)
                    })
                    .collect();
                Children::Indexed(items)
            }
        };

        if let Some(control) = self.get_mut(id) {
            control.children = children;
        }
        id
    }

    /// Drop a control and its whole subtree.
    fn remove_subtree(&mut self, id: ControlId) {
        let children = self.get(id).map(Control::child_ids).unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
        if let Some(slot) = self.controls.get_mut(id.0) {
            *slot = None;
        }
    }

    pub(crate) fn value_of(&self, id: ControlId) -> Value {
        let Some(control) = self.get(id) else {
            return Value::Null;
        };
        match &control.children {
            Children::None => control.value.clone(),
            Children::Named(named) => Value::Object(
                named
                    .iter()
                    .map(|(name, child)| (name.clone(), self.value_of(*child)))
                    .collect::<Map<_, _>>(),
            ),
            Children::Indexed(items) => {
                Value::Array(items.iter().map(|child| self.value_of(*child)).collect())
            }
        }
    }

    /// `id` followed by all of its ancestors, innermost first.
    pub(crate) fn lineage(&self, id: ControlId) -> Vec<ControlId> {
        let mut lineage = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(control) = self.get(id) else { break };
            lineage.push(id);
            current = control.parent;
        }
        lineage
    }

    /// Concrete dot path of a control; the root is `""`.
    fn path_of(&self, id: ControlId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let control = self.get(current)?;
            let Some(parent_id) = control.parent else { break };
            let parent = self.get(parent_id)?;
            let segment = match &parent.children {
                Children::Named(named) => named
                    .iter()
                    .find(|(_, child)| **child == current)
                    .map(|(name, _)| name.clone())?,
                Children::Indexed(items) => items.iter().position(|c| *c == current)?.to_string(),
                Children::None => return None,
            };
            segments.push(segment);
            current = parent_id;
        }
        segments.reverse();
        Some(segments.join("."))
    }
}

// ── FormTree ────────────────────────────────────────────────────────

/// Control tree for one model instance.
///
/// Shared as `Arc<FormTree>`. All methods take `&self`; interior state is
/// behind a lock that is never held across rule evaluation or an await.
#[derive(Debug)]
pub struct FormTree {
    settings: ModelSettings,
    /// Policy for properties without their own.
    defaults: ChangePolicy,
    root: ControlId,
    pub(crate) inner: RwLock<Arena>,
    structure: broadcast::Sender<StructureChange>,
    observers: RwLock<Vec<Weak<dyn StructureObserver>>>,
}

impl FormTree {
    /// Build a tree from `settings`, seeded with `data`.
    pub fn build(settings: ModelSettings, data: &Value) -> Arc<Self> {
        Self::build_with_config(settings, data, &EngineConfig::default())
    }

    pub fn build_with_config(settings: ModelSettings, data: &Value, config: &EngineConfig) -> Arc<Self> {
        let mut arena = Arena {
            controls: Vec::new(),
            capacity: config.channel_capacity.max(1),
        };
        let mut created = Vec::new();
        let root_shape = PropertyShape::Object(settings.properties().to_vec());
        let root = arena.build(None, None, &root_shape, data, &mut created);
        let (structure, _) = broadcast::channel(arena.capacity);

        let defaults = settings
            .default_policy()
            .unwrap_or_else(|| ChangePolicy::from_config(config));
        let tree = Arc::new(Self {
            settings,
            defaults,
            root,
            inner: RwLock::new(arena),
            structure,
            observers: RwLock::new(Vec::new()),
        });
        debug!(settings = %tree.settings.name(), controls = created.len(), "built control tree");
        tree.refresh_controls(&created);
        tree
    }

    /// Build a tree from registered settings.
    pub fn build_named(registry: &ModelSettingsRegistry, name: &str, data: &Value) -> Result<Arc<Self>> {
        Ok(Self::build(registry.require(name)?, data))
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.inner.read().expect("form tree lock poisoned")
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.inner.write().expect("form tree lock poisoned")
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn root(&self) -> ControlId {
        self.root
    }

    /// Control at a dot path from the root (`"nicknames.0"`).
    pub fn get(&self, path: &str) -> Option<ControlId> {
        resolve_tokens(self, self.root, &parse_path(path))
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.read().get(id).is_some()
    }

    /// Live control ids in creation order.
    pub fn controls(&self) -> Vec<ControlId> {
        self.read()
            .controls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| ControlId(i))
            .collect()
    }

    pub fn kind(&self, id: ControlId) -> Option<ControlKind> {
        self.read().get(id).map(Control::kind)
    }

    pub fn parent_of(&self, id: ControlId) -> Option<ControlId> {
        self.read().get(id).and_then(|c| c.parent)
    }

    pub fn path(&self, id: ControlId) -> Option<String> {
        self.read().path_of(id)
    }

    /// Model property the control was built from; `None` for the root.
    pub fn property(&self, id: ControlId) -> Option<Arc<PropertyNode>> {
        self.read().get(id).and_then(|c| c.property.clone())
    }

    /// Effective change policy of a control.
    pub fn policy(&self, id: ControlId) -> ChangePolicy {
        self.property(id)
            .map_or(self.defaults, |p| p.policy_or(self.defaults))
    }

    pub fn value(&self, id: ControlId) -> Value {
        self.read().value_of(id)
    }

    pub fn root_value(&self) -> Value {
        self.value(self.root)
    }

    pub fn state(&self, id: ControlId) -> Option<ControlState> {
        self.read().get(id).map(|c| c.state.clone())
    }

    /// Unknown controls are not valid.
    pub fn is_valid(&self, id: ControlId) -> bool {
        self.state(id).is_some_and(|s| s.is_valid())
    }

    /// Value-change stream of a control. Fires for the control's own
    /// changes and for changes anywhere below it.
    pub fn subscribe(&self, id: ControlId) -> Option<broadcast::Receiver<Value>> {
        self.read().get(id).map(|c| c.changes.subscribe())
    }

    /// Broadcast of structure edits, for observers that may lag behind.
    pub fn subscribe_structure(&self) -> broadcast::Receiver<StructureChange> {
        self.structure.subscribe()
    }

    /// Register an observer that runs inside every structure edit. Dropped
    /// observers are pruned on the next edit.
    pub fn observe_structure(&self, observer: Weak<dyn StructureObserver>) {
        self.observers
            .write()
            .expect("structure observers lock poisoned")
            .push(observer);
    }

    fn notify_observers(&self, change: &StructureChange) {
        let live: Vec<Arc<dyn StructureObserver>> = {
            let mut observers = self
                .observers
                .write()
                .expect("structure observers lock poisoned");
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.structure_changed(change);
        }
    }

    // ── Edits ───────────────────────────────────────────────────────

    /// Set a field's value, re-run synchronous validity up the lineage,
    /// then publish the change to the field and its ancestors.
    pub fn set_value(&self, id: ControlId, value: Value) -> Result<()> {
        let lineage = {
            let mut arena = self.write();
            let path = arena.path_of(id);
            let control = arena.get_mut(id).ok_or(RuleError::UnknownControl(id))?;
            if control.kind() != ControlKind::Field {
                return Err(RuleError::NotAField(path.unwrap_or_default()));
            }
            control.value = value;
            arena.lineage(id)
        };

        for id in &lineage {
            self.update_value_and_validity(*id);
        }
        self.emit(&lineage);
        Ok(())
    }

    /// Insert a new element built from the array's item template.
    ///
    /// Structure observers have run by the time this returns.
    pub fn insert_item(&self, array: ControlId, index: usize, value: Value) -> Result<ControlId> {
        let (item, created, lineage) = {
            let mut arena = self.write();
            let path = arena.path_of(array).unwrap_or_default();
            let control = arena.get(array).ok_or(RuleError::UnknownControl(array))?;
            let (Children::Indexed(items), Some(template)) = (
                &control.children,
                control.property.as_ref().and_then(|p| p.array_item()),
            ) else {
                return Err(RuleError::NotAnArray(path));
            };
            if index > items.len() {
                return Err(RuleError::IndexOutOfBounds {
                    path,
                    index,
                    len: items.len(),
                });
            }

            let template = Arc::new(template.clone());
            let mut created = Vec::new();
            let item = arena.build(Some(array), Some(template.clone()), &template.shape, &value, &mut created);
            if let Some(Control {
                children: Children::Indexed(items),
                ..
            }) = arena.get_mut(array)
            {
                items.insert(index, item);
            }
            (item, created, arena.lineage(array))
        };

        debug!(array = %array, index, "inserted array item");
        self.refresh_controls(&created);
        for id in &lineage {
            self.update_value_and_validity(*id);
        }
        let change = StructureChange::Inserted { array, index };
        self.notify_observers(&change);
        self.emit(&lineage);
        let _ = self.structure.send(change);
        Ok(item)
    }

    pub fn push_item(&self, array: ControlId, value: Value) -> Result<ControlId> {
        let len = {
            let arena = self.read();
            match arena.get(array).map(|c| &c.children) {
                Some(Children::Indexed(items)) => items.len(),
                Some(_) => return Err(RuleError::NotAnArray(arena.path_of(array).unwrap_or_default())),
                None => return Err(RuleError::UnknownControl(array)),
            }
        };
        self.insert_item(array, len, value)
    }

    /// Remove an element, returning its last value.
    pub fn remove_item(&self, array: ControlId, index: usize) -> Result<Value> {
        let (removed, lineage) = {
            let mut arena = self.write();
            let path = arena.path_of(array).unwrap_or_default();
            let control = arena.get_mut(array).ok_or(RuleError::UnknownControl(array))?;
            let Children::Indexed(items) = &mut control.children else {
                return Err(RuleError::NotAnArray(path));
            };
            if index >= items.len() {
                return Err(RuleError::IndexOutOfBounds {
                    path,
                    index,
                    len: items.len(),
                });
            }
            let item = items.remove(index);
            let removed = arena.value_of(item);
            arena.remove_subtree(item);
            (removed, arena.lineage(array))
        };

        debug!(array = %array, index, "removed array item");
        for id in &lineage {
            self.update_value_and_validity(*id);
        }
        let change = StructureChange::Removed { array, index };
        self.notify_observers(&change);
        self.emit(&lineage);
        let _ = self.structure.send(change);
        Ok(removed)
    }

    /// Publish current values to each control's change stream.
    fn emit(&self, ids: &[ControlId]) {
        let outgoing: Vec<_> = {
            let arena = self.read();
            ids.iter()
                .filter_map(|id| {
                    arena
                        .get(*id)
                        .map(|c| (c.changes.clone(), arena.value_of(*id)))
                })
                .collect()
        };
        for (sender, value) in outgoing {
            // No receivers is fine.
            let _ = sender.send(value);
        }
    }
}

impl ControlNavigator for FormTree {
    type Id = ControlId;

    fn root(&self) -> ControlId {
        self.root
    }

    fn parent(&self, id: ControlId) -> Option<ControlId> {
        self.parent_of(id)
    }

    fn child(&self, id: ControlId, segment: &str) -> Option<ControlId> {
        let arena = self.read();
        match &arena.get(id)?.children {
            Children::Named(named) => named.get(segment).copied(),
            Children::Indexed(items) => items.get(segment.parse::<usize>().ok()?).copied(),
            Children::None => None,
        }
    }
}
