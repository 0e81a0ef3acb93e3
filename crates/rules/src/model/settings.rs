//! A named, finalised property tree.

use crate::error::{Result, RuleError};
use crate::schema::{ChangePolicy, PropertyNode};

/// Name given to settings built with [`ModelSettings::adhoc`].
pub const ADHOC_SETTINGS_NAME: &str = "adhoc";

/// Root of a model: named settings owning a list of top-level properties.
///
/// Every property's `absolute_path` and `owner_settings_name` are assigned
/// on construction and whenever a property is added. The root path is `""`.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    name: String,
    properties: Vec<PropertyNode>,
    /// `None` defers to the engine configuration.
    default_policy: Option<ChangePolicy>,
}

impl ModelSettings {
    pub fn new(name: impl Into<String>, properties: Vec<PropertyNode>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RuleError::EmptySettingsName);
        }
        let mut settings = Self {
            name,
            properties: Vec::with_capacity(properties.len()),
            default_policy: None,
        };
        for property in properties {
            settings.add_property(property);
        }
        Ok(settings)
    }

    /// Unregistered settings produced by a caller-supplied builder.
    ///
    /// The result is owned by the caller and may be adjusted before use.
    pub fn adhoc<F>(build: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Vec<PropertyNode>>,
    {
        Self::new(ADHOC_SETTINGS_NAME, build()?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyNode] {
        &self.properties
    }

    pub fn add_property(&mut self, mut property: PropertyNode) {
        property.assign_paths("", &self.name);
        self.properties.push(property);
    }

    /// Policy for properties that do not set their own, if these settings
    /// carry one.
    pub fn default_policy(&self) -> Option<ChangePolicy> {
        self.default_policy
    }

    pub fn with_default_policy(mut self, policy: ChangePolicy) -> Self {
        self.default_policy = Some(policy);
        self
    }

    pub fn set_default_policy(&mut self, policy: ChangePolicy) {
        self.default_policy = Some(policy);
    }

    /// Look a property up by its absolute (template) path.
    pub fn property(&self, absolute_path: &str) -> Option<&PropertyNode> {
        let mut segments = absolute_path.split('.');
        let first = segments.next()?;
        let mut node = self.properties.iter().find(|p| p.segment() == first)?;
        for segment in segments {
            node = match node.array_item() {
                Some(item) if segment == item.segment() => item,
                _ => node.child(segment)?,
            };
        }
        Some(node)
    }

    /// Find the template property an indexed path is an instance of.
    pub fn property_for(&self, concrete_path: &str) -> Option<&PropertyNode> {
        let mut found = None;
        for property in &self.properties {
            property.walk(&mut |node| {
                if found.is_none() && node.matches_path(concrete_path) {
                    found = Some(node.absolute_path.clone());
                }
            });
        }
        found.and_then(|path| self.property(&path))
    }
}
