//! Fluent construction of [`PropertyNode`] trees.

use crate::error::{Result, RuleError};
use crate::schema::{
    ChangePolicy, PropertyKind, PropertyNode, PropertyShape, Test, ARRAY_ITEM_SEGMENT,
};

/// Builds one property node.
///
/// ```ignore
/// let age = PropertyBuilder::new("age")?
///     .valid(Test::new(Rule::new(|v, _| v.as_u64().is_some())).with_message("Number"))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    node: PropertyNode,
}

impl PropertyBuilder {
    /// Named field. Fails for names that cannot form a path segment.
    pub fn new(name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            node: PropertyNode::with_kind(PropertyKind::Named(name.to_string())),
        })
    }

    /// Template describing every element of an array.
    pub fn array_item() -> Self {
        Self {
            node: PropertyNode::with_kind(PropertyKind::ArrayItem),
        }
    }

    pub fn valid(mut self, test: Test) -> Self {
        self.node.valid_tests.push(test);
        self
    }

    pub fn edit(mut self, test: Test) -> Self {
        self.node.edit_tests.push(test);
        self
    }

    pub fn view(mut self, test: Test) -> Self {
        self.node.view_tests.push(test);
        self
    }

    /// Make this a complex object with the given named children.
    pub fn properties(mut self, children: Vec<PropertyNode>) -> Self {
        self.node.shape = PropertyShape::Object(children);
        self
    }

    /// Make this an array whose elements are described by `item`.
    pub fn array_item_property(mut self, item: PropertyBuilder) -> Self {
        self.node.shape = PropertyShape::Array(Box::new(item.node));
        self
    }

    pub fn policy(mut self, policy: ChangePolicy) -> Self {
        self.node.change_policy = Some(policy);
        self
    }

    pub fn build(self) -> PropertyNode {
        self.node
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.trim().is_empty() {
        "must not be whitespace"
    } else if name.contains('.') || name.contains('/') {
        "must not contain '.' or '/'"
    } else if name == ARRAY_ITEM_SEGMENT {
        "is reserved for array items"
    } else {
        return Ok(());
    };

    Err(RuleError::InvalidPropertyName {
        name: name.to_string(),
        reason,
    })
}
