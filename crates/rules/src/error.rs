//! Error type for the builder, registry and control-tree APIs.
//!
//! Rule evaluation never produces these: failing rules are reported as
//! [`TestResult`](crate::schema::TestResult) data, and unresolvable
//! dependency paths are dropped.

use crate::form::ControlId;

/// Errors raised by structural misuse of the engine API.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Property name rejected at construction time.
    #[error("Invalid property name {name:?}: {reason}")]
    InvalidPropertyName { name: String, reason: &'static str },

    /// Model settings registered without a name.
    #[error("Model settings name must not be empty")]
    EmptySettingsName,

    /// A model settings instance with this name is already registered.
    #[error("Model settings {0:?} already registered")]
    DuplicateSettings(String),

    /// No model settings registered under this name.
    #[error("Model settings {0:?} not found")]
    SettingsNotFound(String),

    /// Control id does not belong to the tree (or was removed).
    #[error("Unknown control {0}")]
    UnknownControl(ControlId),

    /// Operation requires a leaf field control.
    #[error("Control at {0:?} is not a field")]
    NotAField(String),

    /// Operation requires an array control.
    #[error("Control at {0:?} is not an array")]
    NotAnArray(String),

    /// Array index outside `0..=len` (insert) or `0..len` (remove).
    #[error("Index {index} out of bounds for array {path:?} of length {len}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, RuleError>;
