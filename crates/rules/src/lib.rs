//! Declarative, rule-based validation and editability engine for
//! hierarchical form data.
//!
//! This crate provides:
//! - Rules, rule groups and tests with tri-state outcomes ([`schema`])
//! - Sync and async evaluation with short-circuiting ([`evaluator`])
//! - A static property model with named settings and a registry ([`model`])
//! - A relative path grammar resolved against a live tree ([`path`])
//! - A live control tree materialised from a model ([`form`])
//! - Reactive recomputation with debounce, distinct and force ([`scheduler`])

pub mod error;
pub mod evaluator;
pub mod form;
pub mod model;
pub mod path;
pub mod scheduler;
pub mod schema;

pub use error::{Result, RuleError};
pub use evaluator::{EvaluationState, RuleEngine};
pub use form::{ControlId, ControlKind, ControlState, FormTree};
pub use model::{ModelSettings, ModelSettingsRegistry, PropertyBuilder};
pub use scheduler::RecomputeScheduler;
pub use schema::{PropertyNode, Rule, RuleOutcome, RuleSet, Test, TestResult, TestResults};
