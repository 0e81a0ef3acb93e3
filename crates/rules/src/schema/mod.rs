//! Declarative rule and property model types.
//!
//! - [`RuleSet`]: a single [`Rule`] or a [`RuleGroup`] with ALL/ANY semantics
//! - [`Test`]: a check rule-set gated by an optional condition rule-set
//! - [`TestResult`] / [`TestResults`]: evaluation output
//! - [`PropertyNode`]: the static, nested description of a model's fields

mod property;
mod rule;

pub use property::*;
pub use rule::*;
pub use test::*;
