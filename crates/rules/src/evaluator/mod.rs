//! Rule-set evaluator, test runner and dependency extractor.
//!
//! [`RuleEngine`] is the entry point consumers call:
//! - `process_rule_set` / `process_rule_set_async` → tri-state [`RuleOutcome`]
//! - `run_tests` / `run_tests_async` / `run_all_tests` → [`TestResults`]
//! - `dependency_properties` → declared dependency paths
//!
//! Evaluation is pure over the supplied data. Failing rules are data,
//! never errors.

mod dependencies;
mod rule_set;
mod runner;

#[cfg(test)]
mod tests;

use serde_json::Value;

use crate::schema::{RuleOutcome, RuleSet, Test, TestResult, TestResults};

/// Optional context passed alongside the evaluated value.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationState<'a> {
    /// Full model value, for rules that look outside their own subtree.
    /// Defaults to the evaluated value itself.
    pub root_data: Option<&'a Value>,
}

impl<'a> EvaluationState<'a> {
    pub fn with_root(root_data: &'a Value) -> Self {
        Self {
            root_data: Some(root_data),
        }
    }

    fn root_or(&self, data: &'a Value) -> &'a Value {
        self.root_data.unwrap_or(data)
    }
}

/// Stateless evaluation facade.
pub struct RuleEngine;

impl RuleEngine {
    /// Evaluate a rule-set with synchronous rule functions only.
    pub fn process_rule_set(data: &Value, rule_set: &RuleSet, state: EvaluationState<'_>) -> RuleOutcome {
        rule_set::evaluate(data, state.root_or(data), rule_set)
    }

    /// Evaluate a rule-set with asynchronous rule functions only.
    pub async fn process_rule_set_async(
        data: &Value,
        rule_set: &RuleSet,
        state: EvaluationState<'_>,
    ) -> RuleOutcome {
        rule_set::evaluate_async(data, state.root_or(data), rule_set).await
    }

    /// Run one test synchronously; `None` if the test is absent.
    pub fn run_test(data: &Value, test: Option<&Test>, state: EvaluationState<'_>) -> Option<TestResult> {
        runner::run_test(data, state.root_or(data), test)
    }

    pub async fn run_test_async(
        data: &Value,
        test: Option<&Test>,
        state: EvaluationState<'_>,
    ) -> Option<TestResult> {
        runner::run_test_async(data, state.root_or(data), test).await
    }

    pub fn run_tests(data: &Value, tests: &[Test], state: EvaluationState<'_>) -> TestResults {
        runner::run_tests(data, state.root_or(data), tests)
    }

    /// Run every test's asynchronous rules; tests settle concurrently and
    /// results keep declaration order.
    pub async fn run_tests_async(data: &Value, tests: &[Test], state: EvaluationState<'_>) -> TestResults {
        runner::run_tests_async(data, state.root_or(data), tests).await
    }

    /// Synchronous pass first; asynchronous rules only run when it passed.
    pub async fn run_all_tests(data: &Value, tests: &[Test], state: EvaluationState<'_>) -> TestResults {
        runner::run_all_tests(data, state.root_or(data), tests).await
    }

    /// Dependency paths declared anywhere in `tests`, without duplicates.
    pub fn dependency_properties(tests: &[Test]) -> Vec<String> {
        dependencies::dependency_properties(tests)
    }
}
