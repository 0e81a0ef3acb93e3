//! Test runner: condition gate plus check, per test and per test list.

use futures::future::join_all;
use serde_json::Value;

use crate::schema::{RuleOutcome, Test, TestResult, TestResults};

use super::rule_set::{evaluate, evaluate_async};

/// Map condition and check outcomes to a test result.
///
/// A failed condition skips the test; a missing condition is no gate.
fn verdict(test: &Test, check: RuleOutcome) -> TestResult {
    match check {
        RuleOutcome::Passed => TestResult::passed(test),
        RuleOutcome::Failed => TestResult::failed(test),
        RuleOutcome::Skipped => TestResult::skipped(test),
    }
}

pub(crate) fn run_test(data: &Value, root: &Value, test: Option<&Test>) -> Option<TestResult> {
    let test = test?;
    let condition = test
        .condition
        .as_ref()
        .map_or(RuleOutcome::Skipped, |c| evaluate(data, root, c));

    if condition == RuleOutcome::Failed {
        return Some(TestResult::skipped(test));
    }
    Some(verdict(test, evaluate(data, root, &test.check)))
}

pub(crate) async fn run_test_async(
    data: &Value,
    root: &Value,
    test: Option<&Test>,
) -> Option<TestResult> {
    let test = test?;
    let condition = match &test.condition {
        Some(c) => evaluate_async(data, root, c).await,
        None => RuleOutcome::Skipped,
    };

    if condition == RuleOutcome::Failed {
        return Some(TestResult::skipped(test));
    }
    Some(verdict(test, evaluate_async(data, root, &test.check).await))
}

pub(crate) fn run_tests(data: &Value, root: &Value, tests: &[Test]) -> TestResults {
    tests
        .iter()
        .filter_map(|t| run_test(data, root, Some(t)))
        .collect()
}

pub(crate) async fn run_tests_async(data: &Value, root: &Value, tests: &[Test]) -> TestResults {
    join_all(tests.iter().map(|t| run_test_async(data, root, Some(t))))
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Sync subset first; the async subset only runs if the sync one passed.
pub(crate) async fn run_all_tests(data: &Value, root: &Value, tests: &[Test]) -> TestResults {
    let sync_results = run_tests(data, root, tests);
    if !sync_results.passed() {
        return sync_results;
    }
    run_tests_async(data, root, tests).await
}
