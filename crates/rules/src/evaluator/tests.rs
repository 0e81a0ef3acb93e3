//! Tests for the evaluator module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::evaluator::{EvaluationState, RuleEngine};
use crate::schema::{Rule, RuleOutcome, RuleSet, Test};

fn pass() -> RuleSet {
    Rule::new(|_, _| true).into()
}

fn fail() -> RuleSet {
    Rule::new(|_, _| false).into()
}

fn pass_async() -> RuleSet {
    Rule::new_async(|_, _| async { true }).into()
}

fn fail_async() -> RuleSet {
    Rule::new_async(|_, _| async { false }).into()
}

/// Sync rule that counts its invocations.
fn counted(result: bool, counter: &Arc<AtomicUsize>) -> RuleSet {
    let counter = counter.clone();
    Rule::new(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        result
    })
    .into()
}

fn sync(rule_set: &RuleSet) -> RuleOutcome {
    RuleEngine::process_rule_set(&Value::Null, rule_set, EvaluationState::default())
}

async fn run_async(rule_set: &RuleSet) -> RuleOutcome {
    RuleEngine::process_rule_set_async(&Value::Null, rule_set, EvaluationState::default()).await
}

// -- process_rule_set ------------------------------------------------------

#[test]
fn single_rule_outcomes() {
    assert_eq!(sync(&pass()), RuleOutcome::Passed);
    assert_eq!(sync(&fail()), RuleOutcome::Failed);
}

#[test]
fn async_only_rule_is_skipped_synchronously() {
    assert_eq!(sync(&pass_async()), RuleOutcome::Skipped);
}

#[test]
fn rule_receives_value_and_root() {
    let rule: RuleSet = Rule::new(|value, root| value == &json!(30) && root["age"] == json!(30)).into();
    let root = json!({ "age": 30 });
    let outcome = RuleEngine::process_rule_set(&json!(30), &rule, EvaluationState::with_root(&root));
    assert_eq!(outcome, RuleOutcome::Passed);
}

#[test]
fn root_defaults_to_value() {
    let rule: RuleSet = Rule::new(|value, root| value == root).into();
    assert_eq!(
        RuleEngine::process_rule_set(&json!("x"), &rule, EvaluationState::default()),
        RuleOutcome::Passed
    );
}

#[test]
fn any_group_with_one_passing_child_passes() {
    assert_eq!(sync(&RuleSet::any([fail(), pass()])), RuleOutcome::Passed);
}

#[test]
fn any_group_all_failing_fails() {
    assert_eq!(sync(&RuleSet::any([fail(), fail()])), RuleOutcome::Failed);
}

#[test]
fn all_group_with_failing_child_fails() {
    assert_eq!(sync(&RuleSet::all([pass(), fail(), pass()])), RuleOutcome::Failed);
}

#[test]
fn all_group_passing_and_skipped_passes() {
    assert_eq!(sync(&RuleSet::all([pass(), pass_async()])), RuleOutcome::Passed);
}

#[test]
fn all_skipped_group_is_skipped_in_both_modes() {
    let all = RuleSet::all([pass_async(), fail_async()]);
    let any = RuleSet::any([pass_async(), fail_async()]);
    assert_eq!(sync(&all), RuleOutcome::Skipped);
    assert_eq!(sync(&any), RuleOutcome::Skipped);

    let all = RuleSet::all([pass(), fail()]);
    let any = RuleSet::any([pass(), fail()]);
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    assert_eq!(rt.block_on(run_async(&all)), RuleOutcome::Skipped);
    assert_eq!(rt.block_on(run_async(&any)), RuleOutcome::Skipped);
}

#[test]
fn any_group_of_skips_and_failures_fails() {
    assert_eq!(sync(&RuleSet::any([pass_async(), fail()])), RuleOutcome::Failed);
}

#[test]
fn sync_all_short_circuits_on_failure() {
    let after = Arc::new(AtomicUsize::new(0));
    let group = RuleSet::all([fail(), counted(true, &after)]);
    assert_eq!(sync(&group), RuleOutcome::Failed);
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn sync_any_short_circuits_on_pass() {
    let after = Arc::new(AtomicUsize::new(0));
    let group = RuleSet::any([pass(), counted(false, &after)]);
    assert_eq!(sync(&group), RuleOutcome::Passed);
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn nested_groups() {
    // ALL(pass, ANY(fail, pass))
    let group = RuleSet::all([pass(), RuleSet::any([fail(), pass()])]);
    assert_eq!(sync(&group), RuleOutcome::Passed);

    // ANY(fail, ALL(pass, fail))
    let group = RuleSet::any([fail(), RuleSet::all([pass(), fail()])]);
    assert_eq!(sync(&group), RuleOutcome::Failed);
}

#[test]
fn evaluation_is_idempotent() {
    let data = json!({ "name": "Ada", "tags": ["x"] });
    let snapshot = data.clone();
    let rule: RuleSet = Rule::new(|v, _| v["name"] == json!("Ada")).into();
    let group = RuleSet::all([rule, pass()]);

    let first = RuleEngine::process_rule_set(&data, &group, EvaluationState::default());
    let second = RuleEngine::process_rule_set(&data, &group, EvaluationState::default());
    assert_eq!(first, second);
    assert_eq!(data, snapshot);
}

// -- process_rule_set_async ------------------------------------------------

#[tokio::test]
async fn async_rule_outcomes() {
    assert_eq!(run_async(&pass_async()).await, RuleOutcome::Passed);
    assert_eq!(run_async(&fail_async()).await, RuleOutcome::Failed);
    assert_eq!(run_async(&pass()).await, RuleOutcome::Skipped);
}

#[tokio::test]
async fn async_rule_receives_owned_values() {
    let rule: RuleSet = Rule::new_async(|value, root| async move {
        tokio::task::yield_now().await;
        value == json!(7) && root["n"] == json!(7)
    })
    .into();
    let root = json!({ "n": 7 });
    let outcome =
        RuleEngine::process_rule_set_async(&json!(7), &rule, EvaluationState::with_root(&root)).await;
    assert_eq!(outcome, RuleOutcome::Passed);
}

#[tokio::test]
async fn async_all_evaluates_every_child() {
    let counter = Arc::new(AtomicUsize::new(0));
    let make = |result: bool| -> RuleSet {
        let counter = counter.clone();
        Rule::new_async(move |_, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                result
            }
        })
        .into()
    };

    let group = RuleSet::all([make(false), make(true), make(true)]);
    assert_eq!(run_async(&group).await, RuleOutcome::Failed);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn async_any_with_one_pass() {
    let group = RuleSet::any([fail_async(), pass_async(), fail_async()]);
    assert_eq!(run_async(&group).await, RuleOutcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn async_children_run_concurrently() {
    let slow = |ms: u64| -> RuleSet {
        Rule::new_async(move |_, _| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            true
        })
        .into()
    };
    let group = RuleSet::all([slow(100), slow(100), slow(100)]);

    let started = tokio::time::Instant::now();
    assert_eq!(run_async(&group).await, RuleOutcome::Passed);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn rule_with_both_functions_uses_mode() {
    let rule: RuleSet = Rule::with_both(|_, _| true, |_, _| async { false }).into();
    assert_eq!(sync(&rule), RuleOutcome::Passed);
    assert_eq!(run_async(&rule).await, RuleOutcome::Failed);
}

// -- run_tests -------------------------------------------------------------

#[test]
fn run_tests_collects_failures_and_unique_messages() {
    let tests = vec![
        Test::new(fail()).with_message("Boo1"),
        Test::new(fail()).with_message("Boo2"),
        Test::new(pass()).with_message("Pass"),
    ];
    let results = RuleEngine::run_tests(&Value::Null, &tests, EvaluationState::default());

    assert!(!results.passed());
    assert_eq!(results.failed_results().len(), 2);
    assert_eq!(results.messages(), vec!["Boo1", "Boo2"]);
    assert_eq!(results.message(), Some("Boo1"));
}

#[test]
fn duplicate_failure_messages_are_deduplicated() {
    let tests = vec![
        Test::new(fail()).with_message("Required"),
        Test::new(fail()).with_message("Required"),
    ];
    let results = RuleEngine::run_tests(&Value::Null, &tests, EvaluationState::default());
    assert_eq!(results.failed_results().len(), 2);
    assert_eq!(results.messages(), vec!["Required"]);
}

#[test]
fn failed_condition_skips_test_without_running_check() {
    let checks = Arc::new(AtomicUsize::new(0));
    let test = Test::new(counted(false, &checks))
        .when(fail())
        .named("gated")
        .with_message("never shown");

    let result = RuleEngine::run_test(&Value::Null, Some(&test), EvaluationState::default()).unwrap();
    assert!(result.passed);
    assert!(result.skipped);
    assert_eq!(result.message, None);
    assert_eq!(result.name.as_deref(), Some("gated"));
    assert_eq!(checks.load(Ordering::SeqCst), 0);
}

#[test]
fn passed_or_skipped_condition_runs_check() {
    let test = Test::new(fail()).when(pass()).with_message("bad");
    let result = RuleEngine::run_test(&Value::Null, Some(&test), EvaluationState::default()).unwrap();
    assert!(!result.passed);
    assert_eq!(result.message.as_deref(), Some("bad"));

    // Async-only condition is skipped in sync mode, which does not gate.
    let test = Test::new(fail()).when(fail_async()).with_message("bad");
    let result = RuleEngine::run_test(&Value::Null, Some(&test), EvaluationState::default()).unwrap();
    assert!(!result.passed);
}

#[test]
fn skipped_check_is_passed_and_skipped() {
    let test = Test::new(fail_async()).with_message("async only");
    let result = RuleEngine::run_test(&Value::Null, Some(&test), EvaluationState::default()).unwrap();
    assert!(result.passed);
    assert!(result.skipped);
}

#[test]
fn absent_test_yields_no_result() {
    assert!(RuleEngine::run_test(&Value::Null, None, EvaluationState::default()).is_none());
}

#[test]
fn run_tests_derived_views() {
    let tests = vec![
        Test::new(pass()).named("a"),
        Test::new(fail()).named("b").with_message("b failed"),
        Test::new(pass()).when(fail()).named("c"),
    ];
    let results = RuleEngine::run_tests(&Value::Null, &tests, EvaluationState::default());
    assert_eq!(results.len(), 3);
    assert_eq!(results.passed_results().len(), 2);
    assert_eq!(results.skipped_results().len(), 1);
    assert_eq!(results.skipped_results()[0].name.as_deref(), Some("c"));
    assert_eq!(results.failed_results()[0].name.as_deref(), Some("b"));
}

// -- run_tests_async / run_all_tests ---------------------------------------

#[tokio::test]
async fn run_tests_async_preserves_order() {
    let tests = vec![
        Test::new(fail_async()).with_message("first"),
        Test::new(pass_async()),
        Test::new(fail_async()).with_message("third"),
    ];
    let results = RuleEngine::run_tests_async(&Value::Null, &tests, EvaluationState::default()).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results.messages(), vec!["first", "third"]);
}

#[tokio::test]
async fn run_all_tests_stops_after_sync_failure() {
    let async_calls = Arc::new(AtomicUsize::new(0));
    let calls = async_calls.clone();
    let expensive: RuleSet = Rule::new_async(move |_, _| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    })
    .into();

    let tests = vec![
        Test::new(fail()).with_message("sync failure"),
        Test::new(expensive).with_message("async"),
    ];
    let results = RuleEngine::run_all_tests(&Value::Null, &tests, EvaluationState::default()).await;

    assert!(!results.passed());
    assert_eq!(results.messages(), vec!["sync failure"]);
    assert_eq!(async_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn run_all_tests_returns_async_results_after_sync_pass() {
    let tests = vec![
        Test::new(pass()),
        Test::new(fail_async()).with_message("taken"),
    ];
    let results = RuleEngine::run_all_tests(&Value::Null, &tests, EvaluationState::default()).await;
    assert!(!results.passed());
    assert_eq!(results.messages(), vec!["taken"]);
    // The sync-only test is skipped in the async pass.
    assert_eq!(results.skipped_results().len(), 1);
}

#[tokio::test]
async fn run_all_tests_with_mixed_group() {
    // Sync pass treats the async-only child as neutral; the async pass
    // requires every ALL child to pass, and the sync-only one is skipped.
    let tests = vec![Test::new(RuleSet::all([pass(), pass_async()])).with_message("mixed")];
    let results = RuleEngine::run_all_tests(&Value::Null, &tests, EvaluationState::default()).await;
    assert!(!results.passed());
    assert_eq!(results.messages(), vec!["mixed"]);
}

#[tokio::test]
async fn async_all_counts_skipped_child_as_failure() {
    assert_eq!(run_async(&RuleSet::all([pass(), pass_async()])).await, RuleOutcome::Failed);
    assert_eq!(run_async(&RuleSet::any([pass(), pass_async()])).await, RuleOutcome::Passed);
    assert_eq!(sync(&RuleSet::all([pass(), pass_async()])), RuleOutcome::Passed);
}

// -- dependency_properties -------------------------------------------------

#[test]
fn dependency_properties_are_ordered_and_unique() {
    let tests = vec![
        Test::new(RuleSet::all([
            Rule::new(|_, _| true).depends_on(["age", "name"]).into(),
            RuleSet::any([RuleSet::from(
                Rule::new(|_, _| true).depends_on(["../age", "name"]),
            )]),
        ]))
        .when(Rule::new(|_, _| true).depends_on(["/nicknames.0"])),
        Test::new(Rule::new(|_, _| true).depends_on(["age", "./car.make"])),
    ];

    assert_eq!(
        RuleEngine::dependency_properties(&tests),
        vec!["age", "name", "../age", "/nicknames.0", "./car.make"]
    );
}

#[test]
fn repeated_dependencies_keep_first_position() {
    let tests = vec![
        Test::new(Rule::new(|_, _| true).depends_on(["name", "age", "name"])),
        Test::new(RuleSet::all([
            Rule::new(|_, _| true).depends_on(["age"]).into(),
            Rule::new(|_, _| true).depends_on(["car.make", "name"]).into(),
        ])),
    ];

    assert_eq!(
        RuleEngine::dependency_properties(&tests),
        vec!["name", "age", "car.make"]
    );
}

#[test]
fn no_declared_dependencies() {
    let tests = vec![Test::new(pass()), Test::new(RuleSet::all([fail()]))];
    assert!(RuleEngine::dependency_properties(&tests).is_empty());
    assert!(RuleEngine::dependency_properties(&[]).is_empty());
}
