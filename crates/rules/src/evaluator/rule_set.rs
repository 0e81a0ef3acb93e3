//! Recursive rule-set evaluation.
//!
//! Synchronous groups short-circuit in declaration order. Asynchronous
//! groups launch every child, join, then reduce. A group whose children
//! were all skipped is itself skipped in both modes. Otherwise skipped
//! children are neutral synchronously, but an asynchronous ALL group needs
//! every child to pass.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::schema::{PassRequirement, Rule, RuleGroup, RuleOutcome, RuleSet};

// ── Synchronous ─────────────────────────────────────────────────────

pub(crate) fn evaluate(data: &Value, root: &Value, rule_set: &RuleSet) -> RuleOutcome {
    match rule_set {
        RuleSet::Rule(rule) => evaluate_rule(data, root, rule),
        RuleSet::Group(group) => evaluate_group(data, root, group),
    }
}

fn evaluate_rule(data: &Value, root: &Value, rule: &Rule) -> RuleOutcome {
    match rule.func() {
        Some(func) => RuleOutcome::from_bool(func(data, root)),
        None => RuleOutcome::Skipped,
    }
}

fn evaluate_group(data: &Value, root: &Value, group: &RuleGroup) -> RuleOutcome {
    let mut skipped = 0;

    for child in &group.rules {
        match (evaluate(data, root, child), group.requirement) {
            (RuleOutcome::Failed, PassRequirement::All) => return RuleOutcome::Failed,
            (RuleOutcome::Passed, PassRequirement::Any) => return RuleOutcome::Passed,
            (RuleOutcome::Skipped, _) => skipped += 1,
            _ => {}
        }
    }

    if skipped == group.rules.len() {
        return RuleOutcome::Skipped;
    }

    match group.requirement {
        // No child failed, at least one passed.
        PassRequirement::All => RuleOutcome::Passed,
        // No child passed, at least one failed.
        PassRequirement::Any => RuleOutcome::Failed,
    }
}

// ── Asynchronous ────────────────────────────────────────────────────

pub(crate) fn evaluate_async<'a>(
    data: &'a Value,
    root: &'a Value,
    rule_set: &'a RuleSet,
) -> BoxFuture<'a, RuleOutcome> {
    match rule_set {
        RuleSet::Rule(rule) => evaluate_rule_async(data, root, rule).boxed(),
        RuleSet::Group(group) => evaluate_group_async(data, root, group).boxed(),
    }
}

async fn evaluate_rule_async(data: &Value, root: &Value, rule: &Rule) -> RuleOutcome {
    match rule.async_func() {
        Some(func) => RuleOutcome::from_bool(func(data.clone(), root.clone()).await),
        None => RuleOutcome::Skipped,
    }
}

async fn evaluate_group_async(data: &Value, root: &Value, group: &RuleGroup) -> RuleOutcome {
    let outcomes = join_all(
        group
            .rules
            .iter()
            .map(|child| evaluate_async(data, root, child)),
    )
    .await;

    reduce(&outcomes, group.requirement)
}

/// Combine settled child outcomes.
///
/// Unlike the synchronous scan, ALL counts a skipped child against the group.
fn reduce(outcomes: &[RuleOutcome], requirement: PassRequirement) -> RuleOutcome {
    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| **o == RuleOutcome::Passed).count();
    let skipped = outcomes.iter().filter(|o| **o == RuleOutcome::Skipped).count();

    if skipped == total {
        return RuleOutcome::Skipped;
    }

    let group_passed = match requirement {
        PassRequirement::Any => passed > 0,
        PassRequirement::All => passed == total,
    };
    RuleOutcome::from_bool(group_passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RuleOutcome::*;

    #[test]
    fn reduce_all() {
        assert_eq!(reduce(&[Passed, Passed], PassRequirement::All), Passed);
        assert_eq!(reduce(&[Passed, Failed], PassRequirement::All), Failed);
        assert_eq!(reduce(&[Passed, Skipped], PassRequirement::All), Failed);
        assert_eq!(reduce(&[Failed, Skipped], PassRequirement::All), Failed);
    }

    #[test]
    fn reduce_any() {
        assert_eq!(reduce(&[Failed, Passed], PassRequirement::Any), Passed);
        assert_eq!(reduce(&[Failed, Failed], PassRequirement::Any), Failed);
        assert_eq!(reduce(&[Skipped, Failed], PassRequirement::Any), Failed);
    }

    #[test]
    fn reduce_all_skipped_or_empty() {
        for requirement in [PassRequirement::All, PassRequirement::Any] {
            assert_eq!(reduce(&[Skipped, Skipped], requirement), Skipped);
            assert_eq!(reduce(&[], requirement), Skipped);
        }
    }
}
