//! Dependency path extraction from test rule-sets.

use indexmap::IndexSet;

use crate::schema::{RuleSet, Test};

/// Collect declared dependency paths across `tests`, deduplicated in
/// first-occurrence order. Checks are walked before conditions.
pub(crate) fn dependency_properties(tests: &[Test]) -> Vec<String> {
    let mut paths = IndexSet::new();
    for test in tests {
        collect(&test.check, &mut paths);
        if let Some(condition) = &test.condition {
            collect(condition, &mut paths);
        }
    }
    paths.into_iter().collect()
}

fn collect(rule_set: &RuleSet, paths: &mut IndexSet<String>) {
    match rule_set {
        RuleSet::Rule(rule) => {
            paths.extend(rule.dependency_properties().iter().cloned());
        }
        RuleSet::Group(group) => {
            for child in &group.rules {
                collect(child, paths);
            }
        }
    }
}
