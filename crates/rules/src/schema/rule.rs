//! Rule, rule group and rule-set types.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synchronous rule function: `(value, root_value) -> passed`.
pub type SyncRuleFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Asynchronous rule function: `(value, root_value) -> future<passed>`.
///
/// Values are passed owned so the returned future can be `'static`.
pub type AsyncRuleFn = Arc<dyn Fn(Value, Value) -> BoxFuture<'static, bool> + Send + Sync>;

/// Tri-state outcome of evaluating a rule-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    Passed,
    Failed,
    /// Not evaluated. Never counts as a failure.
    Skipped,
}

impl RuleOutcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            RuleOutcome::Passed
        } else {
            RuleOutcome::Failed
        }
    }
}

/// Which rule functions an evaluation may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    Sync,
    Async,
}

/// How many children of a [`RuleGroup`] must pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassRequirement {
    /// Every child must pass.
    #[default]
    All,
    /// At least one child must pass.
    Any,
}

// ── Rule ────────────────────────────────────────────────────────────

/// Leaf evaluation unit.
///
/// Constructors guarantee at least one of the two functions is present.
/// A rule invoked in a mode it has no function for evaluates to
/// [`RuleOutcome::Skipped`].
#[derive(Clone)]
pub struct Rule {
    func: Option<SyncRuleFn>,
    async_func: Option<AsyncRuleFn>,
    dependency_properties: Vec<String>,
}

impl Rule {
    /// Rule with a synchronous function only.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            func: Some(Arc::new(func)),
            async_func: None,
            dependency_properties: Vec::new(),
        }
    }

    /// Rule with an asynchronous function only.
    pub fn new_async<F, Fut>(func: F) -> Self
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            func: None,
            async_func: Some(wrap_async(func)),
            dependency_properties: Vec::new(),
        }
    }

    /// Rule usable in both modes.
    pub fn with_both<F, A, Fut>(func: F, async_func: A) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
        A: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            func: Some(Arc::new(func)),
            async_func: Some(wrap_async(async_func)),
            dependency_properties: Vec::new(),
        }
    }

    /// Declare dependency paths whose changes re-trigger this rule's tests.
    pub fn depends_on<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_properties
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn func(&self) -> Option<&SyncRuleFn> {
        self.func.as_ref()
    }

    pub fn async_func(&self) -> Option<&AsyncRuleFn> {
        self.async_func.as_ref()
    }

    pub fn dependency_properties(&self) -> &[String] {
        &self.dependency_properties
    }
}

fn wrap_async<F, Fut>(func: F) -> AsyncRuleFn
where
    F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |value, root| func(value, root).boxed())
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("sync", &self.func.is_some())
            .field("async", &self.async_func.is_some())
            .field("dependency_properties", &self.dependency_properties)
            .finish()
    }
}

// ── RuleGroup / RuleSet ─────────────────────────────────────────────

/// Composite of rule-sets evaluated left-to-right.
#[derive(Debug, Clone, Default)]
pub struct RuleGroup {
    pub rules: Vec<RuleSet>,
    pub requirement: PassRequirement,
}

/// A single rule or a group of rule-sets.
#[derive(Debug, Clone)]
pub enum RuleSet {
    Rule(Rule),
    Group(RuleGroup),
}

impl RuleSet {
    /// Group where every child must pass.
    pub fn all(rules: impl IntoIterator<Item = RuleSet>) -> Self {
        RuleSet::Group(RuleGroup {
            rules: rules.into_iter().collect(),
            requirement: PassRequirement::All,
        })
    }

    /// Group where at least one child must pass.
    pub fn any(rules: impl IntoIterator<Item = RuleSet>) -> Self {
        RuleSet::Group(RuleGroup {
            rules: rules.into_iter().collect(),
            requirement: PassRequirement::Any,
        })
    }

    /// Whether any rule in this set carries an asynchronous function.
    pub fn has_async_rules(&self) -> bool {
        match self {
            RuleSet::Rule(rule) => rule.async_func.is_some(),
            RuleSet::Group(group) => group.rules.iter().any(RuleSet::has_async_rules),
        }
    }
}

impl From<Rule> for RuleSet {
    fn from(rule: Rule) -> Self {
        RuleSet::Rule(rule)
    }
}

impl From<RuleGroup> for RuleSet {
    fn from(group: RuleGroup) -> Self {
        RuleSet::Group(group)
    }
}
