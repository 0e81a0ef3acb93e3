use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key lookup used to build a config: the process environment, or a map
/// parsed from a dotenv file.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn lookup_opt(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|s| !s.is_empty())
}

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(lookup: Lookup<'_>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = lookup_opt(lookup, &prefixed) {
            return Some(v);
        }
    }
    lookup_opt(lookup, key)
}

fn profiled_u64(lookup: Lookup<'_>, profile: &str, key: &str, default: u64) -> u64 {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_usize(lookup: Lookup<'_>, profile: &str, key: &str, default: usize) -> usize {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_bool(lookup: Lookup<'_>, profile: &str, key: &str, default: bool) -> bool {
    match profiled_opt(lookup, profile, key)
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Change-policy defaults for properties that do not set their own.
    pub policy: PolicyDefaults,
    /// Capacity of each control's value-change broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            policy: PolicyDefaults::default(),
            channel_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FIELDRULES_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        Self::build(&env_lookup, profile)
    }

    /// Build config from a dotenv-formatted file without touching the
    /// process environment.
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, dotenvy::Error> {
        let vars = dotenvy::from_path_iter(path.as_ref())?.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self::from_lookup(&|key: &str| vars.get(key).cloned()))
    }

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let profile = lookup_opt(lookup, "FIELDRULES_PROFILE").unwrap_or_default();
        Self::build(lookup, &profile)
    }

    fn build(lookup: Lookup<'_>, profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let defaults = Self::default();
        Self {
            profile: p.to_string(),
            policy: PolicyDefaults::from_lookup(lookup, p),
            channel_capacity: profiled_usize(
                lookup,
                p,
                "FIELDRULES_CHANNEL_CAPACITY",
                defaults.channel_capacity,
            )
            .max(1),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Engine config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  debounce ms: dependency_valid={}, dependency_edit={}, self_edit={}, self_async_valid={}",
            self.policy.dependency_valid_debounce_ms,
            self.policy.dependency_edit_debounce_ms,
            self.policy.self_edit_debounce_ms,
            self.policy.self_async_valid_debounce_ms,
        );
        tracing::info!(
            "  distinct:    dependency={}, self_edit={}, self_async_valid={}",
            self.policy.dependency_distinct,
            self.policy.self_edit_distinct,
            self.policy.self_async_valid_distinct,
        );
        tracing::info!("  channels:    capacity={}", self.channel_capacity);
    }
}

// ── Change-policy defaults ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    pub dependency_valid_debounce_ms: u64,
    pub dependency_edit_debounce_ms: u64,
    pub self_edit_debounce_ms: u64,
    pub self_async_valid_debounce_ms: u64,
    /// Applies to both dependency categories.
    pub dependency_distinct: bool,
    pub self_edit_distinct: bool,
    pub self_async_valid_distinct: bool,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            dependency_valid_debounce_ms: 0,
            dependency_edit_debounce_ms: 0,
            self_edit_debounce_ms: 0,
            self_async_valid_debounce_ms: 0,
            dependency_distinct: false,
            self_edit_distinct: true,
            self_async_valid_distinct: true,
        }
    }
}

impl PolicyDefaults {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        let d = Self::default();
        Self {
            dependency_valid_debounce_ms: profiled_u64(
                lookup,
                p,
                "FIELDRULES_DEPENDENCY_VALID_DEBOUNCE_MS",
                d.dependency_valid_debounce_ms,
            ),
            dependency_edit_debounce_ms: profiled_u64(
                lookup,
                p,
                "FIELDRULES_DEPENDENCY_EDIT_DEBOUNCE_MS",
                d.dependency_edit_debounce_ms,
            ),
            self_edit_debounce_ms: profiled_u64(
                lookup,
                p,
                "FIELDRULES_SELF_EDIT_DEBOUNCE_MS",
                d.self_edit_debounce_ms,
            ),
            self_async_valid_debounce_ms: profiled_u64(
                lookup,
                p,
                "FIELDRULES_SELF_ASYNC_VALID_DEBOUNCE_MS",
                d.self_async_valid_debounce_ms,
            ),
            dependency_distinct: profiled_bool(
                lookup,
                p,
                "FIELDRULES_DEPENDENCY_DISTINCT",
                d.dependency_distinct,
            ),
            self_edit_distinct: profiled_bool(
                lookup,
                p,
                "FIELDRULES_SELF_EDIT_DISTINCT",
                d.self_edit_distinct,
            ),
            self_async_valid_distinct: profiled_bool(
                lookup,
                p,
                "FIELDRULES_SELF_ASYNC_VALID_DISTINCT",
                d.self_async_valid_distinct,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(&|key: &str| vars.get(key).cloned())
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        assert_eq!(config_from(&[]), EngineConfig::default());
        assert_eq!(config_from(&[]).profile_label(), "default");
    }

    #[test]
    fn reads_policy_keys() {
        let cfg = config_from(&[
            ("FIELDRULES_SELF_ASYNC_VALID_DEBOUNCE_MS", "250"),
            ("FIELDRULES_DEPENDENCY_DISTINCT", "yes"),
            ("FIELDRULES_SELF_EDIT_DISTINCT", "off"),
            ("FIELDRULES_CHANNEL_CAPACITY", "16"),
        ]);
        assert_eq!(cfg.policy.self_async_valid_debounce_ms, 250);
        assert!(cfg.policy.dependency_distinct);
        assert!(!cfg.policy.self_edit_distinct);
        assert_eq!(cfg.channel_capacity, 16);
    }

    #[test]
    fn profile_prefix_overrides_plain_key() {
        let cfg = config_from(&[
            ("FIELDRULES_PROFILE", "prod"),
            ("FIELDRULES_DEPENDENCY_VALID_DEBOUNCE_MS", "10"),
            ("PROD_FIELDRULES_DEPENDENCY_VALID_DEBOUNCE_MS", "300"),
            ("FIELDRULES_DEPENDENCY_EDIT_DEBOUNCE_MS", "20"),
        ]);
        assert_eq!(cfg.profile, "PROD");
        assert_eq!(cfg.policy.dependency_valid_debounce_ms, 300);
        // No prefixed variant: falls back to the plain key.
        assert_eq!(cfg.policy.dependency_edit_debounce_ms, 20);
    }

    #[test]
    fn unparsable_values_fall_back() {
        let cfg = config_from(&[
            ("FIELDRULES_SELF_EDIT_DEBOUNCE_MS", "soon"),
            ("FIELDRULES_SELF_ASYNC_VALID_DISTINCT", "maybe"),
            ("FIELDRULES_CHANNEL_CAPACITY", "0"),
        ]);
        assert_eq!(cfg.policy.self_edit_debounce_ms, 0);
        assert!(cfg.policy.self_async_valid_distinct);
        assert_eq!(cfg.channel_capacity, 1);
    }

    #[test]
    fn reads_dotenv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "FIELDRULES_DEPENDENCY_EDIT_DEBOUNCE_MS=75").unwrap();
        writeln!(file, "FIELDRULES_SELF_ASYNC_VALID_DISTINCT=false").unwrap();

        let cfg = EngineConfig::from_dotenv_file(file.path()).unwrap();
        assert_eq!(cfg.policy.dependency_edit_debounce_ms, 75);
        assert!(!cfg.policy.self_async_valid_distinct);
    }

    #[test]
    fn missing_dotenv_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfig::from_dotenv_file(dir.path().join("absent.env")).is_err());
    }

    #[test]
    fn serializes_for_diagnostics() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["channel_capacity"], 64);
        assert_eq!(json["policy"]["self_async_valid_distinct"], true);
        assert_eq!(json["policy"]["dependency_distinct"], false);
    }
}
