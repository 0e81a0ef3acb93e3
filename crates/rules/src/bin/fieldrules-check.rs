//! fieldrules-check : validate a person document against the demo model.
//!
//! Builds a control tree from a JSON document, attaches the recomputation
//! scheduler, applies `--set` edits, waits for pipelines to settle and prints
//! every control's state as JSON.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use tracing::info;

use fieldrules::schema::{Rule, Test};
use fieldrules::{FormTree, ModelSettings, ModelSettingsRegistry, PropertyBuilder, RecomputeScheduler};
use fieldrules_core::{init_tracing, load_dotenv, EngineConfig};

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fieldrules-check", version, about)]
struct Cli {
    /// JSON document to check. Reads stdin when omitted.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Edit applied after attach, as `PATH=JSON` (repeatable).
    #[arg(long = "set", value_name = "PATH=JSON")]
    edits: Vec<String>,

    /// Read engine settings from this .env file instead of the environment.
    #[arg(long, env = "FIELDRULES_ENV_FILE")]
    env_file: Option<PathBuf>,
}

// ── Demo model ──────────────────────────────────────────────────────

fn required() -> Test {
    Test::new(Rule::new(|value, _| value.as_str().is_some_and(|s| !s.trim().is_empty())))
        .named("required")
        .with_message("Required")
}

fn person() -> fieldrules::Result<ModelSettings> {
    ModelSettings::new(
        "person",
        vec![
            PropertyBuilder::new("name")?.valid(required()).build(),
            PropertyBuilder::new("age")?
                .valid(
                    Test::new(Rule::new(|value, _| value.as_u64().is_some_and(|age| age >= 18)))
                        .named("adult")
                        .with_message("Must be 18 or older"),
                )
                .build(),
            PropertyBuilder::new("car")?
                .properties(vec![
                    PropertyBuilder::new("make")?.build(),
                    PropertyBuilder::new("model")?
                        .edit(Test::new(
                            Rule::new(|_, root| root["car"]["make"].as_str().is_some_and(|m| !m.is_empty()))
                                .depends_on(["make"]),
                        ))
                        .valid(
                            Test::new(
                                Rule::new(|_, root| root["age"].as_u64().is_some_and(|age| age >= 21))
                                    .depends_on(["../age"]),
                            )
                            .when(Rule::new(|value, _| !value.is_null()))
                            .with_message("Drivers must be 21 or older"),
                        )
                        .build(),
                ])
                .build(),
            PropertyBuilder::new("nicknames")?
                .array_item_property(PropertyBuilder::array_item().valid(required()))
                .build(),
        ],
    )
}

fn parse_edit(edit: &str) -> anyhow::Result<(&str, Value)> {
    let (path, raw) = edit
        .split_once('=')
        .with_context(|| format!("edit '{edit}' is not PATH=JSON"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((path, value))
}

fn settle_time(config: &EngineConfig) -> Duration {
    let p = &config.policy;
    let longest = [
        p.dependency_valid_debounce_ms,
        p.dependency_edit_debounce_ms,
        p.self_edit_debounce_ms,
        p.self_async_valid_debounce_ms,
    ]
    .into_iter()
    .max()
    .unwrap_or(0);
    Duration::from_millis(longest + 50)
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");
    let cli = Cli::parse();

    let config = match &cli.env_file {
        Some(path) => EngineConfig::from_dotenv_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            load_dotenv();
            EngineConfig::from_env()
        }
    };
    config.log_summary();

    let raw = match &cli.data {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };
    let data: Value = serde_json::from_str(&raw).context("document is not valid JSON")?;

    let registry = ModelSettingsRegistry::with_config(&config);
    registry.register(person()?)?;
    let tree = FormTree::build_with_config(registry.require("person")?, &data, &config);
    let _scheduler = RecomputeScheduler::attach(tree.clone());

    for edit in &cli.edits {
        let (path, value) = parse_edit(edit)?;
        let id = tree
            .get(path)
            .with_context(|| format!("no control at '{path}'"))?;
        tree.set_value(id, value)?;
    }
    tokio::time::sleep(settle_time(&config)).await;

    let mut report = serde_json::Map::new();
    let mut invalid = 0usize;
    for id in tree.controls() {
        let (Some(path), Some(state)) = (tree.path(id), tree.state(id)) else { continue };
        if path.is_empty() {
            continue;
        }
        if !state.is_valid() {
            invalid += 1;
        }
        let messages = state.messages();
        report.insert(path, json!({ "state": state, "messages": messages }));
    }

    info!(controls = report.len(), invalid, "check complete");
    println!("{}", serde_json::to_string_pretty(&Value::Object(report))?);
    Ok(())
}
