//! `arbiter` CLI: validate and evaluate rule documents from the shell.

use anyhow::{bail, Context, Result};
use arbiter_dsl::{DiagnosticSeverity, Engine, EvalOptions, MemoryConstantStore};
use arbiter_store_client::{HttpConstantStore, ReqwestTransport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbiter", about = "Business-rule DSL engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a rule document, printing every diagnostic and
    /// the quality score.
    Validate {
        /// Path to the YAML rule document.
        file: PathBuf,
    },
    /// Evaluate a rule document against inputs.
    Eval {
        /// Path to the YAML rule document.
        file: PathBuf,
        /// Inputs as key=value pairs (values parse as JSON, falling back
        /// to plain strings).
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
        /// Inputs as one JSON object; merged under the key=value pairs.
        #[arg(long, value_name = "JSON")]
        input_json: Option<String>,
        /// Base URL of a constant store service.
        #[arg(long)]
        constant_store: Option<String>,
        /// Inline constant overrides as KEY=JSON pairs.
        #[arg(long = "constant", value_name = "KEY=VALUE")]
        constants: Vec<String>,
        /// Allow the rule's rest_* built-ins to reach the network.
        #[arg(long)]
        allow_http: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    match Cli::parse().command {
        Command::Validate { file } => validate(file),
        Command::Eval {
            file,
            inputs,
            input_json,
            constant_store,
            constants,
            allow_http,
        } => eval(file, inputs, input_json, constant_store, constants, allow_http).await,
    }
}

fn validate(file: PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;

    let engine = Engine::new();
    let compiled = engine.compile(&source);

    for diagnostic in &compiled.diagnostics {
        let severity = match diagnostic.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        let location = diagnostic
            .location
            .map(|l| format!(" ({})", l))
            .unwrap_or_default();
        println!("{} [{}]{}: {}", severity, diagnostic.code, location, diagnostic.message);
        if let Some(hint) = &diagnostic.hint {
            println!("    hint: {}", hint);
        }
    }

    match &compiled.validation {
        Some(report) => {
            for issue in &report.issues {
                let location = issue
                    .location
                    .map(|l| format!(" ({})", l))
                    .unwrap_or_default();
                println!(
                    "{:?} [{}]{}: {}",
                    issue.severity, issue.code, location, issue.message
                );
                if let Some(suggestion) = &issue.suggestion {
                    println!("    suggestion: {}", suggestion);
                }
            }
            println!("quality score: {}/100", report.quality_score);
            if !report.valid {
                bail!("rule is not valid");
            }
        }
        None => bail!("rule failed to parse"),
    }
    Ok(())
}

async fn eval(
    file: PathBuf,
    inputs: Vec<String>,
    input_json: Option<String>,
    constant_store: Option<String>,
    constants: Vec<String>,
    allow_http: bool,
) -> Result<()> {
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;

    let mut input_map = serde_json::Map::new();
    if let Some(json) = input_json {
        match serde_json::from_str(&json).context("parsing --input-json")? {
            serde_json::Value::Object(map) => input_map.extend(map),
            _ => bail!("--input-json must be a JSON object"),
        }
    }
    for pair in inputs {
        let (key, value) = split_pair(&pair)?;
        input_map.insert(key.to_string(), parse_json_or_string(value));
    }

    let mut engine = Engine::new();
    if let Some(base_url) = constant_store {
        engine = engine.with_constant_store(Arc::new(
            HttpConstantStore::new(base_url).context("building constant store client")?,
        ));
    } else if !constants.is_empty() {
        let mut store = MemoryConstantStore::new();
        for pair in constants {
            let (key, value) = split_pair(&pair)?;
            store = store.with(key, parse_json_or_string(value));
        }
        engine = engine.with_constant_store(Arc::new(store));
    }
    if allow_http {
        engine = engine.with_transport(Arc::new(
            ReqwestTransport::new().map_err(|e| anyhow::anyhow!("building transport: {}", e))?,
        ));
    }

    let response = engine
        .evaluate(&source, input_map, &EvalOptions::default())
        .await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        bail!("evaluation failed");
    }
    Ok(())
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{}'", pair))
}

/// `720` and `true` parse as JSON; `STANDARD` falls back to a string.
fn parse_json_or_string(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
