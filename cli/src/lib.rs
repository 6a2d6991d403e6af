//! modelgate command line
//!
//! A thin collaborator over the inference gateway: loads configuration, calls
//! `invoke`, and renders the result for humans or automation.
//!
//! ## Commands
//!
//! - `modelgate invoke` - Call a model with retries and backoff
//! - `modelgate policies` - Show the effective retry policy table
//! - `modelgate wait` - Show the expected cold-start window for a model
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: Invocation failed (fatal error, timeout, retries exhausted, cancelled)
//! - 2: Configuration or usage error

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use modelgate_gateway::{ConfigLoader, ExpectedWaitWindow, GatewayConfig, ModelCategory};
use serde::Serialize;

pub mod invoke_cmd;

pub use invoke_cmd::InvokeArgs;

/// Exit codes for modelgate commands
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const INVOCATION_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

/// Resilient client for slow, cold-starting inference endpoints
#[derive(Debug, Parser)]
#[command(name = "modelgate", version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub async fn run(self) -> i32 {
        match self.command {
            Command::Invoke(args) => invoke_cmd::run_invoke(args).await,
            Command::Policies(args) => run_policies(args),
            Command::Wait(args) => run_wait(args),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Invoke a model, retrying cold starts and transient failures
    Invoke(InvokeArgs),

    /// Show the retry policy table (builtin rows plus configured overrides)
    Policies(PoliciesArgs),

    /// Show how long a model usually takes to come out of a cold start
    Wait(WaitArgs),
}

#[derive(Debug, Parser)]
pub struct PoliciesArgs {
    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,

    /// Config file (default: ./modelgate.toml, then user config locations)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct WaitArgs {
    /// Model key, e.g. facebook/musicgen-small
    #[arg(long, value_name = "KEY")]
    pub model: String,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

/// Load config from an explicit path or the default locations
pub(crate) fn load_config(path: Option<&PathBuf>) -> Result<GatewayConfig, String> {
    let loaded = match path {
        Some(path) => ConfigLoader::new().with_file(path).load(),
        None => ConfigLoader::load_default(),
    };
    loaded.map_err(|e| e.to_string())
}

#[derive(Debug, Serialize)]
struct PolicyRow {
    category: String,
    max_retries: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    total_timeout_ms: u64,
}

fn run_policies(args: PoliciesArgs) -> i32 {
    let table = match load_config(args.config.as_ref())
        .and_then(|config| config.policy_table().map_err(|e| e.to_string()))
    {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return exit_codes::CONFIG_ERROR;
        }
    };

    let rows: Vec<PolicyRow> = table
        .rows()
        .into_iter()
        .map(|(category, policy)| PolicyRow {
            category: match category {
                ModelCategory::Unknown => "default".to_string(),
                other => other.to_string(),
            },
            max_retries: policy.max_retries,
            initial_delay_ms: policy.initial_delay_ms,
            max_delay_ms: policy.max_delay_ms,
            total_timeout_ms: policy.total_timeout_ms,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
    } else {
        println!(
            "{:<12} {:>11} {:>12} {:>10} {:>14}",
            "category", "max_retries", "initial_ms", "max_ms", "total_ms"
        );
        for row in &rows {
            println!(
                "{:<12} {:>11} {:>12} {:>10} {:>14}",
                row.category,
                row.max_retries,
                row.initial_delay_ms,
                row.max_delay_ms,
                row.total_timeout_ms
            );
        }
    }
    exit_codes::SUCCESS
}

#[derive(Debug, Serialize)]
struct WaitReport {
    model: String,
    known: bool,
    min_seconds: u64,
    max_seconds: u64,
    message: String,
}

fn run_wait(args: WaitArgs) -> i32 {
    if args.model.trim().is_empty() {
        eprintln!("--model must not be empty");
        return exit_codes::CONFIG_ERROR;
    }

    let window = ExpectedWaitWindow::for_model(&args.model);
    let report = WaitReport {
        known: ExpectedWaitWindow::is_known(&args.model),
        model: args.model,
        min_seconds: window.min_seconds,
        max_seconds: window.max_seconds,
        message: window.message(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else if report.known {
        println!("{}: {}", report.model, report.message);
    } else {
        println!("{}: {} (default estimate)", report.model, report.message);
    }
    exit_codes::SUCCESS
}
