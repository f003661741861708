//! Verdict Policy Explainer Binary
//!
//! Run with: `verdict-explain [OPTIONS] <POLICY>`

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use verdict_explain::{explain, CompiledPolicy, Policy, SAMPLE_POLICY};

#[derive(Parser)]
#[command(name = "verdict-explain")]
#[command(about = "Explain which clause and matcher handle each outcome of a policy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Policy file to explain
    #[arg(value_name = "POLICY")]
    policy: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a documented sample policy
    Sample,
    /// Validate a policy without explaining its outcomes
    Check {
        #[arg(value_name = "POLICY")]
        policy: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Some(Commands::Sample) => {
            print!("{SAMPLE_POLICY}");
            return Ok(());
        }
        Some(Commands::Check { policy }) => {
            let policy = load(policy)?;
            let compiled = CompiledPolicy::compile(&policy)
                .context("policy failed to build")?;
            info!(
                types = compiled.types().len(),
                listed = compiled.list().len(),
                "policy is valid"
            );
            return Ok(());
        }
        None => {}
    }

    let Some(path) = &cli.policy else {
        bail!("no policy file given (see `verdict-explain sample` for the format)");
    };
    let policy = load(path)?;
    if policy.outcomes.is_empty() {
        warn!("policy lists no [[outcomes]] to explain");
    }

    let report = explain(&policy).with_context(|| format!("failed to explain {}", path.display()))?;
    debug!(outcomes = report.outcomes.len(), "explained policy");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn load(path: &Path) -> Result<Policy> {
    Policy::load(path).with_context(|| format!("failed to load policy {}", path.display()))
}
