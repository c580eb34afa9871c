// SafeHarbor - Deterministic crisis-risk assessment engine
// Main entry point

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use safeharbor::catalog::PatternCatalog;
use safeharbor::config::{load_config, Config};
use safeharbor::engine::{SafetyEngine, TurnOutcome};
use safeharbor::errors::catalog_load_error;
use safeharbor::escalation::EscalationPolicy;
use safeharbor::responder::TemplateResponder;
use safeharbor::server::SafetyServer;
use safeharbor::session::SessionStore;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "safeharbor")]
#[command(about = "Deterministic crisis-risk assessment engine", version)]
struct Args {
    /// Run mode
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: ~/.safeharbor/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print assessments as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run HTTP daemon server
    Daemon {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Assess a single message
    Assess {
        /// Message text
        message: String,
        /// Session identifier, for multi-turn context within this process
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// Validate a pattern catalog and print its statistics
    CheckCatalog {
        /// Catalog file (default: configured or built-in catalog)
        path: Option<PathBuf>,
    },
    /// Print the built-in catalog as JSON
    ExportCatalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Some(Command::Daemon { bind }) => run_daemon(config, bind).await,
        Some(Command::Assess { message, session }) => {
            let engine = build_engine(&config)?;
            let outcome = engine.process(&session, &message);
            print_outcome(&outcome, args.json)
        }
        Some(Command::CheckCatalog { path }) => run_check_catalog(&config, path.as_deref()),
        Some(Command::ExportCatalog) => {
            let catalog = PatternCatalog::builtin()
                .map_err(|e| anyhow::anyhow!(catalog_load_error(None, &e)))?;
            println!("{}", serde_json::to_string_pretty(catalog.spec())?);
            Ok(())
        }
        None if !io::stdin().is_terminal() => run_piped(&config, args.json),
        None => {
            Args::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for assessments
fn init_tracing() {
    // Default: INFO level, can be overridden with RUST_LOG env var
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Bridge log crate → tracing (for dependencies using log crate)
    tracing_log::LogTracer::init().ok();
}

fn build_engine(config: &Config) -> Result<SafetyEngine> {
    let catalog = Arc::new(config.load_catalog()?);
    let store = Arc::new(SessionStore::new(config.session.clone()));

    Ok(SafetyEngine::new(
        catalog,
        config.engine.clone(),
        EscalationPolicy::new(config.safety.clone()),
        store,
    ))
}

/// Run HTTP daemon server
async fn run_daemon(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_address = bind;
        config.validate()?;
    }

    let engine = Arc::new(build_engine(&config)?);
    let server = SafetyServer::new(engine, Arc::new(TemplateResponder::new()), config.server)?;
    server.serve().await
}

/// Assess each stdin line as one turn of a single session
fn run_piped(config: &Config, json: bool) -> Result<()> {
    let engine = build_engine(config)?;

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let outcome = engine.process("stdin", &line);
        print_outcome(&outcome, json)?;
    }
    Ok(())
}

fn run_check_catalog(config: &Config, path: Option<&Path>) -> Result<()> {
    let catalog = match path {
        Some(path) => PatternCatalog::load_from_file(path).map_err(|e| {
            anyhow::anyhow!(catalog_load_error(Some(&path.display().to_string()), &e))
        })?,
        None => config.load_catalog()?,
    };

    let stats = catalog.stats();
    println!("\x1b[1;32m✓ Catalog is valid\x1b[0m");
    println!("Crisis rules:");
    for (category, count) in &stats.rules_per_category {
        println!("  {:<18} {}", category, count);
    }
    println!("Regex rules:       {}", stats.regex_rules);
    println!("Context modifiers: {}", stats.modifiers);
    println!("Mood keywords:");
    for (label, count) in &stats.keywords_per_mood {
        println!("  {:<18} {}", label, count);
    }
    println!("Intensifiers:      {}", stats.intensifiers);
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    let risk = &outcome.risk;
    let categories: Vec<&str> = risk.matched_categories().iter().map(|c| c.as_str()).collect();
    println!(
        "level={} score={:.3} trend={:?} mood={} ({:.2}) categories=[{}]{}",
        risk.level(),
        risk.score(),
        risk.trend(),
        outcome.mood.label,
        outcome.mood.confidence,
        categories.join(", "),
        if outcome.degraded { " DEGRADED" } else { "" }
    );

    let escalation = &outcome.escalation;
    if escalation.raise_crisis_flag {
        println!("\x1b[1;31m⚠ Crisis flag raised\x1b[0m ({})", escalation.response_mode.as_str());
    }
    for resource in &escalation.resources {
        println!("  • {}", resource.render());
    }
    Ok(())
}
