//! AAP: Authorization Graph & Consent Orchestration demo CLI
//!
//! Runs end-to-end scenarios against the in-memory graph store and an
//! in-process consent authority. Every step goes through the same bulk
//! endpoint pipeline a real deployment uses.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- delegation
//!   cargo run -p demo -- consent
//!   cargo run -p demo -- atomicity
//!   cargo run -p demo -- --config aap.toml run-all
//!   cargo run -p demo -- --config aap.toml introspect <token>

mod authority;
mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aap_consent::HttpConsentAuthority;
use aap_core::traits::ConsentAuthority;
use aap_endpoints::AapConfig;

use scenarios::DemoResult;

// ── CLI definition ────────────────────────────────────────────────────────────

/// AAP: authorization graph and consent orchestration demo.
#[derive(Parser)]
#[command(
    name = "aap-demo",
    about = "AAP authorization engine demo",
    long_about = "Runs AAP scenarios showing delegated grants, Judge verdicts,\n\
                  consent challenge orchestration, and all-or-nothing batches."
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: publish, delegate, grant, and judge.
    Delegation,
    /// Scenario 2: consent challenge from first prompt to auto-accept.
    Consent,
    /// Scenario 3: a failing item rolls back its whole batch.
    Atomicity,
    /// Introspect a token at the configured consent authority.
    Introspect {
        token: String,
        /// Scope the token must carry.
        #[arg(long, default_value = "")]
        scope: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match AapConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(2);
            }
        },
        None => AapConfig::default(),
    };

    // RUST_LOG wins over the configured filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .compact()
        .init();

    print_banner(&config);

    let result = match cli.command {
        Command::RunAll => run_all(&config),
        Command::Delegation => scenarios::delegation(&config),
        Command::Consent => scenarios::consent(&config),
        Command::Atomicity => scenarios::atomicity(&config),
        Command::Introspect { token, scope } => introspect(&config, &token, &scope),
    };

    match result {
        Ok(()) => {
            println!("Done: every scenario behaved as expected.");
        }
        Err(e) => {
            eprintln!("Scenario failed: {e}");
            std::process::exit(1);
        }
    }
}

fn run_all(config: &AapConfig) -> DemoResult<()> {
    scenarios::delegation(config)?;
    scenarios::consent(config)?;
    scenarios::atomicity(config)?;
    Ok(())
}

fn introspect(config: &AapConfig, token: &str, scope: &str) -> DemoResult<()> {
    let authority = HttpConsentAuthority::new(&config.authority)?;
    let result = authority.introspect(token, scope)?;
    println!("  authority: {}", config.authority.base_url);
    println!("  active:    {}", result.active);
    println!("  client:    {}", result.client_id.as_deref().unwrap_or("-"));
    println!("  subject:   {}", result.sub.as_deref().unwrap_or("-"));
    println!("  scope:     {}", result.scope.as_deref().unwrap_or("-"));
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner(config: &AapConfig) {
    println!();
    println!("AAP: Authorization Graph & Consent Orchestration");
    println!("=================================================");
    println!();
    println!("Pipeline per request:");
    println!("  [1] Bearer token introspected at the consent authority");
    println!("  [2] Body verified item by item against the endpoint schema");
    println!("  [3] One graph transaction opened for the whole batch");
    println!("  [4] Caller judged against aap:* scopes published by '{}'", config.aap_identity);
    println!("  [5] Items run in order; the first failure rolls back everything");
    println!();
}
