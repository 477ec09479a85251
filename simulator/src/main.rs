//! TRCalc Simulator
//!
//! Drives a calculator session from built-in or JSON scenarios, or from
//! commands typed on stdin.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use trcalc_calculator::{Calculator, CalculatorConfig, RateSource};
use trcalc_common::MemoryStore;
use trcalc_fx::FallbackRateProvider;

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::{Scenario, BUILT_IN};

/// TRCalc Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "trcalc-sim")]
#[command(about = "TRCalc scenario runner and interactive driver")]
struct Args {
    /// Built-in scenario name or path to a JSON scenario
    #[arg(short, long)]
    scenario: Option<String>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Directory for persisted state (overrides TRCALC_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep all state in memory
    #[arg(long, conflicts_with = "data_dir")]
    memory: bool,

    /// Use the built-in rate table instead of any configured upstream
    #[arg(long)]
    offline: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool, default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string()),
    );
    let fmt = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = CalculatorConfig::from_env();
    init_tracing(args.json_logs, &config.log_level);

    if args.list {
        for name in BUILT_IN {
            println!("{name}");
        }
        return Ok(());
    }

    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if args.memory {
        config.data_dir = None;
    }
    if args.offline {
        config.rate_source = RateSource::Fallback;
    }

    if let Some(name) = &args.scenario {
        let scenario = Scenario::load(name)?;
        // Scenarios assert against the built-in rates, so they always start
        // from an empty in-memory session.
        let calc = Calculator::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(FallbackRateProvider),
            config.rate_cache.clone(),
        );
        let controller = SimulationController::new(calc);
        let result = controller.run_scenario(&scenario).await;

        let metrics = controller.get_metrics();
        info!(
            steps = metrics.steps_executed,
            entries = metrics.entries_recorded,
            assertions_passed = metrics.assertions_passed,
            assertions_failed = metrics.assertions_failed,
            ignored_keystrokes = metrics.ignored_keystrokes,
            "Simulation complete"
        );
        if let Err(e) = &result {
            error!(error = %e, "Scenario failed");
        }
        return result;
    }

    let calc = Calculator::open(&config)?;
    info!(data_dir = ?config.data_dir, "Running in interactive mode");
    if let Some(handle) = calc.start() {
        // Let the start-up refresh land before the first prompt.
        if let Err(e) = handle.await {
            error!(error = %e, "Start-up refresh task failed");
        }
    }

    let controller = SimulationController::new(calc);
    controller.run_interactive().await?;

    let metrics = controller.get_metrics();
    info!(
        steps = metrics.steps_executed,
        entries = metrics.entries_recorded,
        failed_refreshes = metrics.failed_refreshes,
        "Session closed"
    );
    Ok(())
}
