mod cli;
mod config;
mod plan;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use taskq_dispatch::{CompletionMode, Dispatcher, DispatcherConfig};

use crate::cli::{CliArgs, Command};
use crate::config::CliConfig;
use crate::plan::{demo_plan, load_plan, UnitSpec};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    let dispatcher_config = config.resolve_dispatcher(&args)?;

    let plan = match &args.command {
        Command::Demo => demo_plan(),
        Command::Plan { file: Some(path) } => load_plan(path)?,
        Command::Plan { file: None } => config.units.clone(),
    };

    execute(dispatcher_config, plan, args.json).await
}

/// Run the plan through a fresh dispatcher and print the outcome.
async fn execute(config: DispatcherConfig, plan: Vec<UnitSpec>, json: bool) -> Result<()> {
    let terminal = Terminal::new();
    terminal.print_header(&config, plan.len())?;

    let units = plan.into_iter().map(UnitSpec::into_unit);
    let outcome = match config.completion {
        CompletionMode::Drain => {
            let dispatcher = Dispatcher::builder().config(&config).units(units).build()?;
            let outcome = dispatcher.run().await;
            (outcome, dispatcher.metrics())
        }
        CompletionMode::UntilClosed => {
            // Start empty and feed units into the live run.
            let dispatcher: Dispatcher<String> = Dispatcher::with_config(&config)?;
            let runner = dispatcher.clone();
            let run = tokio::spawn(async move { runner.run().await });
            for unit in units {
                dispatcher.push(unit)?;
                tokio::task::yield_now().await;
            }
            debug!("feed exhausted, closing dispatcher");
            dispatcher.close();
            let outcome = run.await.context("dispatcher run task panicked")?;
            (outcome, dispatcher.metrics())
        }
    };

    match outcome {
        (Ok(results), metrics) => {
            terminal.print_results(&results)?;
            terminal.print_metrics(&metrics, json)?;
            info!(results = results.len(), "run finished");
            Ok(())
        }
        (Err(err), metrics) => {
            terminal.print_error(&err)?;
            terminal.print_metrics(&metrics, json)?;
            Err(err).context("run failed")
        }
    }
}
