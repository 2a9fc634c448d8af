use clap::{Parser, Subcommand};

/// Run simulated workloads through a bounded-concurrency dispatcher.
///
/// Units run at most `--limit` at a time; results are printed in the order
/// the units finished.
#[derive(Parser, Debug)]
#[command(name = "taskq", version, about = "Bounded-concurrency unit dispatcher")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/taskq/config.toml)
    #[arg(long, global = true, env = "TASKQ_CONFIG")]
    pub config: Option<String>,

    /// Concurrency limit override (takes precedence over TASKQ_LIMIT and the config file)
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Start the run first and feed units into it, completing only after the feed is closed
    #[arg(long, global = true)]
    pub until_closed: bool,

    /// Print run metrics as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Four-unit walkthrough: A (3000ms), B (sync), C (2000ms), D (1000ms)
    Demo,

    /// Run a plan of simulated units
    Plan {
        /// Plan file with `[[units]]` entries (default: units from the config file)
        #[arg(long)]
        file: Option<String>,
    },
}
