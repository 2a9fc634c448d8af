use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use taskq_dispatch::{DispatchError, DispatchMetrics, DispatcherConfig};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const RESULT: Color = Color::Cyan;
    const SUCCESS: Color = Color::Green;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
}

/// Renders run summaries to stdout.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print the run banner.
    pub fn print_header(&self, config: &DispatcherConfig, units: usize) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("taskq"),
            ResetColor,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                " | limit: {} | completion: {} | units: {}\n",
                config.limit, config.completion, units
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print produced values in completion order.
    pub fn print_results(&self, results: &[String]) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::SUCCESS),
            Print(format!("completed: {} result(s)\n", results.len())),
            ResetColor,
        )?;
        for (i, value) in results.iter().enumerate() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print(format!("  {:>3}. ", i + 1)),
                SetForegroundColor(Colors::RESULT),
                Print(format!("{value}\n")),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the single error a failed run produced.
    pub fn print_error(&self, err: &DispatchError) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("failed: {err}\n")),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print run metrics, either as a short summary or as JSON.
    pub fn print_metrics(&self, metrics: &DispatchMetrics, json: bool) -> Result<()> {
        let mut stdout = io::stdout();
        if json {
            writeln!(stdout, "{}", serde_json::to_string_pretty(metrics)?)?;
            stdout.flush()?;
            return Ok(());
        }

        let elapsed = metrics
            .elapsed()
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "started: {} | succeeded: {} | failed: {} | discarded: {} | dropped: {} | peak active: {} | elapsed: {}\n",
                metrics.units_started,
                metrics.units_succeeded,
                metrics.units_failed,
                metrics.units_discarded,
                metrics.units_dropped,
                metrics.peak_active,
                elapsed,
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}
