use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

// ── Config ──────────────────────────────────────────────────────────

/// Dispatcher configuration.
///
/// Parsed from TOML with support for environment variable overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum number of units allowed to run at the same time.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// When a run is allowed to reach its completed state.
    #[serde(default)]
    pub completion: CompletionMode,
}

fn default_limit() -> usize {
    4
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            completion: CompletionMode::default(),
        }
    }
}

/// Policy deciding when an idle, empty dispatcher finishes its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Finish as soon as nothing is active and nothing is queued. A run
    /// started with an empty backlog finishes immediately with no results.
    #[default]
    Drain,
    /// Additionally wait until [`close`](crate::Dispatcher::close) has been
    /// called, so a run can start empty and be fed by later pushes.
    UntilClosed,
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drain => f.write_str("drain"),
            Self::UntilClosed => f.write_str("until_closed"),
        }
    }
}

impl FromStr for CompletionMode {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drain" => Ok(Self::Drain),
            "until_closed" | "until-closed" => Ok(Self::UntilClosed),
            other => Err(DispatchError::Config(format!(
                "invalid completion mode '{other}', expected 'drain' or 'until_closed'"
            ))),
        }
    }
}

// ── Loading & Validation ────────────────────────────────────────────

impl DispatcherConfig {
    /// Config with the given limit and default completion mode.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, DispatchError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Apply environment variable overrides.
    ///
    /// - `TASKQ_LIMIT` -> `limit`
    /// - `TASKQ_COMPLETION` -> `completion`
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(limit) = lookup("TASKQ_LIMIT").and_then(|v| v.trim().parse().ok()) {
            self.limit = limit;
        }
        if let Some(mode) = lookup("TASKQ_COMPLETION").and_then(|v| v.parse().ok()) {
            self.completion = mode;
        }
    }

    /// Validate the config.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.limit == 0 {
            return Err(DispatchError::Config(
                "concurrency limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
