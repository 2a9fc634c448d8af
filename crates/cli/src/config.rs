use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use taskq_dispatch::{CompletionMode, DispatcherConfig};

use crate::cli::CliArgs;
use crate::plan::UnitSpec;

/// CLI configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default plan used by `taskq plan` when no `--file` is given.
    #[serde(default)]
    pub units: Vec<UnitSpec>,

    /// Dispatcher settings (limit, completion policy).
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/taskq/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("taskq");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config if the file does not exist. Environment
    /// overrides are applied either way.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        let mut config = if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            Self::default()
        };

        config.dispatcher.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the dispatcher config for this invocation.
    /// Priority: CLI flags > environment > config file > defaults.
    pub fn resolve_dispatcher(&self, args: &CliArgs) -> Result<DispatcherConfig> {
        let mut dispatcher = self.dispatcher.clone();
        if let Some(limit) = args.limit {
            dispatcher.limit = limit;
        }
        if args.until_closed {
            dispatcher.completion = CompletionMode::UntilClosed;
        }
        dispatcher
            .validate()
            .context("invalid dispatcher configuration")?;
        Ok(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.dispatcher.limit, 4);
        assert!(config.units.is_empty());
    }

    #[test]
    fn test_parse_dispatcher_and_units() {
        let config = CliConfig::from_toml(
            r#"
[dispatcher]
limit = 2
completion = "until_closed"

[[units]]
label = "fetch"
delay_ms = 300

[[units]]
label = "parse"
fail = true
"#,
        )
        .unwrap();
        assert_eq!(config.dispatcher.limit, 2);
        assert_eq!(config.dispatcher.completion, CompletionMode::UntilClosed);
        assert_eq!(config.units.len(), 2);
        assert_eq!(config.units[0].delay_ms, 300);
        assert!(config.units[1].fail);
    }

    #[test]
    fn test_flags_override_file() {
        let config = CliConfig::from_toml("[dispatcher]\nlimit = 2\n").unwrap();
        let args = CliArgs::parse_from(["taskq", "--limit", "6", "--until-closed", "demo"]);
        let resolved = config.resolve_dispatcher(&args).unwrap();
        assert_eq!(resolved.limit, 6);
        assert_eq!(resolved.completion, CompletionMode::UntilClosed);
    }

    #[test]
    fn test_zero_limit_flag_rejected() {
        let config = CliConfig::default();
        let args = CliArgs::parse_from(["taskq", "--limit", "0", "demo"]);
        assert!(config.resolve_dispatcher(&args).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CliConfig::load(Some("/nonexistent/taskq/config.toml")).unwrap();
        assert!(config.units.is_empty());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CliConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = CliConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.dispatcher, config.dispatcher);
    }
}
