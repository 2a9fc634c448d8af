//! Simulated workloads: each planned unit sleeps for its delay and then
//! succeeds or fails.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use taskq_dispatch::Unit;

/// One simulated unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub label: String,

    /// Simulated work time. Zero with `fail = false` runs synchronously.
    #[serde(default)]
    pub delay_ms: u64,

    /// Fail after the delay instead of producing a value.
    #[serde(default)]
    pub fail: bool,

    /// Value to produce (default: "<label> done").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    units: Vec<UnitSpec>,
}

impl UnitSpec {
    pub fn new(label: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            label: label.into(),
            delay_ms,
            fail: false,
            value: None,
        }
    }

    pub fn is_sync(&self) -> bool {
        self.delay_ms == 0 && !self.fail
    }

    /// Build the dispatcher unit that simulates this spec.
    pub fn into_unit(self) -> Unit<String> {
        let label = self.label.clone();
        if self.is_sync() {
            return Unit::immediate(move || {
                info!(unit = %self.label, "started (sync)");
                info!(unit = %self.label, "done");
                Ok::<_, anyhow::Error>(self.output())
            })
            .with_label(label);
        }

        Unit::deferred(move || async move {
            info!(unit = %self.label, delay_ms = self.delay_ms, "started");
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.fail {
                return Err(anyhow!("simulated failure after {}ms", self.delay_ms));
            }
            info!(unit = %self.label, "done");
            Ok(self.output())
        })
        .with_label(label)
    }

    fn output(&self) -> String {
        self.value
            .clone()
            .unwrap_or_else(|| format!("{} done", self.label))
    }
}

/// The four-unit walkthrough: A, B, C and D submitted in that order.
pub fn demo_plan() -> Vec<UnitSpec> {
    vec![
        UnitSpec::new("A", 3000),
        UnitSpec::new("B", 0),
        UnitSpec::new("C", 2000),
        UnitSpec::new("D", 1000),
    ]
}

/// Load `[[units]]` from a standalone plan file.
pub fn load_plan(path: impl AsRef<Path>) -> Result<Vec<UnitSpec>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan: {}", path.display()))?;
    parse_plan(&content).with_context(|| format!("failed to parse plan: {}", path.display()))
}

pub fn parse_plan(content: &str) -> Result<Vec<UnitSpec>> {
    let plan: PlanFile = toml::from_str(content)?;
    Ok(plan.units)
}

#[cfg(test)]
mod tests {
    use taskq_dispatch::Dispatcher;

    use super::*;

    #[test]
    fn parse_plan_defaults() {
        let units = parse_plan(
            r#"
[[units]]
label = "a"

[[units]]
label = "b"
delay_ms = 20
fail = true
value = "ignored"
"#,
        )
        .unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].is_sync());
        assert!(!units[1].is_sync());
        assert_eq!(units[1].value.as_deref(), Some("ignored"));
    }

    #[test]
    fn empty_plan_is_valid() {
        assert!(parse_plan("").unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn demo_plan_finishes_in_duration_order() {
        let dispatcher =
            Dispatcher::new(4, demo_plan().into_iter().map(UnitSpec::into_unit)).unwrap();
        let results = dispatcher.run().await.unwrap();
        assert_eq!(results, vec!["B done", "D done", "C done", "A done"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_spec_reports_simulated_failure() {
        let mut spec = UnitSpec::new("flaky", 10);
        spec.fail = true;
        let dispatcher = Dispatcher::new(
            2,
            vec![spec.into_unit(), UnitSpec::new("slow", 100).into_unit()],
        )
        .unwrap();
        let err = dispatcher.run().await.unwrap_err();
        assert_eq!(err.unit_label(), Some("flaky"));
        assert!(err.to_string().contains("simulated failure after 10ms"));
    }

    #[tokio::test]
    async fn custom_value_is_produced() {
        let mut spec = UnitSpec::new("x", 0);
        spec.value = Some("42".into());
        let dispatcher = Dispatcher::new(1, vec![spec.into_unit()]).unwrap();
        assert_eq!(dispatcher.run().await.unwrap(), vec!["42"]);
    }
}
