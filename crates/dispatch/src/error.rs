//! Dispatcher error types.

use thiserror::Error;

/// Boxed cause reported by a failing unit.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the dispatcher and its configuration layer.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unit '{label}' failed: {source}")]
    UnitExecution {
        label: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid usage: {0}")]
    InvalidUsage(#[from] UsageError),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("run ended without producing an outcome")]
    Aborted,
}

impl DispatchError {
    /// Label of the failing unit, if this is a unit failure.
    pub fn unit_label(&self) -> Option<&str> {
        match self {
            Self::UnitExecution { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }
}

/// Misuse of the dispatcher lifecycle. Reported at the call site and never
/// alters an in-progress run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("run() called while a run is already in progress")]
    AlreadyRunning,

    #[error("run() called on a dispatcher whose run has finished")]
    AlreadyFinished,

    #[error("run() must be polled inside a tokio runtime")]
    NoRuntime,

    #[error("unit '{label}' pushed after the run finished")]
    PushAfterFinish { label: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_failure_display_includes_label_and_cause() {
        let err = DispatchError::UnitExecution {
            label: "A".into(),
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "unit 'A' failed: boom");
        assert_eq!(err.unit_label(), Some("A"));
    }

    #[test]
    fn usage_error_converts() {
        let err: DispatchError = UsageError::AlreadyRunning.into();
        assert!(matches!(err, DispatchError::InvalidUsage(UsageError::AlreadyRunning)));
        assert_eq!(err.unit_label(), None);
    }
}
