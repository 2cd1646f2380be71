//! Error types for the watcher

use thiserror::Error;

/// Failure reported by the audit engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// The engine rejected its configuration
    #[error("invalid audit configuration: {0}")]
    Config(String),

    /// The audit run itself failed
    #[error("audit engine failed: {0}")]
    Engine(String),
}

/// Failure resolving a unit's rendered DOM node
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The unit is not (or no longer) mounted
    #[error("unable to find node on an unmounted unit: {0}")]
    Unmounted(String),

    /// The host framework threw while resolving the node
    #[error("{0}")]
    Host(String),
}

/// Why a requested scan produced no report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The audit engine failed; nothing was reported
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// The pending scan was cancelled by teardown
    #[error("scan cancelled before it ran")]
    Cancelled,

    /// The runner went away before the scan completed
    #[error("audit runner shut down")]
    Abandoned,
}

/// Invalid engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric setting is outside its accepted range
    #[error("{field} out of range: {value} (expected {range})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        range: &'static str,
    },
}

/// Failure setting up or running the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Engine construction needs a tokio runtime
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
