//! Engine configuration

use crate::audit::{AuditConfig, ElementContext};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration threaded through the engine at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window for per-unit scan triggers (milliseconds)
    pub debounce_ms: u64,

    /// Longest wait for idle time before a scan runs anyway (milliseconds)
    ///
    /// Falls back to `debounce_ms` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,

    /// Pin every scan to this context instead of resolving an ancestor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ElementContext>,

    /// Forwarded to the audit engine before the first audit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            idle_timeout_ms: None,
            context: None,
            audit: None,
        }
    }
}

impl EngineConfig {
    /// Config with the given debounce window and defaults elsewhere
    pub fn with_debounce_ms(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            ..Self::default()
        }
    }

    /// Debounce window
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Idle wait timeout
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms.unwrap_or(self.debounce_ms).max(1))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms > 60_000 {
            return Err(ConfigError::OutOfRange {
                field: "debounce_ms",
                value: self.debounce_ms,
                range: "0-60000",
            });
        }
        if let Some(timeout) = self.idle_timeout_ms {
            if !(1..=600_000).contains(&timeout) {
                return Err(ConfigError::OutOfRange {
                    field: "idle_timeout_ms",
                    value: timeout,
                    range: "1-600000",
                });
            }
        }
        Ok(())
    }
}
