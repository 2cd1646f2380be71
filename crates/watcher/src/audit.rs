//! Audit engine collaborator
//!
//! The rule engine itself lives outside this crate. The runner only needs
//! to configure it once and ask it to audit a target.

use crate::error::AuditError;
use async_trait::async_trait;
use dom::{AuditResults, NodeId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Explicit scan context pinned at setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementContext {
    /// A specific node
    Node(NodeId),
    /// Elements matching a selector
    Selector(String),
    /// Include / exclude selector lists
    Selection {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

/// What one audit pass runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanTarget {
    /// The whole document
    Document,
    /// The subtree rooted at a node
    Node(NodeId),
    /// A context fixed by configuration
    Context(ElementContext),
}

/// Result format requested from the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterVersion {
    #[default]
    V2,
}

/// Options passed with every run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub reporter: ReporterVersion,
}

/// Enable / disable a single rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleToggle {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Global engine configuration, forwarded verbatim before any audit
///
/// Keys this crate does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleToggle>,

    #[serde(default, alias = "disable_other_rules")]
    pub disable_other_rules: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The accessibility rule engine
///
/// `configure` is called before the first audit. The runner never has two
/// `run` calls in flight at once.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    /// Apply global configuration
    fn configure(&self, config: &AuditConfig) -> Result<(), AuditError>;

    /// Audit `target` and return every violation found
    async fn run(&self, target: &ScanTarget, options: &RunOptions) -> Result<AuditResults, AuditError>;
}

/// Engine that replays queued outcomes
///
/// Each run pops the next queued outcome; once the queue is empty runs
/// return no violations. Targets, run options and configurations are
/// recorded.
#[derive(Debug, Default)]
pub struct ScriptedAuditEngine {
    queue: Mutex<VecDeque<Result<AuditResults, AuditError>>>,
    runs: Mutex<Vec<ScanTarget>>,
    options: Mutex<Vec<RunOptions>>,
    configs: Mutex<Vec<AuditConfig>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedAuditEngine {
    /// Create an engine with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every run by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue the results of a future run
    pub fn push_results(&self, results: AuditResults) {
        self.queue.lock().push_back(Ok(results));
    }

    /// Queue a failing run
    pub fn push_failure(&self, message: impl Into<String>) {
        self.queue
            .lock()
            .push_back(Err(AuditError::Engine(message.into())));
    }

    /// Targets audited so far, in call order
    pub fn runs(&self) -> Vec<ScanTarget> {
        self.runs.lock().clone()
    }

    /// Options passed with each run, in call order
    pub fn run_options(&self) -> Vec<RunOptions> {
        self.options.lock().clone()
    }

    /// Configurations received so far
    pub fn configurations(&self) -> Vec<AuditConfig> {
        self.configs.lock().clone()
    }

    /// Highest number of runs observed in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditEngine for ScriptedAuditEngine {
    fn configure(&self, config: &AuditConfig) -> Result<(), AuditError> {
        self.configs.lock().push(config.clone());
        Ok(())
    }

    async fn run(&self, target: &ScanTarget, options: &RunOptions) -> Result<AuditResults, AuditError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.runs.lock().push(target.clone());
        self.options.lock().push(options.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(AuditResults::default()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
