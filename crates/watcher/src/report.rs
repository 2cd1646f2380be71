//! Report sink collaborator
//!
//! New violations and instrumentation failures leave the engine through a
//! [`ReportSink`]. The console renderer lives in the CLI; this module
//! carries the trait plus sinks for tests and plain logging.

use crate::error::RenderError;
use crate::host::UnitId;
use dom::RuleResult;
use parking_lot::Mutex;
use tracing::{error, warn};

/// Identifies the unit an instrumentation failure is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    pub id: Option<UnitId>,
    pub name: String,
}

/// Receives everything the developer should see
pub trait ReportSink: Send + Sync {
    /// Violations that survived deduplication; never called with an empty slice
    fn report(&self, violations: &[RuleResult]);

    /// A unit's DOM node could not be resolved, so it was not checked
    fn instrumentation_error(&self, unit: &UnitInfo, error: &RenderError);
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<Vec<RuleResult>>>,
    errors: Mutex<Vec<(UnitInfo, RenderError)>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report, oldest first
    pub fn reports(&self) -> Vec<Vec<RuleResult>> {
        self.reports.lock().clone()
    }

    /// Every instrumentation error, oldest first
    pub fn errors(&self) -> Vec<(UnitInfo, RenderError)> {
        self.errors.lock().clone()
    }

    /// Total violated nodes across all reports
    pub fn reported_nodes(&self) -> usize {
        self.reports
            .lock()
            .iter()
            .flatten()
            .map(|rule| rule.nodes.len())
            .sum()
    }
}

impl ReportSink for MemorySink {
    fn report(&self, violations: &[RuleResult]) {
        self.reports.lock().push(violations.to_vec());
    }

    fn instrumentation_error(&self, unit: &UnitInfo, error: &RenderError) {
        self.errors.lock().push((unit.clone(), error.clone()));
    }
}

/// Sink that writes one log event per violated node
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, violations: &[RuleResult]) {
        for rule in violations {
            let impact = rule.impact.map(|i| i.as_str()).unwrap_or("minor");
            for node in &rule.nodes {
                warn!(
                    rule = %rule.id,
                    impact,
                    target = %node.selector(),
                    help = %rule.help,
                    "accessibility violation"
                );
            }
        }
    }

    fn instrumentation_error(&self, unit: &UnitInfo, err: &RenderError) {
        error!(unit = %unit.name, unit_id = ?unit.id, error = %err, "could not check node");
    }
}
