//! Session replay
//!
//! A session file describes a page, its components, what the audit engine
//! will answer, and a timeline of host events. Replaying it drives the full
//! engine against a `VirtualHost` in real time.
//!
//! ```json
//! {
//!   "generation": "fiber",
//!   "document": [{ "tag": "div", "id": "app" }],
//!   "units": ["App"],
//!   "audits": [{ "violations": [] }, { "error": "engine crashed" }],
//!   "timeline": [
//!     { "step": "mount", "unit": "App", "parent": "#app", "render": { "tag": "main" } },
//!     { "step": "wait", "ms": 1200 }
//!   ]
//! }
//! ```

use dom::{AuditResults, Document, DomError, ElementSpec, NodeId, SharedDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info};
use watcher::{
    Collaborators, Engine, EngineConfig, EngineError, IdleSignal, RenderGeneration, ReportSink,
    RunnerStats, ScanError, ScanReport, ScriptedAuditEngine, TokioIdleScheduler, Unit,
    VirtualHost,
};

/// Failure loading or replaying a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown unit '{0}' (declare it under \"units\")")]
    UnknownUnit(String),

    #[error("unit '{0}' is declared twice")]
    DuplicateUnit(String),

    #[error("no element matches selector '{0}'")]
    UnknownSelector(String),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "default_generation")]
    pub generation: RenderGeneration,

    /// Children of `body` before anything mounts
    #[serde(default)]
    pub document: Vec<ElementSpec>,

    /// Component names, in definition order
    #[serde(default)]
    pub units: Vec<String>,

    /// Audit engine answers, consumed one per audit
    #[serde(default)]
    pub audits: Vec<ScriptedAudit>,

    #[serde(default)]
    pub timeline: Vec<Step>,
}

fn default_generation() -> RenderGeneration {
    RenderGeneration::Fiber
}

/// One scripted audit engine answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedAudit {
    Failure { error: String },
    Results(AuditResults),
}

/// One host event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Render a unit under `parent` (default: body) and run its mount hook
    Mount {
        unit: String,
        #[serde(default)]
        parent: Option<String>,
        render: ElementSpec,
    },
    /// Re-render a unit, optionally setting attributes on its root
    Update {
        unit: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
    },
    /// Unmount a unit and remove its DOM
    Unmount { unit: String },
    /// Detach an element from the document without unmounting anything
    Detach { selector: String },
    /// Make the renderer fail for a unit from now on
    FailRender { unit: String, message: String },
    /// Announce idle time
    Idle,
    /// Let time pass
    Wait { ms: u64 },
    /// Request a scan of an element and wait for it
    Scan { selector: String },
}

impl Session {
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the initial page
    pub fn build_document(&self) -> Result<SharedDocument, SessionError> {
        Ok(Document::from_spec(&self.document)?.into_shared())
    }
}

/// What a replay produced
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    /// Outcomes of the initial scan and every explicit `scan` step
    pub scans: Vec<Result<ScanReport, ScanError>>,
    /// Runner counters after the timeline settled
    pub stats: RunnerStats,
    /// Distinct (selector, rule) pairs reported
    pub journal_size: usize,
    /// Components still tracked at the end
    pub tracked_units: usize,
    /// Audit engine answers left unused
    pub unused_audits: usize,
}

/// Replay `session` on `document`, reporting through `sink`
///
/// `document` is normally [`Session::build_document`]; sharing it lets the
/// sink resolve selectors. Must run inside a tokio runtime.
pub async fn replay(
    session: &Session,
    document: SharedDocument,
    config: EngineConfig,
    sink: Arc<dyn ReportSink>,
) -> Result<ReplaySummary, SessionError> {
    let host = Arc::new(VirtualHost::new(session.generation, Arc::clone(&document)));

    let mut units: BTreeMap<&str, Arc<Unit>> = BTreeMap::new();
    for name in &session.units {
        if units.insert(name.as_str(), host.define_unit(name.as_str())).is_some() {
            return Err(SessionError::DuplicateUnit(name.clone()));
        }
    }
    let unit = |name: &str| {
        units
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownUnit(name.to_string()))
    };

    let audit = Arc::new(ScriptedAuditEngine::new());
    for answer in &session.audits {
        match answer {
            ScriptedAudit::Results(results) => audit.push_results(results.clone()),
            ScriptedAudit::Failure { error } => audit.push_failure(error.clone()),
        }
    }

    let signal = IdleSignal::new();
    let poll = config.idle_timeout().min(Duration::from_millis(10));
    let engine = Engine::new(
        config,
        Collaborators {
            ui: host.clone(),
            renderer: host.clone(),
            audit: audit.clone(),
            scheduler: Arc::new(TokioIdleScheduler::new(Handle::current(), signal.clone())),
            sink,
            document: Arc::clone(&document),
            seen: None,
        },
    )?;

    let mut summary = ReplaySummary::default();
    info!(steps = session.timeline.len(), units = units.len(), "replaying session");
    summary.scans.push(engine.start()?.wait().await);

    let select = |selector: &str| {
        document
            .read()
            .query_selector(selector)
            .ok_or_else(|| SessionError::UnknownSelector(selector.to_string()))
    };

    for (index, step) in session.timeline.iter().enumerate() {
        debug!(index, ?step, "replay step");
        match step {
            Step::Mount { unit: name, parent, render } => {
                let parent: NodeId = match parent {
                    Some(selector) => select(selector)?,
                    None => document.read().body().unwrap_or(NodeId::DOCUMENT),
                };
                host.mount(&unit(name)?, parent, render)?;
            }
            Step::Update { unit: name, attrs } => {
                host.update_with(&unit(name)?, |doc, root| {
                    for (key, value) in attrs {
                        doc.set_attribute(root, key, value)?;
                    }
                    Ok(())
                })?;
            }
            Step::Unmount { unit: name } => host.unmount(&unit(name)?)?,
            Step::Detach { selector } => {
                let node = select(selector)?;
                document.write().detach(node)?;
            }
            Step::FailRender { unit: name, message } => {
                host.fail_render(&*unit(name)?, message.clone());
            }
            Step::Idle => signal.notify_idle(),
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Scan { selector } => {
                let node = select(selector)?;
                summary.scans.push(engine.request_scan(node).wait().await);
            }
        }
    }

    // Let scheduled scans fire and running audits finish
    loop {
        let stats = engine.runner().stats();
        if engine.runner().phase() == watcher::Phase::Idle && stats.running == 0 {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    summary.stats = engine.runner().stats();
    summary.journal_size = engine.seen().len();
    summary.tracked_units = engine.registry().len();
    summary.unused_audits = session
        .audits
        .len()
        .saturating_sub(audit.runs().len());
    engine.stop();
    Ok(summary)
}
