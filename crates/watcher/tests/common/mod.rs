//! Shared fixture for engine integration tests

use dom::{AuditResults, Document, ElementSpec, Impact, NodeId, NodeResult, RuleResult};
use std::sync::Arc;
use tokio::runtime::Handle;
use watcher::{
    Collaborators, Engine, EngineConfig, IdleSignal, MemorySink, RenderGeneration,
    ScriptedAuditEngine, TokioIdleScheduler, VirtualHost,
};

/// An engine wired to in-memory collaborators
pub struct Fixture {
    pub engine: Engine,
    pub host: Arc<VirtualHost>,
    pub audit: Arc<ScriptedAuditEngine>,
    pub sink: Arc<MemorySink>,
    pub signal: IdleSignal,
    /// `<div id="app">` inside body
    pub app: NodeId,
}

impl Fixture {
    pub fn new(generation: RenderGeneration, config: EngineConfig) -> Self {
        let document = Document::from_spec(&[ElementSpec::new("div").with_id("app")])
            .unwrap()
            .into_shared();
        let app = document.read().get_element_by_id("app").unwrap();

        let host = Arc::new(VirtualHost::new(generation, Arc::clone(&document)));
        let audit = Arc::new(ScriptedAuditEngine::new());
        let sink = Arc::new(MemorySink::new());
        let signal = IdleSignal::new();

        let engine = Engine::new(
            config,
            Collaborators {
                ui: host.clone(),
                renderer: host.clone(),
                audit: audit.clone(),
                scheduler: Arc::new(TokioIdleScheduler::new(Handle::current(), signal.clone())),
                sink: sink.clone(),
                document,
                seen: None,
            },
        )
        .unwrap();

        Self {
            engine,
            host,
            audit,
            sink,
            signal,
            app,
        }
    }

    /// Fiber host, 1s debounce, 50ms idle timeout
    pub fn fiber() -> Self {
        Self::new(RenderGeneration::Fiber, config())
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        idle_timeout_ms: Some(50),
        ..EngineConfig::with_debounce_ms(1000)
    }
}

pub fn violation(rule: &str, impact: Impact, selector: &str) -> AuditResults {
    AuditResults {
        violations: vec![RuleResult {
            id: rule.to_string(),
            impact: Some(impact),
            help: format!("{rule} help"),
            nodes: vec![NodeResult::at(selector)],
            ..RuleResult::default()
        }],
    }
}
