//! Engine setup and teardown
//!
//! [`Engine`] owns one complete instrumentation: configuration, the audit
//! runner, the component registry and the hooks installed on the host.
//! Nothing is process-global, so independent engines can coexist.

use crate::adapter::adapter_for;
use crate::audit::AuditEngine;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::host::{CreatedElement, DomRenderer, HookId, UiLibrary, Unit};
use crate::idle::IdleScheduler;
use crate::registry::ComponentRegistry;
use crate::report::ReportSink;
use crate::runner::{AuditRunner, RunnerParts, ScanHandle, ScanReport};
use dom::{NodeId, SharedDocument};
use journal::SeenViolations;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Everything the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub ui: Arc<dyn UiLibrary>,
    pub renderer: Arc<dyn DomRenderer>,
    pub audit: Arc<dyn AuditEngine>,
    pub scheduler: Arc<dyn IdleScheduler>,
    pub sink: Arc<dyn ReportSink>,
    pub document: SharedDocument,
    /// Share a journal between engines; a fresh one is used when `None`
    pub seen: Option<Arc<SeenViolations>>,
}

#[derive(Debug, Clone, Copy)]
struct InstalledHooks {
    discovery: HookId,
    unmount: Option<HookId>,
}

/// Accessibility audit engine bound to one host
pub struct Engine {
    config: EngineConfig,
    ui: Arc<dyn UiLibrary>,
    audit: Arc<dyn AuditEngine>,
    document: SharedDocument,
    seen: Arc<SeenViolations>,
    runner: AuditRunner,
    registry: ComponentRegistry,
    hooks: Mutex<Option<InstalledHooks>>,
}

impl Engine {
    /// Validate `config` and wire the collaborators together
    ///
    /// Must be called from within a tokio runtime; timers and audits are
    /// spawned on it.
    pub fn new(config: EngineConfig, collab: Collaborators) -> Result<Self, EngineError> {
        config.validate()?;
        let handle = Handle::try_current()?;

        let seen = collab.seen.unwrap_or_default();
        let runner = AuditRunner::new(
            handle.clone(),
            RunnerParts {
                document: Arc::clone(&collab.document),
                audit: Arc::clone(&collab.audit),
                scheduler: collab.scheduler,
                sink: Arc::clone(&collab.sink),
                seen: Arc::clone(&seen),
            },
            config.context.clone(),
            config.idle_timeout(),
        );

        let generation = collab.ui.generation();
        let registry = ComponentRegistry::new(
            handle,
            adapter_for(generation),
            collab.renderer,
            collab.sink,
            runner.clone(),
            config.debounce(),
        );
        debug!(?generation, debounce_ms = config.debounce_ms, "engine created");

        Ok(Self {
            config,
            ui: collab.ui,
            audit: collab.audit,
            document: collab.document,
            seen,
            runner,
            registry,
            hooks: Mutex::new(None),
        })
    }

    /// Instrument the host and request the initial whole-document scan
    ///
    /// The first call forwards the audit configuration and installs the
    /// discovery and unmount hooks. Later calls only request a scan.
    pub fn start(&self) -> Result<ScanHandle, EngineError> {
        {
            let mut hooks = self.hooks.lock();
            if hooks.is_none() {
                if let Some(audit_config) = &self.config.audit {
                    self.audit.configure(audit_config)?;
                }

                let registry = self.registry.clone();
                let discovery = self
                    .ui
                    .add_discovery_hook(Arc::new(move |element: &CreatedElement| {
                        registry.observe(element);
                    }));
                let registry = self.registry.clone();
                let unmount = self.ui.add_unmount_hook(Arc::new(move |unit: &Unit| {
                    registry.forget(unit);
                }));

                *hooks = Some(InstalledHooks { discovery, unmount });
                info!(unmount_signal = unmount.is_some(), "instrumentation installed");
            } else {
                debug!("instrumentation already installed");
            }
        }

        let (root, body) = {
            let doc = self.document.read();
            (doc.document_element(), doc.body())
        };
        if let Some(root) = root {
            self.runner.enqueue(root);
        }
        let first = body.or(root).unwrap_or(NodeId::DOCUMENT);
        Ok(self.runner.request_scan(first))
    }

    /// Start and wait for the initial scan
    pub async fn run(&self) -> Result<ScanReport, EngineError> {
        let report = self.start()?.wait().await?;
        Ok(report)
    }

    /// Queue `node` and schedule a scan
    pub fn request_scan(&self, node: NodeId) -> ScanHandle {
        self.runner.request_scan(node)
    }

    /// Undo the instrumentation
    ///
    /// Cancels a scan that has not fired yet, restores every patched
    /// lifecycle method and removes the host hooks. An audit already
    /// running completes normally. The engine can be started again.
    pub fn stop(&self) {
        self.runner.cancel_pending();

        if let Some(hooks) = self.hooks.lock().take() {
            self.ui.remove_discovery_hook(hooks.discovery);
            if let Some(unmount) = hooks.unmount {
                self.ui.remove_unmount_hook(unmount);
            }
        }

        let restored = self.registry.clear();
        info!(restored, "instrumentation removed");
    }

    /// Whether hooks are installed
    pub fn is_started(&self) -> bool {
        self.hooks.lock().is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runner(&self) -> &AuditRunner {
        &self.runner
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Journal of reported violations
    pub fn seen(&self) -> &Arc<SeenViolations> {
        &self.seen
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .field("registry", &self.registry)
            .finish()
    }
}
