//! Component tracking registry
//!
//! Discovers units through the host's instance-discovery hook and attaches
//! change-detection to their post-mount and post-update lifecycle points.
//! Every hook call queues the unit's root node; only the scan trigger is
//! debounced (leading edge, per unit). A hook landing inside an open
//! window still schedules a scan when none is waiting, so its node is never
//! left behind in an idle runner.

use crate::adapter::UnitAdapter;
use crate::debounce::Debounce;
use crate::host::{CreatedElement, DomRenderer, Unit, UnitId, DID_MOUNT, DID_UPDATE};
use crate::intercept::Interceptor;
use crate::report::{ReportSink, UnitInfo};
use crate::runner::AuditRunner;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

/// Tracks discovered units
#[derive(Clone)]
pub struct ComponentRegistry {
    shared: Arc<Shared>,
}

struct Shared {
    handle: Handle,
    adapter: Box<dyn UnitAdapter>,
    renderer: Arc<dyn DomRenderer>,
    sink: Arc<dyn ReportSink>,
    runner: AuditRunner,
    debounce: Duration,
    interceptor: Interceptor,
    tracked: DashMap<UnitId, Tracked>,
    /// Units whose lifecycle methods are wrapped; survives eviction
    patched: DashSet<UnitId>,
}

struct Tracked {
    name: String,
    trigger: Debounce<()>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new(
        handle: Handle,
        adapter: Box<dyn UnitAdapter>,
        renderer: Arc<dyn DomRenderer>,
        sink: Arc<dyn ReportSink>,
        runner: AuditRunner,
        debounce: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle,
                adapter,
                renderer,
                sink,
                runner,
                debounce,
                interceptor: Interceptor::new(),
                tracked: DashMap::new(),
                patched: DashSet::new(),
            }),
        }
    }

    /// Instance-discovery entry point: track the element's owner, if any
    pub fn observe(&self, element: &CreatedElement) -> bool {
        match self.shared.adapter.owner(element) {
            Some(owner) => self.track(&owner),
            None => false,
        }
    }

    /// Start tracking `unit`
    ///
    /// Returns `false` when the unit has no identity or is already tracked.
    pub fn track(&self, unit: &Arc<Unit>) -> bool {
        let Some(id) = self.shared.adapter.identity(unit) else {
            trace!(unit = unit.name(), "unit has no identity, not tracking");
            return false;
        };

        match self.shared.tracked.entry(id) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                let runner = self.shared.runner.clone();
                let trigger = Debounce::new(
                    self.shared.handle.clone(),
                    self.shared.debounce,
                    true,
                    move |()| {
                        // Waiters are only kept by callers that asked for a handle
                        let _ = runner.schedule();
                    },
                );
                slot.insert(Tracked {
                    name: unit.name().to_string(),
                    trigger,
                });
            }
        }

        // A remounted unit keeps its wrappers from the first time around
        if self.shared.patched.insert(id) {
            for method in [DID_MOUNT, DID_UPDATE] {
                let weak: Weak<Shared> = Arc::downgrade(&self.shared);
                self.shared.interceptor.intercept(unit, method, move |unit: &Unit| {
                    if let Some(shared) = weak.upgrade() {
                        shared.check_node(unit);
                    }
                });
            }
        }

        debug!(unit = unit.name(), unit_id = id, "tracking unit");
        true
    }

    /// Queue `unit`'s root node and trigger a scan
    pub fn check_node(&self, unit: &Unit) {
        self.shared.check_node(unit);
    }

    /// Stop tracking a unit that unmounted
    pub fn forget(&self, unit: &Unit) -> bool {
        let Some(id) = self.shared.adapter.identity(unit) else {
            return false;
        };
        match self.shared.tracked.remove(&id) {
            Some((_, tracked)) => {
                tracked.trigger.cancel();
                debug!(unit = %tracked.name, unit_id = id, "forgot unmounted unit");
                true
            }
            None => false,
        }
    }

    /// Whether a unit with this identity is tracked
    pub fn is_tracked(&self, id: UnitId) -> bool {
        self.shared.tracked.contains_key(&id)
    }

    /// Number of tracked units
    pub fn len(&self) -> usize {
        self.shared.tracked.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.shared.tracked.is_empty()
    }

    /// Undo every lifecycle patch and forget all units
    ///
    /// Returns how many patches were undone.
    pub fn clear(&self) -> usize {
        let restored = self.shared.interceptor.restore_all();
        for entry in self.shared.tracked.iter() {
            entry.value().trigger.cancel();
        }
        self.shared.tracked.clear();
        self.shared.patched.clear();
        restored
    }
}

impl Shared {
    fn check_node(&self, unit: &Unit) {
        let id = self.adapter.identity(unit);

        let node = match self.adapter.root_node(self.renderer.as_ref(), unit) {
            Ok(Some(node)) => node,
            Ok(None) => {
                trace!(unit = unit.name(), "unit rendered no DOM node");
                return;
            }
            Err(e) => {
                error!(unit = unit.name(), unit_id = ?id, error = %e, "could not check node");
                self.sink.instrumentation_error(
                    &UnitInfo {
                        id,
                        name: unit.name().to_string(),
                    },
                    &e,
                );
                return;
            }
        };

        self.runner.enqueue(node);

        let trigger = id.and_then(|id| self.tracked.get(&id).map(|t| t.trigger.clone()));
        match trigger {
            Some(trigger) => {
                trigger.call(());
                if self.runner.schedule_if_idle() {
                    debug!(unit = unit.name(), "trigger suppressed but runner idle, scheduling scan");
                }
            }
            None => {
                let _ = self.runner.schedule();
            }
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("generation", &self.shared.adapter.generation())
            .field("tracked", &self.shared.tracked.len())
            .field("patches", &self.shared.interceptor.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FiberAdapter;
    use crate::audit::ScriptedAuditEngine;
    use crate::error::RenderError;
    use crate::host::Internals;
    use crate::idle::{IdleSignal, TokioIdleScheduler};
    use crate::intercept::Patchable;
    use crate::report::MemorySink;
    use crate::runner::{Phase, RunnerParts};
    use dom::{Document, NodeId};
    use journal::SeenViolations;
    use parking_lot::Mutex;

    /// Renderer with a fixed answer per unit name
    #[derive(Default)]
    struct FixedRenderer {
        roots: Mutex<Vec<(String, Result<Option<NodeId>, RenderError>)>>,
    }

    impl FixedRenderer {
        fn set(&self, name: &str, answer: Result<Option<NodeId>, RenderError>) {
            self.roots.lock().push((name.to_string(), answer));
        }
    }

    impl DomRenderer for FixedRenderer {
        fn find_dom_node(&self, unit: &Unit) -> Result<Option<NodeId>, RenderError> {
            self.roots
                .lock()
                .iter()
                .rev()
                .find(|(name, _)| name == unit.name())
                .map(|(_, answer)| answer.clone())
                .unwrap_or_else(|| Err(RenderError::Unmounted(unit.name().to_string())))
        }
    }

    struct Harness {
        registry: ComponentRegistry,
        runner: AuditRunner,
        renderer: Arc<FixedRenderer>,
        sink: Arc<MemorySink>,
        body: NodeId,
    }

    fn harness() -> Harness {
        let document = Document::new().into_shared();
        let body = document.read().body().unwrap();
        let sink = Arc::new(MemorySink::new());
        let renderer = Arc::new(FixedRenderer::default());
        let runner = AuditRunner::new(
            Handle::current(),
            RunnerParts {
                document,
                audit: Arc::new(ScriptedAuditEngine::new()),
                scheduler: Arc::new(TokioIdleScheduler::new(Handle::current(), IdleSignal::new())),
                sink: sink.clone(),
                seen: Arc::new(SeenViolations::new()),
            },
            None,
            Duration::from_millis(100),
        );
        let registry = ComponentRegistry::new(
            Handle::current(),
            Box::new(FiberAdapter),
            renderer.clone(),
            sink.clone(),
            runner.clone(),
            Duration::from_millis(100),
        );
        Harness {
            registry,
            runner,
            renderer,
            sink,
            body,
        }
    }

    fn fiber_unit(name: &str, id: UnitId) -> Arc<Unit> {
        Unit::new(
            name,
            Internals {
                stack_debug_id: None,
                fiber_debug_id: Some(id),
            },
        )
    }

    fn element_of(unit: &Arc<Unit>) -> CreatedElement {
        CreatedElement {
            tag: "div".into(),
            owner_instance: None,
            owner_state_node: Some(Arc::clone(unit)),
        }
    }

    #[tokio::test]
    async fn test_observe_tracks_owner_once() {
        let h = harness();
        let unit = fiber_unit("App", 1);

        assert!(h.registry.observe(&element_of(&unit)));
        assert!(!h.registry.observe(&element_of(&unit)));
        assert!(h.registry.is_tracked(1));
        assert!(unit.has_method(DID_MOUNT));
        assert!(unit.has_method(DID_UPDATE));
    }

    #[tokio::test]
    async fn test_units_without_identity_are_skipped() {
        let h = harness();
        let anon = fiber_unit("Anon", 0);
        assert!(!h.registry.observe(&element_of(&anon)));
        assert!(!anon.has_method(DID_MOUNT));
        assert!(h.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_burst_triggers_once_but_queues_every_node() {
        let h = harness();
        let unit = fiber_unit("List", 2);
        h.renderer.set("List", Ok(Some(h.body)));
        h.registry.track(&unit);

        for _ in 0..3 {
            unit.invoke(DID_UPDATE);
        }
        assert_eq!(h.runner.pending_nodes(), vec![h.body; 3]);
        assert_eq!(h.runner.stats().preempted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_inside_window_schedules_when_runner_idle() {
        let h = harness();
        let unit = fiber_unit("List", 6);
        h.renderer.set("List", Ok(Some(h.body)));
        h.registry.track(&unit);

        unit.invoke(DID_MOUNT);
        assert_eq!(h.runner.phase(), Phase::ScanPending);

        // The runner goes idle while the unit's window is still open
        h.runner.cancel_pending();
        assert_eq!(h.runner.phase(), Phase::Idle);

        unit.invoke(DID_UPDATE);
        assert_eq!(h.runner.pending_nodes(), vec![h.body]);
        assert_eq!(h.runner.phase(), Phase::ScanPending);
    }

    #[tokio::test]
    async fn test_retracking_after_forget_does_not_rewrap() {
        let h = harness();
        let unit = fiber_unit("Modal", 5);
        h.renderer.set("Modal", Ok(Some(h.body)));

        assert!(h.registry.track(&unit));
        assert!(h.registry.forget(&unit));
        assert!(h.registry.track(&unit));

        unit.invoke(DID_MOUNT);
        assert_eq!(h.runner.pending_nodes(), vec![h.body]);
        assert_eq!(h.registry.clear(), 2);
    }

    #[tokio::test]
    async fn test_render_failure_is_reported_not_scheduled() {
        let h = harness();
        let unit = fiber_unit("Broken", 3);
        h.renderer.set("Broken", Err(RenderError::Host("no renderable output".into())));
        h.registry.track(&unit);

        unit.invoke(DID_MOUNT);

        let errors = h.sink.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, UnitInfo { id: Some(3), name: "Broken".into() });
        assert!(h.runner.pending_nodes().is_empty());
    }

    #[tokio::test]
    async fn test_forget_and_clear() {
        let h = harness();
        let unit = fiber_unit("Modal", 4);
        unit.set_method(DID_MOUNT, Arc::new(|_: &Unit| {}));
        h.registry.track(&unit);

        assert!(h.registry.forget(&unit));
        assert!(!h.registry.forget(&unit));
        assert!(!h.registry.is_tracked(4));

        // Patches outlive eviction until cleared
        assert_eq!(h.registry.clear(), 2);
        assert!(unit.has_method(DID_MOUNT));
        assert!(!unit.has_method(DID_UPDATE));
    }
}
