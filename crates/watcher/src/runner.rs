//! Idle-scheduled audit runner
//!
//! Two states: `Idle` and `ScanPending`. Requesting a scan queues a node
//! and (re)schedules one idle callback, cancelling any callback that has
//! not fired yet. When the callback fires it:
//!
//! 1. Drains the pending nodes
//! 2. Resolves the scan target (fixed context, or common ancestor)
//! 3. Runs the audit engine, one audit at a time
//! 4. Filters the results against the seen-violations journal
//! 5. Reports whatever is new and resolves every waiter of the cycle
//!
//! Waiters of a pre-empted request carry over to the cycle that replaced it.

use crate::audit::{AuditEngine, ElementContext, RunOptions, ScanTarget};
use crate::error::ScanError;
use crate::idle::{IdleDeadline, IdleHandle, IdleScheduler};
use crate::report::ReportSink;
use dom::{resolve_scope, NodeId, RuleResult, ScanScope, SharedDocument};
use journal::SeenViolations;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Collaborators the runner drives
#[derive(Clone)]
pub struct RunnerParts {
    pub document: SharedDocument,
    pub audit: Arc<dyn AuditEngine>,
    pub scheduler: Arc<dyn IdleScheduler>,
    pub sink: Arc<dyn ReportSink>,
    pub seen: Arc<SeenViolations>,
}

/// Runner state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No scan requested
    Idle,
    /// A scan is waiting for idle time
    ScanPending,
}

/// Outcome of one completed scan cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Identifies the cycle in logs
    pub scan_id: Ulid,
    /// What the audit ran against
    pub target: ScanTarget,
    /// Nodes drained from the pending set for this cycle
    pub candidates: Vec<NodeId>,
    /// Violations not reported before (possibly empty)
    pub violations: Vec<RuleResult>,
}

type Waiter = oneshot::Sender<Result<ScanReport, ScanError>>;

/// Resolves once the scan cycle that picked up a request has finished
#[derive(Debug)]
pub struct ScanHandle {
    rx: oneshot::Receiver<Result<ScanReport, ScanError>>,
}

impl ScanHandle {
    /// Wait for the cycle's report
    pub async fn wait(self) -> Result<ScanReport, ScanError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::Abandoned),
        }
    }
}

/// Counters kept across cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Audits that returned results
    pub completed: u64,
    /// Audits that failed
    pub failed: u64,
    /// Idle callbacks cancelled by a newer request
    pub preempted: u64,
    /// Cycles whose audit has not finished yet
    pub running: u64,
}

/// Schedules audits at idle time
#[derive(Clone)]
pub struct AuditRunner {
    shared: Arc<Shared>,
}

struct Shared {
    handle: Handle,
    parts: RunnerParts,
    context: Option<ElementContext>,
    timeout: Duration,
    state: Mutex<State>,
    /// Held for the duration of each audit engine call
    gate: tokio::sync::Mutex<()>,
    completed: AtomicU64,
    failed: AtomicU64,
    preempted: AtomicU64,
    running: AtomicU64,
    last: Mutex<Option<ScanReport>>,
}

#[derive(Default)]
struct State {
    pending: Vec<NodeId>,
    scheduled: Option<IdleHandle>,
    /// Bumped on every schedule; a callback from an older cycle is ignored
    cycle: u64,
    waiters: Vec<Waiter>,
}

impl AuditRunner {
    /// Create a runner; audits are spawned on `handle`
    pub fn new(
        handle: Handle,
        parts: RunnerParts,
        context: Option<ElementContext>,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle,
                parts,
                context,
                timeout,
                state: Mutex::new(State::default()),
                gate: tokio::sync::Mutex::new(()),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                preempted: AtomicU64::new(0),
                running: AtomicU64::new(0),
                last: Mutex::new(None),
            }),
        }
    }

    /// Queue `node` for the next cycle without scheduling one
    pub fn enqueue(&self, node: NodeId) {
        self.shared.state.lock().pending.push(node);
    }

    /// Queue `node` and (re)schedule the idle callback
    pub fn request_scan(&self, node: NodeId) -> ScanHandle {
        let mut state = self.shared.state.lock();
        state.pending.push(node);
        Shared::schedule_locked(&self.shared, &mut state)
    }

    /// (Re)schedule the idle callback for whatever is already queued
    pub fn schedule(&self) -> ScanHandle {
        let mut state = self.shared.state.lock();
        Shared::schedule_locked(&self.shared, &mut state)
    }

    /// Schedule a cycle unless one is already waiting for idle time
    ///
    /// Returns whether a new cycle was scheduled.
    pub fn schedule_if_idle(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.scheduled.is_some() {
            return false;
        }
        let _ = Shared::schedule_locked(&self.shared, &mut state);
        true
    }

    /// Cancel a not-yet-fired callback and drop queued nodes
    ///
    /// Its waiters resolve with [`ScanError::Cancelled`]. An audit already
    /// running is not interrupted.
    pub fn cancel_pending(&self) {
        let waiters = {
            let mut state = self.shared.state.lock();
            if let Some(handle) = state.scheduled.take() {
                self.shared.parts.scheduler.cancel_idle(handle);
            }
            state.cycle += 1;
            state.pending.clear();
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), "cancelled pending scan");
        }
        for waiter in waiters {
            let _ = waiter.send(Err(ScanError::Cancelled));
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        if self.shared.state.lock().scheduled.is_some() {
            Phase::ScanPending
        } else {
            Phase::Idle
        }
    }

    /// Nodes queued for the next cycle
    pub fn pending_nodes(&self) -> Vec<NodeId> {
        self.shared.state.lock().pending.clone()
    }

    /// Report of the most recent successful cycle
    pub fn last_report(&self) -> Option<ScanReport> {
        self.shared.last.lock().clone()
    }

    /// Counters since construction
    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            preempted: self.shared.preempted.load(Ordering::Relaxed),
            running: self.shared.running.load(Ordering::SeqCst),
        }
    }
}

impl Shared {
    fn schedule_locked(this: &Arc<Self>, state: &mut State) -> ScanHandle {
        if let Some(previous) = state.scheduled.take() {
            this.parts.scheduler.cancel_idle(previous);
            this.preempted.fetch_add(1, Ordering::Relaxed);
            debug!(cycle = state.cycle, "pre-empted pending scan");
        }

        state.cycle += 1;
        let cycle = state.cycle;
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);

        let weak: Weak<Self> = Arc::downgrade(this);
        let handle = this.parts.scheduler.request_idle(
            Box::new(move |deadline| {
                if let Some(shared) = weak.upgrade() {
                    shared.fire(cycle, deadline);
                }
            }),
            this.timeout,
        );
        state.scheduled = Some(handle);
        debug!(cycle, pending = state.pending.len(), "scheduled scan");

        ScanHandle { rx }
    }

    fn fire(self: Arc<Self>, cycle: u64, deadline: IdleDeadline) {
        let (candidates, waiters) = {
            let mut state = self.state.lock();
            if state.cycle != cycle || state.scheduled.is_none() {
                debug!(cycle, current = state.cycle, "ignoring stale idle callback");
                return;
            }
            state.scheduled = None;
            (
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.waiters),
            )
        };

        let target = self.resolve_target(&candidates);
        let scan_id = Ulid::new();
        debug!(
            %scan_id,
            did_timeout = deadline.did_timeout,
            candidates = candidates.len(),
            ?target,
            "idle callback fired"
        );

        self.running.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self);
        self.handle.spawn(async move {
            let outcome = shared.audit(scan_id, target, candidates).await;
            shared.running.fetch_sub(1, Ordering::SeqCst);
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        });
    }

    fn resolve_target(&self, candidates: &[NodeId]) -> ScanTarget {
        if let Some(context) = &self.context {
            return ScanTarget::Context(context.clone());
        }

        let doc = self.parts.document.read();
        match resolve_scope(&doc, candidates) {
            ScanScope::Document => ScanTarget::Document,
            ScanScope::Subtree(node) => ScanTarget::Node(node),
        }
    }

    async fn audit(
        &self,
        scan_id: Ulid,
        target: ScanTarget,
        candidates: Vec<NodeId>,
    ) -> Result<ScanReport, ScanError> {
        let results = {
            let _gate = self.gate.lock().await;
            info!(%scan_id, ?target, "running accessibility audit");
            self.parts.audit.run(&target, &RunOptions::default()).await
        };

        let results = match results {
            Ok(results) => results,
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(%scan_id, error = %e, "accessibility audit failed");
                return Err(e.into());
            }
        };

        let found = results.violations.len();
        let violations = self.parts.seen.filter(results.violations);
        if !violations.is_empty() {
            self.parts.sink.report(&violations);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
        info!(%scan_id, found, new = violations.len(), "audit complete");

        let report = ScanReport {
            scan_id,
            target,
            candidates,
            violations,
        };
        *self.last.lock() = Some(report.clone());
        Ok(report)
    }
}
