//! Change detection and audit scheduling for Axewatch
//!
//! This crate provides:
//! - Reversible method interception for lifecycle hooks
//! - Leading / trailing edge debouncing on tokio timers
//! - Idle-time scheduling with a timeout fallback
//! - The audit runner (pending nodes, common ancestor, dedup, report)
//! - The component registry and render-generation adapters
//! - [`Engine`], the setup entry point tying it together
//!
//! Hosts plug in through the traits in [`host`], [`audit`], [`idle`] and
//! [`report`]. [`VirtualHost`] and [`ScriptedAuditEngine`] are in-memory
//! implementations used by tests and the session replay harness.

pub mod adapter;
pub mod audit;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod host;
pub mod idle;
pub mod intercept;
pub mod registry;
pub mod report;
pub mod runner;
pub mod virtual_host;

// Re-export main types for convenience
pub use adapter::{adapter_for, FiberAdapter, StackAdapter, UnitAdapter};
pub use audit::{
    AuditConfig, AuditEngine, ElementContext, ReporterVersion, RuleToggle, RunOptions,
    ScanTarget, ScriptedAuditEngine,
};
pub use config::EngineConfig;
pub use debounce::Debounce;
pub use engine::{Collaborators, Engine};
pub use error::{AuditError, ConfigError, EngineError, RenderError, ScanError};
pub use host::{
    CreatedElement, DomRenderer, HookId, Internals, RenderGeneration, UiLibrary, Unit, UnitId,
    DID_MOUNT, DID_UPDATE,
};
pub use idle::{IdleDeadline, IdleHandle, IdleScheduler, IdleSignal, TokioIdleScheduler};
pub use intercept::{Interceptor, Patchable};
pub use registry::ComponentRegistry;
pub use report::{LogSink, MemorySink, ReportSink, UnitInfo};
pub use runner::{AuditRunner, Phase, RunnerStats, ScanHandle, ScanReport};
pub use virtual_host::VirtualHost;
