//! UI framework collaborator
//!
//! The tracked framework exposes:
//! - Units (mounted component instances) with patchable lifecycle methods
//! - An instance-discovery extension point fired on every element creation
//! - An unmount signal
//! - A renderer that maps a unit to its root DOM node
//!
//! Two render-engine generations link created elements to their owning unit
//! differently; see [`crate::adapter`].

use crate::error::RenderError;
use crate::intercept::{Method, MethodTable, Patchable};
use dom::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable per-instance identity assigned by the host
pub type UnitId = u64;

/// Lifecycle method run after a unit's first render is in the DOM
pub const DID_MOUNT: &str = "componentDidMount";

/// Lifecycle method run after a unit's update is in the DOM
pub const DID_UPDATE: &str = "componentDidUpdate";

/// Render-engine generation of the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderGeneration {
    /// Stack reconciler: owner is `_instance`, identity on the internal instance
    Stack,
    /// Fiber reconciler: owner is `stateNode`, identity on the internal fiber
    Fiber,
}

/// Generation-specific bookkeeping the host keeps on a unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Internals {
    /// Debug id on the stack-generation internal instance
    pub stack_debug_id: Option<UnitId>,
    /// Debug id on the fiber-generation internal fiber
    pub fiber_debug_id: Option<UnitId>,
}

/// A mounted component instance
pub struct Unit {
    name: String,
    internals: Internals,
    methods: MethodTable<Unit>,
}

impl Unit {
    /// Create a unit with no lifecycle methods
    pub fn new(name: impl Into<String>, internals: Internals) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            internals,
            methods: MethodTable::new(),
        })
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host bookkeeping
    pub fn internals(&self) -> Internals {
        self.internals
    }

    /// Run lifecycle method `name` if the unit defines it
    ///
    /// Returns whether a method ran.
    pub fn invoke(&self, name: &str) -> bool {
        // Clone out of the table so the method may patch the unit itself
        match self.methods.get(name) {
            Some(method) => {
                method(self);
                true
            }
            None => false,
        }
    }

    /// Whether lifecycle method `name` is defined
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }
}

impl Patchable for Unit {
    fn method(&self, name: &str) -> Option<Method<Self>> {
        self.methods.get(name)
    }

    fn set_method(&self, name: &str, method: Method<Self>) {
        self.methods.set(name, method);
    }

    fn remove_method(&self, name: &str) {
        self.methods.remove(name);
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("internals", &self.internals)
            .finish()
    }
}

/// An element as handed to instance-discovery hooks
///
/// Exactly one of the owner slots is filled, depending on the generation.
#[derive(Debug, Clone, Default)]
pub struct CreatedElement {
    /// Element type
    pub tag: String,
    /// Stack generation: `_owner._instance`
    pub owner_instance: Option<Arc<Unit>>,
    /// Fiber generation: `_owner.stateNode`
    pub owner_state_node: Option<Arc<Unit>>,
}

/// Registration handle for host hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Called after every element creation
pub type DiscoveryHook = Arc<dyn Fn(&CreatedElement) + Send + Sync>;

/// Called when a unit unmounts
pub type UnmountHook = Arc<dyn Fn(&Unit) + Send + Sync>;

/// The UI library being instrumented
pub trait UiLibrary: Send + Sync {
    /// Render-engine generation, fixed for the library's lifetime
    fn generation(&self) -> RenderGeneration;

    /// Register an instance-discovery hook
    fn add_discovery_hook(&self, hook: DiscoveryHook) -> HookId;

    /// Unregister an instance-discovery hook
    fn remove_discovery_hook(&self, id: HookId);

    /// Register an unmount hook; `None` when the host has no unmount signal
    fn add_unmount_hook(&self, _hook: UnmountHook) -> Option<HookId> {
        None
    }

    /// Unregister an unmount hook
    fn remove_unmount_hook(&self, _id: HookId) {}
}

/// Maps units to their rendered DOM
pub trait DomRenderer: Send + Sync {
    /// Root DOM node of `unit`'s output; `Ok(None)` when it renders nothing
    fn find_dom_node(&self, unit: &Unit) -> Result<Option<NodeId>, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_invoke_missing_method() {
        let unit = Unit::new("App", Internals::default());
        assert!(!unit.invoke(DID_MOUNT));
    }

    #[test]
    fn test_method_may_repatch_its_unit() {
        let unit = Unit::new("App", Internals::default());
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        unit.set_method(
            DID_UPDATE,
            Arc::new(move |u: &Unit| {
                *counter.lock() += 1;
                u.remove_method(DID_UPDATE);
            }),
        );

        assert!(unit.invoke(DID_UPDATE));
        assert!(!unit.invoke(DID_UPDATE));
        assert_eq!(*hits.lock(), 1);
    }
}
