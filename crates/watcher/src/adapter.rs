//! Render-generation adapters
//!
//! Each generation stores the owning unit and its identity under different
//! internals. The adapter is picked once at setup from
//! [`UiLibrary::generation`](crate::host::UiLibrary::generation) instead of
//! sniffing both shapes on every element.

use crate::error::RenderError;
use crate::host::{CreatedElement, DomRenderer, RenderGeneration, Unit, UnitId};
use dom::NodeId;
use std::sync::Arc;

/// Capability interface over one render-engine generation
pub trait UnitAdapter: Send + Sync {
    /// Generation this adapter reads
    fn generation(&self) -> RenderGeneration;

    /// Unit that owns a freshly created element
    fn owner(&self, element: &CreatedElement) -> Option<Arc<Unit>>;

    /// Stable per-instance identity; `None` when the host assigned none
    fn identity(&self, unit: &Unit) -> Option<UnitId>;

    /// Root DOM node of the unit's current output
    fn root_node(&self, renderer: &dyn DomRenderer, unit: &Unit) -> Result<Option<NodeId>, RenderError> {
        renderer.find_dom_node(unit)
    }
}

/// Stack-generation linkage
#[derive(Debug, Clone, Copy, Default)]
pub struct StackAdapter;

impl UnitAdapter for StackAdapter {
    fn generation(&self) -> RenderGeneration {
        RenderGeneration::Stack
    }

    fn owner(&self, element: &CreatedElement) -> Option<Arc<Unit>> {
        element.owner_instance.clone()
    }

    fn identity(&self, unit: &Unit) -> Option<UnitId> {
        // Debug id 0 means "unassigned"
        unit.internals().stack_debug_id.filter(|&id| id != 0)
    }
}

/// Fiber-generation linkage
#[derive(Debug, Clone, Copy, Default)]
pub struct FiberAdapter;

impl UnitAdapter for FiberAdapter {
    fn generation(&self) -> RenderGeneration {
        RenderGeneration::Fiber
    }

    fn owner(&self, element: &CreatedElement) -> Option<Arc<Unit>> {
        element.owner_state_node.clone()
    }

    fn identity(&self, unit: &Unit) -> Option<UnitId> {
        unit.internals().fiber_debug_id.filter(|&id| id != 0)
    }
}

/// Adapter for a generation
pub fn adapter_for(generation: RenderGeneration) -> Box<dyn UnitAdapter> {
    match generation {
        RenderGeneration::Stack => Box::new(StackAdapter),
        RenderGeneration::Fiber => Box::new(FiberAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Internals;

    fn both_shapes() -> (CreatedElement, Arc<Unit>, Arc<Unit>) {
        let legacy = Unit::new(
            "Legacy",
            Internals {
                stack_debug_id: Some(7),
                fiber_debug_id: None,
            },
        );
        let fiber = Unit::new(
            "Fiber",
            Internals {
                stack_debug_id: None,
                fiber_debug_id: Some(9),
            },
        );
        let element = CreatedElement {
            tag: "div".into(),
            owner_instance: Some(Arc::clone(&legacy)),
            owner_state_node: Some(Arc::clone(&fiber)),
        };
        (element, legacy, fiber)
    }

    #[test]
    fn test_stack_adapter_reads_stack_shape() {
        let (element, legacy, fiber) = both_shapes();
        let adapter = adapter_for(RenderGeneration::Stack);

        let owner = adapter.owner(&element).unwrap();
        assert!(Arc::ptr_eq(&owner, &legacy));
        assert_eq!(adapter.identity(&legacy), Some(7));
        assert_eq!(adapter.identity(&fiber), None);
    }

    #[test]
    fn test_fiber_adapter_reads_fiber_shape() {
        let (element, legacy, fiber) = both_shapes();
        let adapter = adapter_for(RenderGeneration::Fiber);

        let owner = adapter.owner(&element).unwrap();
        assert!(Arc::ptr_eq(&owner, &fiber));
        assert_eq!(adapter.identity(&fiber), Some(9));
        assert_eq!(adapter.identity(&legacy), None);
    }

    #[test]
    fn test_zero_debug_id_is_no_identity() {
        let unit = Unit::new(
            "Anon",
            Internals {
                stack_debug_id: Some(0),
                fiber_debug_id: Some(0),
            },
        );
        assert_eq!(StackAdapter.identity(&unit), None);
        assert_eq!(FiberAdapter.identity(&unit), None);
    }

    #[test]
    fn test_element_without_owner() {
        let element = CreatedElement {
            tag: "span".into(),
            ..CreatedElement::default()
        };
        assert!(StackAdapter.owner(&element).is_none());
        assert!(FiberAdapter.owner(&element).is_none());
    }
}
