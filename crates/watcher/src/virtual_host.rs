//! In-memory UI library and renderer
//!
//! `VirtualHost` plays the host framework over a [`SharedDocument`]: units
//! render [`ElementSpec`] subtrees, element creation fires discovery hooks
//! with the owner in the generation's slot, and lifecycle methods run after
//! the DOM is updated. Hooks and lifecycle methods are always called with
//! no host lock held.

use crate::error::RenderError;
use crate::host::{
    CreatedElement, DiscoveryHook, DomRenderer, HookId, Internals, RenderGeneration, UiLibrary,
    Unit, UnitId, UnmountHook, DID_MOUNT, DID_UPDATE,
};
use ahash::AHashMap;
use dom::{Document, ElementSpec, NodeId, SharedDocument};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct Rendered {
    root: Option<NodeId>,
    mounted: bool,
    failure: Option<String>,
}

/// Host framework simulation
pub struct VirtualHost {
    generation: RenderGeneration,
    document: SharedDocument,
    next_id: AtomicU64,
    discovery: Mutex<Vec<(HookId, DiscoveryHook)>>,
    unmount: Mutex<Vec<(HookId, UnmountHook)>>,
    rendered: Mutex<AHashMap<UnitId, Rendered>>,
}

impl VirtualHost {
    /// Create a host rendering into `document`
    pub fn new(generation: RenderGeneration, document: SharedDocument) -> Self {
        Self {
            generation,
            document,
            next_id: AtomicU64::new(1),
            discovery: Mutex::new(Vec::new()),
            unmount: Mutex::new(Vec::new()),
            rendered: Mutex::new(AHashMap::new()),
        }
    }

    /// The document units render into
    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Create a unit with a fresh debug id in this generation's slot
    pub fn define_unit(&self, name: impl Into<String>) -> Arc<Unit> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let internals = match self.generation {
            RenderGeneration::Stack => Internals {
                stack_debug_id: Some(id),
                fiber_debug_id: None,
            },
            RenderGeneration::Fiber => Internals {
                stack_debug_id: None,
                fiber_debug_id: Some(id),
            },
        };
        self.rendered.lock().insert(id, Rendered::default());
        Unit::new(name, internals)
    }

    /// Create an element owned by `owner` and announce it to discovery hooks
    pub fn create_element(&self, tag: &str, owner: Option<&Arc<Unit>>) -> CreatedElement {
        let owner = owner.cloned();
        let element = match self.generation {
            RenderGeneration::Stack => CreatedElement {
                tag: tag.to_string(),
                owner_instance: owner,
                owner_state_node: None,
            },
            RenderGeneration::Fiber => CreatedElement {
                tag: tag.to_string(),
                owner_instance: None,
                owner_state_node: owner,
            },
        };

        let hooks: Vec<DiscoveryHook> = self.discovery.lock().iter().map(|(_, h)| h.clone()).collect();
        for hook in hooks {
            hook(&element);
        }
        element
    }

    /// Render `unit` as `spec` under `parent`, then run its mount hook
    pub fn mount(&self, unit: &Arc<Unit>, parent: NodeId, spec: &ElementSpec) -> dom::Result<NodeId> {
        self.render_elements(unit, spec);
        let root = self.document.write().instantiate(parent, spec)?;
        self.set_rendered(unit, Some(root));
        trace!(unit = unit.name(), %root, "mounted");
        unit.invoke(DID_MOUNT);
        Ok(root)
    }

    /// Mount a unit that renders nothing
    pub fn mount_empty(&self, unit: &Arc<Unit>) {
        self.set_rendered(unit, None);
        unit.invoke(DID_MOUNT);
    }

    /// Re-render `unit` without changing its DOM, then run its update hook
    pub fn update(&self, unit: &Arc<Unit>) -> dom::Result<()> {
        self.update_with(unit, |_, _| Ok(()))
    }

    /// Re-render `unit`, letting `edit` mutate its subtree first
    ///
    /// `edit` receives the document and the unit's root node; it is not
    /// called for units that rendered nothing.
    pub fn update_with<F>(&self, unit: &Arc<Unit>, edit: F) -> dom::Result<()>
    where
        F: FnOnce(&mut Document, NodeId) -> dom::Result<()>,
    {
        if let Some(root) = self.root_of(unit) {
            let tag = self.document.read().node_name(root).unwrap_or("div").to_string();
            self.create_element(&tag, Some(unit));
            let mut doc = self.document.write();
            edit(&mut doc, root)?;
        }
        unit.invoke(DID_UPDATE);
        Ok(())
    }

    /// Announce the unmount, then remove the unit's DOM
    pub fn unmount(&self, unit: &Arc<Unit>) -> dom::Result<()> {
        let hooks: Vec<UnmountHook> = self.unmount.lock().iter().map(|(_, h)| h.clone()).collect();
        for hook in hooks {
            hook(unit);
        }

        let root = self.key(unit).and_then(|key| {
            let mut rendered = self.rendered.lock();
            let entry = rendered.get_mut(&key)?;
            entry.mounted = false;
            entry.root.take()
        });
        if let Some(root) = root {
            self.document.write().remove(root)?;
        }
        trace!(unit = unit.name(), "unmounted");
        Ok(())
    }

    /// Make every later `find_dom_node` for `unit` fail with `message`
    pub fn fail_render(&self, unit: &Unit, message: impl Into<String>) {
        if let Some(key) = self.key(unit) {
            self.rendered.lock().entry(key).or_default().failure = Some(message.into());
        }
    }

    /// Root node of a mounted unit
    pub fn root_of(&self, unit: &Unit) -> Option<NodeId> {
        let key = self.key(unit)?;
        self.rendered.lock().get(&key).and_then(|r| r.root)
    }

    /// Registered discovery hooks
    pub fn discovery_hooks(&self) -> usize {
        self.discovery.lock().len()
    }

    fn key(&self, unit: &Unit) -> Option<UnitId> {
        let internals = unit.internals();
        match self.generation {
            RenderGeneration::Stack => internals.stack_debug_id,
            RenderGeneration::Fiber => internals.fiber_debug_id,
        }
    }

    fn set_rendered(&self, unit: &Unit, root: Option<NodeId>) {
        if let Some(key) = self.key(unit) {
            let mut rendered = self.rendered.lock();
            let entry = rendered.entry(key).or_default();
            entry.root = root;
            entry.mounted = true;
        }
    }

    /// Announce every element of `spec` as created by `owner`
    fn render_elements(&self, owner: &Arc<Unit>, spec: &ElementSpec) {
        self.create_element(&spec.tag, Some(owner));
        for child in &spec.children {
            self.render_elements(owner, child);
        }
    }

    fn next_hook_id(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl UiLibrary for VirtualHost {
    fn generation(&self) -> RenderGeneration {
        self.generation
    }

    fn add_discovery_hook(&self, hook: DiscoveryHook) -> HookId {
        let id = self.next_hook_id();
        self.discovery.lock().push((id, hook));
        id
    }

    fn remove_discovery_hook(&self, id: HookId) {
        self.discovery.lock().retain(|(hook_id, _)| *hook_id != id);
    }

    fn add_unmount_hook(&self, hook: UnmountHook) -> Option<HookId> {
        let id = self.next_hook_id();
        self.unmount.lock().push((id, hook));
        Some(id)
    }

    fn remove_unmount_hook(&self, id: HookId) {
        self.unmount.lock().retain(|(hook_id, _)| *hook_id != id);
    }
}

impl DomRenderer for VirtualHost {
    fn find_dom_node(&self, unit: &Unit) -> Result<Option<NodeId>, RenderError> {
        let unmounted = || RenderError::Unmounted(unit.name().to_string());
        let key = self.key(unit).ok_or_else(unmounted)?;
        let rendered = self.rendered.lock();
        let entry = rendered.get(&key).ok_or_else(unmounted)?;

        if let Some(message) = &entry.failure {
            return Err(RenderError::Host(message.clone()));
        }
        if !entry.mounted {
            return Err(unmounted());
        }
        Ok(entry.root)
    }
}

impl std::fmt::Debug for VirtualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualHost")
            .field("generation", &self.generation)
            .field("units", &self.rendered.lock().len())
            .finish()
    }
}
