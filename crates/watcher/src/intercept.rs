//! Method interception with reversible patches
//!
//! `Interceptor::intercept` wraps a named method on a patchable object so a
//! callback runs right after the original. Every patch records how to undo
//! itself; `restore_all` replays those undo steps in registration order.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A patchable method slot: invoked with the object it lives on
pub type Method<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Objects whose methods can be replaced at runtime
pub trait Patchable: Send + Sync + 'static {
    /// Current implementation of `name`, if any
    fn method(&self, name: &str) -> Option<Method<Self>>;

    /// Install `method` under `name`
    fn set_method(&self, name: &str, method: Method<Self>);

    /// Delete `name` entirely
    fn remove_method(&self, name: &str);
}

/// Named method slots, for implementing [`Patchable`]
pub struct MethodTable<T: ?Sized> {
    slots: Mutex<AHashMap<String, Method<T>>>,
}

impl<T: ?Sized> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(AHashMap::new()),
        }
    }
}

impl<T: ?Sized> MethodTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a method
    pub fn get(&self, name: &str) -> Option<Method<T>> {
        self.slots.lock().get(name).cloned()
    }

    /// Install a method, replacing any previous one
    pub fn set(&self, name: &str, method: Method<T>) {
        self.slots.lock().insert(name.to_string(), method);
    }

    /// Delete a method
    pub fn remove(&self, name: &str) {
        self.slots.lock().remove(name);
    }

    /// Whether a method is installed under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.slots.lock().contains_key(name)
    }
}

type Restore = Box<dyn FnOnce() + Send>;

/// Records reversible method patches
#[derive(Default)]
pub struct Interceptor {
    restorers: Mutex<Vec<Restore>>,
}

impl Interceptor {
    /// Create an interceptor with nothing recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `callback(target)` run after every call to `target.name`
    ///
    /// When `name` is not defined the callback takes its place. The wrapper
    /// returns nothing to its caller. The undo step holds the target weakly,
    /// so a dropped target is simply skipped on restore.
    pub fn intercept<T, F>(&self, target: &Arc<T>, name: &str, callback: F)
    where
        T: Patchable,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let original = target.method(name);
        let wrapped: Method<T> = match original.clone() {
            Some(original) => Arc::new(move |this: &T| {
                original(this);
                callback(this);
            }),
            None => Arc::new(move |this: &T| callback(this)),
        };
        target.set_method(name, wrapped);

        let weak = Arc::downgrade(target);
        let name = name.to_string();
        debug!(method = %name, had_original = original.is_some(), "intercepted method");

        self.restorers.lock().push(Box::new(move || {
            let Some(target) = weak.upgrade() else {
                return;
            };
            match original {
                Some(original) => target.set_method(&name, original),
                None => target.remove_method(&name),
            }
        }));
    }

    /// Undo every recorded patch, oldest first, and forget them
    ///
    /// Returns how many patches were undone.
    pub fn restore_all(&self) -> usize {
        let restorers = std::mem::take(&mut *self.restorers.lock());
        let count = restorers.len();
        for restore in restorers {
            restore();
        }
        debug!(count, "restored intercepted methods");
        count
    }

    /// Number of patches awaiting restoration
    pub fn len(&self) -> usize {
        self.restorers.lock().len()
    }

    /// Whether no patches are recorded
    pub fn is_empty(&self) -> bool {
        self.restorers.lock().is_empty()
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor").field("patches", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Widget {
        methods: MethodTable<Widget>,
        log: Mutex<Vec<String>>,
    }

    impl Widget {
        fn call(&self, name: &str) {
            if let Some(method) = self.methods.get(name) {
                method(self);
            }
        }

        fn push(&self, entry: &str) {
            self.log.lock().push(entry.to_string());
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    impl Patchable for Widget {
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

    #[test]
    fn test_callback_runs_after_original() {
        let widget = Arc::new(Widget::default());
        widget.set_method("render", Arc::new(|w: &Widget| w.push("original")));

        let interceptor = Interceptor::new();
        interceptor.intercept(&widget, "render", |w: &Widget| w.push("after"));

        widget.call("render");
        assert_eq!(widget.log(), vec!["original", "after"]);
    }

    #[test]
    fn test_missing_method_is_created() {
        let widget = Arc::new(Widget::default());
        let interceptor = Interceptor::new();
        interceptor.intercept(&widget, "mounted", |w: &Widget| w.push("after"));

        widget.call("mounted");
        assert_eq!(widget.log(), vec!["after"]);
    }

    #[test]
    fn test_restore_reinstates_original() {
        let widget = Arc::new(Widget::default());
        widget.set_method("render", Arc::new(|w: &Widget| w.push("original")));

        let interceptor = Interceptor::new();
        interceptor.intercept(&widget, "render", |w: &Widget| w.push("after"));
        assert_eq!(interceptor.restore_all(), 1);

        widget.call("render");
        assert_eq!(widget.log(), vec!["original"]);
        assert!(interceptor.is_empty());
    }

    #[test]
    fn test_restore_deletes_added_method() {
        let widget = Arc::new(Widget::default());
        let interceptor = Interceptor::new();
        interceptor.intercept(&widget, "mounted", |w: &Widget| w.push("after"));
        interceptor.restore_all();

        assert!(!widget.methods.contains("mounted"));
    }

    #[test]
    fn test_stacked_patches_unwind_in_registration_order() {
        let widget = Arc::new(Widget::default());
        let interceptor = Interceptor::new();
        interceptor.intercept(&widget, "update", |w: &Widget| w.push("first"));
        interceptor.intercept(&widget, "update", |w: &Widget| w.push("second"));

        widget.call("update");
        assert_eq!(widget.log(), vec!["first", "second"]);

        // The first undo deletes the slot, the second puts back the
        // first wrapper it had captured
        assert_eq!(interceptor.restore_all(), 2);
        widget.call("update");
        assert_eq!(widget.log(), vec!["first", "second", "first"]);
    }

    #[test]
    fn test_restore_skips_dropped_targets() {
        let interceptor = Interceptor::new();
        {
            let widget = Arc::new(Widget::default());
            interceptor.intercept(&widget, "render", |_: &Widget| {});
        }
        assert_eq!(interceptor.restore_all(), 1);
    }
}
