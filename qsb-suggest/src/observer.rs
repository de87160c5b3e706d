//! Minimal publish/subscribe list for change notifications.
//!
//! Used by the corpus registry (corpus set changed) and by
//! [`Suggestions`](crate::Suggestions) (published results changed).

use std::sync::{Arc, Mutex};

/// Receives change notifications.
pub trait Observer: Send + Sync {
    /// Called after the observed object changed.
    fn on_changed(&self);
}

impl<F> Observer for F
where
    F: Fn() + Send + Sync,
{
    fn on_changed(&self) {
        self();
    }
}

/// A list of registered observers.
///
/// Notification snapshots the list first, so observers may register or
/// unregister (and read the observed object) from inside `on_changed`.
#[derive(Default)]
pub struct ObserverList {
    observers: Mutex<Vec<Arc<dyn Observer>>>,
}

impl ObserverList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. Registering the same observer twice is a no-op.
    pub fn register(&self, observer: Arc<dyn Observer>) {
        let mut observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Unregisters an observer. Returns whether it was registered.
    pub fn unregister(&self, observer: &Arc<dyn Observer>) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    /// Removes every observer.
    pub fn unregister_all(&self) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls [`Observer::on_changed`] on every registered observer.
    pub fn notify_changed(&self) {
        let snapshot: Vec<Arc<dyn Observer>> = self
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in snapshot {
            observer.on_changed();
        }
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.len())
            .finish()
    }
}
