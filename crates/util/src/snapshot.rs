//! Atomically swappable, read-mostly shared state.

use std::sync::{Arc, RwLock};

/// Holds an `Arc<T>` that readers clone and writers replace wholesale.
///
/// Readers never observe a partially updated value: [`SharedSnapshot::load`]
/// returns the snapshot that was current at the time of the call and keeps it
/// alive for as long as the caller needs it, even across a concurrent
/// [`SharedSnapshot::store`]. The lock is only held for the pointer copy.
#[derive(Debug)]
pub struct SharedSnapshot<T> {
    current: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for SharedSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T> SharedSnapshot<T> {
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(value: Arc<T>) -> Self {
        Self {
            current: Arc::new(RwLock::new(value)),
        }
    }

    /// Return the current snapshot.
    pub fn load(&self) -> Arc<T> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            // The guarded value is a plain pointer, so a poisoned lock still holds a valid snapshot.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the current snapshot and return the previous one.
    pub fn store(&self, value: Arc<T>) -> Arc<T> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, value)
    }

    /// Build a new snapshot from the current one and store it.
    ///
    /// The write lock is held while `update` runs so concurrent updates do not
    /// lose each other's changes; readers keep seeing the previous snapshot.
    pub fn update(&self, update: impl FnOnce(&T) -> T) -> Arc<T> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(update(&guard));
        *guard = Arc::clone(&next);
        next
    }
}
