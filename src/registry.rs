//! Named handle registry.
//!
//! Handles are ordinary values owned by their caller. When several parts of a
//! process need the same connection, they share it through a registry keyed
//! by connection name; each handle sits behind its own mutex, so operations
//! on one connection never interleave.

use crate::core::db::connection::DatabaseHandle;
use crate::core::Result;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A handle shared between callers.
pub type SharedHandle = Arc<Mutex<DatabaseHandle>>;

static GLOBAL: OnceCell<HandleRegistry> = OnceCell::new();

#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: Mutex<HashMap<String, SharedHandle>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> &'static HandleRegistry {
        GLOBAL.get_or_init(HandleRegistry::new)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, SharedHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the handle registered under `name`, creating a disconnected
    /// one on first use. Every call with the same name yields the same handle.
    pub fn handle(&self, name: &str) -> SharedHandle {
        let mut entries = self.entries();
        let handle = entries.entry(name.to_string()).or_insert_with(|| {
            debug!(name, "Registering database handle");
            Arc::new(Mutex::new(DatabaseHandle::new()))
        });
        Arc::clone(handle)
    }

    pub fn get(&self, name: &str) -> Option<SharedHandle> {
        self.entries().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries().keys().cloned().collect();
        names.sort();
        names
    }

    /// Unregisters `name` and closes its connection.
    ///
    /// Returns `Ok(false)` when nothing was registered under `name`.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let removed = self.entries().remove(name);
        match removed {
            Some(handle) => {
                debug!(name, "Removing database handle");
                let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
                guard.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes every registered connection and empties the registry. The
    /// first close failure is returned after all handles were tried.
    pub fn close_all(&self) -> Result<()> {
        let drained: Vec<(String, SharedHandle)> = self.entries().drain().collect();
        let mut first_error = None;
        for (name, handle) in drained {
            let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = guard.close() {
                debug!(name = %name, error = %e, "Close failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connection::ConnectOptions;
    use std::thread;

    #[test]
    fn test_same_name_yields_same_handle() {
        let registry = HandleRegistry::new();
        let a = registry.handle("main");
        let b = registry.handle("main");
        let other = registry.handle("reporting");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.names(), vec!["main", "reporting"]);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = HandleRegistry::global().handle("registry-test-global");
        let b = HandleRegistry::global().handle("registry-test-global");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(std::ptr::eq(HandleRegistry::global(), HandleRegistry::global()));
        HandleRegistry::global().remove("registry-test-global").unwrap();
    }

    #[test]
    fn test_concurrent_lookup_creates_one_handle() {
        let registry = Arc::new(HandleRegistry::new());
        let handles: Vec<SharedHandle> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.handle("shared"))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_remove_closes_connection() {
        let registry = HandleRegistry::new();
        let shared = registry.handle("temp");
        shared.lock().unwrap().connect(&ConnectOptions::new(":memory:")).unwrap();

        assert!(registry.remove("temp").unwrap());
        assert!(!registry.contains("temp"));
        assert!(!shared.lock().unwrap().is_connected());
        assert!(!registry.remove("temp").unwrap());
    }

    #[test]
    fn test_close_all() {
        let registry = HandleRegistry::new();
        for name in ["a", "b"] {
            let shared = registry.handle(name);
            shared.lock().unwrap().connect(&ConnectOptions::new(":memory:")).unwrap();
        }
        registry.close_all().unwrap();
        assert!(registry.names().is_empty());
        assert!(registry.get("a").is_none());
    }
}
