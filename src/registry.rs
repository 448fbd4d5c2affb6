//! The process registry: name → handle, at most one registration per name.
//!
//! The registry owns every process record for the process's lifetime;
//! queue and workers hold non-owning clones of the `Arc`. Finished and
//! faulted processes are retained until program exit so listings and
//! reports can see them.

use crate::process::ProcessHandle;
use ahash::AHashMap;
use std::fmt;
use std::sync::Mutex;

/// Errors from registration.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A process with this name already exists; the registry is unchanged.
    DuplicateName(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateName(name) => {
                write!(f, "process name '{name}' already registered")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Thread-safe name → process mapping.
#[derive(Default)]
pub struct ProcessRegistry {
    inner: Mutex<AHashMap<String, ProcessHandle>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process under its name. Fails with
    /// [`RegistryError::DuplicateName`] without mutating anything if the
    /// name is taken.
    pub fn register(&self, handle: ProcessHandle) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        if inner.contains_key(handle.name()) {
            return Err(RegistryError::DuplicateName(handle.name().to_string()));
        }
        inner.insert(handle.name().to_string(), handle);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<ProcessHandle> {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .contains_key(name)
    }

    /// Consistent copy of every handle, sorted by process id (creation
    /// order), suitable for listings and reports.
    pub fn snapshot(&self) -> Vec<ProcessHandle> {
        let mut handles: Vec<ProcessHandle> = self
            .inner
            .lock()
            .expect("registry mutex poisoned")
            .values()
            .cloned()
            .collect();
        handles.sort_by_key(|h| h.id());
        handles
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
