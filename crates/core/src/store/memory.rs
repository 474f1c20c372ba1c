//! In-memory descriptor store

use super::{DescriptorStore, Descriptors};
use crate::descriptor::EnvironmentDescriptor;
use crate::errors::Result;
use std::sync::{Mutex, MutexGuard};

/// Process-local store, used by tests and one-shot tooling
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Descriptors>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Descriptors> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DescriptorStore for MemoryStore {
    fn insert(&self, descriptor: EnvironmentDescriptor) -> Result<EnvironmentDescriptor> {
        self.lock().insert(descriptor)
    }

    fn get(&self, id: u64) -> Result<EnvironmentDescriptor> {
        self.lock().get(id)
    }

    fn list(&self) -> Result<Vec<EnvironmentDescriptor>> {
        Ok(self.lock().list())
    }

    fn update(&self, descriptor: &EnvironmentDescriptor) -> Result<EnvironmentDescriptor> {
        self.lock().update(descriptor)
    }

    fn delete(&self, id: u64) -> Result<()> {
        self.lock().delete(id)
    }
}
