//! JSON file descriptor store

use super::{DescriptorStore, Descriptors};
use crate::descriptor::EnvironmentDescriptor;
use crate::errors::{Result, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// Store backed by a single pretty-printed JSON file.
///
/// Every operation re-reads the file and writes it back via a temp file and a
/// rename, so concurrent processes see last-write-wins semantics.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn load(&self) -> Result<Descriptors> {
        if !self.path.exists() {
            return Ok(Descriptors::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(Descriptors::default());
        }

        serde_json::from_str(&content).map_err(|source| {
            StoreError::Json {
                path: self.path.display().to_string(),
                source,
            }
            .into()
        })
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save(&self, descriptors: &Descriptors) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let content = serde_json::to_string_pretty(descriptors).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content).map_err(|e| self.io_error(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;

        debug!("Saved {} descriptors", descriptors.len());
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Descriptors) -> Result<T>) -> Result<T> {
        let _guard = self.lock();
        let mut descriptors = self.load()?;
        let out = f(&mut descriptors)?;
        self.save(&descriptors)?;
        Ok(out)
    }
}

impl DescriptorStore for JsonFileStore {
    fn insert(&self, descriptor: EnvironmentDescriptor) -> Result<EnvironmentDescriptor> {
        self.modify(|all| all.insert(descriptor))
    }

    fn get(&self, id: u64) -> Result<EnvironmentDescriptor> {
        let _guard = self.lock();
        self.load()?.get(id)
    }

    fn list(&self) -> Result<Vec<EnvironmentDescriptor>> {
        let _guard = self.lock();
        Ok(self.load()?.list())
    }

    fn update(&self, descriptor: &EnvironmentDescriptor) -> Result<EnvironmentDescriptor> {
        self.modify(|all| all.update(descriptor))
    }

    fn delete(&self, id: u64) -> Result<()> {
        self.modify(|all| all.delete(id))
    }
}
