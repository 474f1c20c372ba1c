//! Descriptor persistence
//!
//! A [`DescriptorStore`] keeps environment descriptors and their last known
//! runtime state. Both backends share [`Descriptors`], which runs the
//! pre-commit checks (field validation, `(name, owner)` uniqueness, derived
//! container-name syntax) and owns id and volume-name assignment.

use crate::descriptor::EnvironmentDescriptor;
use crate::errors::{Result, StoreError, ValidationError};
use crate::naming;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod disk;
mod memory;

pub use disk::JsonFileStore;
pub use memory::MemoryStore;

/// Persistent descriptor collection
pub trait DescriptorStore: Send + Sync {
    /// Validate and persist a new descriptor, returning it with id and volume name set
    fn insert(&self, descriptor: EnvironmentDescriptor) -> Result<EnvironmentDescriptor>;

    /// Load a descriptor by id
    fn get(&self, id: u64) -> Result<EnvironmentDescriptor>;

    /// All descriptors, newest first
    fn list(&self) -> Result<Vec<EnvironmentDescriptor>>;

    /// Validate and overwrite an existing descriptor (last write wins)
    fn update(&self, descriptor: &EnvironmentDescriptor) -> Result<EnvironmentDescriptor>;

    /// Remove a descriptor
    fn delete(&self, id: u64) -> Result<()>;

    /// Descriptors owned by `owner`, newest first
    fn list_for_owner(&self, owner: &str) -> Result<Vec<EnvironmentDescriptor>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|d| d.owner == owner)
            .collect())
    }
}

/// In-memory image of the store contents, serialized as-is by the file backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Descriptors {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    descriptors: Vec<EnvironmentDescriptor>,
}

impl Descriptors {
    fn check(&self, candidate: &EnvironmentDescriptor) -> std::result::Result<(), ValidationError> {
        candidate.validate()?;

        let duplicate = self.descriptors.iter().any(|d| {
            d.id != candidate.id && d.owner == candidate.owner && d.name == candidate.name
        });
        if duplicate {
            return Err(ValidationError::Duplicate {
                name: candidate.name.clone(),
                owner: candidate.owner.clone(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, mut descriptor: EnvironmentDescriptor) -> Result<EnvironmentDescriptor> {
        descriptor.id = 0;
        self.check(&descriptor)?;

        self.next_id += 1;
        descriptor.id = self.next_id;
        if descriptor.volume_name.is_empty() {
            descriptor.volume_name = naming::generate_volume_name(descriptor.environment_type);
        }

        debug!(
            descriptor_id = descriptor.id,
            volume = %descriptor.volume_name,
            "Inserted descriptor"
        );
        self.descriptors.push(descriptor.clone());
        Ok(descriptor)
    }

    pub fn get(&self, id: u64) -> Result<EnvironmentDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id }.into())
    }

    pub fn list(&self) -> Vec<EnvironmentDescriptor> {
        let mut all = self.descriptors.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    pub fn update(&mut self, descriptor: &EnvironmentDescriptor) -> Result<EnvironmentDescriptor> {
        self.check(descriptor)?;

        let slot = self
            .descriptors
            .iter_mut()
            .find(|d| d.id == descriptor.id)
            .ok_or(StoreError::NotFound { id: descriptor.id })?;

        let mut updated = descriptor.clone();
        if !slot.volume_name.is_empty() {
            updated.volume_name = slot.volume_name.clone();
        }
        updated.created_at = slot.created_at;
        *slot = updated.clone();

        debug!(descriptor_id = updated.id, "Updated descriptor");
        Ok(updated)
    }

    pub fn delete(&mut self, id: u64) -> Result<()> {
        let before = self.descriptors.len();
        self.descriptors.retain(|d| d.id != id);
        if self.descriptors.len() == before {
            return Err(StoreError::NotFound { id }.into());
        }
        debug!(descriptor_id = id, "Deleted descriptor");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorFields, EnvironmentType};
    use crate::errors::EnvHelperError;

    fn descriptor(owner: &str, name: &str) -> EnvironmentDescriptor {
        EnvironmentDescriptor::from_fields(
            owner,
            DescriptorFields {
                name: Some(name.to_string()),
                environment_type: Some(EnvironmentType::Vscode),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_assigns_id_and_volume_name() {
        let mut all = Descriptors::default();
        let first = all.insert(descriptor("alice", "a")).unwrap();
        let second = all.insert(descriptor("alice", "b")).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.volume_name.starts_with("env_helper_vscode_"));
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_name_unique_per_owner() {
        let mut all = Descriptors::default();
        all.insert(descriptor("alice", "dev")).unwrap();

        let err = all.insert(descriptor("alice", "dev")).unwrap_err();
        assert!(matches!(
            err,
            EnvHelperError::Validation(ValidationError::Duplicate { .. })
        ));

        // Same name for another owner is fine
        assert!(all.insert(descriptor("bob", "dev")).is_ok());
    }

    #[test]
    fn test_update_preserves_volume_name_and_created_at() {
        let mut all = Descriptors::default();
        let stored = all.insert(descriptor("alice", "dev")).unwrap();

        let mut changed = stored.clone();
        changed.volume_name = "something_else".to_string();
        changed.ports = "9000:9000".to_string();
        let updated = all.update(&changed).unwrap();

        assert_eq!(updated.volume_name, stored.volume_name);
        assert_eq!(updated.created_at, stored.created_at);
        assert_eq!(all.get(stored.id).unwrap().ports, "9000:9000");
    }

    #[test]
    fn test_update_rejects_rename_onto_existing() {
        let mut all = Descriptors::default();
        all.insert(descriptor("alice", "one")).unwrap();
        let mut two = all.insert(descriptor("alice", "two")).unwrap();

        two.name = "one".to_string();
        assert!(all.update(&two).is_err());
        assert_eq!(all.get(two.id).unwrap().name, "two");
    }

    #[test]
    fn test_update_and_delete_missing() {
        let mut all = Descriptors::default();
        let mut ghost = descriptor("alice", "ghost");
        ghost.id = 42;
        assert!(matches!(
            all.update(&ghost),
            Err(EnvHelperError::Store(StoreError::NotFound { id: 42 }))
        ));
        assert!(all.delete(42).is_err());
    }

    #[test]
    fn test_list_newest_first() {
        let mut all = Descriptors::default();
        let a = all.insert(descriptor("alice", "a")).unwrap();
        let b = all.insert(descriptor("alice", "b")).unwrap();
        let ids: Vec<u64> = all.list().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}
