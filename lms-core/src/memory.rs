//! In-memory [`Repository`] backend for development and tests.
//!
//! Storage is partitioned `tenant -> id -> entity`. A lookup never leaves
//! the partition of the tenant it was asked for, so ids may repeat across
//! tenants. Failures are raised as [`StorageError`] and reclassified at the
//! repository boundary through the configured [`ClassifyError`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::classify::{
    BackendFailure, ClassifyError, SqlStateClassifier, CHECK_VIOLATION,
    INTEGRITY_CONSTRAINT_VIOLATION, NO_DATA, UNIQUE_VIOLATION,
};
use crate::errors::{DatabaseError, RepoResult};
use crate::repository::{Entity, Repository};
use crate::tenant::TenantId;

type UniqueKey = (&'static str, String);

/// Backend-native failures of the memory store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("{kind} '{id}' already exists")]
    PrimaryKeyConflict { kind: &'static str, id: String },

    #[error("{kind} with {constraint} '{value}' already exists")]
    UniqueConflict {
        kind: &'static str,
        constraint: &'static str,
        value: String,
    },

    #[error("{kind} '{id}' not found")]
    MissingRow { kind: &'static str, id: String },

    #[error("{kind} check failed: {reason}")]
    CheckFailed { kind: &'static str, reason: String },

    #[error("{kind} id cannot change from '{from}' to '{to}'")]
    KeyChange {
        kind: &'static str,
        from: String,
        to: String,
    },
}

impl BackendFailure for StorageError {
    fn sql_state(&self) -> Option<&str> {
        Some(match self {
            StorageError::PrimaryKeyConflict { .. } | StorageError::UniqueConflict { .. } => {
                UNIQUE_VIOLATION
            }
            StorageError::MissingRow { .. } => NO_DATA,
            StorageError::CheckFailed { .. } => CHECK_VIOLATION,
            StorageError::KeyChange { .. } => INTEGRITY_CONSTRAINT_VIOLATION,
        })
    }
}

struct Partition<T: Entity> {
    rows: BTreeMap<T::Id, T>,
    unique: HashMap<UniqueKey, T::Id>,
}

impl<T: Entity> Default for Partition<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            unique: HashMap::new(),
        }
    }
}

impl<T: Entity> Partition<T> {
    fn check(row: &T) -> Result<(), StorageError> {
        row.check().map_err(|reason| StorageError::CheckFailed {
            kind: T::KIND,
            reason,
        })
    }

    /// Unique keys of `row`, failing if another row of this partition
    /// already holds one of them.
    fn claim_keys(
        &self,
        row: &T,
        owner: Option<&T::Id>,
    ) -> Result<Vec<UniqueKey>, StorageError> {
        let keys = row.unique_keys();
        for key in &keys {
            if let Some(holder) = self.unique.get(key) {
                if Some(holder) != owner {
                    return Err(StorageError::UniqueConflict {
                        kind: T::KIND,
                        constraint: key.0,
                        value: key.1.clone(),
                    });
                }
            }
        }
        Ok(keys)
    }

    fn insert(&mut self, row: T) -> Result<T, StorageError> {
        if self.rows.contains_key(row.id()) {
            return Err(StorageError::PrimaryKeyConflict {
                kind: T::KIND,
                id: row.id().to_string(),
            });
        }
        Self::check(&row)?;
        let keys = self.claim_keys(&row, None)?;

        let id = row.id().clone();
        for key in keys {
            self.unique.insert(key, id.clone());
        }
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    fn replace(&mut self, id: &T::Id, row: T) -> Result<T, StorageError> {
        let existing = self.rows.get(id).ok_or_else(|| StorageError::MissingRow {
            kind: T::KIND,
            id: id.to_string(),
        })?;
        if row.id() != id {
            return Err(StorageError::KeyChange {
                kind: T::KIND,
                from: id.to_string(),
                to: row.id().to_string(),
            });
        }
        Self::check(&row)?;
        let keys = self.claim_keys(&row, Some(id))?;
        let stale = existing.unique_keys();

        for key in stale {
            self.unique.remove(&key);
        }
        for key in keys {
            self.unique.insert(key, id.clone());
        }
        self.rows.insert(id.clone(), row.clone());
        Ok(row)
    }

    fn remove(&mut self, id: &T::Id) -> Option<T> {
        let row = self.rows.remove(id)?;
        for key in row.unique_keys() {
            if self.unique.get(&key) == Some(id) {
                self.unique.remove(&key);
            }
        }
        Some(row)
    }
}

/// Tenant-partitioned in-memory repository.
///
/// Cloning shares the underlying storage.
pub struct MemoryRepository<T: Entity> {
    partitions: Arc<RwLock<HashMap<TenantId, Partition<T>>>>,
    classifier: Arc<dyn ClassifyError>,
}

impl<T: Entity> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            partitions: Arc::clone(&self.partitions),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<T: Entity> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::with_classifier(Arc::new(SqlStateClassifier))
    }

    pub fn with_classifier(classifier: Arc<dyn ClassifyError>) -> Self {
        Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
            classifier,
        }
    }

    /// Number of entities stored for `tenant_id`.
    pub fn count(&self, tenant_id: &TenantId) -> usize {
        self.partitions
            .read()
            .get(tenant_id)
            .map_or(0, |p| p.rows.len())
    }

    fn reclassify(
        &self,
        op: &'static str,
        tenant_id: &TenantId,
        err: StorageError,
    ) -> DatabaseError {
        let err = DatabaseError::classify(&err, self.classifier.as_ref());
        tracing::debug!(
            tenant = %tenant_id,
            entity = T::KIND,
            op,
            kind = %err.kind,
            "repository operation rejected: {}",
            err.message
        );
        err
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn find_by_id(&self, id: &T::Id, tenant_id: &TenantId) -> RepoResult<Option<T>> {
        let found = self
            .partitions
            .read()
            .get(tenant_id)
            .and_then(|p| p.rows.get(id).cloned());

        tracing::trace!(tenant = %tenant_id, entity = T::KIND, %id, hit = found.is_some(), "find_by_id");
        Ok(found)
    }

    async fn find_all(&self, tenant_id: &TenantId) -> RepoResult<Vec<T>> {
        let rows: Vec<T> = self
            .partitions
            .read()
            .get(tenant_id)
            .map(|p| p.rows.values().cloned().collect())
            .unwrap_or_default();

        tracing::trace!(tenant = %tenant_id, entity = T::KIND, count = rows.len(), "find_all");
        Ok(rows)
    }

    async fn create(&self, data: T, tenant_id: &TenantId) -> RepoResult<T> {
        let result = {
            let mut partitions = self.partitions.write();
            match partitions.get_mut(tenant_id) {
                Some(partition) => partition.insert(data),
                // a tenant's partition only exists once it holds a row
                None => {
                    let mut partition = Partition::default();
                    let inserted = partition.insert(data);
                    if inserted.is_ok() {
                        partitions.insert(tenant_id.clone(), partition);
                    }
                    inserted
                }
            }
        };

        match result {
            Ok(row) => {
                tracing::debug!(tenant = %tenant_id, entity = T::KIND, id = %row.id(), "created");
                Ok(row)
            }
            Err(e) => Err(self.reclassify("create", tenant_id, e)),
        }
    }

    async fn update(&self, id: &T::Id, data: T, tenant_id: &TenantId) -> RepoResult<T> {
        let result = {
            let mut partitions = self.partitions.write();
            match partitions.get_mut(tenant_id) {
                Some(partition) => partition.replace(id, data),
                None => Err(StorageError::MissingRow {
                    kind: T::KIND,
                    id: id.to_string(),
                }),
            }
        };

        match result {
            Ok(row) => {
                tracing::debug!(tenant = %tenant_id, entity = T::KIND, %id, "updated");
                Ok(row)
            }
            Err(e) => Err(self.reclassify("update", tenant_id, e)),
        }
    }

    async fn delete(&self, id: &T::Id, tenant_id: &TenantId) -> RepoResult<bool> {
        let removed = {
            let mut partitions = self.partitions.write();
            match partitions.get_mut(tenant_id) {
                Some(partition) => {
                    let removed = partition.remove(id).is_some();
                    if partition.rows.is_empty() {
                        partitions.remove(tenant_id);
                    }
                    removed
                }
                None => false,
            }
        };

        tracing::debug!(tenant = %tenant_id, entity = T::KIND, %id, removed, "delete");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseErrorKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        id: u32,
        slug: String,
    }

    impl Entity for Tag {
        type Id = u32;
        const KIND: &'static str = "Tag";

        fn id(&self) -> &u32 {
            &self.id
        }

        fn unique_keys(&self) -> Vec<(&'static str, String)> {
            vec![("slug", self.slug.clone())]
        }

        fn check(&self) -> Result<(), String> {
            if self.slug.is_empty() {
                return Err("slug is required".into());
            }
            Ok(())
        }
    }

    fn tag(id: u32, slug: &str) -> Tag {
        Tag {
            id,
            slug: slug.to_string(),
        }
    }

    #[test]
    fn storage_errors_report_sql_states() {
        let e = StorageError::MissingRow {
            kind: "Tag",
            id: "1".into(),
        };
        assert_eq!(e.sql_state(), Some(NO_DATA));
        assert_eq!(SqlStateClassifier.classify(&e), DatabaseErrorKind::NotFound);
    }

    #[test]
    fn replacing_a_row_releases_its_old_unique_keys() {
        let mut p: Partition<Tag> = Partition::default();
        p.insert(tag(1, "rust")).unwrap();
        p.replace(&1, tag(1, "go")).unwrap();

        // "rust" is free again
        p.insert(tag(2, "rust")).unwrap();
        assert!(matches!(
            p.insert(tag(3, "go")),
            Err(StorageError::UniqueConflict { constraint: "slug", .. })
        ));
    }

    #[test]
    fn removing_a_row_releases_its_unique_keys() {
        let mut p: Partition<Tag> = Partition::default();
        p.insert(tag(1, "rust")).unwrap();
        assert!(p.remove(&1).is_some());
        assert!(p.remove(&1).is_none());
        p.insert(tag(2, "rust")).unwrap();
    }

    #[test]
    fn a_row_keeps_its_own_unique_key_on_replace() {
        let mut p: Partition<Tag> = Partition::default();
        p.insert(tag(1, "rust")).unwrap();
        assert!(p.replace(&1, tag(1, "rust")).is_ok());
    }

    #[tokio::test]
    async fn rejected_writes_leave_no_empty_partitions() {
        let repo = MemoryRepository::<Tag>::new();
        let acme = TenantId::new("acme").unwrap();

        repo.create(tag(1, "rust"), &acme).await.unwrap();
        repo.create(tag(1, "dup"), &acme).await.unwrap_err();
        assert_eq!(repo.partitions.read().len(), 1);

        // a tenant whose first write fails never gets a partition
        let globex = TenantId::new("globex").unwrap();
        let err = repo.create(tag(2, ""), &globex).await.unwrap_err();
        assert_eq!(err.kind, DatabaseErrorKind::Constraint);
        assert_eq!(repo.partitions.read().len(), 1);
        assert_eq!(repo.count(&globex), 0);

        assert!(repo.delete(&1, &acme).await.unwrap());
        assert!(repo.partitions.read().is_empty());
        assert!(!repo.delete(&1, &acme).await.unwrap());
    }
}
