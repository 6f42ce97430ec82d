use std::fmt::{Debug, Display};
use std::hash::Hash;

use async_trait::async_trait;

use crate::errors::RepoResult;
use crate::tenant::TenantId;

/// Anything persisted behind a [`Repository`]: it has an id.
///
/// Ids only need to be unique inside one tenant's partition; two tenants
/// may both own an entity with id `1`.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Ord + Hash + Display + Debug + Send + Sync + 'static;

    /// Entity name used in logs and error messages.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    /// Tenant-scoped uniqueness constraints beyond the id, as
    /// `(constraint name, value)` pairs.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Integrity checks; an `Err` is reported as a constraint violation.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Tenant-scoped data access for one entity type.
///
/// Every operation takes the tenant it runs against and never sees data
/// outside that tenant's partition:
///
/// - `find_by_id`: `None` when the id is absent *for that tenant*, even if
///   another tenant owns the same id
/// - `find_all`: only that tenant's entities
/// - `create`: `Duplicate` on an id or unique-key collision inside the
///   tenant, `Constraint` when [`Entity::check`] fails
/// - `update`: `NotFound` when the id is absent for that tenant,
///   `Constraint` when `data` carries a different id
/// - `delete`: `false` when already absent, never an error for that
///
/// Errors are always [`crate::DatabaseError`]; implementations reclassify
/// whatever their backend raises.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn find_by_id(&self, id: &T::Id, tenant_id: &TenantId) -> RepoResult<Option<T>>;

    async fn find_all(&self, tenant_id: &TenantId) -> RepoResult<Vec<T>>;

    async fn create(&self, data: T, tenant_id: &TenantId) -> RepoResult<T>;

    async fn update(&self, id: &T::Id, data: T, tenant_id: &TenantId) -> RepoResult<T>;

    async fn delete(&self, id: &T::Id, tenant_id: &TenantId) -> RepoResult<bool>;
}

#[async_trait]
impl<T, R> Repository<T> for std::sync::Arc<R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    async fn find_by_id(&self, id: &T::Id, tenant_id: &TenantId) -> RepoResult<Option<T>> {
        Repository::<T>::find_by_id(&**self, id, tenant_id).await
    }

    async fn find_all(&self, tenant_id: &TenantId) -> RepoResult<Vec<T>> {
        Repository::<T>::find_all(&**self, tenant_id).await
    }

    async fn create(&self, data: T, tenant_id: &TenantId) -> RepoResult<T> {
        Repository::<T>::create(&**self, data, tenant_id).await
    }

    async fn update(&self, id: &T::Id, data: T, tenant_id: &TenantId) -> RepoResult<T> {
        Repository::<T>::update(&**self, id, data, tenant_id).await
    }

    async fn delete(&self, id: &T::Id, tenant_id: &TenantId) -> RepoResult<bool> {
        Repository::<T>::delete(&**self, id, tenant_id).await
    }
}
