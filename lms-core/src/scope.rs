//! Binding a repository to the tenant of the current unit of work.
//!
//! A [`TenantScope`] takes its tenant id from the [`TenantContext`] and
//! never from the caller, so code holding a scope cannot address a
//! different tenant's partition by passing the wrong id.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::LmsResult;
use crate::repository::{Entity, Repository};
use crate::tenant::{TenantContext, TenantId};

pub struct TenantScope<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    ctx: TenantContext,
    repo: Arc<R>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R> Clone for TenantScope<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            repo: Arc::clone(&self.repo),
            _entity: PhantomData,
        }
    }
}

impl<T, R> TenantScope<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    pub fn new(ctx: TenantContext, repo: Arc<R>) -> Self {
        Self {
            ctx,
            repo,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }

    pub fn tenant_id(&self) -> &TenantId {
        self.ctx.tenant_id()
    }

    /// Reject a tenant id supplied by a caller (request body, job payload)
    /// that differs from the scope's tenant.
    pub fn authorize(&self, claimed: &TenantId) -> LmsResult<()> {
        self.ctx.ensure_same(claimed).map_err(|e| {
            tracing::warn!(
                resolved = %self.tenant_id(),
                %claimed,
                entity = T::KIND,
                "cross-tenant access rejected"
            );
            e.into()
        })
    }

    pub async fn find_by_id(&self, id: &T::Id) -> LmsResult<Option<T>> {
        Ok(Repository::<T>::find_by_id(&*self.repo, id, self.tenant_id()).await?)
    }

    pub async fn find_all(&self) -> LmsResult<Vec<T>> {
        Ok(Repository::<T>::find_all(&*self.repo, self.tenant_id()).await?)
    }

    pub async fn create(&self, data: T) -> LmsResult<T> {
        Ok(Repository::<T>::create(&*self.repo, data, self.tenant_id()).await?)
    }

    pub async fn update(&self, id: &T::Id, data: T) -> LmsResult<T> {
        Ok(Repository::<T>::update(&*self.repo, id, data, self.tenant_id()).await?)
    }

    pub async fn delete(&self, id: &T::Id) -> LmsResult<bool> {
        Ok(Repository::<T>::delete(&*self.repo, id, self.tenant_id()).await?)
    }
}
