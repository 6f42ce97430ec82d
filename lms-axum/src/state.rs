use std::marker::PhantomData;
use std::sync::Arc;

use lms_core::{Entity, Repository};

/// Router state for one repository's REST routes.
pub struct RepositoryState<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    pub repo: Arc<R>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R> Clone for RepositoryState<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            _entity: PhantomData,
        }
    }
}

impl<T, R> RepositoryState<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }
}
