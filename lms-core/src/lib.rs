//! lms-core: tenant-scoped data access for the LMS backend.
//!
//! Every read and write of a persisted entity names the tenant it runs
//! against. The pieces:
//!
//! - [`tenant`]: tenant ids, descriptors and the per-request [`TenantContext`]
//! - [`repository`]: the [`Repository`] contract over any [`Entity`]
//! - [`errors`] / [`classify`]: the closed error taxonomy and how backend
//!   failures are mapped onto it
//! - [`scope`]: a repository bound to one resolved tenant
//! - [`resolution`]: resolving the tenant from request headers
//! - [`memory`]: in-memory backend for development and tests

pub mod classify;
pub mod config;
pub mod errors;
#[cfg(feature = "tracing-basic")]
pub mod logging;
pub mod memory;
pub mod repository;
pub mod resolution;
pub mod scope;
pub mod tenant;

pub use classify::{BackendFailure, ClassifyError, SqlStateClassifier};
pub use config::{LmsConfig, LmsConfigSnapshot};
pub use errors::{
    DatabaseError, DatabaseErrorKind, LmsError, LmsResult, RepoResult, TenantError,
    CONSTRAINT_VIOLATION, DUPLICATE_ENTRY, ENTITY_NOT_FOUND,
};
pub use memory::MemoryRepository;
pub use repository::{Entity, Repository};
pub use resolution::{
    MemoryTenantDirectory, ResolverOptions, TenantDirectory, TenantLookup, TenantResolver,
    TENANT_CUSTOM_DOMAIN_HEADER, TENANT_ID_HEADER, TENANT_SUBDOMAIN_HEADER,
};
pub use scope::TenantScope;
pub use tenant::{Tenant, TenantContext, TenantId, TenantStatus};
