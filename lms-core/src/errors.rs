//! # Errors
//!
//! Two families of failures cross the data-access boundary:
//!
//! - [`DatabaseError`]: a persistence failure, always classified into one
//!   of the three [`DatabaseErrorKind`]s. Backend-native error types never
//!   travel past a repository.
//! - [`TenantError`]: the unit of work has no usable tenant (missing,
//!   unknown, suspended) or tried to reach into another tenant.
//!
//! [`LmsError`] joins both for callers that deal with a resolved tenant
//! and a repository at once, and carries Feathers-style metadata
//! (status code, name, class name) that transports can serialize.

use std::fmt;

use thiserror::Error;

use crate::classify::{BackendFailure, ClassifyError};
use crate::tenant::TenantId;

/// Wire literal for [`DatabaseErrorKind::NotFound`].
pub const ENTITY_NOT_FOUND: &str = "ENTITY_NOT_FOUND";
/// Wire literal for [`DatabaseErrorKind::Duplicate`].
pub const DUPLICATE_ENTRY: &str = "DUPLICATE_ENTRY";
/// Wire literal for [`DatabaseErrorKind::Constraint`].
pub const CONSTRAINT_VIOLATION: &str = "CONSTRAINT_VIOLATION";

/// The closed set of persistence failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// The entity does not exist in the caller's tenant partition.
    NotFound,
    /// A tenant-scoped uniqueness constraint was violated.
    Duplicate,
    /// Any other tenant-scoped integrity constraint was violated.
    Constraint,
}

impl DatabaseErrorKind {
    /// The wire literal shared with the rest of the system.
    pub fn code(&self) -> &'static str {
        match self {
            DatabaseErrorKind::NotFound => ENTITY_NOT_FOUND,
            DatabaseErrorKind::Duplicate => DUPLICATE_ENTRY,
            DatabaseErrorKind::Constraint => CONSTRAINT_VIOLATION,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            DatabaseErrorKind::NotFound => 404,
            DatabaseErrorKind::Duplicate => 409,
            DatabaseErrorKind::Constraint => 422,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DatabaseErrorKind::NotFound => "NotFound",
            DatabaseErrorKind::Duplicate => "Conflict",
            DatabaseErrorKind::Constraint => "Unprocessable",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            DatabaseErrorKind::NotFound => "not-found",
            DatabaseErrorKind::Duplicate => "conflict",
            DatabaseErrorKind::Constraint => "unprocessable",
        }
    }
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result type for repository operations.
pub type RepoResult<T> = std::result::Result<T, DatabaseError>;

/// A classified persistence failure.
///
/// Holds only the kind and a message; the originating backend error is
/// rendered into the message and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl fmt::Display) -> Self {
        Self::new(
            DatabaseErrorKind::NotFound,
            format!("{entity} '{id}' not found"),
        )
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Duplicate, msg)
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Constraint, msg)
    }

    /// Reclassify a backend failure at the repository boundary.
    pub fn classify<C>(failure: &dyn BackendFailure, classifier: &C) -> Self
    where
        C: ClassifyError + ?Sized,
    {
        Self::new(classifier.classify(failure), failure.to_string())
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == DatabaseErrorKind::NotFound
    }
}

/// Failures establishing or honouring the tenant of a unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("tenant identifier is required")]
    Missing,

    #[error("tenant not found: {0}")]
    Unknown(String),

    #[error("tenant '{0}' is suspended")]
    Suspended(TenantId),

    #[error("tenant mismatch: request resolved to '{resolved}' but targeted '{claimed}'")]
    Mismatch { resolved: TenantId, claimed: TenantId },

    /// A tenant header was sent but its value is not valid UTF-8.
    #[error("{0} header is not valid UTF-8")]
    InvalidHeader(&'static str),

    /// Two tenants tried to claim the same subdomain or custom domain.
    #[error("{domain} is already assigned to tenant '{owner}'")]
    DomainTaken { domain: String, owner: TenantId },

    #[error("tenant directory unavailable: {0}")]
    Directory(String),
}

impl TenantError {
    pub fn code(&self) -> &'static str {
        match self {
            TenantError::Missing => "TENANT_REQUIRED",
            TenantError::Unknown(_) => "TENANT_NOT_FOUND",
            TenantError::Suspended(_) => "TENANT_SUSPENDED",
            TenantError::Mismatch { .. } => "TENANT_MISMATCH",
            TenantError::InvalidHeader(_) => "TENANT_HEADER_INVALID",
            TenantError::DomainTaken { .. } => "TENANT_DOMAIN_TAKEN",
            TenantError::Directory(_) => "TENANT_DIRECTORY_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            TenantError::Missing | TenantError::InvalidHeader(_) => 400,
            TenantError::Unknown(_) => 404,
            TenantError::Suspended(_) | TenantError::Mismatch { .. } => 403,
            TenantError::DomainTaken { .. } => 409,
            TenantError::Directory(_) => 503,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TenantError::Missing | TenantError::InvalidHeader(_) => "BadRequest",
            TenantError::Unknown(_) => "NotFound",
            TenantError::Suspended(_) | TenantError::Mismatch { .. } => "Forbidden",
            TenantError::DomainTaken { .. } => "Conflict",
            TenantError::Directory(_) => "Unavailable",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            TenantError::Missing | TenantError::InvalidHeader(_) => "bad-request",
            TenantError::Unknown(_) => "not-found",
            TenantError::Suspended(_) | TenantError::Mismatch { .. } => "forbidden",
            TenantError::DomainTaken { .. } => "conflict",
            TenantError::Directory(_) => "unavailable",
        }
    }
}

/// Result type for tenant-bound operations.
pub type LmsResult<T> = std::result::Result<T, LmsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LmsError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Tenant(#[from] TenantError),
}

impl LmsError {
    pub fn code(&self) -> &'static str {
        match self {
            LmsError::Database(e) => e.code(),
            LmsError::Tenant(e) => e.code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            LmsError::Database(e) => e.kind.status_code(),
            LmsError::Tenant(e) => e.status_code(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LmsError::Database(e) => e.kind.name(),
            LmsError::Tenant(e) => e.name(),
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            LmsError::Database(e) => e.kind.class_name(),
            LmsError::Tenant(e) => e.class_name(),
        }
    }

    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            LmsError::Database(e) => Some(e.kind),
            LmsError::Tenant(_) => None,
        }
    }
}

#[cfg(feature = "serde")]
impl LmsError {
    /// Feathers-ish JSON payload with the wire literal under `kind`.
    pub fn to_json(&self) -> serde_json::Value {
        let message = match self {
            LmsError::Database(e) => e.message.clone(),
            LmsError::Tenant(e) => e.to_string(),
        };

        serde_json::json!({
            "name": self.name(),
            "message": message,
            "code": self.status_code(),
            "className": self.class_name(),
            "kind": self.code(),
        })
    }
}
