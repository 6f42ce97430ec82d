//! Core multi-tenant types for the LMS backend.

use std::fmt;

use crate::errors::TenantError;

/// A tenant identifier.
///
/// Always non-empty: the only way to build one is through [`TenantId::new`]
/// (or the `TryFrom` impls), which rejects blank input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct TenantId(String);

impl TenantId {
    pub fn new<S: Into<String>>(id: S) -> Result<Self, TenantError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(TenantError::Missing);
        }
        if trimmed.len() == id.len() {
            Ok(Self(id))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl TryFrom<&str> for TenantId {
    type Error = TenantError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// Descriptor of a customer organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub status: TenantStatus,
    /// Subdomain label, e.g. `acme` for `acme.example-lms.com`.
    pub subdomain: Option<String>,
    /// Fully qualified custom domain, e.g. `learn.acme.com`.
    pub custom_domain: Option<String>,
}

impl Tenant {
    /// An active tenant with no domain routing.
    pub fn new(id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: TenantStatus::Active,
            subdomain: None,
            custom_domain: None,
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into().to_ascii_lowercase());
        self
    }

    pub fn with_custom_domain(mut self, domain: impl Into<String>) -> Self {
        self.custom_domain = Some(domain.into().to_ascii_lowercase());
        self
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// The tenant resolved for one unit of work.
///
/// Built once per request and read-only afterwards. There are no setters;
/// `tenant_id` always equals `tenant.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant: Tenant,
}

impl TenantContext {
    /// Fails for suspended tenants.
    pub fn new(tenant: Tenant) -> Result<Self, TenantError> {
        if !tenant.is_active() {
            return Err(TenantError::Suspended(tenant.id));
        }
        Ok(Self { tenant })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant.id
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Reject a tenant id that does not belong to this context.
    pub fn ensure_same(&self, claimed: &TenantId) -> Result<(), TenantError> {
        if claimed == self.tenant_id() {
            Ok(())
        } else {
            Err(TenantError::Mismatch {
                resolved: self.tenant_id().clone(),
                claimed: claimed.clone(),
            })
        }
    }
}
