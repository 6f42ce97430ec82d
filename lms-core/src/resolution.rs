//! Tenant resolution from request headers.
//!
//! A request names its tenant through one of three headers, checked in
//! this order:
//!
//! 1. `X-Tenant-ID`: the tenant id itself
//! 2. `X-Tenant-Subdomain`: subdomain label the request arrived on
//! 3. `X-Tenant-Custom-Domain`: custom domain the request arrived on
//!
//! Header names match case-insensitively; blank values are ignored. A
//! tenant header that is present but not valid UTF-8 fails resolution
//! outright instead of counting as absent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::{LmsConfigSnapshot, DEFAULT_TENANT_KEY, REQUIRE_HEADER_KEY};
use crate::errors::TenantError;
use crate::tenant::{Tenant, TenantContext, TenantId};

pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";
pub const TENANT_SUBDOMAIN_HEADER: &str = "X-Tenant-Subdomain";
pub const TENANT_CUSTOM_DOMAIN_HEADER: &str = "X-Tenant-Custom-Domain";

/// What a request said about its tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantLookup {
    Id(TenantId),
    Subdomain(String),
    CustomDomain(String),
}

fn tenant_header(name: &str) -> Option<&'static str> {
    [TENANT_ID_HEADER, TENANT_SUBDOMAIN_HEADER, TENANT_CUSTOM_DOMAIN_HEADER]
        .into_iter()
        .find(|h| name.eq_ignore_ascii_case(h))
}

impl TenantLookup {
    /// Like [`TenantLookup::from_headers`], over raw header bytes.
    ///
    /// Tenant header values must be UTF-8; anything else is
    /// [`TenantError::InvalidHeader`]. Other headers are not inspected.
    pub fn from_header_bytes<'a, I>(headers: I) -> Result<Option<Self>, TenantError>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut decoded: Vec<(&str, &str)> = Vec::new();
        for (name, value) in headers {
            let Some(header) = tenant_header(name) else {
                continue;
            };
            let value = std::str::from_utf8(value).map_err(|_| {
                tracing::debug!(header, "tenant header is not valid UTF-8");
                TenantError::InvalidHeader(header)
            })?;
            decoded.push((header, value));
        }
        Ok(Self::from_headers(decoded))
    }

    /// Pick the highest-precedence tenant header out of `headers`.
    pub fn from_headers<'a, I>(headers: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut id = None;
        let mut subdomain = None;
        let mut domain = None;

        for (name, value) in headers {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case(TENANT_ID_HEADER) {
                id.get_or_insert(value);
            } else if name.eq_ignore_ascii_case(TENANT_SUBDOMAIN_HEADER) {
                subdomain.get_or_insert(value);
            } else if name.eq_ignore_ascii_case(TENANT_CUSTOM_DOMAIN_HEADER) {
                domain.get_or_insert(value);
            }
        }

        if let Some(id) = id.and_then(|v| TenantId::new(v).ok()) {
            return Some(TenantLookup::Id(id));
        }
        if let Some(sub) = subdomain {
            return Some(TenantLookup::Subdomain(sub.to_ascii_lowercase()));
        }
        domain.map(|d| TenantLookup::CustomDomain(normalize_domain(d)))
    }

    /// The header this lookup is read from.
    pub fn header_name(&self) -> &'static str {
        match self {
            TenantLookup::Id(_) => TENANT_ID_HEADER,
            TenantLookup::Subdomain(_) => TENANT_SUBDOMAIN_HEADER,
            TenantLookup::CustomDomain(_) => TENANT_CUSTOM_DOMAIN_HEADER,
        }
    }
}

impl fmt::Display for TenantLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantLookup::Id(id) => write!(f, "id '{id}'"),
            TenantLookup::Subdomain(s) => write!(f, "subdomain '{s}'"),
            TenantLookup::CustomDomain(d) => write!(f, "custom domain '{d}'"),
        }
    }
}

/// Lowercase, strip a trailing dot and any `:port`.
fn normalize_domain(raw: &str) -> String {
    let host = raw.rsplit_once(':').map_or(raw, |(host, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) {
            host
        } else {
            raw
        }
    });
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Where tenants are looked up.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn by_id(&self, id: &TenantId) -> Result<Option<Tenant>, TenantError>;

    async fn by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, TenantError>;

    async fn by_custom_domain(&self, domain: &str) -> Result<Option<Tenant>, TenantError>;

    async fn lookup(&self, lookup: &TenantLookup) -> Result<Option<Tenant>, TenantError> {
        match lookup {
            TenantLookup::Id(id) => self.by_id(id).await,
            TenantLookup::Subdomain(s) => self.by_subdomain(s).await,
            TenantLookup::CustomDomain(d) => self.by_custom_domain(d).await,
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    tenants: HashMap<TenantId, Tenant>,
    subdomains: HashMap<String, TenantId>,
    custom_domains: HashMap<String, TenantId>,
}

impl Registry {
    fn check_free(
        index: &HashMap<String, TenantId>,
        domain: Option<&String>,
        id: &TenantId,
    ) -> Result<(), TenantError> {
        let Some(domain) = domain else {
            return Ok(());
        };
        match index.get(&domain.to_ascii_lowercase()) {
            Some(owner) if owner != id => Err(TenantError::DomainTaken {
                domain: domain.clone(),
                owner: owner.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn link(&mut self, tenant: &Tenant) {
        if let Some(s) = &tenant.subdomain {
            self.subdomains.insert(s.to_ascii_lowercase(), tenant.id.clone());
        }
        if let Some(d) = &tenant.custom_domain {
            self.custom_domains.insert(d.to_ascii_lowercase(), tenant.id.clone());
        }
    }

    fn unlink(&mut self, tenant: &Tenant) {
        if let Some(s) = &tenant.subdomain {
            self.subdomains.remove(&s.to_ascii_lowercase());
        }
        if let Some(d) = &tenant.custom_domain {
            self.custom_domains.remove(&d.to_ascii_lowercase());
        }
    }

    fn via(&self, index: &HashMap<String, TenantId>, key: &str) -> Option<Tenant> {
        index
            .get(&key.to_ascii_lowercase())
            .and_then(|id| self.tenants.get(id))
            .cloned()
    }
}

/// In-memory tenant directory.
///
/// A subdomain or custom domain belongs to at most one tenant.
#[derive(Debug, Default)]
pub struct MemoryTenantDirectory {
    registry: RwLock<Registry>,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants<I: IntoIterator<Item = Tenant>>(tenants: I) -> Result<Self, TenantError> {
        let dir = Self::new();
        for t in tenants {
            dir.insert(t)?;
        }
        Ok(dir)
    }

    /// Insert or replace a tenant.
    ///
    /// Fails with [`TenantError::DomainTaken`] when another tenant already
    /// owns its subdomain or custom domain; the directory is left as it was.
    pub fn insert(&self, tenant: Tenant) -> Result<(), TenantError> {
        let mut reg = self.registry.write();
        Registry::check_free(&reg.subdomains, tenant.subdomain.as_ref(), &tenant.id)?;
        Registry::check_free(&reg.custom_domains, tenant.custom_domain.as_ref(), &tenant.id)?;

        if let Some(previous) = reg.tenants.remove(&tenant.id) {
            reg.unlink(&previous);
        }
        reg.link(&tenant);
        reg.tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    pub fn remove(&self, id: &TenantId) -> Option<Tenant> {
        let mut reg = self.registry.write();
        let removed = reg.tenants.remove(id);
        if let Some(tenant) = &removed {
            reg.unlink(tenant);
        }
        removed
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn by_id(&self, id: &TenantId) -> Result<Option<Tenant>, TenantError> {
        Ok(self.registry.read().tenants.get(id).cloned())
    }

    async fn by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, TenantError> {
        let reg = self.registry.read();
        Ok(reg.via(&reg.subdomains, subdomain))
    }

    async fn by_custom_domain(&self, domain: &str) -> Result<Option<Tenant>, TenantError> {
        let reg = self.registry.read();
        Ok(reg.via(&reg.custom_domains, domain))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Used when a request carries no tenant header.
    pub default_tenant: Option<TenantId>,
    /// Disables the default-tenant fallback.
    pub require_header: bool,
}

impl ResolverOptions {
    pub fn from_config(config: &LmsConfigSnapshot) -> Self {
        Self {
            default_tenant: config
                .get(DEFAULT_TENANT_KEY)
                .and_then(|v| TenantId::new(v).ok()),
            require_header: config.get_bool(REQUIRE_HEADER_KEY).unwrap_or(false),
        }
    }
}

/// Turns request headers into a [`TenantContext`].
#[derive(Clone)]
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    options: ResolverOptions,
}

impl fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self::with_options(directory, ResolverOptions::default())
    }

    pub fn with_options(directory: Arc<dyn TenantDirectory>, options: ResolverOptions) -> Self {
        Self { directory, options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve the tenant named by `lookup`, or the configured default
    /// tenant when the request named none.
    pub async fn resolve(&self, lookup: Option<TenantLookup>) -> Result<TenantContext, TenantError> {
        let lookup = match lookup {
            Some(l) => l,
            None => match (&self.options.default_tenant, self.options.require_header) {
                (Some(default), false) => {
                    tracing::trace!(tenant = %default, "no tenant header, using default tenant");
                    TenantLookup::Id(default.clone())
                }
                _ => {
                    tracing::debug!("request carries no tenant header");
                    return Err(TenantError::Missing);
                }
            },
        };

        let tenant = self
            .directory
            .lookup(&lookup)
            .await?
            .ok_or_else(|| {
                tracing::debug!(header = lookup.header_name(), "unknown tenant: {lookup}");
                TenantError::Unknown(lookup.to_string())
            })?;

        let ctx = TenantContext::new(tenant)?;
        tracing::trace!(tenant = %ctx.tenant_id(), via = lookup.header_name(), "tenant resolved");
        Ok(ctx)
    }

    /// Shorthand for [`TenantLookup::from_headers`] followed by [`TenantResolver::resolve`].
    pub async fn resolve_headers<'a, I>(&self, headers: I) -> Result<TenantContext, TenantError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let lookup = TenantLookup::from_headers(headers);
        self.resolve(lookup).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_header_wins_over_domain_headers() {
        let lookup = TenantLookup::from_headers([
            ("x-tenant-custom-domain", "learn.acme.com"),
            ("X-TENANT-SUBDOMAIN", "acme"),
            ("x-tenant-id", "acme-id"),
        ]);
        assert_eq!(
            lookup,
            Some(TenantLookup::Id(TenantId::new("acme-id").unwrap()))
        );
    }

    #[test]
    fn blank_headers_fall_through() {
        let lookup = TenantLookup::from_headers([
            ("x-tenant-id", "  "),
            ("x-tenant-subdomain", "ACME"),
        ]);
        assert_eq!(lookup, Some(TenantLookup::Subdomain("acme".into())));

        assert_eq!(TenantLookup::from_headers([("accept", "*/*")]), None);
    }

    #[test]
    fn custom_domains_are_normalized() {
        assert_eq!(normalize_domain("Learn.Acme.com:443"), "learn.acme.com");
        assert_eq!(normalize_domain("learn.acme.com."), "learn.acme.com");
        assert_eq!(normalize_domain("learn.acme.com"), "learn.acme.com");
    }

    #[test]
    fn undecodable_tenant_header_is_an_error_not_an_absence() {
        let err = TenantLookup::from_header_bytes([
            ("accept", &b"*/*"[..]),
            ("x-tenant-id", &[0x63, 0x61, 0xff][..]),
        ])
        .unwrap_err();
        assert_eq!(err, TenantError::InvalidHeader(TENANT_ID_HEADER));

        // Non-ASCII UTF-8 is a perfectly good tenant id.
        let lookup = TenantLookup::from_header_bytes([("X-Tenant-ID", "café".as_bytes())]);
        assert_eq!(
            lookup,
            Ok(Some(TenantLookup::Id(TenantId::new("café").unwrap())))
        );

        // Undecodable non-tenant headers are ignored.
        let lookup = TenantLookup::from_header_bytes([
            ("x-custom", &[0xff][..]),
            ("x-tenant-subdomain", &b"acme"[..]),
        ]);
        assert_eq!(lookup, Ok(Some(TenantLookup::Subdomain("acme".into()))));
    }

    fn tid(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[tokio::test]
    async fn a_domain_belongs_to_one_tenant() {
        let dir = MemoryTenantDirectory::new();
        dir.insert(Tenant::new(tid("acme"), "Acme").with_subdomain("shared")).unwrap();

        let err = dir
            .insert(Tenant::new(tid("globex"), "Globex").with_subdomain("Shared"))
            .unwrap_err();
        assert_eq!(
            err,
            TenantError::DomainTaken {
                domain: "shared".into(),
                owner: tid("acme"),
            }
        );
        assert!(dir.by_id(&tid("globex")).await.unwrap().is_none());

        let owner = dir.by_subdomain("shared").await.unwrap().unwrap();
        assert_eq!(owner.id, tid("acme"));

        dir.insert(Tenant::new(tid("acme"), "Acme").with_custom_domain("learn.acme.com")).unwrap();
        let err = dir
            .insert(Tenant::new(tid("globex"), "Globex").with_custom_domain("learn.acme.com"))
            .unwrap_err();
        assert!(matches!(err, TenantError::DomainTaken { .. }));
    }

    #[tokio::test]
    async fn replacing_or_removing_a_tenant_frees_its_domains() {
        let dir = MemoryTenantDirectory::new();
        dir.insert(Tenant::new(tid("acme"), "Acme").with_subdomain("acme")).unwrap();

        // Re-inserting with the same subdomain is not a conflict with itself.
        dir.insert(Tenant::new(tid("acme"), "Acme U").with_subdomain("acme")).unwrap();
        dir.insert(Tenant::new(tid("acme"), "Acme U").with_subdomain("acme-u")).unwrap();
        assert!(dir.by_subdomain("acme").await.unwrap().is_none());

        assert!(dir.remove(&tid("acme")).is_some());
        assert!(dir.by_subdomain("acme-u").await.unwrap().is_none());
        dir.insert(Tenant::new(tid("globex"), "Globex").with_subdomain("acme-u")).unwrap();
    }

    #[test]
    fn header_names_are_fixed() {
        assert_eq!(TENANT_ID_HEADER, "X-Tenant-ID");
        assert_eq!(TENANT_SUBDOMAIN_HEADER, "X-Tenant-Subdomain");
        assert_eq!(TENANT_CUSTOM_DOMAIN_HEADER, "X-Tenant-Custom-Domain");
    }
}
