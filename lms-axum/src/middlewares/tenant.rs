use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use lms_core::{TenantContext, TenantError, TenantLookup, TenantResolver};

use crate::LmsAxumError;

/// Header values are raw bytes; a tenant header that isn't UTF-8 is
/// rejected rather than skipped, so it can't fall back to the default tenant.
fn lookup_from_headers(headers: &HeaderMap) -> Result<Option<TenantLookup>, TenantError> {
    TenantLookup::from_header_bytes(
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes())),
    )
}

/// Resolve the request's tenant and store the [`TenantContext`] in the
/// request extensions. Requests without a resolvable tenant never reach
/// the handler.
pub async fn resolve_tenant(
    State(resolver): State<Arc<TenantResolver>>,
    mut req: Request,
    next: Next,
) -> Result<Response, LmsAxumError> {
    let lookup = lookup_from_headers(req.headers())?;
    let ctx = resolver.resolve(lookup).await?;

    tracing::debug!(tenant = %ctx.tenant_id(), path = %req.uri().path(), "request tenant");
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// The tenant resolved by [`resolve_tenant`] for this request.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub TenantContext);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = LmsAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(CurrentTenant)
            .ok_or_else(|| {
                anyhow::anyhow!("tenant middleware is not installed on this route").into()
            })
    }
}
