use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use lms_core::config::{DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, HTTP_HOST_KEY, HTTP_PORT_KEY};
use lms_core::{
    Entity, LmsConfigSnapshot, Repository, ResolverOptions, TenantDirectory, TenantResolver,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::middlewares::resolve_tenant;
use crate::rest;

/// Builder for a tenant-aware axum application.
///
/// Every route mounted here runs behind [`resolve_tenant`], so handlers
/// can rely on [`crate::middlewares::CurrentTenant`].
#[derive(Clone)]
pub struct AxumApp {
    pub resolver: Arc<TenantResolver>,
    router: Router<()>,
}

impl AxumApp {
    pub fn new(resolver: TenantResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            router: Router::new(),
        }
    }

    /// Resolver options (`tenancy.*` keys) come from `config`.
    pub fn from_config(directory: Arc<dyn TenantDirectory>, config: &LmsConfigSnapshot) -> Self {
        let options = ResolverOptions::from_config(config);
        Self::new(TenantResolver::with_options(directory, options))
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Mount CRUD routes for `repo` under `path`.
    pub fn use_repository<T, R>(self, path: &str, repo: Arc<R>) -> Self
    where
        T: Entity + Serialize + DeserializeOwned,
        T::Id: FromStr,
        R: Repository<T> + ?Sized + 'static,
    {
        tracing::debug!(path, entity = T::KIND, "mounting repository routes");
        let router = rest::repository_router::<T, R>(repo);
        self.use_router(path, router)
    }

    /// The finished router with tenant resolution, tracing and request ids.
    pub fn into_router(self) -> Router<()> {
        let resolver = Arc::clone(&self.resolver);
        self.router
            .layer(axum::middleware::from_fn_with_state(resolver, resolve_tenant))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = ?listener.local_addr()?, "listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }

    /// [`AxumApp::listen`] on the address from `http.host` / `http.port`.
    pub async fn listen_configured(self, config: &LmsConfigSnapshot) -> anyhow::Result<()> {
        let addr = listen_addr(config)?;
        self.listen(addr).await
    }
}

/// `host:port` from `http.host` and `http.port`, with defaults for both.
pub fn listen_addr(config: &LmsConfigSnapshot) -> anyhow::Result<String> {
    let host = config
        .get_string(HTTP_HOST_KEY)
        .unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string());

    let port = match config.get(HTTP_PORT_KEY) {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .with_context(|| format!("invalid {HTTP_PORT_KEY} '{raw}'"))?,
        None => DEFAULT_HTTP_PORT,
    };

    Ok(format!("{host}:{port}"))
}

pub fn axum(resolver: TenantResolver) -> AxumApp {
    AxumApp::new(resolver)
}
