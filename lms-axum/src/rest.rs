use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    routing, Json, Router,
};
use lms_core::{DatabaseError, Entity, Repository, TenantId, TenantScope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{middlewares::CurrentTenant, BadRequest, LmsAxumError, RepositoryState};

/// Body fields that name a tenant. A body may carry one, but it must
/// match the tenant the request resolved to.
const TENANT_FIELDS: [&str; 2] = ["tenant_id", "tenantId"];

fn map_json_rejection(rejection: JsonRejection) -> LmsAxumError {
    BadRequest::new("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}

fn parse_id<T>(raw: &str) -> Result<T::Id, LmsAxumError>
where
    T: Entity,
    T::Id: FromStr,
{
    raw.parse::<T::Id>()
        .map_err(|_| BadRequest::new(format!("Invalid {} id '{raw}'", T::KIND)).into())
}

/// Check any tenant claim in `body` against the scope, then decode it.
fn decode_body<T, R>(scope: &TenantScope<T, R>, body: Value) -> Result<T, LmsAxumError>
where
    T: Entity + DeserializeOwned,
    R: Repository<T> + ?Sized,
{
    for field in TENANT_FIELDS {
        if let Some(claimed) = body.get(field).and_then(Value::as_str) {
            let claimed = TenantId::new(claimed)?;
            scope.authorize(&claimed)?;
        }
    }

    serde_json::from_value(body).map_err(|e| {
        BadRequest::new(format!("Invalid {} payload", T::KIND))
            .with_errors(json!({"_schema": [e.to_string()]}))
            .into()
    })
}

fn scoped<T, R>(state: &RepositoryState<T, R>, tenant: CurrentTenant) -> TenantScope<T, R>
where
    T: Entity,
    R: Repository<T> + ?Sized,
{
    TenantScope::new(tenant.0, Arc::clone(&state.repo))
}

async fn find_all<T, R>(
    State(state): State<RepositoryState<T, R>>,
    tenant: CurrentTenant,
) -> Result<Json<Vec<T>>, LmsAxumError>
where
    T: Entity + Serialize,
    R: Repository<T> + ?Sized + 'static,
{
    let rows = scoped(&state, tenant).find_all().await?;
    Ok(Json(rows))
}

async fn find_by_id<T, R>(
    State(state): State<RepositoryState<T, R>>,
    tenant: CurrentTenant,
    Path(id): Path<String>,
) -> Result<Json<T>, LmsAxumError>
where
    T: Entity + Serialize,
    T::Id: FromStr,
    R: Repository<T> + ?Sized + 'static,
{
    let id = parse_id::<T>(&id)?;
    match scoped(&state, tenant).find_by_id(&id).await? {
        Some(row) => Ok(Json(row)),
        None => Err(DatabaseError::not_found(T::KIND, &id).into()),
    }
}

async fn create<T, R>(
    State(state): State<RepositoryState<T, R>>,
    tenant: CurrentTenant,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<T>), LmsAxumError>
where
    T: Entity + Serialize + DeserializeOwned,
    R: Repository<T> + ?Sized + 'static,
{
    let Json(body) = body.map_err(map_json_rejection)?;
    let scope = scoped(&state, tenant);
    let data = decode_body(&scope, body)?;

    let created = scope.create(data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<T, R>(
    State(state): State<RepositoryState<T, R>>,
    tenant: CurrentTenant,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<T>, LmsAxumError>
where
    T: Entity + Serialize + DeserializeOwned,
    T::Id: FromStr,
    R: Repository<T> + ?Sized + 'static,
{
    let id = parse_id::<T>(&id)?;
    let Json(body) = body.map_err(map_json_rejection)?;
    let scope = scoped(&state, tenant);
    let data = decode_body(&scope, body)?;

    let updated = scope.update(&id, data).await?;
    Ok(Json(updated))
}

async fn delete<T, R>(
    State(state): State<RepositoryState<T, R>>,
    tenant: CurrentTenant,
    Path(id): Path<String>,
) -> Result<Json<Value>, LmsAxumError>
where
    T: Entity,
    T::Id: FromStr,
    R: Repository<T> + ?Sized + 'static,
{
    let id = parse_id::<T>(&id)?;
    let deleted = scoped(&state, tenant).delete(&id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// CRUD routes over one repository, each scoped to the request's tenant:
///
/// - `GET /`: all of the tenant's entities
/// - `POST /`: create (201)
/// - `GET /{id}`: one entity, 404 when absent for this tenant
/// - `PUT /{id}`: replace
/// - `DELETE /{id}`: `{"deleted": bool}`
///
/// The routes expect [`crate::middlewares::resolve_tenant`] to run first.
pub fn repository_router<T, R>(repo: Arc<R>) -> Router<()>
where
    T: Entity + Serialize + DeserializeOwned,
    T::Id: FromStr,
    R: Repository<T> + ?Sized + 'static,
{
    let state = RepositoryState::<T, R>::new(repo);

    Router::new()
        .route("/", routing::get(find_all::<T, R>).post(create::<T, R>))
        .route(
            "/{id}",
            routing::get(find_by_id::<T, R>)
                .put(update::<T, R>)
                .delete(delete::<T, R>),
        )
        .with_state(state)
}
