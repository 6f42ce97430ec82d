use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lms_axum::axum;
use lms_core::{
    Entity, LmsConfig, MemoryRepository, MemoryTenantDirectory, Repository, Tenant, TenantId,
    TenantResolver, TenantStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Course {
    id: String,
    code: String,
    title: String,
}

impl Entity for Course {
    type Id = String;
    const KIND: &'static str = "Course";

    fn id(&self) -> &String {
        &self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("code", self.code.clone())]
    }

    fn check(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be blank".into());
        }
        Ok(())
    }
}

fn directory() -> Arc<MemoryTenantDirectory> {
    let tid = |s: &str| TenantId::new(s).unwrap();
    let dir = MemoryTenantDirectory::with_tenants([
        Tenant::new(tid("acme"), "Acme University").with_subdomain("acme"),
        Tenant::new(tid("globex"), "Globex Academy").with_custom_domain("learn.globex.com"),
        Tenant::new(tid("initech"), "Initech").with_status(TenantStatus::Suspended),
        Tenant::new(tid("café"), "Café Campus"),
    ])
    .unwrap();
    Arc::new(dir)
}

fn app() -> Router {
    let repo = Arc::new(MemoryRepository::<Course>::new());
    axum(TenantResolver::new(directory()))
        .use_repository::<Course, _>("/courses", repo)
        .into_router()
}

fn request(
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn course(id: &str, code: &str, title: &str) -> Value {
    json!({ "id": id, "code": code, "title": title })
}

const ACME: &[(&str, &str)] = &[("x-tenant-id", "acme")];
const GLOBEX: &[(&str, &str)] = &[("X-Tenant-ID", "globex")];

#[tokio::test]
async fn request_without_tenant_is_rejected() {
    let _ = lms_core::logging::init("lms_axum=debug,lms_core=debug,warn");
    let router = app();

    let (status, body) = send(&router, request("GET", "/courses", &[], None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "TENANT_REQUIRED");
    assert_eq!(body["className"], "bad-request");
}

#[tokio::test]
async fn unknown_and_suspended_tenants_are_rejected() {
    let router = app();

    let (status, body) = send(
        &router,
        request("GET", "/courses", &[("x-tenant-id", "umbrella")], None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "TENANT_NOT_FOUND");

    let (status, body) = send(
        &router,
        request("GET", "/courses", &[("x-tenant-id", "initech")], None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "TENANT_SUSPENDED");
}

#[tokio::test]
async fn entity_is_invisible_to_other_tenants() {
    let router = app();

    let (status, created) = send(
        &router,
        request("POST", "/courses", ACME, Some(course("c1", "RUST-101", "Intro to Rust"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created, course("c1", "RUST-101", "Intro to Rust"));

    let (status, body) = send(&router, request("GET", "/courses/c1", GLOBEX, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "ENTITY_NOT_FOUND");

    let (status, body) = send(&router, request("GET", "/courses", GLOBEX, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&router, request("GET", "/courses/c1", ACME, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Intro to Rust");
}

#[tokio::test]
async fn same_id_in_two_tenants_resolves_to_each_tenants_own_entity() {
    let router = app();

    send(&router, request("POST", "/courses", ACME, Some(course("1", "A", "Acme course")))).await;
    send(
        &router,
        request(
            "POST",
            "/courses",
            &[("x-tenant-custom-domain", "learn.globex.com")],
            Some(course("1", "G", "Globex course")),
        ),
    )
    .await;

    let (_, acme) = send(
        &router,
        request("GET", "/courses/1", &[("x-tenant-subdomain", "acme")], None),
    )
    .await;
    let (_, globex) = send(&router, request("GET", "/courses/1", GLOBEX, None)).await;

    assert_eq!(acme["title"], "Acme course");
    assert_eq!(globex["title"], "Globex course");
}

#[tokio::test]
async fn repository_errors_map_to_http_statuses() {
    let router = app();
    send(&router, request("POST", "/courses", ACME, Some(course("c1", "RUST-101", "Intro")))).await;

    let (status, body) = send(
        &router,
        request("POST", "/courses", ACME, Some(course("c2", "RUST-101", "Copy"))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "DUPLICATE_ENTRY");
    assert_eq!(body["code"], 409);

    let (status, body) = send(
        &router,
        request("POST", "/courses", ACME, Some(course("c3", "RUST-103", "  "))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "CONSTRAINT_VIOLATION");

    let (status, body) = send(
        &router,
        request("PUT", "/courses/c9", ACME, Some(course("c9", "X", "x"))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "ENTITY_NOT_FOUND");
}

#[tokio::test]
async fn update_and_delete_stay_inside_the_tenant() {
    let router = app();
    send(&router, request("POST", "/courses", ACME, Some(course("c1", "RUST-101", "Intro")))).await;

    let (status, _) = send(
        &router,
        request("PUT", "/courses/c1", GLOBEX, Some(course("c1", "RUST-101", "Hijacked"))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, request("DELETE", "/courses/c1", GLOBEX, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": false }));

    let (status, body) = send(
        &router,
        request("PUT", "/courses/c1", ACME, Some(course("c1", "RUST-101", "Intro, 2nd ed."))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Intro, 2nd ed.");

    let (_, body) = send(&router, request("DELETE", "/courses/c1", ACME, None)).await;
    assert_eq!(body, json!({ "deleted": true }));
    let (_, body) = send(&router, request("DELETE", "/courses/c1", ACME, None)).await;
    assert_eq!(body, json!({ "deleted": false }));
}

#[tokio::test]
async fn body_naming_another_tenant_is_forbidden() {
    let router = app();

    let mut payload = course("c1", "RUST-101", "Intro");
    payload["tenant_id"] = json!("globex");

    let (status, body) = send(&router, request("POST", "/courses", ACME, Some(payload))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "TENANT_MISMATCH");

    let mut payload = course("c1", "RUST-101", "Intro");
    payload["tenantId"] = json!("acme");
    let (status, _) = send(&router, request("POST", "/courses", ACME, Some(payload))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request_with_request_id() {
    let router = app();

    let req = Request::builder()
        .method("POST")
        .uri("/courses")
        .header("x-tenant-id", "acme")
        .header("content-type", "application/json")
        .body(Body::from("{\"id\":\"c1\""))
        .unwrap();
    let res = router.clone().oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers().get("x-request-id").is_some());
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["name"], "BadRequest");
    assert!(body.get("errors").is_some());

    let (status, body) = send(
        &router,
        request("POST", "/courses", ACME, Some(json!({ "id": "c1" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid Course payload");
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let router = app();
    let provided = HeaderValue::from_static("req-test-123");

    let req = Request::builder()
        .method("GET")
        .uri("/courses")
        .header("x-tenant-id", "acme")
        .header("x-request-id", provided.clone())
        .body(Body::empty())
        .unwrap();
    let res = router.oneshot(req).await.unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test]
async fn configured_default_tenant_serves_header_less_requests() {
    let mut config = LmsConfig::new();
    config.set("tenancy.default_tenant", "acme");

    let router = lms_axum::AxumApp::from_config(directory(), &config.snapshot())
        .use_repository::<Course, _>("/courses", Arc::new(MemoryRepository::<Course>::new()))
        .into_router();

    send(&router, request("POST", "/courses", &[], Some(course("c1", "RUST-101", "Intro")))).await;
    let (status, body) = send(&router, request("GET", "/courses/c1", ACME, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "c1");
}

fn default_acme_app(repo: Arc<MemoryRepository<Course>>) -> Router {
    let mut config = LmsConfig::new();
    config.set("tenancy.default_tenant", "acme");

    lms_axum::AxumApp::from_config(directory(), &config.snapshot())
        .use_repository::<Course, _>("/courses", repo)
        .into_router()
}

fn post_with_raw_tenant(tenant: &[u8], body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/courses")
        .header("x-tenant-id", HeaderValue::from_bytes(tenant).unwrap())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn non_ascii_tenant_header_is_honoured_not_defaulted() {
    let repo = Arc::new(MemoryRepository::<Course>::new());
    let router = default_acme_app(Arc::clone(&repo));

    let req = post_with_raw_tenant("café".as_bytes(), course("c1", "FR-101", "Written by café"));
    let (status, _) = send(&router, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let acme = TenantId::new("acme").unwrap();
    let cafe = TenantId::new("café").unwrap();
    assert!(repo.find_by_id(&"c1".to_string(), &acme).await.unwrap().is_none());
    let stored = repo.find_by_id(&"c1".to_string(), &cafe).await.unwrap().unwrap();
    assert_eq!(stored.title, "Written by café");
}

#[tokio::test]
async fn undecodable_tenant_header_never_falls_back_to_default() {
    let repo = Arc::new(MemoryRepository::<Course>::new());
    let router = default_acme_app(Arc::clone(&repo));

    // "café" in Latin-1: a present header that is not UTF-8
    let req = post_with_raw_tenant(b"caf\xe9", course("c1", "FR-101", "Lost"));
    let (status, body) = send(&router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "TENANT_HEADER_INVALID");

    let acme = TenantId::new("acme").unwrap();
    assert_eq!(repo.count(&acme), 0);
}

#[test]
fn listen_address_comes_from_config() {
    let mut config = LmsConfig::new();
    assert_eq!(lms_axum::listen_addr(&config.snapshot()).unwrap(), "127.0.0.1:3030");

    config.set("http.host", "0.0.0.0");
    config.set("http.port", "8080");
    assert_eq!(lms_axum::listen_addr(&config.snapshot()).unwrap(), "0.0.0.0:8080");

    config.set("http.port", "eighty");
    let err = lms_axum::listen_addr(&config.snapshot()).unwrap_err();
    assert!(err.to_string().contains("http.port"));
}

#[tokio::test]
async fn listen_configured_rejects_a_bad_port() {
    let mut config = LmsConfig::new();
    config.set("http.port", "70000");

    let app = lms_axum::AxumApp::from_config(directory(), &config.snapshot());
    assert!(app.listen_configured(&config.snapshot()).await.is_err());
}
