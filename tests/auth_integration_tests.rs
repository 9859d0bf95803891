use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
};
use sarkari_portal::{
    AppConfig, AppState, InMemoryBackend, PortalError, create_router,
    auth::ACCESS_DENIED,
    models::{Principal, UserRole},
    service::{PRINCIPAL_HEADER, ServiceConnector, ServiceState},
};
use std::sync::Arc;
use tower::util::ServiceExt;

const ADMIN: &str = "admin-principal";

/// A connector whose service is never reachable.
struct OfflineConnector;

#[async_trait]
impl ServiceConnector for OfflineConnector {
    async fn connect(&self, _identity: Option<&Principal>) -> Result<ServiceState, PortalError> {
        Err(PortalError::TransportUnavailable)
    }
}

async fn backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.grant_role(Principal::new(ADMIN), UserRole::Admin).await;
    backend
}

fn admin_request(principal: Option<HeaderValue>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/admin/posts");
    if let Some(principal) = principal {
        builder = builder.header(PRINCIPAL_HEADER, principal);
    }
    builder.body(Body::empty()).unwrap()
}

async fn error_message(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_anonymous_caller_is_denied() {
    let state = AppState::new(Arc::new(backend().await), AppConfig::default());
    let response = create_router(state).oneshot(admin_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_message(response).await, ACCESS_DENIED);
}

#[tokio::test]
async fn test_blank_principal_counts_as_anonymous() {
    let state = AppState::new(Arc::new(backend().await), AppConfig::default());
    let response = create_router(state)
        .oneshot(admin_request(Some(HeaderValue::from_static("   "))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_non_admin_principal_is_denied() {
    let backend = backend().await;
    let state = AppState::new(Arc::new(backend.clone()), AppConfig::default());
    let response = create_router(state)
        .oneshot(admin_request(Some(HeaderValue::from_static("candidate"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(backend.call_count("getAllPosts").await, 0);
}

#[tokio::test]
async fn test_admin_principal_is_granted() {
    let state = AppState::new(Arc::new(backend().await), AppConfig::default());
    let response = create_router(state)
        .oneshot(admin_request(Some(HeaderValue::from_static(ADMIN))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_role_query_is_denied() {
    let backend = backend().await;
    backend.set_failing(true).await;
    let state = AppState::new(Arc::new(backend), AppConfig::default());

    let response = create_router(state)
        .oneshot(admin_request(Some(HeaderValue::from_static(ADMIN))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unreachable_service_leaves_gate_unresolved() {
    let state = AppState::new(Arc::new(OfflineConnector), AppConfig::default());
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(admin_request(Some(HeaderValue::from_static(ADMIN))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Public reads degrade to a loading view rather than an error.
    let response = app
        .oneshot(Request::builder().uri("/api/home").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_non_text_principal_header_is_bad_request() {
    let state = AppState::new(Arc::new(backend().await), AppConfig::default());
    let value = HeaderValue::from_bytes(b"adm\xffin").unwrap();
    let response = create_router(state)
        .oneshot(admin_request(Some(value)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
