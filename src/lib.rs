use std::sync::Arc;

use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Pure data shaping: models, view transforms and URL state.
pub mod models;
pub mod query_state;
pub mod transforms;

// Remote service access and the query cache in front of it.
pub mod cache;
pub mod client;
pub mod memory;
pub mod service;

// Caller identity, admin gate, editor and page assembly.
pub mod auth;
pub mod editor;
pub mod pages;

pub mod config;
pub mod error;
pub mod handlers;

// Module for routing segregation (Public, Caller, Admin).
pub mod routes;
use routes::{admin, caller, public};

// --- Public Re-exports ---

pub use client::{ClientRegistry, PortalClient, ViewScope};
pub use config::AppConfig;
pub use error::PortalError;
pub use memory::InMemoryBackend;
pub use service::{ConnectorState, HttpConnector, ServiceState};

/// RegistryState
///
/// Shared handle to the per-identity client registry.
pub type RegistryState = Arc<ClientRegistry>;

/// ApiDoc
///
/// OpenAPI document for the BFF, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_home, handlers::get_category, handlers::search, handlers::get_post,
        handlers::navigate, handlers::get_my_profile, handlers::save_my_profile,
        handlers::get_my_role, handlers::list_admin_posts, handlers::create_post,
        handlers::get_admin_post, handlers::update_post, handlers::delete_post,
        handlers::publish_post, handlers::unpublish_post, handlers::assign_role
    ),
    components(
        schemas(
            models::RecruitmentPost, models::PostInput, models::PostStatus,
            models::RecruitmentPostType, models::KeyValue, models::UserProfile,
            models::UserRole, models::AssignRoleRequest, models::CreatedPost,
            models::Principal, query_state::ListingParams, query_state::ListingUpdate,
            query_state::ListingLocation, query_state::SortKey, pages::ViewStatus,
            pages::Facets, pages::HomeView, pages::CategoryView, pages::SearchView,
            pages::PostDetailView, pages::AdminDashboardView, pages::AdminEditView,
            handlers::NavigateRequest, handlers::NavigateResponse, auth::GateDecision,
        )
    ),
    tags(
        (name = "sarkari-portal", description = "Recruitment notice portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared across all requests: the client registry (one cached client per caller
/// identity, bounded by `config.max_clients`) and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryState,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(connector: ConnectorState, config: AppConfig) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::with_capacity(connector, config.max_clients)),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RegistryState {
    fn from_ref(app_state: &AppState) -> RegistryState {
        app_state.registry.clone()
    }
}

/// create_router
///
/// Assembles the BFF routes, the Swagger UI and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(caller::caller_routes())
        // Admin Routes: the gate runs inside each handler's `AdminSession` extractor.
        .nest("/api/admin", admin::admin_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one BFF request, correlated by `x-request-id`. The caller principal is
/// recorded too, since cached state is per identity.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %header("x-request-id"),
        principal = %header(service::PRINCIPAL_HEADER),
    )
}
