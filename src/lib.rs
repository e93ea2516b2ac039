use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

// Route table, segregated by access level.
pub mod routes;
use routes::{people, public};

// --- Public Re-exports ---

pub use auth::{AuthenticatorState, InMemoryCredentialStore};
pub use config::AppConfig;
pub use repository::{InMemoryPersonStore, PersonStoreState, PgPersonStore};
pub use service::PersonService;

/// ApiDoc
///
/// OpenAPI document for the `/person` endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_people, handlers::get_person, handlers::create_person,
        handlers::update_person, handlers::delete_person
    ),
    components(schemas(models::Person, models::PersonRequest)),
    tags((name = "people-registry", description = "Person records behind role-gated endpoints"))
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Service layer over the configured `PersonStore`.
    pub people: PersonService,
    /// Identity provider used by the `AuthUser` extractor.
    pub auth: AuthenticatorState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: PersonStoreState, auth: AuthenticatorState, config: AppConfig) -> Self {
        Self {
            people: PersonService::new(store),
            auth,
            config,
        }
    }

    /// State whose accounts come from `config.users`.
    pub fn from_config(store: PersonStoreState, config: AppConfig) -> Self {
        let auth = Arc::new(InMemoryCredentialStore::new(config.users.clone())) as AuthenticatorState;
        Self::new(store, auth, config)
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for PersonService {
    fn from_ref(app_state: &AppState) -> PersonService {
        app_state.people.clone()
    }
}

impl FromRef<AppState> for AuthenticatorState {
    fn from_ref(app_state: &AppState) -> AuthenticatorState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the route table, the documentation routes and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(people::people_routes())
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
/// Span for `TraceLayer` carrying the `x-request-id` so every log line of one request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
