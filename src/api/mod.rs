pub mod dto;
pub mod errors;
pub mod extract;
pub mod handlers;

use std::{sync::Arc, time::Instant};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    auth::{PasswordHasher, SessionStore},
    dashboard::Dashboard,
    db::Store,
};
use handlers::ApiDoc;

/// Shared handler state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub dashboard: Dashboard,
    pub sessions: SessionStore,
    pub hasher: Arc<PasswordHasher>,
}

impl AppState {
    pub fn new(store: Store, sessions: SessionStore, hasher: PasswordHasher) -> Self {
        Self {
            dashboard: Dashboard::new(store.clone()),
            store,
            sessions,
            hasher: Arc::new(hasher),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/sensor_data", get(handlers::sensor_data))
        .route("/sensor_graph/{source}", get(handlers::sensor_graph))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(middleware::from_fn(log_request))
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    info!(method = %method, uri = %uri, "Request");

    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Response"
    );
    response
}
