use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::task;
use tracing::info;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::{
    dto::{
        CredentialsRequest, LatestPairResponse, LoginResponse, ReadingDto, RegisterResponse,
        SensorGraphResponse,
    },
    errors::AppError,
    extract::CurrentUser,
    AppState,
};
use crate::db::models::{Averages, Source};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Create a credential. The password is stored as a salted PBKDF2 digest.
#[utoipa::path(
    post,
    path = "/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Empty username or password"),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let username = body.username.trim().to_owned();
    if username.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password must not be empty".into(),
        ));
    }

    let hasher = state.hasher.clone();
    let digest = task::spawn_blocking(move || hasher.hash(&body.password))
        .await
        .map_err(anyhow::Error::from)?;

    let credential = state.store.insert_credential(&username, &digest).await?;
    info!(username = %credential.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: credential.id,
            username: credential.username,
        }),
    ))
}

/// Check a credential pair and issue a session token.
#[utoipa::path(
    post,
    path = "/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Session token", body = LoginResponse),
        (status = 401, description = "Unknown user or wrong password"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let credential = state
        .store
        .find_credential(body.username.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let hasher = state.hasher.clone();
    let digest = credential.password.clone();
    let accepted = task::spawn_blocking(move || hasher.verify(&digest, &body.password))
        .await
        .map_err(anyhow::Error::from)?;
    if !accepted {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.sessions.create(&credential.username).await;
    info!(username = %credential.username, "User logged in");
    Ok(Json(LoginResponse { token }))
}

/// Revoke the caller's session token.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Missing or unknown token"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> StatusCode {
    state.sessions.revoke(user.token).await;
    info!(username = %user.username, "User logged out");
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Sensor data
// ---------------------------------------------------------------------------

/// Fetch the newest reading of each source.
#[utoipa::path(
    get,
    path = "/sensor_data",
    responses(
        (status = 200, description = "Latest reading per source", body = LatestPairResponse),
        (status = 401, description = "Missing or unknown token"),
        (status = 500, description = "Internal server error"),
    ),
    security(("bearer" = [])),
    tag = "sensors"
)]
pub async fn sensor_data(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<LatestPairResponse>, AppError> {
    let (local, remote) = state.dashboard.latest_pair().await?;
    Ok(Json(LatestPairResponse {
        local: local.map(Into::into),
        remote: remote.map(Into::into),
    }))
}

/// Fetch every stored reading of one source for charting, ordered by id,
/// together with the mean over the stored rows and the trigger-maintained
/// snapshot.
#[utoipa::path(
    get,
    path = "/sensor_graph/{source}",
    params(
        ("source" = Source, Path, description = "Which sensor table to read"),
    ),
    responses(
        (status = 200, description = "Readings and averages", body = SensorGraphResponse),
        (status = 400, description = "Unknown source"),
        (status = 401, description = "Missing or unknown token"),
        (status = 500, description = "Internal server error"),
    ),
    security(("bearer" = [])),
    tag = "sensors"
)]
pub async fn sensor_graph(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(source): Path<Source>,
) -> Result<Json<SensorGraphResponse>, AppError> {
    let history = state.dashboard.history(source).await?;
    Ok(Json(history.into()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(register, login, logout, sensor_data, sensor_graph, health),
    components(schemas(
        ReadingDto,
        LatestPairResponse,
        SensorGraphResponse,
        CredentialsRequest,
        RegisterResponse,
        LoginResponse,
        Averages,
        Source,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth",    description = "Account and session endpoints"),
        (name = "sensors", description = "Sensor reading endpoints"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Weather Station API",
        version = "0.1.0",
        description = "REST API for weather station sensor data"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
