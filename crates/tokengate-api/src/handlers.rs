use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tokengate_auth::{Credentials, IssueError, Principal, Role, TokenAuthority};
use tracing::{error, info, warn};
use utoipa::OpenApi;

use crate::models::*;
use crate::{ApiDoc, AppState};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error", codes::INTERNAL_ERROR)),
    )
}

fn invalid_credentials() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "Invalid username or password",
            codes::INVALID_CREDENTIALS,
        )),
    )
}

/// Exchange username and password for a bearer token
///
/// A body that isn't a `{username, password}` object fails the same way as a
/// wrong password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let credentials = match payload {
        Ok(Json(request)) => Credentials::from(request),
        Err(rejection) => {
            info!(status = %rejection.status(), "Rejected malformed login request");
            return Err(invalid_credentials());
        }
    };

    match state.authority.issue(&credentials, state.store.as_ref()).await {
        Ok(issued) => Ok(Json(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
        })),
        Err(IssueError::InvalidCredentials) => {
            info!(username = %credentials.username, "Failed login attempt");
            Err(invalid_credentials())
        }
        Err(e) => {
            error!(error = %e, "Login failed");
            Err(internal_error())
        }
    }
}

/// Get the principal behind the presented token
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current principal", body = Principal),
        (status = 401, description = "Missing or expired token", body = ErrorResponse),
        (status = 403, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn current_user(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users, without credentials", body = UserList),
        (status = 401, description = "Missing or expired token", body = ErrorResponse),
        (status = 403, description = "Invalid token or caller is not an admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserList>, ApiError> {
    if !TokenAuthority::authorize(&principal, Role::Admin) {
        warn!(
            username = %principal.username,
            role = %principal.role,
            "Denied access to user list"
        );
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(
                "Administrator role required",
                codes::FORBIDDEN,
            )),
        ));
    }

    let data = state.store.list_principals().await.map_err(|e| {
        error!(error = %e, "Failed to list users");
        internal_error()
    })?;

    info!(username = %principal.username, count = data.len(), "Listed users");
    Ok(Json(UserList { data }))
}

/// Confidential data for any authenticated principal
#[utoipa::path(
    get,
    path = "/api/confidential-data",
    responses(
        (status = 200, description = "Confidential payload", body = ConfidentialData),
        (status = 401, description = "Missing or expired token", body = ErrorResponse),
        (status = 403, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "data"
)]
pub async fn confidential_data(
    Extension(principal): Extension<Principal>,
) -> Json<ConfidentialData> {
    Json(ConfidentialData {
        data: "This is top secret data".to_string(),
        user: principal,
    })
}

/// Data anyone may read
#[utoipa::path(
    get,
    path = "/api/public-data",
    responses(
        (status = 200, description = "Public payload", body = PublicData)
    ),
    tag = "data"
)]
pub async fn public_data() -> Json<PublicData> {
    Json(PublicData {
        message: "This is public data, available to everyone".to_string(),
    })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OpenAPI document for this API
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
