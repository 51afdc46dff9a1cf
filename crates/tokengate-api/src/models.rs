use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokengate_auth::{Credentials, Principal};
use utoipa::ToSchema;

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
        }
    }
}

/// Stable error codes returned in [`ErrorResponse::code`]
pub mod codes {
    pub const MISSING_AUTH: &str = "MISSING_AUTH";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// User login request
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username
    pub username: String,
    /// User password
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl From<LoginRequest> for Credentials {
    fn from(request: LoginRequest) -> Self {
        Credentials::new(request.username, request.password)
    }
}

/// User login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for the Authorization header
    pub token: String,
    /// Token expiration timestamp
    pub expires_at: DateTime<Utc>,
}

/// List of users
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    /// Users, without credential material
    pub data: Vec<Principal>,
}

/// Payload of the confidential demo endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfidentialData {
    pub data: String,
    /// Principal the data was served to
    pub user: Principal,
}

/// Payload of the public demo endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicData {
    pub message: String,
}
