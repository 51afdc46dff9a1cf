//! Bearer token gate
//!
//! Extracts the token from `Authorization: Bearer <token>`, verifies it with the
//! [`TokenAuthority`] and makes the resulting [`Principal`] available to
//! handlers via Axum's `Extension`. Requests that fail verification never reach
//! the protected handler.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokengate_auth::{AuthResult, Principal, TokenAuthority};
use tracing::debug;

use crate::models::{codes, ErrorResponse};

/// Token verification state shared across middleware instances
#[derive(Clone)]
pub struct GateState {
    pub authority: Arc<TokenAuthority>,
}

impl GateState {
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self { authority }
    }
}

/// What the Authorization header carried
#[derive(Debug, PartialEq, Eq)]
pub enum BearerHeader<'a> {
    /// No header, an empty header, or a bare `Bearer` scheme
    Absent,
    Token(&'a str),
    /// Another scheme, or a value that isn't visible ASCII
    Malformed,
}

/// Pull the bearer token out of the request headers
///
/// The scheme is matched case-insensitively (`Bearer`, `bearer`, `BEARER`).
pub fn bearer_token(headers: &HeaderMap) -> BearerHeader<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return BearerHeader::Absent;
    };
    let Ok(value) = value.to_str() else {
        return BearerHeader::Malformed;
    };

    let value = value.trim();
    if value.is_empty() {
        return BearerHeader::Absent;
    }

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return BearerHeader::Malformed;
    }

    match token.trim() {
        "" => BearerHeader::Absent,
        token => BearerHeader::Token(token),
    }
}

/// Verify whatever the request presented
pub fn authenticate(authority: &TokenAuthority, headers: &HeaderMap) -> AuthResult {
    match bearer_token(headers) {
        BearerHeader::Absent => authority.verify(None),
        BearerHeader::Token(token) => authority.verify(Some(token)),
        BearerHeader::Malformed => AuthResult::Invalid,
    }
}

/// Why a protected request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No bearer token was presented
    Missing,
    /// The token verified but is past `exp`
    Expired,
    /// Bad signature, malformed token, foreign issuer or non-bearer scheme
    Invalid,
}

impl Rejection {
    /// Split a verification outcome into the principal or the reason it was refused
    pub fn check(result: AuthResult) -> Result<Principal, Rejection> {
        match result {
            AuthResult::Valid(principal) => Ok(principal),
            AuthResult::Missing => Err(Rejection::Missing),
            AuthResult::Expired => Err(Rejection::Expired),
            AuthResult::Invalid => Err(Rejection::Invalid),
        }
    }
}

/// `Missing` and `Expired` are 401 with a `WWW-Authenticate` challenge;
/// `Invalid` is 403.
impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (status, challenge, body) = match self {
            Rejection::Missing => (
                StatusCode::UNAUTHORIZED,
                Some(HeaderValue::from_static("Bearer")),
                ErrorResponse::new("Missing authentication token", codes::MISSING_AUTH),
            ),
            Rejection::Expired => (
                StatusCode::UNAUTHORIZED,
                Some(HeaderValue::from_static(
                    r#"Bearer error="invalid_token", error_description="token expired""#,
                )),
                ErrorResponse::new("Token expired", codes::TOKEN_EXPIRED),
            ),
            Rejection::Invalid => (
                StatusCode::FORBIDDEN,
                None,
                ErrorResponse::new("Invalid token", codes::INVALID_TOKEN),
            ),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge);
        }
        response
    }
}

/// Authentication middleware for protected routes
///
/// # Errors
/// - 401 `MISSING_AUTH` when no bearer token was presented
/// - 401 `TOKEN_EXPIRED` when the token verified but is past `exp`
/// - 403 `INVALID_TOKEN` for any other failure (bad signature, malformed
///   token, foreign issuer, non-bearer scheme)
pub async fn require_auth(
    State(state): State<Arc<GateState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let principal = Rejection::check(authenticate(&state.authority, request.headers()))
        .inspect_err(|rejection| {
            debug!(
                path = %request.uri().path(),
                outcome = ?rejection,
                "Rejected unauthenticated request"
            );
        })?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, middleware, routing::get, Extension, Router};
    use chrono::{Duration, Utc};
    use tokengate_auth::{AuthorityConfig, Credentials, InMemoryCredentialStore, Role};
    use tower::ServiceExt; // For oneshot()

    const TEST_SECRET: &[u8] = b"test-secret-key";

    async fn protected_handler(Extension(principal): Extension<Principal>) -> Json<Principal> {
        Json(principal)
    }

    fn authority(secret: &[u8]) -> Arc<TokenAuthority> {
        Arc::new(TokenAuthority::new(AuthorityConfig::new(secret)).unwrap())
    }

    fn create_test_app(authority: Arc<TokenAuthority>) -> Router {
        let gate = Arc::new(GateState::new(authority));

        Router::new()
            .route("/protected", get(protected_handler))
            .layer(middleware::from_fn_with_state(gate, require_auth))
    }

    async fn token_for(authority: &TokenAuthority, issued_at: chrono::DateTime<Utc>) -> String {
        let store = InMemoryCredentialStore::new()
            .with_user("123", "user", "123456", Role::User)
            .unwrap();
        authority
            .issue_at(&Credentials::new("user", "123456"), &store, issued_at)
            .await
            .unwrap()
            .token
    }

    async fn send(app: Router, authorization: Option<&str>) -> Response {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn error_body(response: Response) -> ErrorResponse {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), BearerHeader::Absent);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), BearerHeader::Token("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("BEARER   abc  "));
        assert_eq!(bearer_token(&headers), BearerHeader::Token("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), BearerHeader::Absent);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(""));
        assert_eq!(bearer_token(&headers), BearerHeader::Absent);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), BearerHeader::Malformed);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearerabc"));
        assert_eq!(bearer_token(&headers), BearerHeader::Malformed);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let authority = authority(TEST_SECRET);
        let token = token_for(&authority, Utc::now()).await;
        let app = create_test_app(authority);

        let response = send(app, Some(format!("Bearer {}", token).as_str())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let principal: Principal = serde_json::from_slice(&body).unwrap();
        assert_eq!(principal, Principal::new("123", "user", Role::User));
    }

    #[tokio::test]
    async fn test_lowercase_scheme_accepted() {
        let authority = authority(TEST_SECRET);
        let token = token_for(&authority, Utc::now()).await;
        let app = create_test_app(authority);

        let response = send(app, Some(format!("bearer {}", token).as_str())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_authorization_header() {
        let app = create_test_app(authority(TEST_SECRET));

        let response = send(app, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
        assert_eq!(error_body(response).await.code.as_deref(), Some("MISSING_AUTH"));
    }

    #[tokio::test]
    async fn test_empty_bearer_is_missing() {
        let app = create_test_app(authority(TEST_SECRET));

        let response = send(app, Some("Bearer ")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_body(response).await.code.as_deref(), Some("MISSING_AUTH"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let authority = authority(TEST_SECRET);
        let token = token_for(&authority, Utc::now() - Duration::hours(3)).await;
        let app = create_test_app(authority);

        let response = send(app, Some(format!("Bearer {}", token).as_str())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(error_body(response).await.code.as_deref(), Some("TOKEN_EXPIRED"));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_forbidden() {
        let token = token_for(&authority(b"wrong-secret-key"), Utc::now()).await;
        let app = create_test_app(authority(TEST_SECRET));

        let response = send(app, Some(format!("Bearer {}", token).as_str())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(error_body(response).await.code.as_deref(), Some("INVALID_TOKEN"));
    }

    #[tokio::test]
    async fn test_static_token_is_forbidden() {
        let app = create_test_app(authority(TEST_SECRET));

        let response = send(app, Some("Bearer meu-token-secreto-123")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_other_scheme_is_forbidden() {
        let app = create_test_app(authority(TEST_SECRET));

        let response = send(app, Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(error_body(response).await.code.as_deref(), Some("INVALID_TOKEN"));
    }

    #[tokio::test]
    async fn test_rejection_check_and_responses() {
        let principal = Principal::new("123", "user", Role::User);
        assert_eq!(
            Rejection::check(AuthResult::Valid(principal.clone())),
            Ok(principal)
        );
        assert_eq!(Rejection::check(AuthResult::Missing), Err(Rejection::Missing));
        assert_eq!(Rejection::check(AuthResult::Expired), Err(Rejection::Expired));
        assert_eq!(Rejection::check(AuthResult::Invalid), Err(Rejection::Invalid));

        for (rejection, status, code, challenged) in [
            (Rejection::Missing, StatusCode::UNAUTHORIZED, "MISSING_AUTH", true),
            (Rejection::Expired, StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", true),
            (Rejection::Invalid, StatusCode::FORBIDDEN, "INVALID_TOKEN", false),
        ] {
            let response = rejection.into_response();
            assert_eq!(response.status(), status);
            assert_eq!(
                response.headers().contains_key(header::WWW_AUTHENTICATE),
                challenged
            );
            assert_eq!(error_body(response).await.code.as_deref(), Some(code));
        }
    }
}
