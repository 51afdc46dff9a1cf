//! HTTP surface for tokengate
//!
//! Public routes (login, health, demo public data) sit next to protected routes
//! guarded by [`middleware::require_auth`].

pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokengate_auth::{CredentialStore, TokenAuthority};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;

/// Application state shared across handlers
pub struct AppState {
    pub authority: Arc<TokenAuthority>,
    pub store: Arc<dyn CredentialStore>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tokengate API",
        version = "0.1.0",
        description = "Bearer-token login and role-gated demo endpoints"
    ),
    paths(
        handlers::login,
        handlers::current_user,
        handlers::list_users,
        handlers::confidential_data,
        handlers::public_data,
        handlers::health_check,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::HealthResponse,
            models::LoginRequest,
            models::LoginResponse,
            models::UserList,
            models::ConfidentialData,
            models::PublicData,
            tokengate_auth::Principal,
            tokengate_auth::Role,
        )
    ),
    tags(
        (name = "auth", description = "Login and current principal"),
        (name = "users", description = "User administration"),
        (name = "data", description = "Demo data endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// Allowed CORS origins (if None, allows all)
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            enable_cors: false,
            cors_origins: None,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: ApiServerConfig,
        authority: Arc<TokenAuthority>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let state = Arc::new(AppState { authority, store });
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let gate_state = Arc::new(middleware::GateState::new(self.state.authority.clone()));

        // Build PUBLIC routes (no authentication required)
        let public_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route("/api/openapi.json", get(handlers::openapi_json))
            .route("/api/public-data", get(handlers::public_data))
            .route("/api/auth/login", post(handlers::login))
            .with_state(self.state.clone());

        // Build PROTECTED routes (require a valid bearer token)
        let protected_router = Router::new()
            .route("/api/auth/me", get(handlers::current_user))
            .route("/api/users", get(handlers::list_users))
            .route("/api/confidential-data", get(handlers::confidential_data))
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                gate_state,
                middleware::require_auth,
            ));

        let mut router = public_router
            .merge(protected_router)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(self.cors_layer());
        }

        router
    }

    fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        match &self.config.cors_origins {
            Some(origins) => {
                let origins: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|origin| match HeaderValue::from_str(origin) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!("Ignoring invalid CORS origin: {}", origin);
                            None
                        }
                    })
                    .collect();
                layer.allow_origin(AllowOrigin::list(origins))
            }
            None => layer.allow_origin(Any),
        }
    }

    /// Start the API server, stopping on Ctrl+C
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down...");
                }
            })
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
