//! API Middleware
//!
//! Authentication gate placed in front of protected routes.

pub mod auth;

pub use auth::{authenticate, bearer_token, require_auth, BearerHeader, GateState, Rejection};
