//! Stateless bearer-token authentication and role-based authorization

pub mod config;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod store;

pub use config::{AuthorityConfig, ConfigError, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL};
pub use jwt::{AuthResult, IssueError, IssuedToken, TokenAuthority, TokenClaims};
pub use password::{hash_password, verify_password, PasswordError};
pub use principal::{Principal, Role};
pub use store::{
    CredentialRecord, CredentialStore, Credentials, InMemoryCredentialStore, StoreError,
};

// Re-export useful types
pub use async_trait::async_trait;
