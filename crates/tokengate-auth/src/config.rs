//! Token authority configuration

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ISSUER: &str = "tokengate";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Configuration errors. These are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT secret must not be empty")]
    EmptySecret,

    #[error("Token TTL must be at least one second, got {0:?}")]
    TtlTooShort(Duration),

    #[error("Token TTL {0:?} is out of range")]
    TtlOutOfRange(Duration),

    #[error("Issuer must not be empty")]
    EmptyIssuer,

    #[error("Failed to prepare decoy password hash: {0}")]
    DecoyHash(String),
}

/// Process-wide settings injected into [`crate::TokenAuthority`]
#[derive(Clone)]
pub struct AuthorityConfig {
    /// HMAC secret used to sign and verify tokens
    pub secret: Vec<u8>,
    /// Lifetime of issued tokens
    pub token_ttl: Duration,
    /// `iss` claim written on issue and required on verify
    pub issuer: String,
}

impl AuthorityConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: DEFAULT_TOKEN_TTL,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Check the invariants the authority relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.token_ttl < Duration::from_secs(1) {
            return Err(ConfigError::TtlTooShort(self.token_ttl));
        }
        if chrono::Duration::from_std(self.token_ttl).is_err() {
            return Err(ConfigError::TtlOutOfRange(self.token_ttl));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::EmptyIssuer);
        }
        Ok(())
    }
}

impl fmt::Debug for AuthorityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityConfig")
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("token_ttl", &self.token_ttl)
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthorityConfig::new("secret");
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.issuer, "tokengate");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = AuthorityConfig::new(Vec::new());
        assert!(matches!(config.validate(), Err(ConfigError::EmptySecret)));
    }

    #[test]
    fn test_sub_second_ttl_rejected() {
        let config = AuthorityConfig::new("secret").with_token_ttl(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::TtlTooShort(_))));

        let config = AuthorityConfig::new("secret").with_token_ttl(Duration::from_millis(500));
        assert!(matches!(config.validate(), Err(ConfigError::TtlTooShort(_))));
    }

    #[test]
    fn test_blank_issuer_rejected() {
        let config = AuthorityConfig::new("secret").with_issuer("  ");
        assert!(matches!(config.validate(), Err(ConfigError::EmptyIssuer)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = AuthorityConfig::new("super-secret-value");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("<18 bytes>"));
    }
}
