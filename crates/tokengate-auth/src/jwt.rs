//! JWT issuance and verification
//!
//! Tokens are HS256-signed JWTs carrying the principal (`sub`, `username`,
//! `role`) plus `iat`, `exp` and `iss`. Verification is stateless: a token is
//! accepted purely on signature, issuer and clock, and there is no revocation
//! before `exp`.

use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AuthorityConfig, ConfigError};
use crate::password::{hash_password, verify_password};
use crate::principal::{Principal, Role};
use crate::store::{CredentialStore, Credentials, StoreError};

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by every issued token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration time (unix seconds)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl TokenClaims {
    pub fn new(
        principal: &Principal,
        issuer: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: principal.user_id.clone(),
            username: principal.username.clone(),
            role: principal.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: issuer,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn into_principal(self) -> Principal {
        Principal {
            user_id: self.sub,
            username: self.username,
            role: self.role,
        }
    }
}

/// Outcome of verifying a presented token
///
/// `Invalid` covers every structural, signature, algorithm and issuer failure.
/// A token is only `Expired` once its signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Valid(Principal),
    Expired,
    Invalid,
    Missing,
}

impl AuthResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, AuthResult::Valid(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthResult::Valid(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn into_principal(self) -> Option<Principal> {
        match self {
            AuthResult::Valid(principal) => Some(principal),
            _ => None,
        }
    }
}

/// A freshly signed token and its absolute expiration
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Login-time failures
#[derive(Debug, Error)]
pub enum IssueError {
    /// Unknown username or wrong password. Which one is never reported.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Credential lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token expiration is out of range")]
    ExpiryOutOfRange,

    #[error("Password verification task failed: {0}")]
    Verification(#[from] tokio::task::JoinError),
}

/// Issues and verifies bearer tokens
///
/// Immutable after construction; share it behind an `Arc`.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    token_ttl: chrono::Duration,
    /// Verified against when the username is unknown, so both login failure
    /// paths cost one Argon2 verification
    decoy_hash: String,
}

impl TokenAuthority {
    pub fn new(config: AuthorityConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let token_ttl = chrono::Duration::from_std(config.token_ttl)
            .map_err(|_| ConfigError::TtlOutOfRange(config.token_ttl))?;

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against the caller's clock in verify_at
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        let decoy_hash = hash_password("tokengate-decoy-password")
            .map_err(|e| ConfigError::DecoyHash(e.to_string()))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            issuer: config.issuer,
            token_ttl,
            decoy_hash,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        self.token_ttl
    }

    /// Authenticate `credentials` against `store` and sign a token
    pub async fn issue<S>(
        &self,
        credentials: &Credentials,
        store: &S,
    ) -> Result<IssuedToken, IssueError>
    where
        S: CredentialStore + ?Sized,
    {
        self.issue_at(credentials, store, Utc::now()).await
    }

    /// Same as [`issue`](Self::issue) with an explicit issuance instant
    pub async fn issue_at<S>(
        &self,
        credentials: &Credentials,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, IssueError>
    where
        S: CredentialStore + ?Sized,
    {
        let record = store.find_by_username(&credentials.username).await?;

        let hash = record
            .as_ref()
            .map_or_else(|| self.decoy_hash.clone(), |r| r.password_hash.clone());
        let password = credentials.password.clone();

        // CPU-bound; keep it off the async workers
        let verification =
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;

        let password_matches = match verification {
            Ok(matches) => matches,
            Err(e) => {
                warn!(
                    username = %credentials.username,
                    error = %e,
                    "Stored password hash could not be checked"
                );
                false
            }
        };

        let Some(record) = record.filter(|_| password_matches) else {
            debug!(username = %credentials.username, "Login rejected");
            return Err(IssueError::InvalidCredentials);
        };

        let principal = record.principal();
        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(self.token_ttl)
            .ok_or(IssueError::ExpiryOutOfRange)?;

        let claims = TokenClaims::new(&principal, self.issuer.clone(), issued_at, expires_at);
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)?;

        info!(
            user_id = %principal.user_id,
            username = %principal.username,
            role = %principal.role,
            expires_at = %expires_at,
            "Issued token"
        );

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a presented token against the current time
    pub fn verify(&self, raw_token: Option<&str>) -> AuthResult {
        self.verify_at(raw_token, Utc::now())
    }

    /// Verify a presented token as of `now`
    ///
    /// Checks run in a fixed order: presence, then signature and structure,
    /// then expiry.
    pub fn verify_at(&self, raw_token: Option<&str>, now: DateTime<Utc>) -> AuthResult {
        let token = match raw_token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return AuthResult::Missing,
        };

        let claims = match decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Token failed verification");
                return AuthResult::Invalid;
            }
        };

        if claims.exp <= claims.iat {
            debug!("Token expiration precedes issuance");
            return AuthResult::Invalid;
        }

        if claims.is_expired_at(now) {
            return AuthResult::Expired;
        }

        AuthResult::Valid(claims.into_principal())
    }

    /// Role check for a principal taken from [`AuthResult::Valid`]
    pub fn authorize(principal: &Principal, required: Role) -> bool {
        principal.has_role(required)
    }
}
