//! Server configuration assembled from flags and environment

use anyhow::{bail, Context, Result};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokengate_auth::{AuthorityConfig, CredentialRecord, InMemoryCredentialStore};
use tracing::warn;

/// Secrets shorter than this still work but are easy to brute-force offline
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Everything `serve` needs, validated
#[derive(Debug)]
pub struct ServeConfig {
    pub bind_addr: SocketAddr,
    pub authority: AuthorityConfig,
    pub cors_origins: Option<Vec<String>>,
}

impl ServeConfig {
    pub fn new(
        bind_addr: SocketAddr,
        jwt_secret: String,
        token_ttl: Duration,
        issuer: String,
        cors_origins: Vec<String>,
    ) -> Result<Self> {
        if jwt_secret.trim().is_empty() {
            bail!("JWT secret is empty; set JWT_SECRET or --jwt-secret");
        }
        if jwt_secret.len() < RECOMMENDED_SECRET_LEN {
            warn!(
                "JWT secret is only {} bytes; at least {} is recommended",
                jwt_secret.len(),
                RECOMMENDED_SECRET_LEN
            );
        }

        let authority = AuthorityConfig::new(jwt_secret.into_bytes())
            .with_token_ttl(token_ttl)
            .with_issuer(issuer);
        authority
            .validate()
            .context("Invalid token authority configuration")?;

        Ok(Self {
            bind_addr,
            authority,
            cors_origins: if cors_origins.is_empty() {
                None
            } else {
                Some(cors_origins)
            },
        })
    }
}

/// Load the users file: a JSON array of credential records
pub fn load_users(path: &Path) -> Result<InMemoryCredentialStore> {
    let json =
        fs::read_to_string(path).context(format!("Failed to read users file: {:?}", path))?;

    let records: Vec<CredentialRecord> = serde_json::from_str(&json)
        .context(format!("Failed to parse users file: {:?}", path))?;

    for record in &records {
        if !record.password_hash.starts_with("$argon2") {
            bail!(
                "User '{}' in {:?} has no Argon2 password hash (use `tokengate hash-password`)",
                record.username,
                path
            );
        }
    }

    let store = InMemoryCredentialStore::from_records(records)
        .context(format!("Invalid users file: {:?}", path))?;

    if store.is_empty() {
        warn!("Users file {:?} contains no users; every login will fail", path);
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokengate_auth::{hash_password, CredentialStore, Role};

    fn write_users(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_secret_is_fatal() {
        let result = ServeConfig::new(
            "127.0.0.1:3000".parse().unwrap(),
            "   ".to_string(),
            Duration::from_secs(3600),
            "tokengate".to_string(),
            Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_ttl_is_fatal() {
        let result = ServeConfig::new(
            "127.0.0.1:3000".parse().unwrap(),
            "a-long-enough-secret-for-testing-purposes".to_string(),
            Duration::ZERO,
            "tokengate".to_string(),
            Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_valid_config() {
        let config = ServeConfig::new(
            "127.0.0.1:3000".parse().unwrap(),
            "a-long-enough-secret-for-testing-purposes".to_string(),
            Duration::from_secs(2 * 3600),
            "tokengate".to_string(),
            vec!["http://localhost:5173".to_string()],
        )
        .unwrap();

        assert_eq!(config.authority.token_ttl, Duration::from_secs(7200));
        assert_eq!(
            config.cors_origins,
            Some(vec!["http://localhost:5173".to_string()])
        );
    }

    #[tokio::test]
    async fn test_load_users() {
        let hash = hash_password("123456").unwrap();
        let file = write_users(&format!(
            r#"[{{"user_id":"123","username":"user","password_hash":"{}","role":"user"}}]"#,
            hash
        ));

        let store = load_users(file.path()).unwrap();
        let record = store.find_by_username("user").await.unwrap().unwrap();
        assert_eq!(record.role, Role::User);
    }

    #[test]
    fn test_plaintext_password_rejected() {
        let file = write_users(
            r#"[{"user_id":"123","username":"user","password_hash":"123456","role":"user"}]"#,
        );

        let err = load_users(file.path()).unwrap_err();
        assert!(err.to_string().contains("no Argon2 password hash"));
    }

    #[test]
    fn test_missing_file() {
        let result = load_users(Path::new("/nonexistent/users.json"));
        assert!(result.is_err());
    }
}
