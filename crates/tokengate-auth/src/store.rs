//! Credential records and the lookup trait used at login time

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::password::{hash_password, PasswordError};
use crate::principal::{Principal, Role};

/// Username/password pair supplied at login
///
/// Never persisted. `Debug` redacts the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Stored user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub role: Role,
}

impl CredentialRecord {
    pub fn principal(&self) -> Principal {
        Principal::new(self.user_id.clone(), self.username.clone(), self.role)
    }
}

/// Errors raised by a credential store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate username: {0}")]
    DuplicateUsername(String),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Read-only access to user credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the record for `username`, if any
    async fn find_by_username(&self, username: &str)
        -> Result<Option<CredentialRecord>, StoreError>;

    /// All known principals, without password hashes
    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError>;
}

/// Credential store backed by a `HashMap`, keyed by username
#[derive(Debug, Default, Clone)]
pub struct InMemoryCredentialStore {
    records: HashMap<String, CredentialRecord>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from pre-hashed records, rejecting duplicate usernames
    pub fn from_records(
        records: impl IntoIterator<Item = CredentialRecord>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    pub fn insert(&mut self, record: CredentialRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.username) {
            return Err(StoreError::DuplicateUsername(record.username));
        }
        self.records.insert(record.username.clone(), record);
        Ok(())
    }

    /// Hash `password` and add the resulting record
    pub fn with_user(
        mut self,
        user_id: impl Into<String>,
        username: impl Into<String>,
        password: &str,
        role: Role,
    ) -> Result<Self, StoreError> {
        let record = CredentialRecord {
            user_id: user_id.into(),
            username: username.into(),
            password_hash: hash_password(password)?,
            role,
        };
        self.insert(record)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.get(username).cloned())
    }

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError> {
        let mut principals: Vec<Principal> =
            self.records.values().map(CredentialRecord::principal).collect();
        principals.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(principals)
    }
}
