//! User records and the storage interface the auth flow depends on.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// A registered user. `password_hash` is a PHC-format string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl UserRecord {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// Narrow persistence interface used by registration and login.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `true` if any user already has this username or this email.
    async fn user_exists(&self, username: &str, email: &str) -> CoreResult<bool>;

    /// Stores a new user. Fails with [`CoreError::UserExists`] on a clash.
    async fn create_user(&self, record: UserRecord) -> CoreResult<()>;

    /// Looks a user up by username or email.
    async fn find_user(&self, username_or_email: &str) -> CoreResult<UserRecord>;
}

/// In-process user store keyed by username.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email.eq_ignore_ascii_case(email))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn user_exists(&self, username: &str, email: &str) -> CoreResult<bool> {
        Ok(self.users.contains_key(username) || self.email_taken(email))
    }

    async fn create_user(&self, record: UserRecord) -> CoreResult<()> {
        if self.email_taken(&record.email) {
            return Err(CoreError::UserExists);
        }
        match self.users.entry(record.username.clone()) {
            Entry::Occupied(_) => Err(CoreError::UserExists),
            Entry::Vacant(slot) => {
                tracing::debug!("User created: {}", record.username);
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn find_user(&self, username_or_email: &str) -> CoreResult<UserRecord> {
        if let Some(user) = self.users.get(username_or_email) {
            return Ok(user.value().clone());
        }
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(username_or_email))
            .map(|u| u.value().clone())
            .ok_or(CoreError::UserNotFound)
    }
}
