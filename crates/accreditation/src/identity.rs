//! Boundary to the external identity provider. The core never authenticates anyone; it only
//! maps opaque external ids onto local user records.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Local user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Investor,
    Reviewer,
    Admin,
}

impl UserRole {
    pub const fn can_review(self) -> bool {
        matches!(self, UserRole::Reviewer | UserRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub external_id: String,
    pub email: String,
    pub role: UserRole,
}

pub trait IdentityDirectory: Send + Sync {
    /// Resolve the identity provider's opaque user id.
    fn resolve(&self, external_id: &str) -> Result<Option<UserRecord>, DirectoryError>;
    fn lookup(&self, user_id: &UserId) -> Result<Option<UserRecord>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}

/// Directory backed by a fixed set of users, for local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    users: Arc<Mutex<HashMap<UserId, UserRecord>>>,
}

impl StaticDirectory {
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let directory = Self::default();
        for user in users {
            directory.register(user);
        }
        directory
    }

    pub fn register(&self, user: UserRecord) {
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user.id.clone(), user);
    }
}

impl IdentityDirectory for StaticDirectory {
    fn resolve(&self, external_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let guard = self
            .users
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .find(|user| user.external_id == external_id)
            .cloned())
    }

    fn lookup(&self, user_id: &UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let guard = self
            .users
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard.get(user_id).cloned())
    }
}
