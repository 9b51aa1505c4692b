//! User lookup for token subjects.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use huddle_core::UserId;

use crate::errors::Result;

/// A known user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Numeric id, matching the token's `user_id` claim.
    pub id: u64,
    /// Display name shown to other room members.
    pub name: String,
    /// Contact email.
    pub email: String,
}

/// Resolves user ids to records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user, `None` when unknown.
    async fn find(&self, id: UserId) -> Option<UserRecord>;
}

/// In-memory directory, optionally loaded from a JSON file.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<UserId, UserRecord>,
}

impl StaticDirectory {
    /// Build a directory from records. Later duplicates replace earlier ones.
    pub fn new(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|r| (UserId(r.id), r))
            .collect();
        Self { users }
    }

    /// Load a JSON array of `{"id", "name", "email"}` objects.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<UserRecord> = serde_json::from_str(&content)?;
        let dir = Self::new(records);
        info!(?path, users = dir.len(), "loaded user directory");
        Ok(dir)
    }

    /// Add or replace a record.
    pub fn insert(&mut self, record: UserRecord) {
        let _ = self.users.insert(UserId(record.id), record);
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find(&self, id: UserId) -> Option<UserRecord> {
        self.users.get(&id).cloned()
    }
}
