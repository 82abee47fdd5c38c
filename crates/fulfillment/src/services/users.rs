//! User directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{FulfillmentError, Result};

/// Public view of a user as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
}

impl UserProfile {
    pub fn new(id: u64, username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            username: username.into(),
            full_name: full_name.into(),
        }
    }
}

/// Trait for looking up users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetches a user, failing with `NotFound` if it does not exist.
    async fn get(&self, user_id: UserId) -> Result<UserProfile>;
}

/// In-memory user directory for testing and single-process runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserProfile>>>,
    unavailable: Arc<AtomicBool>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryUserDirectory {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub async fn add_user(&self, user: UserProfile) {
        self.users.write().await.insert(user.id, user);
    }

    /// Makes every lookup fail as if the service were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns how many lookups have been made.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get(&self, user_id: UserId) -> Result<UserProfile> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FulfillmentError::UpstreamUnavailable(
                "user directory unreachable".to_string(),
            ));
        }

        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| FulfillmentError::NotFound(format!("user {user_id}")))
    }
}
