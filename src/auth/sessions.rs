use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory map of issued session tokens to the username they belong to.
///
/// Wrapped in `Arc` so it can be cheaply cloned into the router state.
/// Tokens do not survive a restart of the dashboard process.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `username`.
    pub async fn create(&self, username: &str) -> Uuid {
        let token = Uuid::new_v4();
        self.inner.write().await.insert(token, username.to_owned());
        token
    }

    /// Username owning `token`, if the token is live.
    pub async fn username(&self, token: Uuid) -> Option<String> {
        self.inner.read().await.get(&token).cloned()
    }

    /// Returns whether the token was live.
    pub async fn revoke(&self, token: Uuid) -> bool {
        self.inner.write().await.remove(&token).is_some()
    }
}
