//! Typed access to the persisted session slots

use crate::error::Result;
use crate::storage::DurableStorage;
use crate::types::{CredentialPair, UserIdentity};
use std::sync::Arc;
use tracing::warn;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Session slots (access token, refresh token, user snapshot) over a storage port
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn DurableStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> Option<String> {
        non_empty(self.storage.get(ACCESS_TOKEN_KEY))
    }

    pub fn refresh_token(&self) -> Option<String> {
        non_empty(self.storage.get(REFRESH_TOKEN_KEY))
    }

    /// Cached user snapshot; an unparseable value reads as absent
    pub fn user(&self) -> Option<UserIdentity> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached user");
                None
            }
        }
    }

    /// Persist a credential pair. An empty refresh token leaves the slot untouched.
    pub fn store_credentials(&self, credentials: &CredentialPair) -> Result<()> {
        self.store_access_token(&credentials.access_token)?;
        if !credentials.refresh_token.is_empty() {
            self.store_refresh_token(&credentials.refresh_token)?;
        }
        Ok(())
    }

    pub fn store_access_token(&self, token: &str) -> Result<()> {
        self.storage.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn store_refresh_token(&self, token: &str) -> Result<()> {
        self.storage.set(REFRESH_TOKEN_KEY, token)
    }

    pub fn store_user(&self, user: &UserIdentity) -> Result<()> {
        let raw = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &raw)
    }

    /// Remove both tokens, keeping the user snapshot
    pub fn clear_tokens(&self) -> Result<()> {
        // Attempt both removals even if the first fails
        let access = self.storage.remove(ACCESS_TOKEN_KEY);
        let refresh = self.storage.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    /// Remove every session slot
    pub fn clear(&self) -> Result<()> {
        let tokens = self.clear_tokens();
        let user = self.storage.remove(USER_KEY);
        tokens.and(user)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
