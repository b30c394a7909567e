use anyhow::{Context, Result};
use tracing::warn;

use super::SessionStore;
use crate::models::User;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the JSON-serialized user record
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Credentials and cached profile for the signed-in user.
///
/// Tokens are opaque. Nothing here checks expiry: a stale access token is
/// only discovered when the server rejects it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    /// Rebuild a session from durable storage. Unreadable entries are
    /// logged and treated as absent.
    pub fn load(store: &dyn SessionStore) -> Self {
        let read = |key: &str| match store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read session entry");
                None
            }
        };

        Self {
            access_token: read(ACCESS_TOKEN_KEY),
            refresh_token: read(REFRESH_TOKEN_KEY),
            user: read(USER_KEY).and_then(|raw| match serde_json::from_str(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Stored user record is not valid JSON");
                    None
                }
            }),
        }
    }

    /// Replace the whole session with a freshly issued token pair.
    pub fn establish(&mut self, access_token: String, refresh_token: String, user: User) {
        self.access_token = Some(access_token);
        self.refresh_token = Some(refresh_token);
        self.user = Some(user);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Write all three entries to the store as one batch.
    pub fn persist(&self, store: &dyn SessionStore) -> Result<()> {
        let (Some(access), Some(refresh), Some(user)) =
            (&self.access_token, &self.refresh_token, &self.user)
        else {
            return Err(anyhow::anyhow!("Cannot persist an incomplete session"));
        };
        let user_json = serde_json::to_string(user).context("Failed to serialize user")?;
        store.set_many(&[
            (ACCESS_TOKEN_KEY, access.as_str()),
            (REFRESH_TOKEN_KEY, refresh.as_str()),
            (USER_KEY, user_json.as_str()),
        ])
    }

    /// Mirror just the access token after a refresh.
    pub fn persist_access_token(&self, store: &dyn SessionStore) -> Result<()> {
        match &self.access_token {
            Some(token) => store.set(ACCESS_TOKEN_KEY, token),
            None => store.remove(ACCESS_TOKEN_KEY),
        }
    }

    /// Remove every session entry from the store.
    pub fn erase(store: &dyn SessionStore) -> Result<()> {
        store.remove_many(&SESSION_KEYS)
    }

    /// Last-known user record from storage, without touching the network.
    pub fn stored_user(store: &dyn SessionStore) -> Option<User> {
        let raw = store.get(USER_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }
}
