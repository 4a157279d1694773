use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::settings::{OAUTH_TOKEN_KEY, SettingsStore};

/// Tokens are treated as expired this long before the server says so.
pub const EXPIRY_BUFFER_MS: i64 = 300_000;

/// OAuth2 bearer token as issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Milliseconds since the Unix epoch at which the token was persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<i64>,
}

impl Token {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            expires_in: None,
            stored_at: None,
        }
    }

    /// False once `now_ms` is within the expiry buffer. Tokens without a
    /// lifetime or store stamp never expire here.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        let (Some(expires_in), Some(stored_at)) = (self.expires_in, self.stored_at) else {
            return true;
        };
        // lifetimes that overflow the clock are malformed
        i64::try_from(expires_in)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .and_then(|ms| stored_at.checked_add(ms))
            .and_then(|expires_at| expires_at.checked_sub(EXPIRY_BUFFER_MS))
            .is_some_and(|deadline| now_ms <= deadline)
    }
}

#[derive(Clone)]
pub struct TokenStore {
    settings: Arc<dyn SettingsStore>,
}

impl TokenStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Persist `token` stamped with the current time, replacing any prior token.
    pub fn store(&self, token: &Token) -> Result<Token> {
        let stamped = Token {
            stored_at: Some(Utc::now().timestamp_millis()),
            ..token.clone()
        };
        let blob = serde_json::to_string(&stamped)?;
        self.settings.set(OAUTH_TOKEN_KEY, &blob)?;
        debug!("stored OAuth2 token");
        Ok(stamped)
    }

    /// The last stored token. Missing or malformed data reads as `None`.
    pub fn read(&self) -> Option<Token> {
        let blob = self.settings.get(OAUTH_TOKEN_KEY)?;
        match serde_json::from_str(&blob) {
            Ok(token) => Some(token),
            Err(e) => {
                debug!("ignoring malformed stored token: {e}");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read()
            .map(|t| t.access_token)
            .filter(|t| !t.is_empty())
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis())
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.read().is_some_and(|t| t.is_valid_at(now_ms))
    }

    pub fn clear(&self) -> Result<()> {
        self.settings.unset(OAUTH_TOKEN_KEY)
    }
}
