//! Session Resolution
//!
//! Sign-in lives with the external auth provider; the server only needs to
//! turn a session token into a user id.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::model::UserId;

/// Resolves session tokens to users
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` for expired or unknown tokens
    async fn resolve(&self, token: &str) -> Result<Option<UserId>>;
}

/// Fixed token table (for development and tests)
#[derive(Default)]
pub struct StaticSessions {
    tokens: HashMap<String, UserId>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>, user_id: UserId) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

#[async_trait]
impl SessionResolver for StaticSessions {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
        Ok(self.tokens.get(token).cloned())
    }
}
