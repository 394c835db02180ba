//! Session resolution against the hosted auth API

use async_trait::async_trait;
use prime_core::{CoreError, SessionResolver, UserId};
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::client::SupabaseClient;
use crate::error::ServiceError;

pub struct SupabaseSessions {
    client: SupabaseClient,
}

#[derive(Deserialize)]
struct AuthUser {
    id: String,
}

impl SupabaseSessions {
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionResolver for SupabaseSessions {
    async fn resolve(&self, token: &str) -> prime_core::Result<Option<UserId>> {
        if token.is_empty() {
            return Ok(None);
        }

        let request = self.client.user_request(Method::GET, "/auth/v1/user", token);
        match SupabaseClient::send_json::<AuthUser>(request).await {
            Ok(user) => Ok(Some(UserId::from_string(user.id))),
            // Expired or forged tokens are just unauthenticated callers
            Err(ServiceError::Api { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into_core(CoreError::Session)),
        }
    }
}
