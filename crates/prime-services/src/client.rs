//! Shared HTTP client for the hosted backend

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::SupabaseConfig;
use crate::error::{Result, ServiceError};

/// Authenticated client for the REST, storage and auth APIs
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub const fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.url)
    }

    /// Request authorized with the service credentials
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    /// Request on behalf of a user's access token
    pub fn user_request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        let key = self
            .config
            .anon_key
            .as_deref()
            .unwrap_or(&self.config.service_role_key);
        self.http
            .request(method, self.url(path))
            .header("apikey", key)
            .bearer_auth(access_token)
    }

    pub async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let body = Self::checked(builder.send().await?).await?.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("{e}; body={body}")))
    }

    pub async fn send(builder: RequestBuilder) -> Result<()> {
        Self::checked(builder.send().await?).await.map(|_| ())
    }

    async fn checked(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
