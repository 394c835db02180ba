//! Object storage URL signing

use async_trait::async_trait;
use prime_core::{CoreError, ObjectStorage};
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;

use crate::client::SupabaseClient;

/// Issues signed download URLs for files in the configured bucket
pub struct StorageSigner {
    client: SupabaseClient,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl StorageSigner {
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn sign_path(&self, path: &str) -> String {
        format!(
            "/storage/v1/object/sign/{}/{}",
            self.client.config().bucket,
            path.trim_start_matches('/')
        )
    }

    /// The API answers with a path relative to `/storage/v1`
    fn absolute(&self, signed: &str) -> String {
        if signed.starts_with("http") {
            return signed.to_string();
        }
        self.client.url(&format!("/storage/v1{signed}"))
    }
}

#[async_trait]
impl ObjectStorage for StorageSigner {
    async fn signed_url(&self, path: &str, expires_in: Duration) -> prime_core::Result<String> {
        let response: SignedUrlResponse = SupabaseClient::send_json(
            self.client
                .request(Method::POST, &self.sign_path(path))
                .json(&serde_json::json!({ "expiresIn": expires_in.as_secs() })),
        )
        .await
        .map_err(|e| e.into_core(CoreError::ObjectStorage))?;

        Ok(self.absolute(&response.signed_url))
    }
}
