//! HTTP notifier
//!
//! Triggers the application's own email endpoints, so rendering and provider
//! credentials stay in one place.

use async_trait::async_trait;
use prime_core::notify::{FollowerEmail, ReceiptEmail, WelcomeEmail};
use prime_core::{CoreError, Delivery, Notifier};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

pub struct HttpNotifier {
    http: reqwest::Client,
    app_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointResponse {
    #[serde(default)]
    skipped: bool,
    #[serde(default)]
    id: Option<String>,
}

impl From<EndpointResponse> for Delivery {
    fn from(response: EndpointResponse) -> Self {
        if response.skipped {
            Self::Skipped
        } else {
            Self::Sent { id: response.id }
        }
    }
}

impl HttpNotifier {
    pub fn new(app_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/emails/{name}", self.app_url)
    }

    async fn post<T: Serialize + Sync>(&self, name: &str, payload: &T) -> Result<Delivery> {
        let response = self.http.post(self.endpoint(name)).json(payload).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EndpointResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(parsed.into())
    }

    async fn trigger<T: Serialize + Sync>(&self, name: &str, payload: &T) -> prime_core::Result<Delivery> {
        let delivery = self
            .post(name, payload)
            .await
            .map_err(|e| e.into_core(CoreError::Notification))?;
        tracing::debug!(endpoint = name, delivery = ?delivery, "Notification triggered");
        Ok(delivery)
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_receipt(&self, email: &ReceiptEmail) -> prime_core::Result<Delivery> {
        self.trigger("receipt", email).await
    }

    async fn send_welcome(&self, email: &WelcomeEmail) -> prime_core::Result<Delivery> {
        self.trigger("welcome", email).await
    }

    async fn send_new_follower(&self, email: &FollowerEmail) -> prime_core::Result<Delivery> {
        self.trigger("follower", email).await
    }
}
