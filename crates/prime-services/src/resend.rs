//! Resend email API

use async_trait::async_trait;
use prime_core::notify::{MailReceipt, OutgoingEmail};
use prime_core::{CoreError, Mailer};
use serde::Deserialize;

use crate::error::{Result, ServiceError};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<MailReceipt> {
        let response = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("{e}; body={body}")))?;
        Ok(MailReceipt { id: parsed.id })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> prime_core::Result<MailReceipt> {
        let receipt = self
            .deliver(email)
            .await
            .map_err(|e| e.into_core(CoreError::Notification))?;

        tracing::info!(email_id = %receipt.id, subject = %email.subject, "Email sent");
        Ok(receipt)
    }
}
