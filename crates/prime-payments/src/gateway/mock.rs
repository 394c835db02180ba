//! Mock Payment Gateway
//!
//! For tests and local development. Sessions are recorded instead of sent,
//! and line items / subscriptions are served from what the test registered.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{HostedSession, PaidLineItem, PaymentGateway, SessionRequest, SubscriptionDetails};
use crate::error::{PaymentError, Result};

#[derive(Default)]
struct MockState {
    sessions: Vec<SessionRequest>,
    line_items: HashMap<String, Vec<PaidLineItem>>,
    subscriptions: HashMap<String, SubscriptionDetails>,
    line_item_calls: usize,
}

/// In-memory gateway
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
    fail_checkout: Option<String>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session creation fails with `message`
    pub fn failing_checkout(message: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fail_checkout: Some(message.into()),
        }
    }

    pub async fn register_line_items(&self, session_id: impl Into<String>, items: Vec<PaidLineItem>) {
        self.state.lock().await.line_items.insert(session_id.into(), items);
    }

    pub async fn register_subscription(&self, subscription: SubscriptionDetails) {
        self.state
            .lock()
            .await
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    /// Session requests received so far
    pub async fn sessions(&self) -> Vec<SessionRequest> {
        self.state.lock().await.sessions.clone()
    }

    pub async fn line_item_calls(&self) -> usize {
        self.state.lock().await.line_item_calls
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<HostedSession> {
        if let Some(message) = &self.fail_checkout {
            return Err(PaymentError::Provider(message.clone()));
        }

        let mut state = self.state.lock().await;
        state.sessions.push(request.clone());
        let id = format!("cs_test_{:04}", state.sessions.len());

        Ok(HostedSession {
            url: format!("https://checkout.mock/pay/{id}"),
            id,
        })
    }

    async fn list_line_items(&self, session_id: &str) -> Result<Vec<PaidLineItem>> {
        let mut state = self.state.lock().await;
        state.line_item_calls += 1;
        state
            .line_items
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::Provider(format!("No such checkout.session: {session_id}")))
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionDetails> {
        self.state
            .lock()
            .await
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::Provider(format!("No such subscription: {subscription_id}")))
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}
