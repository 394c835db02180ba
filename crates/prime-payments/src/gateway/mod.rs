//! Payment Gateway
//!
//! Provider-neutral view of the hosted payment service. Implement this for
//! each provider; checkout and reconciliation only ever talk to the trait.

mod mock;
mod stripe_gateway;

pub use mock::MockGateway;
pub use stripe_gateway::StripeGateway;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

/// Product metadata key carrying the catalog model id
pub const MODEL_ID_KEY: &str = "model_id";
/// Product metadata key carrying the creator's username
pub const AUTHOR_KEY: &str = "author_username";

/// One priced line in a new checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedLineItem {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    /// Unit price in minor units (cents)
    pub unit_amount: i64,
    pub quantity: u64,
    /// Product metadata (`model_id`, `author_username`)
    pub metadata: BTreeMap<String, String>,
}

/// A one-time payment checkout session to create
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    pub currency: String,
    pub line_items: Vec<PricedLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

impl SessionRequest {
    /// Sum of all line items in minor units
    pub fn total_amount(&self) -> i64 {
        self.line_items
            .iter()
            .map(|item| item.unit_amount * i64::try_from(item.quantity).unwrap_or(i64::MAX))
            .sum()
    }
}

/// A session created by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedSession {
    pub id: String,
    /// Where to redirect the buyer
    pub url: String,
}

/// A charged line item, as re-fetched from the provider
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaidLineItem {
    pub product_name: Option<String>,
    pub product_metadata: BTreeMap<String, String>,
    /// Amount charged for this line in minor units
    pub amount_total: Option<i64>,
}

impl PaidLineItem {
    pub fn model_id(&self) -> Option<&str> {
        self.product_metadata
            .get(MODEL_ID_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn author(&self) -> Option<&str> {
        self.product_metadata.get(AUTHOR_KEY).map(String::as_str)
    }
}

/// Subscription details from the provider (timestamps in epoch seconds)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionDetails {
    pub id: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
}

/// Hosted payment provider (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted one-time payment session
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<HostedSession>;

    /// Line items of a completed session, with product name and metadata
    async fn list_line_items(&self, session_id: &str) -> Result<Vec<PaidLineItem>>;

    /// Current state of a subscription
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionDetails>;

    /// Provider name
    fn name(&self) -> &str;
}
