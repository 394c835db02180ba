//! Webhook Event Decoding
//!
//! The provider payload is decoded once, at the boundary, into
//! [`WebhookEvent`]. Everything downstream matches on the enum instead of
//! poking at raw JSON.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::error::{PaymentError, Result};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Recognized webhook events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A hosted checkout finished (payment or subscription signup)
    CheckoutCompleted(CompletedSession),

    /// A subscription was updated or deleted
    SubscriptionChanged(SubscriptionUpdate),

    /// Any other event type; acknowledged without processing
    Ignored { event_type: String },
}

impl WebhookEvent {
    /// Decode a raw webhook body
    pub fn decode(payload: &str) -> Result<Self> {
        let raw: RawEvent =
            serde_json::from_str(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        tracing::debug!(event_id = %raw.id, event_type = %raw.event_type, "Decoding webhook event");

        let object = raw.data.object;
        match raw.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => serde_json::from_value(object)
                .map(Self::CheckoutCompleted)
                .map_err(|e| PaymentError::WebhookParse(format!("Invalid checkout session data: {e}"))),
            SUBSCRIPTION_UPDATED | SUBSCRIPTION_DELETED => serde_json::from_value(object)
                .map(Self::SubscriptionChanged)
                .map_err(|e| PaymentError::WebhookParse(format!("Invalid subscription data: {e}"))),
            _ => Ok(Self::Ignored {
                event_type: raw.event_type,
            }),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutCompleted(_) => CHECKOUT_SESSION_COMPLETED,
            Self::SubscriptionChanged(_) => "customer.subscription.*",
            Self::Ignored { event_type } => event_type,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Checkout session mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Payment,
    Subscription,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// The `checkout.session` object of a completed checkout
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub mode: SessionMode,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default, deserialize_with = "expandable_id")]
    pub payment_intent: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    pub subscription: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    pub customer: Option<String>,
}

impl CompletedSession {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|c| c.email.as_deref())
            .filter(|e| !e.is_empty())
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_details.as_ref().and_then(|c| c.name.as_deref())
    }
}

/// The `subscription` object of an updated/deleted subscription
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubscriptionUpdate {
    pub id: String,
    pub status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    items: Option<SubscriptionItems>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct SubscriptionItems {
    data: Vec<SubscriptionItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct SubscriptionItem {
    current_period_end: Option<i64>,
}

impl SubscriptionUpdate {
    /// Period end in epoch seconds, from the subscription or its first item
    pub fn current_period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .as_ref()
                .and_then(|items| items.data.first())
                .and_then(|item| item.current_period_end)
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Related objects arrive either as an id or expanded
fn expandable_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Expandable {
        Id(String),
        Object { id: String },
    }

    Ok(Option::<Expandable>::deserialize(deserializer)?.map(|e| match e {
        Expandable::Id(id) | Expandable::Object { id } => id,
    }))
}
