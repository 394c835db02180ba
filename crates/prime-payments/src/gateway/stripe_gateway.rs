//! Stripe Gateway
//!
//! Sessions are created through `async-stripe`. Line items and subscriptions
//! are read from the REST API directly so that product metadata can be
//! expanded in the same request.

use ::stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};

use super::{HostedSession, PaidLineItem, PaymentGateway, SessionRequest, SubscriptionDetails};
use crate::error::{PaymentError, Result};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
    http: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Get the underlying Stripe client
    pub const fn inner(&self) -> &Client {
        &self.client
    }

    fn currency(code: &str) -> Result<Currency> {
        match code.to_lowercase().as_str() {
            "brl" => Ok(Currency::BRL),
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            other => Err(PaymentError::Config(format!("Unsupported currency: {other}"))),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body["error"]["message"].as_str().unwrap_or("request failed");
            return Err(PaymentError::Provider(format!("{status}: {message}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &SessionRequest) -> Result<HostedSession> {
        let currency = Self::currency(&request.currency)?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(request.success_url.as_str());
        params.cancel_url = Some(request.cancel_url.as_str());
        params.mode = Some(CheckoutSessionMode::Payment);
        params.metadata = Some(to_metadata(&request.metadata));

        params.line_items = Some(
            request
                .line_items
                .iter()
                .map(|item| CreateCheckoutSessionLineItems {
                    quantity: Some(item.quantity),
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency: currency.clone(),
                        unit_amount: Some(item.unit_amount),
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: item.name.clone(),
                            description: Some(item.description.clone()),
                            images: (!item.images.is_empty()).then(|| item.images.clone()),
                            metadata: Some(to_metadata(&item.metadata)),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        );

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Provider("No checkout URL returned".into()))?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn list_line_items(&self, session_id: &str) -> Result<Vec<PaidLineItem>> {
        let list: LineItemList = self
            .get_json(
                &format!("/checkout/sessions/{session_id}/line_items"),
                &[("limit", "100"), ("expand[]", "data.price.product")],
            )
            .await?;

        Ok(list.data.into_iter().map(PaidLineItem::from).collect())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionDetails> {
        let subscription: WireSubscription = self
            .get_json(&format!("/subscriptions/{subscription_id}"), &[])
            .await?;

        subscription.into_details()
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}

fn to_metadata(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[derive(Debug, Deserialize)]
struct LineItemList {
    data: Vec<WireLineItem>,
}

#[derive(Debug, Deserialize)]
struct WireLineItem {
    amount_total: Option<i64>,
    description: Option<String>,
    price: Option<WirePrice>,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    product: Option<WireProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireProduct {
    Expanded {
        name: Option<String>,
        #[serde(default)]
        metadata: BTreeMap<String, String>,
    },
    Id(String),
}

impl From<WireLineItem> for PaidLineItem {
    fn from(item: WireLineItem) -> Self {
        let (product_name, product_metadata) = match item.price.and_then(|p| p.product) {
            Some(WireProduct::Expanded { name, metadata }) => (name, metadata),
            Some(WireProduct::Id(_)) | None => (None, BTreeMap::new()),
        };

        Self {
            product_name: product_name.or(item.description),
            product_metadata,
            amount_total: item.amount_total,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSubscription {
    id: String,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    items: Option<WireSubscriptionItems>,
}

#[derive(Debug, Deserialize)]
struct WireSubscriptionItems {
    data: Vec<WireSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct WireSubscriptionItem {
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

impl WireSubscription {
    /// Newer API versions only report the period on subscription items
    fn into_details(self) -> Result<SubscriptionDetails> {
        let first_item = self.items.as_ref().and_then(|items| items.data.first());

        let start = self
            .current_period_start
            .or_else(|| first_item.and_then(|i| i.current_period_start));
        let end = self
            .current_period_end
            .or_else(|| first_item.and_then(|i| i.current_period_end));

        match (start, end) {
            (Some(current_period_start), Some(current_period_end)) => Ok(SubscriptionDetails {
                id: self.id,
                status: self.status,
                current_period_start,
                current_period_end,
                cancel_at_period_end: self.cancel_at_period_end,
            }),
            _ => Err(PaymentError::Provider(format!(
                "Subscription {} has no billing period",
                self.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_line_items() {
        let list: LineItemList = serde_json::from_value(serde_json::json!({
            "object": "list",
            "data": [
                {
                    "amount_total": 800,
                    "description": "Benchy",
                    "price": {"product": {"name": "Benchy", "metadata": {"model_id": "m2", "author_username": "ana"}}}
                },
                {
                    "amount_total": 500,
                    "description": "Loose line",
                    "price": {"product": "prod_123"}
                }
            ]
        }))
        .unwrap();

        let items: Vec<PaidLineItem> = list.data.into_iter().map(PaidLineItem::from).collect();
        assert_eq!(items[0].model_id(), Some("m2"));
        assert_eq!(items[0].author(), Some("ana"));
        assert_eq!(items[0].amount_total, Some(800));
        assert_eq!(items[1].model_id(), None);
        assert_eq!(items[1].product_name.as_deref(), Some("Loose line"));
    }

    #[test]
    fn test_subscription_period_fallback() {
        let legacy: WireSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "current_period_start": 100,
            "current_period_end": 200,
            "cancel_at_period_end": false
        }))
        .unwrap();
        assert_eq!(legacy.into_details().unwrap().current_period_end, 200);

        let itemized: WireSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_2",
            "status": "trialing",
            "items": {"data": [{"current_period_start": 300, "current_period_end": 400}]}
        }))
        .unwrap();
        let details = itemized.into_details().unwrap();
        assert_eq!(details.current_period_start, 300);
        assert!(!details.cancel_at_period_end);

        let empty: WireSubscription =
            serde_json::from_value(serde_json::json!({"id": "sub_3", "status": "active"})).unwrap();
        assert!(empty.into_details().is_err());
    }

    #[test]
    fn test_currency_codes() {
        assert!(StripeGateway::currency("BRL").is_ok());
        assert!(StripeGateway::currency("xyz").is_err());
    }
}
