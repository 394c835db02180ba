//! Checkout Session Initiation
//!
//! Turns a submitted cart into a hosted one-time payment session. Free items
//! never reach the provider; paying subscribers get their tier discount
//! applied to every line.

use prime_core::{CartItem, CommerceStore, Requester};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::gateway::{
    HostedSession, PaymentGateway, PricedLineItem, SessionRequest, AUTHOR_KEY, MODEL_ID_KEY,
};

/// Body of `POST /api/checkout`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Missing or null reads as an empty cart
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<CartItem>,
    /// Buyer id; missing, empty or `"anonymous"` for guests
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<CartItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CartItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where the provider sends the buyer back to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutUrls {
    pub fn from_app_url(app_url: &str) -> Self {
        let base = app_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/dashboard?payment=success"),
            cancel_url: format!("{base}/checkout?payment=cancelled"),
        }
    }
}

/// Unit price in minor units after discount, rounded half-up to the cent
pub fn unit_amount(price: Decimal, multiplier: Decimal) -> Option<i64> {
    (price * multiplier * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn line_description(item: &CartItem) -> String {
    let format = item
        .format
        .as_deref()
        .filter(|f| !f.is_empty())
        .unwrap_or("STL");
    format!("by @{} | Format: {format}", item.author_username)
}

/// Creates hosted checkout sessions for carts
pub struct CheckoutInitiator {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn CommerceStore>,
    urls: CheckoutUrls,
    currency: String,
}

impl CheckoutInitiator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn CommerceStore>,
        urls: CheckoutUrls,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            urls,
            currency: currency.into(),
        }
    }

    /// Create a session for the cart and return where to redirect the buyer
    pub async fn initiate(&self, request: &CheckoutRequest) -> Result<HostedSession> {
        let requester = Requester::from_user_id(request.user_id.as_deref());

        let result = async {
            let session = self.build_session(&requester, &request.items).await?;
            self.gateway.create_checkout_session(&session).await
        }
        .await;

        match &result {
            Ok(session) => tracing::info!(
                session_id = %session.id,
                user_id = %requester,
                items = request.items.len(),
                "Created checkout session"
            ),
            Err(e) => {
                let item_ids: Vec<&str> = request.items.iter().map(|i| i.id.as_str()).collect();
                tracing::error!(
                    error = %e,
                    user_id = %requester,
                    item_ids = ?item_ids,
                    "Checkout failed"
                );
            }
        }

        result
    }

    /// Price the cart into a session request without contacting the provider
    pub async fn build_session(
        &self,
        requester: &Requester,
        items: &[CartItem],
    ) -> Result<SessionRequest> {
        if items.is_empty() {
            return Err(PaymentError::EmptyCart);
        }

        let payable: Vec<&CartItem> = items.iter().filter(|i| i.price > Decimal::ZERO).collect();
        if payable.is_empty() {
            return Err(PaymentError::NoPayableItems);
        }

        let multiplier = self.multiplier(requester).await;

        let line_items = payable
            .into_iter()
            .map(|item| {
                let unit_amount = unit_amount(item.price, multiplier)
                    .ok_or_else(|| PaymentError::InvalidPrice(item.id.to_string()))?;

                let mut metadata = BTreeMap::new();
                metadata.insert(MODEL_ID_KEY.to_string(), item.id.to_string());
                metadata.insert(AUTHOR_KEY.to_string(), item.author_username.clone());

                Ok(PricedLineItem {
                    name: item.title.clone(),
                    description: line_description(item),
                    images: item.thumbnail_url.iter().cloned().collect(),
                    unit_amount,
                    quantity: 1,
                    metadata,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let item_ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let mut metadata = BTreeMap::new();
        metadata.insert("item_ids".to_string(), item_ids.join(","));
        metadata.insert("user_id".to_string(), requester.as_metadata().to_string());

        Ok(SessionRequest {
            currency: self.currency.clone(),
            line_items,
            success_url: self.urls.success_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
            metadata,
        })
    }

    /// Tier discount for the requester; lookup problems never block checkout
    async fn multiplier(&self, requester: &Requester) -> Decimal {
        let Some(user_id) = requester.user_id() else {
            return Decimal::ONE;
        };

        match self.store.subscription_tier(user_id).await {
            Ok(Some(tier)) => tier.discount_multiplier(),
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "No profile found, charging full price");
                Decimal::ONE
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Tier lookup failed, charging full price"
                );
                Decimal::ONE
            }
        }
    }
}
