//! PostgREST-backed Commerce Store
//!
//! Tables: `users`, `purchases`, `user_subscriptions`, `models`. Requests use
//! the service credentials, so row-level security does not apply.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prime_core::{
    CatalogModel, CommerceStore, CoreError, ModelFile, ModelId, NewPurchase, PaymentStatus,
    Purchase, SubscriptionActivation, SubscriptionChange, SubscriptionTier, TierChange, UserId,
};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::SupabaseClient;
use crate::error::ServiceError;

type CoreResult<T> = prime_core::Result<T>;

pub struct PostgrestStore {
    client: SupabaseClient,
}

impl PostgrestStore {
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn table(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        self.client.request(method, &format!("/rest/v1/{table}"))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn store_error(e: ServiceError) -> CoreError {
    e.into_core(CoreError::Store)
}

/// Ids may be uuids or integers depending on the table
fn id_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct TierRow {
    subscription_status: Option<String>,
}

#[derive(Serialize)]
struct PurchaseInsert<'a> {
    user_id: Option<&'a str>,
    model_id: &'a str,
    stripe_session_id: &'a str,
    amount_paid: Decimal,
    payment_status: &'static str,
}

impl<'a> From<&'a NewPurchase> for PurchaseInsert<'a> {
    fn from(p: &'a NewPurchase) -> Self {
        Self {
            user_id: p.user_id.as_ref().map(UserId::as_str),
            model_id: p.model_id.as_str(),
            stripe_session_id: &p.session_id,
            amount_paid: p.amount_paid,
            payment_status: p.payment_status.as_str(),
        }
    }
}

#[derive(Deserialize)]
struct PurchaseRow {
    id: Value,
    user_id: Option<String>,
    model_id: Value,
    stripe_session_id: String,
    amount_paid: Decimal,
    created_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Self {
            id: id_string(row.id),
            user_id: row.user_id.map(UserId::from_string),
            model_id: ModelId::from_string(id_string(row.model_id)),
            session_id: row.stripe_session_id,
            amount_paid: row.amount_paid,
            payment_status: PaymentStatus::Completed,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ModelRow {
    id: Value,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    files_list: Option<Value>,
}

impl From<ModelRow> for CatalogModel {
    fn from(row: ModelRow) -> Self {
        // files_list is free-form JSON; anything but an array of {name, path} counts as missing
        let files = row
            .files_list
            .and_then(|v| serde_json::from_value::<Vec<ModelFile>>(v).ok())
            .filter(|files| !files.is_empty());

        Self {
            id: ModelId::from_string(id_string(row.id)),
            is_free: row.is_free.unwrap_or(false),
            files,
        }
    }
}

#[derive(Deserialize)]
struct AdminUser {
    email: Option<String>,
}

#[async_trait]
impl CommerceStore for PostgrestStore {
    async fn subscription_tier(&self, user_id: &UserId) -> CoreResult<Option<SubscriptionTier>> {
        let rows: Vec<TierRow> = SupabaseClient::send_json(
            self.table(Method::GET, "users")
                .query(&[("id", eq(user_id.as_str())), ("select", "subscription_status".into())]),
        )
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().next().map(|row| {
            row.subscription_status
                .as_deref()
                .map_or(SubscriptionTier::Free, SubscriptionTier::from_str)
        }))
    }

    async fn insert_purchases(&self, purchases: &[NewPurchase]) -> CoreResult<Vec<Purchase>> {
        if purchases.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<PurchaseInsert<'_>> = purchases.iter().map(PurchaseInsert::from).collect();
        let rows: Vec<PurchaseRow> = SupabaseClient::send_json(
            self.table(Method::POST, "purchases")
                .header("Prefer", "return=representation")
                .json(&body),
        )
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Purchase::from).collect())
    }

    async fn has_purchase(&self, user_id: &UserId, model_id: &ModelId) -> CoreResult<bool> {
        let rows: Vec<Value> = SupabaseClient::send_json(self.table(Method::GET, "purchases").query(&[
            ("user_id", eq(user_id.as_str())),
            ("model_id", eq(model_id.as_str())),
            ("select", "id".into()),
            ("limit", "1".into()),
        ]))
        .await
        .map_err(store_error)?;

        Ok(!rows.is_empty())
    }

    async fn activate_subscription(&self, activation: &SubscriptionActivation) -> CoreResult<()> {
        // Two requests: if the history insert fails the profile already carries
        // the new tier. The error is surfaced so the caller logs it.
        SupabaseClient::send(
            self.table(Method::PATCH, "users")
                .query(&[("id", eq(activation.user_id.as_str()))])
                .json(&json!({
                    "subscription_status": activation.plan_type.as_str(),
                    "subscription_id": activation.subscription_id,
                    "stripe_customer_id": activation.customer_id,
                })),
        )
        .await
        .map_err(store_error)?;

        SupabaseClient::send(self.table(Method::POST, "user_subscriptions").json(&json!({
            "user_id": activation.user_id.as_str(),
            "stripe_subscription_id": activation.subscription_id,
            "plan_type": activation.plan_type.as_str(),
            "status": activation.status,
            "current_period_start": activation.current_period_start,
            "current_period_end": activation.current_period_end,
        })))
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = %activation.user_id,
                subscription_id = %activation.subscription_id,
                "Profile updated but subscription history insert failed"
            );
            store_error(e)
        })
    }

    async fn apply_subscription_change(&self, change: &SubscriptionChange) -> CoreResult<()> {
        if change.tier_change == TierChange::Downgrade {
            SupabaseClient::send(
                self.table(Method::PATCH, "users")
                    .query(&[("subscription_id", eq(&change.subscription_id))])
                    .json(&json!({ "subscription_status": SubscriptionTier::Free.as_str() })),
            )
            .await
            .map_err(store_error)?;
        }

        let mut update = json!({
            "status": change.status,
            "cancel_at_period_end": change.cancel_at_period_end,
        });
        if let Some(end) = change.current_period_end {
            update["current_period_end"] = json!(end);
        }

        SupabaseClient::send(
            self.table(Method::PATCH, "user_subscriptions")
                .query(&[("stripe_subscription_id", eq(&change.subscription_id))])
                .json(&update),
        )
        .await
        .map_err(store_error)
    }

    async fn catalog_model(&self, model_id: &ModelId) -> CoreResult<Option<CatalogModel>> {
        let rows: Vec<ModelRow> = SupabaseClient::send_json(self.table(Method::GET, "models").query(&[
            ("id", eq(model_id.as_str())),
            ("select", "id,is_free,files_list".into()),
        ]))
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().next().map(CatalogModel::from))
    }

    async fn user_email(&self, user_id: &UserId) -> CoreResult<Option<String>> {
        let Some(path) = admin_user_path(user_id) else {
            tracing::warn!(user_id = %user_id, "Rejecting malformed auth user id");
            return Ok(None);
        };
        match SupabaseClient::send_json::<AdminUser>(self.client.request(Method::GET, &path)).await {
            Ok(user) => Ok(user.email.filter(|e| !e.is_empty())),
            Err(ServiceError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }
}

/// Admin lookup path; auth ids are UUIDs, anything else never reaches the URL
fn admin_user_path(user_id: &UserId) -> Option<String> {
    let id = uuid::Uuid::parse_str(user_id.as_str()).ok()?;
    Some(format!("/auth/v1/admin/users/{}", id.hyphenated()))
}
