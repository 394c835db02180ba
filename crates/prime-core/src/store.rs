//! Commerce Store
//!
//! Persistence seam for profiles, purchases, subscription history and the
//! catalog fields the billing flow reads.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{
    CatalogModel, ModelId, NewPurchase, Purchase, SubscriptionActivation, SubscriptionChange,
    SubscriptionRecord, SubscriptionTier, TierChange, UserId, UserProfile,
};

/// Storage trait for the order fulfillment flow
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Subscription tier of a user, `None` when the profile does not exist
    async fn subscription_tier(&self, user_id: &UserId) -> Result<Option<SubscriptionTier>>;

    /// Insert all purchases in one operation
    async fn insert_purchases(&self, purchases: &[NewPurchase]) -> Result<Vec<Purchase>>;

    /// Whether any purchase row exists for the pair
    async fn has_purchase(&self, user_id: &UserId, model_id: &ModelId) -> Result<bool>;

    /// Update the profile and record the new subscription period
    async fn activate_subscription(&self, activation: &SubscriptionActivation) -> Result<()>;

    /// Apply a lifecycle change to the profile and the matching record
    async fn apply_subscription_change(&self, change: &SubscriptionChange) -> Result<()>;

    /// Catalog entry for a model
    async fn catalog_model(&self, model_id: &ModelId) -> Result<Option<CatalogModel>>;

    /// Account email (from the auth provider's admin API)
    async fn user_email(&self, user_id: &UserId) -> Result<Option<String>>;
}

#[derive(Default)]
struct Tables {
    profiles: HashMap<UserId, UserProfile>,
    purchases: Vec<Purchase>,
    subscriptions: Vec<SubscriptionRecord>,
    models: HashMap<ModelId, CatalogModel>,
}

/// In-memory store (for development and tests)
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_profile(&self, profile: UserProfile) {
        let mut tables = self.tables.write().await;
        tables.profiles.insert(profile.id.clone(), profile);
    }

    pub async fn insert_model(&self, model: CatalogModel) {
        let mut tables = self.tables.write().await;
        tables.models.insert(model.id.clone(), model);
    }

    pub async fn profile(&self, user_id: &UserId) -> Option<UserProfile> {
        self.tables.read().await.profiles.get(user_id).cloned()
    }

    pub async fn purchases(&self) -> Vec<Purchase> {
        self.tables.read().await.purchases.clone()
    }

    pub async fn subscription_records(&self) -> Vec<SubscriptionRecord> {
        self.tables.read().await.subscriptions.clone()
    }
}

#[async_trait]
impl CommerceStore for MemoryStore {
    async fn subscription_tier(&self, user_id: &UserId) -> Result<Option<SubscriptionTier>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.get(user_id).map(|p| p.subscription_status))
    }

    async fn insert_purchases(&self, purchases: &[NewPurchase]) -> Result<Vec<Purchase>> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let inserted: Vec<Purchase> = purchases
            .iter()
            .cloned()
            .map(|p| Purchase::from_new(uuid::Uuid::new_v4().to_string(), p, now))
            .collect();

        tables.purchases.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn has_purchase(&self, user_id: &UserId, model_id: &ModelId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .purchases
            .iter()
            .any(|p| p.user_id.as_ref() == Some(user_id) && &p.model_id == model_id))
    }

    async fn activate_subscription(&self, activation: &SubscriptionActivation) -> Result<()> {
        // Single write lock: profile and history change together
        let mut tables = self.tables.write().await;

        let profile = tables
            .profiles
            .entry(activation.user_id.clone())
            .or_insert_with(|| UserProfile::new(activation.user_id.clone()));
        profile.subscription_status = activation.plan_type;
        profile.subscription_id = Some(activation.subscription_id.clone());
        profile.customer_id.clone_from(&activation.customer_id);

        tables.subscriptions.push(activation.record());
        Ok(())
    }

    async fn apply_subscription_change(&self, change: &SubscriptionChange) -> Result<()> {
        let mut tables = self.tables.write().await;

        if change.tier_change == TierChange::Downgrade {
            for profile in tables
                .profiles
                .values_mut()
                .filter(|p| p.subscription_id.as_deref() == Some(change.subscription_id.as_str()))
            {
                profile.subscription_status = SubscriptionTier::Free;
            }
        }

        for record in tables
            .subscriptions
            .iter_mut()
            .filter(|r| r.external_subscription_id == change.subscription_id)
        {
            record.status.clone_from(&change.status);
            if let Some(end) = change.current_period_end {
                record.current_period_end = end;
            }
            record.cancel_at_period_end = change.cancel_at_period_end;
        }

        Ok(())
    }

    async fn catalog_model(&self, model_id: &ModelId) -> Result<Option<CatalogModel>> {
        Ok(self.tables.read().await.models.get(model_id).cloned())
    }

    async fn user_email(&self, user_id: &UserId) -> Result<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.get(user_id).and_then(|p| p.email.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PaymentStatus;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn purchase(user: Option<&str>, model: &str) -> NewPurchase {
        NewPurchase {
            user_id: user.map(UserId::from_string),
            model_id: ModelId::from_string(model),
            session_id: "cs_test_1".into(),
            amount_paid: dec!(8.00),
            payment_status: PaymentStatus::Completed,
        }
    }

    fn activation(user: &str, sub: &str) -> SubscriptionActivation {
        SubscriptionActivation {
            user_id: UserId::from_string(user),
            plan_type: SubscriptionTier::Premium,
            subscription_id: sub.into(),
            customer_id: Some("cus_1".into()),
            status: "active".into(),
            current_period_start: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            current_period_end: Utc.timestamp_opt(1_702_592_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_purchases_are_kept() {
        let store = MemoryStore::new();
        store.insert_purchases(&[purchase(Some("u1"), "m1")]).await.unwrap();
        store.insert_purchases(&[purchase(Some("u1"), "m1")]).await.unwrap();

        let rows = store.purchases().await;
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].id, rows[1].id);
        assert!(store
            .has_purchase(&UserId::from_string("u1"), &ModelId::from_string("m1"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_anonymous_purchase_grants_nobody() {
        let store = MemoryStore::new();
        store.insert_purchases(&[purchase(None, "m1")]).await.unwrap();

        assert!(!store
            .has_purchase(&UserId::from_string("u1"), &ModelId::from_string("m1"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_activation_updates_profile_and_history() {
        let store = MemoryStore::new();
        store.activate_subscription(&activation("u1", "sub_1")).await.unwrap();

        let profile = store.profile(&UserId::from_string("u1")).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionTier::Premium);
        assert_eq!(profile.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(profile.customer_id.as_deref(), Some("cus_1"));

        let records = store.subscription_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, "active");
    }

    #[tokio::test]
    async fn test_keep_leaves_tier() {
        let store = MemoryStore::new();
        store.activate_subscription(&activation("u1", "sub_1")).await.unwrap();

        store
            .apply_subscription_change(&SubscriptionChange {
                subscription_id: "sub_1".into(),
                status: "active".into(),
                tier_change: TierChange::Keep,
                current_period_end: None,
                cancel_at_period_end: true,
            })
            .await
            .unwrap();

        let tier = store.subscription_tier(&UserId::from_string("u1")).await.unwrap();
        assert_eq!(tier, Some(SubscriptionTier::Premium));
        assert!(store.subscription_records().await[0].cancel_at_period_end);
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let store = MemoryStore::new();
        let model = store.catalog_model(&ModelId::from_string("nope")).await.unwrap();
        assert!(model.is_none());
    }
}
