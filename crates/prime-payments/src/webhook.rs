//! Payment Webhook Reconciliation
//!
//! Turns verified provider events into persisted purchases and subscription
//! state. Reconciliation never fails the webhook response: every problem is
//! logged and reported in the returned [`Reconciliation`] so the provider
//! still gets its acknowledgement.

use chrono::{DateTime, Utc};
use prime_core::model::{format_amount, minor_to_major};
use prime_core::notify::{first_name, order_reference, ReceiptEmail, ReceiptLine};
use prime_core::{
    CommerceStore, Delivery, ModelId, NewPurchase, Notifier, PaymentStatus, Requester,
    SubscriptionActivation, SubscriptionChange, SubscriptionTier, TierChange, UserId,
};
use std::sync::Arc;

use crate::event::{CompletedSession, SessionMode, SubscriptionUpdate, WebhookEvent};
use crate::gateway::{PaidLineItem, PaymentGateway};

/// Where a reconciliation stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    LineItems,
    Subscription,
    Store,
}

/// What happened to the receipt after purchases were stored
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    Sent,
    Skipped,
    /// The session captured no email address
    NoRecipient,
    Failed(String),
}

/// Outcome of handling one webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    PurchasesRecorded {
        session_id: String,
        count: usize,
        receipt: ReceiptStatus,
    },
    SubscriptionActivated {
        user_id: UserId,
        subscription_id: String,
        plan_type: SubscriptionTier,
    },
    SubscriptionUpdated {
        subscription_id: String,
        tier_change: TierChange,
    },
    /// Nothing to do for this event
    Skipped { reason: String },
    /// A step failed; the error was logged
    Failed { stage: Stage, error: String },
    Ignored { event_type: String },
}

/// Webhook reconciler
pub struct WebhookReconciler {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn CommerceStore>,
    notifier: Arc<dyn Notifier>,
}

impl WebhookReconciler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn CommerceStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
        }
    }

    /// Process a verified webhook event
    pub async fn handle(&self, event: WebhookEvent) -> Reconciliation {
        tracing::info!(event_type = %event.event_type(), "Processing payment webhook");

        match event {
            WebhookEvent::CheckoutCompleted(session) => match session.mode {
                SessionMode::Payment => self.record_purchases(&session).await,
                SessionMode::Subscription => self.activate_subscription(&session).await,
                SessionMode::Other => skipped(&session.id, "Unsupported checkout mode"),
            },
            WebhookEvent::SubscriptionChanged(update) => self.update_subscription(&update).await,
            WebhookEvent::Ignored { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Reconciliation::Ignored { event_type }
            }
        }
    }

    async fn record_purchases(&self, session: &CompletedSession) -> Reconciliation {
        let line_items = match self.gateway.list_line_items(&session.id).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "Failed to fetch line items");
                return failed(Stage::LineItems, &e);
            }
        };

        let requester = Requester::from_user_id(session.metadata_value("user_id"));
        let purchases: Vec<NewPurchase> = line_items
            .iter()
            .filter_map(|item| {
                let model_id = item.model_id()?;
                let amount = item.amount_total?;
                Some(NewPurchase {
                    user_id: requester.user_id().cloned(),
                    model_id: ModelId::from_string(model_id),
                    session_id: session.id.clone(),
                    amount_paid: minor_to_major(amount),
                    payment_status: PaymentStatus::Completed,
                })
            })
            .collect();

        if purchases.is_empty() {
            return skipped(&session.id, "No line items reference a model");
        }

        let inserted = match self.store.insert_purchases(&purchases).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    session_id = %session.id,
                    user_id = %requester,
                    error = %e,
                    "Failed to record purchases"
                );
                return failed(Stage::Store, &e);
            }
        };

        tracing::info!(
            session_id = %session.id,
            user_id = %requester,
            count = inserted.len(),
            "Recorded purchases"
        );

        let receipt = self.send_receipt(session, &line_items).await;

        Reconciliation::PurchasesRecorded {
            session_id: session.id.clone(),
            count: inserted.len(),
            receipt,
        }
    }

    async fn send_receipt(&self, session: &CompletedSession, line_items: &[PaidLineItem]) -> ReceiptStatus {
        let Some(to) = session.customer_email() else {
            tracing::debug!(session_id = %session.id, "No customer email, skipping receipt");
            return ReceiptStatus::NoRecipient;
        };

        let email = ReceiptEmail {
            to: to.to_string(),
            first_name: first_name(session.customer_name()),
            items: line_items
                .iter()
                .map(|item| ReceiptLine {
                    title: item.product_name.clone().unwrap_or_else(|| "3D Model".into()),
                    author: item.author().unwrap_or("creator").to_string(),
                    price: format_amount(minor_to_major(item.amount_total.unwrap_or(0))),
                })
                .collect(),
            total: format_amount(minor_to_major(session.amount_total.unwrap_or(0))),
            order_id: order_reference(session.payment_intent.as_deref(), &session.id),
        };

        match self.notifier.send_receipt(&email).await {
            Ok(Delivery::Sent { .. }) => ReceiptStatus::Sent,
            Ok(Delivery::Skipped) => ReceiptStatus::Skipped,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Receipt email failed");
                ReceiptStatus::Failed(e.to_string())
            }
        }
    }

    async fn activate_subscription(&self, session: &CompletedSession) -> Reconciliation {
        let Some(user_id) = Requester::from_user_id(session.metadata_value("user_id"))
            .user_id()
            .cloned()
        else {
            return skipped(&session.id, "Subscription checkout without a user");
        };
        let Some(subscription_id) = session.subscription.clone() else {
            return skipped(&session.id, "Subscription checkout without a subscription id");
        };
        let Some(plan) = session
            .metadata_value("plan_type")
            .filter(|p| !p.trim().is_empty())
        else {
            return skipped(&session.id, "Subscription checkout without a plan");
        };
        let plan_type = SubscriptionTier::from_str(plan);

        let details = match self.gateway.retrieve_subscription(&subscription_id).await {
            Ok(details) => details,
            Err(e) => {
                tracing::error!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Failed to fetch subscription"
                );
                return failed(Stage::Subscription, &e);
            }
        };

        let (Some(current_period_start), Some(current_period_end)) = (
            timestamp(details.current_period_start),
            timestamp(details.current_period_end),
        ) else {
            tracing::error!(subscription_id = %subscription_id, "Subscription period out of range");
            return Reconciliation::Failed {
                stage: Stage::Subscription,
                error: "Subscription period out of range".into(),
            };
        };

        let activation = SubscriptionActivation {
            user_id: user_id.clone(),
            plan_type,
            subscription_id: subscription_id.clone(),
            customer_id: session.customer.clone(),
            status: details.status,
            current_period_start,
            current_period_end,
        };

        if let Err(e) = self.store.activate_subscription(&activation).await {
            tracing::error!(
                user_id = %user_id,
                subscription_id = %subscription_id,
                error = %e,
                "Failed to activate subscription"
            );
            return failed(Stage::Store, &e);
        }

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription_id,
            plan = %plan_type,
            "Activated subscription"
        );

        Reconciliation::SubscriptionActivated {
            user_id,
            subscription_id,
            plan_type,
        }
    }

    async fn update_subscription(&self, update: &SubscriptionUpdate) -> Reconciliation {
        let change = SubscriptionChange {
            subscription_id: update.id.clone(),
            status: update.status.clone(),
            tier_change: TierChange::for_status(&update.status),
            current_period_end: update.current_period_end().and_then(timestamp),
            cancel_at_period_end: update.cancel_at_period_end,
        };

        if let Err(e) = self.store.apply_subscription_change(&change).await {
            tracing::error!(subscription_id = %update.id, error = %e, "Failed to update subscription");
            return failed(Stage::Store, &e);
        }

        tracing::info!(
            subscription_id = %update.id,
            status = %update.status,
            tier_change = ?change.tier_change,
            "Updated subscription"
        );

        Reconciliation::SubscriptionUpdated {
            subscription_id: change.subscription_id,
            tier_change: change.tier_change,
        }
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn skipped(session_id: &str, reason: &str) -> Reconciliation {
    tracing::warn!(session_id = %session_id, reason, "Skipping checkout session");
    Reconciliation::Skipped {
        reason: reason.to_string(),
    }
}

fn failed(stage: Stage, error: &impl std::fmt::Display) -> Reconciliation {
    Reconciliation::Failed {
        stage,
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CustomerDetails;
    use crate::gateway::{MockGateway, SubscriptionDetails, AUTHOR_KEY, MODEL_ID_KEY};
    use async_trait::async_trait;
    use prime_core::notify::Notification;
    use prime_core::{
        CatalogModel, CoreError, MemoryStore, OutboxNotifier, Purchase, UserProfile,
    };
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    /// Store whose writes always fail
    struct ReadOnlyStore;

    #[async_trait]
    impl CommerceStore for ReadOnlyStore {
        async fn subscription_tier(&self, _: &UserId) -> prime_core::Result<Option<SubscriptionTier>> {
            Ok(None)
        }
        async fn insert_purchases(&self, _: &[NewPurchase]) -> prime_core::Result<Vec<Purchase>> {
            Err(CoreError::Store("permission denied for table purchases".into()))
        }
        async fn has_purchase(&self, _: &UserId, _: &ModelId) -> prime_core::Result<bool> {
            Ok(false)
        }
        async fn activate_subscription(&self, _: &SubscriptionActivation) -> prime_core::Result<()> {
            Err(CoreError::Store("permission denied for table users".into()))
        }
        async fn apply_subscription_change(&self, _: &SubscriptionChange) -> prime_core::Result<()> {
            Err(CoreError::Store("permission denied for table users".into()))
        }
        async fn catalog_model(&self, _: &ModelId) -> prime_core::Result<Option<CatalogModel>> {
            Ok(None)
        }
        async fn user_email(&self, _: &UserId) -> prime_core::Result<Option<String>> {
            Ok(None)
        }
    }

    struct Harness {
        gateway: Arc<MockGateway>,
        store: Arc<MemoryStore>,
        outbox: Arc<OutboxNotifier>,
        reconciler: WebhookReconciler,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(OutboxNotifier::new());
        let reconciler = WebhookReconciler::new(gateway.clone(), store.clone(), outbox.clone());
        Harness {
            gateway,
            store,
            outbox,
            reconciler,
        }
    }

    fn paid_item(model_id: Option<&str>, name: &str, amount: Option<i64>) -> PaidLineItem {
        let mut metadata = BTreeMap::new();
        if let Some(id) = model_id {
            metadata.insert(MODEL_ID_KEY.to_string(), id.to_string());
            metadata.insert(AUTHOR_KEY.to_string(), "ana".to_string());
        }
        PaidLineItem {
            product_name: Some(name.to_string()),
            product_metadata: metadata,
            amount_total: amount,
        }
    }

    fn payment_session(user_id: &str, email: Option<&str>) -> CompletedSession {
        let mut metadata = BTreeMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert("item_ids".to_string(), "m2".to_string());
        CompletedSession {
            id: "cs_test_a1b2c3d4e5f6g7h8".into(),
            mode: SessionMode::Payment,
            metadata,
            customer_details: Some(CustomerDetails {
                email: email.map(String::from),
                name: Some("Ana Souza".into()),
            }),
            amount_total: Some(800),
            payment_intent: None,
            subscription: None,
            customer: None,
        }
    }

    fn subscription_session(user_id: &str, plan: &str) -> CompletedSession {
        let mut metadata = BTreeMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert("plan_type".to_string(), plan.to_string());
        CompletedSession {
            id: "cs_test_sub".into(),
            mode: SessionMode::Subscription,
            metadata,
            customer_details: None,
            amount_total: Some(2990),
            payment_intent: None,
            subscription: Some("sub_1".into()),
            customer: Some("cus_1".into()),
        }
    }

    fn subscription_update(status: &str) -> SubscriptionUpdate {
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": {"object": {
                "id": "sub_1",
                "status": status,
                "current_period_end": 1_740_000_000,
                "cancel_at_period_end": true
            }}
        })
        .to_string();
        match WebhookEvent::decode(&payload).unwrap() {
            WebhookEvent::SubscriptionChanged(update) => update,
            other => panic!("unexpected event {other:?}"),
        }
    }

    async fn activated(h: &Harness) {
        h.gateway
            .register_subscription(SubscriptionDetails {
                id: "sub_1".into(),
                status: "active".into(),
                current_period_start: 1_735_689_600,
                current_period_end: 1_738_368_000,
                cancel_at_period_end: false,
            })
            .await;
        let outcome = h
            .reconciler
            .handle(WebhookEvent::CheckoutCompleted(subscription_session("u1", "pro")))
            .await;
        assert!(matches!(outcome, Reconciliation::SubscriptionActivated { .. }));
    }

    #[tokio::test]
    async fn test_completed_payment_records_purchase_and_receipt() {
        let h = harness();
        h.gateway
            .register_line_items("cs_test_a1b2c3d4e5f6g7h8", vec![paid_item(Some("m2"), "Benchy", Some(800))])
            .await;

        let outcome = h
            .reconciler
            .handle(WebhookEvent::CheckoutCompleted(payment_session("u1", Some("ana@example.com"))))
            .await;

        assert_eq!(
            outcome,
            Reconciliation::PurchasesRecorded {
                session_id: "cs_test_a1b2c3d4e5f6g7h8".into(),
                count: 1,
                receipt: ReceiptStatus::Sent,
            }
        );

        let purchases = h.store.purchases().await;
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].model_id.as_str(), "m2");
        assert_eq!(purchases[0].amount_paid, dec!(8.00));
        assert_eq!(purchases[0].payment_status, PaymentStatus::Completed);
        assert_eq!(purchases[0].user_id, Some(UserId::from_string("u1")));

        let sent = h.outbox.sent().await;
        assert_eq!(sent.len(), 1);
        let Notification::Receipt(receipt) = &sent[0] else {
            panic!("expected receipt");
        };
        assert_eq!(receipt.to, "ana@example.com");
        assert_eq!(receipt.first_name, "Ana");
        assert_eq!(receipt.total, "8.00");
        assert_eq!(receipt.order_id, "e5f6g7h8");
        assert_eq!(receipt.items[0].title, "Benchy");
        assert_eq!(receipt.items[0].author, "ana");
        assert_eq!(receipt.items[0].price, "8.00");
    }

    #[tokio::test]
    async fn test_redelivery_duplicates_purchases() {
        let h = harness();
        h.gateway
            .register_line_items("cs_test_a1b2c3d4e5f6g7h8", vec![paid_item(Some("m2"), "Benchy", Some(800))])
            .await;

        for _ in 0..2 {
            h.reconciler
                .handle(WebhookEvent::CheckoutCompleted(payment_session("u1", None)))
                .await;
        }

        assert_eq!(h.store.purchases().await.len(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_purchase_has_no_owner() {
        let h = harness();
        h.gateway
            .register_line_items("cs_test_a1b2c3d4e5f6g7h8", vec![paid_item(Some("m2"), "Benchy", Some(800))])
            .await;

        let outcome = h
            .reconciler
            .handle(WebhookEvent::CheckoutCompleted(payment_session("anonymous", None)))
            .await;

        assert!(matches!(
            outcome,
            Reconciliation::PurchasesRecorded {
                receipt: ReceiptStatus::NoRecipient,
                ..
            }
        ));
        assert_eq!(h.store.purchases().await[0].user_id, None);
        assert!(h.outbox.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_lines_without_model_or_amount_skipped() {
        let h = harness();
        h.gateway
            .register_line_items(
                "cs_test_a1b2c3d4e5f6g7h8",
                vec![
                    paid_item(Some("m2"), "Benchy", Some(800)),
                    paid_item(None, "Gift wrap", Some(200)),
                    paid_item(Some("m3"), "Vase", None),
                ],
            )
            .await;

        h.reconciler
            .handle(WebhookEvent::CheckoutCompleted(payment_session("u1", Some("ana@example.com"))))
            .await;

        let purchases = h.store.purchases().await;
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].model_id.as_str(), "m2");

        // The receipt still lists every charged line
        let sent = h.outbox.sent().await;
        let Notification::Receipt(receipt) = &sent[0] else {
            panic!("expected receipt");
        };
        assert_eq!(receipt.items.len(), 3);
        assert_eq!(receipt.items[2].price, "0.00");
    }

    #[tokio::test]
    async fn test_line_item_fetch_failure_drops_event() {
        let h = harness();

        let outcome = h
            .reconciler
            .handle(WebhookEvent::CheckoutCompleted(payment_session("u1", Some("ana@example.com"))))
            .await;

        assert!(matches!(
            outcome,
            Reconciliation::Failed {
                stage: Stage::LineItems,
                ..
            }
        ));
        assert_eq!(h.gateway.line_item_calls().await, 1);
        assert!(h.store.purchases().await.is_empty());
        assert!(h.outbox.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_sends_no_receipt() {
        let gateway = Arc::new(MockGateway::new());
        gateway
            .register_line_items("cs_test_a1b2c3d4e5f6g7h8", vec![paid_item(Some("m2"), "Benchy", Some(800))])
            .await;
        let outbox = Arc::new(OutboxNotifier::new());
        let reconciler = WebhookReconciler::new(gateway, Arc::new(ReadOnlyStore), outbox.clone());

        let outcome = reconciler
            .handle(WebhookEvent::CheckoutCompleted(payment_session("u1", Some("ana@example.com"))))
            .await;

        assert!(matches!(
            outcome,
            Reconciliation::Failed {
                stage: Stage::Store,
                ..
            }
        ));
        assert!(outbox.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_receipt_failure_is_swallowed() {
        let gateway = Arc::new(MockGateway::new());
        gateway
            .register_line_items("cs_test_a1b2c3d4e5f6g7h8", vec![paid_item(Some("m2"), "Benchy", Some(800))])
            .await;
        let store = Arc::new(MemoryStore::new());
        let reconciler =
            WebhookReconciler::new(gateway, store.clone(), Arc::new(OutboxNotifier::failing()));

        let outcome = reconciler
            .handle(WebhookEvent::CheckoutCompleted(payment_session("u1", Some("ana@example.com"))))
            .await;

        assert!(matches!(
            outcome,
            Reconciliation::PurchasesRecorded {
                receipt: ReceiptStatus::Failed(_),
                ..
            }
        ));
        assert_eq!(store.purchases().await.len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_checkout_activates_plan() {
        let h = harness();
        h.store.upsert_profile(UserProfile::new(UserId::from_string("u1"))).await;

        activated(&h).await;

        let profile = h.store.profile(&UserId::from_string("u1")).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionTier::Pro);
        assert_eq!(profile.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(profile.customer_id.as_deref(), Some("cus_1"));

        let records = h.store.subscription_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].plan_type, SubscriptionTier::Pro);
        assert_eq!(records[0].status, "active");
        assert_eq!(records[0].current_period_start.timestamp(), 1_735_689_600);
    }

    #[tokio::test]
    async fn test_subscription_checkout_without_plan_keeps_tier() {
        let h = harness();
        let mut profile = UserProfile::new(UserId::from_string("u1"));
        profile.subscription_status = SubscriptionTier::Pro;
        h.store.upsert_profile(profile).await;

        let mut session = subscription_session("u1", "pro");
        session.metadata.remove("plan_type");
        let outcome = h.reconciler.handle(WebhookEvent::CheckoutCompleted(session)).await;

        assert!(matches!(outcome, Reconciliation::Skipped { .. }));
        let profile = h.store.profile(&UserId::from_string("u1")).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionTier::Pro);
        assert!(h.store.subscription_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_fetch_failure_writes_nothing() {
        let h = harness();

        let outcome = h
            .reconciler
            .handle(WebhookEvent::CheckoutCompleted(subscription_session("u1", "premium")))
            .await;

        assert!(matches!(
            outcome,
            Reconciliation::Failed {
                stage: Stage::Subscription,
                ..
            }
        ));
        assert!(h.store.profile(&UserId::from_string("u1")).await.is_none());
        assert!(h.store.subscription_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_canceled_subscription_downgrades() {
        let h = harness();
        activated(&h).await;

        let outcome = h
            .reconciler
            .handle(WebhookEvent::SubscriptionChanged(subscription_update("canceled")))
            .await;

        assert_eq!(
            outcome,
            Reconciliation::SubscriptionUpdated {
                subscription_id: "sub_1".into(),
                tier_change: TierChange::Downgrade,
            }
        );

        let profile = h.store.profile(&UserId::from_string("u1")).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionTier::Free);

        let record = &h.store.subscription_records().await[0];
        assert_eq!(record.status, "canceled");
        assert!(record.cancel_at_period_end);
        assert_eq!(record.current_period_end.timestamp(), 1_740_000_000);
    }

    #[tokio::test]
    async fn test_active_subscription_keeps_tier() {
        let h = harness();
        activated(&h).await;

        h.reconciler
            .handle(WebhookEvent::SubscriptionChanged(subscription_update("active")))
            .await;

        let profile = h.store.profile(&UserId::from_string("u1")).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionTier::Pro);
    }

    #[tokio::test]
    async fn test_store_failure_on_update_is_reported() {
        let reconciler = WebhookReconciler::new(
            Arc::new(MockGateway::new()),
            Arc::new(ReadOnlyStore),
            Arc::new(OutboxNotifier::new()),
        );

        let outcome = reconciler
            .handle(WebhookEvent::SubscriptionChanged(subscription_update("past_due")))
            .await;

        assert!(matches!(outcome, Reconciliation::Failed { stage: Stage::Store, .. }));
    }

    #[tokio::test]
    async fn test_ignored_event() {
        let h = harness();
        let outcome = h
            .reconciler
            .handle(WebhookEvent::Ignored {
                event_type: "invoice.paid".into(),
            })
            .await;

        assert_eq!(
            outcome,
            Reconciliation::Ignored {
                event_type: "invoice.paid".into()
            }
        );
        assert_eq!(h.gateway.line_item_calls().await, 0);
    }
}
