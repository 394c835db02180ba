//! Domain Model
//!
//! Identifiers, subscription tiers and the persistent records produced by
//! checkout and webhook reconciliation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Literal user id recorded for buyers who were not signed in
pub const ANONYMOUS_SENTINEL: &str = "anonymous";

/// Authenticated user identifier (issued by the auth provider)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog model identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is paying: a signed-in user or an anonymous buyer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    User(UserId),
}

impl Requester {
    /// Interpret an optional user id; missing, blank and the anonymous
    /// sentinel all mean an anonymous buyer.
    pub fn from_user_id(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim) {
            None | Some("" | ANONYMOUS_SENTINEL) => Self::Anonymous,
            Some(id) => Self::User(UserId::from_string(id)),
        }
    }

    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }

    /// Value written into checkout session metadata
    pub fn as_metadata(&self) -> &str {
        match self {
            Self::Anonymous => ANONYMOUS_SENTINEL,
            Self::User(id) => id.as_str(),
        }
    }
}

impl std::fmt::Display for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_metadata())
    }
}

/// Subscription tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Premium,
}

impl SubscriptionTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    /// Unknown values fall back to `Free`
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pro" => Self::Pro,
            "premium" => Self::Premium,
            _ => Self::Free,
        }
    }

    /// Price multiplier applied at checkout
    pub fn discount_multiplier(&self) -> Decimal {
        match self {
            Self::Free => dec!(1),
            Self::Pro => dec!(0.8),
            Self::Premium => dec!(0.5),
        }
    }

    /// Paying tiers may download every catalog model
    pub const fn unlocks_catalog(&self) -> bool {
        matches!(self, Self::Pro | Self::Premium)
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User profile fields owned by the billing flow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub subscription_status: SubscriptionTier,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub const fn new(id: UserId) -> Self {
        Self {
            id,
            subscription_status: SubscriptionTier::Free,
            subscription_id: None,
            customer_id: None,
            email: None,
        }
    }

    pub const fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.subscription_status = tier;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Payment status of a purchase row
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Completed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
        }
    }
}

/// Purchase staged by the reconciler, before the store assigns an id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    /// `None` for anonymous buyers
    pub user_id: Option<UserId>,
    pub model_id: ModelId,
    /// Originating checkout session
    pub session_id: String,
    /// Exact amount charged for this line item (major units)
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
}

/// A persisted purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub user_id: Option<UserId>,
    pub model_id: ModelId,
    pub session_id: String,
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn from_new(id: impl Into<String>, purchase: NewPurchase, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user_id: purchase.user_id,
            model_id: purchase.model_id,
            session_id: purchase.session_id,
            amount_paid: purchase.amount_paid,
            payment_status: purchase.payment_status,
            created_at,
        }
    }
}

/// One historical subscription period
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub external_subscription_id: String,
    pub plan_type: SubscriptionTier,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}

/// Everything written when a subscription checkout completes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionActivation {
    pub user_id: UserId,
    pub plan_type: SubscriptionTier,
    pub subscription_id: String,
    pub customer_id: Option<String>,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

impl SubscriptionActivation {
    pub fn record(&self) -> SubscriptionRecord {
        SubscriptionRecord {
            user_id: self.user_id.clone(),
            external_subscription_id: self.subscription_id.clone(),
            plan_type: self.plan_type,
            status: self.status.clone(),
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            cancel_at_period_end: false,
        }
    }
}

/// Effect of a subscription lifecycle event on the profile tier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierChange {
    /// Leave `subscription_status` as it is
    Keep,
    /// Revert `subscription_status` to `free`
    Downgrade,
}

impl TierChange {
    /// Only an `active` subscription keeps its tier; every other provider
    /// status (`canceled`, `past_due`, `trialing`, ...) downgrades.
    pub fn for_status(status: &str) -> Self {
        if status == "active" {
            Self::Keep
        } else {
            Self::Downgrade
        }
    }
}

/// Changes carried by a subscription updated/deleted event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub subscription_id: String,
    pub status: String,
    pub tier_change: TierChange,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// A file belonging to a catalog model, addressed inside object storage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub path: String,
}

/// The catalog fields the entitlement check needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub id: ModelId,
    pub is_free: bool,
    /// `None` for models that were never fully onboarded
    pub files: Option<Vec<ModelFile>>,
}

/// Convert an amount in minor units (cents) to major units
pub fn minor_to_major(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Format a major-unit amount with two decimals ("8.00")
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}
