//! # prime-core
//!
//! Domain model and business rules for the STL Prime order fulfillment flow.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌────────────────────┐    ┌────────────────────────┐
//! │  CartStore  │───▶│ Checkout initiator │───▶│ Webhook reconciliation │
//! └─────────────┘    └────────────────────┘    └───────────┬────────────┘
//!                                                          ▼
//!                    ┌────────────────────┐    ┌────────────────────────┐
//!                    │EntitlementResolver │◀───│     CommerceStore      │
//!                    └────────────────────┘    └────────────────────────┘
//! ```
//!
//! External services sit behind traits (`CommerceStore`, `ObjectStorage`,
//! `SessionResolver`, `Notifier`, `Mailer`) so handlers receive their
//! collaborators explicitly and tests run against the in-memory versions.

pub mod auth;
pub mod cart;
pub mod entitlement;
pub mod error;
pub mod model;
pub mod notify;
pub mod storage;
pub mod store;

pub use auth::{SessionResolver, StaticSessions};
pub use cart::{CartItem, CartStorage, CartStore, MemoryCartStorage, CART_STORAGE_KEY};
pub use entitlement::{DownloadLink, Entitlement, EntitlementResolver, ACCESS_DENIED_MESSAGE};
pub use error::{CoreError, Result};
pub use model::{
    CatalogModel, ModelFile, ModelId, NewPurchase, PaymentStatus, Purchase, Requester,
    SubscriptionActivation, SubscriptionChange, SubscriptionRecord, SubscriptionTier,
    TierChange, UserId, UserProfile, ANONYMOUS_SENTINEL,
};
pub use notify::{Delivery, Mailer, Notifier, OutboxNotifier};
pub use rust_decimal::Decimal;
pub use storage::{LocalObjectStorage, ObjectStorage, SIGNED_URL_TTL};
pub use store::{CommerceStore, MemoryStore};
