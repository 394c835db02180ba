//! # prime-payments
//!
//! Hosted checkout and payment webhook reconciliation for STL Prime.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │    Cart     │────▶│  Hosted Payment │────▶│ Webhook endpoint │
//! │ (checkout)  │     │      Page       │     │ (reconciliation) │
//! └─────────────┘     └─────────────────┘     └──────────────────┘
//! ```
//!
//! 1. [`CheckoutInitiator`] prices the cart (tier discount, free items
//!    dropped) and asks the [`PaymentGateway`] for a hosted session.
//! 2. The provider calls back with a signed event. [`WebhookVerifier`]
//!    checks the signature and decodes it into a [`WebhookEvent`].
//! 3. [`WebhookReconciler`] records purchases or subscription changes and
//!    triggers the receipt email.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prime_payments::{CheckoutInitiator, CheckoutUrls, StripeGateway};
//!
//! let gateway = Arc::new(StripeGateway::new("sk_test_xxx"));
//! let checkout = CheckoutInitiator::new(
//!     gateway,
//!     store,
//!     CheckoutUrls::from_app_url("https://stlprime.app"),
//!     "brl",
//! );
//!
//! let session = checkout.initiate(&request).await?;
//! // Redirect the buyer to: session.url
//! ```

mod checkout;
mod error;
mod event;
mod gateway;
mod signature;
mod webhook;

pub use checkout::{unit_amount, CheckoutInitiator, CheckoutRequest, CheckoutUrls};
pub use error::{PaymentError, Result};
pub use event::{
    CompletedSession, CustomerDetails, SessionMode, SubscriptionUpdate, WebhookEvent,
    CHECKOUT_SESSION_COMPLETED, SUBSCRIPTION_DELETED, SUBSCRIPTION_UPDATED,
};
pub use gateway::{
    HostedSession, MockGateway, PaidLineItem, PaymentGateway, PricedLineItem, SessionRequest,
    StripeGateway, SubscriptionDetails, AUTHOR_KEY, MODEL_ID_KEY,
};
pub use signature::{WebhookVerifier, DEFAULT_TOLERANCE, SIGNATURE_HEADER};
pub use webhook::{ReceiptStatus, Reconciliation, Stage, WebhookReconciler};
