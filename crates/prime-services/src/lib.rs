//! # prime-services
//!
//! Adapters from the `prime-core` traits to the hosted services STL Prime
//! runs on:
//!
//! - [`PostgrestStore`]: `CommerceStore` over the REST API
//! - [`StorageSigner`]: `ObjectStorage` issuing signed download URLs
//! - [`SupabaseSessions`]: `SessionResolver` backed by the auth API
//! - [`ResendMailer`]: `Mailer` for the Resend email API
//! - [`HttpNotifier`]: `Notifier` calling the app's email endpoints

mod auth;
mod client;
mod config;
mod error;
mod notifier;
mod postgrest;
mod resend;
mod storage;

pub use auth::SupabaseSessions;
pub use client::SupabaseClient;
pub use config::{non_empty_var, SupabaseConfig, DEFAULT_BUCKET};
pub use error::{Result, ServiceError};
pub use notifier::HttpNotifier;
pub use postgrest::PostgrestStore;
pub use resend::ResendMailer;
pub use storage::StorageSigner;
