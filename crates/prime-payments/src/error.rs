//! Payment Error Types

use prime_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Payment provider API error
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Checkout called without items
    #[error("Cart is empty")]
    EmptyCart,

    /// Every item in the cart is free
    #[error("No payable items in cart")]
    NoPayableItems,

    /// Price could not be expressed in minor units
    #[error("Invalid price for item {0}")]
    InvalidPrice(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store error
    #[error(transparent)]
    Store(#[from] CoreError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }

    /// Errors caused by the request itself (HTTP 400)
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart
                | Self::NoPayableItems
                | Self::InvalidPrice(_)
                | Self::WebhookSignature(_)
                | Self::WebhookParse(_)
        )
    }
}
