//! STL Prime HTTP Server
//!
//! Axum routes for checkout, the payment webhook, model downloads and the
//! transactional email endpoints.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_checkout, download_model, health_check, payment_webhook, send_follower_email,
    send_receipt_email, send_welcome_email,
};
pub use crate::config::AppConfig;
pub use crate::state::{AppState, WebhookState};

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Payments
        .route("/api/checkout", post(create_checkout))
        .route("/api/webhooks/payment", post(payment_webhook))
        // Downloads
        .route("/api/models/{id}/download", get(download_model))
        // Email
        .route("/api/emails/receipt", post(send_receipt_email))
        .route("/api/emails/welcome", post(send_welcome_email))
        .route("/api/emails/follower", post(send_follower_email))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
