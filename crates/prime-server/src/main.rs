//! STL Prime server binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prime_server::{router, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    let state = AppState::from_config(&config);

    if state.checkout.is_some() {
        tracing::info!("✓ Stripe configured");
    }
    if state.webhook.is_some() {
        tracing::info!("✓ Payment webhook enabled");
    }
    if state.mailer.is_some() {
        tracing::info!("✓ Email configured");
    } else {
        tracing::warn!("⚠ RESEND_API_KEY not set - emails will be skipped");
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 STL Prime server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  POST /api/checkout              - Create checkout session");
    tracing::info!("  POST /api/webhooks/payment      - Payment provider webhook");
    tracing::info!("  GET  /api/models/{{id}}/download  - Signed download links");
    tracing::info!("  POST /api/emails/receipt        - Receipt email");
    tracing::info!("  POST /api/emails/welcome        - Welcome email");
    tracing::info!("  POST /api/emails/follower       - New follower email");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
