//! Application State

use std::sync::Arc;

use prime_core::{
    CommerceStore, EntitlementResolver, LocalObjectStorage, Mailer, MemoryStore, Notifier,
    ObjectStorage, SessionResolver, StaticSessions,
};
use prime_payments::{
    CheckoutInitiator, CheckoutUrls, PaymentGateway, StripeGateway, WebhookReconciler,
    WebhookVerifier,
};
use prime_services::{
    HttpNotifier, PostgrestStore, ResendMailer, StorageSigner, SupabaseClient, SupabaseSessions,
};

use crate::config::{AppConfig, DEFAULT_SESSION_COOKIE};

/// Signature check and reconciliation, present only when every secret is set
#[derive(Clone)]
pub struct WebhookState {
    pub verifier: Arc<WebhookVerifier>,
    pub reconciler: Arc<WebhookReconciler>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Persistent store (PostgREST, or in-memory for local development)
    pub store: Arc<dyn CommerceStore>,

    pub entitlements: Arc<EntitlementResolver>,

    pub sessions: Arc<dyn SessionResolver>,

    /// Checkout (None if the payment provider is not configured)
    pub checkout: Option<Arc<CheckoutInitiator>>,

    pub webhook: Option<WebhookState>,

    /// Email provider (None if not configured; email endpoints skip)
    pub mailer: Option<Arc<dyn Mailer>>,

    pub session_cookie: String,

    /// Backend name reported by the health check
    pub backend: &'static str,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        storage: Arc<dyn ObjectStorage>,
        sessions: Arc<dyn SessionResolver>,
    ) -> Self {
        Self {
            entitlements: Arc::new(EntitlementResolver::new(store.clone(), storage)),
            store,
            sessions,
            checkout: None,
            webhook: None,
            mailer: None,
            session_cookie: DEFAULT_SESSION_COOKIE.into(),
            backend: "memory",
        }
    }

    #[must_use]
    pub fn with_checkout(
        mut self,
        gateway: Arc<dyn PaymentGateway>,
        urls: CheckoutUrls,
        currency: &str,
    ) -> Self {
        self.checkout = Some(Arc::new(CheckoutInitiator::new(
            gateway,
            self.store.clone(),
            urls,
            currency,
        )));
        self
    }

    #[must_use]
    pub fn with_webhook(
        mut self,
        gateway: Arc<dyn PaymentGateway>,
        verifier: WebhookVerifier,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.webhook = Some(WebhookState {
            verifier: Arc::new(verifier),
            reconciler: Arc::new(WebhookReconciler::new(gateway, self.store.clone(), notifier)),
        });
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Wire every integration the configuration enables
    pub fn from_config(config: &AppConfig) -> Self {
        let mut state = match &config.supabase {
            Some(supabase) => {
                let client = SupabaseClient::new(supabase.clone());
                let mut state = Self::new(
                    Arc::new(PostgrestStore::new(client.clone())),
                    Arc::new(StorageSigner::new(client.clone())),
                    Arc::new(SupabaseSessions::new(client)),
                );
                state.backend = "postgrest";
                state
            }
            None => {
                tracing::warn!("⚠ Database not configured - using in-memory store");
                Self::new(
                    Arc::new(MemoryStore::new()),
                    Arc::new(LocalObjectStorage::new(format!("{}/files", config.app_url))),
                    Arc::new(StaticSessions::new()),
                )
            }
        }
        .with_session_cookie(&config.session_cookie);

        if let Some(secret_key) = &config.stripe_secret_key {
            let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(secret_key));
            state = state.with_checkout(
                gateway.clone(),
                CheckoutUrls::from_app_url(&config.app_url),
                &config.currency,
            );

            match &config.stripe_webhook_secret {
                Some(secret) if config.webhook_ready() => {
                    state = state.with_webhook(
                        gateway,
                        WebhookVerifier::new(secret),
                        Arc::new(HttpNotifier::new(&config.app_url)),
                    );
                }
                _ => tracing::warn!("⚠ Payment webhook disabled - needs webhook secret and database"),
            }
        } else {
            tracing::warn!("⚠ Payments not configured - checkout disabled");
        }

        if let Some(key) = &config.resend_api_key {
            state = state.with_mailer(Arc::new(ResendMailer::new(key.as_str())));
        }

        state
    }
}
