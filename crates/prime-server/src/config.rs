//! Server configuration
//!
//! Read once from the environment at startup. Integrations whose credentials
//! are missing stay `None` and the endpoints that need them fail closed.

use prime_services::{non_empty_var, SupabaseConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3050";
pub const DEFAULT_APP_URL: &str = "http://localhost:3050";
pub const DEFAULT_CURRENCY: &str = "brl";
pub const DEFAULT_SESSION_COOKIE: &str = "sb-access-token";

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Public base URL, used for checkout redirects and email triggers
    pub app_url: String,
    pub currency: String,
    pub session_cookie: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub supabase: Option<SupabaseConfig>,
    pub resend_api_key: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("app_url", &self.app_url)
            .field("currency", &self.currency)
            .field("session_cookie", &self.session_cookie)
            .field("stripe", &self.stripe_secret_key.is_some())
            .field("webhook", &self.stripe_webhook_secret.is_some())
            .field("supabase", &self.supabase)
            .field("resend", &self.resend_api_key.is_some())
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            app_url: DEFAULT_APP_URL.into(),
            currency: DEFAULT_CURRENCY.into(),
            session_cookie: DEFAULT_SESSION_COOKIE.into(),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            supabase: None,
            resend_api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase = match SupabaseConfig::from_env() {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::debug!(error = %e, "Hosted backend not configured");
                None
            }
        };

        Self {
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            app_url: non_empty_var("APP_URL")
                .unwrap_or_else(|| DEFAULT_APP_URL.into())
                .trim_end_matches('/')
                .to_string(),
            currency: non_empty_var("CHECKOUT_CURRENCY")
                .map_or_else(|| DEFAULT_CURRENCY.into(), |c| c.to_lowercase()),
            session_cookie: non_empty_var("SESSION_COOKIE")
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.into()),
            stripe_secret_key: non_empty_var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            supabase,
            resend_api_key: non_empty_var("RESEND_API_KEY"),
        }
    }

    /// The webhook needs the provider key, the signing secret and the database
    pub const fn webhook_ready(&self) -> bool {
        self.stripe_secret_key.is_some()
            && self.stripe_webhook_secret.is_some()
            && self.supabase.is_some()
    }
}
