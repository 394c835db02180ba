//! Hosted backend configuration

use crate::error::{Result, ServiceError};

pub const DEFAULT_BUCKET: &str = "models";

/// Connection settings for the hosted database/storage/auth backend
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    /// Service credentials; bypass row-level security
    pub service_role_key: String,
    /// Public key, used to resolve user sessions
    pub anon_key: Option<String>,
    pub bucket: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("bucket", &self.bucket)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            anon_key: None,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    #[must_use]
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let url = non_empty_var("SUPABASE_URL")
            .ok_or_else(|| ServiceError::Config("SUPABASE_URL not set".into()))?;
        let service_role_key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or_else(|| ServiceError::Config("SUPABASE_SERVICE_ROLE_KEY not set".into()))?;

        let mut config = Self::new(url, service_role_key);
        if let Some(anon) = non_empty_var("SUPABASE_ANON_KEY") {
            config = config.with_anon_key(anon);
        }
        if let Some(bucket) = non_empty_var("STORAGE_BUCKET") {
            config = config.with_bucket(bucket);
        }
        Ok(config)
    }
}

/// Environment variable, treating blank values as unset
pub fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
