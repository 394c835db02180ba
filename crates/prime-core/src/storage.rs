//! Object Storage
//!
//! Model files live in hosted object storage; downloads hand out
//! time-limited signed URLs instead of the files themselves.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Signed URLs are valid for one hour
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Issues signed download URLs for stored objects
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String>;
}

/// Storage that serves files from a fixed base URL (local development)
pub struct LocalObjectStorage {
    base_url: String,
}

impl LocalObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String> {
        Ok(format!(
            "{}/{}?expires_in={}",
            self.base_url,
            path.trim_start_matches('/'),
            expires_in.as_secs()
        ))
    }
}
