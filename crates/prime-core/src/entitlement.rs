//! Download Entitlements
//!
//! Decides whether a caller may download a model and, if so, mints signed
//! URLs for its files.
//!
//! ```text
//! free model ──────────────────────────────▶ granted
//! anonymous caller ────────────────────────▶ denied
//! pro / premium tier ──────────────────────▶ granted
//! purchase row for (caller, model) ────────▶ granted
//! otherwise ───────────────────────────────▶ denied
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::model::{CatalogModel, ModelId, SubscriptionTier, UserId};
use crate::storage::{ObjectStorage, SIGNED_URL_TTL};
use crate::store::CommerceStore;

/// Message returned to callers without access
pub const ACCESS_DENIED_MESSAGE: &str =
    "Access Denied. Upgrade your plan or purchase the model to download.";

/// Why access was granted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    FreeModel,
    Subscription(SubscriptionTier),
    Purchased,
}

/// Why access was denied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    NotPurchased,
}

/// Computed access decision (never stored)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entitlement {
    Granted(Grant),
    Denied(Denial),
}

impl Entitlement {
    pub const fn has_access(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// A signed, time-limited download link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub name: String,
    pub url: String,
}

/// Entitlement resolver
pub struct EntitlementResolver {
    store: Arc<dyn CommerceStore>,
    storage: Arc<dyn ObjectStorage>,
    url_ttl: Duration,
}

impl EntitlementResolver {
    pub fn new(store: Arc<dyn CommerceStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            store,
            storage,
            url_ttl: SIGNED_URL_TTL,
        }
    }

    /// Decide access to a known model
    pub async fn decide(&self, model: &CatalogModel, caller: Option<&UserId>) -> Result<Entitlement> {
        if model.is_free {
            return Ok(Entitlement::Granted(Grant::FreeModel));
        }

        let Some(user_id) = caller else {
            return Ok(Entitlement::Denied(Denial::Unauthenticated));
        };

        let tier = self.store.subscription_tier(user_id).await?.unwrap_or_default();
        if tier.unlocks_catalog() {
            return Ok(Entitlement::Granted(Grant::Subscription(tier)));
        }

        if self.store.has_purchase(user_id, &model.id).await? {
            return Ok(Entitlement::Granted(Grant::Purchased));
        }

        Ok(Entitlement::Denied(Denial::NotPurchased))
    }

    /// Look the model up and decide access
    pub async fn resolve(&self, model_id: &ModelId, caller: Option<&UserId>) -> Result<Entitlement> {
        let model = self.find_model(model_id).await?;
        self.decide(&model, caller).await
    }

    /// Check access and sign every file of the model.
    ///
    /// Files that fail to sign are left out of the result.
    pub async fn download_links(
        &self,
        model_id: &ModelId,
        caller: Option<&UserId>,
    ) -> Result<Vec<DownloadLink>> {
        let model = self.find_model(model_id).await?;

        let entitlement = self.decide(&model, caller).await?;
        tracing::debug!(model_id = %model_id, ?entitlement, "Resolved download entitlement");

        if !entitlement.has_access() {
            return Err(CoreError::AccessDenied(ACCESS_DENIED_MESSAGE.into()));
        }

        let files = match model.files.as_deref() {
            Some(files) if !files.is_empty() => files,
            _ => {
                tracing::warn!(model_id = %model_id, "Model has no files registered");
                return Ok(Vec::new());
            }
        };

        let mut links = Vec::with_capacity(files.len());
        for file in files {
            match self.storage.signed_url(&file.path, self.url_ttl).await {
                Ok(url) => links.push(DownloadLink {
                    name: file.name.clone(),
                    url,
                }),
                Err(e) => {
                    tracing::warn!(
                        model_id = %model_id,
                        path = %file.path,
                        error = %e,
                        "Could not sign file URL"
                    );
                }
            }
        }

        Ok(links)
    }

    async fn find_model(&self, model_id: &ModelId) -> Result<CatalogModel> {
        self.store
            .catalog_model(model_id)
            .await?
            .ok_or_else(|| CoreError::ModelNotFound(model_id.to_string()))
    }
}
