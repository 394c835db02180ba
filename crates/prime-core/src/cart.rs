//! Shopping Cart
//!
//! Client-side cart state: the selected models, their totals and whether the
//! cart drawer is open. Every mutation of the item list is written through to
//! a [`CartStorage`] so the cart survives a reload on the same device.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, Result};
use crate::model::ModelId;

/// Key the cart is persisted under
pub const CART_STORAGE_KEY: &str = "stlprime_cart";

/// A model selected for purchase (always quantity 1)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ModelId,
    pub title: String,
    /// Unit price in major units; zero for free models
    pub price: Decimal,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    pub author_username: String,
}

/// Raw persistence for the serialized cart (browser `localStorage`, memory, ...)
pub trait CartStorage {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, value: &str) -> Result<()>;
}

/// In-memory cart storage. Clones share the same slot, which lets tests model
/// a page reload by building a second cart over a clone.
#[derive(Clone, Debug, Default)]
pub struct MemoryCartStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with a raw value
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value.into()))),
        }
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> Result<Option<String>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| CoreError::CartStorage("cart storage lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save(&self, value: &str) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| CoreError::CartStorage("cart storage lock poisoned".into()))?;
        *slot = Some(value.to_string());
        Ok(())
    }
}

/// Cart state container
#[derive(Debug)]
pub struct CartStore<S: CartStorage> {
    items: Vec<CartItem>,
    open: bool,
    storage: S,
}

impl<S: CartStorage> CartStore<S> {
    /// Restore the cart from storage. Missing or unreadable state yields an
    /// empty cart.
    pub fn load(storage: S) -> Self {
        let items = match storage.load() {
            Ok(Some(raw)) => serde_json::from_str::<Vec<CartItem>>(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable persisted cart");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted cart");
                Vec::new()
            }
        };

        Self {
            items,
            open: false,
            storage,
        }
    }

    /// Add a model and open the drawer. A model already in the cart is not
    /// added twice.
    pub fn add_item(&mut self, item: CartItem) {
        if !self.contains(&item.id) {
            self.items.push(item);
            self.persist();
        }
        self.open = true;
    }

    pub fn remove_item(&mut self, id: &ModelId) {
        let before = self.items.len();
        self.items.retain(|i| &i.id != id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Empty the cart (explicit clear or after a successful checkout)
    pub fn clear(&mut self) {
        self.items.clear();
        self.persist();
    }

    pub fn contains(&self, id: &ModelId) -> bool {
        self.items.iter().any(|i| &i.id == id)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(|i| i.price).sum()
    }

    /// True when every item is free (checkout needs no payment)
    pub fn is_free_only(&self) -> bool {
        self.items.iter().all(|i| i.price.is_zero())
    }

    pub const fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.items)
            .map_err(CoreError::from)
            .and_then(|json| self.storage.save(&json));

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist cart");
        }
    }
}
