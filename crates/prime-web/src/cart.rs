//! Cart context shared by the drawer and the checkout page

use leptos::prelude::*;
use prime_core::{CartItem, CartStore, Decimal, ModelId};

use crate::storage::LocalStorageCart;

#[derive(Clone, Copy)]
pub struct CartContext {
    store: RwSignal<CartStore<LocalStorageCart>>,
}

impl CartContext {
    pub fn items(&self) -> Vec<CartItem> {
        self.store.with(|cart| cart.items().to_vec())
    }

    pub fn total_items(&self) -> usize {
        self.store.with(|cart| cart.total_items())
    }

    pub fn total_price(&self) -> Decimal {
        self.store.with(|cart| cart.total_price())
    }

    pub fn is_free_only(&self) -> bool {
        self.store.with(|cart| cart.is_free_only())
    }

    pub fn is_open(&self) -> bool {
        self.store.with(|cart| cart.is_open())
    }

    pub fn add_item(&self, item: CartItem) {
        self.store.update(|cart| cart.add_item(item));
    }

    pub fn remove_item(&self, id: &ModelId) {
        self.store.update(|cart| cart.remove_item(id));
    }

    pub fn clear(&self) {
        self.store.update(|cart| cart.clear());
    }

    pub fn open(&self) {
        self.store.update(|cart| cart.open());
    }

    pub fn close(&self) {
        self.store.update(|cart| cart.close());
    }
}

/// Restore the persisted cart and make it available to child components
pub fn provide_cart_context() {
    let store = RwSignal::new(CartStore::load(LocalStorageCart));
    provide_context(CartContext { store });
}

pub fn use_cart() -> CartContext {
    use_context::<CartContext>().unwrap_or_else(|| {
        // Rendered outside App; fall back to a standalone cart
        let store = RwSignal::new(CartStore::load(LocalStorageCart));
        CartContext { store }
    })
}
