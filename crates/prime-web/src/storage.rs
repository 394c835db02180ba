//! Browser storage

use prime_core::{CartStorage, CoreError};

/// Key the signed-in user's id is kept under by the auth flow
pub const USER_ID_KEY: &str = "stlprime_user_id";

/// `localStorage` slot for the persisted cart
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageCart;

fn local_storage() -> prime_core::Result<web_sys::Storage> {
    web_sys::window()
        .ok_or_else(|| CoreError::CartStorage("no window".into()))?
        .local_storage()
        .map_err(|_| CoreError::CartStorage("localStorage unavailable".into()))?
        .ok_or_else(|| CoreError::CartStorage("localStorage unavailable".into()))
}

impl CartStorage for LocalStorageCart {
    fn load(&self) -> prime_core::Result<Option<String>> {
        local_storage()?
            .get_item(prime_core::CART_STORAGE_KEY)
            .map_err(|_| CoreError::CartStorage("could not read cart".into()))
    }

    fn save(&self, value: &str) -> prime_core::Result<()> {
        local_storage()?
            .set_item(prime_core::CART_STORAGE_KEY, value)
            .map_err(|_| CoreError::CartStorage("could not write cart".into()))
    }
}

/// Id of the signed-in user, if the auth flow stored one
pub fn session_user_id() -> Option<String> {
    local_storage()
        .ok()?
        .get_item(USER_ID_KEY)
        .ok()
        .flatten()
        .filter(|id| !id.is_empty())
}
