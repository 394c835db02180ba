//! STL Prime Web Client
//!
//! Leptos WASM client for the cart drawer, checkout and the post-payment
//! dashboard. Cart state lives in [`prime_core::CartStore`], persisted to
//! `localStorage`.

mod api;
mod app;
mod cart;
mod components;
mod pages;
mod storage;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
