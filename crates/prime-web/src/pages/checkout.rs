//! Checkout Page

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

use crate::api;
use crate::cart::use_cart;
use crate::components::{price_label, CartLine};
use crate::storage::session_user_id;

#[component]
pub fn CheckoutPage() -> impl IntoView {
    let cart = use_cart();
    let query = use_query_map();
    let (loading, set_loading) = signal(false);
    let (error, set_error) = signal(None::<String>);

    let cancelled = move || query.with(|q| q.get("payment").as_deref() == Some("cancelled"));

    let checkout = move |_| {
        if loading.get() || cart.total_items() == 0 {
            return;
        }

        // Free models are already downloadable from the dashboard
        if cart.is_free_only() {
            cart.clear();
            if let Some(window) = web_sys::window() {
                let _ = window.location().set_href("/dashboard");
            }
            return;
        }

        set_loading.set(true);
        set_error.set(None);

        let items = cart.items();
        let user_id = session_user_id();
        leptos::task::spawn_local(async move {
            match api::create_checkout(&items, user_id.as_deref()).await {
                Ok(url) => {
                    if let Some(window) = web_sys::window() {
                        let _ = window.location().set_href(&url);
                    }
                }
                Err(e) => {
                    set_error.set(Some(e));
                    set_loading.set(false);
                }
            }
        });
    };

    view! {
        <div class="checkout">
            <h1>"Checkout"</h1>

            <Show when=cancelled>
                <p class="notice">"Payment cancelled. Your cart is still here."</p>
            </Show>

            <Show
                when=move || { cart.total_items() > 0 }
                fallback=|| view! {
                    <div class="empty">
                        <h2>"Your cart is empty"</h2>
                        <a href="/">"Browse models"</a>
                    </div>
                }
            >
                <section class="summary">
                    <h2>"Order summary (" {move || cart.total_items()} ")"</h2>
                    <For
                        each=move || cart.items()
                        key=|item| item.id.to_string()
                        children=move |item| view! { <CartLine item=item /> }
                    />
                </section>

                <aside class="payment">
                    <div class="row">
                        <span>"Subtotal"</span>
                        <span>{move || price_label(cart.total_price())}</span>
                    </div>
                    <div class="row total">
                        <span>"Total"</span>
                        <span>{move || price_label(cart.total_price())}</span>
                    </div>

                    <button
                        class="btn btn-primary"
                        disabled=move || loading.get()
                        on:click=checkout
                    >
                        {move || match (loading.get(), cart.is_free_only()) {
                            (true, _) => "Redirecting...",
                            (false, true) => "Download free",
                            (false, false) => "Pay with Stripe",
                        }}
                    </button>

                    {move || error.get().map(|e| view! { <p class="error">{e}</p> })}
                </aside>
            </Show>
        </div>
    }
}
