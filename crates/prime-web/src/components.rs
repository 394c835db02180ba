//! UI Components

use leptos::prelude::*;
use prime_core::model::format_amount;
use prime_core::{CartItem, Decimal};

use crate::cart::use_cart;

/// "R$ 12.90", or "Free" for zero
pub fn price_label(price: Decimal) -> String {
    if price.is_zero() {
        "Free".into()
    } else {
        format!("R$ {}", format_amount(price))
    }
}

/// Header button showing the item count
#[component]
pub fn CartButton() -> impl IntoView {
    let cart = use_cart();

    view! {
        <button class="cart-button" on:click=move |_| cart.open()>
            "Cart (" {move || cart.total_items()} ")"
        </button>
    }
}

/// One cart row
#[component]
pub fn CartLine(item: CartItem, #[prop(optional)] removable: bool) -> impl IntoView {
    let cart = use_cart();
    let id = item.id.clone();

    view! {
        <div class="cart-line">
            {item.thumbnail_url.clone().map(|src| view! { <img class="thumb" src=src alt=item.title.clone() /> })}
            <div class="details">
                <p class="title">{item.title.clone()}</p>
                <p class="author">"by @" {item.author_username.clone()}</p>
                {item.format.clone().map(|format| view! { <span class="format">{format}</span> })}
            </div>
            <span class="price">{price_label(item.price)}</span>
            {removable.then(|| view! {
                <button class="remove" on:click=move |_| cart.remove_item(&id)>"Remove"</button>
            })}
        </div>
    }
}

/// Slide-over cart opened whenever an item is added
#[component]
pub fn CartDrawer() -> impl IntoView {
    let cart = use_cart();

    view! {
        <Show when=move || cart.is_open()>
            <aside class="cart-drawer">
                <header>
                    <h2>"Your cart"</h2>
                    <button class="close" on:click=move |_| cart.close()>"×"</button>
                </header>
                <Show
                    when=move || { cart.total_items() > 0 }
                    fallback=|| view! { <p class="empty">"Your cart is empty"</p> }
                >
                    <For
                        each=move || cart.items()
                        key=|item| item.id.to_string()
                        children=move |item| view! { <CartLine item=item removable=true /> }
                    />
                    <footer>
                        <p class="total">"Total: " {move || price_label(cart.total_price())}</p>
                        <button class="clear" on:click=move |_| cart.clear()>"Clear"</button>
                        <a href="/checkout" class="btn btn-primary" on:click=move |_| cart.close()>
                            "Checkout"
                        </a>
                    </footer>
                </Show>
            </aside>
        </Show>
    }
}
