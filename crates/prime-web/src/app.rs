//! Main App Component

use leptos::prelude::*;
use leptos_router::{components::*, path};

use crate::cart::provide_cart_context;
use crate::components::{CartButton, CartDrawer};
use crate::pages::{CheckoutPage, DashboardPage};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    provide_cart_context();

    view! {
        <Router>
            <header class="topbar">
                <a href="/" class="brand">"STL Prime"</a>
                <CartButton />
            </header>
            <CartDrawer />
            <main class="app">
                <Routes fallback=|| view! { <p>"Page not found"</p> }>
                    <Route path=path!("/") view=CheckoutPage />
                    <Route path=path!("/checkout") view=CheckoutPage />
                    <Route path=path!("/dashboard") view=DashboardPage />
                </Routes>
            </main>
        </Router>
    }
}
