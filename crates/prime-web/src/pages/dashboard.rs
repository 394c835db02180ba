//! Dashboard Page

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;
use prime_core::DownloadLink;

use crate::api;
use crate::cart::use_cart;

#[component]
pub fn DashboardPage() -> impl IntoView {
    let cart = use_cart();
    let query = use_query_map();
    let (model_id, set_model_id) = signal(String::new());
    let (files, set_files) = signal(Vec::<DownloadLink>::new());
    let (error, set_error) = signal(None::<String>);

    let paid = query.with_untracked(|q| q.get("payment").as_deref() == Some("success"));
    if paid {
        cart.clear();
    }

    let fetch = move |_| {
        let id = model_id.get();
        if id.is_empty() {
            return;
        }
        set_error.set(None);
        leptos::task::spawn_local(async move {
            match api::download_links(&id).await {
                Ok(links) => set_files.set(links),
                Err(e) => {
                    set_files.set(Vec::new());
                    set_error.set(Some(e));
                }
            }
        });
    };

    view! {
        <div class="dashboard">
            {paid.then(|| view! {
                <div class="notice success">
                    <h2>"Order confirmed!"</h2>
                    <p>"Your files are available for download in your account."</p>
                </div>
            })}

            <section class="downloads">
                <h2>"Downloads"</h2>
                <div class="field">
                    <input
                        type="text"
                        placeholder="Model id"
                        prop:value=move || model_id.get()
                        on:input=move |ev| set_model_id.set(event_target_value(&ev))
                    />
                    <button class="btn" on:click=fetch>"Get files"</button>
                </div>
                {move || error.get().map(|e| view! { <p class="error">{e}</p> })}
                <ul>
                    <For
                        each=move || files.get()
                        key=|link| link.name.clone()
                        children=|link| view! { <li><a href=link.url>{link.name}</a></li> }
                    />
                </ul>
            </section>
        </div>
    }
}
