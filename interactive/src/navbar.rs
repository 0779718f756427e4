use agora_shared::session::HOME_PATH;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::auth::AuthState;

#[component]
pub fn Navbar() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let menu_open = RwSignal::new(false);

    let name = move || {
        auth.auth_user()
            .map(|u| u.display_name())
            .unwrap_or_default()
    };
    let initial = move || auth.user().map(|u| u.initial()).unwrap_or_else(|| "U".into());
    let email = move || auth.auth_user().and_then(|u| u.email).unwrap_or_default();

    // The route gate sends the visitor to the login page once the session is gone.
    let on_logout = move |_| {
        menu_open.set(false);
        spawn_local(auth.logout());
    };

    view! {
        <header class="agora-navbar">
            <a class="agora-brand" href=HOME_PATH>"Agora"</a>
            <div class="agora-account">
                <button
                    class="agora-avatar agora-avatar-initial"
                    title="Account"
                    on:click=move |_| menu_open.update(|v| *v = !*v)
                >
                    {initial}
                </button>
                <Show when=move || menu_open.get()>
                    <div class="agora-menu">
                        <div class="agora-menu-item agora-menu-static">
                            <strong>{name}</strong>
                            <small>{email}</small>
                        </div>
                        <button class="agora-menu-item agora-danger" on:click=on_logout>
                            "Logout"
                        </button>
                    </div>
                </Show>
            </div>
        </header>
    }
}
