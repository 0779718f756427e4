mod api;
mod app;
mod auth;
mod chat;
mod config;
mod forum;
mod logging;
mod navbar;
mod notify;
mod pages;
mod realtime;
mod sidebar;
mod state;

use leptos::prelude::*;
use wasm_bindgen::JsCast;

fn main() {
    console_error_panic_hook::set_once();
    logging::init();

    let mount_point = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("agora"));

    let root = || {
        view! {
            <auth::AuthProvider>
                <app::App />
            </auth::AuthProvider>
        }
    };

    // Mount into #agora when the page provides it, else take over the body
    match mount_point {
        Some(el) => {
            let html_el: web_sys::HtmlElement = el.unchecked_into();
            leptos::mount::mount_to(html_el, root).forget();
        }
        None => leptos::mount::mount_to_body(root),
    }
}
