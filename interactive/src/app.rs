use agora_shared::session::Access;
use leptos::prelude::*;
use leptos_router::components::{Redirect, Route, Router, Routes};
use leptos_router::path;

use crate::auth::AuthState;
use crate::chat::ChatView;
use crate::forum::ForumView;
use crate::navbar::Navbar;
use crate::notify::NotificationSetup;
use crate::pages::{Login, Register};
use crate::sidebar::Sidebar;
use crate::state::{MessagingProvider, MessagingState};

#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <Routes fallback=|| view! { <Gate access=Access::Protected><Home /></Gate> }>
                <Route path=path!("/login") view=|| view! { <Gate access=Access::Public><Login /></Gate> } />
                <Route path=path!("/register") view=|| view! { <Gate access=Access::Public><Register /></Gate> } />
                <Route path=path!("/") view=|| view! { <Gate access=Access::Protected><Home /></Gate> } />
                <Route path=path!("/dashboard") view=|| view! { <Gate access=Access::Protected><Home /></Gate> } />
            </Routes>
        </Router>
    }
}

/// Renders `children` only for visitors `access` admits; redirects the rest.
#[component]
fn Gate(access: Access, children: ChildrenFn) -> impl IntoView {
    let auth = expect_context::<AuthState>();

    move || {
        if auth.loading.get() {
            return view! {
                <div class="agora-center">
                    <div class="agora-spinner" aria-label="Loading"></div>
                </div>
            }
            .into_any();
        }
        match access.redirect(auth.is_logged_in()) {
            Some(to) => view! { <Redirect path=to /> }.into_any(),
            None => children().into_any(),
        }
    }
}

#[component]
fn Home() -> impl IntoView {
    view! {
        <MessagingProvider>
            <div class="agora-app">
                <Navbar />
                <NotificationSetup />
                <div class="agora-main">
                    <Sidebar />
                    <MainPane />
                </div>
            </div>
        </MessagingProvider>
    }
}

#[component]
fn MainPane() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let is_chat = Memo::new(move |_| state.view.with(|v| v.mode().is_chat()));

    move || {
        if is_chat.get() {
            view! { <ChatView /> }.into_any()
        } else {
            view! { <ForumView /> }.into_any()
        }
    }
}
