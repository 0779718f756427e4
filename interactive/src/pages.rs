use agora_shared::forms::{LoginForm, RegisterForm};
use agora_shared::session::{SignUp, DASHBOARD_PATH, LOGIN_PATH, REGISTER_PATH};
use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use leptos_router::hooks::use_navigate;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::auth::AuthState;

const REDIRECT_AFTER_SIGN_UP_MS: u32 = 2_000;

#[component]
pub fn Login() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let navigate = use_navigate();
    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let show_password = RwSignal::new(false);
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        error.set(None);
        let form = LoginForm {
            email: email.get_untracked(),
            password: password.get_untracked(),
        };
        if !form.is_complete() {
            error.set(Some("Please enter your email and password.".to_string()));
            return;
        }
        submitting.set(true);
        let navigate = navigate.clone();
        spawn_local(async move {
            match api::sign_in(&form).await {
                Ok(session) => {
                    auth.login(session);
                    navigate(DASHBOARD_PATH, Default::default());
                }
                Err(e) => error.set(Some(e.to_string())),
            }
            submitting.set(false);
        });
    };

    view! {
        <main class="agora-auth">
            <h1>"Welcome Back"</h1>
            <p class="agora-hint">"Sign in to your account"</p>
            <Show when=move || error.get().is_some()>
                <p class="agora-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
            <form class="agora-auth-form" on:submit=on_submit>
                <input
                    class="agora-input"
                    type="email"
                    placeholder="Email Address"
                    autocomplete="email"
                    prop:value=move || email.get()
                    on:input=move |ev| email.set(event_target_value(&ev))
                />
                <div class="agora-password">
                    <input
                        class="agora-input"
                        type=move || if show_password.get() { "text" } else { "password" }
                        placeholder="Password"
                        autocomplete="current-password"
                        prop:value=move || password.get()
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                    <button
                        class="agora-btn agora-btn-icon"
                        type="button"
                        on:click=move |_| show_password.update(|v| *v = !*v)
                    >
                        {move || if show_password.get() { "Hide" } else { "Show" }}
                    </button>
                </div>
                <button class="agora-btn agora-btn-primary" type="submit" disabled=move || submitting.get()>
                    {move || if submitting.get() { "Signing in..." } else { "Sign In" }}
                </button>
            </form>
            <p class="agora-hint">
                "Don't have an account? " <a href=REGISTER_PATH>"Sign Up"</a>
            </p>
        </main>
    }
}

#[component]
pub fn Register() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let navigate = use_navigate();
    let full_name = RwSignal::new(String::new());
    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let confirm_password = RwSignal::new(String::new());
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let success = RwSignal::new(false);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        error.set(None);
        success.set(false);
        let form = RegisterForm {
            full_name: full_name.get_untracked(),
            email: email.get_untracked(),
            password: password.get_untracked(),
            confirm_password: confirm_password.get_untracked(),
        };
        if let Err(message) = form.validate() {
            error.set(Some(message));
            return;
        }
        submitting.set(true);
        let navigate = navigate.clone();
        spawn_local(async move {
            match api::sign_up(&form).await {
                Ok(SignUp::SignedIn(session)) => auth.login(session),
                Ok(SignUp::ConfirmEmail) => {
                    success.set(true);
                    Timeout::new(REDIRECT_AFTER_SIGN_UP_MS, move || {
                        navigate(LOGIN_PATH, Default::default())
                    })
                    .forget();
                }
                Err(e) => error.set(Some(e.to_string())),
            }
            submitting.set(false);
        });
    };

    let field = move |signal: RwSignal<String>, kind: &'static str, placeholder: &'static str| {
        view! {
            <input
                class="agora-input"
                type=kind
                placeholder=placeholder
                prop:value=move || signal.get()
                on:input=move |ev| signal.set(event_target_value(&ev))
            />
        }
    };

    view! {
        <main class="agora-auth">
            <h1>"Create Account"</h1>
            <p class="agora-hint">"Join the conversation"</p>
            <Show when=move || error.get().is_some()>
                <p class="agora-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
            <Show when=move || success.get()>
                <p class="agora-success">"Account created! Check your email to confirm it, then sign in."</p>
            </Show>
            <form class="agora-auth-form" on:submit=on_submit>
                {field(full_name, "text", "Full Name")}
                {field(email, "email", "Email Address")}
                {field(password, "password", "Password")}
                {field(confirm_password, "password", "Confirm Password")}
                <button class="agora-btn agora-btn-primary" type="submit" disabled=move || submitting.get()>
                    {move || if submitting.get() { "Creating account..." } else { "Create Account" }}
                </button>
            </form>
            <p class="agora-hint">
                "Already have an account? " <a href=LOGIN_PATH>"Sign In"</a>
            </p>
        </main>
    }
}
