//! Desktop notifications for new forum posts by other users.

use std::rc::Rc;

use agora_shared::alerts::{self, Alert, Permission, Plan, AUTO_DISMISS_MS, WARNING_HIDE_MS};
use agora_shared::backend::Backend;
use agora_shared::models::NotificationRecord;
use agora_shared::realtime::{Change, ChangeFeed, Subscription, Watch};
use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{window, Notification, NotificationOptions, NotificationPermission};

use crate::api::Supabase;
use crate::auth::AuthState;
use crate::realtime::Realtime;

fn supported() -> bool {
    window()
        .map(|w| web_sys::js_sys::Reflect::has(&w, &JsValue::from_str("Notification")).unwrap_or(false))
        .unwrap_or(false)
}

fn permission() -> Permission {
    if !supported() {
        return Permission::Unsupported;
    }
    match Notification::permission() {
        NotificationPermission::Granted => Permission::Granted,
        NotificationPermission::Denied => Permission::Denied,
        _ => Permission::Default,
    }
}

async fn request_permission() -> Permission {
    let promise = match Notification::request_permission() {
        Ok(promise) => promise,
        Err(e) => {
            log::error!("notification permission request failed: {e:?}");
            return Permission::Default;
        }
    };
    match JsFuture::from(promise).await {
        Ok(value) => Permission::parse(&value.as_string().unwrap_or_default()),
        Err(e) => {
            log::error!("notification permission request failed: {e:?}");
            Permission::Default
        }
    }
}

fn show(alert: Alert) {
    if permission() != Permission::Granted {
        return;
    }
    let options = NotificationOptions::new();
    options.set_body(&alert.body);
    options.set_icon(alert.icon);
    options.set_badge(alert.badge);
    options.set_tag(&alert.tag);
    options.set_require_interaction(false);

    let notification = match Notification::new_with_options(&alert.title, &options) {
        Ok(n) => n,
        Err(e) => {
            log::warn!("could not show notification: {e:?}");
            return;
        }
    };

    let on_click = Closure::<dyn FnMut()>::new({
        let notification = notification.clone();
        move || {
            if let Some(w) = window() {
                let _ = w.focus();
            }
            notification.close();
        }
    });
    notification.set_onclick(Some(on_click.as_ref().unchecked_ref()));

    Timeout::new(AUTO_DISMISS_MS, move || {
        notification.close();
        drop(on_click);
    })
    .forget();
}

fn on_notification(change: &Change, me: &str) {
    let record: NotificationRecord = match serde_json::from_value(change.record.clone()) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("unreadable notification row: {e}");
            return;
        }
    };
    if !alerts::should_alert(&record, me) {
        return;
    }
    spawn_local(async move {
        let author = match Supabase.profile(&record.author_id).await {
            Ok(profile) => profile.and_then(|p| p.full_name),
            Err(e) => {
                log::warn!("could not look up author {}: {e}", record.author_id);
                None
            }
        };
        show(alerts::compose(&record, author.as_deref()));
    });
}

#[component]
pub fn NotificationSetup() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let prompt = RwSignal::new(false);
    let blocked = RwSignal::new(false);
    let enabled = RwSignal::new(false);

    let user_id = Memo::new(move |_| {
        auth.session
            .with(|s| s.as_ref().map(|s| s.user.id.clone()))
    });

    let warn_blocked = move || {
        let _ = blocked.try_set(true);
        Timeout::new(WARNING_HIDE_MS, move || {
            let _ = blocked.try_set(false);
        })
        .forget();
    };

    Effect::new(move |_| {
        if user_id.get().is_none() {
            return;
        }
        match alerts::plan(permission()) {
            Plan::Nothing => log::warn!("this browser does not support desktop notifications"),
            Plan::Prompt => prompt.set(true),
            Plan::Subscribe => enabled.set(true),
            Plan::WarnBlocked => warn_blocked(),
        }
    });

    Effect::new(move |previous: Option<Option<Subscription>>| {
        drop(previous);
        if !enabled.get() {
            return None;
        }
        let me = user_id.get()?;
        let handler = Rc::new(move |change: &Change| on_notification(change, &me));
        Some(Realtime.watch(Watch::notifications(), handler))
    });

    let on_enable = move |_| {
        prompt.set(false);
        spawn_local(async move {
            match request_permission().await {
                Permission::Granted => {
                    let _ = enabled.try_set(true);
                }
                _ => warn_blocked(),
            }
        });
    };

    view! {
        <Show when=move || prompt.get()>
            <div class="agora-banner agora-banner-info">
                <span>"Enable notifications to get updates when someone posts in forums"</span>
                <button class="agora-btn agora-btn-sm" on:click=on_enable>"Enable"</button>
                <button class="agora-btn agora-btn-sm" on:click=move |_| prompt.set(false)>"Later"</button>
            </div>
        </Show>
        <Show when=move || blocked.get()>
            <div class="agora-banner agora-banner-warning">
                <span>"Notifications blocked. Please enable them in your browser settings."</span>
                <button class="agora-btn agora-btn-sm" on:click=move |_| blocked.set(false)>"×"</button>
            </div>
        </Show>
    }
}
