use agora_shared::backend::Backend;
use agora_shared::models::User;
use agora_shared::session::{AuthUser, Session};
use chrono::Utc;
use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api::{self, Supabase};
use crate::realtime::Realtime;

/// Reactive auth state shared via context.
#[derive(Clone, Copy, Debug)]
pub struct AuthState {
    pub session: RwSignal<Option<Session>>,
    /// True until a stored session has been verified or discarded.
    pub loading: RwSignal<bool>,
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        self.session.with(Option::is_some)
    }

    pub fn user(&self) -> Option<User> {
        self.session.with(|s| s.as_ref().map(|s| s.user.to_user()))
    }

    pub fn auth_user(&self) -> Option<AuthUser> {
        self.session.with(|s| s.as_ref().map(|s| s.user.clone()))
    }

    pub fn user_untracked(&self) -> Option<User> {
        self.session
            .with_untracked(|s| s.as_ref().map(|s| s.user.to_user()))
    }

    /// Adopts a fresh session and makes sure the user has a profile row.
    pub fn login(&self, session: Session) {
        api::store_session(&session);
        let profile = session.user.to_profile();
        self.session.set(Some(session));
        spawn_local(async move {
            if let Err(e) = Supabase.upsert_profile(&profile).await {
                log::error!("could not save profile {}: {e}", profile.id);
            }
        });
    }

    pub async fn logout(self) {
        if let Some(token) = self.session.with_untracked(|s| s.as_ref().map(|s| s.access_token.clone())) {
            if let Err(e) = api::sign_out(&token).await {
                log::warn!("logout failed: {e}");
            }
        }
        api::clear_session();
        self.session.set(None);
    }
}

/// Verifies a stored session, refreshing it once if the access token is stale.
async fn restore(stored: Session) -> Option<Session> {
    match api::current_user(&stored.access_token).await {
        Ok(user) => return Some(Session { user, ..stored }),
        Err(e) => log::info!("stored session rejected: {e}"),
    }
    let refresh_token = stored.refresh_token.as_deref()?;
    match api::refresh(refresh_token).await {
        Ok(session) => Some(session),
        Err(e) => {
            log::warn!("session refresh failed: {e}");
            None
        }
    }
}

/// Trades the refresh token for a new grant. A grant replaced or cleared while
/// the call was in flight wins over the result.
async fn renew(session: RwSignal<Option<Session>>) {
    let Some(refresh_token) = session
        .try_with_untracked(|s| s.as_ref().and_then(|s| s.refresh_token.clone()))
        .flatten()
    else {
        return;
    };
    let result = api::refresh(&refresh_token).await;
    let unchanged = session
        .try_with_untracked(|s| s.as_ref().and_then(|s| s.refresh_token.as_deref()) == Some(refresh_token.as_str()))
        .unwrap_or(false);
    if !unchanged {
        return;
    }
    match result {
        Ok(fresh) => {
            log::debug!("session renewed for {}", fresh.user.id);
            api::store_session(&fresh);
            Realtime::renew_token(&fresh.access_token);
            let _ = session.try_set(Some(fresh));
        }
        Err(e) => {
            log::warn!("session refresh failed, signing out: {e}");
            api::clear_session();
            let _ = session.try_set(None);
        }
    }
}

/// Wraps children with the auth context.
#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    let stored = api::stored_session();
    let session: RwSignal<Option<Session>> = RwSignal::new(None);
    let loading = RwSignal::new(stored.is_some());

    provide_context(AuthState { session, loading });

    // Each new grant replaces the pending timer; dropping a Timeout cancels it.
    Effect::new(move |previous: Option<Option<Timeout>>| {
        drop(previous);
        let delay = session.with(|s| s.as_ref().and_then(|s| s.refresh_delay_ms(Utc::now())))?;
        Some(Timeout::new(delay, move || spawn_local(renew(session))))
    });

    if let Some(stored) = stored {
        spawn_local(async move {
            let restored = restore(stored).await;
            match &restored {
                Some(s) => api::store_session(s),
                None => api::clear_session(),
            }
            session.set(restored);
            loading.set(false);
        });
    }

    children()
}
