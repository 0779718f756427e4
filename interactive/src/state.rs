use agora_shared::chat::ChatBook;
use agora_shared::realtime::Subscription;
use agora_shared::state::{Messenger, ViewCell, ViewState};
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api::Supabase;
use crate::realtime::Realtime;

/// View state held in a signal, so components re-render when it changes.
#[derive(Debug, Clone, Copy)]
pub struct ReactiveView(pub RwSignal<ViewState>);

impl ViewCell for ReactiveView {
    fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> Option<R> {
        self.0.try_with_untracked(f)
    }

    /// Subscribers are only notified when the write changed something.
    fn write<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> Option<R> {
        self.0.try_maybe_update(|state| {
            let before = state.revision();
            let out = f(state);
            (state.revision() != before, out)
        })
    }
}

pub type Client = Messenger<Supabase, ReactiveView>;

/// Everything the messaging screens share.
#[derive(Clone, Copy)]
pub struct MessagingState {
    pub client: Client,
    pub view: RwSignal<ViewState>,
    pub chats: RwSignal<ChatBook>,
    pub search: RwSignal<String>,
}

/// Owns the view state, loads forums and keeps them live for its children.
#[component]
pub fn MessagingProvider(children: Children) -> impl IntoView {
    let view = RwSignal::new(ViewState::default());
    let client = Messenger::new(Supabase, ReactiveView(view));
    provide_context(MessagingState {
        client,
        view,
        chats: RwSignal::new(ChatBook::new()),
        search: RwSignal::new(String::new()),
    });

    spawn_local(client.refresh_forums());
    let forum_watch = client.watch_forums(&Realtime, move || spawn_local(client.refresh_forums()));
    let _forum_watch = StoredValue::new_local(forum_watch);

    let selected = Memo::new(move |_| view.with(|v| v.selected_forum_id().map(str::to_string)));

    // The previous watch is dropped before the next selection is watched.
    Effect::new(move |previous: Option<Option<Subscription>>| {
        drop(previous);
        selected.get()?;
        spawn_local(client.refresh_thread());
        client.watch_thread(&Realtime, move || spawn_local(client.refresh_thread()))
    });

    children()
}
