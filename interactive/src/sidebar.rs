use agora_shared::chat::ChatKind;
use agora_shared::models::ViewMode;
use leptos::prelude::*;

use crate::chat::CreateChatDialog;
use crate::forum::CreateForumDialog;
use crate::state::MessagingState;

#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let mode = Memo::new(move |_| state.view.with(|v| v.mode()));
    let forum_dialog = RwSignal::new(false);
    let chat_dialog = RwSignal::new(false);

    let open_dialog = move |_| {
        if mode.get_untracked().is_chat() {
            chat_dialog.set(true);
        } else {
            forum_dialog.set(true);
        }
    };

    view! {
        <aside class="agora-sidebar">
            <input
                class="agora-input agora-search"
                placeholder="Search..."
                prop:value=move || state.search.get()
                on:input=move |ev| state.search.set(event_target_value(&ev))
            />
            <nav class="agora-modes">
                {ViewMode::ALL.into_iter().map(|m| view! { <ModeButton mode=m /> }).collect_view()}
            </nav>
            <div class="agora-list">
                {move || match ChatKind::for_mode(mode.get()) {
                    None => view! { <ForumList /> }.into_any(),
                    Some(kind) => view! { <ChatList kind=kind /> }.into_any(),
                }}
            </div>
            <button class="agora-btn agora-btn-primary agora-new" on:click=open_dialog>
                {move || if mode.get().is_chat() { "New Chat" } else { "New Forum" }}
            </button>
            <Show when=move || forum_dialog.get()>
                <CreateForumDialog open=forum_dialog />
            </Show>
            <Show when=move || chat_dialog.get()>
                {move || {
                    ChatKind::for_mode(mode.get())
                        .map(|kind| view! { <CreateChatDialog kind=kind open=chat_dialog /> })
                }}
            </Show>
        </aside>
    }
}

#[component]
fn ModeButton(mode: ViewMode) -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let active = move || state.view.with(|v| v.mode() == mode);
    let unread = move || {
        ChatKind::for_mode(mode)
            .map(|kind| state.chats.with(|b| b.unread(kind)))
            .filter(|n| *n > 0)
    };

    view! {
        <button
            class="agora-mode"
            class:agora-active=active
            on:click=move |_| state.client.set_mode(mode)
        >
            {mode.label()}
            {move || unread().map(|n| view! { <span class="agora-badge">{n}</span> })}
        </button>
    }
}

#[component]
fn ForumList() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let forums = move || {
        let query = state.search.get();
        state.view.with(|v| v.forums_matching(&query))
    };
    let selected = Memo::new(move |_| state.view.with(|v| v.selected_forum_id().map(str::to_string)));

    view! {
        <For
            each=forums
            key=|f| (f.id.clone(), f.title.clone(), f.message_count, f.is_pinned)
            let:forum
        >
            {
                let id = forum.id.clone();
                let picked = forum.clone();
                view! {
                    <button
                        class="agora-item"
                        class:agora-active=move || selected.with(|s| s.as_deref() == Some(id.as_str()))
                        on:click=move |_| state.client.select_forum(Some(picked.clone()))
                    >
                        <span class="agora-item-title" class:agora-pinned=forum.is_pinned>
                            {forum.title.clone()}
                        </span>
                        <small>{format!("{} · {} messages", forum.category, forum.message_count)}</small>
                    </button>
                }
            }
        </For>
    }
}

#[component]
fn ChatList(kind: ChatKind) -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let chats = move || {
        let query = state.search.get();
        state.chats.with(|b| b.list(kind, &query))
    };
    let selected = Memo::new(move |_| state.view.with(|v| v.selected_chat().map(str::to_string)));

    view! {
        <For
            each=chats
            key=|c| (c.id.clone(), c.unread_count, c.last_message.as_ref().map(|m| m.id.clone()))
            let:chat
        >
            {
                let id = chat.id.clone();
                let open_id = chat.id.clone();
                let preview = chat
                    .last_message
                    .as_ref()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                view! {
                    <button
                        class="agora-item"
                        class:agora-active=move || selected.with(|s| s.as_deref() == Some(id.as_str()))
                        on:click=move |_| {
                            state.client.select_chat(Some(open_id.clone()));
                            state.chats.update(|b| b.mark_read(&open_id));
                        }
                    >
                        <span class="agora-avatar agora-avatar-initial">
                            {chat.name.chars().next().map(|c| c.to_uppercase().to_string()).unwrap_or_default()}
                        </span>
                        <span class="agora-item-title">{chat.name.clone()}</span>
                        <small class="agora-preview">{preview}</small>
                        {(chat.unread_count > 0).then(|| view! { <span class="agora-badge">{chat.unread_count}</span> })}
                    </button>
                }
            }
        </For>
    }
}
