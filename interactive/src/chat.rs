use agora_shared::backend::Backend;
use agora_shared::chat::{Bubble, ChatDraft, ChatKind};
use agora_shared::models::User;
use agora_shared::FormErrors;
use chrono::Utc;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::auth::AuthState;
use crate::forum::format_time;
use crate::state::MessagingState;

#[component]
pub fn ChatView() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let selected = Memo::new(move |_| state.view.with(|v| v.selected_chat().map(str::to_string)));

    move || match selected.get() {
        None => view! {
            <section class="agora-empty">
                <h3>"Select a chat to start messaging"</h3>
                <p class="agora-hint">"Choose a conversation from the sidebar or start a new one."</p>
            </section>
        }
        .into_any(),
        Some(chat_id) => view! { <Conversation chat_id=chat_id /> }.into_any(),
    }
}

#[component]
fn Conversation(chat_id: String) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let state = expect_context::<MessagingState>();
    let chat_id = StoredValue::new(chat_id);
    let draft = RwSignal::new(String::new());

    let chat = Memo::new(move |_| {
        chat_id.with_value(|id| state.chats.with(|b| b.get(id).cloned()))
    });
    let bubbles = Memo::new(move |_| {
        let me = auth.user().map(|u| u.id).unwrap_or_default();
        chat_id.with_value(|id| state.chats.with(|b| b.timeline(id, &me)))
    });

    let send = move || {
        let Some(me) = auth.user_untracked() else { return };
        let content = draft.get_untracked();
        let sent = chat_id.with_value(|id| {
            state
                .chats
                .try_update(|b| b.send(id, &me, &content, Utc::now()))
                .flatten()
        });
        if sent.is_some() {
            draft.set(String::new());
        }
    };

    view! {
        <section class="agora-chat">
            <header class="agora-chat-header">
                {move || {
                    chat.get().map(|c| {
                        let subtitle = match c.kind {
                            ChatKind::Private => "Private chat".to_string(),
                            ChatKind::Group => format!("{} participants", c.participants.len()),
                        };
                        view! {
                            <span class="agora-avatar agora-avatar-initial">
                                {c.name.chars().next().map(|ch| ch.to_uppercase().to_string()).unwrap_or_default()}
                            </span>
                            <div>
                                <strong>{c.name.clone()}</strong>
                                <small>{subtitle}</small>
                            </div>
                        }
                    })
                }}
            </header>
            <div class="agora-bubbles">
                <For each=move || bubbles.get() key=|b| b.message.id.clone() let:bubble>
                    <BubbleRow bubble=bubble />
                </For>
            </div>
            <div class="agora-composer">
                <textarea
                    class="agora-textarea"
                    placeholder="Type a message..."
                    prop:value=move || draft.get()
                    on:input=move |ev| draft.set(event_target_value(&ev))
                    on:keydown=move |ev: leptos::ev::KeyboardEvent| {
                        if ev.key() == "Enter" && !ev.shift_key() {
                            ev.prevent_default();
                            send();
                        }
                    }
                />
                <button
                    class="agora-btn agora-btn-primary"
                    disabled=move || draft.with(|d| d.trim().is_empty())
                    on:click=move |_| send()
                >
                    "Send"
                </button>
            </div>
        </section>
    }
}

#[component]
fn BubbleRow(bubble: Bubble) -> impl IntoView {
    let sender = bubble.message.sender;
    view! {
        {bubble.show_separator.then(|| view! {
            <div class="agora-separator">{format_time(bubble.message.timestamp)}</div>
        })}
        <div class="agora-bubble-row" class:agora-own=bubble.own>
            {if bubble.show_avatar {
                view! { <span class="agora-avatar agora-avatar-initial" title=sender.username.clone()>{sender.initial()}</span> }.into_any()
            } else {
                view! { <span class="agora-avatar-spacer"></span> }.into_any()
            }}
            <div class="agora-bubble">
                <p>{bubble.message.content}</p>
            </div>
        </div>
    }
}

// ── Create chat ──

#[component]
pub fn CreateChatDialog(kind: ChatKind, open: RwSignal<bool>) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let state = expect_context::<MessagingState>();
    let name = RwSignal::new(String::new());
    let people: RwSignal<Vec<User>> = RwSignal::new(Vec::new());
    let picked: RwSignal<Vec<User>> = RwSignal::new(Vec::new());
    let filter = RwSignal::new(String::new());
    let errors = RwSignal::new(FormErrors::new());

    let client = state.client;
    let me = auth.user_untracked().map(|u| u.id).unwrap_or_default();
    spawn_local(async move {
        match client.backend().list_profiles().await {
            Ok(profiles) => {
                let others = profiles
                    .into_iter()
                    .filter(|p| p.id != me)
                    .map(User::from)
                    .collect();
                let _ = people.try_set(others);
            }
            Err(e) => log::error!("failed to load profiles: {e}"),
        }
    });

    let candidates = move || {
        let query = filter.get().trim().to_lowercase();
        people.with(|all| {
            all.iter()
                .filter(|u| u.username.to_lowercase().contains(&query))
                .cloned()
                .collect::<Vec<_>>()
        })
    };

    let toggle = move |user: User| {
        picked.update(|list| {
            if let Some(pos) = list.iter().position(|u| u.id == user.id) {
                list.remove(pos);
            } else if kind == ChatKind::Private {
                *list = vec![user];
            } else {
                list.push(user);
            }
        });
    };

    let close = move || {
        name.set(String::new());
        picked.set(Vec::new());
        errors.set(FormErrors::new());
        open.set(false);
    };

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let draft = ChatDraft {
            name: name.get_untracked(),
            kind,
            participants: picked.get_untracked(),
        };
        match state.chats.try_update(|b| b.create(draft, Utc::now())) {
            Some(Ok(chat)) => {
                state.client.select_chat(Some(chat.id));
                close();
            }
            Some(Err(e)) => errors.set(e),
            None => {}
        }
    };

    let (title, name_placeholder, picker_label) = match kind {
        ChatKind::Private => ("Create Private Chat", "Recipient's name", "Select Recipient"),
        ChatKind::Group => ("Create Group Chat", "Group name", "Select Participants"),
    };

    let field_error = move |field: &'static str| {
        move || {
            errors.with(|e| e.get(field).map(str::to_string)).map(|message| {
                view! { <small class="agora-error">{message}</small> }
            })
        }
    };

    view! {
        <div class="agora-dialog-backdrop">
            <form class="agora-dialog" on:submit=on_submit>
                <h3>{title}</h3>
                <input
                    class="agora-input"
                    placeholder=name_placeholder
                    prop:value=move || name.get()
                    on:input=move |ev| name.set(event_target_value(&ev))
                />
                {field_error("name")}
                <label>{picker_label}</label>
                <input
                    class="agora-input"
                    placeholder="Search users..."
                    prop:value=move || filter.get()
                    on:input=move |ev| filter.set(event_target_value(&ev))
                />
                <ul class="agora-picker">
                    <For each=candidates key=|u| u.id.clone() let:user>
                        <li
                            class="agora-picker-item"
                            class:agora-picked={
                                let id = user.id.clone();
                                move || picked.with(|list| list.iter().any(|u| u.id == id))
                            }
                            on:click={
                                let user = user.clone();
                                move |_| toggle(user.clone())
                            }
                        >
                            <span class="agora-avatar agora-avatar-initial">{user.initial()}</span>
                            {user.username.clone()}
                        </li>
                    </For>
                </ul>
                {field_error("participants")}
                <div class="agora-dialog-actions">
                    <button class="agora-btn" type="button" on:click=move |_| close()>"Cancel"</button>
                    <button class="agora-btn agora-btn-primary" type="submit">"Create"</button>
                </div>
            </form>
        </div>
    }
}
