use agora_shared::forms::{ForumDraft, CATEGORIES};
use agora_shared::models::{Forum, Message};
use agora_shared::thread;
use agora_shared::{FormErrors, MessengerError};
use chrono::{DateTime, Local, Utc};
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::auth::AuthState;
use crate::state::MessagingState;

/// Replies deeper than this stop indenting further.
const MAX_INDENT: usize = 6;
const INDENT_PX: usize = 24;

pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %-d, %H:%M").to_string()
}

fn node_key(message: &Message) -> (String, bool, i64, i64, bool) {
    (
        message.id.clone(),
        message.pending,
        message.upvotes,
        message.downvotes,
        message.is_edited,
    )
}

// ── Forum view ──

#[component]
pub fn ForumView() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let selected = Memo::new(move |_| state.view.with(|v| v.selected_forum_id().map(str::to_string)));

    move || match selected.get() {
        None => view! {
            <section class="agora-empty">
                <h3>"Select a forum to start"</h3>
                <p class="agora-hint">"Pick a forum from the sidebar or create a new one."</p>
            </section>
        }
        .into_any(),
        Some(_) => view! {
            <section class="agora-forum">
                <ForumHeader />
                <ThreadList />
                <div class="agora-composer-bottom">
                    <Composer placeholder="Share your thoughts..." />
                </div>
            </section>
        }
        .into_any(),
    }
}

#[component]
fn ForumHeader() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let forum = Memo::new(move |_| state.view.with(|v| v.selected_forum().cloned()));

    move || {
        forum.get().map(|f: Forum| {
            view! {
                <header class="agora-forum-header">
                    <h2>
                        {f.is_pinned.then(|| view! { <span class="agora-pin" title="Pinned">"📌 "</span> })}
                        {f.title.clone()}
                    </h2>
                    {(!f.description.is_empty()).then(|| {
                        view! { <p class="agora-forum-description">{f.description.clone()}</p> }
                    })}
                    <div class="agora-tags">
                        {f.tags.iter().map(|t| view! { <span class="agora-tag">{t.clone()}</span> }).collect_view()}
                    </div>
                    <div class="agora-forum-meta">
                        <span>{format!("by {}", f.author.username)}</span>
                        <span>{f.category.clone()}</span>
                        <span>{format!("{} messages", f.message_count)}</span>
                    </div>
                </header>
            }
        })
    }
}

#[component]
fn ThreadList() -> impl IntoView {
    let state = expect_context::<MessagingState>();
    let loading = Memo::new(move |_| state.view.with(|v| v.is_loading_thread()));
    let roots = Memo::new(move |_| state.view.with(|v| v.thread().to_vec()));

    view! {
        <div class="agora-thread">
            <Show when=move || loading.get() && roots.with(Vec::is_empty)>
                <p class="agora-loading">"Loading..."</p>
            </Show>
            <Show when=move || !loading.get() && roots.with(Vec::is_empty)>
                <p class="agora-hint">"No messages yet. Start the conversation!"</p>
            </Show>
            <For each=move || roots.get() key=node_key let:message>
                <MessageNode message=message depth=0 />
            </For>
        </div>
    }
}

/// One message and, below it, its replies.
#[component]
fn MessageNode(message: Message, depth: usize) -> AnyView {
    let state = expect_context::<MessagingState>();
    let id = message.id.clone();
    let replies = Memo::new({
        let id = id.clone();
        move |_| {
            state.view.with(|v| {
                thread::find(v.thread(), &id)
                    .map(|m| m.replies.clone())
                    .unwrap_or_default()
            })
        }
    });
    let show_replies = RwSignal::new(true);
    let replying = RwSignal::new(false);
    let parent = StoredValue::new(id);
    let indent = depth.min(MAX_INDENT) * INDENT_PX;

    let toggle_label = move || {
        let n = replies.with(Vec::len);
        let noun = if n == 1 { "reply" } else { "replies" };
        let verb = if show_replies.get() { "Hide" } else { "Show" };
        format!("{verb} {n} {noun}")
    };

    view! {
        <div
            class="agora-message"
            class:agora-pending=message.pending
            style=format!("margin-left: {indent}px")
        >
            <div class="agora-message-header">
                <span class="agora-avatar agora-avatar-initial">{message.author.initial()}</span>
                <strong>{message.author.username.clone()}</strong>
                <time>{format_time(message.timestamp)}</time>
                {message.is_edited.then(|| view! { <span class="agora-edited">"(edited)"</span> })}
                {message.pending.then(|| view! { <span class="agora-hint">"Sending..."</span> })}
            </div>
            <p class="agora-message-body">{message.content.clone()}</p>
            <div class="agora-message-actions">
                <span class="agora-votes" title="Upvotes">{format!("▲ {}", message.upvotes)}</span>
                <span class="agora-votes" title="Downvotes">{format!("▼ {}", message.downvotes)}</span>
                <Show when=move || !message.pending>
                    <button class="agora-btn agora-btn-sm" on:click=move |_| replying.update(|v| *v = !*v)>
                        {move || if replying.get() { "Cancel" } else { "Reply" }}
                    </button>
                </Show>
                <Show when=move || !replies.with(Vec::is_empty)>
                    <button class="agora-btn agora-btn-sm" on:click=move |_| show_replies.update(|v| *v = !*v)>
                        {toggle_label}
                    </button>
                </Show>
            </div>
            <Show when=move || replying.get()>
                <Composer placeholder="Write a reply..." parent=parent.get_value() done=replying />
            </Show>
            <Show when=move || show_replies.get()>
                <For each=move || replies.get() key=node_key let:reply>
                    <MessageNode message=reply depth=depth + 1 />
                </For>
            </Show>
        </div>
    }
    .into_any()
}

/// Text box posting to the selected forum, as a reply when `parent` is set.
/// Enter sends; Shift+Enter starts a new line.
#[component]
fn Composer(
    placeholder: &'static str,
    #[prop(optional, into)] parent: Option<String>,
    /// Cleared once the message is handed off.
    #[prop(optional)]
    done: Option<RwSignal<bool>>,
) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let state = expect_context::<MessagingState>();
    let draft = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let parent = StoredValue::new(parent);

    let submit = move || {
        let Some(user) = auth.user_untracked() else { return };
        let content = draft.get_untracked();
        if content.trim().is_empty() {
            return;
        }
        error.set(None);
        let post = state
            .client
            .post_message(&user, &content, parent.get_value().as_deref());
        draft.set(String::new());
        if let Some(done) = done {
            done.set(false);
        }
        spawn_local(async move {
            if let Err(e) = post.await {
                log::error!("failed to post message: {e}");
                let _ = error.try_set(Some("Could not send your message.".to_string()));
                let _ = draft.try_set(content);
            }
        });
    };

    view! {
        <div class="agora-composer">
            <textarea
                class="agora-textarea"
                placeholder=placeholder
                prop:value=move || draft.get()
                on:input=move |ev| draft.set(event_target_value(&ev))
                on:keydown=move |ev: leptos::ev::KeyboardEvent| {
                    if ev.key() == "Enter" && !ev.shift_key() {
                        ev.prevent_default();
                        submit();
                    }
                }
            />
            <button
                class="agora-btn agora-btn-primary"
                disabled=move || draft.with(|d| d.trim().is_empty())
                on:click=move |_| submit()
            >
                "Send"
            </button>
            <Show when=move || error.get().is_some()>
                <p class="agora-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
        </div>
    }
}

// ── Create forum ──

#[component]
pub fn CreateForumDialog(open: RwSignal<bool>) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let state = expect_context::<MessagingState>();
    let draft = RwSignal::new(ForumDraft::default());
    let tag_input = RwSignal::new(String::new());
    let errors = RwSignal::new(FormErrors::new());
    let failure: RwSignal<Option<String>> = RwSignal::new(None);
    let submitting = RwSignal::new(false);

    let add_tag = move || {
        let tag = tag_input.get_untracked();
        draft.update(|d| {
            d.add_tag(&tag);
        });
        tag_input.set(String::new());
    };

    let close = move || {
        draft.set(ForumDraft::default());
        errors.set(FormErrors::new());
        failure.set(None);
        open.set(false);
    };

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let Some(user) = auth.user_untracked() else { return };
        let form = draft.get_untracked();
        if let Err(e) = form.validate() {
            errors.set(e);
            return;
        }
        errors.set(FormErrors::new());
        failure.set(None);
        submitting.set(true);
        let client = state.client;
        spawn_local(async move {
            match client.create_forum(&user, form).await {
                Ok(forum) => {
                    log::info!("created forum {}", forum.id);
                    close();
                }
                Err(MessengerError::Invalid(e)) => {
                    let _ = errors.try_set(e);
                }
                Err(e) => {
                    log::error!("failed to create forum: {e}");
                    let _ = failure.try_set(Some("Could not create the forum.".to_string()));
                }
            }
            let _ = submitting.try_set(false);
        });
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
                <h3>"Create New Forum"</h3>
                <label>"Forum Title"</label>
                <input
                    class="agora-input"
                    placeholder="e.g., Best Practices for React"
                    prop:value=move || draft.with(|d| d.title.clone())
                    on:input=move |ev| draft.update(|d| d.title = event_target_value(&ev))
                />
                {field_error("title")}
                <label>"Description"</label>
                <textarea
                    class="agora-textarea"
                    placeholder="Describe what this forum is about..."
                    prop:value=move || draft.with(|d| d.description.clone())
                    on:input=move |ev| draft.update(|d| d.description = event_target_value(&ev))
                />
                <label>"Category"</label>
                <select
                    class="agora-input"
                    prop:value=move || draft.with(|d| d.category.clone())
                    on:change=move |ev| draft.update(|d| d.category = event_target_value(&ev))
                >
                    <option value="">"Choose a category"</option>
                    {CATEGORIES
                        .iter()
                        .map(|c| view! { <option value=*c>{*c}</option> })
                        .collect_view()}
                </select>
                {field_error("category")}
                <label>"Tags"</label>
                <div class="agora-tag-input">
                    <input
                        class="agora-input"
                        placeholder="Type and press Enter or click Add"
                        prop:value=move || tag_input.get()
                        on:input=move |ev| tag_input.set(event_target_value(&ev))
                        on:keydown=move |ev: leptos::ev::KeyboardEvent| {
                            if ev.key() == "Enter" {
                                ev.prevent_default();
                                add_tag();
                            }
                        }
                    />
                    <button class="agora-btn agora-btn-sm" type="button" on:click=move |_| add_tag()>
                        "Add"
                    </button>
                </div>
                <div class="agora-tags">
                    <For each=move || draft.with(|d| d.tags.clone()) key=|t| t.clone() let:tag>
                        <span class="agora-tag">
                            {tag.clone()}
                            <button
                                class="agora-tag-remove"
                                type="button"
                                on:click=move |_| draft.update(|d| d.remove_tag(&tag))
                            >
                                "×"
                            </button>
                        </span>
                    </For>
                </div>
                <Show when=move || failure.get().is_some()>
                    <p class="agora-error">{move || failure.get().unwrap_or_default()}</p>
                </Show>
                <div class="agora-dialog-actions">
                    <button class="agora-btn" type="button" on:click=move |_| close()>"Cancel"</button>
                    <button class="agora-btn agora-btn-primary" type="submit" disabled=move || submitting.get()>
                        {move || if submitting.get() { "Creating..." } else { "Create Forum" }}
                    </button>
                </div>
            </form>
        </div>
    }
}
