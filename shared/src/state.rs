//! The view/selection state holder and the named operations that mutate it.
//!
//! [`ViewState`] is the single source of truth for what the client shows: the
//! active mode, the selected forum or chat, the forum list and the selected
//! forum's reply tree. It lives behind a [`ViewCell`] owned by the UI root and
//! is only changed through [`Messenger`].
//!
//! Every fetch takes a ticket before it starts and applies its result only if
//! the ticket is still current when it resolves. Re-selecting a forum bumps the
//! selection generation, so a late response for the previous forum is dropped;
//! a response older than one already applied is dropped too.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::backend::Backend;
use crate::error::MessengerError;
use crate::forms::{self, ForumDraft};
use crate::models::{Forum, Message, NewMessage, Profile, User, ViewMode};
use crate::realtime::{Change, ChangeFeed, Subscription, Watch};
use crate::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTicket {
    pub forum_id: String,
    selection: u64,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTicket {
    seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    mode: ViewMode,
    selected_forum: Option<Forum>,
    selected_chat: Option<String>,
    forums: Vec<Forum>,
    thread: Vec<Message>,
    selection: u64,
    thread_issued: u64,
    thread_applied: u64,
    forums_issued: u64,
    forums_applied: u64,
    pending_seq: u64,
    revision: u64,
}

impl ViewState {
    /// Bumped by every mutation a reader can observe.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn selected_forum(&self) -> Option<&Forum> {
        self.selected_forum.as_ref()
    }

    pub fn selected_forum_id(&self) -> Option<&str> {
        self.selected_forum.as_ref().map(|f| f.id.as_str())
    }

    pub fn selected_chat(&self) -> Option<&str> {
        self.selected_chat.as_deref()
    }

    pub fn forums(&self) -> &[Forum] {
        &self.forums
    }

    pub fn thread(&self) -> &[Message] {
        &self.thread
    }

    /// A thread fetch for the current selection has not resolved yet.
    pub fn is_loading_thread(&self) -> bool {
        self.selected_forum.is_some() && self.thread_applied < self.thread_issued
    }

    /// Forums whose title contains `query`, case-insensitively.
    pub fn forums_matching(&self, query: &str) -> Vec<Forum> {
        let query = query.trim().to_lowercase();
        self.forums
            .iter()
            .filter(|f| f.title.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    /// Chat modes drop the forum selection. Forum mode, or a switch between
    /// chat kinds, drops the chat selection.
    pub fn set_mode(&mut self, mode: ViewMode) {
        if mode.is_chat() {
            self.select_forum(None);
        }
        if !mode.is_chat() || mode != self.mode {
            self.selected_chat = None;
        }
        self.mode = mode;
        self.touch();
    }

    pub fn select_forum(&mut self, forum: Option<Forum>) {
        let same = self.selected_forum_id() == forum.as_ref().map(|f| f.id.as_str());
        self.selected_forum = forum;
        self.touch();
        if same {
            return;
        }
        self.selection += 1;
        self.thread.clear();
        // Older tickets are already void through `selection`.
        self.thread_applied = self.thread_issued;
    }

    pub fn select_chat(&mut self, chat_id: Option<String>) {
        self.selected_chat = chat_id;
        self.touch();
    }

    pub fn issue_thread(&mut self) -> Option<ThreadTicket> {
        let forum_id = self.selected_forum_id()?.to_string();
        self.thread_issued += 1;
        self.touch();
        Some(ThreadTicket {
            forum_id,
            selection: self.selection,
            seq: self.thread_issued,
        })
    }

    fn is_current(&self, ticket: &ThreadTicket) -> bool {
        ticket.selection == self.selection && self.selected_forum_id() == Some(&ticket.forum_id)
    }

    pub fn apply_thread(&mut self, ticket: &ThreadTicket, tree: Vec<Message>) -> bool {
        if !self.is_current(ticket) || ticket.seq < self.thread_applied {
            return false;
        }
        self.thread = tree;
        self.thread_applied = ticket.seq;
        self.touch();
        true
    }

    /// A fetch failed: keep the tree as it was, stop reporting it as loading.
    pub fn thread_failed(&mut self, ticket: &ThreadTicket) {
        if self.is_current(ticket) && ticket.seq > self.thread_applied {
            self.thread_applied = ticket.seq;
            self.touch();
        }
    }

    pub fn issue_forums(&mut self) -> ListTicket {
        self.forums_issued += 1;
        ListTicket {
            seq: self.forums_issued,
        }
    }

    pub fn apply_forums(&mut self, ticket: ListTicket, forums: Vec<Forum>) -> bool {
        if ticket.seq < self.forums_applied {
            return false;
        }
        self.forums_applied = ticket.seq;
        if let Some(selected) = &self.selected_forum {
            if let Some(fresh) = forums.iter().find(|f| f.id == selected.id) {
                self.selected_forum = Some(fresh.clone());
            }
        }
        self.forums = forums;
        self.touch();
        true
    }

    /// Adds `forum` to the list unless a forum with its id is already there.
    pub fn ensure_forum(&mut self, forum: Forum) {
        if !self.forums.iter().any(|f| f.id == forum.id) {
            self.forums.insert(0, forum);
            self.touch();
        }
    }

    /// Shows `content` in the current thread before the backend confirms it.
    /// Returns the ticket of the selection it belongs to and the temporary id.
    pub fn add_pending(
        &mut self,
        author: &User,
        content: String,
        parent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(ThreadTicket, String), MessengerError> {
        let forum_id = self
            .selected_forum_id()
            .ok_or(MessengerError::NoForumSelected)?
            .to_string();
        self.pending_seq += 1;
        let id = format!("pending-{}", self.pending_seq);
        let message = Message {
            id: id.clone(),
            forum_id: forum_id.clone(),
            content,
            author: author.clone(),
            timestamp: now,
            parent_id: parent_id.map(str::to_string),
            replies: Vec::new(),
            upvotes: 0,
            downvotes: 0,
            is_edited: false,
            pending: true,
        };
        thread::attach_reply(&mut self.thread, parent_id, message)
            .map_err(|m| MessengerError::UnknownParent(m.parent_id.unwrap_or_default()))?;
        self.touch();
        let ticket = ThreadTicket {
            forum_id,
            selection: self.selection,
            seq: self.thread_issued,
        };
        Ok((ticket, id))
    }

    /// Swaps the pending entry for the stored row. Returns false when the entry
    /// is gone, either by reselection or because a refetch already replaced it.
    pub fn confirm_pending(&mut self, ticket: &ThreadTicket, pending_id: &str, message: Message) -> bool {
        if ticket.selection != self.selection {
            return false;
        }
        match thread::replace(&mut self.thread, pending_id, message) {
            Ok(()) => {
                self.touch();
                true
            }
            Err(message) => {
                debug!("pending {pending_id} already gone; {} arrives with the next fetch", message.id);
                false
            }
        }
    }

    pub fn drop_pending(&mut self, ticket: &ThreadTicket, pending_id: &str) {
        if ticket.selection == self.selection && thread::remove(&mut self.thread, pending_id).is_some() {
            self.touch();
        }
    }
}

/// Where the [`ViewState`] lives. Both methods return `None` once the owner is
/// gone, so late results are dropped instead of applied.
pub trait ViewCell {
    fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> Option<R>;
    fn write<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> Option<R>;
}

impl ViewCell for Rc<RefCell<ViewState>> {
    fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> Option<R> {
        Some(f(&self.borrow()))
    }

    fn write<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> Option<R> {
        Some(f(&mut self.borrow_mut()))
    }
}

fn author_profile(user: &User) -> Profile {
    Profile {
        id: user.id.clone(),
        full_name: Some(user.username.clone()),
        avatar_url: user.avatar_url.clone(),
    }
}

/// Named operations over a backend and the view state.
#[derive(Clone, Copy)]
pub struct Messenger<B, C> {
    backend: B,
    view: C,
}

impl<B, C> Messenger<B, C>
where
    B: Backend + Clone + 'static,
    C: ViewCell + Clone + 'static,
{
    pub fn new(backend: B, view: C) -> Self {
        Messenger { backend, view }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn view(&self) -> &C {
        &self.view
    }

    pub fn set_mode(&self, mode: ViewMode) {
        self.view.write(|v| v.set_mode(mode));
    }

    pub fn select_forum(&self, forum: Option<Forum>) {
        self.view.write(|v| v.select_forum(forum));
    }

    pub fn select_chat(&self, chat_id: Option<String>) {
        self.view.write(|v| v.select_chat(chat_id));
    }

    /// Refetches the forum list. The ticket is taken now, before the returned
    /// future is first polled.
    pub fn refresh_forums(&self) -> impl Future<Output = ()> + 'static {
        let backend = self.backend.clone();
        let view = self.view.clone();
        let ticket = view.write(|v| v.issue_forums());
        async move {
            let Some(ticket) = ticket else { return };
            match backend.list_forums().await {
                Ok(rows) => {
                    let forums: Vec<Forum> = rows.into_iter().map(Forum::from).collect();
                    if view.write(|v| v.apply_forums(ticket, forums)) != Some(true) {
                        debug!("discarded stale forum list");
                    }
                }
                Err(e) => error!("failed to fetch forums: {e}"),
            }
        }
    }

    /// Refetches the selected forum's reply tree; a no-op without a selection.
    pub fn refresh_thread(&self) -> impl Future<Output = ()> + 'static {
        let backend = self.backend.clone();
        let view = self.view.clone();
        let ticket = view.write(|v| v.issue_thread()).flatten();
        async move {
            let Some(ticket) = ticket else { return };
            match backend.list_messages(&ticket.forum_id).await {
                Ok(rows) => {
                    let tree = thread::assemble(rows);
                    if view.write(|v| v.apply_thread(&ticket, tree)) != Some(true) {
                        debug!("discarded stale thread for forum {}", ticket.forum_id);
                    }
                }
                Err(e) => {
                    error!("failed to fetch messages for forum {}: {e}", ticket.forum_id);
                    view.write(|v| v.thread_failed(&ticket));
                }
            }
        }
    }

    /// Persists a new forum, refreshes the list and selects the forum.
    pub async fn create_forum(&self, author: &User, draft: ForumDraft) -> Result<Forum, MessengerError> {
        let new_forum = draft.into_new_forum(author)?;
        let mut record = self.backend.create_forum(&new_forum).await?;
        if record.author.is_none() {
            record.author = Some(author_profile(author));
        }
        let forum = Forum::from(record);
        self.refresh_forums().await;
        self.view
            .write(|v| {
                v.ensure_forum(forum.clone());
                v.set_mode(ViewMode::Forum);
                v.select_forum(Some(forum.clone()));
            })
            .ok_or(MessengerError::Detached)?;
        Ok(forum)
    }

    /// Posts `content` to the selected forum, under `parent_id` when replying.
    ///
    /// The message appears in the tree as pending as soon as this is called. On
    /// success it is confirmed and the tree refetched; on failure it is removed.
    pub fn post_message(
        &self,
        author: &User,
        content: &str,
        parent_id: Option<&str>,
    ) -> impl Future<Output = Result<Message, MessengerError>> + 'static {
        let this = self.clone();
        let author = author.clone();
        let prepared = forms::message_content(content)
            .map_err(MessengerError::from)
            .and_then(|content| {
                let (ticket, pending_id) = self
                    .view
                    .write(|v| v.add_pending(&author, content.clone(), parent_id, Utc::now()))
                    .ok_or(MessengerError::Detached)??;
                let new_message = NewMessage {
                    forum_id: ticket.forum_id.clone(),
                    author_id: author.id.clone(),
                    parent_id: parent_id.map(str::to_string),
                    content,
                };
                Ok((ticket, pending_id, new_message))
            });

        async move {
            let (ticket, pending_id, new_message) = prepared?;
            match this.backend.create_message(&new_message).await {
                Ok(mut record) => {
                    if record.author.is_none() {
                        record.author = Some(author_profile(&author));
                    }
                    let confirmed = Message::from(record);
                    this.view
                        .write(|v| v.confirm_pending(&ticket, &pending_id, confirmed.clone()));
                    this.refresh_thread().await;
                    Ok(confirmed)
                }
                Err(e) => {
                    this.view.write(|v| v.drop_pending(&ticket, &pending_id));
                    Err(e.into())
                }
            }
        }
    }

    /// Starts watching the forum list.
    pub fn watch_forums<F: ChangeFeed>(&self, feed: &F, on_change: impl Fn() + 'static) -> Subscription {
        feed.watch(
            Watch::forums(),
            Rc::new(move |change: &Change| {
                debug!("forums changed ({:?})", change.kind);
                on_change();
            }),
        )
    }

    /// Starts watching the selected forum's messages; `None` without a selection.
    pub fn watch_thread<F: ChangeFeed>(
        &self,
        feed: &F,
        on_change: impl Fn() + 'static,
    ) -> Option<Subscription> {
        let forum_id = self
            .view
            .read(|v| v.selected_forum_id().map(str::to_string))
            .flatten()?;
        Some(feed.watch(
            Watch::forum_messages(&forum_id),
            Rc::new(move |change: &Change| {
                debug!("messages of forum {forum_id} changed ({:?})", change.kind);
                on_change();
            }),
        ))
    }
}
