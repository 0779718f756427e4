//! In-memory doubles for the backend and the change feed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::models::{ForumRecord, MessageRecord, NewForum, NewMessage, Profile};
use crate::realtime::{Change, ChangeFeed, ChangeKind, Handler, Subscription, Watch};
use crate::rest;

#[derive(Default)]
struct Tables {
    forums: Vec<ForumRecord>,
    messages: Vec<MessageRecord>,
    profiles: Vec<Profile>,
    seq: i64,
    /// Calls left to succeed, then the error the following call returns.
    failure: Option<(usize, BackendError)>,
}

impl Tables {
    fn take_failure(&mut self) -> Result<(), BackendError> {
        match self.failure.take() {
            Some((0, e)) => Err(e),
            Some((left, e)) => {
                self.failure = Some((left - 1, e));
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Row timestamps advance one second per insert.
    fn stamp(&mut self) -> (i64, DateTime<Utc>) {
        self.seq += 1;
        (self.seq, epoch() + Duration::seconds(self.seq))
    }

    fn author(&self, id: &str) -> Option<Profile> {
        self.profiles.iter().find(|p| p.id == id).cloned()
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 10, 10, 0, 0).unwrap()
}

#[derive(Clone, Default)]
pub(crate) struct MemoryBackend {
    tables: Rc<RefCell<Tables>>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn forum_record(id: &str, title: &str) -> ForumRecord {
        ForumRecord {
            id: id.into(),
            title: title.into(),
            description: None,
            category: "General".into(),
            author_id: "u1".into(),
            author: None,
            tags: None,
            message_count: 0,
            last_activity: None,
            is_pinned: None,
            created_at: epoch(),
        }
    }

    /// The next call fails with `error`.
    pub(crate) fn fail_next(&self, error: BackendError) {
        self.fail_after(0, error);
    }

    /// Lets `calls` calls through, then fails the one after with `error`.
    pub(crate) fn fail_after(&self, calls: usize, error: BackendError) {
        self.tables.borrow_mut().failure = Some((calls, error));
    }

    pub(crate) fn forum_count(&self) -> usize {
        self.tables.borrow().forums.len()
    }

    pub(crate) fn message_count(&self) -> usize {
        self.tables.borrow().messages.len()
    }

    pub(crate) fn clear_forums(&self) {
        self.tables.borrow_mut().forums.clear();
    }

    pub(crate) fn clear_messages(&self) {
        self.tables.borrow_mut().messages.clear();
    }
}

impl Backend for MemoryBackend {
    async fn list_forums(&self) -> Result<Vec<ForumRecord>, BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        let mut forums = tables.forums.clone();
        forums.sort_by(|a, b| {
            b.is_pinned
                .unwrap_or(false)
                .cmp(&a.is_pinned.unwrap_or(false))
                .then(b.last_activity.cmp(&a.last_activity))
        });
        Ok(forums)
    }

    async fn create_forum(&self, forum: &NewForum) -> Result<ForumRecord, BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        let (seq, now) = tables.stamp();
        let record = ForumRecord {
            id: format!("f{seq}"),
            title: forum.title.clone(),
            description: Some(forum.description.clone()),
            category: forum.category.clone(),
            author_id: forum.author_id.clone(),
            author: tables.author(&forum.author_id),
            tags: Some(forum.tags.clone()),
            message_count: forum.message_count,
            last_activity: Some(now),
            is_pinned: Some(forum.is_pinned),
            created_at: now,
        };
        tables.forums.push(record.clone());
        Ok(record)
    }

    async fn list_messages(&self, forum_id: &str) -> Result<Vec<MessageRecord>, BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.forum_id == forum_id)
            .cloned()
            .collect())
    }

    async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord, BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        let (seq, now) = tables.stamp();
        let record = MessageRecord {
            id: format!("m{seq}"),
            forum_id: message.forum_id.clone(),
            author_id: message.author_id.clone(),
            parent_id: message.parent_id.clone(),
            content: message.content.clone(),
            upvotes: 0,
            downvotes: 0,
            is_edited: false,
            created_at: now,
            author: tables.author(&message.author_id),
        };
        tables.messages.push(record.clone());
        Ok(record)
    }

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        Ok(tables.author(user_id))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        Ok(tables.profiles.clone())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), BackendError> {
        let mut tables = self.tables.borrow_mut();
        tables.take_failure()?;
        tables.profiles.retain(|p| p.id != profile.id);
        tables.profiles.push(profile.clone());
        Ok(())
    }
}

struct Registration {
    id: u64,
    watch: Watch,
    handler: Handler,
}

/// Delivers changes synchronously to every matching live watch.
#[derive(Clone, Default)]
pub(crate) struct MemoryFeed {
    watches: Rc<RefCell<Vec<Registration>>>,
    next_id: Rc<Cell<u64>>,
}

impl MemoryFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn active(&self) -> usize {
        self.watches.borrow().len()
    }

    fn emit(&self, change: Change) {
        let handlers: Vec<Handler> = self
            .watches
            .borrow()
            .iter()
            .filter(|r| r.watch.table == change.table && matches_filter(&r.watch, &change))
            .map(|r| Rc::clone(&r.handler))
            .collect();
        for handler in handlers {
            handler(&change);
        }
    }

    pub(crate) fn emit_forum(&self) {
        self.emit(Change {
            table: rest::FORUMS.into(),
            kind: ChangeKind::Update,
            record: json!({ "id": "f1" }),
            old_record: json!({}),
        });
    }

    pub(crate) fn emit_message(&self, forum_id: &str) {
        self.emit(Change {
            table: rest::FORUM_MESSAGES.into(),
            kind: ChangeKind::Insert,
            record: json!({ "id": "m1", "forum_id": forum_id }),
            old_record: json!({}),
        });
    }
}

/// Supports the `column=eq.value` filters the client issues.
fn matches_filter(watch: &Watch, change: &Change) -> bool {
    let Some(filter) = &watch.filter else {
        return true;
    };
    let Some((column, value)) = filter.split_once("=eq.") else {
        return false;
    };
    change.record.get(column).and_then(|v| v.as_str()) == Some(value)
}

impl ChangeFeed for MemoryFeed {
    fn watch(&self, watch: Watch, handler: Handler) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.watches.borrow_mut().push(Registration { id, watch, handler });
        let watches = Rc::clone(&self.watches);
        Subscription::new(move || watches.borrow_mut().retain(|r| r.id != id))
    }
}
