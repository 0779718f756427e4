//! Push subscriptions on table changes.
//!
//! The hosted realtime service speaks Phoenix channel frames over a websocket.
//! This module holds the transport-independent half: what a watch is, the guard
//! that ends it, the frame codec, and the [`Hub`] that maps incoming changes to
//! handlers. The browser crate owns the socket.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::rest;

pub const HEARTBEAT_SECS: u32 = 30;
pub const RECONNECT_SECS: u32 = 5;

const PHOENIX_TOPIC: &str = "phoenix";
const CHANGES_EVENT: &str = "postgres_changes";

// ── Watches ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    #[serde(rename = "*")]
    All,
}

impl ChangeKind {
    fn admits(self, other: ChangeKind) -> bool {
        self == ChangeKind::All || self == other
    }
}

/// Which table changes to be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub table: &'static str,
    pub filter: Option<String>,
    pub event: ChangeKind,
}

impl Watch {
    pub fn forums() -> Self {
        Watch {
            table: rest::FORUMS,
            filter: None,
            event: ChangeKind::All,
        }
    }

    pub fn forum_messages(forum_id: &str) -> Self {
        Watch {
            table: rest::FORUM_MESSAGES,
            filter: Some(format!("forum_id=eq.{forum_id}")),
            event: ChangeKind::All,
        }
    }

    pub fn notifications() -> Self {
        Watch {
            table: rest::FORUM_NOTIFICATIONS,
            filter: None,
            event: ChangeKind::Insert,
        }
    }
}

/// One reported row change.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Value,
    pub old_record: Value,
}

pub type Handler = Rc<dyn Fn(&Change)>;

/// Live watch. Dropping it unsubscribes.
#[must_use = "dropping a Subscription ends the watch immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Subscription {
            release: Some(Box::new(release)),
        }
    }

    /// A guard with nothing to release, for feeds that could not subscribe.
    pub fn inert() -> Self {
        Subscription { release: None }
    }

}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Source of change notifications.
pub trait ChangeFeed {
    fn watch(&self, watch: Watch, on_change: Handler) -> Subscription;
}

// ── Wire frames ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

#[derive(Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    old_record: Value,
}

impl Frame {
    pub fn parse(text: &str) -> Result<Frame, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> String {
        // A Frame is plain strings and JSON values.
        serde_json::to_string(self).unwrap_or_default()
    }

    fn join(topic: &str, watch: &Watch, access_token: Option<&str>, reference: String) -> Frame {
        let mut change = json!({
            "event": watch.event,
            "schema": "public",
            "table": watch.table,
        });
        if let Some(filter) = &watch.filter {
            change["filter"] = Value::String(filter.clone());
        }
        let mut payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        Frame {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload,
            join_ref: Some(reference.clone()),
            reference: Some(reference),
        }
    }

    fn leave(topic: &str, reference: String) -> Frame {
        Frame {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference),
            join_ref: None,
        }
    }

    /// The row change carried by this frame, if it is one.
    pub fn change(&self) -> Option<Change> {
        if self.event != CHANGES_EVENT {
            return None;
        }
        let data: ChangeData = serde_json::from_value(self.payload.get("data")?.clone()).ok()?;
        Some(Change {
            table: data.table,
            kind: data.kind,
            record: data.record,
            old_record: data.old_record,
        })
    }

    /// Server reply status for `phx_reply` frames.
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != "phx_reply" {
            return None;
        }
        self.payload.get("status")?.as_str()
    }
}

// ── Hub ──

struct Entry {
    topic: String,
    watch: Watch,
    handler: Handler,
}

/// Registry of live watches on one socket.
#[derive(Default)]
pub struct Hub {
    next_id: u64,
    next_ref: u64,
    entries: BTreeMap<u64, Entry>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn reference(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    /// Registers a watch; returns its id and the join frame to send.
    pub fn join(&mut self, watch: Watch, handler: Handler, access_token: Option<&str>) -> (u64, Frame) {
        self.next_id += 1;
        let id = self.next_id;
        let topic = format!("realtime:{}-{}", watch.table, id);
        let reference = self.reference();
        let frame = Frame::join(&topic, &watch, access_token, reference);
        self.entries.insert(
            id,
            Entry {
                topic,
                watch,
                handler,
            },
        );
        (id, frame)
    }

    /// Forgets a watch; returns the leave frame if it was live.
    pub fn leave(&mut self, id: u64) -> Option<Frame> {
        let entry = self.entries.remove(&id)?;
        let reference = self.reference();
        Some(Frame::leave(&entry.topic, reference))
    }

    pub fn heartbeat(&mut self) -> Frame {
        Frame {
            topic: PHOENIX_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(self.reference()),
            join_ref: None,
        }
    }

    /// Join frames for every live watch, for a fresh connection.
    pub fn rejoin(&mut self, access_token: Option<&str>) -> Vec<Frame> {
        let targets: Vec<(String, Watch)> = self
            .entries
            .values()
            .map(|e| (e.topic.clone(), e.watch.clone()))
            .collect();
        targets
            .into_iter()
            .map(|(topic, watch)| {
                let reference = self.reference();
                Frame::join(&topic, &watch, access_token, reference)
            })
            .collect()
    }

    /// Hands a renewed token to every joined channel.
    pub fn access_token(&mut self, token: &str) -> Vec<Frame> {
        let topics: Vec<String> = self.entries.values().map(|e| e.topic.clone()).collect();
        topics
            .into_iter()
            .map(|topic| Frame {
                topic,
                event: "access_token".to_string(),
                payload: json!({ "access_token": token }),
                reference: Some(self.reference()),
                join_ref: None,
            })
            .collect()
    }

    /// Handlers interested in `frame`, paired with the decoded change. The caller
    /// invokes them after releasing any borrow on the hub.
    pub fn route(&self, frame: &Frame) -> Vec<(Handler, Change)> {
        let Some(change) = frame.change() else {
            return Vec::new();
        };
        self.entries
            .values()
            .filter(|e| e.topic == frame.topic && e.watch.event.admits(change.kind))
            .map(|e| (Rc::clone(&e.handler), change.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn change_frame(topic: &str, kind: &str) -> Frame {
        Frame::parse(
            &json!({
                "topic": topic,
                "event": "postgres_changes",
                "payload": {
                    "data": {
                        "schema": "public",
                        "table": "forum_messages",
                        "type": kind,
                        "record": { "id": "m1", "forum_id": "f1" },
                        "old_record": null,
                        "commit_timestamp": "2025-11-10T10:30:00Z"
                    },
                    "ids": [1]
                },
                "ref": null
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn join_frame_carries_filter_and_token() {
        let mut hub = Hub::new();
        let (_, frame) = hub.join(Watch::forum_messages("f1"), Rc::new(|_: &Change| {}), Some("jwt"));

        assert_eq!(frame.event, "phx_join");
        assert_eq!(frame.topic, "realtime:forum_messages-1");
        let change = &frame.payload["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "*");
        assert_eq!(change["table"], "forum_messages");
        assert_eq!(change["filter"], "forum_id=eq.f1");
        assert_eq!(frame.payload["access_token"], "jwt");

        let wire: Value = serde_json::from_str(&frame.encode()).unwrap();
        assert_eq!(wire["ref"], "1");
        assert_eq!(wire["join_ref"], "1");
    }

    #[test]
    fn routes_changes_to_matching_topic_only() {
        let mut hub = Hub::new();
        let hits = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&hits);
        let (_, first) = hub.join(
            Watch::forum_messages("f1"),
            Rc::new(move |c: &Change| sink.borrow_mut().push(c.record["id"].clone())),
            None,
        );
        let (_, _second) = hub.join(Watch::forums(), Rc::new(|_: &Change| panic!("wrong topic")), None);

        for (handler, change) in hub.route(&change_frame(&first.topic, "INSERT")) {
            handler(&change);
        }
        assert_eq!(*hits.borrow(), vec![json!("m1")]);
    }

    #[test]
    fn insert_only_watch_ignores_updates() {
        let mut hub = Hub::new();
        let (_, join) = hub.join(Watch::notifications(), Rc::new(|_: &Change| {}), None);
        assert_eq!(join.payload["config"]["postgres_changes"][0]["event"], "INSERT");

        assert!(hub.route(&change_frame(&join.topic, "UPDATE")).is_empty());
        assert_eq!(hub.route(&change_frame(&join.topic, "INSERT")).len(), 1);
    }

    #[test]
    fn leave_and_rejoin() {
        let mut hub = Hub::new();
        let (a, _) = hub.join(Watch::forums(), Rc::new(|_: &Change| {}), None);
        let (_, b) = hub.join(Watch::forum_messages("f2"), Rc::new(|_: &Change| {}), None);

        let leave = hub.leave(a).unwrap();
        assert_eq!(leave.event, "phx_leave");
        assert!(hub.leave(a).is_none());

        let rejoined = hub.rejoin(Some("fresh"));
        assert_eq!(rejoined.len(), 1);
        assert_eq!(rejoined[0].topic, b.topic);
        assert_eq!(rejoined[0].payload["access_token"], "fresh");
        assert_eq!(hub.heartbeat().topic, "phoenix");
    }

    #[test]
    fn renewed_token_reaches_every_live_channel() {
        let mut hub = Hub::new();
        let (first, _) = hub.join(Watch::forums(), Rc::new(|_: &Change| {}), Some("old"));
        hub.join(Watch::forum_messages("f1"), Rc::new(|_: &Change| {}), Some("old"));
        hub.leave(first);

        let frames = hub.access_token("fresh");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "access_token");
        assert!(frames[0].topic.starts_with("realtime:forum_messages-"));
        assert_eq!(frames[0].payload["access_token"], "fresh");
    }

    #[test]
    fn non_change_frames_are_ignored() {
        let reply = Frame::parse(
            r#"{"topic":"realtime:forums-1","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        )
        .unwrap();
        assert!(reply.change().is_none());
        assert_eq!(reply.reply_status(), Some("ok"));
    }

    #[test]
    fn subscription_releases_once() {
        let released = Rc::new(Cell::new(0));
        let counter = Rc::clone(&released);
        let sub = Subscription::new(move || counter.set(counter.get() + 1));
        assert_eq!(released.get(), 0);
        drop(sub);
        assert_eq!(released.get(), 1);

        let counter = Rc::clone(&released);
        drop(Subscription::new(move || counter.set(counter.get() + 1)));
        assert_eq!(released.get(), 2);
        drop(Subscription::inert());
        assert_eq!(released.get(), 2);
    }
}
