//! Group and private chats. Held in memory for the session only.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FormErrors;
use crate::models::{User, ViewMode};

/// Gap after which the conversation shows a date separator.
pub const SEPARATOR_GAP_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

impl ChatKind {
    pub fn for_mode(mode: ViewMode) -> Option<ChatKind> {
        match mode {
            ViewMode::Forum => None,
            ViewMode::Group => Some(ChatKind::Group),
            ViewMode::Private => Some(ChatKind::Private),
        }
    }

    pub fn mode(self) -> ViewMode {
        match self {
            ChatKind::Private => ViewMode::Private,
            ChatKind::Group => ViewMode::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub content: String,
    pub sender: User,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub name: String,
    pub kind: ChatKind,
    pub participants: Vec<User>,
    pub last_message: Option<ChatMessage>,
    pub unread_count: u32,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatDraft {
    pub name: String,
    pub kind: ChatKind,
    pub participants: Vec<User>,
}

impl ChatDraft {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Name is required");
        }
        match self.kind {
            ChatKind::Group if self.participants.len() < 2 => {
                errors.add("participants", "Group chat requires at least 2 participants")
            }
            ChatKind::Private if self.participants.len() != 1 => {
                errors.add("participants", "Private chat requires exactly 1 participant")
            }
            _ => {}
        }
        errors.into_result(())
    }
}

/// One rendered bubble of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub message: ChatMessage,
    pub own: bool,
    /// Last message of a run from the same (other) sender.
    pub show_avatar: bool,
    pub show_separator: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatBook {
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<ChatMessage>>,
    next_seq: u64,
}

impl ChatBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, prefix: &str, now: DateTime<Utc>) -> String {
        self.next_seq += 1;
        format!("{prefix}-{}-{}", now.timestamp_millis(), self.next_seq)
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    /// Chats of `kind` whose name contains `query`, case-insensitively.
    pub fn list(&self, kind: ChatKind, query: &str) -> Vec<Chat> {
        let query = query.trim().to_lowercase();
        self.chats
            .iter()
            .filter(|c| c.kind == kind && c.name.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    pub fn unread(&self, kind: ChatKind) -> u32 {
        self.chats
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.unread_count)
            .sum()
    }

    pub fn create(&mut self, draft: ChatDraft, now: DateTime<Utc>) -> Result<Chat, FormErrors> {
        draft.validate()?;
        let chat = Chat {
            id: self.next_id("chat", now),
            name: draft.name.trim().to_string(),
            kind: draft.kind,
            avatar_url: draft.participants.first().and_then(|u| u.avatar_url.clone()),
            participants: draft.participants,
            last_message: None,
            unread_count: 0,
        };
        self.chats.push(chat.clone());
        Ok(chat)
    }

    pub fn mark_read(&mut self, chat_id: &str) {
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.unread_count = 0;
        }
    }

    /// Appends a message from `sender`; returns `None` for blank text or an unknown chat.
    pub fn send(
        &mut self,
        chat_id: &str,
        sender: &User,
        content: &str,
        now: DateTime<Utc>,
    ) -> Option<ChatMessage> {
        let content = content.trim();
        if content.is_empty() || self.get(chat_id).is_none() {
            return None;
        }
        let message = ChatMessage {
            id: self.next_id("msg", now),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            sender: sender.clone(),
            timestamp: now,
        };
        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(message.clone());
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.last_message = Some(message.clone());
        }
        Some(message)
    }

    pub fn messages(&self, chat_id: &str) -> &[ChatMessage] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bubbles for `chat_id` as seen by `me`.
    pub fn timeline(&self, chat_id: &str, me: &str) -> Vec<Bubble> {
        let messages = self.messages(chat_id);
        let gap = Duration::minutes(SEPARATOR_GAP_MINUTES);
        messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                let own = message.sender.id == me;
                let next_from_other = messages
                    .get(i + 1)
                    .map_or(true, |next| next.sender.id != message.sender.id);
                let show_separator = i == 0 || message.timestamp - messages[i - 1].timestamp > gap;
                Bubble {
                    message: message.clone(),
                    own,
                    show_avatar: !own && next_from_other,
                    show_separator,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            username: id.to_uppercase(),
            avatar_url: Some(format!("https://img/{id}.png")),
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 11, 9, minute, 0).unwrap()
    }

    #[test]
    fn participant_rules_per_kind() {
        let private = ChatDraft {
            name: "Alice".into(),
            kind: ChatKind::Private,
            participants: vec![user("a"), user("b")],
        };
        assert_eq!(
            private.validate().unwrap_err().get("participants"),
            Some("Private chat requires exactly 1 participant")
        );

        let group = ChatDraft {
            name: " ".into(),
            kind: ChatKind::Group,
            participants: vec![user("a")],
        };
        let errors = group.validate().unwrap_err();
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert!(errors.get("participants").is_some());
    }

    #[test]
    fn create_takes_first_participant_avatar() {
        let mut book = ChatBook::new();
        let chat = book
            .create(
                ChatDraft {
                    name: "Project Team".into(),
                    kind: ChatKind::Group,
                    participants: vec![user("a"), user("b")],
                },
                at(0),
            )
            .unwrap();
        assert_eq!(chat.avatar_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(book.list(ChatKind::Group, "team").len(), 1);
        assert!(book.list(ChatKind::Private, "").is_empty());
    }

    #[test]
    fn timeline_groups_runs_and_separates_gaps() {
        let mut book = ChatBook::new();
        let chat = book
            .create(
                ChatDraft {
                    name: "Alice".into(),
                    kind: ChatKind::Private,
                    participants: vec![user("alice")],
                },
                at(0),
            )
            .unwrap();
        let (me, alice) = (user("me"), user("alice"));
        book.send(&chat.id, &alice, "Hey", at(0)).unwrap();
        book.send(&chat.id, &alice, "How are you?", at(1)).unwrap();
        book.send(&chat.id, &me, "Great!", at(2)).unwrap();
        book.send(&chat.id, &alice, "Nice", at(9)).unwrap();
        assert!(book.send(&chat.id, &me, "   ", at(9)).is_none());

        let bubbles = book.timeline(&chat.id, "me");
        let shape: Vec<_> = bubbles
            .iter()
            .map(|b| (b.own, b.show_avatar, b.show_separator))
            .collect();
        assert_eq!(
            shape,
            vec![
                (false, false, true),
                (false, true, false),
                (true, false, false),
                (false, true, true),
            ]
        );
        assert_eq!(
            book.get(&chat.id).unwrap().last_message.as_ref().unwrap().content,
            "Nice"
        );
    }

    #[test]
    fn unread_counts_per_kind_and_mark_read() {
        let mut book = ChatBook::new();
        let chat = book
            .create(
                ChatDraft {
                    name: "Bob".into(),
                    kind: ChatKind::Private,
                    participants: vec![user("bob")],
                },
                at(0),
            )
            .unwrap();
        book.chats[0].unread_count = 3;
        assert_eq!(book.unread(ChatKind::Private), 3);
        assert_eq!(book.unread(ChatKind::Group), 0);
        book.mark_read(&chat.id);
        assert_eq!(book.unread(ChatKind::Private), 0);
    }
}
