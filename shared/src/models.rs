use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback display name for another user without a profile name.
pub const UNKNOWN_AUTHOR: &str = "Someone";

// ── Users ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl User {
    /// First letter of the display name, upper-cased, for avatar placeholders.
    pub fn initial(&self) -> String {
        self.username
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR)
    }
}

impl From<Profile> for User {
    fn from(profile: Profile) -> Self {
        User {
            username: profile.display_name().to_string(),
            id: profile.id,
            avatar_url: profile.avatar_url,
        }
    }
}

fn author_or_placeholder(author_id: &str, author: Option<Profile>) -> User {
    author.map(User::from).unwrap_or_else(|| User {
        id: author_id.to_string(),
        username: UNKNOWN_AUTHOR.to_string(),
        avatar_url: None,
    })
}

// ── View mode ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Forum,
    Group,
    Private,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [ViewMode::Forum, ViewMode::Group, ViewMode::Private];

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Forum => "Forums",
            ViewMode::Group => "Group Chats",
            ViewMode::Private => "Private Chats",
        }
    }

    pub fn is_chat(self) -> bool {
        !matches!(self, ViewMode::Forum)
    }
}

// ── Forums ──

/// Row of the `forums` table with the author profile embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub author_id: String,
    #[serde(default)]
    pub author: Option<Profile>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forum {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub author: User,
    pub tags: Vec<String>,
    pub message_count: i64,
    pub last_activity: DateTime<Utc>,
    pub is_pinned: bool,
}

impl From<ForumRecord> for Forum {
    fn from(record: ForumRecord) -> Self {
        Forum {
            author: author_or_placeholder(&record.author_id, record.author),
            id: record.id,
            title: record.title,
            description: record.description.unwrap_or_default(),
            category: record.category,
            tags: record.tags.unwrap_or_default(),
            message_count: record.message_count,
            last_activity: record.last_activity.unwrap_or(record.created_at),
            is_pinned: record.is_pinned.unwrap_or(false),
        }
    }
}

/// Insert payload for the `forums` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewForum {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub author_id: String,
    pub is_pinned: bool,
    pub message_count: i64,
}

// ── Forum messages ──

/// Row of the `forum_messages` table with the author profile embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub forum_id: String,
    pub author_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub forum_id: String,
    pub content: String,
    pub author: User,
    pub timestamp: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub replies: Vec<Message>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub is_edited: bool,
    /// Shown optimistically, not yet confirmed by the backend.
    pub pending: bool,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message {
            author: author_or_placeholder(&record.author_id, record.author),
            id: record.id,
            forum_id: record.forum_id,
            content: record.content,
            timestamp: record.created_at,
            parent_id: record.parent_id,
            replies: Vec::new(),
            upvotes: record.upvotes,
            downvotes: record.downvotes,
            is_edited: record.is_edited,
            pending: false,
        }
    }
}

/// Insert payload for the `forum_messages` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub forum_id: String,
    pub author_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub content: String,
}

// ── Notifications ──

/// Row of the `forum_notifications` feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub forum_id: String,
    pub author_id: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forum_record_with_nulls_decodes_with_defaults() {
        let record: ForumRecord = serde_json::from_value(json!({
            "id": "f1",
            "title": "Release Notes",
            "description": null,
            "category": "Announcements",
            "author_id": "u1",
            "author": null,
            "tags": null,
            "created_at": "2025-11-10T10:30:00Z"
        }))
        .unwrap();

        let forum = Forum::from(record);
        assert_eq!(forum.description, "");
        assert!(forum.tags.is_empty());
        assert_eq!(forum.message_count, 0);
        assert!(!forum.is_pinned);
        assert_eq!(forum.author.username, UNKNOWN_AUTHOR);
        assert_eq!(forum.last_activity.to_rfc3339(), "2025-11-10T10:30:00+00:00");
    }

    #[test]
    fn message_record_takes_embedded_author() {
        let record: MessageRecord = serde_json::from_value(json!({
            "id": "m1",
            "forum_id": "f1",
            "author_id": "u2",
            "parent_id": null,
            "content": "Hello",
            "upvotes": 3,
            "downvotes": 1,
            "created_at": "2025-11-10T10:30:00+00:00",
            "author": { "id": "u2", "full_name": "Dev Master", "avatar_url": "https://a/b.png" }
        }))
        .unwrap();

        let message = Message::from(record);
        assert_eq!(message.author.username, "Dev Master");
        assert_eq!(message.author.initial(), "D");
        assert!(message.replies.is_empty());
        assert!(!message.pending);
    }

    #[test]
    fn blank_profile_name_falls_back() {
        let profile = Profile {
            id: "u3".into(),
            full_name: Some("   ".into()),
            avatar_url: None,
        };
        assert_eq!(profile.display_name(), UNKNOWN_AUTHOR);
    }

    #[test]
    fn new_message_omits_missing_parent() {
        let body = serde_json::to_value(NewMessage {
            forum_id: "f1".into(),
            author_id: "u1".into(),
            parent_id: None,
            content: "Hello".into(),
        })
        .unwrap();
        assert!(body.get("parent_id").is_none());
    }
}
