//! Desktop notification decisions. The browser crate performs them.

use crate::models::{NotificationRecord, UNKNOWN_AUTHOR};

pub const AUTO_DISMISS_MS: u32 = 5_000;
pub const WARNING_HIDE_MS: u32 = 6_000;
pub const PREVIEW_CHARS: usize = 100;
pub const ICON: &str = "/icon-192x192.png";
pub const BADGE: &str = "/badge-72x72.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Unsupported,
    Default,
    Granted,
    Denied,
}

impl Permission {
    pub fn parse(value: &str) -> Permission {
        match value {
            "granted" => Permission::Granted,
            "denied" => Permission::Denied,
            _ => Permission::Default,
        }
    }
}

/// What to do once a user is signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Nothing,
    Prompt,
    Subscribe,
    WarnBlocked,
}

pub fn plan(permission: Permission) -> Plan {
    match permission {
        Permission::Unsupported => Plan::Nothing,
        Permission::Default => Plan::Prompt,
        Permission::Granted => Plan::Subscribe,
        Permission::Denied => Plan::WarnBlocked,
    }
}

/// Own messages never raise a popup.
pub fn should_alert(record: &NotificationRecord, current_user_id: &str) -> bool {
    record.author_id != current_user_id
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub icon: &'static str,
    pub badge: &'static str,
    pub tag: String,
}

pub fn compose(record: &NotificationRecord, author_name: Option<&str>) -> Alert {
    let author = author_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR);
    Alert {
        title: format!("New message from {author}"),
        body: record.content.chars().take(PREVIEW_CHARS).collect(),
        icon: ICON,
        badge: BADGE,
        tag: format!("forum-{}", record.forum_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(author: &str, content: &str) -> NotificationRecord {
        NotificationRecord {
            id: None,
            forum_id: "f7".into(),
            author_id: author.into(),
            content: content.into(),
        }
    }

    #[test]
    fn plan_follows_permission() {
        assert_eq!(plan(Permission::parse("default")), Plan::Prompt);
        assert_eq!(plan(Permission::parse("granted")), Plan::Subscribe);
        assert_eq!(plan(Permission::parse("denied")), Plan::WarnBlocked);
        assert_eq!(plan(Permission::Unsupported), Plan::Nothing);
    }

    #[test]
    fn own_messages_are_skipped() {
        assert!(!should_alert(&record("me", "hi"), "me"));
        assert!(should_alert(&record("them", "hi"), "me"));
    }

    #[test]
    fn compose_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let alert = compose(&record("them", &long), None);
        assert_eq!(alert.title, "New message from Someone");
        assert_eq!(alert.body.chars().count(), PREVIEW_CHARS);
        assert_eq!(alert.tag, "forum-f7");

        let named = compose(&record("them", "short"), Some("Ada"));
        assert_eq!(named.title, "New message from Ada");
        assert_eq!(named.body, "short");
    }
}
