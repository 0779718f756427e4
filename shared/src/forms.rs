//! Validation for the forum, login and registration forms.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::FormErrors;
use crate::models::{NewForum, User};

pub const CATEGORIES: [&str; 6] = [
    "Development",
    "Design",
    "Business",
    "General",
    "Help & Support",
    "Announcements",
];

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid email pattern"));

// ── Forum ──

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl ForumDraft {
    /// Adds a trimmed tag unless it is blank or already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "Title is required");
        }
        if self.category.trim().is_empty() {
            errors.add("category", "Category is required");
        } else if !CATEGORIES.contains(&self.category.as_str()) {
            errors.add("category", "Unknown category");
        }
        errors.into_result(())
    }

    /// Validated insert payload; new forums start unpinned with no messages.
    pub fn into_new_forum(self, author: &User) -> Result<NewForum, FormErrors> {
        self.validate()?;
        Ok(NewForum {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            category: self.category,
            tags: self.tags,
            author_id: author.id.clone(),
            is_pinned: false,
            message_count: 0,
        })
    }
}

/// Trimmed message content, or an error when blank.
pub fn message_content(content: &str) -> Result<String, FormErrors> {
    let mut errors = FormErrors::new();
    let trimmed = content.trim();
    if trimmed.is_empty() {
        errors.add("content", "Message cannot be empty");
    }
    errors.into_result(trimmed.to_string())
}

// ── Auth ──

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn is_complete(&self) -> bool {
        !self.full_name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.password.is_empty()
            && !self.confirm_password.is_empty()
    }

    /// First problem found, in the order the form reports them.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_complete() {
            return Err("All fields are required.".to_string());
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match.".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            ));
        }
        if !EMAIL.is_match(self.email.trim()) {
            return Err("Please enter a valid email address.".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> User {
        User {
            id: "u1".into(),
            username: "You".into(),
            avatar_url: None,
        }
    }

    #[test]
    fn forum_draft_requires_title_and_category() {
        let errors = ForumDraft::default().validate().unwrap_err();
        assert_eq!(errors.get("title"), Some("Title is required"));
        assert_eq!(errors.get("category"), Some("Category is required"));
    }

    #[test]
    fn forum_draft_becomes_fresh_forum() {
        let mut draft = ForumDraft {
            title: "  Release Notes ".into(),
            description: " What shipped ".into(),
            category: "Announcements".into(),
            tags: Vec::new(),
        };
        assert!(draft.add_tag(" v1 "));
        assert!(!draft.add_tag("v1"));
        assert!(!draft.add_tag("   "));
        assert!(draft.add_tag("changelog"));
        draft.remove_tag("v1");

        let forum = draft.into_new_forum(&author()).unwrap();
        assert_eq!(forum.title, "Release Notes");
        assert_eq!(forum.description, "What shipped");
        assert_eq!(forum.tags, vec!["changelog".to_string()]);
        assert_eq!(forum.message_count, 0);
        assert!(!forum.is_pinned);
        assert_eq!(forum.author_id, "u1");
    }

    #[test]
    fn unknown_category_is_rejected() {
        let draft = ForumDraft {
            title: "x".into(),
            category: "Gossip".into(),
            ..Default::default()
        };
        assert_eq!(
            draft.validate().unwrap_err().get("category"),
            Some("Unknown category")
        );
    }

    #[test]
    fn blank_message_is_rejected() {
        assert!(message_content(" \n ").is_err());
        assert_eq!(message_content(" Hello \n").unwrap(), "Hello");
    }

    #[test]
    fn register_form_checks_in_order() {
        let mut form = RegisterForm {
            full_name: "Ada".into(),
            email: "ada@example".into(),
            password: "abc".into(),
            confirm_password: "abd".into(),
        };
        assert_eq!(form.validate().unwrap_err(), "Passwords do not match.");

        form.confirm_password = "abc".into();
        assert_eq!(
            form.validate().unwrap_err(),
            "Password must be at least 6 characters."
        );

        form.password = "abcdef".into();
        form.confirm_password = "abcdef".into();
        assert_eq!(
            form.validate().unwrap_err(),
            "Please enter a valid email address."
        );

        form.email = "ada@example.com".into();
        assert!(form.validate().is_ok());

        form.full_name.clear();
        assert_eq!(form.validate().unwrap_err(), "All fields are required.");
    }

    #[test]
    fn login_form_needs_both_fields() {
        let form = LoginForm {
            email: "a@b.c".into(),
            password: String::new(),
        };
        assert!(!form.is_complete());
    }
}
