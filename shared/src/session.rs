use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;
use crate::models::{Profile, User};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The user object returned by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    /// Full name, else the local part of the email, else `"User"`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self
            .user_metadata
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.display_name(),
            avatar_url: self.user_metadata.avatar_url.clone(),
        }
    }

    pub fn to_profile(&self) -> Profile {
        Profile {
            id: self.id.clone(),
            full_name: self.user_metadata.full_name.clone(),
            avatar_url: self.user_metadata.avatar_url.clone(),
        }
    }
}

/// Token grant from the auth service; persisted between page loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

/// How long before expiry the access token is renewed.
pub const REFRESH_MARGIN_SECS: i64 = 60;

impl Session {
    /// Milliseconds from `now` until the token should be renewed, zero once
    /// inside the margin. `None` when the grant cannot be renewed.
    pub fn refresh_delay_ms(&self, now: DateTime<Utc>) -> Option<u32> {
        self.refresh_token.as_ref()?;
        let due = self.expires_at? - REFRESH_MARGIN_SECS;
        let secs = (due - now.timestamp()).max(0);
        Some(u32::try_from(secs.saturating_mul(1000)).unwrap_or(u32::MAX))
    }
}

/// What a sign-up call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    SignedIn(Session),
    /// Account created; the address must be confirmed before signing in.
    ConfirmEmail,
}

impl SignUp {
    pub fn from_response(body: Value) -> Result<SignUp, AuthError> {
        if body.get("access_token").is_some() {
            serde_json::from_value(body)
                .map(SignUp::SignedIn)
                .map_err(|e| AuthError::Rejected(e.to_string()))
        } else {
            Ok(SignUp::ConfirmEmail)
        }
    }
}

/// The human-readable message in an auth error body, whichever field carries it.
pub fn failure_message(body: &Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key)?.as_str())
        .map(str::to_string)
}

// ── Route gating ──

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const HOME_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only for signed-out visitors.
    Public,
    Protected,
}

impl Access {
    pub fn of(path: &str) -> Access {
        match path {
            LOGIN_PATH | REGISTER_PATH => Access::Public,
            _ => Access::Protected,
        }
    }

    /// Where to send the visitor instead, if anywhere.
    pub fn redirect(self, signed_in: bool) -> Option<&'static str> {
        match (self, signed_in) {
            (Access::Public, true) => Some(HOME_PATH),
            (Access::Protected, false) => Some(LOGIN_PATH),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(full_name: Option<&str>, email: Option<&str>) -> AuthUser {
        AuthUser {
            id: "u1".into(),
            email: email.map(str::to_string),
            user_metadata: UserMetadata {
                full_name: full_name.map(str::to_string),
                avatar_url: None,
            },
        }
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(user(Some("Ada L"), Some("ada@x.io")).display_name(), "Ada L");
        assert_eq!(user(None, Some("ada@x.io")).display_name(), "ada");
        assert_eq!(user(Some(" "), None).display_name(), "User");
        assert_eq!(user(Some("ada"), None).to_user().initial(), "A");
    }

    #[test]
    fn session_decodes_token_grant() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1762770600,
            "refresh_token": "r1",
            "user": {
                "id": "u1",
                "email": "ada@x.io",
                "user_metadata": { "full_name": "Ada" }
            }
        }))
        .unwrap();
        assert_eq!(session.user.display_name(), "Ada");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
    }

    fn grant(expires_at: Option<i64>, refresh_token: Option<&str>) -> Session {
        Session {
            access_token: "jwt".into(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
            user: user(None, Some("ada@x.io")),
        }
    }

    #[test]
    fn refresh_is_scheduled_ahead_of_expiry() {
        let now = DateTime::from_timestamp(1_762_770_000, 0).unwrap();
        let expires = now.timestamp() + 3600;

        assert_eq!(grant(Some(expires), Some("r1")).refresh_delay_ms(now), Some(3_540_000));
        assert_eq!(grant(Some(now.timestamp() + 30), Some("r1")).refresh_delay_ms(now), Some(0));
        assert_eq!(grant(Some(now.timestamp() - 600), Some("r1")).refresh_delay_ms(now), Some(0));
        assert_eq!(grant(Some(expires), None).refresh_delay_ms(now), None);
        assert_eq!(grant(None, Some("r1")).refresh_delay_ms(now), None);
    }

    #[test]
    fn far_expiry_saturates_the_timer() {
        let now = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(grant(Some(i64::MAX / 2), Some("r1")).refresh_delay_ms(now), Some(u32::MAX));
    }

    #[test]
    fn sign_up_without_token_needs_confirmation() {
        let outcome = SignUp::from_response(json!({ "id": "u1", "email": "a@b.c" })).unwrap();
        assert_eq!(outcome, SignUp::ConfirmEmail);
    }

    #[test]
    fn failure_message_prefers_description() {
        let body = json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" });
        assert_eq!(failure_message(&body).as_deref(), Some("Invalid login credentials"));
        assert_eq!(
            failure_message(&json!({ "code": 422, "msg": "User already registered" })).as_deref(),
            Some("User already registered")
        );
        assert!(failure_message(&json!({})).is_none());
    }

    #[test]
    fn route_gating() {
        assert_eq!(Access::of("/login").redirect(true), Some("/"));
        assert_eq!(Access::of("/register").redirect(false), None);
        assert_eq!(Access::of("/").redirect(false), Some("/login"));
        assert_eq!(Access::of("/dashboard").redirect(true), None);
        assert_eq!(Access::of("/anything/else").redirect(false), Some("/login"));
    }
}
