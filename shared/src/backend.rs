use crate::error::BackendError;
use crate::models::{ForumRecord, MessageRecord, NewForum, NewMessage, Profile};

/// Row access to the hosted data service.
///
/// Futures are not `Send`: the client runs on the single browser thread.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn list_forums(&self) -> Result<Vec<ForumRecord>, BackendError>;

    async fn create_forum(&self, forum: &NewForum) -> Result<ForumRecord, BackendError>;

    /// Every message of a forum, roots and replies alike.
    async fn list_messages(&self, forum_id: &str) -> Result<Vec<MessageRecord>, BackendError>;

    async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord, BackendError>;

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError>;

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), BackendError>;
}
