use agora_shared::backend::Backend;
use agora_shared::forms::{LoginForm, RegisterForm};
use agora_shared::models::{ForumRecord, MessageRecord, NewForum, NewMessage, Profile};
use agora_shared::rest::{self, Query};
use agora_shared::session::{self, AuthUser, Session, SignUp};
use agora_shared::{AuthError, BackendError};
use gloo_net::http::{Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use web_sys::window;

use crate::config::Config;

const SESSION_KEY: &str = "agora.session";

// ── Session storage ──

fn storage() -> Option<web_sys::Storage> {
    window()?.local_storage().ok()?
}

pub fn stored_session() -> Option<Session> {
    let raw = storage()?.get_item(SESSION_KEY).ok()??;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            log::warn!("dropping unreadable stored session: {e}");
            clear_session();
            None
        }
    }
}

pub fn store_session(session: &Session) {
    let Some(storage) = storage() else { return };
    match serde_json::to_string(session) {
        Ok(raw) => {
            let _ = storage.set_item(SESSION_KEY, &raw);
        }
        Err(e) => log::error!("could not persist session: {e}"),
    }
}

pub fn clear_session() {
    if let Some(storage) = storage() {
        let _ = storage.remove_item(SESSION_KEY);
    }
}

pub fn access_token() -> Option<String> {
    stored_session().map(|s| s.access_token)
}

// ── Requests ──

fn authorized(req: RequestBuilder, config: &Config) -> RequestBuilder {
    let bearer = access_token().unwrap_or_else(|| config.anon_key.clone());
    req.header("apikey", &config.anon_key)
        .header("Authorization", &format!("Bearer {bearer}"))
}

async fn checked(resp: Response) -> Result<Response, BackendError> {
    if resp.ok() {
        return Ok(resp);
    }
    let status = resp.status();
    let message = match resp.json::<Value>().await {
        Ok(body) => session::failure_message(&body),
        Err(_) => None,
    }
    .unwrap_or_else(|| resp.status_text());
    Err(BackendError::Status { status, message })
}

fn network(e: gloo_net::Error) -> BackendError {
    BackendError::Network(e.to_string())
}

async fn fetch<T: DeserializeOwned>(query: &Query) -> Result<T, BackendError> {
    let config = Config::get();
    let resp = authorized(Request::get(&config.url(&query.to_path())), &config)
        .send()
        .await
        .map_err(network)?;
    checked(resp)
        .await?
        .json()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Inserts one row and returns it as stored, shaped by the query's `select`.
async fn insert<T: DeserializeOwned, B: Serialize>(query: &Query, row: &B) -> Result<T, BackendError> {
    let config = Config::get();
    let req = authorized(Request::post(&config.url(&query.to_path())), &config)
        .header("Prefer", "return=representation")
        .json(row)
        .map_err(network)?;
    let rows: Vec<T> = checked(req.send().await.map_err(network)?)
        .await?
        .json()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    rows.into_iter()
        .next()
        .ok_or(BackendError::Empty(query.table_name()))
}

async fn upsert<B: Serialize>(query: &Query, row: &B) -> Result<(), BackendError> {
    let config = Config::get();
    let req = authorized(Request::post(&config.url(&query.to_path())), &config)
        .header("Prefer", "resolution=merge-duplicates,return=minimal")
        .json(row)
        .map_err(network)?;
    checked(req.send().await.map_err(network)?).await?;
    Ok(())
}

/// The hosted data service. Configuration and credentials are per page.
#[derive(Debug, Clone, Copy, Default)]
pub struct Supabase;

impl Backend for Supabase {
    async fn list_forums(&self) -> Result<Vec<ForumRecord>, BackendError> {
        fetch(&rest::forums()).await
    }

    async fn create_forum(&self, forum: &NewForum) -> Result<ForumRecord, BackendError> {
        insert(&Query::table(rest::FORUMS).select(rest::WITH_AUTHOR), forum).await
    }

    async fn list_messages(&self, forum_id: &str) -> Result<Vec<MessageRecord>, BackendError> {
        fetch(&rest::forum_messages(forum_id)).await
    }

    async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord, BackendError> {
        insert(
            &Query::table(rest::FORUM_MESSAGES).select(rest::WITH_AUTHOR),
            message,
        )
        .await
    }

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        let rows: Vec<Profile> = fetch(&rest::profile(user_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        fetch(&rest::profiles()).await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), BackendError> {
        upsert(&Query::table(rest::PROFILES), profile).await
    }
}

// ── Auth ──

async fn auth_call(req: Request, fallback: &str) -> Result<Value, AuthError> {
    let resp = req
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;
    let ok = resp.ok();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    if ok {
        Ok(body)
    } else {
        Err(AuthError::Rejected(
            session::failure_message(&body).unwrap_or_else(|| fallback.to_string()),
        ))
    }
}

fn auth_post(path: &str, body: &Value) -> Result<Request, AuthError> {
    let config = Config::get();
    Request::post(&config.url(path))
        .header("apikey", &config.anon_key)
        .json(body)
        .map_err(|e| AuthError::Network(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, AuthError> {
    serde_json::from_value(body).map_err(|e| AuthError::Rejected(e.to_string()))
}

pub async fn sign_in(form: &LoginForm) -> Result<Session, AuthError> {
    let req = auth_post(
        "/auth/v1/token?grant_type=password",
        &json!({ "email": form.email.trim(), "password": form.password }),
    )?;
    decode(auth_call(req, "Failed to log in. Please check your credentials.").await?)
}

pub async fn sign_up(form: &RegisterForm) -> Result<SignUp, AuthError> {
    let req = auth_post(
        "/auth/v1/signup",
        &json!({
            "email": form.email.trim(),
            "password": form.password,
            "data": { "full_name": form.full_name.trim() },
        }),
    )?;
    SignUp::from_response(auth_call(req, "Failed to create account. Please try again.").await?)
}

pub async fn refresh(refresh_token: &str) -> Result<Session, AuthError> {
    let req = auth_post(
        "/auth/v1/token?grant_type=refresh_token",
        &json!({ "refresh_token": refresh_token }),
    )?;
    decode(auth_call(req, "Session expired.").await?)
}

pub async fn current_user(access_token: &str) -> Result<AuthUser, AuthError> {
    let config = Config::get();
    let req = Request::get(&config.url("/auth/v1/user"))
        .header("apikey", &config.anon_key)
        .header("Authorization", &format!("Bearer {access_token}"))
        .build()
        .map_err(|e| AuthError::Network(e.to_string()))?;
    decode(auth_call(req, "Session expired.").await?)
}

pub async fn sign_out(access_token: &str) -> Result<(), AuthError> {
    let config = Config::get();
    let req = Request::post(&config.url("/auth/v1/logout"))
        .header("apikey", &config.anon_key)
        .header("Authorization", &format!("Bearer {access_token}"))
        .build()
        .map_err(|e| AuthError::Network(e.to_string()))?;
    let resp = req
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;
    if resp.ok() {
        Ok(())
    } else {
        Err(AuthError::Rejected(format!("logout returned {}", resp.status())))
    }
}
