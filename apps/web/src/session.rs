//! Server-side sessions keyed by the `cvmatch_session` cookie.
//!
//! `RedisSessionStore` is used when `REDIS_URL` is set; otherwise sessions
//! live in process memory. Both expire entries after the configured TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::report::MatchReport;

pub const SESSION_COOKIE: &str = "cvmatch_session";
const REDIS_KEY_PREFIX: &str = "cvmatch:session:";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Everything kept between requests for one browser session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub resume_text: Option<String>,
    pub jd_text: Option<String>,
    pub report: Option<MatchReport>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError>;

    async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError>;

    async fn clear(&self, id: &str) -> Result<(), SessionError>;

    /// Label for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

pub struct MemorySessionStore {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, SessionData)>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(id)
            .filter(|(saved_at, _)| saved_at.elapsed() < self.ttl)
            .map(|(_, data)| data.clone()))
    }

    async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, (saved_at, _)| saved_at.elapsed() < ttl);
        entries.insert(id.to_string(), (Instant::now(), data.clone()));
        Ok(())
    }

    async fn clear(&self, id: &str) -> Result<(), SessionError> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis store
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl_secs: ttl.as_secs().max(1),
        }
    }

    fn key(id: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(Self::key(id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        let json = serde_json::to_string(data)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(Self::key(id), json, self.ttl_secs).await?;
        Ok(())
    }

    async fn clear(&self, id: &str) -> Result<(), SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::key(id)).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cookie helpers
// ────────────────────────────────────────────────────────────────────────────

/// The session id from the request cookies, if present and a valid UUID.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| id.to_string())
}

/// Existing session id, or a fresh one. The flag is true when the id is new
/// and the cookie must be set on the response.
pub fn session_id_or_new(headers: &HeaderMap) -> (String, bool) {
    match session_id_from_headers(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    }
}

pub fn session_cookie(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; HttpOnly; SameSite=Lax; Path=/")
}
