//! Two-tier cache: search criteria → usernames, username → enriched candidate.
//!
//! Redis is the primary backend. When it cannot be reached the layer switches to an
//! in-process map with the same TTL semantics, logs that once for the lifetime of the
//! process, and only retries Redis after a cooldown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::candidate::Candidate;
use crate::models::search::SearchCriteria;
use crate::settings::CacheSettings;

/// Primary backend failures. Never surfaced to callers; they trigger the fallback.
#[derive(Debug, Error)]
enum CacheError {
    #[error("backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("connect timed out")]
    ConnectTimeout,
}

struct FallbackEntry {
    value: String,
    expires_at: Instant,
}

pub struct CacheLayer {
    primary: Option<redis::Client>,
    connection: tokio::sync::Mutex<Option<MultiplexedConnection>>,
    primary_down_until: Mutex<Option<Instant>>,
    fallback: Mutex<HashMap<String, FallbackEntry>>,
    degradation_logged: AtomicBool,
    settings: CacheSettings,
}

impl CacheLayer {
    pub fn new(primary: Option<redis::Client>, settings: CacheSettings) -> Self {
        Self {
            primary,
            connection: tokio::sync::Mutex::new(None),
            primary_down_until: Mutex::new(None),
            fallback: Mutex::new(HashMap::new()),
            degradation_logged: AtomicBool::new(false),
            settings,
        }
    }

    /// Cache with no primary backend; everything lives in-process.
    pub fn in_memory(settings: CacheSettings) -> Self {
        Self::new(None, settings)
    }

    /// Stable key for a set of criteria. Each broadening level hashes differently.
    pub fn search_key(criteria: &SearchCriteria) -> String {
        let bytes = serde_json::to_vec(criteria).unwrap_or_default();
        format!("search:{:x}", Sha256::digest(&bytes))
    }

    pub fn profile_key(username: &str) -> String {
        format!("profile:{}", username.to_lowercase())
    }

    /// True from a primary failure until the next successful reconnect.
    pub fn is_degraded(&self) -> bool {
        self.primary_down_until
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub async fn get_search(&self, criteria: &SearchCriteria) -> Option<Vec<String>> {
        self.get_json(&Self::search_key(criteria)).await
    }

    pub async fn set_search(&self, criteria: &SearchCriteria, usernames: &[String]) {
        let ttl = Duration::from_secs(self.settings.search_ttl_secs);
        self.set_json(&Self::search_key(criteria), usernames, ttl)
            .await;
    }

    pub async fn get_profile(&self, username: &str) -> Option<Candidate> {
        self.get_json(&Self::profile_key(username)).await
    }

    pub async fn set_profile(&self, candidate: &Candidate) {
        let ttl = Duration::from_secs(self.settings.profile_ttl_secs);
        self.set_json(&Self::profile_key(&candidate.username), candidate, ttl)
            .await;
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                // Stale layout from an older build; treat as a miss.
                debug!("Discarding undecodable cache entry {key}: {e}");
                None
            }
        }
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl).await,
            Err(e) => warn!("Failed to encode cache entry {key}: {e}"),
        }
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(mut conn) = self.primary_connection().await {
            let result = redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await;
            match result {
                Ok(value) => return value,
                Err(e) => self.mark_primary_down(e.into()).await,
            }
        }
        self.fallback_get(key)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) {
        if let Some(mut conn) = self.primary_connection().await {
            let result = redis::cmd("SET")
                .arg(key)
                .arg(&value)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async::<_, ()>(&mut conn)
                .await;
            match result {
                Ok(()) => return,
                Err(e) => self.mark_primary_down(e.into()).await,
            }
        }
        self.fallback_set(key, value, ttl);
    }

    async fn primary_connection(&self) -> Option<MultiplexedConnection> {
        let client = self.primary.as_ref()?;

        {
            let down_until = self.primary_down_until.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*down_until, Some(until) if until > Instant::now()) {
                return None;
            }
        }

        let mut connection = self.connection.lock().await;
        if let Some(conn) = connection.as_ref() {
            return Some(conn.clone());
        }

        let timeout = Duration::from_millis(self.settings.connect_timeout_ms);
        match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await {
            Ok(Ok(conn)) => {
                debug!("Cache backend connected");
                *connection = Some(conn.clone());
                self.mark_primary_up();
                Some(conn)
            }
            Ok(Err(e)) => {
                drop(connection);
                self.mark_primary_down(e.into()).await;
                None
            }
            Err(_) => {
                drop(connection);
                self.mark_primary_down(CacheError::ConnectTimeout).await;
                None
            }
        }
    }

    fn mark_primary_up(&self) {
        let mut down_until = self.primary_down_until.lock().unwrap_or_else(|e| e.into_inner());
        if down_until.take().is_some() {
            info!("Cache backend reachable again, leaving in-process store");
        }
    }

    async fn mark_primary_down(&self, reason: CacheError) {
        {
            let mut down_until = self.primary_down_until.lock().unwrap_or_else(|e| e.into_inner());
            *down_until =
                Some(Instant::now() + Duration::from_secs(self.settings.primary_retry_cooldown_secs));
        }
        *self.connection.lock().await = None;

        if !self.degradation_logged.swap(true, Ordering::Relaxed) {
            warn!("Cache backend unreachable, degrading to in-process store: {reason}");
        } else {
            debug!("Cache backend still unreachable: {reason}");
        }
    }

    fn fallback_get(&self, key: &str) -> Option<String> {
        let mut store = self.fallback.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match store.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            store.remove(key);
        }
        None
    }

    fn fallback_set(&self, key: &str, value: String, ttl: Duration) {
        let mut store = self.fallback.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        store.retain(|_, entry| entry.expires_at > now);
        store.insert(
            key.to_string(),
            FallbackEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}
