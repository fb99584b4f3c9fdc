//! Platform access: the only place that talks to the code-hosting platform.
//!
//! `EnrichmentOrchestrator` holds an `Arc<dyn PlatformApi>`; the GitHub implementation is
//! the production backend, tests substitute a scripted fake.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod github;
pub mod manifest;
pub mod rate_limiter;

pub use rate_limiter::{QuotaPool, RateLimiter};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Quota exceeded after {attempts} attempts")]
    QuotaExceeded { attempts: u32 },

    #[error("Failed to decode response: {0}")]
    Parse(String),
}

impl PlatformError {
    pub fn is_quota(&self) -> bool {
        matches!(self, PlatformError::QuotaExceeded { .. })
    }
}

/// A failure confined to one candidate. Never fails the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoftError {
    #[error("profile {0} not found")]
    NotFound(String),

    #[error("transport unavailable for {username}: {reason}")]
    Transport { username: String, reason: String },

    #[error("skipped {0}: quota halt")]
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRepo {
    pub name: String,
    pub description: Option<String>,
    pub stars: u32,
    pub primary_language: Option<String>,
    pub languages: Vec<String>,
    pub topics: Vec<String>,
    pub is_fork: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarredRepo {
    pub name: String,
    pub description: Option<String>,
}

/// Profile as returned by the batched lookup, before any scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: String,
    pub created_at: DateTime<Utc>,
    pub followers: u32,
    pub contributions: u32,
    pub repos: Vec<RawRepo>,
    pub starred: Vec<StarredRepo>,
}

/// Outcome of one batched profile lookup: hits plus per-username soft failures.
#[derive(Debug, Default)]
pub struct ProfileBatch {
    pub profiles: Vec<RawProfile>,
    pub failures: Vec<SoftError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestLookup {
    /// Normalised (lowercase) dependency names.
    Found(BTreeSet<String>),
    Unavailable,
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total_count: usize,
    pub usernames: Vec<String>,
}

#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Runs a user search. Usernames come back in platform relevance order.
    async fn search_users(&self, query: &str, limit: usize) -> Result<SearchPage, PlatformError>;

    /// Looks up one chunk of profiles in a single request.
    ///
    /// Unknown users are reported in `ProfileBatch::failures`; only a request-level
    /// problem returns `Err`.
    async fn batch_fetch_profiles(&self, usernames: &[String])
        -> Result<ProfileBatch, PlatformError>;

    /// Dependency names declared in the repository's manifest. Transport problems,
    /// 5xx responses and missing manifests all collapse into `Unavailable`.
    ///
    /// With `degraded_mode`, probing stops as soon as the core pool is halted instead of
    /// waiting for the quota window to reset.
    async fn fetch_dependency_manifest(
        &self,
        username: &str,
        repo: &str,
        degraded_mode: bool,
    ) -> ManifestLookup;
}
