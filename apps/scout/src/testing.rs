//! Test doubles and fixtures shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::models::candidate::{Candidate, LocationHierarchy};
use crate::platform::{
    ManifestLookup, PlatformApi, PlatformError, ProfileBatch, QuotaPool, RateLimiter, RawProfile,
    RawRepo, SearchPage, SoftError,
};

#[derive(Debug, Clone, Copy)]
pub enum SearchFailure {
    Quota,
    Transport,
}

#[derive(Default)]
struct FakeState {
    /// (location filter, usernames); `None` answers queries without a location qualifier.
    search_results: Vec<(Option<String>, Vec<String>)>,
    profiles: HashMap<String, RawProfile>,
    manifests: HashMap<(String, String), ManifestLookup>,
    manifests_unavailable: bool,
    search_failure: Option<SearchFailure>,
    panic_on_search: bool,
    latency: Option<Duration>,
    exhaust_after_batch: Option<(Arc<RateLimiter>, QuotaPool)>,
    search_queries: Vec<String>,
    batch_sizes: Vec<usize>,
    manifest_requests: Vec<String>,
}

/// Scripted `PlatformApi`. Clones share state so tests can inspect calls afterwards.
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_search_results<S: AsRef<str>>(&self, location: Option<&str>, usernames: &[S]) {
        self.state().search_results.push((
            location.map(str::to_string),
            usernames.iter().map(|u| u.as_ref().to_string()).collect(),
        ));
    }

    pub fn add_profile(&self, profile: RawProfile) {
        self.state()
            .profiles
            .insert(profile.username.to_lowercase(), profile);
    }

    pub fn set_manifest(&self, username: &str, repo: &str, lookup: ManifestLookup) {
        self.state()
            .manifests
            .insert((username.to_string(), repo.to_string()), lookup);
    }

    pub fn force_manifests_unavailable(&self) {
        self.state().manifests_unavailable = true;
    }

    pub fn fail_search(&self, failure: SearchFailure) {
        self.state().search_failure = Some(failure);
    }

    pub fn panic_on_search(&self) {
        self.state().panic_on_search = true;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// After the next profile batch, report an exhausted `pool` to `limiter`.
    pub fn exhaust_quota_after_batch(&self, limiter: Arc<RateLimiter>, pool: QuotaPool) {
        self.state().exhaust_after_batch = Some((limiter, pool));
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.state().search_queries.clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batch_sizes.clone()
    }

    pub fn manifest_requests(&self) -> Vec<String> {
        self.state().manifest_requests.clone()
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn search_users(&self, query: &str, limit: usize) -> Result<SearchPage, PlatformError> {
        self.simulate_latency().await;

        let mut state = self.state();
        state.search_queries.push(query.to_string());
        if state.panic_on_search {
            drop(state);
            panic!("scripted search panic");
        }

        match state.search_failure {
            Some(SearchFailure::Quota) => return Err(PlatformError::QuotaExceeded { attempts: 3 }),
            Some(SearchFailure::Transport) => return Err(PlatformError::Timeout),
            None => {}
        }

        let usernames = state
            .search_results
            .iter()
            .find(|(location, _)| match location {
                Some(location) => query.contains(&format!("location:\"{location}\"")),
                None => !query.contains("location:"),
            })
            .map(|(_, usernames)| usernames.clone())
            .unwrap_or_default();

        Ok(SearchPage {
            total_count: usernames.len(),
            usernames: usernames.into_iter().take(limit).collect(),
        })
    }

    async fn batch_fetch_profiles(
        &self,
        usernames: &[String],
    ) -> Result<ProfileBatch, PlatformError> {
        self.simulate_latency().await;

        let mut state = self.state();
        state.batch_sizes.push(usernames.len());

        let mut batch = ProfileBatch::default();
        for username in usernames {
            match state.profiles.get(&username.to_lowercase()) {
                Some(profile) => batch.profiles.push(profile.clone()),
                None => batch.failures.push(SoftError::NotFound(username.clone())),
            }
        }

        if let Some((limiter, pool)) = state.exhaust_after_batch.take() {
            limiter.observe(pool, 0, Duration::from_secs(3600));
        }

        Ok(batch)
    }

    async fn fetch_dependency_manifest(
        &self,
        username: &str,
        repo: &str,
        _degraded_mode: bool,
    ) -> ManifestLookup {
        self.simulate_latency().await;

        let mut state = self.state();
        state.manifest_requests.push(format!("{username}/{repo}"));
        if state.manifests_unavailable {
            return ManifestLookup::Unavailable;
        }
        state
            .manifests
            .get(&(username.to_string(), repo.to_string()))
            .cloned()
            .unwrap_or(ManifestLookup::Unavailable)
    }
}

pub fn repo_fixture(name: &str, stars: u32, language: Option<&str>, topics: &[&str]) -> RawRepo {
    RawRepo {
        name: name.to_string(),
        description: None,
        stars,
        primary_language: language.map(str::to_string),
        languages: language.map(|l| vec![l.to_string()]).unwrap_or_default(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        is_fork: false,
    }
}

pub fn profile_fixture(username: &str) -> RawProfile {
    RawProfile {
        username: username.to_string(),
        name: None,
        bio: None,
        location: None,
        avatar_url: None,
        profile_url: format!("https://github.com/{username}"),
        created_at: Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
        followers: 10,
        contributions: 250,
        repos: Vec::new(),
        starred: Vec::new(),
    }
}

pub fn candidate_fixture(username: &str) -> Candidate {
    Candidate {
        username: username.to_string(),
        name: Some("Test User".to_string()),
        bio: None,
        location_raw: Some("Chennai".to_string()),
        location_parsed: LocationHierarchy {
            original: "Chennai".to_string(),
            city: Some("Chennai".to_string()),
            ..LocationHierarchy::default()
        },
        top_repos: Vec::new(),
        languages: vec!["Rust".to_string()],
        contributions: 100,
        account_age_days: 1000,
        followers: 5,
        skill_confidence_scores: BTreeMap::new(),
        skill_signals: BTreeMap::new(),
        skill_details: BTreeMap::new(),
        evaluated_skills: vec!["rust".to_string()],
        profile_url: format!("https://github.com/{username}"),
        avatar_url: None,
        fetched_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    }
}
