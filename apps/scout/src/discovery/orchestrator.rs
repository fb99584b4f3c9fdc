//! Discovery pipeline.
//!
//! BuildCriteria → search (cache, then live) → broaden while below the floor →
//! enrich (profile cache, batched lookups, bounded fan-out) → aggregate.
//!
//! Candidates keep the platform's relevance order throughout; the fan-out carries each
//! username's position and results are re-sorted before truncation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::CacheLayer;
use crate::discovery::criteria::{canonical_skills, location_scopes, SearchCriteriaBuilder};
use crate::location::LocationResolver;
use crate::models::candidate::{
    Candidate, LocationHierarchy, MatchLevel, RepoSummary, SkillConfidence,
};
use crate::models::requirement::JobRequirement;
use crate::models::search::{
    DetectionMethod, DiscoveryResponse, LocationScope, SearchAttempt, SearchCriteria,
    SearchResult,
};
use crate::platform::{PlatformApi, PlatformError, QuotaPool, RateLimiter, RawProfile, SoftError};
use crate::settings::DiscoverySettings;
use crate::skills::{aggregate_languages, SkillConfidenceEngine};

const TOP_REPO_COUNT: usize = 5;

/// Request-fatal failures. Everything else degrades into warnings on the result.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(#[source] PlatformError),
}

// ────────────────────────────────────────────────────────────────────────────
// Per-request bookkeeping
// ────────────────────────────────────────────────────────────────────────────

enum Pending {
    Cached(Candidate),
    Fetched(RawProfile),
}

#[derive(Default)]
struct RunLog {
    attempts: Vec<SearchAttempt>,
    warnings: Vec<String>,
    soft_failures: usize,
    skipped: usize,
    partial: bool,
    batched: bool,
}

impl RunLog {
    /// Marks the run partial. Only the first halt reason is reported.
    fn halt(&mut self, reason: impl Into<String>) {
        if self.partial {
            return;
        }
        let reason = reason.into();
        warn!("{reason}");
        self.partial = true;
        self.warnings.push(reason);
    }
}

#[derive(Default)]
struct SearchOutcome {
    usernames: Vec<String>,
    total_found: usize,
    scope: Option<LocationScope>,
    cache_hit: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct EnrichmentOrchestrator {
    platform: Arc<dyn PlatformApi>,
    limiter: Arc<RateLimiter>,
    cache: Arc<CacheLayer>,
    resolver: LocationResolver,
    engine: SkillConfidenceEngine,
    settings: Arc<DiscoverySettings>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        limiter: Arc<RateLimiter>,
        cache: Arc<CacheLayer>,
        settings: Arc<DiscoverySettings>,
    ) -> Self {
        Self {
            engine: SkillConfidenceEngine::new(platform.clone(), limiter.clone(), &settings.skills),
            resolver: LocationResolver::new(&settings.location),
            platform,
            limiter,
            cache,
            settings,
        }
    }

    /// True while the cache is serving from its in-process store.
    pub fn cache_degraded(&self) -> bool {
        self.cache.is_degraded()
    }

    /// Runs one discovery request.
    ///
    /// With `degraded_mode`, quota pressure on the pool a step needs stops that step's
    /// platform calls and the response is marked partial; otherwise the limiter waits for
    /// the quota window to reset.
    pub async fn discover(
        &self,
        requirement: &JobRequirement,
        degraded_mode: bool,
    ) -> Result<DiscoveryResponse, DiscoveryError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("discovery", %request_id, role = %requirement.role);
        self.run(request_id, requirement, degraded_mode)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request_id: Uuid,
        requirement: &JobRequirement,
        degraded_mode: bool,
    ) -> Result<DiscoveryResponse, DiscoveryError> {
        let started = Instant::now();

        let skills = canonical_skills(&self.engine, requirement);
        if skills.is_empty() {
            return Err(DiscoveryError::Validation(
                "required_skills must contain at least one skill".to_string(),
            ));
        }
        info!(?skills, locations = ?requirement.locations, degraded_mode, "Discovery started");

        let mut log = RunLog::default();
        let search = self.search(requirement, degraded_mode, &mut log).await?;

        let mut seen = HashSet::new();
        let usernames: Vec<String> = search
            .usernames
            .iter()
            .filter(|u| seen.insert(u.to_lowercase()))
            .take(self.settings.orchestrator.enrich_limit)
            .cloned()
            .collect();

        let searches: Vec<LocationHierarchy> = requirement
            .locations
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| self.resolver.parse(l))
            .collect();

        let mut candidates = self
            .enrich(&usernames, &skills, &searches, degraded_mode, &mut log)
            .await;
        candidates.truncate(self.settings.orchestrator.max_candidates);

        if search.usernames.is_empty() {
            log.warnings
                .push("No candidates found at any location scope".to_string());
        }
        if log.skipped > 0 {
            log.warnings.push(format!(
                "{} candidates skipped after quota halt",
                log.skipped
            ));
        }

        let metadata = SearchResult {
            request_id,
            total_found: search.total_found,
            returned: candidates.len(),
            timestamp: Utc::now(),
            quota_remaining: self
                .limiter
                .lowest_remaining(&[QuotaPool::Graphql, QuotaPool::Core]),
            cache_hit: search.cache_hit,
            elapsed_ms: started.elapsed().as_millis() as u64,
            batched: log.batched,
            dominant_detection: dominant_detection(&candidates),
            location_match_histogram: match_histogram(&candidates),
            final_scope: search.scope,
            attempts: log.attempts,
            soft_failures: log.soft_failures,
            warnings: log.warnings,
            partial: log.partial,
        };

        info!(
            returned = metadata.returned,
            with_primary = candidates.iter().filter(|c| c.has_primary_detection()).count(),
            total_found = metadata.total_found,
            elapsed_ms = metadata.elapsed_ms,
            partial = metadata.partial,
            "Discovery finished"
        );

        Ok(DiscoveryResponse {
            candidates,
            metadata,
        })
    }

    // ── Search ──────────────────────────────────────────────────────────────

    async fn search(
        &self,
        requirement: &JobRequirement,
        degraded_mode: bool,
        log: &mut RunLog,
    ) -> Result<SearchOutcome, DiscoveryError> {
        let builder = SearchCriteriaBuilder::new(
            &self.engine,
            &self.settings.orchestrator,
            Utc::now().date_naive(),
        );
        let floor = self.settings.orchestrator.broaden_floor;
        let mut outcome = SearchOutcome::default();

        for (level, scope) in location_scopes(&self.resolver, requirement)
            .into_iter()
            .enumerate()
        {
            if degraded_mode && self.limiter.is_halted(QuotaPool::Search) {
                log.halt("Quota below floor, search stopped early");
                break;
            }
            if level > 0 {
                info!(
                    scope = scope.label(),
                    found = outcome.usernames.len(),
                    floor,
                    "Broadening location scope"
                );
            }

            let criteria = builder.build(requirement, scope);
            let (usernames, total_found, cache_hit) = match self.search_once(&criteria).await {
                Ok(found) => found,
                Err(e) if e.is_quota() => {
                    log.halt(format!("Search quota exhausted: {e}"));
                    break;
                }
                Err(e) => return Err(DiscoveryError::SearchUnavailable(e)),
            };

            log.attempts.push(SearchAttempt {
                scope: criteria.scope.clone(),
                query: criteria.query.clone(),
                candidates_found: usernames.len(),
                cache_hit,
            });
            outcome = SearchOutcome {
                usernames,
                total_found,
                scope: Some(criteria.scope),
                cache_hit,
            };

            if outcome.usernames.len() >= floor {
                break;
            }
        }

        Ok(outcome)
    }

    async fn search_once(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<(Vec<String>, usize, bool), PlatformError> {
        if let Some(usernames) = self.cache.get_search(criteria).await {
            debug!(query = %criteria.query, "Search cache hit");
            let total = usernames.len();
            return Ok((usernames, total, true));
        }

        let page = self
            .platform
            .search_users(&criteria.query, self.settings.platform.search_page_size)
            .await?;
        debug!(query = %criteria.query, found = page.usernames.len(), "Live search");
        self.cache.set_search(criteria, &page.usernames).await;
        Ok((page.usernames, page.total_count, false))
    }

    // ── Enrichment ──────────────────────────────────────────────────────────

    async fn enrich(
        &self,
        usernames: &[String],
        skills: &[String],
        searches: &[LocationHierarchy],
        degraded_mode: bool,
        log: &mut RunLog,
    ) -> Vec<Candidate> {
        let cap = self.settings.orchestrator.concurrency_limit.max(1);

        let cached: Vec<Option<Candidate>> = stream::iter(usernames.iter().cloned())
            .map(|username| async move {
                self.cache
                    .get_profile(&username)
                    .await
                    .filter(|candidate| candidate.covers_skills(skills))
            })
            .buffered(cap)
            .collect()
            .await;

        let misses: Vec<String> = usernames
            .iter()
            .zip(&cached)
            .filter(|(_, hit)| hit.is_none())
            .map(|(username, _)| username.clone())
            .collect();
        debug!(
            hits = usernames.len() - misses.len(),
            misses = misses.len(),
            "Profile cache lookups"
        );

        let mut fetched = self.fetch_profiles(&misses, degraded_mode, log).await;

        let pending: Vec<(usize, Pending)> = usernames
            .iter()
            .zip(cached)
            .enumerate()
            .filter_map(|(index, (username, hit))| {
                let item = match hit {
                    Some(candidate) => Pending::Cached(candidate),
                    None => Pending::Fetched(fetched.remove(&username.to_lowercase())?),
                };
                Some((index, item))
            })
            .collect();

        let mut results: Vec<(usize, Result<Candidate, SoftError>)> = stream::iter(pending)
            .map(|(index, item)| async move {
                let result = self.enrich_one(item, skills, searches, degraded_mode).await;
                (index, result)
            })
            .buffer_unordered(cap)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut candidates = Vec::with_capacity(results.len());
        for (_, result) in results {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(SoftError::Skipped(username)) => {
                    debug!(username, "Enrichment skipped");
                    log.skipped += 1;
                }
                Err(e) => {
                    warn!("{e}");
                    log.soft_failures += 1;
                }
            }
        }
        if log.skipped > 0 {
            log.halt("Quota below floor, enrichment stopped early");
        }
        candidates
    }

    /// Batched lookups for cache misses, keyed by lowercase username.
    async fn fetch_profiles(
        &self,
        usernames: &[String],
        degraded_mode: bool,
        log: &mut RunLog,
    ) -> HashMap<String, RawProfile> {
        let mut profiles = HashMap::with_capacity(usernames.len());
        let batch_size = self.settings.platform.batch_size.max(1);

        for (chunk_index, chunk) in usernames.chunks(batch_size).enumerate() {
            let unfetched = usernames.len() - chunk_index * batch_size;
            if degraded_mode && self.limiter.is_halted(QuotaPool::Graphql) {
                log.skipped += unfetched;
                log.halt("Quota below floor, profile lookups stopped early");
                break;
            }

            log.batched = true;
            match self.platform.batch_fetch_profiles(chunk).await {
                Ok(batch) => {
                    for failure in batch.failures {
                        warn!("{failure}");
                        log.soft_failures += 1;
                    }
                    for profile in batch.profiles {
                        profiles.insert(profile.username.to_lowercase(), profile);
                    }
                }
                Err(e) if e.is_quota() => {
                    log.skipped += unfetched;
                    log.halt(format!("Profile lookup quota exhausted: {e}"));
                    break;
                }
                Err(e) => {
                    let reason = e.to_string();
                    for username in chunk {
                        let failure = SoftError::Transport {
                            username: username.clone(),
                            reason: reason.clone(),
                        };
                        warn!("{failure}");
                    }
                    log.soft_failures += chunk.len();
                }
            }
        }

        profiles
    }

    async fn enrich_one(
        &self,
        item: Pending,
        skills: &[String],
        searches: &[LocationHierarchy],
        degraded_mode: bool,
    ) -> Result<Candidate, SoftError> {
        let candidate = match item {
            Pending::Cached(candidate) => candidate,
            Pending::Fetched(profile) => {
                // Unstarted work is dropped once the quota halts; in-flight tasks finish.
                if degraded_mode && self.limiter.is_halted(QuotaPool::Core) {
                    return Err(SoftError::Skipped(profile.username));
                }
                let location = self
                    .resolver
                    .parse(profile.location.as_deref().unwrap_or_default());
                let details = self.engine.detect(&profile, skills, degraded_mode).await;
                let candidate = assemble(profile, location, details, skills);
                self.cache.set_profile(&candidate).await;
                candidate
            }
        };

        let location = self.resolver.annotate(searches, &candidate.location_parsed);
        Ok(candidate.with_location(location))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Assembly and aggregation
// ────────────────────────────────────────────────────────────────────────────

fn assemble(
    profile: RawProfile,
    location: LocationHierarchy,
    details: BTreeMap<String, SkillConfidence>,
    skills: &[String],
) -> Candidate {
    let now = Utc::now();
    let account_age_days = (now - profile.created_at).num_days().max(0);
    let languages = aggregate_languages(&profile);

    let mut repos: Vec<_> = profile.repos.iter().collect();
    repos.sort_by(|a, b| b.stars.cmp(&a.stars).then_with(|| a.name.cmp(&b.name)));
    let top_repos = repos
        .into_iter()
        .take(TOP_REPO_COUNT)
        .map(|repo| RepoSummary {
            name: repo.name.clone(),
            description: repo.description.clone(),
            stars: repo.stars,
            language: repo.primary_language.clone(),
            topics: repo.topics.clone(),
        })
        .collect();

    let skill_confidence_scores = details
        .iter()
        .map(|(skill, detail)| (skill.clone(), detail.confidence))
        .collect();
    let skill_signals = details
        .iter()
        .map(|(skill, detail)| (skill.clone(), detail.detection_signals.clone()))
        .collect();

    Candidate {
        username: profile.username,
        name: profile.name,
        bio: profile.bio,
        location_raw: profile.location,
        location_parsed: location,
        top_repos,
        languages,
        contributions: profile.contributions,
        account_age_days,
        followers: profile.followers,
        skill_confidence_scores,
        skill_signals,
        skill_details: details,
        evaluated_skills: skills.to_vec(),
        profile_url: profile.profile_url,
        avatar_url: profile.avatar_url,
        fetched_at: now,
    }
}

fn dominant_detection(candidates: &[Candidate]) -> DetectionMethod {
    let (primary, fallback) = candidates
        .iter()
        .flat_map(|c| c.skill_details.values())
        .fold((0usize, 0usize), |(primary, fallback), detail| {
            if detail.is_primary_detection {
                (primary + 1, fallback)
            } else {
                (primary, fallback + 1)
            }
        });

    match (primary, fallback) {
        (0, 0) => DetectionMethod::None,
        (_, 0) => DetectionMethod::Primary,
        (0, _) => DetectionMethod::Fallback,
        _ => DetectionMethod::Mixed,
    }
}

fn match_histogram(candidates: &[Candidate]) -> BTreeMap<MatchLevel, usize> {
    let mut histogram = BTreeMap::new();
    for candidate in candidates {
        *histogram
            .entry(candidate.location_parsed.match_level)
            .or_insert(0) += 1;
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManifestLookup;
    use crate::testing::{
        candidate_fixture, profile_fixture, repo_fixture, FakePlatform, SearchFailure,
    };
    use std::time::Duration;

    struct Harness {
        orchestrator: EnrichmentOrchestrator,
        platform: FakePlatform,
        limiter: Arc<RateLimiter>,
        cache: Arc<CacheLayer>,
    }

    fn harness() -> Harness {
        let settings = Arc::new(DiscoverySettings::default());
        let platform = FakePlatform::default();
        let limiter = Arc::new(RateLimiter::new(settings.rate_limit.clone()));
        let cache = Arc::new(CacheLayer::in_memory(settings.cache.clone()));
        let orchestrator = EnrichmentOrchestrator::new(
            Arc::new(platform.clone()),
            limiter.clone(),
            cache.clone(),
            settings,
        );
        Harness {
            orchestrator,
            platform,
            limiter,
            cache,
        }
    }

    fn names(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{prefix}{i:02}")).collect()
    }

    fn python_dev(username: &str, location: &str) -> RawProfile {
        let mut profile = profile_fixture(username);
        profile.location = Some(location.to_string());
        profile.bio = Some("Python developer".to_string());
        profile.repos = vec![
            repo_fixture(&format!("{username}-api"), 5, Some("Python"), &["python"]),
            repo_fixture("dotfiles", 1, Some("Shell"), &[]),
        ];
        profile
    }

    fn seed(platform: &FakePlatform, usernames: &[String], location: &str) {
        for username in usernames {
            platform.add_profile(python_dev(username, location));
        }
    }

    fn requirement(location: Option<&str>) -> JobRequirement {
        JobRequirement {
            role: "Backend Engineer".to_string(),
            required_skills: vec!["Python".to_string()],
            locations: location.map(|l| vec![l.to_string()]).unwrap_or_default(),
            ..Default::default()
        }
    }

    fn usernames_of(response: &DiscoveryResponse) -> Vec<String> {
        response
            .candidates
            .iter()
            .map(|c| c.username.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_required_skills_is_validation_failure() {
        let h = harness();
        let req = JobRequirement {
            required_skills: vec!["  ".to_string()],
            ..Default::default()
        };

        let err = h.orchestrator.discover(&req, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Validation(_)));
        assert!(h.platform.search_queries().is_empty());
    }

    #[tokio::test]
    async fn test_results_capped_and_scores_bounded() {
        let h = harness();
        let users = names("dev", 40);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert_eq!(response.candidates.len(), 25);
        assert_eq!(response.metadata.returned, 25);
        assert_eq!(response.metadata.total_found, 40);
        assert!(response.metadata.batched);
        assert_eq!(h.platform.batch_sizes(), vec![25, 5]);

        for candidate in &response.candidates {
            assert!(!candidate.skill_confidence_scores.is_empty());
            for (skill, score) in &candidate.skill_confidence_scores {
                assert!((0.0..=1.0).contains(score));
                assert!(!candidate.skill_signals[skill].is_empty());
            }
            assert!(candidate.top_repos.len() <= 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncation_keeps_relevance_order() {
        let h = harness();
        h.platform.set_latency(Duration::from_millis(20));
        let users = names("dev", 30);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        // Identical profiles score identically; the boundary is decided by search order.
        assert_eq!(usernames_of(&response), users[..25].to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_search_is_served_from_cache() {
        let h = harness();
        h.platform.set_latency(Duration::from_millis(100));
        let users = names("dev", 12);
        h.platform.set_search_results(Some("Chennai"), &users);
        seed(&h.platform, &users, "Chennai");

        let req = requirement(Some("Chennai"));
        let first = h.orchestrator.discover(&req, false).await.unwrap();
        let searches_after_first = h.platform.search_queries().len();
        let batches_after_first = h.platform.batch_sizes().len();

        let second = h.orchestrator.discover(&req, false).await.unwrap();

        assert!(!first.metadata.cache_hit);
        assert!(second.metadata.cache_hit);
        assert_eq!(usernames_of(&first), usernames_of(&second));
        assert!(second.metadata.elapsed_ms < first.metadata.elapsed_ms);
        assert_eq!(h.platform.search_queries().len(), searches_after_first);
        assert_eq!(h.platform.batch_sizes().len(), batches_after_first);
    }

    #[tokio::test]
    async fn test_cached_profile_without_requested_skill_is_rederived() {
        let h = harness();
        let users = names("dev", 1);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");

        let mut stale = candidate_fixture(&users[0]);
        stale.evaluated_skills = vec!["rust".to_string()];
        h.cache.set_profile(&stale).await;

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert_eq!(h.platform.batch_sizes(), vec![1]);
        assert!(response.candidates[0]
            .skill_confidence_scores
            .contains_key("python"));
    }

    #[tokio::test]
    async fn test_missing_profiles_are_soft_failures() {
        let h = harness();
        let users = names("dev", 10);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users[..8], "Pune");

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert_eq!(response.candidates.len(), 8);
        assert_eq!(response.metadata.soft_failures, 2);
        assert!(!response.metadata.partial);
    }

    #[tokio::test]
    async fn test_broadens_city_to_state_to_country() {
        let h = harness();
        let users = names("dev", 12);
        h.platform.set_search_results(Some("Chennai"), &users[..3]);
        h.platform.set_search_results(Some("Tamil Nadu"), &users[..5]);
        h.platform.set_search_results(Some("India"), &users);
        seed(&h.platform, &users[..3], "Chennai");
        seed(&h.platform, &users[3..5], "Coimbatore");
        seed(&h.platform, &users[5..], "Mumbai");

        let response = h
            .orchestrator
            .discover(&requirement(Some("Chennai")), false)
            .await
            .unwrap();
        let meta = &response.metadata;

        let scopes: Vec<&str> = meta.attempts.iter().map(|a| a.scope.label()).collect();
        assert_eq!(scopes, vec!["city", "state", "country"]);
        let counts: Vec<usize> = meta.attempts.iter().map(|a| a.candidates_found).collect();
        assert_eq!(counts, vec![3, 5, 12]);
        assert_eq!(meta.final_scope, Some(LocationScope::Country("India".to_string())));

        assert_eq!(response.candidates.len(), 12);
        assert_eq!(meta.location_match_histogram[&MatchLevel::City], 3);
        assert_eq!(meta.location_match_histogram[&MatchLevel::State], 2);
        assert_eq!(meta.location_match_histogram[&MatchLevel::Country], 7);
        assert_eq!(response.candidates[0].location_parsed.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_stops_broadening_once_floor_is_met() {
        let h = harness();
        let users = names("dev", 10);
        h.platform.set_search_results(Some("Chennai"), &users);
        seed(&h.platform, &users, "Chennai");

        let response = h
            .orchestrator
            .discover(&requirement(Some("Chennai")), false)
            .await
            .unwrap();

        assert_eq!(response.metadata.attempts.len(), 1);
        assert_eq!(h.platform.search_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_no_results_anywhere_returns_empty_with_warning() {
        let h = harness();

        let response = h
            .orchestrator
            .discover(&requirement(Some("Chennai")), false)
            .await
            .unwrap();

        assert!(response.candidates.is_empty());
        assert_eq!(response.metadata.attempts.len(), 3);
        assert!(response
            .metadata
            .warnings
            .iter()
            .any(|w| w.contains("No candidates")));
        assert_eq!(response.metadata.dominant_detection, DetectionMethod::None);
    }

    #[tokio::test]
    async fn test_unavailable_manifests_yield_fallback_only() {
        let h = harness();
        h.platform.force_manifests_unavailable();
        let users = names("dev", 5);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert_eq!(response.metadata.dominant_detection, DetectionMethod::Fallback);
        for candidate in &response.candidates {
            assert!(!candidate.has_primary_detection());
            for detail in candidate.skill_details.values() {
                assert!(!detail.detection_signals.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_mixed_detection_when_some_manifests_declare_skill() {
        let h = harness();
        let users = names("dev", 3);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");
        h.platform.set_manifest(
            &users[0],
            &format!("{}-api", users[0]),
            ManifestLookup::Found(["python".to_string()].into_iter().collect()),
        );

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert_eq!(response.metadata.dominant_detection, DetectionMethod::Mixed);
        assert!(response.candidates[0].has_primary_detection());
        assert!(!response.candidates[1].has_primary_detection());
    }

    #[tokio::test]
    async fn test_search_transport_outage_is_fatal() {
        let h = harness();
        h.platform.fail_search(SearchFailure::Transport);

        let err = h
            .orchestrator
            .discover(&requirement(None), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_search_quota_exhaustion_returns_partial() {
        let h = harness();
        h.platform.fail_search(SearchFailure::Quota);

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert!(response.candidates.is_empty());
        assert!(response.metadata.partial);
        assert!(response.metadata.warnings.iter().any(|w| w.contains("quota")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_mode_halts_fan_out_on_quota_pressure() {
        let h = harness();
        let users = names("dev", 5);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users[2..], "Pune");
        for username in &users[..2] {
            let mut cached = candidate_fixture(username);
            cached.evaluated_skills = vec!["python".to_string()];
            h.cache.set_profile(&cached).await;
        }
        h.platform
            .exhaust_quota_after_batch(h.limiter.clone(), QuotaPool::Core);

        let response = h.orchestrator.discover(&requirement(None), true).await.unwrap();

        assert_eq!(usernames_of(&response), users[..2].to_vec());
        assert!(response.metadata.partial);
        assert!(response
            .metadata
            .warnings
            .iter()
            .any(|w| w.contains("3 candidates skipped")));
        assert_eq!(response.metadata.quota_remaining, Some(0));
        assert!(h.platform.manifest_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_degraded_mode_pressure_does_not_drop_candidates() {
        let h = harness();
        let users = names("dev", 3);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");
        h.platform
            .exhaust_quota_after_batch(h.limiter.clone(), QuotaPool::Core);

        let response = h.orchestrator.discover(&requirement(None), false).await.unwrap();

        assert_eq!(response.candidates.len(), 3);
        assert!(!response.metadata.partial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_mode_stops_profile_batches_on_graphql_pressure() {
        let h = harness();
        let users = names("dev", 30);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");
        h.platform
            .exhaust_quota_after_batch(h.limiter.clone(), QuotaPool::Graphql);

        let response = h.orchestrator.discover(&requirement(None), true).await.unwrap();

        assert_eq!(h.platform.batch_sizes(), vec![25]);
        assert_eq!(usernames_of(&response), users[..25].to_vec());
        assert!(response.metadata.partial);
        assert!(response
            .metadata
            .warnings
            .iter()
            .any(|w| w.contains("5 candidates skipped")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_search_window_does_not_halt_enrichment() {
        let h = harness();
        let users = names("dev", 3);
        h.platform.set_search_results(None, &users);
        seed(&h.platform, &users, "Pune");
        // GitHub's search pool only holds 30 calls per minute.
        h.limiter
            .observe(QuotaPool::Search, 29, Duration::from_secs(60));
        h.limiter
            .observe(QuotaPool::Graphql, 4999, Duration::from_secs(3600));

        let response = h.orchestrator.discover(&requirement(None), true).await.unwrap();

        assert_eq!(response.candidates.len(), 3);
        assert!(!response.metadata.partial);
        assert!(response.metadata.warnings.is_empty());
        assert_eq!(response.metadata.quota_remaining, Some(4999));
        // Two repositories per profile.
        assert_eq!(h.platform.manifest_requests().len(), 6);
    }

    #[test]
    fn test_assemble_orders_top_repos_and_languages() {
        let mut profile = profile_fixture("alice");
        profile.repos = (0..7)
            .map(|i| repo_fixture(&format!("repo{i}"), (i % 3) as u32, Some("Go"), &[]))
            .chain([repo_fixture("lib", 2, Some("Rust"), &[])])
            .collect();

        let candidate = assemble(
            profile,
            LocationHierarchy::default(),
            BTreeMap::new(),
            &["go".to_string()],
        );

        let top: Vec<(&str, u32)> = candidate
            .top_repos
            .iter()
            .map(|r| (r.name.as_str(), r.stars))
            .collect();
        assert_eq!(
            top,
            vec![("lib", 2), ("repo2", 2), ("repo5", 2), ("repo1", 1), ("repo4", 1)]
        );
        assert_eq!(candidate.languages, vec!["Go", "Rust"]);
        assert!(candidate.account_age_days > 0);
        assert_eq!(candidate.evaluated_skills, vec!["go"]);
    }
}
