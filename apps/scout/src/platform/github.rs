//! GitHub backend for `PlatformApi`.
//!
//! REST for search and repository contents, GraphQL for batched profile lookups. Every
//! request reserves against its quota pool in the shared `RateLimiter`, and quota headers
//! on every response are fed back into the pool named by `x-ratelimit-resource`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::HeaderMap, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::platform::manifest::{parse_manifest, MANIFEST_FILES};
use crate::platform::{
    ManifestLookup, PlatformApi, PlatformError, ProfileBatch, QuotaPool, RateLimiter, RawProfile,
    RawRepo, SearchPage, SoftError, StarredRepo,
};

const USER_AGENT: &str = concat!("scout/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const MAX_SEARCH_PAGE: usize = 100;

const PROFILE_FRAGMENT: &str = r#"
fragment ProfileFields on User {
  login
  name
  bio
  location
  avatarUrl
  url
  createdAt
  followers { totalCount }
  contributionsCollection { contributionCalendar { totalContributions } }
  repositories(first: 10, ownerAffiliations: OWNER, orderBy: {field: STARGAZERS, direction: DESC}) {
    nodes {
      name
      description
      stargazerCount
      isFork
      primaryLanguage { name }
      languages(first: 5, orderBy: {field: SIZE, direction: DESC}) { nodes { name } }
      repositoryTopics(first: 10) { nodes { topic { name } } }
    }
  }
  starredRepositories(first: 10, orderBy: {field: STARRED_AT, direction: DESC}) {
    nodes { name description }
  }
}"#;

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: usize,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<HashMap<String, Option<GqlUser>>>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TotalCount {
    #[serde(rename = "totalCount")]
    total_count: u32,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GqlTopic {
    topic: Named,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlRepo {
    name: String,
    description: Option<String>,
    stargazer_count: u32,
    is_fork: bool,
    primary_language: Option<Named>,
    languages: Nodes<Named>,
    repository_topics: Nodes<GqlTopic>,
}

#[derive(Debug, Deserialize)]
struct GqlStarred {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlContributions {
    contribution_calendar: GqlCalendar,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlCalendar {
    total_contributions: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    avatar_url: Option<String>,
    url: String,
    created_at: DateTime<Utc>,
    followers: TotalCount,
    contributions_collection: GqlContributions,
    repositories: Nodes<GqlRepo>,
    starred_repositories: Nodes<GqlStarred>,
}

impl From<GqlUser> for RawProfile {
    fn from(user: GqlUser) -> Self {
        RawProfile {
            username: user.login,
            name: user.name.filter(|n| !n.trim().is_empty()),
            bio: user.bio.filter(|b| !b.trim().is_empty()),
            location: user.location.filter(|l| !l.trim().is_empty()),
            avatar_url: user.avatar_url,
            profile_url: user.url,
            created_at: user.created_at,
            followers: user.followers.total_count,
            contributions: user
                .contributions_collection
                .contribution_calendar
                .total_contributions,
            repos: user
                .repositories
                .nodes
                .into_iter()
                .map(|repo| RawRepo {
                    name: repo.name,
                    description: repo.description,
                    stars: repo.stargazer_count,
                    primary_language: repo.primary_language.map(|l| l.name),
                    languages: repo.languages.nodes.into_iter().map(|l| l.name).collect(),
                    topics: repo
                        .repository_topics
                        .nodes
                        .into_iter()
                        .map(|t| t.topic.name)
                        .collect(),
                    is_fork: repo.is_fork,
                })
                .collect(),
            starred: user
                .starred_repositories
                .nodes
                .into_iter()
                .map(|s| StarredRepo {
                    name: s.name,
                    description: s.description,
                })
                .collect(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: String,
    limiter: Arc<RateLimiter>,
}

impl GitHubClient {
    pub fn new(
        api_url: String,
        token: String,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            limiter,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Sends a request built by `build` against `pool`, retrying quota rejections with
    /// exponential backoff.
    async fn send(
        &self,
        pool: QuotaPool,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, PlatformError> {
        let max_attempts = self.limiter.max_attempts();

        for attempt in 1..=max_attempts {
            self.limiter.acquire(pool).await;

            let response = build().send().await.map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout
                } else {
                    PlatformError::Http(e)
                }
            })?;

            self.observe_quota(pool, response.headers());

            if !is_quota_rejection(response.status(), response.headers()) {
                return Ok(response);
            }

            if attempt < max_attempts {
                let delay = self.limiter.backoff_delay(attempt);
                warn!(
                    "Platform {} quota exceeded (attempt {}/{}), retrying after {}ms",
                    pool.label(),
                    attempt,
                    max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(PlatformError::QuotaExceeded {
            attempts: max_attempts,
        })
    }

    /// The response names the pool it was metered against; otherwise it is the request's.
    fn observe_quota(&self, requested: QuotaPool, headers: &HeaderMap) {
        let remaining = header_u64(headers, "x-ratelimit-remaining");
        let reset = header_u64(headers, "x-ratelimit-reset");
        let (Some(remaining), Some(reset)) = (remaining, reset) else {
            return;
        };

        let pool = headers
            .get("x-ratelimit-resource")
            .and_then(|v| v.to_str().ok())
            .and_then(QuotaPool::from_resource)
            .unwrap_or(requested);
        let reset_in = (reset as i64 - Utc::now().timestamp()).max(0) as u64;
        self.limiter.observe(
            pool,
            remaining.min(u32::MAX as u64) as u32,
            Duration::from_secs(reset_in),
        );
    }

    async fn error_from(response: Response) -> PlatformError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        PlatformError::Api { status, message }
    }

    async fn list_root_files(&self, owner: &str, repo: &str) -> Option<BTreeSet<String>> {
        let url = format!("{}/repos/{owner}/{repo}/contents/", self.api_url);
        let response = self
            .send(QuotaPool::Core, || {
                self.authorized(self.client.get(&url))
                    .header("Accept", "application/vnd.github+json")
            })
            .await
            .map_err(|e| debug!("Listing {owner}/{repo} failed: {e}"))
            .ok()?;

        if !response.status().is_success() {
            debug!("Listing {owner}/{repo} returned {}", response.status());
            return None;
        }

        let entries: Vec<ContentEntry> = response.json().await.ok()?;
        Some(
            entries
                .into_iter()
                .filter(|e| e.entry_type == "file")
                .map(|e| e.name)
                .collect(),
        )
    }

    async fn fetch_raw_file(&self, owner: &str, repo: &str, path: &str) -> Option<String> {
        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.api_url);
        let response = self
            .send(QuotaPool::Core, || {
                self.authorized(self.client.get(&url))
                    .header("Accept", "application/vnd.github.raw")
            })
            .await
            .map_err(|e| debug!("Fetching {owner}/{repo}/{path} failed: {e}"))
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

#[async_trait]
impl PlatformApi for GitHubClient {
    async fn search_users(&self, query: &str, limit: usize) -> Result<SearchPage, PlatformError> {
        let url = format!("{}/search/users", self.api_url);
        let per_page = limit.clamp(1, MAX_SEARCH_PAGE).to_string();

        debug!(query = %query, "Searching users");

        let response = self
            .send(QuotaPool::Search, || {
                self.authorized(self.client.get(&url))
                    .header("Accept", "application/vnd.github+json")
                    .query(&[("q", query), ("per_page", per_page.as_str())])
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))?;

        Ok(SearchPage {
            total_count: body.total_count,
            usernames: body.items.into_iter().map(|i| i.login).collect(),
        })
    }

    async fn batch_fetch_profiles(
        &self,
        usernames: &[String],
    ) -> Result<ProfileBatch, PlatformError> {
        let mut batch = ProfileBatch::default();

        let (valid, invalid): (Vec<&String>, Vec<&String>) =
            usernames.iter().partition(|u| is_valid_login(u));
        batch
            .failures
            .extend(invalid.into_iter().map(|u| SoftError::NotFound(u.clone())));

        if valid.is_empty() {
            return Ok(batch);
        }

        let query = build_profile_query(&valid);
        let url = format!("{}/graphql", self.api_url);
        let payload = json!({ "query": query });

        let response = self
            .send(QuotaPool::Graphql, || {
                self.authorized(self.client.post(&url)).json(&payload)
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))?;

        let Some(mut data) = body.data else {
            let message = body
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "empty GraphQL response".to_string());
            return Err(PlatformError::Api {
                status: 200,
                message,
            });
        };

        for error in body.errors.iter().filter(|e| e.error_type.as_deref() != Some("NOT_FOUND")) {
            warn!("GraphQL partial error: {}", error.message);
        }

        for (index, username) in valid.iter().enumerate() {
            match data.remove(&format!("u{index}")).flatten() {
                Some(user) => batch.profiles.push(user.into()),
                None => batch.failures.push(SoftError::NotFound((*username).clone())),
            }
        }

        debug!(
            requested = usernames.len(),
            found = batch.profiles.len(),
            "Batched profile lookup complete"
        );

        Ok(batch)
    }

    async fn fetch_dependency_manifest(
        &self,
        username: &str,
        repo: &str,
        degraded_mode: bool,
    ) -> ManifestLookup {
        let halted = || degraded_mode && self.limiter.is_halted(QuotaPool::Core);

        if halted() {
            return ManifestLookup::Unavailable;
        }
        let Some(files) = self.list_root_files(username, repo).await else {
            return ManifestLookup::Unavailable;
        };

        let mut deps = BTreeSet::new();
        let mut found_any = false;

        for (file, kind) in MANIFEST_FILES.iter().filter(|(f, _)| files.contains(*f)) {
            if halted() {
                debug!("Core quota halted, stopped probing {username}/{repo}");
                break;
            }
            if let Some(content) = self.fetch_raw_file(username, repo, file).await {
                found_any = true;
                deps.extend(parse_manifest(*kind, &content));
            }
        }

        if found_any {
            ManifestLookup::Found(deps)
        } else {
            ManifestLookup::Unavailable
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// 429, or a 403 that reports an exhausted window.
fn is_quota_rejection(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && header_u64(headers, "x-ratelimit-remaining") == Some(0))
}

/// GitHub logins: alphanumerics and single inner hyphens, at most 39 chars.
fn is_valid_login(login: &str) -> bool {
    !login.is_empty()
        && login.len() <= 39
        && !login.starts_with('-')
        && !login.ends_with('-')
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn build_profile_query(usernames: &[&String]) -> String {
    let mut query = String::from("query {\n");
    for (index, username) in usernames.iter().enumerate() {
        query.push_str(&format!(
            "  u{index}: user(login: \"{username}\") {{ ...ProfileFields }}\n"
        ));
    }
    query.push_str("}\n");
    query.push_str(PROFILE_FRAGMENT);
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RateLimitSettings;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    // ── Local HTTP stub ─────────────────────────────────────────────────────

    struct Scripted {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    }

    impl Scripted {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        fn quota(mut self, resource: &str, remaining: u32, reset_in_secs: i64) -> Self {
            let reset = Utc::now().timestamp() + reset_in_secs;
            self.headers.push(("x-ratelimit-resource", resource.to_string()));
            self.headers.push(("x-ratelimit-remaining", remaining.to_string()));
            self.headers.push(("x-ratelimit-reset", reset.to_string()));
            self
        }
    }

    /// Answers one connection per scripted response, in order, then stops accepting.
    async fn stub_server(script: Vec<Scripted>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));
        let counter = served.clone();

        tokio::spawn(async move {
            for reply in script {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);

                let mut raw = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                    reply.status,
                    reply.body.len()
                );
                for (name, value) in &reply.headers {
                    raw.push_str(&format!("{name}: {value}\r\n"));
                }
                raw.push_str("\r\n");
                raw.push_str(&reply.body);
                let _ = socket.write_all(raw.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), served)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }

    fn client(api_url: String) -> (GitHubClient, Arc<RateLimiter>) {
        let limiter = Arc::new(RateLimiter::new(RateLimitSettings {
            quota_floor: 50,
            search_quota_floor: 2,
            backoff_base_ms: 1,
            backoff_cap_ms: 4,
            max_attempts: 3,
        }));
        let client = GitHubClient::new(
            api_url,
            "test-token".to_string(),
            Duration::from_secs(5),
            limiter.clone(),
        )
        .unwrap();
        (client, limiter)
    }

    const SEARCH_BODY: &str = r#"{"total_count": 2, "items": [{"login": "alice"}, {"login": "bob"}]}"#;
    const NOT_FOUND_BODY: &str =
        r#"{"data": {"u0": null}, "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a User"}]}"#;

    #[tokio::test]
    async fn test_repeated_429_surfaces_quota_exceeded() {
        let script = (0..3).map(|_| Scripted::new(429, "{}")).collect();
        let (url, served) = stub_server(script).await;
        let (client, _) = client(url);

        let err = client.search_users("language:rust", 10).await.unwrap_err();

        assert!(matches!(err, PlatformError::QuotaExceeded { attempts: 3 }));
        assert_eq!(served.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_429_then_success_is_retried() {
        let script = vec![Scripted::new(429, "{}"), Scripted::new(200, SEARCH_BODY)];
        let (url, served) = stub_server(script).await;
        let (client, _) = client(url);

        let page = client.search_users("language:rust", 10).await.unwrap();

        assert_eq!(page.usernames, vec!["alice", "bob"]);
        assert_eq!(page.total_count, 2);
        assert_eq!(served.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_403_is_retried_after_window_reset() {
        let script = vec![
            Scripted::new(403, r#"{"message": "API rate limit exceeded"}"#).quota("core", 0, -1),
            Scripted::new(200, r#"[{"name": "Cargo.toml", "type": "file"}]"#).quota("core", 4999, 3600),
        ];
        let (url, served) = stub_server(script).await;
        let (client, limiter) = client(url);

        let files = client.list_root_files("alice", "api").await.unwrap();

        assert!(files.contains("Cargo.toml"));
        assert_eq!(served.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.remaining(QuotaPool::Core), Some(4999));
    }

    #[tokio::test]
    async fn test_rate_limit_headers_update_their_own_pool() {
        let script = vec![
            Scripted::new(200, SEARCH_BODY).quota("search", 29, 60),
            Scripted::new(200, NOT_FOUND_BODY).quota("graphql", 4999, 3600),
        ];
        let (url, _) = stub_server(script).await;
        let (client, limiter) = client(url);

        client.search_users("language:rust", 10).await.unwrap();

        assert_eq!(limiter.remaining(QuotaPool::Search), Some(29));
        assert_eq!(limiter.remaining(QuotaPool::Graphql), None);
        assert!(!limiter.is_halted(QuotaPool::Search));
        assert!(!limiter.is_halted(QuotaPool::Graphql));

        // A low search window must not hold back profile lookups.
        let batch = tokio::time::timeout(
            Duration::from_secs(3),
            client.batch_fetch_profiles(&["ghost".to_string()]),
        )
        .await
        .expect("profile lookup stalled on another pool's quota")
        .unwrap();

        assert!(batch.profiles.is_empty());
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(limiter.remaining(QuotaPool::Graphql), Some(4999));
        assert_eq!(limiter.remaining(QuotaPool::Search), Some(29));
    }

    #[tokio::test]
    async fn test_degraded_manifest_probe_stops_when_core_pool_drops() {
        let script = vec![
            Scripted::new(200, r#"[{"name": "Cargo.toml", "type": "file"}]"#).quota("core", 3, 3600),
            Scripted::new(200, "[dependencies]\ntokio = \"1\"\n"),
        ];
        let (url, served) = stub_server(script).await;
        let (client, limiter) = client(url);

        let lookup = tokio::time::timeout(
            Duration::from_secs(3),
            client.fetch_dependency_manifest("alice", "api", true),
        )
        .await
        .expect("manifest probe waited for the quota reset");

        assert_eq!(lookup, ManifestLookup::Unavailable);
        assert_eq!(served.load(Ordering::SeqCst), 1);
        assert!(limiter.is_halted(QuotaPool::Core));

        // Already halted: nothing is sent at all.
        let lookup = client.fetch_dependency_manifest("alice", "web", true).await;
        assert_eq!(lookup, ManifestLookup::Unavailable);
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unlabelled_quota_headers_update_requested_pool() {
        let mut reply = Scripted::new(200, SEARCH_BODY);
        let reset = Utc::now().timestamp() + 60;
        reply.headers.push(("x-ratelimit-remaining", "17".to_string()));
        reply.headers.push(("x-ratelimit-reset", reset.to_string()));
        let (url, _) = stub_server(vec![reply]).await;
        let (client, limiter) = client(url);

        client.search_users("language:go", 5).await.unwrap();

        assert_eq!(limiter.remaining(QuotaPool::Search), Some(17));
        assert_eq!(limiter.remaining(QuotaPool::Core), None);
    }

    #[test]
    fn test_login_validation() {
        assert!(is_valid_login("octocat"));
        assert!(is_valid_login("dev-42"));
        assert!(!is_valid_login(""));
        assert!(!is_valid_login("-leading"));
        assert!(!is_valid_login("bad\"quote"));
        assert!(!is_valid_login(&"a".repeat(40)));
    }

    #[test]
    fn test_profile_query_aliases_each_login() {
        let a = "alice".to_string();
        let b = "bob".to_string();
        let query = build_profile_query(&[&a, &b]);
        assert!(query.contains(r#"u0: user(login: "alice")"#));
        assert!(query.contains(r#"u1: user(login: "bob")"#));
        assert!(query.contains("fragment ProfileFields on User"));
    }

    #[test]
    fn test_quota_rejection_detection() {
        let mut headers = HeaderMap::new();
        assert!(is_quota_rejection(StatusCode::TOO_MANY_REQUESTS, &headers));
        assert!(!is_quota_rejection(StatusCode::FORBIDDEN, &headers));

        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(is_quota_rejection(StatusCode::FORBIDDEN, &headers));
        assert!(!is_quota_rejection(StatusCode::OK, &headers));
    }

    #[test]
    fn test_graphql_user_maps_to_raw_profile() {
        let json = r#"{
            "data": {
                "u0": {
                    "login": "alice",
                    "name": "Alice",
                    "bio": "",
                    "location": "Chennai, India",
                    "avatarUrl": "https://avatars.example/alice",
                    "url": "https://github.com/alice",
                    "createdAt": "2018-03-01T00:00:00Z",
                    "followers": {"totalCount": 42},
                    "contributionsCollection": {"contributionCalendar": {"totalContributions": 910}},
                    "repositories": {"nodes": [{
                        "name": "api",
                        "description": "FastAPI service",
                        "stargazerCount": 12,
                        "isFork": false,
                        "primaryLanguage": {"name": "Python"},
                        "languages": {"nodes": [{"name": "Python"}, {"name": "Shell"}]},
                        "repositoryTopics": {"nodes": [{"topic": {"name": "fastapi"}}]}
                    }]},
                    "starredRepositories": {"nodes": [{"name": "tokio", "description": null}]}
                },
                "u1": null
            },
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a User", "path": ["u1"]}]
        }"#;

        let mut body: GraphQlResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.errors.len(), 1);

        let data = body.data.as_mut().unwrap();
        assert!(data.remove("u1").flatten().is_none());

        let profile: RawProfile = data.remove("u0").flatten().unwrap().into();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.bio, None);
        assert_eq!(profile.followers, 42);
        assert_eq!(profile.contributions, 910);
        assert_eq!(profile.repos[0].topics, vec!["fastapi"]);
        assert_eq!(profile.repos[0].primary_language.as_deref(), Some("Python"));
        assert_eq!(profile.starred[0].name, "tokio");
    }
}
