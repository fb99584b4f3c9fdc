//! Discovery settings: the tunable surface of the engine.
//!
//! Loaded once at startup (built-in defaults, optionally overridden by a JSON file),
//! validated, then shared as `Arc<DiscoverySettings>` and never mutated.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Hard ceiling on candidates returned by one discovery request.
pub const MAX_RETURNED_CANDIDATES: usize = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Settings groups
// ────────────────────────────────────────────────────────────────────────────

/// Weights of the secondary (fallback) skill signals. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub topics: f64,
    pub languages: f64,
    pub text: f64,
    pub repo_names: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            topics: 0.35,
            languages: 0.30,
            text: 0.15,
            repo_names: 0.20,
        }
    }
}

impl EnsembleWeights {
    pub fn total(&self) -> f64 {
        self.topics + self.languages + self.text + self.repo_names
    }
}

/// Confidence range produced by the dependency-manifest signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfidence {
    pub min: f64,
    pub max: f64,
    /// Added per additional repository declaring the dependency.
    pub step: f64,
}

impl Default for PrimaryConfidence {
    fn default() -> Self {
        Self {
            min: 0.80,
            max: 0.95,
            step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSettings {
    pub ensemble_weights: EnsembleWeights,
    pub primary_confidence: PrimaryConfidence,
    /// Skills scoring below this are left out of the candidate's scores.
    pub min_reported_confidence: f64,
    /// How many of the candidate's top repositories are probed for manifests.
    pub manifest_repo_limit: usize,
    /// canonical skill → spelling variants
    pub aliases: BTreeMap<String, Vec<String>>,
    /// canonical skill → platform language used in search qualifiers
    pub languages: BTreeMap<String, String>,
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            ensemble_weights: EnsembleWeights::default(),
            primary_confidence: PrimaryConfidence::default(),
            min_reported_confidence: 0.1,
            manifest_repo_limit: 3,
            aliases: default_skill_aliases(),
            languages: default_skill_languages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfidenceTable {
    pub city: f64,
    pub state: f64,
    pub country: f64,
}

impl Default for LocationConfidenceTable {
    fn default() -> Self {
        Self {
            city: 1.0,
            state: 0.7,
            country: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityEntry {
    pub name: String,
    pub state: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    pub confidence: LocationConfidenceTable,
    pub fuzzy_max_distance: usize,
    /// Multiplier applied when a match relied on fuzzy correction. Must be < 1.0.
    pub fuzzy_penalty: f64,
    pub fuzzy_min_token_len: usize,
    /// spelling variant → canonical name
    pub aliases: BTreeMap<String, String>,
    pub countries: Vec<String>,
    pub states: Vec<StateEntry>,
    pub cities: Vec<CityEntry>,
}

impl Default for LocationSettings {
    fn default() -> Self {
        let (countries, states, cities) = default_location_reference();
        Self {
            confidence: LocationConfidenceTable::default(),
            fuzzy_max_distance: 2,
            fuzzy_penalty: 0.85,
            fuzzy_min_token_len: 4,
            aliases: default_location_aliases(),
            countries,
            states,
            cities,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Usernames per batched profile request (clamped to 10 to 50).
    pub batch_size: usize,
    pub search_page_size: usize,
    pub request_timeout_secs: u64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            batch_size: 25,
            search_page_size: 50,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Below this many remaining calls the limiter stops letting calls through until reset.
    pub quota_floor: u32,
    /// Floor for the search pool, which only allows 30 calls per minute.
    pub search_quota_floor: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_attempts: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            quota_floor: 50,
            search_quota_floor: 2,
            backoff_base_ms: 1000,
            backoff_cap_ms: 8000,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub search_ttl_secs: u64,
    pub profile_ttl_secs: u64,
    /// After the primary backend fails, it is not retried for this long.
    pub primary_retry_cooldown_secs: u64,
    pub connect_timeout_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            search_ttl_secs: 3600,
            profile_ttl_secs: 3600,
            primary_retry_cooldown_secs: 30,
            connect_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Broaden the location scope while fewer candidates than this are found.
    pub broaden_floor: usize,
    pub max_candidates: usize,
    /// Usernames enriched per request; extra headroom absorbs soft failures.
    pub enrich_limit: usize,
    pub concurrency_limit: usize,
    /// seniority label → minimum public repositories for the activity qualifier
    pub seniority_activity: BTreeMap<String, u32>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let seniority_activity = [
            ("intern", 1),
            ("junior", 2),
            ("mid", 5),
            ("senior", 10),
            ("staff", 15),
            ("principal", 20),
            ("lead", 15),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            broaden_floor: 10,
            max_candidates: MAX_RETURNED_CANDIDATES,
            enrich_limit: 30,
            concurrency_limit: 20,
            seniority_activity,
        }
    }
}

/// The full, immutable settings bundle shared by every discovery component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub skills: SkillSettings,
    pub location: LocationSettings,
    pub platform: PlatformSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub orchestrator: OrchestratorSettings,
}

impl DiscoverySettings {
    /// Loads settings from an optional JSON file over the built-in defaults and validates them.
    pub fn load(path: Option<&Path>) -> Result<Arc<Self>, ConfigError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                info!("Loading discovery settings from {}", path.display());
                serde_json::from_str::<DiscoverySettings>(&raw)?
            }
            None => DiscoverySettings::default(),
        };

        settings.validate()?;
        Ok(Arc::new(settings))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights_total = self.skills.ensemble_weights.total();
        if (weights_total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "ensemble weights must sum to 1.0, got {weights_total:.4}"
            )));
        }

        let primary = &self.skills.primary_confidence;
        if !(0.0..=1.0).contains(&primary.min)
            || !(0.0..=1.0).contains(&primary.max)
            || primary.min > primary.max
        {
            return Err(ConfigError::Invalid(format!(
                "primary confidence range [{}, {}] must be ordered within [0, 1]",
                primary.min, primary.max
            )));
        }

        let penalty = self.location.fuzzy_penalty;
        if !(penalty > 0.0 && penalty < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fuzzy_penalty must be in (0, 1), got {penalty}"
            )));
        }

        let table = &self.location.confidence;
        if !(table.city >= table.state && table.state >= table.country && table.country > 0.0)
            || table.city > 1.0
        {
            return Err(ConfigError::Invalid(
                "location confidence table must satisfy 1 >= city >= state >= country > 0"
                    .to_string(),
            ));
        }

        if !(10..=50).contains(&self.platform.batch_size) {
            return Err(ConfigError::Invalid(format!(
                "batch_size must be between 10 and 50, got {}",
                self.platform.batch_size
            )));
        }

        let orchestrator = &self.orchestrator;
        if orchestrator.concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "concurrency_limit must be positive".to_string(),
            ));
        }
        if !(1..=MAX_RETURNED_CANDIDATES).contains(&orchestrator.max_candidates) {
            return Err(ConfigError::Invalid(format!(
                "max_candidates must be between 1 and {MAX_RETURNED_CANDIDATES}, got {}",
                orchestrator.max_candidates
            )));
        }

        if self.rate_limit.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in tables
// ────────────────────────────────────────────────────────────────────────────

fn default_skill_aliases() -> BTreeMap<String, Vec<String>> {
    let aliases: &[(&str, &[&str])] = &[
        ("javascript", &["js", "javascript", "ecmascript", "es6"]),
        ("typescript", &["ts", "typescript"]),
        ("nodejs", &["node.js", "node js", "nodejs", "node"]),
        ("react", &["reactjs", "react.js", "react js", "react"]),
        ("vue", &["vue.js", "vuejs", "vue"]),
        ("angular", &["angularjs", "angular.js", "angular", "@angular/core"]),
        ("nextjs", &["next.js", "nextjs", "next"]),
        ("express", &["express.js", "expressjs", "express"]),
        ("python", &["python3", "python", "py"]),
        ("django", &["django", "djangorestframework", "drf"]),
        ("flask", &["flask"]),
        ("fastapi", &["fast api", "fastapi"]),
        ("pytorch", &["pytorch", "torch"]),
        ("tensorflow", &["tensorflow", "tf"]),
        ("pandas", &["pandas"]),
        ("rust", &["rust", "rustlang"]),
        ("tokio", &["tokio"]),
        ("go", &["go", "golang"]),
        ("java", &["java"]),
        ("spring", &["spring", "spring boot", "springboot", "spring-boot-starter"]),
        ("kotlin", &["kotlin"]),
        ("csharp", &["c#", "csharp", "c sharp"]),
        ("cpp", &["c++", "cpp"]),
        ("ruby", &["ruby"]),
        ("rails", &["rails", "ruby on rails", "ror"]),
        ("php", &["php"]),
        ("laravel", &["laravel", "laravel/framework"]),
        ("postgresql", &["postgres", "postgresql", "psycopg2", "pg"]),
        ("mongodb", &["mongo", "mongodb", "mongoose", "pymongo"]),
        ("redis", &["redis", "ioredis"]),
        ("graphql", &["graphql", "gql"]),
        ("docker", &["docker"]),
        ("kubernetes", &["kubernetes", "k8s"]),
        ("aws", &["aws", "amazon web services", "boto3", "aws-sdk"]),
    ];

    aliases
        .iter()
        .map(|(canonical, variants)| {
            (
                canonical.to_string(),
                variants.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

fn default_skill_languages() -> BTreeMap<String, String> {
    let languages: &[(&str, &str)] = &[
        ("javascript", "javascript"),
        ("typescript", "typescript"),
        ("nodejs", "javascript"),
        ("react", "javascript"),
        ("vue", "javascript"),
        ("angular", "typescript"),
        ("nextjs", "javascript"),
        ("express", "javascript"),
        ("python", "python"),
        ("django", "python"),
        ("flask", "python"),
        ("fastapi", "python"),
        ("pytorch", "python"),
        ("tensorflow", "python"),
        ("pandas", "python"),
        ("rust", "rust"),
        ("tokio", "rust"),
        ("go", "go"),
        ("java", "java"),
        ("spring", "java"),
        ("kotlin", "kotlin"),
        ("csharp", "c#"),
        ("cpp", "c++"),
        ("ruby", "ruby"),
        ("rails", "ruby"),
        ("php", "php"),
        ("laravel", "php"),
    ];

    languages
        .iter()
        .map(|(skill, language)| (skill.to_string(), language.to_string()))
        .collect()
}

fn default_location_aliases() -> BTreeMap<String, String> {
    let aliases: &[(&str, &str)] = &[
        ("bengaluru", "Bangalore"),
        ("bangaluru", "Bangalore"),
        ("madras", "Chennai"),
        ("bombay", "Mumbai"),
        ("calcutta", "Kolkata"),
        ("new delhi", "Delhi"),
        ("gurgaon", "Gurugram"),
        ("tn", "Tamil Nadu"),
        ("sf", "San Francisco"),
        ("nyc", "New York"),
        ("ny", "New York"),
        ("ca", "California"),
        ("wa", "Washington"),
        ("tx", "Texas"),
        ("ma", "Massachusetts"),
        ("usa", "United States"),
        ("us", "United States"),
        ("united states of america", "United States"),
        ("america", "United States"),
        ("uk", "United Kingdom"),
        ("great britain", "United Kingdom"),
        ("england", "England"),
        ("deutschland", "Germany"),
        ("münchen", "Munich"),
        ("muenchen", "Munich"),
        ("bharat", "India"),
    ];

    aliases
        .iter()
        .map(|(variant, canonical)| (variant.to_string(), canonical.to_string()))
        .collect()
}

fn default_location_reference() -> (Vec<String>, Vec<StateEntry>, Vec<CityEntry>) {
    let countries = [
        "India",
        "United States",
        "United Kingdom",
        "Germany",
        "Canada",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    let states: &[(&str, &str)] = &[
        ("Tamil Nadu", "India"),
        ("Karnataka", "India"),
        ("Maharashtra", "India"),
        ("Telangana", "India"),
        ("West Bengal", "India"),
        ("Haryana", "India"),
        ("Kerala", "India"),
        ("California", "United States"),
        ("Washington", "United States"),
        ("New York", "United States"),
        ("Texas", "United States"),
        ("Massachusetts", "United States"),
        ("England", "United Kingdom"),
        ("Scotland", "United Kingdom"),
        ("Bavaria", "Germany"),
        ("Berlin", "Germany"),
        ("Ontario", "Canada"),
        ("British Columbia", "Canada"),
    ];

    let cities: &[(&str, Option<&str>, &str)] = &[
        ("Chennai", Some("Tamil Nadu"), "India"),
        ("Coimbatore", Some("Tamil Nadu"), "India"),
        ("Madurai", Some("Tamil Nadu"), "India"),
        ("Bangalore", Some("Karnataka"), "India"),
        ("Mysore", Some("Karnataka"), "India"),
        ("Mumbai", Some("Maharashtra"), "India"),
        ("Pune", Some("Maharashtra"), "India"),
        ("Hyderabad", Some("Telangana"), "India"),
        ("Kolkata", Some("West Bengal"), "India"),
        ("Gurugram", Some("Haryana"), "India"),
        ("Kochi", Some("Kerala"), "India"),
        ("Delhi", None, "India"),
        ("San Francisco", Some("California"), "United States"),
        ("Los Angeles", Some("California"), "United States"),
        ("San Jose", Some("California"), "United States"),
        ("Seattle", Some("Washington"), "United States"),
        ("New York", Some("New York"), "United States"),
        ("Austin", Some("Texas"), "United States"),
        ("Boston", Some("Massachusetts"), "United States"),
        ("London", Some("England"), "United Kingdom"),
        ("Manchester", Some("England"), "United Kingdom"),
        ("Edinburgh", Some("Scotland"), "United Kingdom"),
        ("Munich", Some("Bavaria"), "Germany"),
        ("Berlin", Some("Berlin"), "Germany"),
        ("Toronto", Some("Ontario"), "Canada"),
        ("Vancouver", Some("British Columbia"), "Canada"),
    ];

    (
        countries,
        states
            .iter()
            .map(|(name, country)| StateEntry {
                name: name.to_string(),
                country: country.to_string(),
            })
            .collect(),
        cities
            .iter()
            .map(|(name, state, country)| CityEntry {
                name: name.to_string(),
                state: state.map(|s| s.to_string()),
                country: country.to_string(),
            })
            .collect(),
    )
}
