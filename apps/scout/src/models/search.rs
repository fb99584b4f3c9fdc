use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::{Candidate, MatchLevel};

/// Location filter granularity for one search attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "value", rename_all = "snake_case")]
pub enum LocationScope {
    City(String),
    State(String),
    Country(String),
    /// Unrecognised location text, searched verbatim.
    Raw(String),
    Anywhere,
}

impl LocationScope {
    pub fn filter(&self) -> Option<&str> {
        match self {
            LocationScope::City(v)
            | LocationScope::State(v)
            | LocationScope::Country(v)
            | LocationScope::Raw(v) => Some(v.as_str()),
            LocationScope::Anywhere => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LocationScope::City(_) => "city",
            LocationScope::State(_) => "state",
            LocationScope::Country(_) => "country",
            LocationScope::Raw(_) => "raw",
            LocationScope::Anywhere => "anywhere",
        }
    }
}

/// Derived per search attempt. Rebuilt, not mutated, when the scope broadens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub required_languages: Vec<String>,
    pub preferred_languages: Vec<String>,
    pub scope: LocationScope,
    pub location_filter: Option<String>,
    pub min_account_age_days: Option<u32>,
    pub min_public_repos: Option<u32>,
    pub query: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Primary,
    Fallback,
    Mixed,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAttempt {
    pub scope: LocationScope,
    pub query: String,
    pub candidates_found: usize,
    pub cache_hit: bool,
}

/// Execution metadata returned alongside the candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub request_id: Uuid,
    pub total_found: usize,
    pub returned: usize,
    pub timestamp: DateTime<Utc>,
    pub quota_remaining: Option<u32>,
    pub cache_hit: bool,
    pub elapsed_ms: u64,
    pub batched: bool,
    pub dominant_detection: DetectionMethod,
    pub location_match_histogram: BTreeMap<MatchLevel, usize>,
    pub final_scope: Option<LocationScope>,
    pub attempts: Vec<SearchAttempt>,
    pub soft_failures: usize,
    pub warnings: Vec<String>,
    /// Set when quota pressure cut the request short.
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub candidates: Vec<Candidate>,
    pub metadata: SearchResult,
}
