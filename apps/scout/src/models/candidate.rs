use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Granularity at which two locations agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    City,
    State,
    Country,
    #[default]
    None,
}

/// A free-text location resolved against the reference table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationHierarchy {
    pub original: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub confidence: f64,
    pub match_level: MatchLevel,
    pub fuzzy_corrected: bool,
}

impl LocationHierarchy {
    pub fn is_resolved(&self) -> bool {
        self.city.is_some() || self.state.is_some() || self.country.is_some()
    }
}

/// Per-skill detection outcome, kept on the candidate for downstream explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillConfidence {
    pub skill: String,
    pub confidence: f64,
    pub detection_signals: Vec<String>,
    /// signal → weighted contribution to `confidence`
    pub signal_weights: BTreeMap<String, f64>,
    pub is_primary_detection: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub stars: u32,
    pub language: Option<String>,
    pub topics: Vec<String>,
}

/// An enriched profile. Assembled once and replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location_raw: Option<String>,
    pub location_parsed: LocationHierarchy,
    /// At most five, most-starred first.
    pub top_repos: Vec<RepoSummary>,
    /// Deduplicated and sorted.
    pub languages: Vec<String>,
    pub contributions: u32,
    pub account_age_days: i64,
    pub followers: u32,
    pub skill_confidence_scores: BTreeMap<String, f64>,
    pub skill_signals: BTreeMap<String, Vec<String>>,
    pub skill_details: BTreeMap<String, SkillConfidence>,
    /// Canonical skills the scores above were computed for.
    pub evaluated_skills: Vec<String>,
    pub profile_url: String,
    pub avatar_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Candidate {
    /// True when the cached scores were computed for every skill in `skills`.
    pub fn covers_skills(&self, skills: &[String]) -> bool {
        skills.iter().all(|s| self.evaluated_skills.contains(s))
    }

    /// Whether any reported skill came from the dependency-manifest signal.
    pub fn has_primary_detection(&self) -> bool {
        self.skill_details.values().any(|d| d.is_primary_detection)
    }

    /// Builds a new candidate identical to this one but with a different location annotation.
    pub fn with_location(&self, location_parsed: LocationHierarchy) -> Candidate {
        Candidate {
            location_parsed,
            ..self.clone()
        }
    }
}
