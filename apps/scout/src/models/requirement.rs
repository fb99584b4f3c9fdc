use serde::{Deserialize, Serialize};

/// Years-of-experience window extracted from the job description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRange {
    pub min_years: Option<u32>,
    pub max_years: Option<u32>,
}

/// Structured job requirement handed over by the requirement-extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequirement {
    pub role: String,
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub experience: ExperienceRange,
    #[serde(default)]
    pub seniority: Option<String>,
    /// Ordered; the first entry drives the search location.
    #[serde(default)]
    pub locations: Vec<String>,
}

impl JobRequirement {
    /// Required skills with blank entries removed.
    pub fn required_skills(&self) -> impl Iterator<Item = &str> {
        self.required_skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn primary_location(&self) -> Option<&str> {
        self.locations
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }
}
