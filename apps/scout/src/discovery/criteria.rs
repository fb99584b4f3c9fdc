//! Job requirement → platform search criteria.
//!
//! Criteria are rebuilt from scratch for every location scope. The query string depends
//! only on the requirement, the scope and the reference date, so the same inputs always
//! produce the same query (and therefore the same cache key).

use chrono::{Duration, NaiveDate};
use tracing::warn;

use crate::location::LocationResolver;
use crate::models::requirement::JobRequirement;
use crate::models::search::{LocationScope, SearchCriteria};
use crate::settings::OrchestratorSettings;
use crate::skills::SkillConfidenceEngine;

const DAYS_PER_YEAR: u32 = 365;

/// Canonical required skills in requirement order, duplicates removed.
pub fn canonical_skills(engine: &SkillConfidenceEngine, requirement: &JobRequirement) -> Vec<String> {
    let mut skills: Vec<String> = Vec::new();
    for skill in requirement.required_skills() {
        let canonical = engine.normalize(skill);
        if !skills.contains(&canonical) {
            skills.push(canonical);
        }
    }
    skills
}

/// Scopes to try, narrowest first: city → state → country.
///
/// Unrecognised text is searched verbatim; no location at all searches everywhere.
pub fn location_scopes(resolver: &LocationResolver, requirement: &JobRequirement) -> Vec<LocationScope> {
    let Some(text) = requirement.primary_location() else {
        return vec![LocationScope::Anywhere];
    };

    let parsed = resolver.parse(text);
    if !parsed.is_resolved() {
        return vec![LocationScope::Raw(parsed.original)];
    }

    let mut scopes = Vec::with_capacity(3);
    if let Some(city) = parsed.city {
        scopes.push(LocationScope::City(city));
    }
    if let Some(state) = parsed.state {
        scopes.push(LocationScope::State(state));
    }
    if let Some(country) = parsed.country {
        scopes.push(LocationScope::Country(country));
    }
    scopes
}

pub struct SearchCriteriaBuilder<'a> {
    engine: &'a SkillConfidenceEngine,
    settings: &'a OrchestratorSettings,
    reference_date: NaiveDate,
}

impl<'a> SearchCriteriaBuilder<'a> {
    pub fn new(
        engine: &'a SkillConfidenceEngine,
        settings: &'a OrchestratorSettings,
        reference_date: NaiveDate,
    ) -> Self {
        Self {
            engine,
            settings,
            reference_date,
        }
    }

    pub fn build(&self, requirement: &JobRequirement, scope: LocationScope) -> SearchCriteria {
        let required_skills = canonical_skills(self.engine, requirement);
        let required_languages = self.languages(required_skills.iter().map(String::as_str));
        let preferred_languages: Vec<String> = self
            .languages(requirement.preferred_skills.iter().map(|s| s.trim()))
            .into_iter()
            .filter(|l| !required_languages.contains(l))
            .collect();

        let years = requirement.experience.min_years.filter(|years| *years > 0);
        let age_cutoff = years.and_then(|years| self.account_age_cutoff(years));
        if years.is_some() && age_cutoff.is_none() {
            warn!(?years, "Experience out of range, account age qualifier dropped");
        }
        let min_account_age_days = age_cutoff.map(|(days, _)| days);

        let min_public_repos = requirement
            .seniority
            .as_deref()
            .and_then(|label| self.activity_hint(label));

        let location_filter = scope.filter().map(str::to_string);

        let query = self.query(
            &required_languages,
            location_filter.as_deref(),
            min_public_repos,
            age_cutoff.map(|(_, cutoff)| cutoff),
        );

        SearchCriteria {
            required_languages,
            preferred_languages,
            scope,
            location_filter,
            min_account_age_days,
            min_public_repos,
            query,
        }
    }

    /// Platform languages for the given skills, deduplicated in first-seen order.
    fn languages<'s>(&self, skills: impl Iterator<Item = &'s str>) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for skill in skills.filter(|s| !s.is_empty()) {
            let canonical = self.engine.normalize(skill);
            if let Some(language) = self.engine.language_for(&canonical) {
                let language = language.to_lowercase();
                if !languages.contains(&language) {
                    languages.push(language);
                }
            }
        }
        languages
    }

    /// Minimum account age in days and the matching `created:<` date, if representable.
    fn account_age_cutoff(&self, years: u32) -> Option<(u32, NaiveDate)> {
        let days = years.checked_mul(DAYS_PER_YEAR)?;
        let cutoff = self
            .reference_date
            .checked_sub_signed(Duration::days(i64::from(days)))?;
        Some((days, cutoff))
    }

    /// Minimum public repositories for a seniority label ("Senior Backend" → senior).
    fn activity_hint(&self, label: &str) -> Option<u32> {
        let label = label.to_lowercase();
        label
            .split(|c: char| !c.is_alphanumeric())
            .find_map(|word| self.settings.seniority_activity.get(word).copied())
    }

    fn query(
        &self,
        languages: &[String],
        location: Option<&str>,
        min_public_repos: Option<u32>,
        created_before: Option<NaiveDate>,
    ) -> String {
        let mut terms: Vec<String> = languages
            .iter()
            .map(|language| format!("language:{}", quote_if_spaced(language)))
            .collect();

        if let Some(location) = location {
            terms.push(format!("location:\"{}\"", location.replace('"', "")));
        }
        if let Some(repos) = min_public_repos {
            terms.push(format!("repos:>={repos}"));
        }
        if let Some(cutoff) = created_before {
            terms.push(format!("created:<{}", cutoff.format("%Y-%m-%d")));
        }
        terms.push("type:user".to_string());

        terms.join(" ")
    }
}

fn quote_if_spaced(term: &str) -> String {
    if term.contains(' ') {
        format!("\"{term}\"")
    } else {
        term.to_string()
    }
}
