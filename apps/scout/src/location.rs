//! Location resolution: free text → city/state/country, plus hierarchical matching.
//!
//! Exact lookups (after alias resolution) always win. A token with no exact hit is
//! corrected against the reference vocabulary by bounded Damerau-Levenshtein distance;
//! any match that relied on a correction is penalised. Results are deterministic.

use std::collections::HashMap;

use strsim::damerau_levenshtein;

use crate::models::candidate::{LocationHierarchy, MatchLevel};
use crate::settings::{CityEntry, LocationSettings, StateEntry};

enum Place<'a> {
    City(&'a CityEntry),
    State(&'a StateEntry),
    Country(&'a str),
}

pub struct LocationResolver {
    cities: HashMap<String, CityEntry>,
    states: HashMap<String, StateEntry>,
    countries: HashMap<String, String>,
    aliases: HashMap<String, String>,
    /// Every lookup key (names and alias variants), sorted so fuzzy ties break the same way.
    vocabulary: Vec<String>,
    settings: LocationSettings,
}

impl LocationResolver {
    pub fn new(settings: &LocationSettings) -> Self {
        let cities: HashMap<String, CityEntry> = settings
            .cities
            .iter()
            .map(|c| (normalize(&c.name), c.clone()))
            .collect();
        let states: HashMap<String, StateEntry> = settings
            .states
            .iter()
            .map(|s| (normalize(&s.name), s.clone()))
            .collect();
        let countries: HashMap<String, String> = settings
            .countries
            .iter()
            .map(|c| (normalize(c), c.clone()))
            .collect();
        let aliases: HashMap<String, String> = settings
            .aliases
            .iter()
            .map(|(variant, canonical)| (normalize(variant), normalize(canonical)))
            .collect();

        let mut vocabulary: Vec<String> = cities
            .keys()
            .chain(states.keys())
            .chain(countries.keys())
            .chain(aliases.keys())
            .cloned()
            .collect();
        vocabulary.sort();
        vocabulary.dedup();

        Self {
            cities,
            states,
            countries,
            aliases,
            vocabulary,
            settings: settings.clone(),
        }
    }

    /// Parses free text. Level and confidence describe how specific the resolution was.
    pub fn parse(&self, text: &str) -> LocationHierarchy {
        let mut hierarchy = LocationHierarchy {
            original: text.trim().to_string(),
            ..LocationHierarchy::default()
        };

        for segment in split_segments(text) {
            for token in segment_candidates(&segment) {
                let Some((place, fuzzy)) = self.resolve(&token) else {
                    continue;
                };
                hierarchy.fuzzy_corrected |= fuzzy;
                fill(&mut hierarchy, place);
                break;
            }
        }

        let level = finest_level(&hierarchy);
        hierarchy.match_level = level;
        hierarchy.confidence = self.confidence(level, hierarchy.fuzzy_corrected);
        hierarchy
    }

    /// Scores how well a candidate's location satisfies a searched location.
    pub fn match_location(
        &self,
        search: &LocationHierarchy,
        candidate: &LocationHierarchy,
    ) -> (MatchLevel, f64) {
        let fuzzy = search.fuzzy_corrected || candidate.fuzzy_corrected;

        let level = if same(&search.city, &candidate.city) {
            MatchLevel::City
        } else if same(&search.state, &candidate.state) {
            MatchLevel::State
        } else if same(&search.country, &candidate.country) {
            MatchLevel::Country
        } else {
            MatchLevel::None
        };

        if level != MatchLevel::None {
            return (level, self.confidence(level, fuzzy));
        }

        if search.is_resolved() && candidate.is_resolved() {
            return (MatchLevel::None, 0.0);
        }

        // At least one side is unparseable: compare the raw strings.
        match self.raw_match(&search.original, &candidate.original) {
            Some(raw_fuzzy) => (
                MatchLevel::Country,
                self.confidence(MatchLevel::Country, raw_fuzzy),
            ),
            None => (MatchLevel::None, 0.0),
        }
    }

    /// Best match of the candidate against any of the searched locations.
    pub fn best_match(
        &self,
        searches: &[LocationHierarchy],
        candidate: &LocationHierarchy,
    ) -> (MatchLevel, f64) {
        searches
            .iter()
            .map(|search| self.match_location(search, candidate))
            .fold((MatchLevel::None, 0.0), |best, current| {
                if current.1 > best.1 {
                    current
                } else {
                    best
                }
            })
    }

    /// Candidate hierarchy re-labelled with the outcome of matching it against `searches`.
    pub fn annotate(
        &self,
        searches: &[LocationHierarchy],
        candidate: &LocationHierarchy,
    ) -> LocationHierarchy {
        if searches.is_empty() {
            return candidate.clone();
        }
        let (match_level, confidence) = self.best_match(searches, candidate);
        LocationHierarchy {
            match_level,
            confidence,
            ..candidate.clone()
        }
    }

    fn confidence(&self, level: MatchLevel, fuzzy: bool) -> f64 {
        let table = &self.settings.confidence;
        let base = match level {
            MatchLevel::City => table.city,
            MatchLevel::State => table.state,
            MatchLevel::Country => table.country,
            MatchLevel::None => 0.0,
        };
        if fuzzy {
            base * self.settings.fuzzy_penalty
        } else {
            base
        }
    }

    fn resolve(&self, token: &str) -> Option<(Place<'_>, bool)> {
        if let Some(place) = self.lookup_exact(token) {
            return Some((place, false));
        }
        let corrected = self.correct(token)?;
        self.lookup_exact(corrected).map(|place| (place, true))
    }

    fn lookup_exact(&self, token: &str) -> Option<Place<'_>> {
        let key = self.aliases.get(token).map(String::as_str).unwrap_or(token);
        if let Some(city) = self.cities.get(key) {
            return Some(Place::City(city));
        }
        if let Some(state) = self.states.get(key) {
            return Some(Place::State(state));
        }
        self.countries.get(key).map(|c| Place::Country(c.as_str()))
    }

    /// Closest vocabulary entry within the allowed distance, if any.
    fn correct(&self, token: &str) -> Option<&str> {
        let max_distance = self.allowed_distance(token);
        if max_distance == 0 {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for word in &self.vocabulary {
            if word.chars().count() < self.settings.fuzzy_min_token_len {
                continue;
            }
            let distance = damerau_levenshtein(token, word);
            if distance <= max_distance && best.map_or(true, |(_, d)| distance < d) {
                best = Some((word.as_str(), distance));
            }
        }
        best.map(|(word, _)| word)
    }

    /// Short tokens tolerate fewer edits: one edit per four characters, up to the configured cap.
    fn allowed_distance(&self, token: &str) -> usize {
        let len = token.chars().count();
        if len < self.settings.fuzzy_min_token_len {
            return 0;
        }
        (len / 4).min(self.settings.fuzzy_max_distance)
    }

    /// `Some(false)` for exact containment, `Some(true)` for a fuzzy token hit.
    fn raw_match(&self, search: &str, candidate: &str) -> Option<bool> {
        let search = normalize(search);
        let candidate = normalize(candidate);
        if search.is_empty() || candidate.is_empty() {
            return None;
        }
        if candidate.contains(&search) || search.contains(&candidate) {
            return Some(false);
        }

        let candidate_tokens: Vec<String> = split_segments(&candidate)
            .iter()
            .flat_map(|s| s.split(' ').map(str::to_string).collect::<Vec<_>>())
            .collect();
        let fuzzy_hit = split_segments(&search).iter().any(|segment| {
            let max_distance = self.allowed_distance(segment);
            max_distance > 0
                && candidate_tokens
                    .iter()
                    .any(|token| damerau_levenshtein(segment, token) <= max_distance)
        });
        fuzzy_hit.then_some(true)
    }
}

fn same(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.eq_ignore_ascii_case(b))
}

fn fill(hierarchy: &mut LocationHierarchy, place: Place<'_>) {
    match place {
        Place::City(city) => {
            if hierarchy.city.is_none() {
                hierarchy.city = Some(city.name.clone());
                if let Some(state) = &city.state {
                    hierarchy.state = Some(state.clone());
                }
                hierarchy.country = Some(city.country.clone());
            }
        }
        Place::State(state) => {
            if hierarchy.state.is_none() {
                hierarchy.state = Some(state.name.clone());
            }
            if hierarchy.country.is_none() {
                hierarchy.country = Some(state.country.clone());
            }
        }
        Place::Country(country) => {
            if hierarchy.country.is_none() {
                hierarchy.country = Some(country.to_string());
            }
        }
    }
}

fn finest_level(hierarchy: &LocationHierarchy) -> MatchLevel {
    if hierarchy.city.is_some() {
        MatchLevel::City
    } else if hierarchy.state.is_some() {
        MatchLevel::State
    } else if hierarchy.country.is_some() {
        MatchLevel::Country
    } else {
        MatchLevel::None
    }
}

/// Lowercase, collapse whitespace, drop trailing dots.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_lowercase()
}

fn split_segments(text: &str) -> Vec<String> {
    text.replace(" - ", ",")
        .split(|c: char| matches!(c, ',' | '/' | '|' | ';' | '(' | ')' | '·'))
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whole segment first, then word pairs, then single words ("chennai india" → …).
fn segment_candidates(segment: &str) -> Vec<String> {
    let words: Vec<&str> = segment.split(' ').collect();
    let mut candidates = vec![segment.to_string()];
    if words.len() > 1 {
        candidates.extend(words.windows(2).map(|w| w.join(" ")));
        candidates.extend(words.iter().map(|w| w.to_string()));
    }
    candidates
}
