//! Skill confidence: how sure we are that a candidate actually uses a skill.
//!
//! Primary signal: the skill is a direct dependency in one of the candidate's manifests.
//! Fallback: a weighted ensemble of topics, languages, profile text and repository names.
//! The two paths are a tagged `Detection`, so callers match on the variant instead of
//! inspecting error state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::models::candidate::SkillConfidence;
use crate::platform::{ManifestLookup, PlatformApi, QuotaPool, RateLimiter, RawProfile};
use crate::settings::SkillSettings;

pub const PRIMARY_SIGNAL: &str = "dependency_manifest";
pub const SIGNAL_TOPICS: &str = "repo_topics";
pub const SIGNAL_LANGUAGES: &str = "languages";
pub const SIGNAL_TEXT: &str = "bio_and_stars";
pub const SIGNAL_REPO_NAMES: &str = "repo_names";

/// Variants shorter than this are too ambiguous for free-text matching ("go", "js").
const MIN_TEXT_VARIANT_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalHit {
    pub name: &'static str,
    /// Normalised strength in [0, 1].
    pub strength: f64,
    pub weight: f64,
}

impl SignalHit {
    pub fn contribution(&self) -> f64 {
        self.strength * self.weight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Declared as a direct dependency in `repos`.
    Primary { score: f64, repos: Vec<String> },
    Fallback { score: f64, signals: Vec<SignalHit> },
}

impl Detection {
    pub fn score(&self) -> f64 {
        match self {
            Detection::Primary { score, .. } | Detection::Fallback { score, .. } => *score,
        }
    }

    /// `None` when no signal fired; such skills are not reported.
    pub fn into_confidence(self, skill: &str) -> Option<SkillConfidence> {
        match self {
            Detection::Primary { score, repos } => {
                debug!(skill, ?repos, "Primary detection");
                Some(SkillConfidence {
                    skill: skill.to_string(),
                    confidence: score,
                    detection_signals: vec![PRIMARY_SIGNAL.to_string()],
                    signal_weights: BTreeMap::from([(PRIMARY_SIGNAL.to_string(), score)]),
                    is_primary_detection: true,
                })
            }
            Detection::Fallback { score, signals } => {
                let fired: Vec<&SignalHit> = signals.iter().filter(|s| s.strength > 0.0).collect();
                if fired.is_empty() || score <= 0.0 {
                    return None;
                }
                Some(SkillConfidence {
                    skill: skill.to_string(),
                    confidence: score,
                    detection_signals: fired.iter().map(|s| s.name.to_string()).collect(),
                    signal_weights: fired
                        .iter()
                        .map(|s| (s.name.to_string(), s.contribution()))
                        .collect(),
                    is_primary_detection: false,
                })
            }
        }
    }
}

/// Skill synonyms, loaded once from settings.
pub struct SkillAliasTable {
    canonical_by_variant: HashMap<String, String>,
    variants_by_canonical: HashMap<String, Vec<String>>,
}

impl SkillAliasTable {
    pub fn new(aliases: &BTreeMap<String, Vec<String>>) -> Self {
        let mut canonical_by_variant = HashMap::new();
        let mut variants_by_canonical = HashMap::new();

        for (canonical, variants) in aliases {
            let canonical = canonical.trim().to_lowercase();
            let mut all: Vec<String> = variants.iter().map(|v| v.trim().to_lowercase()).collect();
            all.push(canonical.clone());
            all.sort();
            all.dedup();

            for variant in &all {
                canonical_by_variant.insert(variant.clone(), canonical.clone());
                canonical_by_variant.insert(compact(variant), canonical.clone());
            }
            variants_by_canonical.insert(canonical, all);
        }

        Self {
            canonical_by_variant,
            variants_by_canonical,
        }
    }

    /// Collapses equivalent spellings ("React.js", "reactjs") to one canonical name.
    pub fn normalize(&self, skill: &str) -> String {
        let lowered = skill.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        self.canonical_by_variant
            .get(&lowered)
            .or_else(|| self.canonical_by_variant.get(&compact(&lowered)))
            .cloned()
            .unwrap_or(lowered)
    }

    /// All spellings of a canonical skill, including itself.
    pub fn variants(&self, canonical: &str) -> Vec<String> {
        self.variants_by_canonical
            .get(canonical)
            .cloned()
            .unwrap_or_else(|| vec![canonical.to_string()])
    }
}

pub struct SkillConfidenceEngine {
    platform: Arc<dyn PlatformApi>,
    limiter: Arc<RateLimiter>,
    aliases: SkillAliasTable,
    settings: SkillSettings,
}

impl SkillConfidenceEngine {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        limiter: Arc<RateLimiter>,
        settings: &SkillSettings,
    ) -> Self {
        Self {
            platform,
            limiter,
            aliases: SkillAliasTable::new(&settings.aliases),
            settings: settings.clone(),
        }
    }

    pub fn normalize(&self, skill: &str) -> String {
        self.aliases.normalize(skill)
    }

    /// Platform language associated with a canonical skill, if any.
    pub fn language_for(&self, canonical: &str) -> Option<&str> {
        self.settings.languages.get(canonical).map(String::as_str)
    }

    /// Scores each canonical skill for one profile.
    pub async fn detect(
        &self,
        profile: &RawProfile,
        skills: &[String],
        degraded_mode: bool,
    ) -> BTreeMap<String, SkillConfidence> {
        let manifests = self.fetch_manifests(profile, degraded_mode).await;

        skills
            .iter()
            .filter_map(|skill| {
                let detection = self.classify(skill, &manifests, profile);
                let confidence = detection.into_confidence(skill)?;
                (confidence.confidence >= self.settings.min_reported_confidence)
                    .then(|| (skill.clone(), confidence))
            })
            .collect()
    }

    /// Manifests of the most-starred non-fork repositories.
    ///
    /// In degraded mode nothing is probed while the core pool is halted; those skills are
    /// scored by the ensemble alone.
    async fn fetch_manifests(
        &self,
        profile: &RawProfile,
        degraded_mode: bool,
    ) -> Vec<(String, ManifestLookup)> {
        if degraded_mode && self.limiter.is_halted(QuotaPool::Core) {
            debug!(username = %profile.username, "Core quota halted, manifest probes skipped");
            return Vec::new();
        }

        let mut repos: Vec<_> = profile.repos.iter().filter(|r| !r.is_fork).collect();
        repos.sort_by(|a, b| b.stars.cmp(&a.stars).then_with(|| a.name.cmp(&b.name)));
        repos.truncate(self.settings.manifest_repo_limit);

        let lookups = repos.iter().map(|repo| async move {
            let lookup = self
                .platform
                .fetch_dependency_manifest(&profile.username, &repo.name, degraded_mode)
                .await;
            (repo.name.clone(), lookup)
        });
        join_all(lookups).await
    }

    /// Chooses the primary path when the manifests declare the skill, else the ensemble.
    pub fn classify(
        &self,
        canonical: &str,
        manifests: &[(String, ManifestLookup)],
        profile: &RawProfile,
    ) -> Detection {
        let variants = self.aliases.variants(canonical);

        let declaring: Vec<String> = manifests
            .iter()
            .filter_map(|(repo, lookup)| match lookup {
                ManifestLookup::Found(deps) if declares(deps, &variants) => Some(repo.clone()),
                _ => None,
            })
            .collect();

        if !declaring.is_empty() {
            let range = &self.settings.primary_confidence;
            let score =
                (range.min + range.step * (declaring.len() - 1) as f64).clamp(range.min, range.max);
            return Detection::Primary {
                score,
                repos: declaring,
            };
        }

        self.ensemble(canonical, &variants, profile)
    }

    fn ensemble(&self, canonical: &str, variants: &[String], profile: &RawProfile) -> Detection {
        let weights = &self.settings.ensemble_weights;
        let text_variants: Vec<&String> = variants
            .iter()
            .filter(|v| v.chars().count() >= MIN_TEXT_VARIANT_LEN || v.contains(['#', '+']))
            .collect();

        let topic_repos = profile
            .repos
            .iter()
            .filter(|repo| {
                repo.topics
                    .iter()
                    .any(|topic| variants.iter().any(|v| compact(topic) == compact(v)))
            })
            .count();

        let languages = aggregate_languages(profile);
        let language_strength = if languages
            .iter()
            .any(|lang| variants.iter().any(|v| compact(lang) == compact(v)))
        {
            1.0
        } else if self
            .language_for(canonical)
            .is_some_and(|mapped| languages.iter().any(|lang| compact(lang) == compact(mapped)))
        {
            0.4
        } else {
            0.0
        };

        let text_strength = if profile
            .bio
            .as_deref()
            .is_some_and(|bio| mentions(bio, &text_variants))
        {
            1.0
        } else if profile.starred.iter().any(|s| {
            mentions(&s.name, &text_variants)
                || s.description
                    .as_deref()
                    .is_some_and(|d| mentions(d, &text_variants))
        }) {
            0.5
        } else {
            0.0
        };

        let named_repos = profile
            .repos
            .iter()
            .filter(|repo| {
                mentions(&repo.name, &text_variants)
                    || repo
                        .description
                        .as_deref()
                        .is_some_and(|d| mentions(d, &text_variants))
            })
            .count();

        let signals = vec![
            SignalHit {
                name: SIGNAL_TOPICS,
                strength: saturating_ratio(topic_repos, 2),
                weight: weights.topics,
            },
            SignalHit {
                name: SIGNAL_LANGUAGES,
                strength: language_strength,
                weight: weights.languages,
            },
            SignalHit {
                name: SIGNAL_TEXT,
                strength: text_strength,
                weight: weights.text,
            },
            SignalHit {
                name: SIGNAL_REPO_NAMES,
                strength: saturating_ratio(named_repos, 2),
                weight: weights.repo_names,
            },
        ];

        let score = signals
            .iter()
            .map(SignalHit::contribution)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        Detection::Fallback { score, signals }
    }
}

/// Languages across all repositories, deduplicated and sorted.
pub fn aggregate_languages(profile: &RawProfile) -> Vec<String> {
    let languages: BTreeSet<String> = profile
        .repos
        .iter()
        .flat_map(|repo| repo.primary_language.iter().chain(repo.languages.iter()))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    languages.into_iter().collect()
}

fn declares(deps: &BTreeSet<String>, variants: &[String]) -> bool {
    variants
        .iter()
        .any(|v| deps.contains(v) || deps.iter().any(|d| compact(d) == compact(v)))
}

fn saturating_ratio(count: usize, saturation: usize) -> f64 {
    (count as f64 / saturation as f64).min(1.0)
}

/// Lowercase with separators removed, so "Node.js", "node-js" and "nodejs" compare equal.
fn compact(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whole-word mention of any variant in free text.
fn mentions(text: &str, variants: &[&String]) -> bool {
    let tokens: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|t| t.trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return false;
    }
    let padded = format!(" {} ", tokens.join(" "));

    variants.iter().any(|variant| {
        if variant.contains(' ') {
            padded.contains(&format!(" {variant} "))
        } else {
            let wanted = compact(variant);
            tokens.iter().any(|t| *t == **variant || compact(t) == wanted)
        }
    })
}
