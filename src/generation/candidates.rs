//! Candidate model ranking and the per-run exclusion set.
//!
//! Resolution order:
//! 1. static priority list, filtered to models the endpoint currently lists
//!    with the required generation method
//! 2. discovered models containing the family hint, in listing order
//! 3. the configured default identifier
//!
//! Excluded models never appear at any stage. When discovery fails the
//! static list is used unfiltered.

use crate::config::GenerationConfig;
use crate::events::ExclusionReason;
use crate::llm::ModelInfo;

/// A model identifier plus its derived priority rank (lower is better).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidate {
    pub id: String,
    pub rank: usize,
}

/// Models taken out of rotation for the current generation run.
///
/// Only grows; dropped when the run ends.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<(String, ExclusionReason)>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `model`. Returns `false` if it was already excluded.
    pub fn exclude(&mut self, model: &str, reason: ExclusionReason) -> bool {
        if self.contains(model) {
            return false;
        }
        self.entries.push((model.to_string(), reason));
        true
    }

    pub fn contains(&self, model: &str) -> bool {
        self.entries.iter().any(|(m, _)| m == model)
    }

    pub fn reason(&self, model: &str) -> Option<ExclusionReason> {
        self.entries
            .iter()
            .find(|(m, _)| m == model)
            .map(|(_, r)| *r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Models excluded because of a daily quota signature.
    pub fn exhausted(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, r)| *r == ExclusionReason::QuotaExhausted)
            .map(|(m, _)| m.as_str())
    }
}

/// Build the ranked candidate list.
///
/// `discovered` is `None` when the listing call failed.
pub fn rank_candidates(
    discovered: Option<&[ModelInfo]>,
    config: &GenerationConfig,
    excluded: &ExclusionSet,
) -> Vec<ModelCandidate> {
    let mut ranked: Vec<ModelCandidate> = Vec::new();
    let push = |ranked: &mut Vec<ModelCandidate>, id: &str, rank: usize| {
        if !excluded.contains(id) && !ranked.iter().any(|c| c.id == id) {
            ranked.push(ModelCandidate {
                id: id.to_string(),
                rank,
            });
        }
    };

    match discovered {
        Some(models) => {
            let eligible: Vec<&str> = models
                .iter()
                .filter(|m| m.supports(&config.required_method))
                .map(|m| m.id())
                .collect();

            for (rank, preferred) in config.preferred_models.iter().enumerate() {
                if eligible.contains(&preferred.as_str()) {
                    push(&mut ranked, preferred.as_str(), rank);
                }
            }
            let family_rank = config.preferred_models.len();
            for id in eligible
                .iter()
                .filter(|id| !config.family_hint.is_empty() && id.contains(&config.family_hint))
            {
                push(&mut ranked, *id, family_rank);
            }
        }
        None => {
            for (rank, preferred) in config.preferred_models.iter().enumerate() {
                push(&mut ranked, preferred.as_str(), rank);
            }
        }
    }

    push(
        &mut ranked,
        config.default_model.as_str(),
        config.preferred_models.len() + 1,
    );
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: format!("models/{}", id),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig {
            preferred_models: vec!["fast".to_string(), "medium".to_string()],
            default_model: "fallback".to_string(),
            family_hint: "flash".to_string(),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn priority_list_filters_discovered_models() {
        let discovered = vec![
            model("medium", &["generateContent"]),
            model("fast", &["embedContent"]),
            model("x-flash-8b", &["generateContent"]),
            model("other", &["generateContent"]),
        ];
        let ranked = rank_candidates(Some(discovered.as_slice()), &config(), &ExclusionSet::new());
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["medium", "x-flash-8b", "fallback"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn excluded_models_are_never_ranked() {
        let discovered = vec![
            model("fast", &["generateContent"]),
            model("a-flash", &["generateContent"]),
        ];
        let mut excluded = ExclusionSet::new();
        excluded.exclude("fast", ExclusionReason::QuotaExhausted);
        excluded.exclude("fallback", ExclusionReason::NotFound);
        let ranked = rank_candidates(Some(discovered.as_slice()), &config(), &excluded);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a-flash"]);
    }

    #[test]
    fn failed_discovery_uses_static_list() {
        let ranked = rank_candidates(None, &config(), &ExclusionSet::new());
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["fast", "medium", "fallback"]);
    }

    #[test]
    fn everything_excluded_yields_empty_list() {
        let mut excluded = ExclusionSet::new();
        for id in ["fast", "medium", "fallback"] {
            excluded.exclude(id, ExclusionReason::NotFound);
        }
        assert!(rank_candidates(None, &config(), &excluded).is_empty());
    }

    #[test]
    fn exclusion_set_inserts_once() {
        let mut set = ExclusionSet::new();
        assert!(set.exclude("m", ExclusionReason::QuotaExhausted));
        assert!(!set.exclude("m", ExclusionReason::NotFound));
        assert_eq!(set.len(), 1);
        assert_eq!(set.reason("m"), Some(ExclusionReason::QuotaExhausted));
        assert_eq!(set.exhausted().collect::<Vec<_>>(), vec!["m"]);
    }
}
