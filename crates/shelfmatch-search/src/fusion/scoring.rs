//! Score combination, match-quality buckets, and explanations.
//!
//! | Final score   | Quality    |
//! |---------------|------------|
//! | >= 85         | `HIGH`     |
//! | 60..85        | `MEDIUM`   |
//! | 40..60        | `LOW`      |
//! | < 40          | `VERY_LOW` |
//!
//! Weights and thresholds come from the `[search]` config section.

use serde::{Deserialize, Serialize};
use shelfmatch_core::config::SearchConfig;
use std::fmt;

/// Component score above which an explanation calls a signal strong.
const STRONG_SIGNAL: f64 = 70.0;
/// Component score above which an explanation mentions a signal at all.
const PARTIAL_SIGNAL: f64 = 40.0;

/// Weights, quality thresholds, and retrieval depth for fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub low_threshold: f64,
    /// Cap on candidates pulled from each index.
    pub max_retrieve: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for FusionConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            semantic_weight: config.semantic_weight,
            lexical_weight: config.lexical_weight,
            high_threshold: config.high_threshold,
            medium_threshold: config.medium_threshold,
            low_threshold: config.low_threshold,
            max_retrieve: config.max_retrieve,
        }
    }
}

/// Coarse confidence bucket of a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchQuality {
    High,
    Medium,
    Low,
    VeryLow,
}

impl MatchQuality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::VeryLow => "VERY_LOW",
        }
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `semantic_weight * semantic + lexical_weight * lexical`, unrounded.
#[must_use]
pub fn final_score(semantic: f64, lexical: f64, config: &FusionConfig) -> f64 {
    config.semantic_weight * semantic + config.lexical_weight * lexical
}

/// Bucket a fused score. Pure function of `score` and the thresholds.
#[must_use]
pub fn classify(score: f64, config: &FusionConfig) -> MatchQuality {
    if score >= config.high_threshold {
        MatchQuality::High
    } else if score >= config.medium_threshold {
        MatchQuality::Medium
    } else if score >= config.low_threshold {
        MatchQuality::Low
    } else {
        MatchQuality::VeryLow
    }
}

/// Human-readable reason for a match, built from the component scores.
#[must_use]
pub fn explain(semantic: f64, lexical: f64) -> String {
    let mut clauses = Vec::with_capacity(2);

    if semantic > STRONG_SIGNAL {
        clauses.push("Strong semantic similarity");
    } else if semantic > PARTIAL_SIGNAL {
        clauses.push("Moderate semantic similarity");
    }

    if lexical > STRONG_SIGNAL {
        clauses.push("Strong keyword match");
    } else if lexical > PARTIAL_SIGNAL {
        clauses.push("Partial keyword match");
    }

    if clauses.is_empty() {
        "Weak match".to_string()
    } else {
        clauses.join(" + ")
    }
}

/// Candidates to pull from each index for a request of `k`: `min(3k, cap)`.
#[must_use]
pub fn retrieve_depth(k: usize, max_retrieve: usize) -> usize {
    k.saturating_mul(3).min(max_retrieve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_weights_and_thresholds() {
        let config = FusionConfig::default();
        assert!((config.semantic_weight - 0.7).abs() < f64::EPSILON);
        assert!((config.lexical_weight - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.max_retrieve, 20);
    }

    #[test]
    fn classify_boundaries() {
        let config = FusionConfig::default();
        assert_eq!(classify(85.0, &config), MatchQuality::High);
        assert_eq!(classify(84.99, &config), MatchQuality::Medium);
        assert_eq!(classify(60.0, &config), MatchQuality::Medium);
        assert_eq!(classify(59.99, &config), MatchQuality::Low);
        assert_eq!(classify(40.0, &config), MatchQuality::Low);
        assert_eq!(classify(39.99, &config), MatchQuality::VeryLow);
        assert_eq!(classify(0.0, &config), MatchQuality::VeryLow);
    }

    #[test]
    fn explanations() {
        assert_eq!(explain(90.0, 80.0), "Strong semantic similarity + Strong keyword match");
        assert_eq!(explain(50.0, 0.0), "Moderate semantic similarity");
        assert_eq!(explain(0.0, 45.0), "Partial keyword match");
        assert_eq!(explain(70.0, 40.0), "Weak match");
    }

    #[test]
    fn retrieve_depth_is_capped() {
        assert_eq!(retrieve_depth(1, 20), 3);
        assert_eq!(retrieve_depth(5, 20), 15);
        assert_eq!(retrieve_depth(10, 20), 20);
        assert_eq!(retrieve_depth(usize::MAX, 20), 20);
    }

    #[test]
    fn quality_serializes_screaming_snake() {
        let json = serde_json::to_string(&MatchQuality::VeryLow).expect("serialize");
        assert_eq!(json, "\"VERY_LOW\"");
        assert_eq!(MatchQuality::High.to_string(), "HIGH");
    }

    proptest! {
        #[test]
        fn final_score_monotonic_in_each_component(
            s in 0.0_f64..=100.0,
            l in 0.0_f64..=100.0,
            delta in 0.0_f64..=50.0,
            ws in 0.01_f64..=2.0,
            wl in 0.01_f64..=2.0,
        ) {
            let config = FusionConfig {
                semantic_weight: ws,
                lexical_weight: wl,
                ..FusionConfig::default()
            };
            let base = final_score(s, l, &config);
            prop_assert!(final_score(s + delta, l, &config) >= base);
            prop_assert!(final_score(s, l + delta, &config) >= base);
        }

        #[test]
        fn buckets_partition_the_scale(score in 0.0_f64..=100.0) {
            let config = FusionConfig::default();
            let quality = classify(score, &config);
            let expected = if score >= 85.0 {
                MatchQuality::High
            } else if score >= 60.0 {
                MatchQuality::Medium
            } else if score >= 40.0 {
                MatchQuality::Low
            } else {
                MatchQuality::VeryLow
            };
            prop_assert_eq!(quality, expected);
        }
    }
}
