//! Prediction scoring.
//!
//! ```text
//! score = 0.30 * min(1, frequency / 10)
//!       + 0.20 * max(0, 1 - elapsed_secs / 86400)
//!       + 0.20 * (1.0 if test_type seen else 0.5)
//!       + 0.15 * difficulty_score
//!       + 0.15 * (1 - success_rate)
//! ```

use chrono::{DateTime, Utc};
use lexis_core::constants::{FREQUENCY_SATURATION, SECONDS_PER_DAY};
use lexis_core::UsagePattern;
use serde::{Deserialize, Serialize};

pub const WEIGHT_FREQUENCY: f64 = 0.30;
pub const WEIGHT_RECENCY: f64 = 0.20;
pub const WEIGHT_CONTEXT: f64 = 0.20;
pub const WEIGHT_DIFFICULTY: f64 = 0.15;
pub const WEIGHT_STRUGGLE: f64 = 0.15;

/// Context factor for a text never seen in the current test type.
const UNSEEN_CONTEXT_FACTOR: f64 = 0.5;

/// Weighted contribution of each factor. `total` is their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub frequency: f64,
    pub recency: f64,
    pub context: f64,
    pub difficulty: f64,
    pub struggle: f64,
    pub total: f64,
}

/// A text proposed for pre-fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCandidate {
    /// Normalized text.
    pub text: String,
    /// Score in [0, 1].
    pub score: f64,
}

pub fn score_breakdown(pattern: &UsagePattern, test_type: &str, now: DateTime<Utc>) -> ScoreBreakdown {
    // Future timestamps count as "just used".
    let elapsed = ((now - pattern.last_used).num_milliseconds().max(0)) as f64 / 1000.0;

    let frequency = WEIGHT_FREQUENCY * (pattern.frequency as f64 / FREQUENCY_SATURATION).min(1.0);
    let recency = WEIGHT_RECENCY * (1.0 - elapsed / SECONDS_PER_DAY).max(0.0);
    let context = WEIGHT_CONTEXT
        * if pattern.seen_in(test_type) {
            1.0
        } else {
            UNSEEN_CONTEXT_FACTOR
        };
    let difficulty = WEIGHT_DIFFICULTY * pattern.difficulty_score;
    let struggle = WEIGHT_STRUGGLE * (1.0 - pattern.success_rate);

    ScoreBreakdown {
        frequency,
        recency,
        context,
        difficulty,
        struggle,
        total: frequency + recency + context + difficulty + struggle,
    }
}

pub fn score(pattern: &UsagePattern, test_type: &str, now: DateTime<Utc>) -> f64 {
    score_breakdown(pattern, test_type, now).total
}

/// Score every pattern not rejected by `exclude` and keep the best `max`.
/// Ties keep the input order.
pub fn rank<'a>(
    patterns: impl IntoIterator<Item = (&'a str, &'a UsagePattern)>,
    test_type: &str,
    max: usize,
    now: DateTime<Utc>,
    mut exclude: impl FnMut(&str) -> bool,
) -> Vec<PredictionCandidate> {
    let mut candidates: Vec<PredictionCandidate> = patterns
        .into_iter()
        .filter(|(text, _)| !exclude(*text))
        .map(|(text, pattern)| PredictionCandidate {
            text: text.to_string(),
            score: score(pattern, test_type, now),
        })
        .collect();
    // Stable sort: equal scores keep insertion order.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(max);
    candidates
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn pattern(frequency: u64, hours_ago: i64, now: DateTime<Utc>) -> UsagePattern {
        let mut p = UsagePattern::new(now - Duration::hours(hours_ago));
        p.frequency = frequency;
        p
    }

    #[test]
    fn fresh_neutral_pattern_scores_expected_total() {
        let now = Utc::now();
        let p = pattern(0, 0, now);
        let b = score_breakdown(&p, "synonym", now);
        assert_eq!(b.frequency, 0.0);
        assert!((b.recency - 0.20).abs() < 1e-9);
        assert!((b.context - 0.10).abs() < 1e-9);
        assert!((b.difficulty - 0.075).abs() < 1e-9);
        assert!((b.struggle - 0.075).abs() < 1e-9);
        assert!((b.total - 0.45).abs() < 1e-9);
    }

    #[test]
    fn frequency_saturates_at_ten() {
        let now = Utc::now();
        let ten = score(&pattern(10, 0, now), "t", now);
        let fifty = score(&pattern(50, 0, now), "t", now);
        assert_eq!(ten, fifty);
    }

    #[test]
    fn recency_vanishes_after_a_day() {
        let now = Utc::now();
        let b = score_breakdown(&pattern(1, 30, now), "t", now);
        assert_eq!(b.recency, 0.0);
        let b = score_breakdown(&pattern(1, 12, now), "t", now);
        assert!((b.recency - 0.10).abs() < 1e-3);
    }

    #[test]
    fn future_last_used_counts_as_now() {
        let now = Utc::now();
        let mut p = pattern(1, 0, now);
        p.last_used = now + Duration::hours(5);
        assert!((score_breakdown(&p, "t", now).recency - WEIGHT_RECENCY).abs() < 1e-9);
    }

    #[test]
    fn seen_test_type_doubles_context_factor() {
        let now = Utc::now();
        let mut p = pattern(1, 0, now);
        p.test_types.insert("spelling".into());
        assert!((score_breakdown(&p, "spelling", now).context - 0.20).abs() < 1e-9);
        assert!((score_breakdown(&p, "synonym", now).context - 0.10).abs() < 1e-9);
    }

    #[test]
    fn rank_excludes_truncates_and_keeps_tie_order() {
        let now = Utc::now();
        let same = pattern(3, 1, now);
        let strong = pattern(9, 0, now);
        let patterns = vec![
            ("b", same.clone()),
            ("a", same.clone()),
            ("top", strong),
            ("skip", same),
        ];
        let ranked = rank(
            patterns.iter().map(|(t, p)| (*t, p)),
            "t",
            3,
            now,
            |text| text == "skip",
        );
        let texts: Vec<_> = ranked.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["top", "b", "a"]);
    }

    #[test]
    fn rank_with_zero_max_is_empty() {
        let now = Utc::now();
        let p = pattern(1, 0, now);
        assert!(rank([("a", &p)], "t", 0, now, |_| false).is_empty());
    }
}
