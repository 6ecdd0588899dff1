//! Risk classification of screening matches

use crate::config::RiskPolicy;
use crate::types::{RiskLevel, ScreeningMatch};

/// Aggregated verdict for a set of matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Risk level
    pub risk_level: RiskLevel,
    /// Analyst review needed
    pub requires_review: bool,
}

/// Turns the matches of both counterparties into a risk level and review flag
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    policy: RiskPolicy,
}

impl RiskClassifier {
    /// Create a classifier with the given policy
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    /// Policy in use
    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Classify all matches of a request
    pub fn classify(&self, matches: &[ScreeningMatch]) -> Classification {
        let exact_hit = matches
            .iter()
            .any(|m| m.match_score >= 1.0 && !m.fuzzy_match);
        let max_score = matches.iter().map(|m| m.match_score).fold(0.0, f64::max);

        let risk_level = if exact_hit || max_score >= self.policy.high_score {
            RiskLevel::High
        } else if max_score >= self.policy.medium_score {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        // Several medium-confidence hits need a human even when none is strong
        let medium_hits = matches
            .iter()
            .filter(|m| m.match_score >= self.policy.multi_hit_score)
            .count();
        let requires_review =
            max_score >= self.policy.review_score || medium_hits >= self.policy.multi_hit_count;

        Classification {
            risk_level,
            requires_review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchedField;

    fn hit(score: f64, fuzzy: bool) -> ScreeningMatch {
        ScreeningMatch {
            entry_id: "E".to_string(),
            matched_name: "NAME".to_string(),
            matched_field: MatchedField::SenderName,
            match_score: score,
            source: "OFAC".to_string(),
            fuzzy_match: fuzzy,
        }
    }

    fn classify(matches: &[ScreeningMatch]) -> (RiskLevel, bool) {
        let c = RiskClassifier::default().classify(matches);
        (c.risk_level, c.requires_review)
    }

    #[test]
    fn test_no_matches_is_low() {
        assert_eq!(classify(&[]), (RiskLevel::Low, false));
    }

    #[test]
    fn test_exact_hit_is_high_with_review() {
        assert_eq!(classify(&[hit(1.0, false)]), (RiskLevel::High, true));
    }

    #[test]
    fn test_strong_fuzzy_is_high_with_review() {
        assert_eq!(classify(&[hit(0.95, true)]), (RiskLevel::High, true));
    }

    #[test]
    fn test_single_medium_hit() {
        assert_eq!(classify(&[hit(0.75, true)]), (RiskLevel::Medium, false));
    }

    #[test]
    fn test_multiple_medium_hits_require_review() {
        assert_eq!(
            classify(&[hit(0.72, true), hit(0.75, true)]),
            (RiskLevel::Medium, true)
        );
    }

    #[test]
    fn test_weak_hit_is_low() {
        assert_eq!(classify(&[hit(0.6, true)]), (RiskLevel::Low, false));
        assert_eq!(classify(&[hit(0.6, true), hit(0.65, true)]), (RiskLevel::Low, false));
    }

    #[test]
    fn test_policy_is_configurable() {
        let classifier = RiskClassifier::new(RiskPolicy {
            high_score: 0.8,
            medium_score: 0.5,
            review_score: 0.95,
            multi_hit_score: 0.5,
            multi_hit_count: 3,
        });

        let c = classifier.classify(&[hit(0.85, true)]);
        assert_eq!(c.risk_level, RiskLevel::High);
        assert!(!c.requires_review);

        let c = classifier.classify(&[hit(0.6, true), hit(0.6, true)]);
        assert_eq!(c.risk_level, RiskLevel::Medium);
        assert!(!c.requires_review);
    }
}
