//! Match engine
//!
//! Each (query, reference name) pair yields at most one candidate, evaluated in
//! fixed precedence:
//!
//! 1. **Exact** - normalized strings equal
//! 2. **Substring** - one normalized string contains the other
//! 3. **Fuzzy** - edit distance within `fuzzy_threshold`
//!
//! Names and aliases are compared independently and all candidates are kept;
//! aggregation is the classifier's job. Structured identifiers only ever match
//! exactly, after case folding.
//!
//! A request field is screened with a full linear scan of the snapshot. There
//! is no index, which is fine for lists of a few thousand entries. A much
//! larger list would need a token or n-gram index in front of this.

use crate::config::MatchConfig;
use crate::distance::{levenshtein, similarity};
use crate::normalize::{fold_identifier, normalize_name};
use crate::snapshot::{ReferenceName, ReferenceSnapshot};
use crate::types::{MatchedField, SanctionedEntity, ScreeningMatch};

/// How a candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Normalized names equal
    Exact,
    /// One normalized name contains the other
    Substring,
    /// Edit distance within threshold
    Fuzzy,
    /// Structured identifier equal
    Identifier,
}

/// A single candidate match against one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Reference text as published (name, alias or identifier value)
    pub matched_name: String,
    /// Score in [0, 1]
    pub score: f64,
    /// Tier that produced the candidate
    pub tier: MatchTier,
}

impl Candidate {
    /// True when produced by edit distance
    pub fn is_fuzzy(&self) -> bool {
        self.tier == MatchTier::Fuzzy
    }
}

/// Tiered name and identifier matcher
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    config: MatchConfig,
}

impl MatchEngine {
    /// Create a matcher with the given tuning
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Tuning in use
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Compare a raw query against every name and alias of an entity
    pub fn find_matches(&self, query: &str, entity: &SanctionedEntity) -> Vec<Candidate> {
        let query = normalize_name(query);
        if query.is_empty() {
            return Vec::new();
        }
        let query_len = query.chars().count();
        entity
            .names
            .iter()
            .chain(entity.aliases.iter())
            .filter_map(|name| ReferenceName::new(name))
            .filter_map(|reference| self.compare_keyed(&query, query_len, &reference))
            .collect()
    }

    /// Compare a normalized query with one reference name
    pub fn compare(&self, query: &str, reference: &str) -> Option<Candidate> {
        let reference = ReferenceName::new(reference)?;
        self.compare_keyed(query, query.chars().count(), &reference)
    }

    fn compare_keyed(
        &self,
        query: &str,
        query_len: usize,
        reference: &ReferenceName,
    ) -> Option<Candidate> {
        let normalized = reference.normalized.as_str();
        if query.is_empty() {
            return None;
        }

        let (score, tier) = if query == normalized {
            (self.config.exact_score, MatchTier::Exact)
        } else if query.contains(normalized) || normalized.contains(query) {
            (self.config.substring_score, MatchTier::Substring)
        } else {
            if query_len.abs_diff(reference.char_len) > self.config.fuzzy_threshold {
                // Distance is at least the length difference
                return None;
            }
            let distance = levenshtein(query, normalized);
            if distance > self.config.fuzzy_threshold {
                return None;
            }
            (similarity(query, normalized, distance), MatchTier::Fuzzy)
        };

        Some(Candidate {
            matched_name: reference.raw.clone(),
            score,
            tier,
        })
    }

    /// Exact, case-insensitive identifier comparison
    pub fn match_identifier(&self, query: &str, entity: &SanctionedEntity) -> Vec<Candidate> {
        let folded = fold_identifier(query);
        if folded.is_empty() {
            return Vec::new();
        }
        entity
            .identifiers
            .iter()
            .filter(|id| fold_identifier(&id.value) == folded)
            .map(|id| self.identifier_candidate(&id.value))
            .collect()
    }

    fn identifier_candidate(&self, value: &str) -> Candidate {
        Candidate {
            matched_name: value.to_string(),
            score: self.config.exact_score,
            tier: MatchTier::Identifier,
        }
    }

    /// Screen one request field against the whole snapshot
    ///
    /// Reference names come pre-normalized from the snapshot; only the query
    /// is normalized here, once.
    pub fn scan(
        &self,
        field: MatchedField,
        query: &str,
        snapshot: &ReferenceSnapshot,
    ) -> Vec<ScreeningMatch> {
        let mut matches = Vec::new();

        if field.is_identifier() {
            let folded = fold_identifier(query);
            if folded.is_empty() {
                return matches;
            }
            for (entity, keys) in snapshot.keyed() {
                for (_, value) in keys.identifiers.iter().filter(|(f, _)| *f == folded) {
                    matches.push(to_match(field, entity, self.identifier_candidate(value)));
                }
            }
        } else {
            let normalized = normalize_name(query);
            if normalized.is_empty() {
                return matches;
            }
            let query_len = normalized.chars().count();
            for (entity, keys) in snapshot.keyed() {
                for reference in &keys.names {
                    if let Some(candidate) = self.compare_keyed(&normalized, query_len, reference) {
                        matches.push(to_match(field, entity, candidate));
                    }
                }
            }
        }

        matches
    }
}

fn to_match(field: MatchedField, entity: &SanctionedEntity, candidate: Candidate) -> ScreeningMatch {
    let fuzzy_match = candidate.is_fuzzy();
    ScreeningMatch {
        entry_id: entity.entry_id.clone(),
        matched_name: candidate.matched_name,
        matched_field: field,
        match_score: candidate.score,
        source: entity.source.clone(),
        fuzzy_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use crate::store::EntityRecord;
    use crate::types::{EntityType, StructuredIdentifier};
    use chrono::Utc;

    fn entity(names: &[&str], aliases: &[&str]) -> SanctionedEntity {
        SanctionedEntity {
            entry_id: "TEST-001".to_string(),
            entity_type: EntityType::Organization,
            names: names.iter().map(|s| s.to_string()).collect(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            country: None,
            source: "OFAC".to_string(),
            list_type: None,
            identifiers: vec![StructuredIdentifier::new("BIC", "SNCTIRTH")],
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_exact_match() {
        let engine = MatchEngine::default();
        let found = engine.find_matches("BLOCKED ENTITY INC", &entity(&["BLOCKED ENTITY INC"], &[]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].score, 1.0);
        assert_eq!(found[0].tier, MatchTier::Exact);
        assert!(!found[0].is_fuzzy());
    }

    #[test]
    fn test_exact_after_normalization() {
        let engine = MatchEngine::default();
        let found = engine.find_matches("blocked-entity, inc.", &entity(&["BLOCKED ENTITY INC"], &[]));
        assert_eq!(found[0].tier, MatchTier::Exact);
    }

    #[test]
    fn test_substring_match() {
        let engine = MatchEngine::default();
        let found =
            engine.find_matches("BLOCKED ENTITY INC USA", &entity(&["BLOCKED ENTITY INC"], &[]));
        assert_eq!(found.len(), 1);
        assert!(found[0].score >= 0.9);
        assert_eq!(found[0].tier, MatchTier::Substring);
        assert!(!found[0].is_fuzzy());

        // Either direction
        let found = engine.find_matches("BLOCKED", &entity(&["BLOCKED ENTITY INC"], &[]));
        assert_eq!(found[0].tier, MatchTier::Substring);
    }

    #[test]
    fn test_fuzzy_match() {
        let engine = MatchEngine::default();
        let found = engine.find_matches("BLOCKED ENTITI INC", &entity(&["BLOCKED ENTITY INC"], &[]));
        assert_eq!(found.len(), 1);
        assert!(found[0].is_fuzzy());
        assert!(found[0].score >= 0.8);
    }

    #[test]
    fn test_fuzzy_threshold_respected() {
        let engine = MatchEngine::default();
        assert!(engine
            .find_matches("COMPLETELY DIFFERENT", &entity(&["BLOCKED ENTITY INC"], &[]))
            .is_empty());

        let strict = MatchEngine::new(MatchConfig {
            fuzzy_threshold: 0,
            ..Default::default()
        });
        assert!(strict
            .find_matches("BLOCKED ENTITI INC", &entity(&["BLOCKED ENTITY INC"], &[]))
            .is_empty());
    }

    #[test]
    fn test_names_and_aliases_not_deduplicated() {
        let engine = MatchEngine::default();
        let e = entity(&["SANCTIONED BANK"], &["Sanctioned Bank", "SB"]);
        let found = engine.find_matches("sanctioned bank", &e);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].matched_name, "SANCTIONED BANK");
        assert_eq!(found[1].matched_name, "Sanctioned Bank");
    }

    #[test]
    fn test_empty_query_never_matches() {
        let engine = MatchEngine::default();
        let e = entity(&["SANCTIONED BANK"], &[]);
        assert!(engine.find_matches("", &e).is_empty());
        assert!(engine.find_matches(" ., ", &e).is_empty());
        assert!(engine.match_identifier("  ", &e).is_empty());
    }

    #[test]
    fn test_blank_reference_name_ignored() {
        let engine = MatchEngine::default();
        assert!(engine.compare("ANYTHING", "...").is_none());
    }

    #[test]
    fn test_identifier_match_is_exact_and_case_insensitive() {
        let engine = MatchEngine::default();
        let e = entity(&["SANCTIONED BANK"], &[]);

        let found = engine.match_identifier("sNcTiRtH", &e);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].score, 1.0);
        assert_eq!(found[0].tier, MatchTier::Identifier);
        assert!(!found[0].is_fuzzy());

        // No fuzzy or punctuation leniency for identifiers
        assert!(engine.match_identifier("SNCTIRTX", &e).is_empty());
        assert!(engine.match_identifier("SNCT-IRTH", &e).is_empty());
    }

    #[test]
    fn test_scan_tags_field_and_source() {
        let mut builder = SnapshotBuilder::new(1);
        builder
            .add_record(EntityRecord::new("A", "Sanctioned Bank", "OFAC"), vec![])
            .unwrap();
        builder
            .add_record(
                EntityRecord::new("B", "Unrelated Trading", "EU"),
                vec![StructuredIdentifier::new("BIC", "UNRLGB2L")],
            )
            .unwrap();
        let snapshot = builder.build();
        let engine = MatchEngine::default();

        let by_name = engine.scan(MatchedField::ReceiverName, "SANCTIONED BANK", &snapshot);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].entry_id, "A");
        assert_eq!(by_name[0].source, "OFAC");
        assert_eq!(by_name[0].matched_field, MatchedField::ReceiverName);

        let by_id = engine.scan(MatchedField::SenderIdentifier, "unrlgb2l", &snapshot);
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].entry_id, "B");
        assert_eq!(by_id[0].matched_name, "UNRLGB2L");
        assert_eq!(by_id[0].match_score, 1.0);

        // Identifier fields never go through name matching
        assert!(engine
            .scan(MatchedField::SenderIdentifier, "Sanctioned Bank", &snapshot)
            .is_empty());
    }

    #[test]
    fn test_scan_agrees_with_find_matches() {
        let record = EntityRecord::new("A", "Blocked Entity, Inc.", "UN")
            .with_alias("B.E.I.")
            .with_alias("blocked-entiti inc");
        let mut builder = SnapshotBuilder::new(1);
        builder.add_record(record, vec![]).unwrap();
        let snapshot = builder.build();
        let engine = MatchEngine::default();

        let scanned = engine.scan(MatchedField::SenderName, "BLOCKED ENTITY INC", &snapshot);
        let direct = engine.find_matches("BLOCKED ENTITY INC", snapshot.get("A").unwrap());
        assert_eq!(scanned.len(), direct.len());
        for (s, d) in scanned.iter().zip(direct.iter()) {
            assert_eq!(s.matched_name, d.matched_name);
            assert_eq!(s.match_score, d.score);
            assert_eq!(s.fuzzy_match, d.is_fuzzy());
        }
        // Published spelling is reported, not the normalized key
        assert_eq!(scanned[0].matched_name, "Blocked Entity, Inc.");
        assert_eq!(scanned[1].matched_name, "blocked-entiti inc");
        assert!(scanned[1].fuzzy_match);
    }
}
