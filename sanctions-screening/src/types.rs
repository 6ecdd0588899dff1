//! Core types for sanctions screening

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of sanctioned party
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Natural person
    Individual,
    /// Company, bank, NGO, government body
    Organization,
    /// Ship (usually listed with an IMO number)
    Vessel,
    /// Anything else (aircraft, unknown)
    Other,
}

impl EntityType {
    /// Parse the store's free-form type column. Unknown values map to `Other`.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "individual" | "person" => EntityType::Individual,
            "organization" | "organisation" | "entity" | "company" => EntityType::Organization,
            "vessel" | "ship" => EntityType::Vessel,
            _ => EntityType::Other,
        }
    }
}

/// Structured identifier attached to a sanctioned entity, e.g. `("BIC", "BMJIIRTH")`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StructuredIdentifier {
    /// Identifier scheme (BIC, IBAN, IMO, ...)
    pub id_type: String,
    /// Identifier value as published
    pub value: String,
}

impl StructuredIdentifier {
    /// Create a new identifier
    pub fn new(id_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id_type: id_type.into(),
            value: value.into(),
        }
    }
}

/// A validated sanctions list entry. Immutable once inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SanctionedEntity {
    /// Unique key within a snapshot
    pub entry_id: String,
    /// Kind of party
    pub entity_type: EntityType,
    /// Primary names, never empty
    pub names: Vec<String>,
    /// Alternate names
    pub aliases: Vec<String>,
    /// ISO 3166 alpha-2 country code
    pub country: Option<String>,
    /// Issuing list, e.g. `OFAC`
    pub source: String,
    /// Programme / list type within the source, e.g. `SDN`
    pub list_type: Option<String>,
    /// Structured identifiers, compared by exact case-insensitive equality
    pub identifiers: Vec<StructuredIdentifier>,
    /// When the entry was ingested
    pub added_at: DateTime<Utc>,
}

/// Screening request for one payment (both counterparties)
///
/// Every field is optional; missing or blank fields are simply not screened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreeningRequest {
    /// Debtor name
    #[serde(alias = "sender_name")]
    pub sender_name: Option<String>,
    /// Debtor structured identifier (BIC, IBAN)
    #[serde(alias = "sender_identifier")]
    pub sender_identifier: Option<String>,
    /// Debtor country
    #[serde(alias = "sender_country")]
    pub sender_country: Option<String>,
    /// Creditor name
    #[serde(alias = "receiver_name")]
    pub receiver_name: Option<String>,
    /// Creditor structured identifier
    #[serde(alias = "receiver_identifier")]
    pub receiver_identifier: Option<String>,
    /// Creditor country
    #[serde(alias = "receiver_country")]
    pub receiver_country: Option<String>,
    /// Remittance information. Informational only, never matched.
    #[serde(alias = "payment_reference")]
    pub payment_reference: Option<String>,
}

impl ScreeningRequest {
    /// Request screening only the two party names
    pub fn names(sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            sender_name: Some(sender.into()),
            receiver_name: Some(receiver.into()),
            ..Default::default()
        }
    }

    /// Screenable fields in a fixed order, paired with their tag
    pub(crate) fn fields(&self) -> [(MatchedField, Option<&str>); 4] {
        [
            (MatchedField::SenderName, self.sender_name.as_deref()),
            (MatchedField::SenderIdentifier, self.sender_identifier.as_deref()),
            (MatchedField::ReceiverName, self.receiver_name.as_deref()),
            (MatchedField::ReceiverIdentifier, self.receiver_identifier.as_deref()),
        ]
    }

    /// Party countries that were supplied
    pub(crate) fn countries(&self) -> impl Iterator<Item = &str> {
        [self.sender_country.as_deref(), self.receiver_country.as_deref()]
            .into_iter()
            .flatten()
    }
}

/// Which request field produced a match
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    /// Debtor name
    SenderName,
    /// Debtor identifier
    SenderIdentifier,
    /// Creditor name
    ReceiverName,
    /// Creditor identifier
    ReceiverIdentifier,
}

impl MatchedField {
    /// True for the structured identifier fields
    pub fn is_identifier(&self) -> bool {
        matches!(
            self,
            MatchedField::SenderIdentifier | MatchedField::ReceiverIdentifier
        )
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchedField::SenderName => "sender_name",
            MatchedField::SenderIdentifier => "sender_identifier",
            MatchedField::ReceiverName => "receiver_name",
            MatchedField::ReceiverIdentifier => "receiver_identifier",
        }
    }
}

impl fmt::Display for MatchedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hit against the reference data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningMatch {
    /// Matched entity identifier
    pub entry_id: String,
    /// Reference text that matched (name, alias or identifier value)
    pub matched_name: String,
    /// Request field the hit came from
    pub matched_field: MatchedField,
    /// Similarity in [0.0, 1.0]
    pub match_score: f64,
    /// Issuing list of the matched entity
    pub source: String,
    /// True when the hit came from edit distance rather than exact/substring comparison
    pub fuzzy_match: bool,
}

/// Risk level of a screened payment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// No meaningful hit
    Low,
    /// Medium-confidence hit
    Medium,
    /// Exact or near-exact hit
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Action the admission pipeline should take, derived from a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningStatus {
    /// No hit
    Clear,
    /// Low-confidence hit, proceed
    Flagged,
    /// Hold for an analyst
    ManualReview,
    /// Do not move money
    Blocked,
}

/// Outcome of screening one payment. Created fresh per request, never persisted here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningResult {
    /// At least one match was found
    pub hit: bool,
    /// Aggregated risk level
    pub risk_level: RiskLevel,
    /// All matches, in field then snapshot order
    pub matches: Vec<ScreeningMatch>,
    /// Analyst review needed
    pub requires_review: bool,
    /// When screening ran
    pub screened_at: DateTime<Utc>,
}

impl ScreeningResult {
    /// Clean result with no matches
    pub fn clear() -> Self {
        Self {
            hit: false,
            risk_level: RiskLevel::Low,
            matches: Vec::new(),
            requires_review: false,
            screened_at: Utc::now(),
        }
    }

    /// Admission decision for this result
    pub fn status(&self) -> ScreeningStatus {
        if self.risk_level == RiskLevel::High {
            ScreeningStatus::Blocked
        } else if self.requires_review {
            ScreeningStatus::ManualReview
        } else if self.hit {
            ScreeningStatus::Flagged
        } else {
            ScreeningStatus::Clear
        }
    }

    /// Whether the payment may proceed without intervention
    pub fn is_approved(&self) -> bool {
        matches!(self.status(), ScreeningStatus::Clear | ScreeningStatus::Flagged)
    }

    /// Highest match score, 0.0 without matches
    pub fn max_score(&self) -> f64 {
        self.matches
            .iter()
            .map(|m| m.match_score)
            .fold(0.0, f64::max)
    }
}
