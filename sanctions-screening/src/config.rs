//! Configuration for the screening engine
//!
//! Defaults reproduce the production policy. Every value can be overridden from
//! a TOML file and/or `SCREENING_*` environment variables.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Screening engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Match engine tuning
    pub matching: MatchConfig,

    /// Risk classification policy
    pub risk: RiskPolicy,

    /// Snapshot refresh schedule
    pub refresh: RefreshConfig,

    /// Countries that force manual review whenever a party from them has a hit
    pub high_risk_countries: Vec<String>,

    /// Backing store
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "sanctions-screening".to_string(),
            matching: MatchConfig::default(),
            risk: RiskPolicy::default(),
            refresh: RefreshConfig::default(),
            high_risk_countries: Vec::new(),
            store: StoreConfig::default(),
        }
    }
}

/// Match engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Maximum edit distance for a fuzzy candidate
    pub fuzzy_threshold: usize,

    /// Score of an exact (normalized) name or identifier hit
    pub exact_score: f64,

    /// Score when one name contains the other
    pub substring_score: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 3,
            exact_score: 1.0,
            substring_score: 0.9,
        }
    }
}

/// Risk classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Any match at or above this is HIGH
    pub high_score: f64,

    /// Any match at or above this is at least MEDIUM
    pub medium_score: f64,

    /// Any single match at or above this requires review
    pub review_score: f64,

    /// Score counted towards the multiple-hit review rule
    pub multi_hit_score: f64,

    /// Number of matches at or above `multi_hit_score` that requires review
    pub multi_hit_count: usize,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            high_score: 0.9,
            medium_score: 0.7,
            review_score: 0.9,
            multi_hit_score: 0.7,
            multi_hit_count: 2,
        }
    }
}

/// Snapshot refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes
    pub interval_secs: u64,

    /// Run the timer loop at all (explicit refreshes still work)
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600, // 1 hour
            enabled: true,
        }
    }
}

impl RefreshConfig {
    /// Refresh interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Where reference data comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store, empty unless populated by the embedding application
    Memory,

    /// Consolidated list exported as two CSV files
    Csv {
        /// Entities file
        entities_path: PathBuf,
        /// Structured identifiers file
        identifiers_path: PathBuf,
    },

    /// Postgres reference tables
    Postgres {
        /// Connection URL
        url: String,
        /// Pool size
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

impl Config {
    /// Load from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SCREENING_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u64>("SCREENING_REFRESH_INTERVAL_SECS")? {
            self.refresh.interval_secs = v;
        }
        if let Some(v) = env_parse::<bool>("SCREENING_REFRESH_ENABLED")? {
            self.refresh.enabled = v;
        }
        if let Some(v) = env_parse::<usize>("SCREENING_FUZZY_THRESHOLD")? {
            self.matching.fuzzy_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("SCREENING_HIGH_SCORE")? {
            self.risk.high_score = v;
        }
        if let Some(v) = env_parse::<f64>("SCREENING_MEDIUM_SCORE")? {
            self.risk.medium_score = v;
        }
        if let Some(v) = env_parse::<f64>("SCREENING_REVIEW_SCORE")? {
            self.risk.review_score = v;
        }
        if let Some(v) = env_parse::<f64>("SCREENING_MULTI_HIT_SCORE")? {
            self.risk.multi_hit_score = v;
        }
        if let Some(v) = env_parse::<usize>("SCREENING_MULTI_HIT_COUNT")? {
            self.risk.multi_hit_count = v;
        }
        if let Ok(list) = std::env::var("SCREENING_HIGH_RISK_COUNTRIES") {
            self.high_risk_countries = list
                .split(',')
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Ok(url) = std::env::var("SCREENING_DATABASE_URL") {
            self.store = StoreConfig::Postgres {
                url,
                max_connections: default_max_connections(),
            };
        }

        Ok(())
    }

    /// Reject configurations the classifier cannot work with
    pub fn validate(&self) -> Result<()> {
        let scores = [
            ("matching.exact_score", self.matching.exact_score),
            ("matching.substring_score", self.matching.substring_score),
            ("risk.high_score", self.risk.high_score),
            ("risk.medium_score", self.risk.medium_score),
            ("risk.review_score", self.risk.review_score),
            ("risk.multi_hit_score", self.risk.multi_hit_score),
        ];
        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.risk.medium_score > self.risk.high_score {
            return Err(Error::Config(format!(
                "risk.medium_score ({}) exceeds risk.high_score ({})",
                self.risk.medium_score, self.risk.high_score
            )));
        }

        if self.risk.multi_hit_count == 0 {
            return Err(Error::Config("risk.multi_hit_count must be at least 1".to_string()));
        }

        if self.refresh.interval_secs == 0 {
            return Err(Error::Config("refresh.interval_secs must be positive".to_string()));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "sanctions-screening");
        assert_eq!(config.matching.fuzzy_threshold, 3);
        assert_eq!(config.risk.high_score, 0.9);
        assert_eq!(config.risk.medium_score, 0.7);
        assert_eq!(config.refresh.interval(), Duration::from_secs(3600));
        assert_eq!(config.store, StoreConfig::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            high_risk_countries = ["IR", "KP"]

            [matching]
            fuzzy_threshold = 2

            [risk]
            medium_score = 0.75

            [refresh]
            interval_secs = 600

            [store]
            kind = "csv"
            entities_path = "/data/entities.csv"
            identifiers_path = "/data/identifiers.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.matching.fuzzy_threshold, 2);
        assert_eq!(config.matching.substring_score, 0.9);
        assert_eq!(config.risk.medium_score, 0.75);
        assert_eq!(config.risk.high_score, 0.9);
        assert_eq!(config.refresh.interval_secs, 600);
        assert_eq!(config.high_risk_countries, vec!["IR", "KP"]);
        assert!(matches!(config.store, StoreConfig::Csv { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_policy() {
        let mut config = Config::default();
        config.risk.high_score = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.risk.medium_score = 0.95;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.risk.multi_hit_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.refresh.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    // Only test touching SCREENING_* variables; keep it that way.
    #[test]
    fn test_file_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screening.toml");
        std::fs::write(&path, "[matching]\nfuzzy_threshold = 2\n\n[refresh]\ninterval_secs = 60\n").unwrap();

        std::env::set_var("SCREENING_FUZZY_THRESHOLD", "1");
        std::env::set_var("SCREENING_HIGH_RISK_COUNTRIES", "ir, kp,,sy");
        let config = Config::from_file(&path);
        std::env::set_var("SCREENING_MULTI_HIT_COUNT", "many");
        let bad = Config::from_env();
        std::env::remove_var("SCREENING_FUZZY_THRESHOLD");
        std::env::remove_var("SCREENING_HIGH_RISK_COUNTRIES");
        std::env::remove_var("SCREENING_MULTI_HIT_COUNT");

        let config = config.unwrap();
        assert_eq!(config.matching.fuzzy_threshold, 1);
        assert_eq!(config.refresh.interval_secs, 60);
        assert_eq!(config.high_risk_countries, vec!["IR", "KP", "SY"]);
        assert!(matches!(bad, Err(Error::Config(_))));
    }
}
