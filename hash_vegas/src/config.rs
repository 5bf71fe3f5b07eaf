use std::{ops::RangeInclusive, time::Duration};

use serde::Deserialize;

use crate::{classify::Catalog, error::ConfigError, family::Family};

/// Read-only run configuration shared by every session
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Inclusive bounds of the secret prefix lengths to try
    pub secret_length_range: (usize, usize),
    /// Issuances per session before giving up on finding an extendable voucher
    pub issuance_retry_limit: usize,
    /// Bound on every network round trip
    pub redemption_timeout_ms: u64,
    pub parallel_sessions: usize,
    /// Total sessions opened over the whole run
    pub session_limit: usize,
    /// Families the oracle may sign with
    pub target_algorithms: Vec<Family>,
    /// Width the oracle cuts every signature to, when known
    pub oracle_truncation: Option<usize>,
    pub suffix: String,
    pub user: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_length_range: (0, 64),
            issuance_retry_limit: 16,
            redemption_timeout_ms: 5_000,
            parallel_sessions: 4,
            session_limit: 32,
            target_algorithms: Family::ALL.to_vec(),
            oracle_truncation: None,
            suffix: "|1000000000".into(),
            user: "guest".into(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = self.secret_length_range;
        if min > max {
            return Err(ConfigError::EmptyGuessRange { min, max });
        }
        for (name, value) in [
            ("issuance_retry_limit", self.issuance_retry_limit),
            ("parallel_sessions", self.parallel_sessions),
            ("session_limit", self.session_limit),
            ("redemption_timeout_ms", self.redemption_timeout_ms as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.target_algorithms.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(())
    }

    pub fn guesses(&self) -> RangeInclusive<usize> {
        self.secret_length_range.0..=self.secret_length_range.1
    }

    pub fn round_trip_timeout(&self) -> Duration {
        Duration::from_millis(self.redemption_timeout_ms)
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.target_algorithms.iter().copied()).with_truncation(self.oracle_truncation)
    }
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = Config::from_json(
        r#"{ "secret_length_range": [8, 24], "target_algorithms": ["sha1", "sha3-256"] }"#,
    )
    .unwrap();
    assert_eq!(config.guesses(), 8..=24);
    assert_eq!(config.target_algorithms, vec![Family::Sha1, Family::Sha3_256]);
    assert_eq!(config.parallel_sessions, 4);
    assert_eq!(config.suffix, "|1000000000");
}

#[test]
fn test_invalid_configs() {
    assert!(matches!(
        Config::from_json(r#"{ "secret_length_range": [9, 3] }"#),
        Err(ConfigError::EmptyGuessRange { min: 9, max: 3 })
    ));
    assert!(matches!(
        Config::from_json(r#"{ "parallel_sessions": 0 }"#),
        Err(ConfigError::Zero("parallel_sessions"))
    ));
    assert!(matches!(
        Config::from_json(r#"{ "target_algorithms": [] }"#),
        Err(ConfigError::NoTargets)
    ));
    assert!(matches!(
        Config::from_json(r#"{ "target_algorithms": ["md5"] }"#),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        Config::from_json(r#"{ "retries": 3 }"#),
        Err(ConfigError::Parse(_))
    ));
}
