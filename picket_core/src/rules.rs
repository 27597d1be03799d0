//! Classification rule set and its hot-reloadable sources.
//!
//! The rule set is an external configuration collaborator: scoring reads it
//! fresh on every call (no caching) so that rule edits take effect
//! immediately. A load failure is a hard error for that scoring call only -
//! fusion state is never affected.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Priority;

/// Errors raised by a rule source.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule set unreadable: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("rule set malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Relative draw weights per priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// Inclusive score band for one priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: f64,
    pub max: f64,
}

/// Score bands per priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBands {
    pub low: ScoreBand,
    pub medium: ScoreBand,
    pub high: ScoreBand,
}

/// The classification rule set consumed by the scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub weights: PriorityWeights,
    pub bands: ScoreBands,

    /// Catalog the rationale strings are sampled from
    pub rationales: Vec<String>,

    /// Upper bound on rationale strings attached to one threat
    pub max_rationales: usize,
}

impl RuleSet {
    /// Band for the given priority.
    pub fn band(&self, priority: Priority) -> ScoreBand {
        match priority {
            Priority::Low => self.bands.low,
            Priority::Medium => self.bands.medium,
            Priority::High => self.bands.high,
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            weights: PriorityWeights {
                low: 0.55,
                medium: 0.30,
                high: 0.15,
            },
            bands: ScoreBands {
                low: ScoreBand {
                    min: 0.05,
                    max: 0.35,
                },
                medium: ScoreBand {
                    min: 0.36,
                    max: 0.70,
                },
                high: ScoreBand {
                    min: 0.71,
                    max: 0.95,
                },
            },
            rationales: vec![
                "High closing speed exceeds threshold".into(),
                "No AIS match (identity/attribution gap)".into(),
                "Altitude profile inconsistent with declared route".into(),
                "Emissions/identity mismatch across sensors".into(),
                "Rapid heading change within short interval".into(),
                "Surface contact without positive ID".into(),
                "Intermittent track quality / sensor disagreement".into(),
            ],
            max_rationales: 3,
        }
    }
}

/// Source of the classification rule set.
///
/// Implementations must return a fresh view on every call; the scoring
/// engine never caches the result.
pub trait RuleSource: Send + Sync {
    fn load(&self) -> Result<RuleSet, RuleError>;
}

/// JSON-file-backed rule source. Re-reads the file on every load, so edits
/// on disk take effect on the next scoring call.
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RuleSource for FileRuleSource {
    fn load(&self) -> Result<RuleSet, RuleError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Fixed in-memory rule source, for hosts and tests that don't hot-reload.
pub struct StaticRuleSource {
    rules: RuleSet,
}

impl StaticRuleSource {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }
}

impl Default for StaticRuleSource {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl RuleSource for StaticRuleSource {
    fn load(&self) -> Result<RuleSet, RuleError> {
        Ok(self.rules.clone())
    }
}
