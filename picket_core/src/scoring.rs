//! The "SCORING" Engine - Threat Assessment Layer
//!
//! Maintains exactly one threat record per scored track (upsert semantics)
//! and a capacity-bounded active set. The classification procedure is
//! policy-pluggable via `ThreatClassifier`; the reference policy is a
//! weighted random draw standing in for a real rule/ML-based classifier.

use chrono::{DateTime, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Priority, RecommendedAction, Threat, Track};
use crate::rules::RuleSet;

// ============================================================================
// THREAT ID DERIVATION
// ============================================================================

/// Derive a threat id from a track id.
///
/// Deterministic so the same track always maps to the same threat record:
/// `TRK-000001` -> `THR-000001`; ids without the `TRK-` prefix get `THR-`
/// prepended to the whole id.
pub fn threat_id_for(track_id: &str) -> String {
    match track_id.strip_prefix("TRK-") {
        Some(rest) => format!("THR-{}", rest),
        None => format!("THR-{}", track_id),
    }
}

// ============================================================================
// CLASSIFICATION POLICY
// ============================================================================

/// Output of one classification pass.
#[derive(Debug, Clone)]
pub struct Classification {
    pub priority: Priority,
    pub score: f64,
    pub rationale: Vec<String>,
    pub recommended_action: RecommendedAction,
}

/// Pluggable classification strategy.
///
/// The engine is agnostic to which policy is installed; this is the natural
/// extension point for a real rule- or model-based classifier.
pub trait ThreatClassifier: Send {
    fn classify(&mut self, track: &Track, rules: &RuleSet) -> Classification;
}

/// Reference policy: weighted random priority draw, uniform score within the
/// priority's band (rounded to 2 decimals), 1-3 rationale strings sampled
/// without replacement from the rule set's catalog.
///
/// The non-determinism is a property of this policy, not of the engine;
/// seed it for reproducible runs.
pub struct WeightedRandomClassifier {
    rng: StdRng,
}

impl WeightedRandomClassifier {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn round2(x: f64) -> f64 {
        (x * 100.0).round() / 100.0
    }
}

impl Default for WeightedRandomClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreatClassifier for WeightedRandomClassifier {
    fn classify(&mut self, _track: &Track, rules: &RuleSet) -> Classification {
        const PRIORITIES: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

        let weights = [rules.weights.low, rules.weights.medium, rules.weights.high];
        let priority = match WeightedIndex::new(weights) {
            Ok(dist) => PRIORITIES[dist.sample(&mut self.rng)],
            // Degenerate weights (all zero/negative): fall back to LOW
            Err(_) => Priority::Low,
        };

        let band = rules.band(priority);
        let score = Self::round2(self.rng.gen_range(band.min..=band.max));

        let upper = rules.max_rationales.max(1).min(rules.rationales.len().max(1));
        let n = self.rng.gen_range(1..=upper).min(rules.rationales.len());
        let rationale: Vec<String> = rules
            .rationales
            .choose_multiple(&mut self.rng, n)
            .cloned()
            .collect();

        Classification {
            priority,
            score,
            rationale,
            recommended_action: priority.default_action(),
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the ScoringEngine
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Maximum number of active threats before eviction (default: 10)
    pub capacity: usize,

    /// Maximum number of threats returned by a list call (default: 10)
    pub list_cap: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            list_cap: 10,
        }
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Priority histogram over the active threat set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    #[serde(rename = "HIGH")]
    pub high: u64,
    #[serde(rename = "MEDIUM")]
    pub medium: u64,
    #[serde(rename = "LOW")]
    pub low: u64,
}

/// Scoring engine counters.
///
/// `active_threats` and `by_priority` are recomputed from the live set on
/// every read so they always match current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringStats {
    pub tracks_received: u64,
    /// Counts updates too (emissions, not distinct threats)
    pub threats_emitted: u64,
    pub active_threats: usize,
    pub by_priority: PriorityCounts,
    pub last_update_utc: Option<DateTime<Utc>>,
}

// ============================================================================
// SCORING ENGINE
// ============================================================================

/// The core engine for threat assessment.
///
/// Owns the active threat set, keyed by track id (one threat per track).
pub struct ScoringEngine {
    /// Active threats by track_id
    threats: HashMap<String, Threat>,

    classifier: Box<dyn ThreatClassifier>,

    config: ScoringConfig,

    tracks_received: u64,
    threats_emitted: u64,
    last_update_utc: Option<DateTime<Utc>>,
}

impl ScoringEngine {
    /// Create a new ScoringEngine with the given policy and configuration.
    pub fn new(classifier: Box<dyn ThreatClassifier>, config: ScoringConfig) -> Self {
        Self {
            threats: HashMap::new(),
            classifier,
            config,
            tracks_received: 0,
            threats_emitted: 0,
            last_update_utc: None,
        }
    }

    /// Create a new ScoringEngine with the reference random policy.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(WeightedRandomClassifier::new()),
            ScoringConfig::default(),
        )
    }

    // ========================================================================
    // UPSERT
    // ========================================================================

    /// Score a track and upsert its threat record.
    ///
    /// Full overwrite semantics: every mutable field, rationale included, is
    /// replaced. If the active set exceeds capacity afterwards, the entry
    /// with the oldest `last_update_utc` is evicted (track id as a
    /// deterministic tie-break).
    pub fn upsert_track(&mut self, track: &Track, rules: &RuleSet, now: DateTime<Utc>) -> Threat {
        self.tracks_received += 1;
        self.last_update_utc = Some(now);

        let classification = self.classifier.classify(track, rules);

        let label = if track.label.is_empty() {
            track.track_id.clone()
        } else {
            track.label.clone()
        };

        let threat = Threat {
            threat_id: threat_id_for(&track.track_id),
            track_id: track.track_id.clone(),
            label,
            contact_type: track.contact_type,
            priority: classification.priority,
            score: classification.score,
            rationale: classification.rationale,
            recommended_action: classification.recommended_action,
            state: track.state,
            last_update_utc: now,
        };

        self.threats.insert(track.track_id.clone(), threat.clone());

        while self.threats.len() > self.config.capacity {
            if let Some(oldest) = self
                .threats
                .values()
                .min_by_key(|t| (t.last_update_utc, t.track_id.clone()))
                .map(|t| t.track_id.clone())
            {
                self.threats.remove(&oldest);
            }
        }

        self.threats_emitted += 1;

        threat
    }

    // ========================================================================
    // READ SURFACE
    // ========================================================================

    /// Active threats, highest score first, then most recent, capped.
    pub fn list_threats(&self) -> Vec<Threat> {
        let mut threats: Vec<Threat> = self.threats.values().cloned().collect();
        threats.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_update_utc.cmp(&a.last_update_utc))
        });
        threats.truncate(self.config.list_cap);
        threats
    }

    /// Get a threat by the track id that produced it.
    pub fn get_threat(&self, track_id: &str) -> Option<&Threat> {
        self.threats.get(track_id)
    }

    /// Number of active threats.
    pub fn threat_count(&self) -> usize {
        self.threats.len()
    }

    /// Histogram over the live set, recomputed on every call.
    pub fn by_priority(&self) -> PriorityCounts {
        let mut counts = PriorityCounts::default();
        for threat in self.threats.values() {
            match threat.priority {
                Priority::High => counts.high += 1,
                Priority::Medium => counts.medium += 1,
                Priority::Low => counts.low += 1,
            }
        }
        counts
    }

    /// Running counters merged with freshly recomputed derived fields.
    pub fn stats(&self) -> ScoringStats {
        ScoringStats {
            tracks_received: self.tracks_received,
            threats_emitted: self.threats_emitted,
            active_threats: self.threats.len(),
            by_priority: self.by_priority(),
            last_update_utc: self.last_update_utc,
        }
    }

    /// Clears threats and counters.
    pub fn reset(&mut self) {
        self.threats.clear();
        self.tracks_received = 0;
        self.threats_emitted = 0;
        self.last_update_utc = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================
