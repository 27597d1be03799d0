//! The "FUSION" Engine - Track Correlation Layer
//!
//! Correlates raw sensor observations into persistent tracks using a
//! two-stage pipeline:
//! 1. Exact-key match (object_id index) - authoritative
//! 2. Spatial fallback (planar distance below a fixed threshold)
//!
//! No Kalman/association filtering: a matched update overwrites the state
//! and bumps confidence by a fixed corroboration step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{ContactType, Observation, Position, Track, ValidationError};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the FusionEngine
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Spatial correlation threshold in km (default: 2.0)
    pub match_radius_km: f64,

    /// Confidence bump applied on every matched update (default: 0.05)
    pub confidence_step: f64,

    /// Flat conversion factor for the equirectangular approximation
    /// (default: 111.0 km per degree, both axes)
    pub km_per_degree: f64,

    /// Maximum number of tracks returned by a list call (default: 10)
    pub list_cap: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            match_radius_km: 2.0,
            confidence_step: 0.05,
            km_per_degree: 111.0,
            list_cap: 10,
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of one observation submission.
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    /// Snapshot of the created or updated track
    pub track: Track,

    /// Whether a new track was created (false = existing track updated)
    pub created: bool,
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Fusion engine counters.
///
/// `active_tracks` is recomputed from current entity state on every read
/// rather than incrementally tracked, so it cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionStats {
    pub observations_ingested: u64,
    pub tracks_created: u64,
    pub tracks_updated: u64,
    pub active_tracks: usize,
    pub last_update_utc: Option<DateTime<Utc>>,
}

// ============================================================================
// FUSION ENGINE
// ============================================================================

/// The core engine for observation-to-track correlation.
///
/// Owns the set of live tracks and the `object_id -> track_id` index.
/// Tracks iterate in insertion order, which pins the spatial fallback's
/// first-match policy and makes correlation reproducible.
pub struct FusionEngine {
    /// All live tracks, insertion-ordered
    tracks: Vec<Track>,

    /// Exact-key correlation index (object_id -> track_id)
    object_index: HashMap<String, String>,

    config: FusionConfig,

    observations_ingested: u64,
    tracks_created: u64,
    tracks_updated: u64,
    last_update_utc: Option<DateTime<Utc>>,
}

impl FusionEngine {
    /// Create a new FusionEngine with the given configuration.
    pub fn new(config: FusionConfig) -> Self {
        Self {
            tracks: Vec::new(),
            object_index: HashMap::new(),
            config,
            observations_ingested: 0,
            tracks_created: 0,
            tracks_updated: 0,
            last_update_utc: None,
        }
    }

    /// Create a new FusionEngine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FusionConfig::default())
    }

    // ========================================================================
    // CORRELATION
    // ========================================================================

    /// Planar distance between two positions in km.
    ///
    /// Equirectangular approximation: each axis scaled by a flat km/degree
    /// factor, then combined Euclidean. Good enough at correlation scale.
    fn planar_distance_km(&self, a: &Position, b: &Position) -> f64 {
        let dlat = (a.lat - b.lat) * self.config.km_per_degree;
        let dlon = (a.lon - b.lon) * self.config.km_per_degree;
        (dlat * dlat + dlon * dlon).sqrt()
    }

    /// Stage 1: exact-key match via the object index. Authoritative - a hit
    /// here skips the spatial search entirely.
    fn exact_match(&self, obs: &Observation) -> Option<String> {
        let object_id = obs.object_id.as_deref()?;
        let mapped = self.object_index.get(object_id)?;
        // Index entries are only removed by reset, but double-check liveness
        self.tracks
            .iter()
            .find(|t| &t.track_id == mapped)
            .map(|t| t.track_id.clone())
    }

    /// Stage 2: spatial fallback. First live track (insertion order) within
    /// the match radius wins; deliberately NOT closest-match.
    fn spatial_match(&self, obs: &Observation) -> Option<String> {
        self.tracks
            .iter()
            .find(|t| self.planar_distance_km(&t.state, &obs.position) < self.config.match_radius_km)
            .map(|t| t.track_id.clone())
    }

    fn find_track_mut(&mut self, track_id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.track_id == track_id)
    }

    fn new_track_id() -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("TRK-{}", &id[..8])
    }

    // ========================================================================
    // SUBMISSION
    // ========================================================================

    /// Process one observation: validate, correlate, create or update.
    ///
    /// Validation failures reject the request before any counter or entity
    /// is touched (fail-closed). Returns a snapshot of the affected track.
    pub fn submit_observation(
        &mut self,
        obs: &Observation,
        now: DateTime<Utc>,
    ) -> Result<FusionOutcome, ValidationError> {
        obs.validate()?;

        self.observations_ingested += 1;
        self.last_update_utc = Some(now);

        let matched = self.exact_match(obs).or_else(|| self.spatial_match(obs));

        match matched {
            Some(track_id) => {
                let step = self.config.confidence_step;
                let track = self
                    .find_track_mut(&track_id)
                    .expect("matched track_id must be live");

                track.state = obs.position;
                track.velocity = obs.velocity;
                track.last_update_utc = now;
                track.track_confidence = (track.track_confidence + step).clamp(0.0, 1.0);

                if !track.sources.iter().any(|s| s == &obs.sensor_id) {
                    track.sources.push(obs.sensor_id.clone());
                }

                // Preserve/update display hints when present
                if let Some(label) = obs.label.as_deref() {
                    if !label.is_empty() {
                        track.label = label.to_string();
                    }
                }
                if let Some(contact_type) = obs.contact_type {
                    track.contact_type = contact_type;
                }

                let snapshot = track.clone();
                self.tracks_updated += 1;

                Ok(FusionOutcome {
                    track: snapshot,
                    created: false,
                })
            }
            None => {
                let track_id = Self::new_track_id();

                let label = obs
                    .label
                    .clone()
                    .filter(|l| !l.is_empty())
                    .or_else(|| obs.object_id.clone())
                    .unwrap_or_else(|| track_id.clone());

                let track = Track {
                    track_id: track_id.clone(),
                    last_update_utc: now,
                    state: obs.position,
                    velocity: obs.velocity,
                    track_confidence: obs.quality.confidence.clamp(0.0, 1.0),
                    sources: vec![obs.sensor_id.clone()],
                    label,
                    contact_type: obs.contact_type.unwrap_or(ContactType::Unknown),
                };

                let snapshot = track.clone();
                self.tracks.push(track);
                self.tracks_created += 1;

                if let Some(object_id) = obs.object_id.clone() {
                    self.object_index.insert(object_id, track_id);
                }

                Ok(FusionOutcome {
                    track: snapshot,
                    created: true,
                })
            }
        }
    }

    // ========================================================================
    // READ SURFACE
    // ========================================================================

    /// Live tracks, newest `last_update_utc` first, capped to the list limit.
    pub fn list_tracks(&self) -> Vec<Track> {
        let mut tracks = self.tracks.clone();
        // Stable sort: ties keep insertion order
        tracks.sort_by(|a, b| b.last_update_utc.cmp(&a.last_update_utc));
        tracks.truncate(self.config.list_cap);
        tracks
    }

    /// Get a reference to a track by id.
    pub fn get_track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    /// Number of live tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Current counters, with `active_tracks` recomputed.
    pub fn stats(&self) -> FusionStats {
        FusionStats {
            observations_ingested: self.observations_ingested,
            tracks_created: self.tracks_created,
            tracks_updated: self.tracks_updated,
            active_tracks: self.tracks.len(),
            last_update_utc: self.last_update_utc,
        }
    }

    /// Clears tracks, object index, and counters.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.object_index.clear();
        self.observations_ingested = 0;
        self.tracks_created = 0;
        self.tracks_updated = 0;
        self.last_update_utc = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quality, Velocity};
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    fn obs_at(lat: f64, lon: f64) -> Observation {
        Observation {
            observation_id: "OBS-1".into(),
            sensor_id: "RADAR-1".into(),
            sensor_type: "RADAR".into(),
            ts_utc: ts(0),
            position: Position {
                lat,
                lon,
                alt_m: 9000.0,
            },
            velocity: Velocity::default(),
            quality: Quality {
                snr_db: 0.0,
                confidence: 0.88,
            },
            object_id: None,
            label: None,
            contact_type: None,
            metadata: None,
        }
    }

    fn obs_with_object(lat: f64, lon: f64, object_id: &str) -> Observation {
        Observation {
            object_id: Some(object_id.into()),
            ..obs_at(lat, lon)
        }
    }

    #[test]
    fn test_first_observation_creates_track() {
        let mut engine = FusionEngine::with_defaults();
        let outcome = engine
            .submit_observation(&obs_with_object(10.0, 10.0, "AIR-1"), ts(0))
            .unwrap();

        assert!(outcome.created);
        assert!(outcome.track.track_id.starts_with("TRK-"));
        assert_eq!(engine.track_count(), 1);

        let stats = engine.stats();
        assert_eq!(stats.observations_ingested, 1);
        assert_eq!(stats.tracks_created, 1);
        assert_eq!(stats.tracks_updated, 0);
        assert_eq!(stats.active_tracks, 1);
    }

    #[test]
    fn test_exact_key_match_is_idempotent_regardless_of_distance() {
        let mut engine = FusionEngine::with_defaults();
        let first = engine
            .submit_observation(&obs_with_object(10.0, 10.0, "AIR-1"), ts(0))
            .unwrap();

        // Same object_id on the other side of the world still correlates
        let second = engine
            .submit_observation(&obs_with_object(-40.0, 120.0, "AIR-1"), ts(1))
            .unwrap();

        assert!(!second.created);
        assert_eq!(first.track.track_id, second.track.track_id);
        assert_eq!(engine.track_count(), 1);
        assert_eq!(engine.stats().tracks_updated, 1);
    }

    #[test]
    fn test_spec_scenario_create_then_update() {
        let mut engine = FusionEngine::with_defaults();
        let first = engine
            .submit_observation(&obs_with_object(10.0, 10.0, "AIR-1"), ts(0))
            .unwrap();
        assert!(first.created);
        assert_eq!(engine.stats().tracks_created, 1);
        assert_relative_eq!(first.track.track_confidence, 0.88);

        let second = engine
            .submit_observation(&obs_with_object(10.01, 10.01, "AIR-1"), ts(1))
            .unwrap();
        assert_eq!(second.track.track_id, first.track.track_id);
        assert_eq!(engine.stats().tracks_updated, 1);
        assert_relative_eq!(second.track.track_confidence, 0.93);
    }

    #[test]
    fn test_spatial_fallback_within_threshold() {
        let mut engine = FusionEngine::with_defaults();
        let created = engine.submit_observation(&obs_at(10.0, 10.0), ts(0)).unwrap();

        // ~1.57 km away (0.01 deg on each axis): inside the 2.0 km gate
        let updated = engine
            .submit_observation(&obs_at(10.01, 10.01), ts(1))
            .unwrap();

        assert!(!updated.created);
        assert_eq!(updated.track.track_id, created.track.track_id);
        assert_eq!(engine.track_count(), 1);
    }

    #[test]
    fn test_spatial_fallback_beyond_threshold_creates_new_track() {
        let mut engine = FusionEngine::with_defaults();
        engine.submit_observation(&obs_at(10.0, 10.0), ts(0)).unwrap();

        // ~2.22 km away (0.02 deg latitude): outside the gate
        let outcome = engine.submit_observation(&obs_at(10.02, 10.0), ts(1)).unwrap();

        assert!(outcome.created);
        assert_eq!(engine.track_count(), 2);
    }

    #[test]
    fn test_spatial_fallback_first_match_wins_over_closest() {
        // Two tracks straddle the observation; the nearer one was inserted
        // second. The scan picks the FIRST within threshold, not the
        // closest - latent behavior for overlapping tracks, preserved
        // deliberately and pinned here.
        let mut engine = FusionEngine::with_defaults();
        let far = engine.submit_observation(&obs_at(10.000, 10.0), ts(0)).unwrap();
        let near = engine.submit_observation(&obs_at(10.030, 10.0), ts(1)).unwrap();
        assert!(near.created, "tracks must start distinct");

        // ~1.89 km from `far`, ~1.44 km from `near`: both inside the gate
        let outcome = engine.submit_observation(&obs_at(10.017, 10.0), ts(2)).unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.track.track_id, far.track.track_id);
    }

    #[test]
    fn test_confidence_monotone_and_clamped() {
        let mut engine = FusionEngine::with_defaults();
        let mut obs = obs_with_object(10.0, 10.0, "AIR-1");
        obs.quality.confidence = 0.95;
        engine.submit_observation(&obs, ts(0)).unwrap();

        let mut last = 0.95;
        for i in 1..=5 {
            let outcome = engine.submit_observation(&obs, ts(i)).unwrap();
            assert!(outcome.track.track_confidence >= last);
            assert!(outcome.track.track_confidence <= 1.0);
            last = outcome.track.track_confidence;
        }
        assert_relative_eq!(last, 1.0);
    }

    #[test]
    fn test_sources_deduplicated_in_insertion_order() {
        let mut engine = FusionEngine::with_defaults();
        let mut obs = obs_with_object(10.0, 10.0, "AIR-1");
        engine.submit_observation(&obs, ts(0)).unwrap();

        obs.sensor_id = "EOIR-2".into();
        engine.submit_observation(&obs, ts(1)).unwrap();

        obs.sensor_id = "RADAR-1".into();
        let outcome = engine.submit_observation(&obs, ts(2)).unwrap();

        assert_eq!(outcome.track.sources, vec!["RADAR-1", "EOIR-2"]);
    }

    #[test]
    fn test_label_and_contact_type_last_non_empty_wins() {
        let mut engine = FusionEngine::with_defaults();
        let mut obs = obs_with_object(10.0, 10.0, "AIR-1");
        let first = engine.submit_observation(&obs, ts(0)).unwrap();
        // No label on create: falls back to object_id
        assert_eq!(first.track.label, "AIR-1");
        assert_eq!(first.track.contact_type, ContactType::Unknown);

        obs.label = Some("AIRPLANE-01".into());
        obs.contact_type = Some(ContactType::Air);
        let second = engine.submit_observation(&obs, ts(1)).unwrap();
        assert_eq!(second.track.label, "AIRPLANE-01");
        assert_eq!(second.track.contact_type, ContactType::Air);

        // Absent hints leave the previous values in place
        obs.label = None;
        obs.contact_type = None;
        let third = engine.submit_observation(&obs, ts(2)).unwrap();
        assert_eq!(third.track.label, "AIRPLANE-01");
        assert_eq!(third.track.contact_type, ContactType::Air);
    }

    #[test]
    fn test_validation_rejects_before_any_state_change() {
        let mut engine = FusionEngine::with_defaults();
        let mut obs = obs_at(10.0, 10.0);
        obs.sensor_id = "".into();

        assert!(engine.submit_observation(&obs, ts(0)).is_err());

        let stats = engine.stats();
        assert_eq!(stats.observations_ingested, 0);
        assert_eq!(stats.tracks_created, 0);
        assert_eq!(engine.track_count(), 0);
        assert!(stats.last_update_utc.is_none());
    }

    #[test]
    fn test_list_tracks_newest_first_capped() {
        let mut engine = FusionEngine::with_defaults();
        // 12 tracks far enough apart to never correlate
        for i in 0..12 {
            let obs = obs_at(10.0 + i as f64, 10.0);
            engine.submit_observation(&obs, ts(i as i64)).unwrap();
        }

        let listed = engine.list_tracks();
        assert_eq!(listed.len(), 10);
        assert_eq!(listed[0].last_update_utc, ts(11));
        for pair in listed.windows(2) {
            assert!(pair[0].last_update_utc >= pair[1].last_update_utc);
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut engine = FusionEngine::with_defaults();
        engine
            .submit_observation(&obs_with_object(10.0, 10.0, "AIR-1"), ts(0))
            .unwrap();
        engine.reset();

        assert_eq!(engine.track_count(), 0);
        assert!(engine.list_tracks().is_empty());
        let stats = engine.stats();
        assert_eq!(stats.observations_ingested, 0);
        assert_eq!(stats.tracks_created, 0);
        assert_eq!(stats.tracks_updated, 0);
        assert!(stats.last_update_utc.is_none());

        // Old object_id no longer correlates: the index was cleared too
        let outcome = engine
            .submit_observation(&obs_with_object(10.0, 10.0, "AIR-1"), ts(1))
            .unwrap();
        assert!(outcome.created);
    }
}
