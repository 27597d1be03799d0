//! Shared domain models for the fusion and scoring engines.
//!
//! Every persisted or exposed type here is JSON-shaped; field names follow
//! the wire contract consumed by the operator dashboard (`lat`/`lon`/`alt_m`,
//! `vx_mps`, `*_utc` RFC 3339 timestamps).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for inbound observations and tracks.
///
/// Raised before any engine state is mutated; a rejected request leaves
/// every counter and entity untouched.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("sensor_id must not be empty")]
    EmptySensorId,

    #[error("quality.confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

/// WGS84-ish position. No real geodesy: consumers treat lat/lon as planar
/// degrees and convert with a flat 111 km/degree approximation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt_m: f64,
}

impl Position {
    /// Checks the coordinates are finite and within plausible degree ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::InvalidPosition(format!(
                "lat {} out of range",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(ValidationError::InvalidPosition(format!(
                "lon {} out of range",
                self.lon
            )));
        }
        if !self.alt_m.is_finite() {
            return Err(ValidationError::InvalidPosition("alt_m not finite".into()));
        }
        Ok(())
    }
}

/// Velocity vector in m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx_mps: f64,
    pub vy_mps: f64,
    pub vz_mps: f64,
}

/// Sensor-reported measurement quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quality {
    #[serde(default)]
    pub snr_db: f64,
    pub confidence: f64,
}

/// Coarse classification of a contact, as hinted by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactType {
    Air,
    Sea,
    Benign,
    Unknown,
}

impl Default for ContactType {
    fn default() -> Self {
        ContactType::Unknown
    }
}

impl std::fmt::Display for ContactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContactType::Air => "AIR",
            ContactType::Sea => "SEA",
            ContactType::Benign => "BENIGN",
            ContactType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A single sensor observation. Transient: consumed once per submission,
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub observation_id: String,
    pub sensor_id: String,
    pub sensor_type: String,
    pub ts_utc: DateTime<Utc>,
    pub position: Position,
    #[serde(default)]
    pub velocity: Velocity,
    pub quality: Quality,

    // Optional enrichment fields (preserved end-to-end)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<ContactType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Observation {
    /// Validates the fields correlation depends on.
    ///
    /// Presence of `position`/`quality`/`sensor_id` is enforced by the type;
    /// this checks their contents.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sensor_id.trim().is_empty() {
            return Err(ValidationError::EmptySensorId);
        }
        self.position.validate()?;
        let c = self.quality.confidence;
        if !c.is_finite() || !(0.0..=1.0).contains(&c) {
            return Err(ValidationError::ConfidenceOutOfRange(c));
        }
        Ok(())
    }
}

/// A persistent fused entity representing one physical contact.
///
/// Owned exclusively by the fusion engine; mutated in place on every matched
/// observation, never deleted except by an explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier, generated once at creation, immutable
    pub track_id: String,

    /// Timestamp of the most recent contributing observation
    pub last_update_utc: DateTime<Utc>,

    /// Latest fused position; overwritten on every matching update
    pub state: Position,

    /// Latest reported velocity
    pub velocity: Velocity,

    /// Corroboration level; non-decreasing while matches continue
    pub track_confidence: f64,

    /// Contributing sensor ids, insertion-ordered, deduplicated
    pub sources: Vec<String>,

    /// Display hint; last-non-empty-wins
    pub label: String,

    /// Classification hint; last-non-empty-wins
    pub contact_type: ContactType,
}

/// Threat priority classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// The action the reference rule set couples to each priority band.
    pub fn default_action(&self) -> RecommendedAction {
        match self {
            Priority::Low => RecommendedAction::Track,
            Priority::Medium => RecommendedAction::Review,
            Priority::High => RecommendedAction::Escalate,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Recommended operator action for a scored threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    Track,
    Review,
    Escalate,
}

/// A derived assessment record, exactly one per scored track.
///
/// Owned exclusively by the scoring engine. Re-scoring overwrites every
/// mutable field (full upsert, never a merge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    /// Derived deterministically from `track_id`
    pub threat_id: String,
    pub track_id: String,
    pub label: String,
    pub contact_type: ContactType,
    pub priority: Priority,
    pub score: f64,
    pub rationale: Vec<String>,
    pub recommended_action: RecommendedAction,

    /// Position snapshot copied from the triggering track, for display only
    pub state: Position,

    pub last_update_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_observation() -> Observation {
        Observation {
            observation_id: "OBS-0001".into(),
            sensor_id: "RADAR-1".into(),
            sensor_type: "RADAR".into(),
            ts_utc: Utc::now(),
            position: Position {
                lat: 29.76,
                lon: -95.37,
                alt_m: 9000.0,
            },
            velocity: Velocity {
                vx_mps: 250.0,
                vy_mps: 80.0,
                vz_mps: 0.0,
            },
            quality: Quality {
                snr_db: 12.0,
                confidence: 0.88,
            },
            object_id: Some("AIR-1".into()),
            label: Some("AIRPLANE-01".into()),
            contact_type: Some(ContactType::Air),
            metadata: None,
        }
    }

    #[test]
    fn test_valid_observation_passes() {
        assert!(sample_observation().validate().is_ok());
    }

    #[test]
    fn test_empty_sensor_id_rejected() {
        let mut obs = sample_observation();
        obs.sensor_id = "  ".into();
        assert!(matches!(
            obs.validate(),
            Err(ValidationError::EmptySensorId)
        ));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let mut obs = sample_observation();
        obs.quality.confidence = 1.2;
        assert!(matches!(
            obs.validate(),
            Err(ValidationError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn test_position_out_of_range_rejected() {
        let mut obs = sample_observation();
        obs.position.lat = 99.0;
        assert!(matches!(
            obs.validate(),
            Err(ValidationError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_contact_type_wire_format() {
        let json = serde_json::to_string(&ContactType::Benign).unwrap();
        assert_eq!(json, "\"BENIGN\"");

        let back: ContactType = serde_json::from_str("\"AIR\"").unwrap();
        assert_eq!(back, ContactType::Air);
    }

    #[test]
    fn test_observation_optional_fields_default() {
        let json = r#"{
            "observation_id": "OBS-1",
            "sensor_id": "RADAR-1",
            "sensor_type": "RADAR",
            "ts_utc": "2026-01-01T00:00:00Z",
            "position": {"lat": 10.0, "lon": 10.0, "alt_m": 0.0},
            "quality": {"confidence": 0.5}
        }"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert!(obs.object_id.is_none());
        assert!(obs.contact_type.is_none());
        assert_eq!(obs.velocity, Velocity::default());
    }
}
