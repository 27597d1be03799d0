//! Wire types shared between the engines and their collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single audit record, as accepted by the external append-only audit log.
///
/// The audit log is schema-light on purpose: `action` is a free string
/// (`TRACK_CREATED`, `THREAT_UPSERTED`, ...) and `details` is arbitrary JSON,
/// so new event kinds never require a sink change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique id for this event
    pub event_id: Uuid,

    /// When the event occurred
    pub ts_utc: DateTime<Utc>,

    /// Emitting service ("track-fusion", "threat-scoring")
    pub source_service: String,

    /// Who triggered it, as `role:subject` (e.g. "operator:ops@demo.local")
    pub actor: String,

    /// What happened
    pub action: String,

    /// Event-specific payload
    pub details: serde_json::Value,
}

impl AuditRecord {
    /// Builds a record stamped with a fresh event id.
    pub fn new(
        ts_utc: DateTime<Utc>,
        source_service: impl Into<String>,
        actor: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            ts_utc,
            source_service: source_service.into(),
            actor: actor.into(),
            action: action.into(),
            details,
        }
    }
}
