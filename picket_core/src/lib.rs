//! Picket Core - Track Correlation and Threat Scoring Pipeline
//!
//! A single-node, single-partition in-memory pipeline for deterministic
//! entity bookkeeping plus pluggable scoring:
//! 1. **Fusion Engine**: correlates raw observations into persistent tracks
//!    (exact-key match, then spatial fallback)
//! 2. **Scoring Engine**: maintains one threat record per track with a
//!    policy-pluggable classifier and a capacity-bounded active set
//! 3. **Trust Layer**: Biscuit bearer credentials gating every ingestion path

pub mod fusion;
pub mod models;
pub mod rules;
pub mod scoring;
pub mod service;
pub mod trust;

// Re-export key types for convenience
pub use fusion::{FusionConfig, FusionEngine, FusionStats};
pub use models::{ContactType, Observation, Position, Priority, Threat, Track, ValidationError};
pub use rules::{FileRuleSource, RuleError, RuleSet, RuleSource, StaticRuleSource};
pub use scoring::{
    threat_id_for, ScoringConfig, ScoringEngine, ScoringStats, ThreatClassifier,
    WeightedRandomClassifier,
};
pub use service::{
    FusionService, NullTrackSink, ObservationAck, ScoringPushTarget, ScoringService,
    ServiceError, TrackSink,
};
pub use trust::{AuthError, Claims, IdentityAuthority, IdentityVerifier, Role};
