//! Service Surface - Authenticated operation layer over both engines.
//!
//! Each engine is wrapped as a standalone request/response service owning
//! one mutual-exclusion domain. A submit call does, in order:
//! 1. Credential verification + role gate (rejected before engine logic)
//! 2. The primary entity mutation under the engine lock (fail-closed)
//! 3. Side channels AFTER the lock is released: one best-effort audit
//!    record and, for fusion, one best-effort push of the full track to the
//!    scoring collaborator. Single attempt, bounded timeout, outcome logged
//!    and discarded (fail-open).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use picket_env::{AuditRecord, AuditSink, EnvError, PicketContext};

use crate::fusion::{FusionEngine, FusionStats};
use crate::models::{Observation, Threat, Track, ValidationError};
use crate::rules::{RuleError, RuleSource};
use crate::scoring::{ScoringEngine, ScoringStats};
use crate::trust::{require_ingest_role, AuthError, IdentityVerifier};

/// Service names stamped on audit records.
pub const SOURCE_TRACK_FUSION: &str = "track-fusion";
pub const SOURCE_THREAT_SCORING: &str = "threat-scoring";

/// Audit actions.
pub const ACTION_TRACK_CREATED: &str = "TRACK_CREATED";
pub const ACTION_TRACK_UPDATED: &str = "TRACK_UPDATED";
pub const ACTION_THREAT_UPSERTED: &str = "THREAT_UPSERTED";

// Side-channel budgets: single attempt, no retry
const AUDIT_TIMEOUT: Duration = Duration::from_secs(2);
const PUSH_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors surfaced to callers of the service operations.
///
/// `DownstreamUnavailable` conditions (audit sink, scoring push) never
/// appear here: they are logged and discarded by design.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("rule set load failed: {0}")]
    RuleLoad(#[from] RuleError),
}

/// Acknowledgement returned by an observation submission.
///
/// Returned synchronously, independent of whether the downstream scoring
/// push succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationAck {
    pub track_id: String,
    pub created: bool,
}

/// Fusion's only view of the scoring collaborator: a submit operation that
/// accepts the full resulting track plus the bearer credential that
/// authorized the originating observation (trust chain preserved).
#[async_trait]
pub trait TrackSink: Send + Sync {
    async fn submit_track(&self, track: Track, token: Vec<u8>) -> Result<Threat, EnvError>;
}

/// Sink that drops every track. For hosts running fusion without scoring.
pub struct NullTrackSink;

#[async_trait]
impl TrackSink for NullTrackSink {
    async fn submit_track(&self, _track: Track, _token: Vec<u8>) -> Result<Threat, EnvError> {
        Err(EnvError::unavailable("no scoring collaborator configured"))
    }
}

/// Dispatches one audit record, fire-and-forget.
fn emit_audit<C: PicketContext>(ctx: &Arc<C>, sink: &Arc<dyn AuditSink>, record: AuditRecord) {
    let sink = Arc::clone(sink);
    ctx.spawn("audit-emit", async move {
        match tokio::time::timeout(AUDIT_TIMEOUT, sink.record(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "audit sink rejected record"),
            Err(_) => debug!("audit emit timed out"),
        }
    });
}

// ============================================================================
// FUSION SERVICE
// ============================================================================

/// The track-fusion service: owns the fusion engine behind one lock.
pub struct FusionService<C: PicketContext> {
    ctx: Arc<C>,
    verifier: Arc<IdentityVerifier>,
    engine: Mutex<FusionEngine>,
    audit: Arc<dyn AuditSink>,
    scoring: Arc<dyn TrackSink>,
}

impl<C: PicketContext> FusionService<C> {
    pub fn new(
        ctx: Arc<C>,
        verifier: Arc<IdentityVerifier>,
        engine: FusionEngine,
        audit: Arc<dyn AuditSink>,
        scoring: Arc<dyn TrackSink>,
    ) -> Self {
        Self {
            ctx,
            verifier,
            engine: Mutex::new(engine),
            audit,
            scoring,
        }
    }

    /// Ingest one observation: authenticate, correlate, upsert, then kick
    /// off the audit record and the downstream push.
    pub async fn submit_observation(
        &self,
        token: &[u8],
        obs: Observation,
    ) -> Result<ObservationAck, ServiceError> {
        let claims = self.verifier.verify(token, self.ctx.system_time())?;
        require_ingest_role(&claims)?;

        let now = self.ctx.utc_now();
        let outcome = {
            let mut engine = self.engine.lock().expect("fusion engine lock poisoned");
            engine.submit_observation(&obs, now)?
        };

        let action = if outcome.created {
            ACTION_TRACK_CREATED
        } else {
            ACTION_TRACK_UPDATED
        };
        emit_audit(
            &self.ctx,
            &self.audit,
            AuditRecord::new(
                now,
                SOURCE_TRACK_FUSION,
                claims.actor(),
                action,
                serde_json::json!({
                    "track_id": outcome.track.track_id,
                    "object_id": obs.object_id,
                    "label": outcome.track.label,
                    "contact_type": outcome.track.contact_type,
                }),
            ),
        );

        // Forward the full track to scoring, best effort. Fusion correctness
        // does not depend on scoring availability.
        let sink = Arc::clone(&self.scoring);
        let track = outcome.track.clone();
        let token = token.to_vec();
        self.ctx.spawn("fusion-push-scoring", async move {
            match tokio::time::timeout(PUSH_TIMEOUT, sink.submit_track(track, token)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!(error = %e, "scoring push failed"),
                Err(_) => debug!("scoring push timed out"),
            }
        });

        Ok(ObservationAck {
            track_id: outcome.track.track_id,
            created: outcome.created,
        })
    }

    /// Live tracks, newest first, capped.
    pub fn list_tracks(&self) -> Vec<Track> {
        self.engine
            .lock()
            .expect("fusion engine lock poisoned")
            .list_tracks()
    }

    pub fn stats(&self) -> FusionStats {
        self.engine
            .lock()
            .expect("fusion engine lock poisoned")
            .stats()
    }

    /// Clears tracks, object index, and counters atomically with respect to
    /// other operations on this service.
    pub fn reset(&self) {
        self.engine
            .lock()
            .expect("fusion engine lock poisoned")
            .reset();
    }
}

// ============================================================================
// SCORING SERVICE
// ============================================================================

/// The threat-scoring service: owns the scoring engine behind one lock.
pub struct ScoringService<C: PicketContext> {
    ctx: Arc<C>,
    verifier: Arc<IdentityVerifier>,
    rules: Arc<dyn RuleSource>,
    engine: Mutex<ScoringEngine>,
    audit: Arc<dyn AuditSink>,
}

impl<C: PicketContext> ScoringService<C> {
    pub fn new(
        ctx: Arc<C>,
        verifier: Arc<IdentityVerifier>,
        rules: Arc<dyn RuleSource>,
        engine: ScoringEngine,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            ctx,
            verifier,
            rules,
            engine: Mutex::new(engine),
            audit,
        }
    }

    /// Score one track and upsert its threat record.
    ///
    /// The rule set is loaded fresh on every call; a load failure fails this
    /// call (the track stays unscored) and nothing else.
    pub async fn submit_track(&self, token: &[u8], track: Track) -> Result<Threat, ServiceError> {
        let claims = self.verifier.verify(token, self.ctx.system_time())?;
        require_ingest_role(&claims)?;

        let rules = self.rules.load()?;

        let now = self.ctx.utc_now();
        let threat = {
            let mut engine = self.engine.lock().expect("scoring engine lock poisoned");
            engine.upsert_track(&track, &rules, now)
        };

        emit_audit(
            &self.ctx,
            &self.audit,
            AuditRecord::new(
                now,
                SOURCE_THREAT_SCORING,
                claims.actor(),
                ACTION_THREAT_UPSERTED,
                serde_json::json!({
                    "threat_id": threat.threat_id,
                    "track_id": threat.track_id,
                    "priority": threat.priority,
                    "score": threat.score,
                    "rationale": threat.rationale,
                }),
            ),
        );

        Ok(threat)
    }

    /// Active threats, highest score first, then most recent, capped.
    pub fn list_threats(&self) -> Vec<Threat> {
        self.engine
            .lock()
            .expect("scoring engine lock poisoned")
            .list_threats()
    }

    pub fn stats(&self) -> ScoringStats {
        self.engine
            .lock()
            .expect("scoring engine lock poisoned")
            .stats()
    }

    /// Clears threats and counters atomically with respect to other
    /// operations on this service.
    pub fn reset(&self) {
        self.engine
            .lock()
            .expect("scoring engine lock poisoned")
            .reset();
    }
}

/// Adapts a `ScoringService` into fusion's `TrackSink` collaborator - the
/// in-process request/response channel between the two services.
pub struct ScoringPushTarget<C: PicketContext> {
    service: Arc<ScoringService<C>>,
}

impl<C: PicketContext> ScoringPushTarget<C> {
    pub fn new(service: Arc<ScoringService<C>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<C: PicketContext> TrackSink for ScoringPushTarget<C> {
    async fn submit_track(&self, track: Track, token: Vec<u8>) -> Result<Threat, EnvError> {
        self.service
            .submit_track(&token, track)
            .await
            .map_err(|e| EnvError::unavailable(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::FusionConfig;
    use crate::models::{ContactType, Position, Quality, Velocity};
    use crate::rules::{RuleSet, StaticRuleSource};
    use crate::scoring::{ScoringConfig, WeightedRandomClassifier};
    use crate::trust::{IdentityAuthority, Role};
    use biscuit_auth::KeyPair;
    use chrono::Utc;
    use picket_env::{MemoryAuditSink, TokioContext};
    use std::time::SystemTime;

    struct FailingAuditSink;

    #[async_trait]
    impl AuditSink for FailingAuditSink {
        async fn record(&self, _event: AuditRecord) -> Result<(), EnvError> {
            Err(EnvError::unavailable("audit log down"))
        }
    }

    struct FailingRuleSource;

    impl RuleSource for FailingRuleSource {
        fn load(&self) -> Result<RuleSet, RuleError> {
            Err(RuleError::Unreadable(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "rules.json missing",
            )))
        }
    }

    fn sample_observation(object_id: &str) -> Observation {
        Observation {
            observation_id: "OBS-1".into(),
            sensor_id: "RADAR-1".into(),
            sensor_type: "RADAR".into(),
            ts_utc: Utc::now(),
            position: Position {
                lat: 10.0,
                lon: 10.0,
                alt_m: 9000.0,
            },
            velocity: Velocity::default(),
            quality: Quality {
                snr_db: 0.0,
                confidence: 0.88,
            },
            object_id: Some(object_id.into()),
            label: None,
            contact_type: Some(ContactType::Air),
            metadata: None,
        }
    }

    fn sample_track(track_id: &str) -> Track {
        Track {
            track_id: track_id.into(),
            last_update_utc: Utc::now(),
            state: Position {
                lat: 10.0,
                lon: 10.0,
                alt_m: 9000.0,
            },
            velocity: Velocity::default(),
            track_confidence: 0.9,
            sources: vec!["RADAR-1".into()],
            label: "AIR-1".into(),
            contact_type: ContactType::Air,
        }
    }

    struct Harness {
        authority: IdentityAuthority,
        verifier: Arc<IdentityVerifier>,
        ctx: Arc<TokioContext>,
        audit: Arc<MemoryAuditSink>,
    }

    impl Harness {
        fn new() -> Self {
            let authority = IdentityAuthority::new(KeyPair::new());
            let verifier = Arc::new(IdentityVerifier::new(authority.public_key()));
            Self {
                authority,
                verifier,
                ctx: TokioContext::shared(),
                audit: Arc::new(MemoryAuditSink::new()),
            }
        }

        fn token(&self) -> Vec<u8> {
            self.authority
                .issue_token(
                    "ops@demo.local",
                    Role::Operator,
                    Duration::from_secs(3600),
                    SystemTime::now(),
                )
                .unwrap()
        }

        fn fusion(&self, scoring: Arc<dyn TrackSink>) -> FusionService<TokioContext> {
            FusionService::new(
                Arc::clone(&self.ctx),
                Arc::clone(&self.verifier),
                FusionEngine::new(FusionConfig::default()),
                self.audit.clone() as Arc<dyn AuditSink>,
                scoring,
            )
        }

        fn scoring(&self) -> ScoringService<TokioContext> {
            ScoringService::new(
                Arc::clone(&self.ctx),
                Arc::clone(&self.verifier),
                Arc::new(StaticRuleSource::default()),
                ScoringEngine::new(
                    Box::new(WeightedRandomClassifier::with_seed(7)),
                    ScoringConfig::default(),
                ),
                self.audit.clone() as Arc<dyn AuditSink>,
            )
        }
    }

    async fn drain_side_channels() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_submit_observation_creates_and_audits() {
        let h = Harness::new();
        let fusion = h.fusion(Arc::new(NullTrackSink));

        let ack = fusion
            .submit_observation(&h.token(), sample_observation("AIR-1"))
            .await
            .unwrap();
        assert!(ack.created);
        assert!(ack.track_id.starts_with("TRK-"));

        drain_side_channels().await;
        let events = h.audit.recent();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ACTION_TRACK_CREATED);
        assert_eq!(events[0].source_service, SOURCE_TRACK_FUSION);
        assert_eq!(events[0].actor, "operator:ops@demo.local");
    }

    #[tokio::test]
    async fn test_submit_observation_rejects_bad_token() {
        let h = Harness::new();
        let fusion = h.fusion(Arc::new(NullTrackSink));

        let err = fusion
            .submit_observation(b"garbage", sample_observation("AIR-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Auth(_)));
        assert_eq!(fusion.stats().observations_ingested, 0);
    }

    #[tokio::test]
    async fn test_submit_observation_rejects_invalid_payload() {
        let h = Harness::new();
        let fusion = h.fusion(Arc::new(NullTrackSink));

        let mut obs = sample_observation("AIR-1");
        obs.quality.confidence = 2.0;
        let err = fusion.submit_observation(&h.token(), obs).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        // Rejected before any state change
        let stats = fusion.stats();
        assert_eq!(stats.observations_ingested, 0);
        assert_eq!(stats.active_tracks, 0);
    }

    #[tokio::test]
    async fn test_audit_failure_never_fails_the_request() {
        let h = Harness::new();
        let fusion = FusionService::new(
            Arc::clone(&h.ctx),
            Arc::clone(&h.verifier),
            FusionEngine::with_defaults(),
            Arc::new(FailingAuditSink),
            Arc::new(NullTrackSink),
        );

        let ack = fusion
            .submit_observation(&h.token(), sample_observation("AIR-1"))
            .await
            .unwrap();
        assert!(ack.created);
    }

    #[tokio::test]
    async fn test_scoring_push_failure_is_swallowed() {
        let h = Harness::new();
        // NullTrackSink always errors; submission must still succeed
        let fusion = h.fusion(Arc::new(NullTrackSink));

        let ack = fusion
            .submit_observation(&h.token(), sample_observation("AIR-1"))
            .await
            .unwrap();
        drain_side_channels().await;
        assert_eq!(fusion.stats().tracks_created, 1);
        assert_eq!(ack.created, true);
    }

    #[tokio::test]
    async fn test_submit_track_scores_and_audits() {
        let h = Harness::new();
        let scoring = h.scoring();

        let threat = scoring
            .submit_track(&h.token(), sample_track("TRK-0001"))
            .await
            .unwrap();
        assert_eq!(threat.threat_id, "THR-0001");

        drain_side_channels().await;
        let events = h.audit.recent();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ACTION_THREAT_UPSERTED);
        assert_eq!(events[0].source_service, SOURCE_THREAT_SCORING);
    }

    #[tokio::test]
    async fn test_rule_load_failure_is_a_hard_error() {
        let h = Harness::new();
        let scoring = ScoringService::new(
            Arc::clone(&h.ctx),
            Arc::clone(&h.verifier),
            Arc::new(FailingRuleSource),
            ScoringEngine::with_defaults(),
            h.audit.clone() as Arc<dyn AuditSink>,
        );

        let err = scoring
            .submit_track(&h.token(), sample_track("TRK-0001"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RuleLoad(_)));

        // Track stays unscored; no counter moved
        let stats = scoring.stats();
        assert_eq!(stats.tracks_received, 0);
        assert_eq!(stats.active_threats, 0);
    }

    #[tokio::test]
    async fn test_scoring_rejects_unauthenticated_push() {
        let h = Harness::new();
        let scoring = h.scoring();

        let err = scoring
            .submit_track(&[], sample_track("TRK-0001"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Auth(AuthError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_service_state() {
        let h = Harness::new();
        let fusion = h.fusion(Arc::new(NullTrackSink));
        fusion
            .submit_observation(&h.token(), sample_observation("AIR-1"))
            .await
            .unwrap();

        fusion.reset();
        assert!(fusion.list_tracks().is_empty());
        assert_eq!(fusion.stats().observations_ingested, 0);
    }
}
