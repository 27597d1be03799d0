//! Scenario runner - wires both services over a simulated environment and
//! drives observation waves through them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use picket_core::rules::{FileRuleSource, RuleSource, StaticRuleSource};
use picket_core::scoring::{ScoringConfig, WeightedRandomClassifier};
use picket_core::service::{ScoringPushTarget, ServiceError, TrackSink};
use picket_core::{
    AuthError, FusionEngine, FusionService, FusionStats, IdentityAuthority, IdentityVerifier,
    Role, ScoringEngine, ScoringService, ScoringStats, Threat, Track,
};
use picket_env::{AuditRecord, AuditSink, MemoryAuditSink, PicketContext};

use crate::context::SimContext;
use crate::keys::RootKeyProvider;
use crate::scenarios::{ScenarioGenerator, ScenarioId};

/// Virtual time between waves.
const WAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub waves: u32,
    /// Optional JSON rule-set path; re-read on every scoring call
    pub rules_path: Option<PathBuf>,
}

/// Snapshot of the picture after a run.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub seed: u64,
    pub waves: u32,
    pub tracks: Vec<Track>,
    pub threats: Vec<Threat>,
    pub fusion_stats: FusionStats,
    pub scoring_stats: ScoringStats,
    pub audit_events: Vec<AuditRecord>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("service call failed: {0}")]
    Service(#[from] ServiceError),

    #[error("token issuance failed: {0}")]
    Auth(#[from] AuthError),
}

/// Runs the configured scenario and returns the resulting picture.
pub async fn run_scenario(config: &RunConfig) -> Result<ScenarioReport, RunError> {
    let ctx = SimContext::shared(config.seed);

    // Deterministic trust root: same seed, same authority
    let authority = IdentityAuthority::new(RootKeyProvider::new(config.seed).biscuit_root_key());
    let verifier = Arc::new(IdentityVerifier::new(authority.public_key()));

    let audit = Arc::new(MemoryAuditSink::with_retention(
        MemoryAuditSink::DEFAULT_RETENTION,
    ));

    let rules: Arc<dyn RuleSource> = match &config.rules_path {
        Some(path) => Arc::new(FileRuleSource::new(path)),
        None => Arc::new(StaticRuleSource::default()),
    };

    let scoring = Arc::new(ScoringService::new(
        Arc::clone(&ctx),
        Arc::clone(&verifier),
        rules,
        ScoringEngine::new(
            Box::new(WeightedRandomClassifier::with_seed(config.seed)),
            ScoringConfig::default(),
        ),
        audit.clone() as Arc<dyn AuditSink>,
    ));

    let fusion = FusionService::new(
        Arc::clone(&ctx),
        verifier,
        FusionEngine::with_defaults(),
        audit.clone() as Arc<dyn AuditSink>,
        Arc::new(ScoringPushTarget::new(Arc::clone(&scoring))) as Arc<dyn TrackSink>,
    );

    let token = authority.issue_token(
        "operator@demo.local",
        Role::Operator,
        Duration::from_secs(7200),
        ctx.system_time(),
    )?;

    let mut generator = ScenarioGenerator::new(config.seed);

    for wave in 1..=config.waves {
        let observations = generator.wave(config.scenario, ctx.utc_now());
        let count = observations.len();

        for obs in observations {
            let ack = fusion.submit_observation(&token, obs).await?;
            debug!(track_id = %ack.track_id, created = ack.created, "observation correlated");
        }

        info!(wave, observations = count, "wave submitted");
        ctx.advance_time(WAVE_INTERVAL);
    }

    // Let the fire-and-forget scoring pushes and audit emits drain before
    // snapshotting the picture
    tokio::time::sleep(Duration::from_millis(150)).await;

    Ok(ScenarioReport {
        scenario: config.scenario.name(),
        seed: config.seed,
        waves: config.waves,
        tracks: fusion.list_tracks(),
        threats: scoring.list_threats(),
        fusion_stats: fusion.stats(),
        scoring_stats: scoring.stats(),
        audit_events: audit.recent(),
    })
}
