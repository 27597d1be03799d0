//! Core environment context trait for Picket services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the Picket engines can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and the system clock
/// - **Simulation**: `SimContext` (in `picket_sim`) - manually advanced clock
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism (time) are
/// controlled by the implementation, so a scenario replayed against the
/// simulation context produces identical timestamps.
#[async_trait]
pub trait PicketContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for entity timestamps.
    ///
    /// In simulation this is derived from the virtual clock plus a fixed
    /// epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Returns the wall-clock time as a UTC timestamp.
    ///
    /// Convenience over `system_time()` for the `*_utc` fields on tracks,
    /// threats, and audit records.
    fn utc_now(&self) -> DateTime<Utc> {
        self.system_time().into()
    }

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// Used to dispatch best-effort side channels (audit emission, the
    /// downstream track push) after the primary state mutation commits.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
