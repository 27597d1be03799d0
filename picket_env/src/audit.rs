//! Audit sink abstraction.
//!
//! The audit log is an external append-only collaborator. Delivery is
//! best-effort and fire-and-forget: the engines dispatch one attempt with a
//! bounded timeout and discard the outcome. Nothing in the primary path may
//! depend on a sink succeeding.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::EnvError;
use crate::types::AuditRecord;

/// Abstraction over the external audit-log collaborator.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Delivers one audit record.
    ///
    /// # Note
    /// Callers treat any error as a fail-open condition: it is logged and
    /// never propagated to the request that produced the record.
    async fn record(&self, event: AuditRecord) -> Result<(), EnvError>;
}

/// In-memory audit sink retaining the most recent records.
///
/// Mirrors the behavior of the reference audit-log service: append-only with
/// a rolling window, newest-first read-back. Used by the simulation harness
/// and by tests.
pub struct MemoryAuditSink {
    events: Mutex<VecDeque<AuditRecord>>,
    retention: usize,
}

impl MemoryAuditSink {
    /// Default rolling-window size, matching the reference audit log.
    pub const DEFAULT_RETENTION: usize = 10;

    pub fn new() -> Self {
        Self::with_retention(Self::DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    /// Returns retained records, newest first.
    pub fn recent(&self) -> Vec<AuditRecord> {
        let events = self.events.lock().expect("audit sink lock poisoned");
        events.iter().rev().cloned().collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.events.lock().expect("audit sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all retained records.
    pub fn reset(&self) {
        self.events.lock().expect("audit sink lock poisoned").clear();
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditRecord) -> Result<(), EnvError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| EnvError::ContextError("audit sink lock poisoned".into()))?;
        events.push_back(event);
        while events.len() > self.retention {
            events.pop_front();
        }
        Ok(())
    }
}

/// Sink that discards every record. For hosts that run without an audit log.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _event: AuditRecord) -> Result<(), EnvError> {
        Ok(())
    }
}
