//! Picket Environment Abstraction Layer
//!
//! This crate provides the abstraction allowing the Picket engines to run
//! against **production** plumbing (tokio, wall clock) and **simulation**
//! plumbing (virtual clock, seeded entropy) without code changes.
//!
//! Everything the engines need from the outside world passes through here:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task dispatch (`spawn()`) for fire-and-forget side channels
//! - The audit side channel (`AuditSink`), which is best-effort by contract:
//!   its failures are logged and discarded, never propagated
//!
//! # Example
//!
//! ```ignore
//! use picket_env::{PicketContext, TokioContext};
//!
//! let ctx = TokioContext::shared();
//! ctx.spawn("audit-emit", async move {
//!     // dispatched after the primary mutation commits
//! });
//! ```

mod audit;
mod context;
mod error;
mod tokio_impl;
mod types;

pub use audit::{AuditSink, MemoryAuditSink, NullAuditSink};
pub use context::PicketContext;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use types::AuditRecord;
