//! Picket Simulation Harness
//!
//! Drives scripted observation scenarios through the fusion/scoring pipeline
//! under a virtual clock and a seeded trust root, so any run is reproducible
//! from its seed number.

pub mod context;
pub mod keys;
pub mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use keys::RootKeyProvider;
pub use runner::{run_scenario, RunConfig, RunError, ScenarioReport};
pub use scenarios::{ScenarioGenerator, ScenarioId};
