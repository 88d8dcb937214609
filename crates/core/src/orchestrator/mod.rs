//! Conversion orchestrator: scheduling, admission and recovery.
//!
//! The orchestrator owns the registry of live records and:
//! - **Schedules**: a periodic pass promotes queued records up to
//!   `max_conversions` and evicts expired ones
//! - **Admits**: caches free disk space so uploads can be refused early
//! - **Recovers**: re-registers persisted records once after startup

mod config;
mod registry;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{ConversionOrchestrator, INTERRUPTED_ERROR};
pub use types::{StatusSnapshot, TickReport};
