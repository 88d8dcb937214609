//! HTTP front end for the webpit conversion scheduler.
//!
//! The binary in `main.rs` wires configuration, the document store and the
//! orchestrator together; everything request-facing lives here so it can be
//! driven in-process by tests.

pub mod api;
pub mod metrics;
pub mod state;
