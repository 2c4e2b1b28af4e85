//! Agent platform service
//!
//! Runs autonomous trading agents against the exchange's public API: a
//! strategy catalog with a rule-based DSL, a per-agent tick runtime, and a
//! REST surface for agent lifecycle management.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod state;
pub mod strategies;
