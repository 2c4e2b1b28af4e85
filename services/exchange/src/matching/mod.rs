//! Matching engine and settlement

pub mod engine;
pub mod settlement;

pub use engine::{Engine, NewOrder, SubmitOutcome};
