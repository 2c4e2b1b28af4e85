//! Rule-based strategy DSL

pub mod compiler;
pub mod schema;

pub use compiler::{compile, CompileError, RuleBasedStrategy};
pub use schema::StrategyDoc;
