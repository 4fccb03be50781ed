//! Evaluation module for executing the script AST.
//!
//! The evaluator walks the tree directly. All mutable state lives in scopes
//! and values; the AST is shared read-only between concurrent calls.

pub mod expression;
pub mod function;
pub mod realtime;
pub mod statement;
pub mod types;

pub use types::{Completion, CompletionType, EvalResult, Reference, ValueResult};
