//! Core types for the evaluation engine.

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::value::DynamicValue;

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionType {
    /// Execution continues with the next statement.
    Normal,
    /// The enclosing function returns.
    Return,
    /// Leave the innermost loop or switch.
    Break,
    /// Start the next iteration of the innermost loop.
    Continue,
}

/// Completion record. Every statement execution returns one.
#[derive(Debug, Clone)]
pub struct Completion {
    pub completion_type: CompletionType,
    /// The value of the last expression statement, or the returned value.
    pub value: Option<DynamicValue>,
}

impl Completion {
    pub fn normal() -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: None,
        }
    }

    pub fn normal_with_value(value: DynamicValue) -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: Some(value),
        }
    }

    pub fn return_value(value: DynamicValue) -> Self {
        Completion {
            completion_type: CompletionType::Return,
            value: Some(value),
        }
    }

    pub fn break_completion() -> Self {
        Completion {
            completion_type: CompletionType::Break,
            value: None,
        }
    }

    pub fn continue_completion() -> Self {
        Completion {
            completion_type: CompletionType::Continue,
            value: None,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.completion_type == CompletionType::Normal
    }

    pub fn is_abrupt(&self) -> bool {
        !self.is_normal()
    }

    /// The value, or `Undefined` if none.
    pub fn get_value(&self) -> DynamicValue {
        self.value.clone().unwrap_or(DynamicValue::Undefined)
    }

    /// Keeps the previous value when this completion carries none.
    pub fn update_empty(self, value: Option<DynamicValue>) -> Self {
        if self.value.is_none() {
            Completion { value, ..self }
        } else {
            self
        }
    }
}

/// Something an assignment or update expression can store into.
#[derive(Clone)]
pub enum Reference {
    /// A binding looked up through the scope chain.
    Binding(String),
    /// A member of a value: `base[key]` or `base.key`.
    Property { base: DynamicValue, key: DynamicValue },
}

/// Result type for statement execution.
pub type EvalResult = Result<Completion, ScriptError>;

/// Result type for value-returning operations.
pub type ValueResult = Result<DynamicValue, ScriptError>;

/// Result type for reference-returning operations.
pub type ReferenceResult = Result<Reference, ScriptError>;
