use std::fmt;

use crate::parser::ast::Meta;
use crate::parser::ParseError;
use crate::runner::ds::value::DynamicValue;

/// Where in the script a runtime error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLocation {
    pub line: usize,
    pub column: usize,
}

impl From<&Meta> for CodeLocation {
    fn from(meta: &Meta) -> Self {
        CodeLocation {
            line: meta.line,
            column: meta.column,
        }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

fn thrown_message(value: &DynamicValue) -> String {
    value.to_display_string()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{message}")]
    Reference {
        message: String,
        location: Option<CodeLocation>,
    },
    #[error("{message}")]
    Type {
        message: String,
        location: Option<CodeLocation>,
    },
    #[error("{message}")]
    Range {
        message: String,
        location: Option<CodeLocation>,
    },
    #[error("{}", thrown_message(.value))]
    Thrown {
        value: DynamicValue,
        location: Option<CodeLocation>,
    },
    #[error("{message}")]
    Usage {
        message: String,
        location: Option<CodeLocation>,
    },
    #[error("Execution timed out after {budget_ms}ms")]
    Timeout {
        budget_ms: u64,
        location: Option<CodeLocation>,
    },
}

impl ScriptError {
    pub fn reference(message: impl Into<String>) -> Self {
        ScriptError::Reference {
            message: message.into(),
            location: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ScriptError::Type {
            message: message.into(),
            location: None,
        }
    }

    pub fn range(message: impl Into<String>) -> Self {
        ScriptError::Range {
            message: message.into(),
            location: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        ScriptError::Usage {
            message: message.into(),
            location: None,
        }
    }

    pub fn thrown(value: DynamicValue) -> Self {
        ScriptError::Thrown {
            value,
            location: None,
        }
    }

    pub fn timeout(budget_ms: u64) -> Self {
        ScriptError::Timeout {
            budget_ms,
            location: None,
        }
    }

    /// Script `try/catch` can observe everything except the watchdog abort.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, ScriptError::Timeout { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScriptError::Timeout { .. })
    }

    pub fn location(&self) -> Option<CodeLocation> {
        match self {
            ScriptError::Parse(e) => Some(CodeLocation {
                line: e.line,
                column: e.column,
            }),
            ScriptError::Reference { location, .. }
            | ScriptError::Type { location, .. }
            | ScriptError::Range { location, .. }
            | ScriptError::Thrown { location, .. }
            | ScriptError::Usage { location, .. }
            | ScriptError::Timeout { location, .. } => *location,
        }
    }

    /// Records the innermost statement position; an existing location is kept.
    pub fn with_location(mut self, meta: &Meta) -> Self {
        match &mut self {
            ScriptError::Parse(_) => {}
            ScriptError::Reference { location, .. }
            | ScriptError::Type { location, .. }
            | ScriptError::Range { location, .. }
            | ScriptError::Thrown { location, .. }
            | ScriptError::Usage { location, .. }
            | ScriptError::Timeout { location, .. } => {
                if location.is_none() {
                    *location = Some(CodeLocation::from(meta));
                }
            }
        }
        self
    }

    /// The value a `catch` clause binds.
    pub fn to_caught_value(&self) -> DynamicValue {
        match self {
            ScriptError::Thrown { value, .. } => value.clone(),
            other => DynamicValue::String(other.to_string()),
        }
    }

    /// The message reported at the callback boundary, prefixed with the position when known.
    pub fn report(&self) -> String {
        match self {
            ScriptError::Parse(e) => e.to_string(),
            other => match other.location() {
                Some(location) => format!("{} (line {})", other, location),
                None => other.to_string(),
            },
        }
    }
}

/// Outcome crossing the interpreter boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptResult {
    Ok,
    Fail(String),
}

impl ScriptResult {
    pub fn fail(message: impl Into<String>) -> Self {
        ScriptResult::Fail(message.into())
    }

    pub fn was_ok(&self) -> bool {
        matches!(self, ScriptResult::Ok)
    }

    pub fn failed(&self) -> bool {
        !self.was_ok()
    }

    /// The failure message, or an empty string.
    pub fn error_message(&self) -> &str {
        match self {
            ScriptResult::Ok => "",
            ScriptResult::Fail(m) => m,
        }
    }
}

impl<T> From<Result<T, ScriptError>> for ScriptResult {
    fn from(r: Result<T, ScriptError>) -> Self {
        match r {
            Ok(_) => ScriptResult::Ok,
            Err(e) => ScriptResult::Fail(e.report()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_attached_once() {
        let outer = Meta {
            line: 9,
            column: 1,
            ..Meta::default()
        };
        let inner = Meta {
            line: 3,
            column: 5,
            ..Meta::default()
        };
        let e = ScriptError::type_error("boom")
            .with_location(&inner)
            .with_location(&outer);
        assert_eq!(e.location(), Some(CodeLocation { line: 3, column: 5 }));
        assert_eq!(e.report(), "boom (line 3:5)");
    }

    #[test]
    fn test_timeout_is_not_catchable() {
        assert!(!ScriptError::timeout(10).is_catchable());
        assert!(ScriptError::usage("x").is_catchable());
    }

    #[test]
    fn test_caught_value_of_thrown_error_is_the_value() {
        let e = ScriptError::thrown(DynamicValue::Int(4));
        assert!(matches!(e.to_caught_value(), DynamicValue::Int(4)));
        let e = ScriptError::reference("x is not defined");
        match e.to_caught_value() {
            DynamicValue::String(s) => assert_eq!(s, "x is not defined"),
            other => panic!("Unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_script_result_from_error() {
        let r: ScriptResult = Err::<(), _>(ScriptError::range("Out of memory")).into();
        assert_eq!(r, ScriptResult::fail("Out of memory"));
        assert_eq!(r.error_message(), "Out of memory");
    }
}
