//! Descriptive data attached to broadcasters, targets and sources.

use uuid::Uuid;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::{DynamicValue, ObjectRef};

const METADATA_ERROR: &str = "metadata must be a JSON object with `id`, `comment`, `colour` and `tags` properties";

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub id: String,
    pub comment: String,
    pub colour: Option<u32>,
    pub tags: Vec<String>,
    /// Targets are called in ascending priority order.
    pub priority: i64,
}

impl Metadata {
    pub fn with_id(id: &str) -> Self {
        Metadata {
            id: id.to_string(),
            comment: String::new(),
            colour: None,
            tags: vec![],
            priority: 0,
        }
    }

    /// Metadata with a generated id, for items created without a name.
    pub fn anonymous() -> Self {
        Self::with_id(&Uuid::new_v4().to_string())
    }

    /// Parses the script form: either a plain id string or an object.
    pub fn from_value(value: &DynamicValue) -> Result<Self, ScriptError> {
        match value {
            DynamicValue::String(id) if !id.is_empty() => Ok(Self::with_id(id)),
            DynamicValue::Object(ObjectRef::Script(object)) => {
                let id = match object.get("id") {
                    Some(DynamicValue::String(id)) if !id.is_empty() => id,
                    _ => return Err(ScriptError::usage(METADATA_ERROR)),
                };
                let mut metadata = Self::with_id(&id);
                if let Some(comment) = object.get("comment") {
                    metadata.comment = to_string(&comment);
                }
                if let Some(colour) = object.get("colour") {
                    metadata.colour = Some(parse_colour(&colour)?);
                }
                if let Some(tags) = object.get("tags") {
                    metadata.tags = match tags {
                        DynamicValue::Array(a) => a.to_vec().iter().map(to_string).collect(),
                        DynamicValue::String(s) => vec![s],
                        _ => return Err(ScriptError::usage(METADATA_ERROR)),
                    };
                }
                if let Some(priority) = object.get("priority") {
                    if !priority.is_numeric() {
                        return Err(ScriptError::usage("priority must be a number"));
                    }
                    metadata.priority = priority.to_number() as i64;
                }
                Ok(metadata)
            }
            _ => Err(ScriptError::usage(METADATA_ERROR)),
        }
    }
}

/// Accepts an integer or a `0xAARRGGBB` string.
fn parse_colour(value: &DynamicValue) -> Result<u32, ScriptError> {
    match value {
        DynamicValue::Int(i) => Ok(*i as u32),
        DynamicValue::Double(d) => Ok(*d as i64 as u32),
        DynamicValue::String(s) => {
            let hex = s.trim_start_matches("0x").trim_start_matches("0X");
            u32::from_str_radix(hex, 16)
                .map_err(|_| ScriptError::usage(format!("Invalid colour: {}", s)))
        }
        other => Err(ScriptError::usage(format!("Invalid colour: {}", other))),
    }
}
