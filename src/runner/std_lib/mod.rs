//! The API classes scripts see as global singletons (`Console`, `Math`,
//! `Engine`, ...) plus the built-in methods of arrays and strings.
//!
//! API singletons are stateless. Whatever state they touch (content,
//! modules, the current MIDI event) is reached through the realm of the
//! calling context, so the same singleton works for every compiled script.

pub mod array;
pub mod buffer;
pub mod console;
pub mod content;
pub mod engine;
pub mod globals;
pub mod math;
pub mod message;
pub mod object;
pub mod string;
pub mod synth;

use std::sync::Arc;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::DynamicValue;
use crate::runner::plugin::registry::ApiRegistry;

/// Registers every standard API class and global function.
pub fn register_api_classes(registry: &mut ApiRegistry) {
    registry.register_api_class(Arc::new(console::ConsoleApi));
    registry.register_api_class(Arc::new(math::MathApi));
    registry.register_api_class(Arc::new(engine::EngineApi));
    registry.register_api_class(Arc::new(content::ContentApi));
    registry.register_api_class(Arc::new(synth::SynthApi));
    registry.register_api_class(Arc::new(message::MessageApi));
    registry.register_api_class(Arc::new(buffer::BufferClass));
    registry.register_api_class(Arc::new(array::ArrayClass));
    registry.register_api_class(Arc::new(object::ObjectClass));
    globals::register(registry);
}

/// The argument at `index`, or `Undefined` when it was not passed.
pub(crate) fn arg(args: &[DynamicValue], index: usize) -> DynamicValue {
    args.get(index).cloned().unwrap_or_default()
}

pub(crate) fn number_arg(args: &[DynamicValue], index: usize) -> f64 {
    args.get(index).map(|v| v.to_number()).unwrap_or(f64::NAN)
}

pub(crate) fn string_arg(args: &[DynamicValue], index: usize) -> String {
    args.get(index).map(to_string).unwrap_or_default()
}

/// A non-negative integer argument, such as a size or an index.
pub(crate) fn index_arg(args: &[DynamicValue], index: usize, what: &str) -> Result<usize, ScriptError> {
    let n = number_arg(args, index);
    if n.is_finite() && n >= 0.0 {
        Ok(n as usize)
    } else {
        Err(ScriptError::type_error(format!(
            "{} must be a non-negative number",
            what
        )))
    }
}
