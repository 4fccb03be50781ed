//! `Console`: script output and assertions.

use std::any::Any;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::test_and_comparison::loose_equals;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};

use super::arg;

lazy_static! {
    static ref CONSOLE_BINDING: NativeObjectBinding = NativeObjectBinding::new("Console")
        .add_method("print", None, false, console_print)
        .add_method("assertTrue", Some(1), true, console_assert_true)
        .add_method("assertEqual", Some(2), true, console_assert_equal)
        .add_method("assertIsDefined", Some(1), true, console_assert_is_defined);
}

pub struct ConsoleApi;

impl NativeObject for ConsoleApi {
    fn binding(&self) -> &'static NativeObjectBinding {
        &CONSOLE_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Prints all arguments separated by a space.
fn console_print(ctx: &mut EvalContext, _receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let line = args
        .iter()
        .map(|a| a.to_display_string())
        .collect::<Vec<_>>()
        .join(" ");
    ctx.realm.console().print(line);
    Ok(DynamicValue::Undefined)
}

fn console_assert_true(_ctx: &mut EvalContext, _receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    if !arg(&args, 0).is_truthy() {
        return Err(ScriptError::usage("Assertion failure: condition is false"));
    }
    Ok(DynamicValue::Undefined)
}

fn console_assert_equal(_ctx: &mut EvalContext, _receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let (a, b) = (arg(&args, 0), arg(&args, 1));
    if !loose_equals(&a, &b) {
        return Err(ScriptError::usage(format!(
            "Assertion failure: values are unequal. Expected: {}, actual: {}",
            b, a
        )));
    }
    Ok(DynamicValue::Undefined)
}

fn console_assert_is_defined(
    _ctx: &mut EvalContext,
    _receiver: &NativeObjectRef,
    args: Vec<DynamicValue>,
) -> ValueResult {
    if arg(&args, 0).is_undefined_or_void() {
        return Err(ScriptError::usage("Assertion failure: value is undefined"));
    }
    Ok(DynamicValue::Undefined)
}
