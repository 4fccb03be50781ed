//! Function call execution.
//!
//! Script closures run in a fresh function scope parented at the scope they
//! captured, never at the caller's scope. Native methods are looked up in the
//! receiver's binding and checked for arity before they run.

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::object::get_property;
use crate::runner::ds::scope::{BindingKind, Scope, ScopeKind};
use crate::runner::ds::value::{DynamicValue, FunctionRef, NativeObjectRef, ObjectRef};
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::{array, string};

use super::statement::execute_function_body;
use super::types::{CompletionType, ValueResult};

/// Call a script closure with the given `this` and arguments.
///
/// Missing arguments are bound to `Undefined`, surplus ones are ignored.
pub fn call_function(
    ctx: &mut EvalContext,
    function: &FunctionRef,
    this_value: DynamicValue,
    args: Vec<DynamicValue>,
) -> ValueResult {
    ctx.check_timeout()?;
    if ctx.call_depth >= ctx.realm.config().execution.max_call_depth {
        return Err(ScriptError::range("Maximum call stack size exceeded"));
    }
    let captured = function.scope().ok_or_else(|| {
        ScriptError::type_error(format!("Function {} has been released", function.name()))
    })?;
    let scope = Scope::new_child(&captured, ScopeKind::Function);
    ctx.realm.heap().track_scope(&scope)?;

    let data = function.data.clone();
    let mut args = args.into_iter();
    for param in data.params.iter() {
        let value = args.next().unwrap_or(DynamicValue::Undefined);
        scope.declare(&param.name, value, BindingKind::Parameter)?;
    }
    for name in data.body.var_names.iter() {
        scope.declare(name, DynamicValue::Undefined, BindingKind::Hoisted)?;
    }

    let this_value = function.bound_this().unwrap_or(this_value);
    ctx.call_depth += 1;
    let result = ctx.with_frame(scope, this_value, |ctx| execute_function_body(&data.body, ctx));
    ctx.call_depth -= 1;

    let completion = result?;
    Ok(match completion.completion_type {
        CompletionType::Return => completion.get_value(),
        _ => DynamicValue::Undefined,
    })
}

/// Call a method from the receiver's native binding.
pub fn call_native_method(
    ctx: &mut EvalContext,
    receiver: &NativeObjectRef,
    name: &str,
    args: Vec<DynamicValue>,
) -> ValueResult {
    ctx.check_timeout()?;
    let binding = receiver.binding();
    let method = binding
        .find_method(name)
        .ok_or_else(|| ScriptError::type_error(format!("Unknown function '{}'", name)))?;
    if let Some(arity) = method.arity {
        if args.len() != arity {
            return Err(ScriptError::usage(format!(
                "{}.{}: argument amount mismatch. Expected: {}",
                binding.class_name(),
                name,
                arity
            )));
        }
    }
    (method.function)(ctx, receiver, args)
}

/// Call anything callable: a closure or a native object with the `Callable` capability.
pub fn call_value(
    ctx: &mut EvalContext,
    callee: &DynamicValue,
    this_value: DynamicValue,
    args: Vec<DynamicValue>,
) -> ValueResult {
    match callee {
        DynamicValue::Function(f) => call_function(ctx, f, this_value, args),
        DynamicValue::Object(ObjectRef::Native(n)) => match n.as_callable() {
            Some(callable) => {
                ctx.check_timeout()?;
                callable.call(ctx, n, args)
            }
            None => Err(ScriptError::type_error(format!(
                "{} is not a function",
                n.class_name()
            ))),
        },
        other => Err(ScriptError::type_error(format!(
            "{} is not a function",
            other.kind_name()
        ))),
    }
}

/// `base.name(args)`: built-in value methods, native methods, or a callable member.
pub fn call_method(
    ctx: &mut EvalContext,
    base: &DynamicValue,
    name: &str,
    args: Vec<DynamicValue>,
) -> ValueResult {
    match base {
        DynamicValue::Array(a) => array::call_array_method(ctx, a, name, args),
        DynamicValue::String(s) => string::call_string_method(ctx, s, name, args),
        DynamicValue::Object(ObjectRef::Native(n)) if n.binding().find_method(name).is_some() => {
            call_native_method(ctx, n, name, args)
        }
        _ => {
            let member = get_property(ctx, base, &DynamicValue::String(name.to_string()))?;
            if member.is_callable() {
                call_value(ctx, &member, base.clone(), args)
            } else {
                Err(ScriptError::type_error(format!("Unknown function '{}'", name)))
            }
        }
    }
}

/// `new callee(args)`.
pub fn construct(ctx: &mut EvalContext, callee: &DynamicValue, args: Vec<DynamicValue>) -> ValueResult {
    match callee {
        DynamicValue::Object(ObjectRef::Native(n)) => match n.binding().constructor() {
            Some(constructor) => constructor(ctx, args),
            None => Err(ScriptError::type_error(format!(
                "{} is not a constructor",
                n.class_name()
            ))),
        },
        DynamicValue::Function(f) if !f.data.is_inline() => {
            let object = ctx.new_object(Default::default())?;
            let returned = call_function(ctx, f, object.clone(), args)?;
            Ok(match returned {
                DynamicValue::Object(_) | DynamicValue::Array(_) => returned,
                _ => object,
            })
        }
        other => Err(ScriptError::type_error(format!(
            "{} is not a constructor",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::ds::realm::{RealmServices, ScriptRealm};
    use crate::runner::eval::statement::execute_program;
    use crate::runner::plugin::config::EngineConfig;

    fn run(code: &str) -> (EvalContext, DynamicValue) {
        let program = HiseParser::parse_to_ast_from_str(code).unwrap();
        let mut ctx = EvalContext::new(ScriptRealm::standalone(), None);
        let value = execute_program(&program, &mut ctx).unwrap().get_value();
        (ctx, value)
    }

    #[test]
    fn test_missing_arguments_are_undefined() {
        let (_, value) = run("function f(a, b) { return typeof b; } f(1);");
        assert_eq!(value, DynamicValue::from("undefined"));
    }

    #[test]
    fn test_deep_recursion_is_range_error() {
        let program = HiseParser::parse_to_ast_from_str("function f(n) { return f(n + 1); } f(0);").unwrap();
        let mut config = EngineConfig::default();
        config.execution.max_call_depth = 16;
        let realm = ScriptRealm::new(0, RealmServices::standalone(config));
        let mut ctx = EvalContext::new(realm, None);
        let err = execute_program(&program, &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "Maximum call stack size exceeded");
    }

    #[test]
    fn test_closure_uses_captured_scope() {
        let (_, value) = run(
            "var x = 'global';
             function make() { var x = 'inner'; return function() { return x; }; }
             function callIt(f) { var x = 'caller'; return f(); }
             callIt(make());",
        );
        assert_eq!(value, DynamicValue::from("inner"));
    }
}
