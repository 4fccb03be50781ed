//! Array built-in.
//!
//! Provides the `Array` class object (constructor, `isArray`) and the methods
//! scripts call on array values.

use std::any::Any;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::test_and_comparison::strict_equals;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::{reserve_to, ArrayRef, DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};

use super::index_arg;

lazy_static! {
    static ref ARRAY_BINDING: NativeObjectBinding = NativeObjectBinding::new("Array")
        .add_method("isArray", Some(1), true, array_is_array)
        .with_constructor(array_constructor);
}

pub struct ArrayClass;

impl NativeObject for ArrayClass {
    fn binding(&self) -> &'static NativeObjectBinding {
        &ARRAY_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `new Array()` is empty, `new Array(n)` has `n` undefined slots and any
/// other argument list becomes the elements.
fn array_constructor(ctx: &mut EvalContext, args: Vec<DynamicValue>) -> ValueResult {
    let elements = match args.as_slice() {
        [DynamicValue::Int(_)] | [DynamicValue::Double(_)] => {
            let size = index_arg(&args, 0, "Array size")?;
            let mut elements: Vec<DynamicValue> = vec![];
            reserve_to(&mut elements, size, ctx.realm.config().max_array_length(), "Array size")?;
            elements.resize(size, DynamicValue::Undefined);
            elements
        }
        _ => args,
    };
    ctx.new_array(elements)
}

fn array_is_array(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Bool(matches!(args[0], DynamicValue::Array(_))))
}

fn expect_args(name: &str, args: &[DynamicValue], count: usize) -> Result<(), ScriptError> {
    if args.len() < count {
        return Err(ScriptError::usage(format!(
            "Array.{}: argument amount mismatch. Expected: {}",
            name, count
        )));
    }
    Ok(())
}

/// Calls the built-in method `name` on an array value.
pub fn call_array_method(
    ctx: &mut EvalContext,
    array: &ArrayRef,
    name: &str,
    args: Vec<DynamicValue>,
) -> ValueResult {
    match name {
        "push" => {
            let mut length = array.len();
            for value in args {
                length = array.push(value);
            }
            Ok(DynamicValue::from(length))
        }
        "pop" => Ok(array
            .with_elements(|e| e.pop())
            .unwrap_or(DynamicValue::Void)),
        "indexOf" => {
            expect_args(name, &args, 1)?;
            let position = array.with_elements(|e| e.iter().position(|v| strict_equals(v, &args[0])));
            Ok(DynamicValue::Int(position.map(|p| p as i64).unwrap_or(-1)))
        }
        "contains" => {
            expect_args(name, &args, 1)?;
            Ok(DynamicValue::Bool(
                array.with_elements(|e| e.iter().any(|v| strict_equals(v, &args[0]))),
            ))
        }
        "join" => {
            let separator = match args.get(0) {
                None | Some(DynamicValue::Undefined) => ",".to_string(),
                Some(s) => to_string(s),
            };
            // Elements may themselves be arrays, so print from a snapshot.
            let joined = array
                .to_vec()
                .iter()
                .map(to_string)
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(DynamicValue::String(joined))
        }
        "clear" => {
            array.clear();
            Ok(DynamicValue::Undefined)
        }
        "insert" => {
            expect_args(name, &args, 1)?;
            let index = index_arg(&args, 0, "Array index")?;
            let values: Vec<DynamicValue> = args.into_iter().skip(1).collect();
            let max_len = ctx.realm.config().max_array_length();
            array.with_elements(|e| {
                let len = index.max(e.len()).saturating_add(values.len());
                reserve_to(e, len, max_len, "Array index")?;
                if index > e.len() {
                    e.resize(index, DynamicValue::Undefined);
                }
                for (offset, value) in values.into_iter().enumerate() {
                    e.insert(index + offset, value);
                }
                Ok::<(), ScriptError>(())
            })?;
            Ok(DynamicValue::Undefined)
        }
        "remove" => {
            expect_args(name, &args, 1)?;
            let removed = array.with_elements(|e| {
                let mut kept = Vec::with_capacity(e.len());
                let mut dropped = vec![];
                for v in e.drain(..) {
                    if strict_equals(&v, &args[0]) {
                        dropped.push(v);
                    } else {
                        kept.push(v);
                    }
                }
                *e = kept;
                dropped
            });
            Ok(DynamicValue::Bool(!removed.is_empty()))
        }
        "reverse" => {
            array.with_elements(|e| e.reverse());
            Ok(DynamicValue::Array(array.clone()))
        }
        "concat" => {
            let mut elements = array.to_vec();
            for value in args {
                match value {
                    DynamicValue::Array(other) => elements.extend(other.to_vec()),
                    other => elements.push(other),
                }
            }
            ctx.new_array(elements)
        }
        "length" => Ok(DynamicValue::from(array.len())),
        _ => Err(ScriptError::type_error(format!("Unknown function '{}'", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::ds::realm::ScriptRealm;
    use crate::runner::eval::statement::execute_program;
    use crate::runner::plugin::registry::ApiRegistry;

    fn eval(code: &str) -> DynamicValue {
        let realm = ScriptRealm::standalone();
        ApiRegistry::with_standard_classes().install(&realm).unwrap();
        let mut ctx = EvalContext::new(realm, None);
        let program = HiseParser::parse_to_ast_from_str(code).unwrap();
        execute_program(&program, &mut ctx).unwrap().get_value()
    }

    #[test]
    fn test_push_pop_and_length() {
        assert_eq!(eval("var a = [1]; a.push(2, 3); a.length;"), DynamicValue::Int(3));
        assert_eq!(eval("var a = [1, 2]; a.pop();"), DynamicValue::Int(2));
        assert_eq!(eval("var a = []; a.pop();"), DynamicValue::Void);
    }

    #[test]
    fn test_search() {
        assert_eq!(eval("[1, 2, 3].indexOf(3);"), DynamicValue::Int(2));
        assert_eq!(eval("[1, 2, 3].indexOf('3');"), DynamicValue::Int(-1));
        assert_eq!(eval("[1, 2, 3].contains(2);"), DynamicValue::Bool(true));
    }

    #[test]
    fn test_insert_remove_reverse() {
        assert_eq!(
            eval("var a = [1, 3]; a.insert(1, 2); a.join('-');"),
            DynamicValue::from("1-2-3")
        );
        assert_eq!(
            eval("var a = [1, 2, 1]; a.remove(1); a.join();"),
            DynamicValue::from("2")
        );
        assert_eq!(eval("[1, 2, 3].reverse().join('');"), DynamicValue::from("321"));
    }

    #[test]
    fn test_concat_returns_new_array() {
        assert_eq!(
            eval("var a = [1]; var b = a.concat([2, 3], 4); a.length * 10 + b.length;"),
            DynamicValue::Int(14)
        );
    }

    #[test]
    fn test_array_class() {
        assert_eq!(eval("var a = new Array(3); a.length;"), DynamicValue::Int(3));
        assert_eq!(eval("Array.isArray([]);"), DynamicValue::Bool(true));
        assert_eq!(eval("Array.isArray('x');"), DynamicValue::Bool(false));
    }
}
