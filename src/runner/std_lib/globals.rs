//! Free functions available in every script: `isDefined`, `parseInt` and
//! `parseFloat`.

use std::any::Any;
use std::sync::Arc;

use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::registry::ApiRegistry;
use crate::runner::plugin::types::{Callable, EvalContext, NativeObject, NativeObjectBinding};

use super::arg;

lazy_static! {
    static ref GLOBAL_FUNCTION_BINDING: NativeObjectBinding = NativeObjectBinding::new("GlobalFunction");
}

type GlobalFn = fn(args: &[DynamicValue]) -> DynamicValue;

/// A native function bound to a global name.
pub struct GlobalFunction {
    name: &'static str,
    function: GlobalFn,
}

impl NativeObject for GlobalFunction {
    fn binding(&self) -> &'static NativeObjectBinding {
        &GLOBAL_FUNCTION_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_script_string(&self) -> String {
        format!("function {}", self.name)
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }
}

impl Callable for GlobalFunction {
    fn call(&self, _ctx: &mut EvalContext, _receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
        Ok((self.function)(&args))
    }
}

pub fn register(registry: &mut ApiRegistry) {
    let functions: [(&'static str, GlobalFn); 3] = [
        ("isDefined", is_defined),
        ("parseInt", parse_int),
        ("parseFloat", parse_float),
    ];
    for (name, function) in functions.iter() {
        registry.register_native_object(
            name,
            Arc::new(GlobalFunction {
                name: *name,
                function: *function,
            }),
        );
    }
}

fn is_defined(args: &[DynamicValue]) -> DynamicValue {
    DynamicValue::Bool(!arg(args, 0).is_undefined_or_void())
}

/// Length of the longest prefix of `s` matching `[+-]?digits`.
fn integer_prefix(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        0
    } else {
        end
    }
}

fn parse_int(args: &[DynamicValue]) -> DynamicValue {
    match arg(args, 0) {
        DynamicValue::Int(i) => DynamicValue::Int(i),
        DynamicValue::Double(d) if d.is_finite() => DynamicValue::Int(d.trunc() as i64),
        other => {
            let text = to_string(&other);
            let text = text.trim_start();
            match text[..integer_prefix(text)].parse::<i64>() {
                Ok(i) => DynamicValue::Int(i),
                Err(_) => DynamicValue::Double(f64::NAN),
            }
        }
    }
}

fn parse_float(args: &[DynamicValue]) -> DynamicValue {
    let value = arg(args, 0);
    if value.is_numeric() {
        return DynamicValue::Double(value.to_number());
    }
    let text = to_string(&value);
    let text = text.trim_start();
    // Longest prefix that still parses as a float.
    let mut best = None;
    for (end, _) in text.char_indices().skip(1).chain(std::iter::once((text.len(), ' '))) {
        if let Ok(d) = text[..end].parse::<f64>() {
            if !text[..end].ends_with(|c: char| c.is_alphabetic()) {
                best = Some(d);
            }
        }
    }
    DynamicValue::Double(best.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_reads_leading_integer() {
        assert_eq!(parse_int(&["12px".into()]), DynamicValue::Int(12));
        assert_eq!(parse_int(&[" -7".into()]), DynamicValue::Int(-7));
        assert_eq!(parse_int(&[DynamicValue::Double(3.9)]), DynamicValue::Int(3));
        assert!(parse_int(&["px".into()]).to_number().is_nan());
    }

    #[test]
    fn test_parse_float_reads_leading_number() {
        assert_eq!(parse_float(&["0.25dB".into()]), DynamicValue::Double(0.25));
        assert_eq!(parse_float(&["1e3".into()]), DynamicValue::Double(1000.0));
        assert!(parse_float(&["inf".into()]).to_number().is_nan());
    }

    #[test]
    fn test_is_defined() {
        assert_eq!(is_defined(&[DynamicValue::Void]), DynamicValue::Bool(false));
        assert_eq!(is_defined(&[]), DynamicValue::Bool(false));
        assert_eq!(is_defined(&[DynamicValue::Int(0)]), DynamicValue::Bool(true));
    }
}
