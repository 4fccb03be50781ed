//! String built-in.
//!
//! Strings are immutable values; every method returns a new value. Positions
//! count characters, not bytes.

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::value::DynamicValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;

use super::{number_arg, string_arg};

fn char_index(s: &str, needle: &str) -> i64 {
    match s.find(needle) {
        Some(byte_index) => s[..byte_index].chars().count() as i64,
        None => -1,
    }
}

/// Clamps a position argument into `0..=len`. Missing or NaN means `default`.
fn position_arg(args: &[DynamicValue], index: usize, len: usize, default: usize) -> usize {
    let n = number_arg(args, index);
    if n.is_nan() {
        default
    } else if n <= 0.0 {
        0
    } else {
        (n as usize).min(len)
    }
}

fn expect_args(name: &str, args: &[DynamicValue], count: usize) -> Result<(), ScriptError> {
    if args.len() < count {
        return Err(ScriptError::usage(format!(
            "String.{}: argument amount mismatch. Expected: {}",
            name, count
        )));
    }
    Ok(())
}

/// Calls the built-in method `name` on a string value.
pub fn call_string_method(
    ctx: &mut EvalContext,
    s: &str,
    name: &str,
    args: Vec<DynamicValue>,
) -> ValueResult {
    match name {
        "length" => Ok(DynamicValue::from(s.chars().count())),
        "indexOf" => {
            expect_args(name, &args, 1)?;
            Ok(DynamicValue::Int(char_index(s, &string_arg(&args, 0))))
        }
        "contains" => {
            expect_args(name, &args, 1)?;
            Ok(DynamicValue::Bool(s.contains(&string_arg(&args, 0))))
        }
        "substring" => {
            expect_args(name, &args, 1)?;
            let len = s.chars().count();
            let start = position_arg(&args, 0, len, 0);
            let end = position_arg(&args, 1, len, len);
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            Ok(DynamicValue::String(s.chars().skip(start).take(end - start).collect()))
        }
        "charAt" => {
            expect_args(name, &args, 1)?;
            let index = number_arg(&args, 0);
            let c = if index >= 0.0 {
                s.chars().nth(index as usize)
            } else {
                None
            };
            Ok(DynamicValue::String(c.map(String::from).unwrap_or_default()))
        }
        "toUpperCase" => Ok(DynamicValue::String(s.to_uppercase())),
        "toLowerCase" => Ok(DynamicValue::String(s.to_lowercase())),
        "trim" => Ok(DynamicValue::String(s.trim().to_string())),
        "split" => {
            let parts: Vec<DynamicValue> = match args.get(0) {
                None | Some(DynamicValue::Undefined) => vec![DynamicValue::from(s)],
                Some(separator) => {
                    let separator = separator.to_display_string();
                    if separator.is_empty() {
                        s.chars().map(|c| DynamicValue::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(DynamicValue::from).collect()
                    }
                }
            };
            ctx.new_array(parts)
        }
        "replace" => {
            expect_args(name, &args, 1)?;
            let from = string_arg(&args, 0);
            if from.is_empty() {
                return Ok(DynamicValue::from(s));
            }
            Ok(DynamicValue::String(s.replace(&from, &string_arg(&args, 1))))
        }
        _ => Err(ScriptError::type_error(format!("Unknown function '{}'", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::ScriptRealm;

    fn call(s: &str, name: &str, args: Vec<DynamicValue>) -> DynamicValue {
        let mut ctx = EvalContext::new(ScriptRealm::standalone(), None);
        call_string_method(&mut ctx, s, name, args).unwrap()
    }

    #[test]
    fn test_positions_count_characters() {
        assert_eq!(call("grüße", "indexOf", vec!["e".into()]), DynamicValue::Int(4));
        assert_eq!(call("grüße", "charAt", vec![DynamicValue::Int(2)]), DynamicValue::from("ü"));
        assert_eq!(call("grüße", "length", vec![]), DynamicValue::Int(5));
    }

    #[test]
    fn test_substring_swaps_and_clamps() {
        assert_eq!(
            call("Knob12", "substring", vec![DynamicValue::Int(4), DynamicValue::Int(0)]),
            DynamicValue::from("Knob")
        );
        assert_eq!(call("Knob12", "substring", vec![DynamicValue::Int(4)]), DynamicValue::from("12"));
        assert_eq!(
            call("Knob12", "substring", vec![DynamicValue::Int(-3), DynamicValue::Int(99)]),
            DynamicValue::from("Knob12")
        );
    }

    #[test]
    fn test_split_and_replace() {
        match call("a,b,c", "split", vec![",".into()]) {
            DynamicValue::Array(a) => assert_eq!(a.len(), 3),
            other => panic!("Unexpected value {:?}", other),
        }
        assert_eq!(call("a-b-c", "replace", vec!["-".into(), "+".into()]), DynamicValue::from("a+b+c"));
        assert_eq!(call("  pad ", "trim", vec![]), DynamicValue::from("pad"));
    }

    #[test]
    fn test_unknown_method() {
        let mut ctx = EvalContext::new(ScriptRealm::standalone(), None);
        let err = call_string_method(&mut ctx, "x", "shout", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown function 'shout'");
    }
}
