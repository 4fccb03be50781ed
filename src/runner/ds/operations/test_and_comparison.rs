use std::cmp::Ordering;

use crate::runner::ds::operations::type_conversion::{to_number, to_string};
use crate::runner::ds::value::DynamicValue;

fn is_primitive(v: &DynamicValue) -> bool {
    matches!(
        v,
        DynamicValue::Bool(_) | DynamicValue::Int(_) | DynamicValue::Double(_) | DynamicValue::String(_)
    )
}

/// `===`: same kind and same value. Int and Double count as one kind.
pub fn strict_equals(a: &DynamicValue, b: &DynamicValue) -> bool {
    match (a, b) {
        (DynamicValue::Undefined, DynamicValue::Undefined) => true,
        (DynamicValue::Void, DynamicValue::Void) => true,
        (DynamicValue::Bool(x), DynamicValue::Bool(y)) => x == y,
        (DynamicValue::Int(x), DynamicValue::Int(y)) => x == y,
        (DynamicValue::Int(x), DynamicValue::Double(y)) => (*x as f64) == *y,
        (DynamicValue::Double(x), DynamicValue::Int(y)) => *x == (*y as f64),
        (DynamicValue::Double(x), DynamicValue::Double(y)) => x == y,
        (DynamicValue::String(x), DynamicValue::String(y)) => x == y,
        _ => match (a.ptr_id(), b.ptr_id()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// `==` with script coercion.
pub fn loose_equals(a: &DynamicValue, b: &DynamicValue) -> bool {
    match (a, b) {
        (DynamicValue::Undefined, _) | (DynamicValue::Void, _) => b.is_undefined_or_void(),
        (_, DynamicValue::Undefined) | (_, DynamicValue::Void) => false,
        (DynamicValue::String(x), DynamicValue::String(y)) => x == y,
        _ if is_primitive(a) && is_primitive(b) => to_number(a) == to_number(b),
        _ if is_primitive(a) => loose_equals(a, &DynamicValue::String(to_string(b))),
        _ if is_primitive(b) => loose_equals(&DynamicValue::String(to_string(a)), b),
        _ => strict_equals(a, b),
    }
}

/// Relational ordering. Two strings compare lexicographically; anything else
/// numerically, with `None` when either side is NaN.
pub fn compare(a: &DynamicValue, b: &DynamicValue) -> Option<Ordering> {
    match (a, b) {
        (DynamicValue::String(x), DynamicValue::String(y)) => Some(x.cmp(y)),
        (DynamicValue::Int(x), DynamicValue::Int(y)) => Some(x.cmp(y)),
        _ => to_number(a).partial_cmp(&to_number(b)),
    }
}
