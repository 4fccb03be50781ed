//! Binary and unary arithmetic on dynamic values.
//!
//! Integer operands stay integers while the result is exact and fits in 64
//! bits; everything else is computed in double precision. Bitwise operators
//! work on 32-bit truncations.

use crate::parser::ast::BinaryOperator;
use crate::runner::ds::operations::type_conversion::{
    to_int32, to_numeric, to_string, to_uint32, Numeric,
};
use crate::runner::ds::value::DynamicValue;

fn concatenates(v: &DynamicValue) -> bool {
    matches!(
        v,
        DynamicValue::String(_)
            | DynamicValue::Array(_)
            | DynamicValue::Object(_)
            | DynamicValue::Function(_)
            | DynamicValue::Buffer(_)
    )
}

pub fn add(a: &DynamicValue, b: &DynamicValue) -> DynamicValue {
    if concatenates(a) || concatenates(b) {
        let mut s = to_string(a);
        s.push_str(&to_string(b));
        return DynamicValue::String(s);
    }
    match (to_numeric(a), to_numeric(b)) {
        (Numeric::Int(x), Numeric::Int(y)) => match x.checked_add(y) {
            Some(r) => DynamicValue::Int(r),
            None => DynamicValue::Double(x as f64 + y as f64),
        },
        (x, y) => DynamicValue::Double(x.as_f64() + y.as_f64()),
    }
}

pub fn subtract(a: &DynamicValue, b: &DynamicValue) -> DynamicValue {
    match (to_numeric(a), to_numeric(b)) {
        (Numeric::Int(x), Numeric::Int(y)) => match x.checked_sub(y) {
            Some(r) => DynamicValue::Int(r),
            None => DynamicValue::Double(x as f64 - y as f64),
        },
        (x, y) => DynamicValue::Double(x.as_f64() - y.as_f64()),
    }
}

pub fn multiply(a: &DynamicValue, b: &DynamicValue) -> DynamicValue {
    match (to_numeric(a), to_numeric(b)) {
        (Numeric::Int(x), Numeric::Int(y)) => match x.checked_mul(y) {
            Some(r) => DynamicValue::Int(r),
            None => DynamicValue::Double(x as f64 * y as f64),
        },
        (x, y) => DynamicValue::Double(x.as_f64() * y.as_f64()),
    }
}

pub fn divide(a: &DynamicValue, b: &DynamicValue) -> DynamicValue {
    match (to_numeric(a), to_numeric(b)) {
        (Numeric::Int(x), Numeric::Int(y)) if y != 0 && x.checked_rem(y) == Some(0) => {
            match x.checked_div(y) {
                Some(r) => DynamicValue::Int(r),
                None => DynamicValue::Double(x as f64 / y as f64),
            }
        }
        (x, y) => DynamicValue::Double(x.as_f64() / y.as_f64()),
    }
}

pub fn modulo(a: &DynamicValue, b: &DynamicValue) -> DynamicValue {
    match (to_numeric(a), to_numeric(b)) {
        (Numeric::Int(x), Numeric::Int(y)) if y != 0 => match x.checked_rem(y) {
            Some(r) => DynamicValue::Int(r),
            None => DynamicValue::Int(0),
        },
        (x, y) => DynamicValue::Double(x.as_f64() % y.as_f64()),
    }
}

pub fn negate(a: &DynamicValue) -> DynamicValue {
    match to_numeric(a) {
        Numeric::Int(x) => match x.checked_neg() {
            Some(r) => DynamicValue::Int(r),
            None => DynamicValue::Double(-(x as f64)),
        },
        Numeric::Double(d) => DynamicValue::Double(-d),
    }
}

pub fn bitwise_not(a: &DynamicValue) -> DynamicValue {
    DynamicValue::Int(!to_int32(a) as i64)
}

/// Applies a non-logical, non-comparison binary operator.
pub fn apply_arithmetic(op: BinaryOperator, a: &DynamicValue, b: &DynamicValue) -> Option<DynamicValue> {
    Some(match op {
        BinaryOperator::Add => add(a, b),
        BinaryOperator::Subtract => subtract(a, b),
        BinaryOperator::Multiply => multiply(a, b),
        BinaryOperator::Divide => divide(a, b),
        BinaryOperator::Modulo => modulo(a, b),
        BinaryOperator::BitwiseAnd => DynamicValue::Int((to_int32(a) & to_int32(b)) as i64),
        BinaryOperator::BitwiseOr => DynamicValue::Int((to_int32(a) | to_int32(b)) as i64),
        BinaryOperator::BitwiseXor => DynamicValue::Int((to_int32(a) ^ to_int32(b)) as i64),
        BinaryOperator::BitwiseLeftShift => {
            DynamicValue::Int(to_int32(a).wrapping_shl(to_uint32(b) & 31) as i64)
        }
        BinaryOperator::BitwiseRightShift => {
            DynamicValue::Int(to_int32(a).wrapping_shr(to_uint32(b) & 31) as i64)
        }
        BinaryOperator::BitwiseUnsignedRightShift => {
            DynamicValue::Int((to_uint32(a) >> (to_uint32(b) & 31)) as i64)
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(add(&DynamicValue::Int(2), &DynamicValue::Int(3)), DynamicValue::Int(5));
        assert_eq!(divide(&DynamicValue::Int(6), &DynamicValue::Int(3)), DynamicValue::Int(2));
        assert_eq!(divide(&DynamicValue::Int(7), &DynamicValue::Int(2)), DynamicValue::Double(3.5));
        assert_eq!(modulo(&DynamicValue::Int(-7), &DynamicValue::Int(3)), DynamicValue::Int(-1));
    }

    #[test]
    fn test_overflow_promotes_to_double() {
        assert_eq!(
            add(&DynamicValue::Int(i64::MAX), &DynamicValue::Int(1)),
            DynamicValue::Double(i64::MAX as f64 + 1.0)
        );
        assert_eq!(
            multiply(&DynamicValue::Int(i64::MAX), &DynamicValue::Int(2)),
            DynamicValue::Double(i64::MAX as f64 * 2.0)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            divide(&DynamicValue::Int(1), &DynamicValue::Int(0)),
            DynamicValue::Double(f64::INFINITY)
        );
        match modulo(&DynamicValue::Int(1), &DynamicValue::Int(0)) {
            DynamicValue::Double(d) => assert!(d.is_nan()),
            other => panic!("Unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            add(&DynamicValue::String("a".into()), &DynamicValue::Int(1)),
            DynamicValue::String("a1".into())
        );
        assert_eq!(
            add(&DynamicValue::Double(0.5), &DynamicValue::String("x".into())),
            DynamicValue::String("0.5x".into())
        );
    }

    #[test]
    fn test_bitwise_uses_int32() {
        let r = apply_arithmetic(
            BinaryOperator::BitwiseOr,
            &DynamicValue::Double(4294967296.5),
            &DynamicValue::Int(1),
        );
        assert_eq!(r, Some(DynamicValue::Int(1)));
        let r = apply_arithmetic(
            BinaryOperator::BitwiseUnsignedRightShift,
            &DynamicValue::Int(-1),
            &DynamicValue::Int(28),
        );
        assert_eq!(r, Some(DynamicValue::Int(15)));
        let r = apply_arithmetic(
            BinaryOperator::BitwiseLeftShift,
            &DynamicValue::Int(1),
            &DynamicValue::Int(33),
        );
        assert_eq!(r, Some(DynamicValue::Int(2)));
    }
}
