//! `Math`: numeric constants and functions.

use std::any::Any;

use rand::Rng;

use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};

use super::number_arg;

lazy_static! {
    static ref MATH_BINDING: NativeObjectBinding = NativeObjectBinding::new("Math")
        .add_constant("PI", DynamicValue::Double(std::f64::consts::PI))
        .add_constant("E", DynamicValue::Double(std::f64::consts::E))
        .add_method("abs", Some(1), true, math_abs)
        .add_method("floor", Some(1), true, math_floor)
        .add_method("ceil", Some(1), true, math_ceil)
        .add_method("round", Some(1), true, math_round)
        .add_method("sqrt", Some(1), true, math_sqrt)
        .add_method("pow", Some(2), true, math_pow)
        .add_method("sin", Some(1), true, math_sin)
        .add_method("cos", Some(1), true, math_cos)
        .add_method("tan", Some(1), true, math_tan)
        .add_method("asin", Some(1), true, math_asin)
        .add_method("acos", Some(1), true, math_acos)
        .add_method("atan", Some(1), true, math_atan)
        .add_method("atan2", Some(2), true, math_atan2)
        .add_method("log", Some(1), true, math_log)
        .add_method("log10", Some(1), true, math_log10)
        .add_method("exp", Some(1), true, math_exp)
        .add_method("min", Some(2), true, math_min)
        .add_method("max", Some(2), true, math_max)
        .add_method("random", Some(0), true, math_random)
        .add_method("sign", Some(1), true, math_sign)
        .add_method("range", Some(3), true, math_range)
        .add_method("fmod", Some(2), true, math_fmod);
}

pub struct MathApi;

impl NativeObject for MathApi {
    fn binding(&self) -> &'static NativeObjectBinding {
        &MATH_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Integral results stay integers when the input was an integer.
fn integral_result(input: &DynamicValue, result: f64) -> DynamicValue {
    match input {
        DynamicValue::Int(_) if result.is_finite() => DynamicValue::Int(result as i64),
        _ => DynamicValue::Double(result),
    }
}

fn unary(args: &[DynamicValue], f: fn(f64) -> f64) -> ValueResult {
    Ok(DynamicValue::Double(f(number_arg(args, 0))))
}

fn math_abs(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    Ok(match &args[0] {
        DynamicValue::Int(i) => match i.checked_abs() {
            Some(a) => DynamicValue::Int(a),
            None => DynamicValue::Double((*i as f64).abs()),
        },
        other => DynamicValue::Double(other.to_number().abs()),
    })
}

fn math_floor(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let v = number_arg(&args, 0).floor();
    Ok(if v.is_finite() { DynamicValue::Int(v as i64) } else { DynamicValue::Double(v) })
}

fn math_ceil(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let v = number_arg(&args, 0).ceil();
    Ok(if v.is_finite() { DynamicValue::Int(v as i64) } else { DynamicValue::Double(v) })
}

fn math_round(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let v = number_arg(&args, 0).round();
    Ok(if v.is_finite() { DynamicValue::Int(v as i64) } else { DynamicValue::Double(v) })
}

fn math_sqrt(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::sqrt)
}

fn math_pow(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Double(number_arg(&args, 0).powf(number_arg(&args, 1))))
}

fn math_sin(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::sin)
}

fn math_cos(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::cos)
}

fn math_tan(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::tan)
}

fn math_asin(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::asin)
}

fn math_acos(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::acos)
}

fn math_atan(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::atan)
}

fn math_atan2(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Double(number_arg(&args, 0).atan2(number_arg(&args, 1))))
}

fn math_log(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::ln)
}

fn math_log10(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::log10)
}

fn math_exp(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    unary(&args, f64::exp)
}

fn math_min(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let (a, b) = (number_arg(&args, 0), number_arg(&args, 1));
    Ok(if b < a { args[1].clone() } else { args[0].clone() })
}

fn math_max(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let (a, b) = (number_arg(&args, 0), number_arg(&args, 1));
    Ok(if b > a { args[1].clone() } else { args[0].clone() })
}

fn math_random(_ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Double(rand::thread_rng().gen::<f64>()))
}

fn math_sign(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let v = number_arg(&args, 0);
    let sign = if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(integral_result(&args[0], sign))
}

/// Clamps the first argument into `[lo, hi]`.
fn math_range(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let (v, lo, hi) = (number_arg(&args, 0), number_arg(&args, 1), number_arg(&args, 2));
    let clamped = if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    };
    let all_int = args.iter().all(|a| matches!(a, DynamicValue::Int(_)));
    Ok(if all_int {
        DynamicValue::Int(clamped as i64)
    } else {
        DynamicValue::Double(clamped)
    })
}

fn math_fmod(_ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Double(number_arg(&args, 0) % number_arg(&args, 1)))
}
