use crate::runner::ds::value::{DynamicValue, ObjectRef};

/// Nested arrays are printed at most this deep, so self-containing arrays terminate.
const MAX_PRINT_DEPTH: usize = 8;

/// A number that keeps integer precision where the source value had it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Double(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Double(d) => d,
        }
    }
}

impl From<Numeric> for DynamicValue {
    fn from(n: Numeric) -> Self {
        match n {
            Numeric::Int(i) => DynamicValue::Int(i),
            Numeric::Double(d) => DynamicValue::Double(d),
        }
    }
}

pub fn to_boolean(v: &DynamicValue) -> bool {
    match v {
        DynamicValue::Undefined | DynamicValue::Void => false,
        DynamicValue::Bool(b) => *b,
        DynamicValue::Int(i) => *i != 0,
        DynamicValue::Double(d) => *d != 0.0 && !d.is_nan(),
        DynamicValue::String(s) => !s.is_empty(),
        DynamicValue::Array(_)
        | DynamicValue::Object(_)
        | DynamicValue::Function(_)
        | DynamicValue::Buffer(_) => true,
    }
}

/// Parses numeric text the way script coercion does: surrounding whitespace is
/// ignored, the empty string is zero and `0x` prefixes are hexadecimal.
pub fn string_to_numeric(s: &str) -> Numeric {
    let t = s.trim();
    if t.is_empty() {
        return Numeric::Int(0);
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return match i64::from_str_radix(hex, 16) {
            Ok(i) => Numeric::Int(i),
            Err(_) => Numeric::Double(f64::NAN),
        };
    }
    if let Ok(i) = t.parse::<i64>() {
        return Numeric::Int(i);
    }
    match t {
        "Infinity" | "+Infinity" => Numeric::Double(f64::INFINITY),
        "-Infinity" => Numeric::Double(f64::NEG_INFINITY),
        _ => {
            if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                Numeric::Double(f64::NAN)
            } else {
                Numeric::Double(t.parse::<f64>().unwrap_or(f64::NAN))
            }
        }
    }
}

pub fn to_numeric(v: &DynamicValue) -> Numeric {
    match v {
        DynamicValue::Undefined => Numeric::Double(f64::NAN),
        DynamicValue::Void => Numeric::Int(0),
        DynamicValue::Bool(b) => Numeric::Int(*b as i64),
        DynamicValue::Int(i) => Numeric::Int(*i),
        DynamicValue::Double(d) => Numeric::Double(*d),
        DynamicValue::String(s) => string_to_numeric(s),
        DynamicValue::Array(a) => match a.len() {
            0 => Numeric::Int(0),
            1 => a
                .get(0)
                .map(|e| to_numeric(&e))
                .unwrap_or(Numeric::Double(f64::NAN)),
            _ => Numeric::Double(f64::NAN),
        },
        DynamicValue::Object(_) | DynamicValue::Function(_) | DynamicValue::Buffer(_) => {
            Numeric::Double(f64::NAN)
        }
    }
}

pub fn to_number(v: &DynamicValue) -> f64 {
    to_numeric(v).as_f64()
}

/// JS `ToInt32`: truncation modulo 2^32.
pub fn to_int32(v: &DynamicValue) -> i32 {
    match to_numeric(v) {
        Numeric::Int(i) => i as u32 as i32,
        Numeric::Double(d) => f64_to_int32(d),
    }
}

pub fn to_uint32(v: &DynamicValue) -> u32 {
    to_int32(v) as u32
}

pub fn f64_to_int32(d: f64) -> i32 {
    if !d.is_finite() {
        return 0;
    }
    let t = d.trunc() % 4_294_967_296.0;
    let t = if t < 0.0 { t + 4_294_967_296.0 } else { t };
    (t as u64 as u32) as i32
}

/// Integer index for array access, if the value is a non-negative whole number.
pub fn to_array_index(v: &DynamicValue) -> Option<usize> {
    match v {
        DynamicValue::Int(i) if *i >= 0 => Some(*i as usize),
        DynamicValue::Double(d) if *d >= 0.0 && d.fract() == 0.0 && d.is_finite() => {
            Some(*d as usize)
        }
        DynamicValue::String(s) => s.parse::<usize>().ok(),
        _ => None,
    }
}

pub fn format_number(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}

pub fn to_string(v: &DynamicValue) -> String {
    to_string_with_depth(v, 0)
}

fn to_string_with_depth(v: &DynamicValue, depth: usize) -> String {
    match v {
        DynamicValue::Undefined => "undefined".to_string(),
        DynamicValue::Void => "null".to_string(),
        DynamicValue::Bool(b) => b.to_string(),
        DynamicValue::Int(i) => i.to_string(),
        DynamicValue::Double(d) => format_number(*d),
        DynamicValue::String(s) => s.clone(),
        DynamicValue::Array(a) => {
            if depth >= MAX_PRINT_DEPTH {
                return "...".to_string();
            }
            a.to_vec()
                .iter()
                .map(|e| match e {
                    DynamicValue::Undefined | DynamicValue::Void => String::new(),
                    other => to_string_with_depth(other, depth + 1),
                })
                .collect::<Vec<_>>()
                .join(",")
        }
        DynamicValue::Object(ObjectRef::Script(_)) => "[object Object]".to_string(),
        DynamicValue::Object(ObjectRef::Native(n)) => n.to_script_string(),
        DynamicValue::Function(f) => format!("function {}", f.name()),
        DynamicValue::Buffer(b) => format!("Buffer[{}]", b.len()),
    }
}
