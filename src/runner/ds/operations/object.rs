use std::sync::Arc;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::type_conversion::{to_array_index, to_number, to_string};
use crate::runner::ds::value::{DynamicValue, NativeObjectRef, ObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{BoundNativeMethod, EvalContext, NativePropertyKind};

/// Property name of a computed member key.
pub fn property_key(key: &DynamicValue) -> String {
    to_string(key)
}

fn named_native_member(ctx: &mut EvalContext, native: &NativeObjectRef, name: &str) -> ValueResult {
    let binding = native.binding();
    if let Some(property) = binding.find_property(name) {
        return match &property.kind {
            NativePropertyKind::Constant(v) => Ok(v.clone()),
            NativePropertyKind::Accessor { getter, .. } => getter(ctx, native),
        };
    }
    if let Some(indexable) = native.as_indexable() {
        if let Some(v) = indexable.get_member(ctx, native, name)? {
            return Ok(v);
        }
    }
    if let Some(method) = binding.find_method(name) {
        return Ok(DynamicValue::from_native(Arc::new(BoundNativeMethod {
            receiver: native.clone(),
            method_name: method.name,
        })));
    }
    Ok(DynamicValue::Void)
}

/// `target[key]` / `target.key`. Missing members read as `Void`.
pub fn get_property(ctx: &mut EvalContext, target: &DynamicValue, key: &DynamicValue) -> ValueResult {
    match target {
        DynamicValue::Array(a) => match to_array_index(key) {
            Some(i) => Ok(a.get(i).unwrap_or(DynamicValue::Void)),
            None if property_key(key) == "length" => Ok(DynamicValue::from(a.len())),
            None => Ok(DynamicValue::Void),
        },
        DynamicValue::String(s) => match to_array_index(key) {
            Some(i) => Ok(s
                .chars()
                .nth(i)
                .map(|c| DynamicValue::String(c.to_string()))
                .unwrap_or(DynamicValue::Void)),
            None if property_key(key) == "length" => Ok(DynamicValue::from(s.chars().count())),
            None => Ok(DynamicValue::Void),
        },
        DynamicValue::Buffer(b) => match to_array_index(key) {
            Some(i) => Ok(b
                .get(i)
                .map(|s| DynamicValue::Double(s as f64))
                .unwrap_or(DynamicValue::Void)),
            None if property_key(key) == "length" => Ok(DynamicValue::from(b.len())),
            None => Ok(DynamicValue::Void),
        },
        DynamicValue::Object(ObjectRef::Script(o)) => {
            Ok(o.get(&property_key(key)).unwrap_or(DynamicValue::Void))
        }
        DynamicValue::Object(ObjectRef::Native(n)) => {
            let n = n.clone();
            named_native_member(ctx, &n, &property_key(key))
        }
        DynamicValue::Undefined | DynamicValue::Void => Err(ScriptError::type_error(format!(
            "Cannot read property '{}' of {}",
            property_key(key),
            target.to_display_string()
        ))),
        _ => Ok(DynamicValue::Void),
    }
}

/// `target[key] = value`. Arrays grow to fit the index.
pub fn set_property(
    ctx: &mut EvalContext,
    target: &DynamicValue,
    key: &DynamicValue,
    value: DynamicValue,
) -> Result<(), ScriptError> {
    match target {
        DynamicValue::Array(a) => match to_array_index(key) {
            Some(i) => a.set(i, value, ctx.realm.config().max_array_length()),
            None => Err(ScriptError::type_error(format!(
                "Array index must be a non-negative number, got {}",
                property_key(key)
            ))),
        },
        DynamicValue::Buffer(b) => {
            let index = to_array_index(key).ok_or_else(|| {
                ScriptError::type_error(format!("Buffer index must be a number, got {}", property_key(key)))
            })?;
            if b.set(index, to_number(&value) as f32) {
                Ok(())
            } else {
                Err(ScriptError::range(format!(
                    "Buffer index {} out of range (size {})",
                    index,
                    b.len()
                )))
            }
        }
        DynamicValue::Object(ObjectRef::Script(o)) => {
            o.set(&property_key(key), value);
            Ok(())
        }
        DynamicValue::Object(ObjectRef::Native(n)) => {
            let n = n.clone();
            let name = property_key(key);
            if let Some(property) = n.binding().find_property(&name) {
                return match &property.kind {
                    NativePropertyKind::Accessor {
                        setter: Some(setter), ..
                    } => setter(ctx, &n, value),
                    _ => Err(ScriptError::type_error(format!(
                        "Can't modify read-only property {}.{}",
                        n.class_name(),
                        name
                    ))),
                };
            }
            match n.as_indexable() {
                Some(indexable) => indexable.set_member(ctx, &n, &name, value),
                None => Err(ScriptError::type_error(format!(
                    "Can't assign property {} to {}",
                    name,
                    n.class_name()
                ))),
            }
        }
        other => Err(ScriptError::type_error(format!(
            "Cannot set property '{}' of {}",
            property_key(key),
            other.kind_name()
        ))),
    }
}

/// The `in` operator.
pub fn has_property(target: &DynamicValue, key: &DynamicValue) -> Result<bool, ScriptError> {
    match target {
        DynamicValue::Object(ObjectRef::Script(o)) => Ok(o.has(&property_key(key))),
        DynamicValue::Object(ObjectRef::Native(n)) => {
            let name = property_key(key);
            let binding = n.binding();
            Ok(binding.find_property(&name).is_some() || binding.find_method(&name).is_some())
        }
        DynamicValue::Array(a) => Ok(to_array_index(key).map(|i| i < a.len()).unwrap_or(false)),
        DynamicValue::Buffer(b) => Ok(to_array_index(key).map(|i| i < b.len()).unwrap_or(false)),
        other => Err(ScriptError::type_error(format!(
            "Cannot use 'in' operator on {}",
            other.kind_name()
        ))),
    }
}

/// The `delete` operator. Only script object properties can be removed.
pub fn delete_property(target: &DynamicValue, key: &DynamicValue) -> Result<bool, ScriptError> {
    match target {
        DynamicValue::Object(ObjectRef::Script(o)) => Ok(o.remove(&property_key(key))),
        other => Err(ScriptError::type_error(format!(
            "Cannot delete properties of {}",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::ScriptRealm;
    use crate::runner::ds::value::{ArrayObject, AudioBuffer, DynamicObject};

    fn ctx() -> EvalContext {
        EvalContext::new(ScriptRealm::standalone(), None)
    }

    #[test]
    fn test_array_access_extends_and_reads_void() {
        let mut ctx = ctx();
        let arr = DynamicValue::Array(Arc::new(ArrayObject::new(vec![DynamicValue::Int(1)])));
        set_property(&mut ctx, &arr, &DynamicValue::Int(3), DynamicValue::Int(4)).unwrap();
        assert_eq!(get_property(&mut ctx, &arr, &DynamicValue::Int(2)).unwrap(), DynamicValue::Undefined);
        assert_eq!(get_property(&mut ctx, &arr, &DynamicValue::Int(9)).unwrap(), DynamicValue::Void);
        assert_eq!(get_property(&mut ctx, &arr, &DynamicValue::from("length")).unwrap(), DynamicValue::Int(4));
    }

    #[test]
    fn test_object_members() {
        let mut ctx = ctx();
        let obj = DynamicValue::Object(ObjectRef::Script(Arc::new(DynamicObject::new())));
        set_property(&mut ctx, &obj, &DynamicValue::from("a"), DynamicValue::Int(1)).unwrap();
        assert!(has_property(&obj, &DynamicValue::from("a")).unwrap());
        assert_eq!(get_property(&mut ctx, &obj, &DynamicValue::from("b")).unwrap(), DynamicValue::Void);
        assert!(delete_property(&obj, &DynamicValue::from("a")).unwrap());
        assert!(!has_property(&obj, &DynamicValue::from("a")).unwrap());
    }

    #[test]
    fn test_buffer_write_out_of_range_is_range_error() {
        let mut ctx = ctx();
        let buffer = DynamicValue::Buffer(Arc::new(AudioBuffer::new(2)));
        set_property(&mut ctx, &buffer, &DynamicValue::Int(1), DynamicValue::Double(0.5)).unwrap();
        assert_eq!(get_property(&mut ctx, &buffer, &DynamicValue::Int(1)).unwrap(), DynamicValue::Double(0.5));
        assert_eq!(get_property(&mut ctx, &buffer, &DynamicValue::Int(5)).unwrap(), DynamicValue::Void);
        let err = set_property(&mut ctx, &buffer, &DynamicValue::Int(2), DynamicValue::Int(1)).unwrap_err();
        assert!(matches!(err, ScriptError::Range { .. }));
    }

    #[test]
    fn test_reading_from_undefined_is_type_error() {
        let mut ctx = ctx();
        let err = get_property(&mut ctx, &DynamicValue::Undefined, &DynamicValue::from("x")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot read property 'x' of undefined");
    }
}
