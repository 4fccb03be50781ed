//! Object built-in.
//!
//! Provides the `Object` class object: `new Object()` and `Object.keys`.

use std::any::Any;

use crate::runner::ds::value::{DynamicValue, NativeObjectRef, ObjectRef, PropertyMap};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};

lazy_static! {
    static ref OBJECT_BINDING: NativeObjectBinding = NativeObjectBinding::new("Object")
        .add_method("keys", Some(1), false, object_keys)
        .with_constructor(object_constructor);
}

pub struct ObjectClass;

impl NativeObject for ObjectClass {
    fn binding(&self) -> &'static NativeObjectBinding {
        &OBJECT_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn object_constructor(ctx: &mut EvalContext, _args: Vec<DynamicValue>) -> ValueResult {
    ctx.new_object(PropertyMap::new())
}

/// Own keys in insertion order. Debuggable native objects list their entries;
/// anything else has no keys.
fn object_keys(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let keys = match &args[0] {
        DynamicValue::Object(ObjectRef::Script(o)) => o.keys(),
        DynamicValue::Object(ObjectRef::Native(n)) => n
            .as_debuggable()
            .map(|d| d.debug_entries().into_iter().map(|(k, _)| k).collect())
            .unwrap_or_default(),
        _ => vec![],
    };
    ctx.new_array(keys.into_iter().map(DynamicValue::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::ds::realm::ScriptRealm;
    use crate::runner::eval::statement::execute_program;
    use crate::runner::plugin::registry::ApiRegistry;

    #[test]
    fn test_keys_keep_insertion_order() {
        let realm = ScriptRealm::standalone();
        ApiRegistry::with_standard_classes().install(&realm).unwrap();
        let mut ctx = EvalContext::new(realm, None);
        let program = HiseParser::parse_to_ast_from_str(
            "var o = new Object(); o.z = 1; o.a = 2; Object.keys(o).join(',');",
        )
        .unwrap();
        assert_eq!(
            execute_program(&program, &mut ctx).unwrap().get_value(),
            DynamicValue::from("z,a")
        );
    }
}
