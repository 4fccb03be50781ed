//! `Content` and the script-side face of interface components.

use std::any::Any;
use std::sync::Arc;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::host::{ComponentType, ScriptComponent};
use crate::runner::plugin::types::{
    downcast_native, receiver_as, Debuggable, EvalContext, NativeObject, NativeObjectBinding,
};

use super::{arg, number_arg, string_arg};

lazy_static! {
    static ref CONTENT_BINDING: NativeObjectBinding = NativeObjectBinding::new("Content")
        .add_method("addKnob", Some(3), false, content_add_knob)
        .add_method("addButton", Some(3), false, content_add_button)
        .add_method("getComponent", Some(1), false, content_get_component);
    static ref SLIDER_BINDING: NativeObjectBinding = component_binding("ScriptSlider");
    static ref BUTTON_BINDING: NativeObjectBinding = component_binding("ScriptButton");
}

fn component_binding(class_name: &'static str) -> NativeObjectBinding {
    NativeObjectBinding::new(class_name)
        .with_parent_class("ScriptComponent")
        .add_method("get", Some(1), true, component_get)
        .add_method("set", Some(2), false, component_set)
        .add_method("getValue", Some(0), true, component_get_value)
        .add_method("setValue", Some(1), false, component_set_value)
        .add_method("getId", Some(0), true, component_get_id)
}

pub struct ContentApi;

impl NativeObject for ContentApi {
    fn binding(&self) -> &'static NativeObjectBinding {
        &CONTENT_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NativeObject for ScriptComponent {
    fn binding(&self) -> &'static NativeObjectBinding {
        match self.component_type() {
            ComponentType::Knob => &SLIDER_BINDING,
            ComponentType::Button => &BUTTON_BINDING,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_script_string(&self) -> String {
        self.id().to_string()
    }

    fn as_debuggable(&self) -> Option<&dyn Debuggable> {
        Some(self)
    }
}

impl Debuggable for ScriptComponent {
    fn debug_entries(&self) -> Vec<(String, DynamicValue)> {
        self.property_ids()
            .into_iter()
            .map(|id| {
                let value = self.property(&id).unwrap_or_default();
                (id, value)
            })
            .collect()
    }
}

/// Wraps a component for script code.
pub fn component_value(component: Arc<ScriptComponent>) -> DynamicValue {
    DynamicValue::from_native(component)
}

/// Resolves a component argument: either a component object or its id.
pub fn component_from_value(ctx: &EvalContext, value: &DynamicValue) -> Result<Arc<ScriptComponent>, ScriptError> {
    if let Some(component) = downcast_native::<ScriptComponent>(value) {
        if let Some(live) = ctx.realm.content().get_component(component.id()) {
            return Ok(live);
        }
    }
    match value {
        DynamicValue::String(id) => ctx
            .realm
            .content()
            .get_component(id)
            .ok_or_else(|| ScriptError::usage(format!("Component with name {} wasn't found", id))),
        other => Err(ScriptError::type_error(format!(
            "{} is not a component",
            other.to_display_string()
        ))),
    }
}

fn position_args(args: &[DynamicValue]) -> (i64, i64) {
    (number_arg(args, 1) as i64, number_arg(args, 2) as i64)
}

fn content_add_knob(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let (x, y) = position_args(&args);
    let component = ctx.realm.content().add_knob(&string_arg(&args, 0), x, y)?;
    Ok(component_value(component))
}

fn content_add_button(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let (x, y) = position_args(&args);
    let component = ctx.realm.content().add_button(&string_arg(&args, 0), x, y)?;
    Ok(component_value(component))
}

fn content_get_component(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let id = string_arg(&args, 0);
    match ctx.realm.content().get_component(&id) {
        Some(component) => Ok(component_value(component)),
        None => Err(ScriptError::usage(format!("Component with name {} wasn't found", id))),
    }
}

fn component_get(_ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let component = receiver_as::<ScriptComponent>(receiver, "ScriptComponent")?;
    let name = string_arg(&args, 0);
    component
        .property(&name)
        .ok_or_else(|| ScriptError::usage(format!("Illegal property id: {}", name)))
}

fn component_set(ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let component = receiver_as::<ScriptComponent>(receiver, "ScriptComponent")?;
    component.set_property(ctx, &string_arg(&args, 0), arg(&args, 1))?;
    Ok(DynamicValue::Undefined)
}

fn component_get_value(_ctx: &mut EvalContext, receiver: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(receiver_as::<ScriptComponent>(receiver, "ScriptComponent")?.value())
}

fn component_set_value(ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let component = receiver_as::<ScriptComponent>(receiver, "ScriptComponent")?;
    component.set_value(ctx, arg(&args, 0))?;
    Ok(DynamicValue::Undefined)
}

fn component_get_id(_ctx: &mut EvalContext, receiver: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::from(receiver_as::<ScriptComponent>(receiver, "ScriptComponent")?.id()))
}
