//! `Synth`: access to the host's processing modules.

use std::any::Any;
use std::sync::Arc;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::host::Module;
use crate::runner::plugin::types::{receiver_as, EvalContext, NativeObject, NativeObjectBinding};

use super::{number_arg, string_arg};

lazy_static! {
    static ref SYNTH_BINDING: NativeObjectBinding = NativeObjectBinding::new("Synth")
        .add_method("getModule", Some(1), false, synth_get_module);
    static ref MODULE_BINDING: NativeObjectBinding = NativeObjectBinding::new("Module")
        .add_method("getId", Some(0), true, module_get_id)
        .add_method("getAttribute", Some(1), true, module_get_attribute)
        .add_method("setAttribute", Some(2), true, module_set_attribute)
        .add_method("getNumAttributes", Some(0), true, module_get_num_attributes);
}

pub struct SynthApi;

impl NativeObject for SynthApi {
    fn binding(&self) -> &'static NativeObjectBinding {
        &SYNTH_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Script handle to a host module.
pub struct ModuleHandle {
    module: Arc<Module>,
}

impl ModuleHandle {
    pub fn new(module: Arc<Module>) -> Self {
        ModuleHandle { module }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }
}

impl NativeObject for ModuleHandle {
    fn binding(&self) -> &'static NativeObjectBinding {
        &MODULE_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_script_string(&self) -> String {
        self.module.id().to_string()
    }
}

/// Resolves a module argument: a `Synth.getModule` handle or a module id.
pub fn module_from_value(ctx: &EvalContext, value: &DynamicValue) -> Result<Arc<Module>, ScriptError> {
    if let Some(handle) = value
        .as_native()
        .and_then(|n| n.as_any().downcast_ref::<ModuleHandle>())
    {
        return Ok(handle.module.clone());
    }
    let id = value.to_display_string();
    ctx.realm
        .modules()
        .get(&id)
        .ok_or_else(|| ScriptError::usage(format!("Module {} not found", id)))
}

fn synth_get_module(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let id = string_arg(&args, 0);
    let module = ctx
        .realm
        .modules()
        .get(&id)
        .ok_or_else(|| ScriptError::usage(format!("Module {} not found", id)))?;
    Ok(DynamicValue::from_native(Arc::new(ModuleHandle::new(module))))
}

fn module_get_id(_ctx: &mut EvalContext, receiver: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    let handle = receiver_as::<ModuleHandle>(receiver, "Module")?;
    Ok(DynamicValue::from(handle.module.id()))
}

/// Parameters can be addressed by name or by index.
fn parameter_name(module: &Module, key: &DynamicValue) -> Result<String, ScriptError> {
    match key {
        DynamicValue::Int(_) | DynamicValue::Double(_) => {
            let index = key.to_number();
            if index >= 0.0 {
                if let Some(name) = module.parameter_name(index as usize) {
                    return Ok(name);
                }
            }
            Err(ScriptError::usage(format!(
                "parameter index {} out of range for {}",
                key,
                module.id()
            )))
        }
        other => Ok(other.to_display_string()),
    }
}

fn module_get_attribute(_ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let module = &receiver_as::<ModuleHandle>(receiver, "Module")?.module;
    let name = parameter_name(module, &args[0])?;
    module
        .attribute(&name)
        .map(DynamicValue::Double)
        .ok_or_else(|| ScriptError::usage(format!("unknown parameter ID: {}", name)))
}

fn module_set_attribute(ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let module = receiver_as::<ModuleHandle>(receiver, "Module")?.module.clone();
    let name = parameter_name(&module, &args[0])?;
    module.set_attribute(Some(ctx), &name, number_arg(&args, 1))?;
    Ok(DynamicValue::Undefined)
}

fn module_get_num_attributes(
    _ctx: &mut EvalContext,
    receiver: &NativeObjectRef,
    _args: Vec<DynamicValue>,
) -> ValueResult {
    let handle = receiver_as::<ModuleHandle>(receiver, "Module")?;
    Ok(DynamicValue::from(handle.module.num_parameters()))
}
