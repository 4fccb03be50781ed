//! Script methods of `Broadcaster` objects.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::function::call_value;
use crate::runner::eval::types::ValueResult;
use crate::runner::host::content::MouseCallbackLevel;
use crate::runner::host::{ComplexDataType, ComplexEventType, ScriptComponent};
use crate::runner::plugin::types::{downcast_native, receiver_as, EvalContext, NativeObjectBinding};
use crate::runner::std_lib::content::component_from_value;
use crate::runner::std_lib::synth::module_from_value;
use crate::runner::std_lib::{number_arg, string_arg};

use super::listeners::{SourceKind, SourceListener};
use super::metadata::Metadata;
use super::targets::{Target, TargetKind};
use super::ScriptBroadcaster;

lazy_static! {
    pub static ref BROADCASTER_BINDING: NativeObjectBinding = NativeObjectBinding::new("Broadcaster")
        .add_method("addListener", Some(3), false, add_listener)
        .add_method("addDelayedListener", Some(4), false, add_delayed_listener)
        .add_method("addComponentPropertyListener", Some(4), false, add_component_property_listener)
        .add_method("removeListener", Some(1), false, remove_listener)
        .add_method("removeAllListeners", Some(0), false, remove_all_listeners)
        .add_method("removeAllSources", Some(0), false, remove_all_sources)
        .add_method("sendSyncMessage", Some(1), true, send_sync_message)
        .add_method("sendAsyncMessage", Some(1), true, send_async_message)
        .add_method("sendMessage", Some(2), true, send_message)
        .add_method("sendMessageWithDelay", Some(2), false, send_message_with_delay)
        .add_method("callWithDelay", Some(3), false, call_with_delay)
        .add_method("resendLastMessage", Some(1), true, resend_last_message)
        .add_method("reset", Some(0), false, reset)
        .add_method("setBypassed", Some(3), true, set_bypassed)
        .add_method("isBypassed", Some(0), true, is_bypassed)
        .add_method("setEnableQueue", Some(1), false, set_enable_queue)
        .add_method("setRealtimeMode", Some(1), false, set_realtime_mode)
        .add_method("setReplaceThisReference", Some(1), false, set_replace_this_reference)
        .add_method("setMetadata", Some(1), false, set_metadata)
        .add_method("setId", Some(1), false, set_id)
        .add_method("getLastResult", Some(0), true, get_last_result)
        .add_method("attachToComponentProperties", Some(3), false, attach_to_component_properties)
        .add_method("attachToComponentValue", Some(2), false, attach_to_component_value)
        .add_method("attachToComponentVisibility", Some(2), false, attach_to_component_visibility)
        .add_method("attachToComponentMouseEvents", Some(3), false, attach_to_component_mouse_events)
        .add_method("attachToModuleParameter", Some(3), false, attach_to_module_parameter)
        .add_method("attachToComplexData", Some(4), false, attach_to_complex_data)
        .add_method("attachToRadioGroup", Some(2), false, attach_to_radio_group)
        .add_method("attachToOtherBroadcaster", Some(4), false, attach_to_other_broadcaster);
}

fn this(r: &NativeObjectRef) -> Result<&ScriptBroadcaster, ScriptError> {
    receiver_as::<ScriptBroadcaster>(r, "Broadcaster")
}

/// A message argument: an array is the argument list, anything else a single argument.
fn message_args(value: &DynamicValue) -> Vec<DynamicValue> {
    match value {
        DynamicValue::Array(a) => a.to_vec(),
        single => vec![single.clone()],
    }
}

/// A value or array of values, flattened one level.
fn list_arg(value: &DynamicValue) -> Vec<DynamicValue> {
    match value {
        DynamicValue::Array(a) => a.to_vec(),
        DynamicValue::Undefined | DynamicValue::Void => vec![],
        single => vec![single.clone()],
    }
}

fn delay_arg(args: &[DynamicValue], index: usize) -> Duration {
    let ms = number_arg(args, index);
    if ms.is_finite() && ms > 0.0 {
        Duration::from_millis(ms as u64)
    } else {
        Duration::from_millis(0)
    }
}

fn check_callable(function: &DynamicValue) -> Result<(), ScriptError> {
    if function.is_callable() {
        Ok(())
    } else {
        Err(ScriptError::type_error(format!("{} is not a function", function.kind_name())))
    }
}

/// A script function must take exactly `expected` parameters.
fn check_parameter_count(function: &DynamicValue, expected: usize) -> Result<(), ScriptError> {
    if let DynamicValue::Function(f) = function {
        if f.parameter_count() != expected {
            return Err(ScriptError::usage(format!(
                "{}: parameter amount mismatch: {} (Expected: {})",
                f.name(),
                f.parameter_count(),
                expected
            )));
        }
    }
    Ok(())
}

fn components_arg(ctx: &EvalContext, value: &DynamicValue) -> Result<Vec<Arc<ScriptComponent>>, ScriptError> {
    list_arg(value)
        .iter()
        .map(|v| component_from_value(ctx, v))
        .collect()
}

fn check_source_arity(bc: &ScriptBroadcaster, expected: usize, message: &str) -> Result<(), ScriptError> {
    if bc.num_arguments() != expected {
        return Err(ScriptError::usage(message));
    }
    Ok(())
}

fn attach(ctx: &EvalContext, bc: &ScriptBroadcaster, metadata: &DynamicValue, kind: SourceKind) -> ValueResult {
    let metadata = Metadata::from_value(metadata)?;
    let source = SourceListener::new(bc.weak(), metadata, kind);
    bc.attach(source, ctx.realm.generation())?;
    Ok(DynamicValue::Undefined)
}

fn fail_if_attached(bc: &ScriptBroadcaster) -> Result<(), ScriptError> {
    match bc.attached_source() {
        Some(source) => Err(ScriptError::usage(format!(
            "This callback is already registered to {}",
            source.listener_type()
        ))),
        None => Ok(()),
    }
}

fn add_listener(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    let function = args[2].clone();
    check_callable(&function)?;
    check_parameter_count(&function, bc.num_arguments())?;
    let metadata = Metadata::from_value(&args[1])?;
    bc.add_target(ctx, Target::new(args[0].clone(), metadata, TargetKind::Function { function }))?;
    Ok(DynamicValue::Bool(true))
}

fn add_delayed_listener(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    let delay = delay_arg(&args, 0);
    let function = args[3].clone();
    check_callable(&function)?;
    check_parameter_count(&function, bc.num_arguments())?;
    let metadata = Metadata::from_value(&args[2])?;
    let kind = if delay.as_millis() == 0 {
        TargetKind::Function { function }
    } else {
        TargetKind::Delayed {
            function,
            delay,
            timer: Mutex::new(None),
        }
    };
    bc.add_target(ctx, Target::new(args[1].clone(), metadata, kind))?;
    Ok(DynamicValue::Bool(true))
}

fn add_component_property_listener(
    ctx: &mut EvalContext,
    r: &NativeObjectRef,
    args: Vec<DynamicValue>,
) -> ValueResult {
    let bc = this(r)?;
    let components = components_arg(ctx, &args[0])?;
    let properties: Vec<String> = list_arg(&args[1]).iter().map(to_string).collect();
    for component in components.iter() {
        if let Some(p) = properties.iter().find(|p| !component.has_property(p)) {
            return Err(ScriptError::usage(format!("Illegal property id: {}", p)));
        }
    }
    let metadata = Metadata::from_value(&args[2])?;
    let function = match &args[3] {
        DynamicValue::Undefined | DynamicValue::Void => None,
        f => {
            check_callable(f)?;
            check_parameter_count(f, bc.num_arguments() + 1)?;
            Some(f.clone())
        }
    };
    let kind = TargetKind::ComponentProperty {
        components,
        properties,
        function,
    };
    bc.add_target(ctx, Target::new(args[0].clone(), metadata, kind))?;
    Ok(DynamicValue::Bool(true))
}

fn remove_listener(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Bool(this(r)?.remove_target(ctx, &args[0])))
}

fn remove_all_listeners(ctx: &mut EvalContext, r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    bc.remove_all_targets(ctx);
    bc.cancel_delayed(ctx);
    Ok(DynamicValue::Undefined)
}

fn remove_all_sources(_ctx: &mut EvalContext, r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Bool(this(r)?.detach()))
}

fn send_sync_message(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.send_message(ctx, message_args(&args[0]), true)?;
    Ok(DynamicValue::Undefined)
}

fn send_async_message(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.send_message(ctx, message_args(&args[0]), false)?;
    Ok(DynamicValue::Undefined)
}

fn send_message(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.send_message(ctx, message_args(&args[0]), args[1].is_truthy())?;
    Ok(DynamicValue::Undefined)
}

fn send_message_with_delay(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    let message = message_args(&args[0]);
    bc.check_arity(message.len())?;
    let weak = bc.weak();
    let mut pending = bc.delayed_send.lock();
    if let Some(previous) = pending.take() {
        ctx.realm.cancel_timer(previous);
    }
    *pending = Some(ctx.realm.schedule(delay_arg(&args, 1), move |realm| {
        if let Some(bc) = weak.upgrade() {
            bc.delayed_send.lock().take();
            let mut ctx = EvalContext::new(realm.clone(), Some(realm.config().message_budget()));
            if let Err(e) = bc.send_message(&mut ctx, message, true) {
                realm.console().error(format!("{}: {}", bc.id(), e.report()));
            }
        }
    })?);
    Ok(DynamicValue::Undefined)
}

fn call_with_delay(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    let call_args = match &args[1] {
        DynamicValue::Array(a) => a.to_vec(),
        _ => return Err(ScriptError::usage("argArray must be an array")),
    };
    let function = args[2].clone();
    check_callable(&function)?;
    let weak = bc.weak();
    let mut pending = bc.delayed_call.lock();
    if let Some(previous) = pending.take() {
        ctx.realm.cancel_timer(previous);
    }
    *pending = Some(ctx.realm.schedule(delay_arg(&args, 0), move |realm| {
        if let Some(bc) = weak.upgrade() {
            bc.delayed_call.lock().take();
            let mut ctx = EvalContext::new(realm.clone(), Some(realm.config().message_budget()));
            if let Err(e) = call_value(&mut ctx, &function, bc.to_value(), call_args) {
                realm.console().error(format!("{}: {}", bc.id(), e.report()));
            }
        }
    })?);
    Ok(DynamicValue::Undefined)
}

fn resend_last_message(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    bc.send_internal(ctx, bc.last_values(), args[0].is_truthy(), true)?;
    Ok(DynamicValue::Undefined)
}

fn reset(ctx: &mut EvalContext, r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    bc.send_internal(ctx, bc.default_values(), true, true)?;
    Ok(DynamicValue::Undefined)
}

fn set_bypassed(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    let bypassed = args[0].is_truthy();
    let was_bypassed = bc.set_bypassed_flag(bypassed);
    if was_bypassed && !bypassed && args[1].is_truthy() {
        bc.send_internal(ctx, bc.last_values(), args[2].is_truthy(), true)?;
    }
    Ok(DynamicValue::Undefined)
}

fn is_bypassed(_ctx: &mut EvalContext, r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Bool(this(r)?.is_bypassed()))
}

fn set_enable_queue(_ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.set_enable_queue(args[0].is_truthy());
    Ok(DynamicValue::Undefined)
}

fn set_realtime_mode(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.set_realtime_mode(&ctx.realm, args[0].is_truthy())?;
    Ok(DynamicValue::Undefined)
}

fn set_replace_this_reference(_ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.set_replace_this(args[0].is_truthy());
    Ok(DynamicValue::Undefined)
}

fn set_metadata(_ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    this(r)?.set_metadata(Metadata::from_value(&args[0])?);
    Ok(DynamicValue::Undefined)
}

fn set_id(_ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    let mut metadata = bc.metadata();
    metadata.id = string_arg(&args, 0);
    bc.set_metadata(metadata);
    Ok(DynamicValue::Undefined)
}

fn get_last_result(_ctx: &mut EvalContext, r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::String(this(r)?.last_result()))
}

fn attach_to_component_properties(
    ctx: &mut EvalContext,
    r: &NativeObjectRef,
    args: Vec<DynamicValue>,
) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    check_source_arity(
        bc,
        3,
        "If you want to attach a broadcaster to property events, it needs three parameters (component, propertyId, value)",
    )?;
    let components = components_arg(ctx, &args[0])?;
    let properties: Vec<String> = list_arg(&args[1]).iter().map(to_string).collect();
    for component in components.iter() {
        if let Some(p) = properties.iter().find(|p| !component.has_property(p)) {
            return Err(ScriptError::usage(format!("Illegal property id: {}", p)));
        }
    }
    attach(
        ctx,
        bc,
        &args[2],
        SourceKind::ComponentProperties {
            components,
            properties,
        },
    )
}

fn attach_to_component_value(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    check_source_arity(
        bc,
        2,
        "If you want to attach a broadcaster to value events, it needs two parameters (component, value)",
    )?;
    let components = components_arg(ctx, &args[0])?;
    attach(ctx, bc, &args[1], SourceKind::ComponentValue { components })
}

fn attach_to_component_visibility(
    ctx: &mut EvalContext,
    r: &NativeObjectRef,
    args: Vec<DynamicValue>,
) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    check_source_arity(
        bc,
        2,
        "If you want to attach a broadcaster to visibility events, it needs two parameters (id, isVisible)",
    )?;
    let components = components_arg(ctx, &args[0])?;
    attach(ctx, bc, &args[1], SourceKind::ComponentVisibility { components })
}

fn attach_to_component_mouse_events(
    ctx: &mut EvalContext,
    r: &NativeObjectRef,
    args: Vec<DynamicValue>,
) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    check_source_arity(
        bc,
        2,
        "If you want to attach a broadcaster to mouse events, it needs two parameters (component, event)",
    )?;
    let components = components_arg(ctx, &args[0])?;
    let level_name = string_arg(&args, 1);
    let level = MouseCallbackLevel::from_name(&level_name)
        .ok_or_else(|| ScriptError::usage(format!("illegal callback level: {}", level_name)))?;
    attach(ctx, bc, &args[2], SourceKind::MouseEvents { components, level })
}

fn attach_to_module_parameter(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    check_source_arity(
        bc,
        3,
        "If you want to attach a broadcaster to module parameter events, it needs three parameters (processorId, parameterId, value)",
    )?;
    let modules = list_arg(&args[0])
        .iter()
        .map(|v| module_from_value(ctx, v))
        .collect::<Result<Vec<_>, _>>()?;
    let mut parameters = vec![];
    for module in modules.iter() {
        for p in list_arg(&args[1]) {
            let name = if p.is_numeric() {
                module.parameter_name(p.to_number() as usize)
            } else {
                let name = to_string(&p);
                module.parameter_index(&name).map(|_| name)
            };
            match name {
                Some(name) if !parameters.contains(&name) => parameters.push(name),
                Some(_) => {}
                None => return Err(ScriptError::usage(format!("unknown parameter ID: {}", to_string(&p)))),
            }
        }
    }
    bc.set_enable_queue(true);
    attach(ctx, bc, &args[2], SourceKind::ModuleParameter { modules, parameters })
}

fn attach_to_complex_data(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    let type_name = string_arg(&args, 0);
    let mut parts = type_name.split('.');
    let (data_type, event) = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(e), None) => match (ComplexDataType::from_name(t), ComplexEventType::from_name(e)) {
            (Some(t), Some(e)) => (t, e),
            _ => return Err(ScriptError::usage("dataTypeAndEvent must be formatted like `AudioFile.Content`")),
        },
        _ => return Err(ScriptError::usage("dataTypeAndEvent must be formatted like `AudioFile.Content`")),
    };
    check_source_arity(
        bc,
        3,
        "If you want to attach a broadcaster to complex data events, it needs three parameters (processorId, index, value)",
    )?;
    let modules = list_arg(&args[1])
        .iter()
        .map(|v| module_from_value(ctx, v))
        .collect::<Result<Vec<_>, _>>()?;
    let indexes = list_arg(&args[2]);
    let mut slots = vec![];
    for module in modules.iter() {
        if module.complex_data(data_type, 0).is_none() {
            return Err(ScriptError::usage(format!("{} is not a complex data module", module.id())));
        }
        for index in indexes.iter() {
            let slot = module
                .complex_data(data_type, index.to_number() as usize)
                .ok_or_else(|| ScriptError::usage(format!("illegal index: {}", to_string(index))))?;
            slots.push(slot);
        }
    }
    if slots.len() > 1 {
        bc.set_enable_queue(true);
    }
    attach(
        ctx,
        bc,
        &args[3],
        SourceKind::ComplexData {
            type_name,
            event,
            slots,
        },
    )
}

fn attach_to_radio_group(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    check_source_arity(
        bc,
        1,
        "If you want to attach a broadcaster to radio group events, it needs one parameter (selectedIndex)",
    )?;
    let group = number_arg(&args, 0) as i64;
    if group == 0 {
        return Err(ScriptError::usage("illegal radio group index 0"));
    }
    let buttons = ctx.realm.content().radio_group_members(group);
    if buttons.is_empty() {
        return Err(ScriptError::usage(format!("No buttons with radio group {} found", group)));
    }
    attach(ctx, bc, &args[1], SourceKind::RadioGroup { buttons })
}

fn attach_to_other_broadcaster(ctx: &mut EvalContext, r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let bc = this(r)?;
    fail_if_attached(bc)?;
    let transform = match &args[1] {
        DynamicValue::Undefined | DynamicValue::Void => None,
        f => {
            check_callable(f)?;
            Some(f.clone())
        }
    };
    let is_async = args[2].is_truthy();
    let metadata = Metadata::from_value(&args[3])?;

    let mut sources: Vec<Arc<ScriptBroadcaster>> = vec![];
    for value in list_arg(&args[0]) {
        let source = downcast_native::<ScriptBroadcaster>(&value)
            .and_then(|b| b.weak().upgrade())
            .ok_or_else(|| ScriptError::usage("not a broadcaster"))?;
        sources.push(source);
    }
    if sources.is_empty() {
        return Err(ScriptError::usage("not a broadcaster"));
    }
    if transform.is_none() {
        for source in sources.iter() {
            bc.check_arity(source.num_arguments())?;
        }
    }

    for source in sources.iter() {
        let kind = TargetKind::Forward {
            destination: bc.weak(),
            transform: transform.clone(),
            is_async,
        };
        source.add_target(ctx, Target::new(bc.to_value(), metadata.clone(), kind))?;
    }
    let listener = SourceListener::new(bc.weak(), metadata, SourceKind::OtherBroadcasters { sources });
    bc.attach(listener, ctx.realm.generation())?;
    Ok(DynamicValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::ds::realm::ScriptRealm;
    use crate::runner::eval::statement::execute_program;
    use crate::runner::plugin::registry::ApiRegistry;

    fn realm() -> Arc<ScriptRealm> {
        let realm = ScriptRealm::standalone();
        ApiRegistry::with_standard_classes().install(&realm).unwrap();
        realm
    }

    fn run(realm: &Arc<ScriptRealm>, code: &str) -> ValueResult {
        let mut ctx = EvalContext::new(realm.clone(), None);
        let program = HiseParser::parse_to_ast_from_str(code).unwrap();
        Ok(execute_program(&program, &mut ctx)?.get_value())
    }

    #[test]
    fn test_parameter_count_must_match() {
        let err = run(
            &realm(),
            "var bc = Engine.createBroadcaster([0, 0]); bc.addListener('a', 'x', function onTwo(a) {});",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "onTwo: parameter amount mismatch: 1 (Expected: 2)");
    }

    #[test]
    fn test_remove_listener_by_object_and_id() {
        let realm = realm();
        let result = run(
            &realm,
            "var bc = Engine.createBroadcaster(0);
             bc.addListener('a', 'first', function(v) {});
             bc.addListener('b', 'second', function(v) {});
             [bc.removeListener('a'), bc.removeListener('second'), bc.removeListener('missing')].join(',');",
        )
        .unwrap();
        assert_eq!(result, DynamicValue::from("true,true,false"));
    }

    #[test]
    fn test_component_property_listener_sets_properties() {
        let realm = realm();
        run(
            &realm,
            "var k1 = Content.addKnob('K1', 0, 0);
             var k2 = Content.addKnob('K2', 0, 0);
             var bc = Engine.createBroadcaster(false);
             bc.addComponentPropertyListener([k1, 'K2'], ['enabled', 'visible'], 'toggle', undefined);
             bc.sendSyncMessage([true]);",
        )
        .unwrap();
        let k2 = realm.content().get_component("K2").unwrap();
        assert_eq!(k2.property("enabled"), Some(DynamicValue::Bool(true)));
        assert_eq!(k2.property("visible"), Some(DynamicValue::Bool(true)));
        run(&realm, "bc.sendSyncMessage([false]);").unwrap();
        assert_eq!(k2.property("visible"), Some(DynamicValue::Bool(false)));
    }

    #[test]
    fn test_component_property_listener_with_function() {
        let realm = realm();
        run(
            &realm,
            "var k1 = Content.addKnob('K1', 0, 0);
             var k2 = Content.addKnob('K2', 0, 0);
             var bc = Engine.createBroadcaster(0);
             bc.addComponentPropertyListener(['K1', 'K2'], 'text', 'label', function(index, v) {
                 return 'knob ' + index + ': ' + v;
             });
             bc.sendSyncMessage([7]);",
        )
        .unwrap();
        let k2 = realm.content().get_component("K2").unwrap();
        assert_eq!(k2.property("text"), Some(DynamicValue::from("knob 1: 7")));
    }

    #[test]
    fn test_attach_to_component_properties() {
        let realm = realm();
        run(
            &realm,
            "var knob = Content.addKnob('Knob1', 0, 0);
             var calls = [];
             var bc = Engine.createBroadcaster({ component: undefined, property: undefined, value: undefined });
             bc.attachToComponentProperties('Knob1', 'value', 'knob value');
             bc.addListener('log', 'log', function(c, p, v) { calls.push([c.getId(), p, v]); });",
        )
        .unwrap();
        // Registering replays the current state.
        assert_eq!(
            run(&realm, "calls.length;").unwrap(),
            DynamicValue::Int(1)
        );
        let knob = realm.content().get_component("Knob1").unwrap();
        let mut ctx = EvalContext::new(realm.clone(), None);
        // Source-driven messages are asynchronous, which needs a processor.
        let err = knob.set_property(&mut ctx, "value", DynamicValue::Double(0.5)).unwrap_err();
        assert_eq!(err.to_string(), "Asynchronous execution needs a script processor");
    }

    #[test]
    fn test_second_attach_is_rejected() {
        let err = run(
            &realm(),
            "Content.addKnob('Knob1', 0, 0);
             var bc = Engine.createBroadcaster({ component: undefined, value: undefined });
             bc.attachToComponentValue('Knob1', 'first');
             bc.attachToComponentValue('Knob1', 'second');",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "This callback is already registered to ComponentValue");
    }

    #[test]
    fn test_attach_arity_errors() {
        let realm = realm();
        let err = run(
            &realm,
            "Content.addKnob('Knob1', 0, 0);
             var bc = Engine.createBroadcaster(0);
             bc.attachToComponentProperties('Knob1', 'value', 'x');",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "If you want to attach a broadcaster to property events, it needs three parameters (component, propertyId, value)"
        );
        let err = run(
            &realm,
            "var b3 = Engine.createBroadcaster([0, 0, 0]); b3.attachToComponentProperties('Knob1', 'colour', 'x');",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Illegal property id: colour");
    }

    #[test]
    fn test_radio_group_errors() {
        let realm = realm();
        let err = run(&realm, "var bc = Engine.createBroadcaster(0); bc.attachToRadioGroup(0, 'r');").unwrap_err();
        assert_eq!(err.to_string(), "illegal radio group index 0");
        let err = run(&realm, "bc.attachToRadioGroup(3, 'r');").unwrap_err();
        assert_eq!(err.to_string(), "No buttons with radio group 3 found");
    }

    #[test]
    fn test_complex_data_format() {
        let err = run(
            &realm(),
            "var bc = Engine.createBroadcaster([0, 0, 0]); bc.attachToComplexData('Table', 'Mod', 0, 'x');",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "dataTypeAndEvent must be formatted like `AudioFile.Content`");
    }

    #[test]
    fn test_other_broadcaster_forwards_with_transform() {
        let realm = realm();
        let result = run(
            &realm,
            "var source = Engine.createBroadcaster({ value: 1 });
             var target = Engine.createBroadcaster({ doubled: 0, original: 0 });
             var seen = '';
             target.addListener('log', 'log', function(d, o) { seen = d + '/' + o; });
             target.attachToOtherBroadcaster(source, function(v) { return [v * 2, v]; }, false, 'double');
             source.sendSyncMessage([5]);
             seen;",
        )
        .unwrap();
        assert_eq!(result, DynamicValue::from("10/5"));
    }

    #[test]
    fn test_other_broadcaster_arity_must_match() {
        let err = run(
            &realm(),
            "var source = Engine.createBroadcaster([0, 0]);
             var target = Engine.createBroadcaster(0);
             target.attachToOtherBroadcaster(source, undefined, false, 'fwd');",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "argument amount mismatch. Expected: 1");
    }

    #[test]
    fn test_remove_all_sources_stops_forwarding() {
        let realm = realm();
        let result = run(
            &realm,
            "var source = Engine.createBroadcaster(0);
             var target = Engine.createBroadcaster(0);
             var count = 0;
             target.addListener('c', 'c', function(v) { count += 1; });
             target.attachToOtherBroadcaster(source, undefined, false, 'fwd');
             source.sendSyncMessage([1]);
             target.removeAllSources();
             source.sendSyncMessage([2]);
             count;",
        )
        .unwrap();
        // The call on registration and one forwarded message. Attaching
        // replays the unchanged source value, which is coalesced.
        assert_eq!(result, DynamicValue::Int(2));
    }

    #[test]
    fn test_call_with_delay_needs_array() {
        let err = run(
            &realm(),
            "var bc = Engine.createBroadcaster(0); bc.callWithDelay(10, 5, function() {});",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "argArray must be an array");
    }

    #[test]
    fn test_realtime_mode_rejects_plain_functions() {
        let realm = realm();
        let err = run(
            &realm,
            "var bc = Engine.createBroadcaster(0);
             bc.addListener('a', 'a', function(v) {});
             bc.setRealtimeMode(true);",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), super::super::REALTIME_FUNCTION_ERROR);
    }

    #[test]
    fn test_realtime_mode_follows_calls_from_inline_listeners() {
        let realm = realm();
        let err = run(
            &realm,
            "inline function rt(v) { helper(v); }
             function helper(v) { return [v, { a: v }]; }
             var bc = Engine.createBroadcaster(0);
             bc.setRealtimeMode(true);
             bc.addListener('a', 'a', rt);",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), super::super::REALTIME_FUNCTION_ERROR);

        let result = run(
            &realm,
            "var total = 0;
             inline function add(v) { total += scale(v); }
             inline function scale(v) { return v * 2; }
             var bc2 = Engine.createBroadcaster(0);
             bc2.setRealtimeMode(true);
             bc2.addListener('b', 'b', add);
             bc2.sendSyncMessage(4);
             total;",
        )
        .unwrap();
        assert_eq!(result, DynamicValue::Int(8));
    }

    #[test]
    fn test_reset_sends_defaults() {
        let result = run(
            &realm(),
            "var seen = [];
             var bc = Engine.createBroadcaster(3);
             bc.addListener('a', 'a', function(v) { seen.push(v); });
             bc.sendSyncMessage([4]);
             bc.reset();
             seen.join(',');",
        )
        .unwrap();
        assert_eq!(result, DynamicValue::from("3,4,3"));
    }
}
