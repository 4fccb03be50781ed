//! `Message`: the MIDI event of the running note or controller callback.

use std::any::Any;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::realm::ScriptRealm;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::host::HiseEvent;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};

use super::arg;

lazy_static! {
    static ref MESSAGE_BINDING: NativeObjectBinding = NativeObjectBinding::new("Message")
        .add_method("getNoteNumber", Some(0), true, message_get_note_number)
        .add_method("getVelocity", Some(0), true, message_get_velocity)
        .add_method("getChannel", Some(0), true, message_get_channel)
        .add_method("getControllerNumber", Some(0), true, message_get_controller_number)
        .add_method("getControllerValue", Some(0), true, message_get_controller_value)
        .add_method("ignoreEvent", Some(1), true, message_ignore_event)
        .add_method("isIgnored", Some(0), true, message_is_ignored);
}

pub struct MessageApi;

impl NativeObject for MessageApi {
    fn binding(&self) -> &'static NativeObjectBinding {
        &MESSAGE_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn with_event<R>(realm: &ScriptRealm, f: impl FnOnce(&mut HiseEvent) -> R) -> Result<R, ScriptError> {
    let mut event = realm.current_event();
    match event.as_mut() {
        Some(event) => Ok(f(event)),
        None => Err(ScriptError::usage(
            "Message methods are only valid in MIDI callbacks",
        )),
    }
}

fn message_get_note_number(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    with_event(&ctx.realm, |e| DynamicValue::Int(e.note_number()))
}

fn message_get_velocity(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    with_event(&ctx.realm, |e| DynamicValue::Int(e.velocity()))
}

fn message_get_channel(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    with_event(&ctx.realm, |e| DynamicValue::Int(e.channel() as i64))
}

fn message_get_controller_number(
    ctx: &mut EvalContext,
    _r: &NativeObjectRef,
    _args: Vec<DynamicValue>,
) -> ValueResult {
    with_event(&ctx.realm, |e| DynamicValue::Int(e.controller_number()))
}

fn message_get_controller_value(
    ctx: &mut EvalContext,
    _r: &NativeObjectRef,
    _args: Vec<DynamicValue>,
) -> ValueResult {
    with_event(&ctx.realm, |e| DynamicValue::Int(e.controller_value()))
}

fn message_ignore_event(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    let ignore = arg(&args, 0).is_truthy();
    with_event(&ctx.realm, |e| e.ignore_event(ignore))?;
    Ok(DynamicValue::Undefined)
}

fn message_is_ignored(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    with_event(&ctx.realm, |e| DynamicValue::Bool(e.is_ignored()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::eval::function::call_native_method;
    use std::sync::Arc;

    #[test]
    fn test_reads_current_event() {
        let realm = ScriptRealm::standalone();
        realm.set_current_event(Some(HiseEvent::note_on(1, 60, 90)));
        let mut ctx = EvalContext::new(realm.clone(), None);
        let message: NativeObjectRef = Arc::new(MessageApi);
        assert_eq!(
            call_native_method(&mut ctx, &message, "getNoteNumber", vec![]).unwrap(),
            DynamicValue::Int(60)
        );
        call_native_method(&mut ctx, &message, "ignoreEvent", vec![DynamicValue::Bool(true)]).unwrap();
        assert!(realm.current_event().as_ref().unwrap().is_ignored());
    }

    #[test]
    fn test_no_event_outside_midi_callbacks() {
        let mut ctx = EvalContext::new(ScriptRealm::standalone(), None);
        let message: NativeObjectRef = Arc::new(MessageApi);
        assert!(call_native_method(&mut ctx, &message, "getVelocity", vec![]).is_err());
    }
}
