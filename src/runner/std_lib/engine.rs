//! `Engine`: host state and the broadcaster factory.

use std::any::Any;

use crate::runner::broadcaster::ScriptBroadcaster;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};
use crate::runner::processor::thread::is_audio_thread;

use super::arg;

lazy_static! {
    static ref ENGINE_BINDING: NativeObjectBinding = NativeObjectBinding::new("Engine")
        .add_method("createBroadcaster", Some(1), false, engine_create_broadcaster)
        .add_method("getUptime", Some(0), true, engine_get_uptime)
        .add_method("getSampleRate", Some(0), true, engine_get_sample_rate)
        .add_method("getBufferSize", Some(0), true, engine_get_buffer_size)
        .add_method("isAudioThread", Some(0), true, engine_is_audio_thread);
}

pub struct EngineApi;

impl NativeObject for EngineApi {
    fn binding(&self) -> &'static NativeObjectBinding {
        &ENGINE_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn engine_create_broadcaster(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    ScriptBroadcaster::create(ctx, &arg(&args, 0))
}

/// Seconds since the processor was created.
fn engine_get_uptime(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Double(ctx.realm.uptime().as_secs_f64()))
}

fn engine_get_sample_rate(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Double(ctx.realm.audio().sample_rate()))
}

fn engine_get_buffer_size(ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::from(ctx.realm.audio().block_size()))
}

fn engine_is_audio_thread(_ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
    Ok(DynamicValue::Bool(is_audio_thread()))
}
