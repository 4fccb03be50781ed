//! `Buffer`: fixed-size sample storage.

use std::any::Any;
use std::sync::Arc;

use crate::runner::ds::value::{AudioBuffer, DynamicValue, NativeObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{EvalContext, NativeObject, NativeObjectBinding};

use super::index_arg;

lazy_static! {
    static ref BUFFER_BINDING: NativeObjectBinding = NativeObjectBinding::new("Buffer")
        .add_method("create", Some(1), false, buffer_create)
        .with_constructor(buffer_construct);
}

pub struct BufferClass;

impl NativeObject for BufferClass {
    fn binding(&self) -> &'static NativeObjectBinding {
        &BUFFER_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn new_buffer(ctx: &EvalContext, args: &[DynamicValue]) -> ValueResult {
    let size = index_arg(args, 0, "Buffer size")?;
    let buffer = AudioBuffer::with_size(size, ctx.realm.config().max_array_length())?;
    Ok(DynamicValue::Buffer(Arc::new(buffer)))
}

fn buffer_create(ctx: &mut EvalContext, _r: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
    new_buffer(ctx, &args)
}

fn buffer_construct(ctx: &mut EvalContext, args: Vec<DynamicValue>) -> ValueResult {
    new_buffer(ctx, &args)
}
