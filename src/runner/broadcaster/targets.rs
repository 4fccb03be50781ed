//! The items a broadcaster notifies when a message goes out.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::error;
use parking_lot::Mutex;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::realm::ScriptRealm;
use crate::runner::ds::value::DynamicValue;
use crate::runner::eval::function::call_value;
use crate::runner::eval::realtime::is_realtime_safe;
use crate::runner::host::ScriptComponent;
use crate::runner::plugin::types::EvalContext;
use crate::runner::processor::timer::TimerId;

use super::metadata::Metadata;
use super::ScriptBroadcaster;

pub(crate) enum TargetKind {
    /// A script or native function called with the message arguments.
    Function { function: DynamicValue },
    /// Like `Function`, but deferred by a one-shot timer that every message restarts.
    Delayed {
        function: DynamicValue,
        delay: Duration,
        timer: Mutex<Option<TimerId>>,
    },
    /// Writes the message (or a function's result) into component properties.
    ComponentProperty {
        components: Vec<Arc<ScriptComponent>>,
        properties: Vec<String>,
        function: Option<DynamicValue>,
    },
    /// Forwards every message to another broadcaster.
    Forward {
        destination: Weak<ScriptBroadcaster>,
        transform: Option<DynamicValue>,
        is_async: bool,
    },
}

pub struct Target {
    pub metadata: Metadata,
    /// The object the target was registered for. Two targets with the same
    /// object can't coexist on one broadcaster.
    pub obj: DynamicValue,
    pub(crate) kind: TargetKind,
}

impl Target {
    pub(crate) fn new(obj: DynamicValue, metadata: Metadata, kind: TargetKind) -> Self {
        Target { metadata, obj, kind }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TargetKind::Function { .. } => "Script Callback",
            TargetKind::Delayed { .. } => "Delayed Callback",
            TargetKind::ComponentProperty { .. } => "ComponentProperties",
            TargetKind::Forward { .. } => "Other Broadcaster",
        }
    }

    pub fn is_realtime_safe(&self, realm: &ScriptRealm) -> bool {
        let safe = |f: &DynamicValue| is_realtime_safe(realm, f);
        match &self.kind {
            TargetKind::Function { function } | TargetKind::Delayed { function, .. } => safe(function),
            TargetKind::ComponentProperty { function, .. } => function.as_ref().map(safe).unwrap_or(true),
            TargetKind::Forward { transform, .. } => transform.as_ref().map(safe).unwrap_or(true),
        }
    }

    /// Invokes the target with one message.
    pub(crate) fn call(
        &self,
        ctx: &mut EvalContext,
        broadcaster: &ScriptBroadcaster,
        args: &[DynamicValue],
    ) -> Result<(), ScriptError> {
        match &self.kind {
            TargetKind::Function { function } => {
                let this_value = broadcaster.this_for(&self.obj);
                call_value(ctx, function, this_value, args.to_vec())?;
                Ok(())
            }
            TargetKind::Delayed { function, delay, timer } => {
                let this_value = broadcaster.this_for(&self.obj);
                let function = function.clone();
                let args = args.to_vec();
                let id = self.metadata.id.clone();
                let mut pending = timer.lock();
                if let Some(previous) = pending.take() {
                    ctx.realm.cancel_timer(previous);
                }
                *pending = Some(ctx.realm.schedule(*delay, move |realm| {
                    let mut ctx = EvalContext::new(realm.clone(), Some(realm.config().message_budget()));
                    if let Err(e) = call_value(&mut ctx, &function, this_value, args) {
                        realm.console().error(format!("{}: {}", id, e.report()));
                    }
                })?);
                Ok(())
            }
            TargetKind::ComponentProperty {
                components,
                properties,
                function,
            } => {
                for (index, component) in components.iter().enumerate() {
                    let value = match function {
                        Some(function) => {
                            let mut call_args = Vec::with_capacity(args.len() + 1);
                            call_args.push(DynamicValue::from(index));
                            call_args.extend(args.iter().cloned());
                            call_value(ctx, function, broadcaster.this_for(&self.obj), call_args)?
                        }
                        None => args.get(0).cloned().unwrap_or_default(),
                    };
                    for property in properties {
                        component.set_property(ctx, property, value.clone())?;
                    }
                }
                Ok(())
            }
            TargetKind::Forward {
                destination,
                transform,
                is_async,
            } => {
                let destination = match destination.upgrade() {
                    Some(destination) => destination,
                    None => {
                        error!("dangling broadcaster target {}", self.metadata.id);
                        return Err(ScriptError::usage("no broadcaster"));
                    }
                };
                let forwarded = match transform {
                    Some(transform) => {
                        let this_value = destination.to_value();
                        match call_value(ctx, transform, this_value, args.to_vec())? {
                            DynamicValue::Array(a) => a.to_vec(),
                            single => vec![single],
                        }
                    }
                    None => args.to_vec(),
                };
                destination.send_message(ctx, forwarded, !*is_async)
            }
        }
    }

    /// Cancels a pending delayed call.
    pub(crate) fn cancel(&self, ctx: &EvalContext) {
        if let TargetKind::Delayed { timer, .. } = &self.kind {
            if let Some(id) = timer.lock().take() {
                ctx.realm.cancel_timer(id);
            }
        }
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(&DynamicValue)) {
        visitor(&self.obj);
        match &self.kind {
            TargetKind::Function { function } | TargetKind::Delayed { function, .. } => visitor(function),
            TargetKind::ComponentProperty { function, .. } => {
                if let Some(f) = function {
                    visitor(f)
                }
            }
            TargetKind::Forward { transform, .. } => {
                if let Some(f) = transform {
                    visitor(f)
                }
            }
        }
    }
}
