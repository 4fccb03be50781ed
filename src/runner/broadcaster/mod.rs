//! Script broadcasters: publish/subscribe hubs with a fixed argument signature.
//!
//! A broadcaster keeps the last message it sent (`lastValues`) and a list of
//! targets ordered by priority. Sending a message that equals the last one is
//! a no-op unless the queue is enabled or the send is forced. Synchronous
//! sends fan out on the calling thread; asynchronous sends run the fan-out on
//! the script pool. At most one host source can be attached.

pub mod api;
pub mod listeners;
pub mod metadata;
pub mod targets;

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::test_and_comparison::strict_equals;
use crate::runner::ds::realm::ScriptRealm;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef, ObjectRef};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{
    Callable, Debuggable, EvalContext, Indexable, NativeObject, NativeObjectBinding,
};
use crate::runner::processor::thread::is_audio_thread;
use crate::runner::processor::timer::TimerId;

use self::listeners::SourceListener;
use self::metadata::Metadata;
use self::targets::{Target, TargetKind};

pub use self::api::BROADCASTER_BINDING;

pub(crate) const REALTIME_FUNCTION_ERROR: &str =
    "You need to use inline functions in order to ensure realtime safe execution";

pub struct ScriptBroadcaster {
    self_ref: Weak<ScriptBroadcaster>,
    metadata: Mutex<Metadata>,
    argument_ids: Vec<String>,
    default_values: Vec<DynamicValue>,
    last_values: RwLock<Vec<DynamicValue>>,
    items: Mutex<Vec<Arc<Target>>>,
    attached: Mutex<Option<Arc<SourceListener>>>,
    bypassed: AtomicBool,
    enable_queue: AtomicBool,
    realtime: AtomicBool,
    replace_this: AtomicBool,
    async_pending: AtomicBool,
    /// Threads currently inside a fan-out of this broadcaster.
    busy: Mutex<Vec<ThreadId>>,
    pub(crate) delayed_send: Mutex<Option<TimerId>>,
    pub(crate) delayed_call: Mutex<Option<TimerId>>,
    last_result: Mutex<String>,
}

/// Removes the current thread from the busy list when a fan-out ends.
struct FanOutGuard<'a> {
    broadcaster: &'a ScriptBroadcaster,
    thread: ThreadId,
}

impl<'a> Drop for FanOutGuard<'a> {
    fn drop(&mut self) {
        let mut busy = self.broadcaster.busy.lock();
        if let Some(pos) = busy.iter().position(|t| *t == self.thread) {
            busy.remove(pos);
        }
    }
}

impl ScriptBroadcaster {
    pub fn new(argument_ids: Vec<String>, default_values: Vec<DynamicValue>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| ScriptBroadcaster {
            self_ref: self_ref.clone(),
            metadata: Mutex::new(Metadata::anonymous()),
            argument_ids,
            last_values: RwLock::new(default_values.clone()),
            default_values,
            items: Mutex::new(vec![]),
            attached: Mutex::new(None),
            bypassed: AtomicBool::new(false),
            enable_queue: AtomicBool::new(false),
            realtime: AtomicBool::new(false),
            replace_this: AtomicBool::new(true),
            async_pending: AtomicBool::new(false),
            busy: Mutex::new(vec![]),
            delayed_send: Mutex::new(None),
            delayed_call: Mutex::new(None),
            last_result: Mutex::new(String::new()),
        })
    }

    /// `Engine.createBroadcaster(defaultValues)`.
    ///
    /// An object names the arguments by its keys, an array creates `arg0..`,
    /// anything else is a single argument called `value`.
    pub fn create(ctx: &mut EvalContext, defaults: &DynamicValue) -> ValueResult {
        let (ids, values): (Vec<String>, Vec<DynamicValue>) = match defaults {
            DynamicValue::Object(ObjectRef::Script(o)) => {
                let keys = o.keys();
                let values = keys.iter().map(|k| o.get(k).unwrap_or_default()).collect();
                (keys, values)
            }
            DynamicValue::Array(a) => {
                let values = a.to_vec();
                ((0..values.len()).map(|i| format!("arg{}", i)).collect(), values)
            }
            other => (vec!["value".to_string()], vec![other.clone()]),
        };
        let broadcaster: NativeObjectRef = Self::new(ids, values);
        ctx.track_native(broadcaster)
    }

    pub fn id(&self) -> String {
        self.metadata.lock().id.clone()
    }

    pub fn metadata(&self) -> Metadata {
        self.metadata.lock().clone()
    }

    pub(crate) fn set_metadata(&self, metadata: Metadata) {
        *self.metadata.lock() = metadata;
    }

    pub fn num_arguments(&self) -> usize {
        self.default_values.len()
    }

    pub fn argument_ids(&self) -> &[String] {
        &self.argument_ids
    }

    pub fn default_values(&self) -> Vec<DynamicValue> {
        self.default_values.clone()
    }

    /// A copy of the current argument vector, taken under the read lock.
    pub fn last_values(&self) -> Vec<DynamicValue> {
        self.last_values.read().clone()
    }

    pub fn last_result(&self) -> String {
        self.last_result.lock().clone()
    }

    pub fn num_targets(&self) -> usize {
        self.items.lock().len()
    }

    /// Target ids in call order.
    pub fn target_ids(&self) -> Vec<String> {
        self.items.lock().iter().map(|t| t.metadata.id.clone()).collect()
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::SeqCst)
    }

    pub fn is_queue_enabled(&self) -> bool {
        self.enable_queue.load(Ordering::SeqCst)
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enable_queue(&self, enabled: bool) {
        self.enable_queue.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn set_replace_this(&self, replace: bool) {
        self.replace_this.store(replace, Ordering::SeqCst);
    }

    pub(crate) fn set_bypassed_flag(&self, bypassed: bool) -> bool {
        self.bypassed.swap(bypassed, Ordering::SeqCst)
    }

    /// Enables realtime mode after checking every registered target.
    pub(crate) fn set_realtime_mode(&self, realm: &ScriptRealm, enabled: bool) -> Result<(), ScriptError> {
        if enabled && self.items.lock().iter().any(|t| !t.is_realtime_safe(realm)) {
            return Err(ScriptError::usage(REALTIME_FUNCTION_ERROR));
        }
        self.realtime.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    pub fn to_value(&self) -> DynamicValue {
        match self.self_ref.upgrade() {
            Some(me) => {
                let native: NativeObjectRef = me;
                DynamicValue::from_native(native)
            }
            None => DynamicValue::Undefined,
        }
    }

    pub(crate) fn weak(&self) -> Weak<ScriptBroadcaster> {
        self.self_ref.clone()
    }

    /// The `this` value a target is called with.
    pub(crate) fn this_for(&self, obj: &DynamicValue) -> DynamicValue {
        if self.replace_this.load(Ordering::SeqCst) && !obj.is_undefined_or_void() {
            obj.clone()
        } else {
            self.to_value()
        }
    }

    pub(crate) fn check_arity(&self, count: usize) -> Result<(), ScriptError> {
        if count != self.num_arguments() {
            return Err(ScriptError::usage(format!(
                "argument amount mismatch. Expected: {}",
                self.num_arguments()
            )));
        }
        Ok(())
    }

    pub fn attached_source(&self) -> Option<Arc<SourceListener>> {
        self.attached.lock().clone()
    }

    /// Attaches a host source. Fails if one is attached already.
    pub(crate) fn attach(&self, source: Arc<SourceListener>, generation: u64) -> Result<(), ScriptError> {
        let mut attached = self.attached.lock();
        if let Some(existing) = attached.as_ref() {
            return Err(ScriptError::usage(format!(
                "This callback is already registered to {}",
                existing.listener_type()
            )));
        }
        source.connect(generation);
        debug!("broadcaster {} attached to {}", self.id(), source.listener_type());
        *attached = Some(source);
        Ok(())
    }

    /// Detaches the current source. Returns whether one was attached.
    pub(crate) fn detach(&self) -> bool {
        let source = self.attached.lock().take();
        match source {
            Some(source) => {
                source.disconnect(self);
                true
            }
            None => false,
        }
    }

    /// Registers a target and calls it once with the current state.
    pub(crate) fn add_target(&self, ctx: &mut EvalContext, target: Target) -> Result<(), ScriptError> {
        if self.is_realtime() && !target.is_realtime_safe(&ctx.realm) {
            return Err(ScriptError::usage(REALTIME_FUNCTION_ERROR));
        }
        if self.items.lock().iter().any(|t| strict_equals(&t.obj, &target.obj)) {
            return Err(ScriptError::usage("this object is already registered to the listener"));
        }
        let target = Arc::new(target);
        if !matches!(target.kind, TargetKind::Delayed { .. }) {
            match self.attached_source() {
                Some(source) => source.replay(ctx, self, &target)?,
                None => {
                    let values = self.last_values();
                    if values.iter().all(|v| !v.is_undefined_or_void()) {
                        target.call(ctx, self, &values)?;
                    }
                }
            }
        }
        let mut items = self.items.lock();
        items.push(target);
        items.sort_by_key(|t| t.metadata.priority);
        Ok(())
    }

    /// Removes the target registered for `obj` (or with that metadata id).
    pub(crate) fn remove_target(&self, ctx: &EvalContext, obj: &DynamicValue) -> bool {
        let removed = {
            let mut items = self.items.lock();
            let pos = items.iter().position(|t| {
                strict_equals(&t.obj, obj)
                    || matches!(obj, DynamicValue::String(id) if *id == t.metadata.id)
            });
            pos.map(|p| items.remove(p))
        };
        match removed {
            Some(target) => {
                target.cancel(ctx);
                true
            }
            None => false,
        }
    }

    /// Drops every target matching `pred`. Returns how many were removed.
    pub(crate) fn remove_targets_where(&self, pred: impl Fn(&Target) -> bool) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|t| !pred(t));
        before - items.len()
    }

    pub(crate) fn remove_all_targets(&self, ctx: &EvalContext) {
        let items = std::mem::take(&mut *self.items.lock());
        for target in items.iter() {
            target.cancel(ctx);
        }
    }

    /// Cancels pending `sendMessageWithDelay` and `callWithDelay` jobs.
    pub(crate) fn cancel_delayed(&self, ctx: &EvalContext) {
        for slot in [&self.delayed_send, &self.delayed_call].iter() {
            if let Some(id) = slot.lock().take() {
                ctx.realm.cancel_timer(id);
            }
        }
    }

    pub fn send_message(&self, ctx: &mut EvalContext, args: Vec<DynamicValue>, is_sync: bool) -> Result<(), ScriptError> {
        self.send_internal(ctx, args, is_sync, false)
    }

    /// Updates `lastValues` and fans out, unless nothing changed.
    ///
    /// `force` skips the change check, as used by `resendLastMessage` and `reset`.
    pub(crate) fn send_internal(
        &self,
        ctx: &mut EvalContext,
        args: Vec<DynamicValue>,
        is_sync: bool,
        force: bool,
    ) -> Result<(), ScriptError> {
        self.check_arity(args.len())?;
        if is_sync && is_audio_thread() && !self.is_realtime() {
            return Err(ScriptError::usage(
                "You need to enable realtime safe execution if you want to call synchronously on the audio thread",
            ));
        }
        {
            let mut last = self.last_values.write();
            let changed = last.iter().zip(args.iter()).any(|(a, b)| !strict_equals(a, b));
            if !changed && !force && !self.is_queue_enabled() {
                return Ok(());
            }
            *last = args.clone();
        }
        if self.is_bypassed() {
            return Ok(());
        }
        if is_sync {
            self.fan_out(ctx, &args)
        } else {
            self.dispatch_async(&ctx.realm, args)
        }
    }

    fn dispatch_async(&self, realm: &Arc<ScriptRealm>, args: Vec<DynamicValue>) -> Result<(), ScriptError> {
        let weak = self.weak();
        if self.is_queue_enabled() {
            return realm.spawn_async(move |realm| {
                if let Some(broadcaster) = weak.upgrade() {
                    broadcaster.run_async(realm, args);
                }
            });
        }
        if self.async_pending.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let spawned = realm.spawn_async(move |realm| {
            if let Some(broadcaster) = weak.upgrade() {
                broadcaster.async_pending.store(false, Ordering::SeqCst);
                let args = broadcaster.last_values();
                broadcaster.run_async(realm, args);
            }
        });
        if spawned.is_err() {
            self.async_pending.store(false, Ordering::SeqCst);
        }
        spawned
    }

    fn run_async(&self, realm: &Arc<ScriptRealm>, args: Vec<DynamicValue>) {
        let mut ctx = EvalContext::new(realm.clone(), Some(realm.config().message_budget()));
        if let Err(e) = self.fan_out(&mut ctx, &args) {
            realm.console().error(format!("{}: {}", self.id(), e.report()));
        }
    }

    fn enter_fan_out(&self) -> Result<FanOutGuard<'_>, ScriptError> {
        let thread = thread::current().id();
        let mut busy = self.busy.lock();
        if busy.contains(&thread) {
            return Err(ScriptError::usage(format!(
                "Recursive broadcaster message for {}",
                self.id()
            )));
        }
        busy.push(thread);
        Ok(FanOutGuard {
            broadcaster: self,
            thread,
        })
    }

    /// Calls every target in priority order and stops at the first failure.
    pub(crate) fn fan_out(&self, ctx: &mut EvalContext, args: &[DynamicValue]) -> Result<(), ScriptError> {
        if args.iter().any(|v| v.is_undefined_or_void()) {
            return Ok(());
        }
        let _guard = self.enter_fan_out()?;
        let items = self.items.lock().clone();
        trace!("broadcaster {}: fan-out to {} targets", self.id(), items.len());
        let mut result = Ok(());
        for target in items.iter() {
            if let Err(e) = target.call(ctx, self, args) {
                result = Err(e);
                break;
            }
        }
        if result.is_ok() {
            if let Some(source) = self.attached_source() {
                result = source.after_fan_out(ctx, args);
            }
        }
        *self.last_result.lock() = match &result {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        };
        result
    }
}

impl NativeObject for ScriptBroadcaster {
    fn binding(&self) -> &'static NativeObjectBinding {
        &BROADCASTER_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }

    fn as_indexable(&self) -> Option<&dyn Indexable> {
        Some(self)
    }

    fn as_debuggable(&self) -> Option<&dyn Debuggable> {
        Some(self)
    }

    fn trace(&self, visitor: &mut dyn FnMut(&DynamicValue)) {
        for value in self.last_values.read().iter() {
            visitor(value);
        }
        for target in self.items.lock().iter() {
            target.trace(visitor);
        }
        if let Some(source) = self.attached.lock().as_ref() {
            source.trace(visitor);
        }
    }

    fn clear_references(&self) {
        let items = std::mem::take(&mut *self.items.lock());
        let source = self.attached.lock().take();
        let values = std::mem::replace(
            &mut *self.last_values.write(),
            vec![DynamicValue::Undefined; self.num_arguments()],
        );
        drop(items);
        drop(source);
        drop(values);
    }
}

impl Callable for ScriptBroadcaster {
    fn call(&self, ctx: &mut EvalContext, _receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
        let is_sync = self.attached_source().is_none();
        self.send_message(ctx, args, is_sync)?;
        Ok(DynamicValue::Undefined)
    }
}

impl Indexable for ScriptBroadcaster {
    fn get_member(
        &self,
        _ctx: &mut EvalContext,
        _receiver: &NativeObjectRef,
        name: &str,
    ) -> Result<Option<DynamicValue>, ScriptError> {
        if let Some(index) = self.argument_ids.iter().position(|id| id == name) {
            return Ok(self.last_values.read().get(index).cloned());
        }
        if BROADCASTER_BINDING.find_method(name).is_some() {
            return Ok(None);
        }
        Err(ScriptError::usage(format!(
            "This broadcaster doesn't have a {} property",
            name
        )))
    }

    fn set_member(
        &self,
        ctx: &mut EvalContext,
        _receiver: &NativeObjectRef,
        name: &str,
        value: DynamicValue,
    ) -> Result<(), ScriptError> {
        let index = self.argument_ids.iter().position(|id| id == name).ok_or_else(|| {
            ScriptError::usage(format!("This broadcaster doesn't have a {} property", name))
        })?;
        let mut args = self.last_values();
        args[index] = value;
        self.send_internal(ctx, args, true, false)
    }
}

impl Debuggable for ScriptBroadcaster {
    fn debug_entries(&self) -> Vec<(String, DynamicValue)> {
        let values = self.last_values.read();
        self.argument_ids
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::eval::statement::execute_program;
    use crate::runner::plugin::registry::ApiRegistry;
    use crate::runner::plugin::types::downcast_native;

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

    fn eval(code: &str) -> DynamicValue {
        run(&realm(), code).unwrap()
    }

    #[test]
    fn test_argument_ids_from_object() {
        let result = eval(
            "var bc = Engine.createBroadcaster({ component: undefined, value: 0 }); Object.keys(bc).join(',');",
        );
        assert_eq!(result, DynamicValue::from("component,value"));
    }

    #[test]
    fn test_unchanged_message_is_coalesced() {
        let result = eval(
            "var count = 0;
             var bc = Engine.createBroadcaster([0, 0]);
             bc.addListener('a', 'counter', function(x, y) { count += 1; });
             bc.sendSyncMessage([1, 2]);
             bc.sendSyncMessage([1, 2]);
             bc.sendSyncMessage([1, 3]);
             count;",
        );
        // One initial call on registration plus two changes.
        assert_eq!(result, DynamicValue::Int(3));
    }

    #[test]
    fn test_targets_run_in_ascending_priority() {
        let result = eval(
            "var order = [];
             var bc = Engine.createBroadcaster({ value: undefined });
             bc.addListener('five', { id: 'five', priority: 5 }, function(v) { order.push(5); });
             bc.addListener('one', { id: 'one', priority: 1 }, function(v) { order.push(1); });
             bc.addListener('ten', { id: 'ten', priority: 10 }, function(v) { order.push(10); });
             bc.sendSyncMessage([1]);
             bc.sendSyncMessage([2]);
             order.join(',');",
        );
        assert_eq!(result, DynamicValue::from("1,5,10,1,5,10"));
    }

    #[test]
    fn test_duplicate_object_is_rejected() {
        let realm = realm();
        let err = run(
            &realm,
            "var bc = Engine.createBroadcaster(0);
             var f = function(v) {};
             bc.addListener('obj', 'first', f);
             bc.addListener('obj', 'second', f);",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "this object is already registered to the listener");
    }

    #[test]
    fn test_first_failure_stops_fan_out() {
        let realm = realm();
        let err = run(
            &realm,
            "var reached = false;
             var bc = Engine.createBroadcaster({ value: undefined });
             bc.addListener('a', { id: 'a', priority: 1 }, function(v) { throw 'broken'; });
             bc.addListener('b', { id: 'b', priority: 2 }, function(v) { reached = true; });
             bc.sendSyncMessage([1]);",
        )
        .unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert_eq!(run(&realm, "reached;").unwrap(), DynamicValue::Bool(false));
        assert!(run(&realm, "bc.getLastResult();").unwrap().to_display_string().contains("broken"));
    }

    #[test]
    fn test_arity_mismatch() {
        let realm = realm();
        let err = run(&realm, "var bc = Engine.createBroadcaster([1, 2]); bc.sendSyncMessage([1]);").unwrap_err();
        assert_eq!(err.to_string(), "argument amount mismatch. Expected: 2");
    }

    #[test]
    fn test_recursive_sync_send_is_an_error() {
        let realm = realm();
        let err = run(
            &realm,
            "var bc = Engine.createBroadcaster({ value: undefined });
             bc.setId('loop');
             bc.addListener('a', 'self', function(v) { bc.sendSyncMessage([v + 1]); });
             bc.sendSyncMessage([1]);",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Recursive broadcaster message for loop");
    }

    #[test]
    fn test_property_access_sends() {
        let result = eval(
            "var seen = 0;
             var bc = Engine.createBroadcaster({ gain: 0 });
             bc.addListener('a', 'x', function(g) { seen = g; });
             bc.gain = 4;
             seen + bc.gain;",
        );
        assert_eq!(result, DynamicValue::Int(8));
    }

    #[test]
    fn test_unknown_property() {
        let realm = realm();
        let err = run(&realm, "var bc = Engine.createBroadcaster({ gain: 0 }); bc.volume;").unwrap_err();
        assert_eq!(err.to_string(), "This broadcaster doesn't have a volume property");
    }

    #[test]
    fn test_this_is_registered_object() {
        let result = eval(
            "var holder = { name: 'holder' };
             var seen = '';
             var bc = Engine.createBroadcaster({ value: undefined });
             bc.addListener(holder, 'x', function(v) { seen = this.name; });
             bc.sendSyncMessage([1]);
             seen;",
        );
        assert_eq!(result, DynamicValue::from("holder"));
    }

    #[test]
    fn test_bypass_keeps_last_values() {
        let result = eval(
            "var count = 0;
             var bc = Engine.createBroadcaster({ value: undefined });
             bc.addListener('a', 'x', function(v) { count += 1; });
             bc.setBypassed(true, false, true);
             bc.sendSyncMessage([3]);
             var during = count;
             bc.setBypassed(false, true, true);
             [during, count, bc.value].join(',');",
        );
        assert_eq!(result, DynamicValue::from("0,1,3"));
    }

    #[test]
    fn test_async_send_needs_processor() {
        let realm = realm();
        let err = run(&realm, "var bc = Engine.createBroadcaster(0); bc.sendAsyncMessage([1]);").unwrap_err();
        assert_eq!(err.to_string(), "Asynchronous execution needs a script processor");
    }

    #[test]
    fn test_concurrent_identical_sends_deliver_one_change() {
        let realm = realm();
        let bc_value = run(
            &realm,
            "var count = 0;
             var bc = Engine.createBroadcaster({ value: undefined });
             bc.addListener('a', 'x', function(v) { count += 1; });
             bc;",
        )
        .unwrap();
        let senders: Vec<_> = (0..8)
            .map(|_| {
                let realm = realm.clone();
                let bc_value = bc_value.clone();
                thread::spawn(move || {
                    let bc = downcast_native::<ScriptBroadcaster>(&bc_value).unwrap();
                    let mut ctx = EvalContext::new(realm, None);
                    bc.send_internal(&mut ctx, vec![DynamicValue::Int(7)], true, false).unwrap();
                })
            })
            .collect();
        for sender in senders {
            sender.join().unwrap();
        }
        assert_eq!(run(&realm, "count;").unwrap(), DynamicValue::Int(1));
    }

    #[test]
    fn test_debug_entries_list_last_values() {
        let bc = ScriptBroadcaster::new(
            vec!["a".to_string(), "b".to_string()],
            vec![DynamicValue::Int(1), DynamicValue::Int(2)],
        );
        let entries = bc.debug_entries();
        assert_eq!(entries[1], ("b".to_string(), DynamicValue::Int(2)));
    }
}
