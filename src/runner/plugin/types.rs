//! Core types for native API objects.
//!
//! A native object is a host-side value the script can hold, pass around and
//! call methods on. Every native object has a static [`NativeObjectBinding`]
//! describing its class: method table, property table and an optional
//! constructor. Further behaviour is offered through capabilities
//! ([`Callable`], [`Indexable`], [`Debuggable`]) that the evaluator queries
//! instead of relying on a class hierarchy.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::parser::ast::FunctionData;
use crate::runner::ds::error::ScriptError;
use crate::runner::ds::realm::ScriptRealm;
use crate::runner::ds::scope::{Scope, ScopeKind};
use crate::runner::ds::value::{
    ArrayObject, DynamicObject, DynamicValue, FunctionObject, NativeObjectRef, ObjectRef,
    PropertyMap,
};
use crate::runner::eval::types::ValueResult;

/// Execution context passed to the evaluator and to native functions.
///
/// It carries the realm of the running script, the current lexical scope,
/// the `this` value and the watchdog deadline of the current callback.
pub struct EvalContext {
    pub realm: Arc<ScriptRealm>,
    pub scope: Arc<Scope>,
    pub this_value: DynamicValue,
    pub call_depth: usize,
    deadline: Option<Instant>,
    budget_ms: u64,
}

impl EvalContext {
    /// A context at global scope. `budget` of `None` means no watchdog.
    pub fn new(realm: Arc<ScriptRealm>, budget: Option<Duration>) -> Self {
        let scope = realm.global_scope().clone();
        EvalContext {
            realm,
            scope,
            this_value: DynamicValue::Undefined,
            call_depth: 0,
            deadline: budget.map(|b| Instant::now() + b),
            budget_ms: budget.map(|b| b.as_millis() as u64).unwrap_or(0),
        }
    }

    /// Aborts with a timeout once the execution budget is used up.
    pub fn check_timeout(&self) -> Result<(), ScriptError> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(ScriptError::timeout(self.budget_ms)),
            _ => Ok(()),
        }
    }

    pub fn has_deadline(&self) -> bool {
        self.deadline.is_some()
    }

    /// Runs `f` with a different scope and `this`, restoring both afterwards.
    pub fn with_frame<R>(
        &mut self,
        scope: Arc<Scope>,
        this_value: DynamicValue,
        f: impl FnOnce(&mut EvalContext) -> R,
    ) -> R {
        let saved_scope = std::mem::replace(&mut self.scope, scope);
        let saved_this = std::mem::replace(&mut self.this_value, this_value);
        let result = f(self);
        self.scope = saved_scope;
        self.this_value = saved_this;
        result
    }

    /// Runs `f` in a fresh child scope of the current one.
    pub fn with_child_scope<R>(
        &mut self,
        kind: ScopeKind,
        f: impl FnOnce(&mut EvalContext) -> Result<R, ScriptError>,
    ) -> Result<R, ScriptError> {
        let scope = self.new_scope(kind)?;
        let this_value = self.this_value.clone();
        self.with_frame(scope, this_value, f)
    }

    pub fn new_scope(&mut self, kind: ScopeKind) -> Result<Arc<Scope>, ScriptError> {
        let scope = Scope::new_child(&self.scope, kind);
        self.realm.heap().track_scope(&scope)?;
        Ok(scope)
    }

    pub fn new_array(&mut self, elements: Vec<DynamicValue>) -> ValueResult {
        let array = Arc::new(ArrayObject::new(elements));
        self.realm.heap().track_array(&array)?;
        Ok(DynamicValue::Array(array))
    }

    pub fn new_object(&mut self, properties: PropertyMap) -> ValueResult {
        let object = Arc::new(DynamicObject::with_properties(properties));
        self.realm.heap().track_object(&object)?;
        Ok(DynamicValue::Object(ObjectRef::Script(object)))
    }

    pub fn new_function(&mut self, data: Arc<FunctionData>, bound_this: Option<DynamicValue>) -> ValueResult {
        let function = Arc::new(FunctionObject::new(data, self.scope.clone(), bound_this));
        self.realm.heap().track_function(&function)?;
        Ok(DynamicValue::Function(function))
    }

    /// Registers a script-created native object with the heap tracker.
    pub fn track_native(&mut self, native: NativeObjectRef) -> ValueResult {
        self.realm.heap().track_native(&native)?;
        Ok(DynamicValue::from_native(native))
    }
}

/// Function signature for native methods.
/// Native methods receive the evaluation context, the receiver and the arguments.
pub type NativeFn =
    fn(ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult;

pub type PropertyGetter = fn(ctx: &mut EvalContext, receiver: &NativeObjectRef) -> ValueResult;

pub type PropertySetter =
    fn(ctx: &mut EvalContext, receiver: &NativeObjectRef, value: DynamicValue) -> Result<(), ScriptError>;

/// Constructor used by `new ClassName(args)`.
pub type ConstructorFn = fn(ctx: &mut EvalContext, args: Vec<DynamicValue>) -> ValueResult;

pub struct NativeMethod {
    pub name: &'static str,
    /// Exact argument count, or `None` for variadic methods.
    pub arity: Option<usize>,
    /// Whether the method may be called from a realtime broadcaster target.
    pub realtime_safe: bool,
    pub function: NativeFn,
}

pub enum NativePropertyKind {
    Constant(DynamicValue),
    Accessor {
        getter: PropertyGetter,
        setter: Option<PropertySetter>,
    },
}

pub struct NativeProperty {
    pub name: &'static str,
    pub kind: NativePropertyKind,
}

/// Class description of a native object.
pub struct NativeObjectBinding {
    class_name: &'static str,
    parent_class: Option<&'static str>,
    methods: Vec<NativeMethod>,
    properties: Vec<NativeProperty>,
    constructor: Option<ConstructorFn>,
}

impl NativeObjectBinding {
    pub fn new(class_name: &'static str) -> Self {
        NativeObjectBinding {
            class_name,
            parent_class: None,
            methods: vec![],
            properties: vec![],
            constructor: None,
        }
    }

    /// Names a class this one also answers to in `instanceof` checks.
    pub fn with_parent_class(mut self, parent: &'static str) -> Self {
        self.parent_class = Some(parent);
        self
    }

    /// Add a native method.
    pub fn add_method(
        mut self,
        name: &'static str,
        arity: Option<usize>,
        realtime_safe: bool,
        function: NativeFn,
    ) -> Self {
        self.methods.push(NativeMethod {
            name,
            arity,
            realtime_safe,
            function,
        });
        self
    }

    /// Add a read-only constant property.
    pub fn add_constant(mut self, name: &'static str, value: DynamicValue) -> Self {
        self.properties.push(NativeProperty {
            name,
            kind: NativePropertyKind::Constant(value),
        });
        self
    }

    pub fn add_property(
        mut self,
        name: &'static str,
        getter: PropertyGetter,
        setter: Option<PropertySetter>,
    ) -> Self {
        self.properties.push(NativeProperty {
            name,
            kind: NativePropertyKind::Accessor { getter, setter },
        });
        self
    }

    /// Set the constructor function.
    pub fn with_constructor(mut self, constructor: ConstructorFn) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn find_method(&self, name: &str) -> Option<&NativeMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn find_property(&self, name: &str) -> Option<&NativeProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn constructor(&self) -> Option<ConstructorFn> {
        self.constructor
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name).collect()
    }

    pub fn is_a(&self, class_name: &str) -> bool {
        self.class_name == class_name || self.parent_class == Some(class_name)
    }
}

/// A host-side object visible to scripts.
pub trait NativeObject: Send + Sync {
    fn binding(&self) -> &'static NativeObjectBinding;

    fn as_any(&self) -> &dyn Any;

    fn class_name(&self) -> &'static str {
        self.binding().class_name()
    }

    /// String form used by `toString` and concatenation.
    fn to_script_string(&self) -> String {
        format!("[object {}]", self.class_name())
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        None
    }

    fn as_indexable(&self) -> Option<&dyn Indexable> {
        None
    }

    fn as_debuggable(&self) -> Option<&dyn Debuggable> {
        None
    }

    /// Reports every script value this object keeps alive.
    fn trace(&self, _visitor: &mut dyn FnMut(&DynamicValue)) {}

    /// Drops every script value this object keeps alive.
    fn clear_references(&self) {}
}

/// Objects that can be invoked like a function: `obj(a, b)`.
pub trait Callable {
    fn call(&self, ctx: &mut EvalContext, receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult;
}

/// Objects with dynamic named members beyond their binding's property table.
pub trait Indexable {
    /// `Ok(None)` when the object has no such member.
    fn get_member(
        &self,
        ctx: &mut EvalContext,
        receiver: &NativeObjectRef,
        name: &str,
    ) -> Result<Option<DynamicValue>, ScriptError>;

    fn set_member(
        &self,
        ctx: &mut EvalContext,
        receiver: &NativeObjectRef,
        name: &str,
        value: DynamicValue,
    ) -> Result<(), ScriptError>;
}

/// Objects that can list their state for a debugger or console dump.
pub trait Debuggable {
    fn debug_entries(&self) -> Vec<(String, DynamicValue)>;
}

/// Downcasts a script value to a concrete native type.
pub fn downcast_native<T: 'static>(value: &DynamicValue) -> Option<&T> {
    value.as_native().and_then(|n| n.as_any().downcast_ref::<T>())
}

/// Downcasts a method receiver, failing with a type error naming the expected class.
pub fn receiver_as<'a, T: 'static>(receiver: &'a NativeObjectRef, class_name: &str) -> Result<&'a T, ScriptError> {
    receiver
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ScriptError::type_error(format!("Receiver is not a {}", class_name)))
}

lazy_static! {
    static ref BOUND_METHOD_BINDING: NativeObjectBinding = NativeObjectBinding::new("BoundMethod");
}

/// A native method read as a value (`var f = Math.abs;`), callable later.
pub struct BoundNativeMethod {
    pub receiver: NativeObjectRef,
    pub method_name: &'static str,
}

impl NativeObject for BoundNativeMethod {
    fn binding(&self) -> &'static NativeObjectBinding {
        &BOUND_METHOD_BINDING
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_script_string(&self) -> String {
        format!(
            "function {}.{}",
            self.receiver.class_name(),
            self.method_name
        )
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }
}

impl Callable for BoundNativeMethod {
    fn call(&self, ctx: &mut EvalContext, _receiver: &NativeObjectRef, args: Vec<DynamicValue>) -> ValueResult {
        crate::runner::eval::function::call_native_method(ctx, &self.receiver, self.method_name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(_ctx: &mut EvalContext, _r: &NativeObjectRef, _args: Vec<DynamicValue>) -> ValueResult {
        Ok(DynamicValue::Int(42))
    }

    #[test]
    fn test_binding_lookup() {
        let binding = NativeObjectBinding::new("Thing")
            .with_parent_class("ScriptComponent")
            .add_method("answer", Some(0), true, answer)
            .add_constant("PI", DynamicValue::Double(std::f64::consts::PI));
        assert!(binding.find_method("answer").is_some());
        assert!(binding.find_method("question").is_none());
        assert!(binding.find_property("PI").is_some());
        assert!(binding.is_a("Thing"));
        assert!(binding.is_a("ScriptComponent"));
        assert!(!binding.is_a("Broadcaster"));
        assert_eq!(binding.method_names(), vec!["answer"]);
    }
}
