use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::parser::ast::FunctionData;
use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::type_conversion::{to_boolean, to_number, to_string};
use crate::runner::ds::scope::Scope;
use crate::runner::plugin::types::NativeObject;

pub type ArrayRef = Arc<ArrayObject>;
pub type FunctionRef = Arc<FunctionObject>;
pub type BufferRef = Arc<AudioBuffer>;
pub type NativeObjectRef = Arc<dyn NativeObject>;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_FUNCTION: &str = "function";

/// Any script-visible value. Heap-backed variants are shared, so cloning them is a
/// reference count bump.
#[derive(Clone)]
pub enum DynamicValue {
    Undefined,
    /// The "no value" marker; `null` in source evaluates to this.
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    Buffer(BufferRef),
}

#[derive(Clone)]
pub enum ObjectRef {
    Script(Arc<DynamicObject>),
    Native(NativeObjectRef),
}

impl ObjectRef {
    pub fn ptr_id(&self) -> usize {
        match self {
            ObjectRef::Script(o) => Arc::as_ptr(o) as *const () as usize,
            ObjectRef::Native(o) => Arc::as_ptr(o) as *const () as usize,
        }
    }
}

impl DynamicValue {
    pub fn type_of(&self) -> &'static str {
        match self {
            DynamicValue::Undefined => TYPE_STR_UNDEFINED,
            DynamicValue::Void => TYPE_STR_OBJECT,
            DynamicValue::Bool(_) => TYPE_STR_BOOLEAN,
            DynamicValue::Int(_) | DynamicValue::Double(_) => TYPE_STR_NUMBER,
            DynamicValue::String(_) => TYPE_STR_STRING,
            DynamicValue::Array(_) | DynamicValue::Object(_) | DynamicValue::Buffer(_) => {
                TYPE_STR_OBJECT
            }
            DynamicValue::Function(_) => TYPE_STR_FUNCTION,
        }
    }

    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DynamicValue::Undefined => "undefined",
            DynamicValue::Void => "void",
            DynamicValue::Bool(_) => "bool",
            DynamicValue::Int(_) => "int",
            DynamicValue::Double(_) => "double",
            DynamicValue::String(_) => "string",
            DynamicValue::Array(_) => "Array",
            DynamicValue::Object(ObjectRef::Script(_)) => "Object",
            DynamicValue::Object(ObjectRef::Native(n)) => n.class_name(),
            DynamicValue::Function(_) => "function",
            DynamicValue::Buffer(_) => "Buffer",
        }
    }

    pub fn is_undefined_or_void(&self) -> bool {
        matches!(self, DynamicValue::Undefined | DynamicValue::Void)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DynamicValue::Int(_) | DynamicValue::Double(_))
    }

    pub fn is_callable(&self) -> bool {
        match self {
            DynamicValue::Function(_) => true,
            DynamicValue::Object(ObjectRef::Native(n)) => n.as_callable().is_some(),
            _ => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        to_boolean(self)
    }

    pub fn to_number(&self) -> f64 {
        to_number(self)
    }

    pub fn to_display_string(&self) -> String {
        to_string(self)
    }

    pub fn as_native(&self) -> Option<&NativeObjectRef> {
        match self {
            DynamicValue::Object(ObjectRef::Native(n)) => Some(n),
            _ => None,
        }
    }

    /// Identity of heap-backed values, `None` for primitives.
    pub fn ptr_id(&self) -> Option<usize> {
        match self {
            DynamicValue::Array(a) => Some(Arc::as_ptr(a) as *const () as usize),
            DynamicValue::Object(o) => Some(o.ptr_id()),
            DynamicValue::Function(f) => Some(Arc::as_ptr(f) as *const () as usize),
            DynamicValue::Buffer(b) => Some(Arc::as_ptr(b) as *const () as usize),
            _ => None,
        }
    }

    pub fn from_native(object: NativeObjectRef) -> Self {
        DynamicValue::Object(ObjectRef::Native(object))
    }
}

impl Default for DynamicValue {
    fn default() -> Self {
        DynamicValue::Undefined
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<i64> for DynamicValue {
    fn from(i: i64) -> Self {
        DynamicValue::Int(i)
    }
}

impl From<i32> for DynamicValue {
    fn from(i: i32) -> Self {
        DynamicValue::Int(i as i64)
    }
}

impl From<usize> for DynamicValue {
    fn from(i: usize) -> Self {
        DynamicValue::Int(i as i64)
    }
}

impl From<f64> for DynamicValue {
    fn from(d: f64) -> Self {
        DynamicValue::Double(d)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl Display for DynamicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Debug for DynamicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Undefined => write!(f, "DynamicValue::Undefined"),
            DynamicValue::Void => write!(f, "DynamicValue::Void"),
            DynamicValue::Bool(b) => write!(f, "DynamicValue::Bool({})", b),
            DynamicValue::Int(i) => write!(f, "DynamicValue::Int({})", i),
            DynamicValue::Double(d) => write!(f, "DynamicValue::Double({:?})", d),
            DynamicValue::String(s) => write!(f, "DynamicValue::String({:?})", s),
            DynamicValue::Array(a) => write!(f, "DynamicValue::Array(len={})", a.len()),
            DynamicValue::Object(ObjectRef::Script(_)) => write!(f, "DynamicValue::Object(...)"),
            DynamicValue::Object(ObjectRef::Native(n)) => {
                write!(f, "DynamicValue::Object({})", n.class_name())
            }
            DynamicValue::Function(func) => write!(f, "DynamicValue::Function({})", func.name()),
            DynamicValue::Buffer(b) => write!(f, "DynamicValue::Buffer(len={})", b.len()),
        }
    }
}

/// Same variant and same payload; heap-backed values compare by identity.
impl PartialEq for DynamicValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DynamicValue::Undefined, DynamicValue::Undefined) => true,
            (DynamicValue::Void, DynamicValue::Void) => true,
            (DynamicValue::Bool(a), DynamicValue::Bool(b)) => a == b,
            (DynamicValue::Int(a), DynamicValue::Int(b)) => a == b,
            (DynamicValue::Double(a), DynamicValue::Double(b)) => a == b,
            (DynamicValue::String(a), DynamicValue::String(b)) => a == b,
            (a, b) => match (a.ptr_id(), b.ptr_id()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Insertion-ordered property storage.
#[derive(Default, Clone)]
pub struct PropertyMap {
    entries: Vec<(String, DynamicValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap { entries: vec![] }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: &str, value: DynamicValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<DynamicValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, DynamicValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn take(&mut self) -> Vec<(String, DynamicValue)> {
        std::mem::take(&mut self.entries)
    }
}

/// A script object literal or `new Object()`.
pub struct DynamicObject {
    properties: Mutex<PropertyMap>,
}

impl DynamicObject {
    pub fn new() -> Self {
        DynamicObject {
            properties: Mutex::new(PropertyMap::new()),
        }
    }

    pub fn with_properties(properties: PropertyMap) -> Self {
        DynamicObject {
            properties: Mutex::new(properties),
        }
    }

    pub fn get(&self, key: &str) -> Option<DynamicValue> {
        self.properties.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: DynamicValue) {
        self.properties.lock().set(key, value)
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.properties.lock().remove(key);
        removed.is_some()
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.lock().contains(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.properties.lock().keys()
    }

    pub fn len(&self) -> usize {
        self.properties.lock().len()
    }

    /// Runs `f` over the property values while the object is locked.
    pub fn for_each_value(&self, mut f: impl FnMut(&DynamicValue)) {
        for (_, v) in self.properties.lock().iter() {
            f(v)
        }
    }

    /// Drops every property. The values are released after the lock.
    pub fn clear(&self) {
        let taken = self.properties.lock().take();
        drop(taken);
    }
}

impl Default for DynamicObject {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ArrayObject {
    elements: Mutex<Vec<DynamicValue>>,
}

impl ArrayObject {
    pub fn new(elements: Vec<DynamicValue>) -> Self {
        ArrayObject {
            elements: Mutex::new(elements),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<DynamicValue> {
        self.elements.lock().get(index).cloned()
    }

    /// Stores at `index`, growing the array with `Undefined` when needed.
    /// The array never grows past `max_len` elements.
    pub fn set(&self, index: usize, value: DynamicValue, max_len: usize) -> Result<(), ScriptError> {
        let mut elements = self.elements.lock();
        if index >= elements.len() {
            reserve_to(&mut *elements, index.saturating_add(1), max_len, "Array index")?;
            elements.resize(index + 1, DynamicValue::Undefined);
        }
        elements[index] = value;
        Ok(())
    }

    pub fn push(&self, value: DynamicValue) -> usize {
        let mut elements = self.elements.lock();
        elements.push(value);
        elements.len()
    }

    pub fn to_vec(&self) -> Vec<DynamicValue> {
        self.elements.lock().clone()
    }

    /// Exclusive access to the element vector.
    pub fn with_elements<R>(&self, f: impl FnOnce(&mut Vec<DynamicValue>) -> R) -> R {
        f(&mut self.elements.lock())
    }

    pub fn clear(&self) {
        let taken = std::mem::take(&mut *self.elements.lock());
        drop(taken);
    }
}

/// A closure: the function's AST plus the scope active when it was created.
pub struct FunctionObject {
    pub data: Arc<FunctionData>,
    scope: Mutex<Option<Arc<Scope>>>,
    bound_this: Mutex<Option<DynamicValue>>,
}

impl FunctionObject {
    pub fn new(data: Arc<FunctionData>, scope: Arc<Scope>, bound_this: Option<DynamicValue>) -> Self {
        FunctionObject {
            data,
            scope: Mutex::new(Some(scope)),
            bound_this: Mutex::new(bound_this),
        }
    }

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn parameter_count(&self) -> usize {
        self.data.params.len()
    }

    pub fn is_inline(&self) -> bool {
        self.data.is_inline()
    }

    /// `None` once the cycle collector has cleared the closure.
    pub fn scope(&self) -> Option<Arc<Scope>> {
        self.scope.lock().clone()
    }

    pub fn bound_this(&self) -> Option<DynamicValue> {
        self.bound_this.lock().clone()
    }

    pub(crate) fn visit_references(&self, mut f: impl FnMut(Option<&Arc<Scope>>, Option<&DynamicValue>)) {
        let scope = self.scope.lock();
        let this = self.bound_this.lock();
        f(scope.as_ref(), this.as_ref());
    }

    pub(crate) fn clear_references(&self) {
        let scope = self.scope.lock().take();
        let this = self.bound_this.lock().take();
        drop(scope);
        drop(this);
    }
}

/// Makes room for `len` elements in `v`, failing instead of aborting when
/// `len` passes `max_len` or the allocation is refused.
pub fn reserve_to<T>(v: &mut Vec<T>, len: usize, max_len: usize, what: &str) -> Result<(), ScriptError> {
    if len > max_len {
        return Err(ScriptError::range(format!("{} out of range", what)));
    }
    if len > v.len() {
        v.try_reserve(len - v.len())
            .map_err(|_| ScriptError::range("Out of memory"))?;
    }
    Ok(())
}

/// Shared sample storage handed to and from the host.
pub struct AudioBuffer {
    samples: RwLock<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(size: usize) -> Self {
        AudioBuffer {
            samples: RwLock::new(vec![0.0; size]),
        }
    }

    /// A zeroed buffer of a script-requested size.
    pub fn with_size(size: usize, max_len: usize) -> Result<Self, ScriptError> {
        let mut samples = Vec::new();
        reserve_to(&mut samples, size, max_len, "Buffer size")?;
        samples.resize(size, 0.0);
        Ok(AudioBuffer::from_samples(samples))
    }

    pub fn from_samples(samples: Vec<f32>) -> Self {
        AudioBuffer {
            samples: RwLock::new(samples),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.samples.read().get(index).copied()
    }

    /// Returns false when `index` is out of range.
    pub fn set(&self, index: usize, value: f32) -> bool {
        match self.samples.write().get_mut(index) {
            Some(s) => {
                *s = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.samples.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_map_keeps_insertion_order() {
        let mut map = PropertyMap::new();
        map.set("b", DynamicValue::Int(1));
        map.set("a", DynamicValue::Int(2));
        map.set("b", DynamicValue::Int(3));
        assert_eq!(map.keys(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&DynamicValue::Int(3)));
        map.remove("b");
        assert_eq!(map.keys(), vec!["a"]);
    }

    #[test]
    fn test_array_set_extends_with_undefined() {
        let array = ArrayObject::new(vec![DynamicValue::Int(1)]);
        array.set(3, DynamicValue::Int(4), 16).unwrap();
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(2), Some(DynamicValue::Undefined));
        assert_eq!(array.get(10), None);
    }

    #[test]
    fn test_array_set_past_limit_fails_without_growing() {
        let array = ArrayObject::new(vec![]);
        let err = array.set(16, DynamicValue::Int(1), 16).unwrap_err();
        assert_eq!(err.to_string(), "Array index out of range");
        assert!(array.is_empty());
        assert!(array.set(usize::MAX, DynamicValue::Int(1), usize::MAX).is_err());
    }

    #[test]
    fn test_buffer_with_size_respects_limit() {
        assert_eq!(AudioBuffer::with_size(4, 4).unwrap().len(), 4);
        assert!(AudioBuffer::with_size(5, 4).is_err());
    }

    #[test]
    fn test_clone_of_array_shares_storage() {
        let a = DynamicValue::Array(Arc::new(ArrayObject::new(vec![])));
        let b = a.clone();
        if let DynamicValue::Array(arr) = &b {
            arr.push(DynamicValue::Bool(true));
        }
        match a {
            DynamicValue::Array(arr) => assert_eq!(arr.len(), 1),
            other => panic!("Unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_buffer_bounds() {
        let buffer = AudioBuffer::new(2);
        assert!(buffer.set(1, 0.5));
        assert!(!buffer.set(2, 0.5));
        assert_eq!(buffer.get(1), Some(0.5));
        assert_eq!(buffer.get(2), None);
    }

    #[test]
    fn test_typeof_void_is_object() {
        assert_eq!(DynamicValue::Void.type_of(), "object");
        assert_eq!(DynamicValue::Undefined.type_of(), "undefined");
        assert_eq!(DynamicValue::Double(1.5).type_of(), "number");
    }
}
