//! Registry of the native objects a compiled script sees as globals.
//!
//! The registry is filled before a compile and installed into the new realm's
//! global scope while the compile lock is held exclusively, so callbacks never
//! observe a half-registered scope.

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::realm::ScriptRealm;
use crate::runner::ds::scope::BindingKind;
use crate::runner::ds::value::{DynamicValue, NativeObjectRef};
use crate::runner::std_lib::register_api_classes;

/// Named native singletons in registration order.
#[derive(Default, Clone)]
pub struct ApiRegistry {
    objects: Vec<(String, NativeObjectRef)>,
}

impl ApiRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ApiRegistry { objects: vec![] }
    }

    /// Create a registry with the standard API classes.
    pub fn with_standard_classes() -> Self {
        let mut registry = Self::new();
        register_api_classes(&mut registry);
        registry
    }

    /// Registers an API class under its binding's class name.
    pub fn register_api_class(&mut self, object: NativeObjectRef) {
        let name = object.class_name().to_string();
        self.register_native_object(&name, object);
    }

    /// Registers an object under an arbitrary name. A second registration
    /// under the same name replaces the first.
    pub fn register_native_object(&mut self, name: &str, object: NativeObjectRef) {
        match self.objects.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = object,
            None => self.objects.push((name.to_string(), object)),
        }
    }

    /// Copies the registrations of `other` over this registry.
    pub fn extend(&mut self, other: &ApiRegistry) {
        for (name, object) in other.objects.iter() {
            self.register_native_object(name, object.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&NativeObjectRef> {
        self.objects.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.objects.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Declares every registered object in the realm's global scope.
    pub fn install(&self, realm: &ScriptRealm) -> Result<(), ScriptError> {
        let global = realm.global_scope();
        for (name, object) in self.objects.iter() {
            global.declare(name, DynamicValue::from_native(object.clone()), BindingKind::ApiClass)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_classes_are_installed_as_api_classes() {
        let registry = ApiRegistry::with_standard_classes();
        for name in ["Console", "Math", "Engine", "Content", "Synth", "Message", "Buffer"].iter() {
            assert!(registry.contains(name), "{} missing", name);
        }
        let realm = ScriptRealm::standalone();
        registry.install(&realm).unwrap();
        assert_eq!(
            realm.global_scope().own_binding_kind("Math"),
            Some(BindingKind::ApiClass)
        );
    }

    #[test]
    fn test_api_class_cannot_be_overwritten_by_script() {
        let realm = ScriptRealm::standalone();
        ApiRegistry::with_standard_classes().install(&realm).unwrap();
        let err = realm.global_scope().assign("Math", DynamicValue::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "Can't assign to API class Math");
    }
}
