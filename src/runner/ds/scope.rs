use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::value::DynamicValue;

/// Register variables a single script may declare.
pub const MAX_REGISTERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Reserved by hoisting; the declaration has not run yet.
    Hoisted,
    Var,
    Const,
    Local,
    Register,
    Parameter,
    ApiClass,
}

impl BindingKind {
    pub fn describe(&self) -> &'static str {
        match self {
            BindingKind::Hoisted | BindingKind::Var => "variable",
            BindingKind::Const => "const variable",
            BindingKind::Local => "local variable",
            BindingKind::Register => "register variable",
            BindingKind::Parameter => "parameter",
            BindingKind::ApiClass => "API class",
        }
    }
}

#[derive(Clone)]
pub struct Binding {
    pub value: DynamicValue,
    pub kind: BindingKind,
}

/// A lexical environment. Children hold their parent strongly; nothing points
/// back down the chain.
pub struct Scope {
    kind: ScopeKind,
    parent: Option<Arc<Scope>>,
    bindings: Mutex<HashMap<String, Binding>>,
}

impl Scope {
    pub fn new_global() -> Arc<Scope> {
        Arc::new(Scope {
            kind: ScopeKind::Global,
            parent: None,
            bindings: Mutex::new(HashMap::new()),
        })
    }

    pub fn new_child(parent: &Arc<Scope>, kind: ScopeKind) -> Arc<Scope> {
        Arc::new(Scope {
            kind,
            parent: Some(parent.clone()),
            bindings: Mutex::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    /// Nearest enclosing function or global scope; `var` declarations land here.
    pub fn variable_scope(self: &Arc<Self>) -> Arc<Scope> {
        let mut current = self.clone();
        while current.kind == ScopeKind::Block {
            match &current.parent {
                Some(p) => current = p.clone(),
                None => break,
            }
        }
        current
    }

    pub fn global_scope(self: &Arc<Self>) -> Arc<Scope> {
        let mut current = self.clone();
        while let Some(p) = current.parent.clone() {
            current = p;
        }
        current
    }

    pub fn has_own_binding(&self, name: &str) -> bool {
        self.bindings.lock().contains_key(name)
    }

    pub fn own_binding_kind(&self, name: &str) -> Option<BindingKind> {
        self.bindings.lock().get(name).map(|b| b.kind)
    }

    /// Walks outward and returns the first binding's value.
    pub fn lookup(&self, name: &str) -> Option<DynamicValue> {
        if let Some(b) = self.bindings.lock().get(name) {
            return Some(b.value.clone());
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if let Some(b) = scope.bindings.lock().get(name) {
                return Some(b.value.clone());
            }
            current = scope.parent.clone();
        }
        None
    }

    pub fn resolve(&self, name: &str) -> Result<DynamicValue, ScriptError> {
        self.lookup(name)
            .ok_or_else(|| ScriptError::reference(format!("Unknown identifier {}", name)))
    }

    /// Creates or redefines a binding in this scope. Hoisted slots and same-kind
    /// redeclarations are overwritten; any other clash is a type error.
    pub fn declare(&self, name: &str, value: DynamicValue, kind: BindingKind) -> Result<(), ScriptError> {
        let mut bindings = self.bindings.lock();
        if let Some(existing) = bindings.get(name) {
            let compatible = existing.kind == kind
                || existing.kind == BindingKind::Hoisted
                || kind == BindingKind::Hoisted
                || (existing.kind == BindingKind::Var && kind == BindingKind::Parameter)
                || (existing.kind == BindingKind::Parameter && kind == BindingKind::Var);
            if !compatible {
                return Err(ScriptError::type_error(format!(
                    "Identifier {} is already defined as {}",
                    name,
                    existing.kind.describe()
                )));
            }
            if kind == BindingKind::Hoisted {
                return Ok(());
            }
            if existing.kind == BindingKind::Const {
                return Err(ScriptError::type_error(format!(
                    "Can't modify const variable {}",
                    name
                )));
            }
        }
        let previous = bindings.insert(name.to_string(), Binding { value, kind });
        drop(bindings);
        drop(previous);
        Ok(())
    }

    /// Assigns to the nearest existing binding. Returns `Ok(false)` if no scope
    /// in the chain has one.
    pub fn assign(&self, name: &str, value: DynamicValue) -> Result<bool, ScriptError> {
        let mut value = Some(value);
        if let Some(assigned) = self.assign_own(name, &mut value)? {
            return Ok(assigned);
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if let Some(assigned) = scope.assign_own(name, &mut value)? {
                return Ok(assigned);
            }
            current = scope.parent.clone();
        }
        Ok(false)
    }

    fn assign_own(&self, name: &str, value: &mut Option<DynamicValue>) -> Result<Option<bool>, ScriptError> {
        let mut bindings = self.bindings.lock();
        match bindings.get_mut(name) {
            Some(binding) => {
                match binding.kind {
                    BindingKind::Const => {
                        return Err(ScriptError::type_error(format!(
                            "Can't modify const variable {}",
                            name
                        )))
                    }
                    BindingKind::ApiClass => {
                        return Err(ScriptError::type_error(format!(
                            "Can't assign to API class {}",
                            name
                        )))
                    }
                    BindingKind::Hoisted => binding.kind = BindingKind::Var,
                    _ => {}
                }
                let previous = match value.take() {
                    Some(v) => std::mem::replace(&mut binding.value, v),
                    None => return Ok(Some(true)),
                };
                drop(bindings);
                drop(previous);
                Ok(Some(true))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        let removed = self.bindings.lock().remove(name);
        removed.is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count_of_kind(&self, kind: BindingKind) -> usize {
        self.bindings.lock().values().filter(|b| b.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn for_each_value(&self, mut f: impl FnMut(&DynamicValue)) {
        for b in self.bindings.lock().values() {
            f(&b.value)
        }
    }

    /// Drops every binding. Values are released after the lock.
    pub fn clear(&self) {
        let taken = std::mem::take(&mut *self.bindings.lock());
        drop(taken);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let global = Scope::new_global();
        global.declare("a", DynamicValue::Int(1), BindingKind::Var).unwrap();
        let f = Scope::new_child(&global, ScopeKind::Function);
        let block = Scope::new_child(&f, ScopeKind::Block);
        block.declare("b", DynamicValue::Int(2), BindingKind::Local).unwrap();
        assert_eq!(block.lookup("a"), Some(DynamicValue::Int(1)));
        assert_eq!(block.lookup("b"), Some(DynamicValue::Int(2)));
        assert_eq!(f.lookup("b"), None);
        assert!(Arc::ptr_eq(&block.variable_scope(), &f));
        assert!(Arc::ptr_eq(&block.global_scope(), &global));
    }

    #[test]
    fn test_unknown_identifier_is_reference_error() {
        let global = Scope::new_global();
        match global.resolve("nope") {
            Err(ScriptError::Reference { message, .. }) => {
                assert_eq!(message, "Unknown identifier nope")
            }
            _ => panic!("Expected a reference error"),
        }
    }

    #[test]
    fn test_const_cannot_be_reassigned() {
        let global = Scope::new_global();
        global.declare("c", DynamicValue::Int(1), BindingKind::Const).unwrap();
        let err = global.assign("c", DynamicValue::Int(2)).unwrap_err();
        assert_eq!(err.to_string(), "Can't modify const variable c");
        assert_eq!(global.lookup("c"), Some(DynamicValue::Int(1)));
    }

    #[test]
    fn test_redeclaration_with_other_kind_fails() {
        let global = Scope::new_global();
        global.declare("r", DynamicValue::Int(1), BindingKind::Register).unwrap();
        let err = global.declare("r", DynamicValue::Int(2), BindingKind::Var).unwrap_err();
        assert_eq!(err.to_string(), "Identifier r is already defined as register variable");
        global.declare("v", DynamicValue::Int(1), BindingKind::Var).unwrap();
        global.declare("v", DynamicValue::Int(2), BindingKind::Var).unwrap();
        assert_eq!(global.lookup("v"), Some(DynamicValue::Int(2)));
    }

    #[test]
    fn test_hoisted_binding_reads_undefined_then_becomes_var() {
        let global = Scope::new_global();
        global.declare("h", DynamicValue::Undefined, BindingKind::Hoisted).unwrap();
        assert_eq!(global.lookup("h"), Some(DynamicValue::Undefined));
        assert!(global.assign("h", DynamicValue::Int(3)).unwrap());
        assert_eq!(global.own_binding_kind("h"), Some(BindingKind::Var));
        assert!(!global.assign("missing", DynamicValue::Int(3)).unwrap());
    }
}
