//! Host-registered processing modules the script can reach through `Synth.getModule`.
//!
//! Modules belong to the host, not to a compiled script, so they survive
//! recompiles. Listeners are tagged with the generation of the script that
//! registered them and removed when that script is torn down.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::runner::ds::error::ScriptError;
use crate::runner::host::complex_data::{ComplexData, ComplexDataRef, ComplexDataType};
use crate::runner::plugin::types::EvalContext;

pub trait ModuleListener: Send + Sync {
    fn parameter_changed(
        &self,
        ctx: &mut EvalContext,
        module: &Module,
        parameter: &str,
        value: f64,
    ) -> Result<(), ScriptError>;
}

pub struct Module {
    id: String,
    parameters: Mutex<Vec<(String, f64)>>,
    complex_data: Vec<ComplexDataRef>,
    listeners: Mutex<Vec<(u64, Weak<dyn ModuleListener>)>>,
}

impl Module {
    pub fn new(id: &str) -> Self {
        Module {
            id: id.to_string(),
            parameters: Mutex::new(vec![]),
            complex_data: vec![],
            listeners: Mutex::new(vec![]),
        }
    }

    pub fn with_parameter(self, name: &str, value: f64) -> Self {
        self.parameters.lock().push((name.to_string(), value));
        self
    }

    /// Adds `count` slots of the given type, indexed from 0 per type.
    pub fn with_complex_data(mut self, data_type: ComplexDataType, count: usize) -> Self {
        let start = self.complex_data.iter().filter(|d| d.data_type() == data_type).count();
        for i in 0..count {
            self.complex_data
                .push(Arc::new(ComplexData::new(&self.id, data_type, start + i)));
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.lock().len()
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.lock().iter().position(|(n, _)| n == name)
    }

    pub fn parameter_name(&self, index: usize) -> Option<String> {
        self.parameters.lock().get(index).map(|(n, _)| n.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.parameters
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Updates a parameter and notifies listeners if the value changed.
    /// Without a context the change is applied silently.
    pub fn set_attribute(&self, ctx: Option<&mut EvalContext>, name: &str, value: f64) -> Result<(), ScriptError> {
        {
            let mut parameters = self.parameters.lock();
            let entry = parameters
                .iter_mut()
                .find(|(n, _)| n == name)
                .ok_or_else(|| ScriptError::usage(format!("unknown parameter ID: {}", name)))?;
            if entry.1 == value {
                return Ok(());
            }
            entry.1 = value;
        }
        let ctx = match ctx {
            Some(ctx) => ctx,
            None => return Ok(()),
        };
        let listeners: Vec<_> = self.listeners.lock().iter().filter_map(|(_, l)| l.upgrade()).collect();
        for listener in listeners {
            listener.parameter_changed(ctx, self, name, value)?;
        }
        Ok(())
    }

    pub fn complex_data(&self, data_type: ComplexDataType, index: usize) -> Option<ComplexDataRef> {
        self.complex_data
            .iter()
            .find(|d| d.data_type() == data_type && d.index() == index)
            .cloned()
    }

    pub fn add_listener(&self, generation: u64, listener: Weak<dyn ModuleListener>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|(_, l)| l.strong_count() > 0);
        listeners.push((generation, listener));
    }

    pub fn num_listeners(&self) -> usize {
        self.listeners.lock().iter().filter(|(_, l)| l.strong_count() > 0).count()
    }

    fn remove_listeners(&self, generation: u64) {
        self.listeners.lock().retain(|(g, _)| *g != generation);
        for data in &self.complex_data {
            data.remove_listeners(generation);
        }
    }
}

#[derive(Default)]
pub struct ModuleHost {
    modules: RwLock<Vec<Arc<Module>>>,
}

impl ModuleHost {
    pub fn new() -> Self {
        ModuleHost {
            modules: RwLock::new(vec![]),
        }
    }

    /// Registers a module, replacing one with the same id.
    pub fn add_module(&self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        let mut modules = self.modules.write();
        modules.retain(|m| m.id() != module.id());
        modules.push(module.clone());
        module
    }

    pub fn get(&self, id: &str) -> Option<Arc<Module>> {
        self.modules.read().iter().find(|m| m.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.modules.read().iter().map(|m| m.id().to_string()).collect()
    }

    /// Detaches every listener a torn-down script registered.
    pub fn remove_listeners(&self, generation: u64) {
        for module in self.modules.read().iter() {
            module.remove_listeners(generation);
        }
    }
}
