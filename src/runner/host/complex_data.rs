use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::type_conversion::format_number;
use crate::runner::ds::value::DynamicValue;
use crate::runner::plugin::types::EvalContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexDataType {
    Table,
    SliderPack,
    AudioFile,
}

impl ComplexDataType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Table" => ComplexDataType::Table,
            "SliderPack" => ComplexDataType::SliderPack,
            "AudioFile" => ComplexDataType::AudioFile,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComplexDataType::Table => "Table",
            ComplexDataType::SliderPack => "SliderPack",
            ComplexDataType::AudioFile => "AudioFile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexEventType {
    /// The data itself changed.
    Content,
    /// The playback or ruler position moved.
    Display,
}

impl ComplexEventType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Content" => Some(ComplexEventType::Content),
            "Display" => Some(ComplexEventType::Display),
            _ => None,
        }
    }
}

pub trait ComplexDataListener: Send + Sync {
    fn complex_data_changed(
        &self,
        ctx: &mut EvalContext,
        data: &ComplexData,
        event: ComplexEventType,
        value: &DynamicValue,
    ) -> Result<(), ScriptError>;
}

/// One table, slider pack or audio file slot of a module.
pub struct ComplexData {
    owner_id: String,
    data_type: ComplexDataType,
    index: usize,
    content: RwLock<Vec<f32>>,
    display_position: Mutex<f64>,
    listeners: Mutex<Vec<(u64, Weak<dyn ComplexDataListener>)>>,
}

impl ComplexData {
    pub fn new(owner_id: &str, data_type: ComplexDataType, index: usize) -> Self {
        ComplexData {
            owner_id: owner_id.to_string(),
            data_type,
            index,
            content: RwLock::new(vec![]),
            display_position: Mutex::new(0.0),
            listeners: Mutex::new(vec![]),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn data_type(&self) -> ComplexDataType {
        self.data_type
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn content(&self) -> Vec<f32> {
        self.content.read().clone()
    }

    /// The `;`-joined form sent with content events.
    pub fn content_string(&self) -> String {
        self.content
            .read()
            .iter()
            .map(|v| format_number(*v as f64))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn display_position(&self) -> f64 {
        *self.display_position.lock()
    }

    /// The value a listener would currently see for `event`.
    pub fn current_value(&self, event: ComplexEventType) -> DynamicValue {
        match event {
            ComplexEventType::Content => DynamicValue::String(self.content_string()),
            ComplexEventType::Display => DynamicValue::Double(self.display_position()),
        }
    }

    /// Registers a listener owned by the script compiled as `generation`.
    pub fn add_listener(&self, generation: u64, listener: Weak<dyn ComplexDataListener>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|(_, l)| l.strong_count() > 0);
        listeners.push((generation, listener));
    }

    pub fn remove_listeners(&self, generation: u64) {
        self.listeners.lock().retain(|(g, _)| *g != generation);
    }

    pub fn num_listeners(&self) -> usize {
        self.listeners.lock().iter().filter(|(_, l)| l.strong_count() > 0).count()
    }

    fn notify(&self, ctx: Option<&mut EvalContext>, event: ComplexEventType) -> Result<(), ScriptError> {
        let ctx = match ctx {
            Some(ctx) => ctx,
            None => return Ok(()),
        };
        let listeners: Vec<_> = self.listeners.lock().iter().filter_map(|(_, l)| l.upgrade()).collect();
        if listeners.is_empty() {
            return Ok(());
        }
        let value = self.current_value(event);
        for listener in listeners {
            listener.complex_data_changed(ctx, self, event, &value)?;
        }
        Ok(())
    }

    pub fn set_content(&self, ctx: Option<&mut EvalContext>, values: Vec<f32>) -> Result<(), ScriptError> {
        *self.content.write() = values;
        self.notify(ctx, ComplexEventType::Content)
    }

    pub fn set_display_position(&self, ctx: Option<&mut EvalContext>, position: f64) -> Result<(), ScriptError> {
        *self.display_position.lock() = position;
        self.notify(ctx, ComplexEventType::Display)
    }
}

/// Shared handle used by modules.
pub type ComplexDataRef = Arc<ComplexData>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_string_is_semicolon_joined() {
        let data = ComplexData::new("Sampler1", ComplexDataType::SliderPack, 0);
        data.set_content(None, vec![1.0, 0.5, 0.0]).unwrap();
        assert_eq!(data.content_string(), "1;0.5;0");
        assert_eq!(
            data.current_value(ComplexEventType::Content),
            DynamicValue::String("1;0.5;0".to_string())
        );
    }

    #[test]
    fn test_names() {
        assert_eq!(ComplexDataType::from_name("Table"), Some(ComplexDataType::Table));
        assert_eq!(ComplexDataType::from_name("Tables"), None);
        assert_eq!(ComplexEventType::from_name("Display"), Some(ComplexEventType::Display));
    }
}
