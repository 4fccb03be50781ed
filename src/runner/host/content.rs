//! The interface components a script creates with `Content.addKnob` and friends.
//!
//! Components only model what scripts and broadcasters observe: an id, an
//! ordered property list and change notifications. Host-side listeners are
//! held weakly, so dropping an adapter detaches it.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::test_and_comparison::strict_equals;
use crate::runner::ds::value::{DynamicValue, PropertyMap};
use crate::runner::plugin::types::EvalContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Knob,
    Button,
}

impl ComponentType {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentType::Knob => "ScriptSlider",
            ComponentType::Button => "ScriptButton",
        }
    }
}

/// How much mouse activity a listener wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MouseCallbackLevel {
    NoCallbacks,
    ClicksOnly,
    ClicksAndHover,
    ClicksHoverAndDragging,
    AllCallbacks,
}

impl MouseCallbackLevel {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "No Callbacks" => MouseCallbackLevel::NoCallbacks,
            "Clicks Only" => MouseCallbackLevel::ClicksOnly,
            "Clicks & Hover" => MouseCallbackLevel::ClicksAndHover,
            "Clicks, Hover & Dragging" => MouseCallbackLevel::ClicksHoverAndDragging,
            "All Callbacks" => MouseCallbackLevel::AllCallbacks,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    MouseDown,
    MouseUp,
    DoubleClick,
    Enter,
    Exit,
    Move,
    Drag,
}

impl MouseEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            MouseEventKind::MouseDown => "mouseDown",
            MouseEventKind::MouseUp => "mouseUp",
            MouseEventKind::DoubleClick => "doubleClick",
            MouseEventKind::Enter => "enter",
            MouseEventKind::Exit => "exit",
            MouseEventKind::Move => "move",
            MouseEventKind::Drag => "drag",
        }
    }

    /// The lowest callback level that receives this kind of event.
    pub fn required_level(&self) -> MouseCallbackLevel {
        match self {
            MouseEventKind::MouseDown | MouseEventKind::MouseUp => MouseCallbackLevel::ClicksOnly,
            MouseEventKind::Enter | MouseEventKind::Exit => MouseCallbackLevel::ClicksAndHover,
            MouseEventKind::Drag => MouseCallbackLevel::ClicksHoverAndDragging,
            MouseEventKind::Move | MouseEventKind::DoubleClick => MouseCallbackLevel::AllCallbacks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub x: f64,
    pub y: f64,
}

/// Receives change notifications from a component. All methods default to no-ops.
pub trait ComponentListener: Send + Sync {
    fn property_changed(
        &self,
        _ctx: &mut EvalContext,
        _component: &Arc<ScriptComponent>,
        _property: &str,
        _value: &DynamicValue,
    ) -> Result<(), ScriptError> {
        Ok(())
    }

    fn value_changed(
        &self,
        _ctx: &mut EvalContext,
        _component: &Arc<ScriptComponent>,
        _value: &DynamicValue,
    ) -> Result<(), ScriptError> {
        Ok(())
    }

    fn mouse_event(
        &self,
        _ctx: &mut EvalContext,
        _component: &Arc<ScriptComponent>,
        _event: &MouseEvent,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

pub struct ScriptComponent {
    self_ref: Weak<ScriptComponent>,
    id: String,
    component_type: ComponentType,
    properties: Mutex<PropertyMap>,
    listeners: Mutex<Vec<Weak<dyn ComponentListener>>>,
}

fn default_properties(id: &str, component_type: ComponentType, x: i64, y: i64) -> PropertyMap {
    let mut p = PropertyMap::new();
    let (width, height) = match component_type {
        ComponentType::Knob => (128, 48),
        ComponentType::Button => (128, 28),
    };
    p.set("text", DynamicValue::from(id));
    p.set("visible", DynamicValue::Bool(true));
    p.set("enabled", DynamicValue::Bool(true));
    p.set("x", DynamicValue::Int(x));
    p.set("y", DynamicValue::Int(y));
    p.set("width", DynamicValue::Int(width));
    p.set("height", DynamicValue::Int(height));
    p.set("min", DynamicValue::Int(0));
    p.set("max", DynamicValue::Int(1));
    p.set("value", DynamicValue::Int(0));
    if component_type == ComponentType::Button {
        p.set("radioGroup", DynamicValue::Int(0));
    }
    p
}

impl ScriptComponent {
    pub fn new(id: &str, component_type: ComponentType, x: i64, y: i64) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| ScriptComponent {
            self_ref: self_ref.clone(),
            id: id.to_string(),
            component_type,
            properties: Mutex::new(default_properties(id, component_type, x, y)),
            listeners: Mutex::new(vec![]),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.lock().contains(name)
    }

    pub fn property_ids(&self) -> Vec<String> {
        self.properties.lock().keys()
    }

    pub fn property(&self, name: &str) -> Option<DynamicValue> {
        self.properties.lock().get(name).cloned()
    }

    pub fn value(&self) -> DynamicValue {
        self.property("value").unwrap_or_default()
    }

    pub fn is_visible(&self) -> bool {
        self.property("visible").map(|v| v.is_truthy()).unwrap_or(false)
    }

    pub fn radio_group(&self) -> i64 {
        self.property("radioGroup")
            .map(|v| v.to_number() as i64)
            .unwrap_or(0)
    }

    pub fn add_listener(&self, listener: Weak<dyn ComponentListener>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
    }

    pub fn num_listeners(&self) -> usize {
        self.listeners.lock().iter().filter(|l| l.strong_count() > 0).count()
    }

    fn live_listeners(&self) -> Vec<Arc<dyn ComponentListener>> {
        self.listeners.lock().iter().filter_map(|l| l.upgrade()).collect()
    }

    /// Sets a property without notifying anyone.
    pub fn set_property_silently(&self, name: &str, value: DynamicValue) -> Result<bool, ScriptError> {
        let mut properties = self.properties.lock();
        match properties.get(name) {
            None => Err(ScriptError::usage(format!("Illegal property id: {}", name))),
            Some(old) if strict_equals(old, &value) && old.type_of() == value.type_of() => Ok(false),
            Some(_) => {
                properties.set(name, value);
                Ok(true)
            }
        }
    }

    /// Sets a property and notifies property listeners if it changed.
    pub fn set_property(&self, ctx: &mut EvalContext, name: &str, value: DynamicValue) -> Result<(), ScriptError> {
        if !self.set_property_silently(name, value.clone())? {
            return Ok(());
        }
        let this = match self.self_ref.upgrade() {
            Some(this) => this,
            None => return Ok(()),
        };
        for listener in self.live_listeners() {
            listener.property_changed(ctx, &this, name, &value)?;
        }
        Ok(())
    }

    /// Sets the value and notifies value listeners unconditionally.
    pub fn set_value(&self, ctx: &mut EvalContext, value: DynamicValue) -> Result<(), ScriptError> {
        self.set_property(ctx, "value", value.clone())?;
        let this = match self.self_ref.upgrade() {
            Some(this) => this,
            None => return Ok(()),
        };
        for listener in self.live_listeners() {
            listener.value_changed(ctx, &this, &value)?;
        }
        Ok(())
    }

    pub fn send_mouse_event(&self, ctx: &mut EvalContext, kind: MouseEventKind, x: f64, y: f64) -> Result<(), ScriptError> {
        let this = match self.self_ref.upgrade() {
            Some(this) => this,
            None => return Ok(()),
        };
        let event = MouseEvent { kind, x, y };
        for listener in self.live_listeners() {
            listener.mouse_event(ctx, &this, &event)?;
        }
        Ok(())
    }
}

/// All components of one compiled script. Rebuilt on every compile.
#[derive(Default)]
pub struct ScriptContent {
    components: RwLock<Vec<Arc<ScriptComponent>>>,
}

impl ScriptContent {
    pub fn new() -> Self {
        ScriptContent {
            components: RwLock::new(vec![]),
        }
    }

    /// Adds a component, or returns the existing one with the same id and type.
    pub fn add_component(
        &self,
        id: &str,
        component_type: ComponentType,
        x: i64,
        y: i64,
    ) -> Result<Arc<ScriptComponent>, ScriptError> {
        let mut components = self.components.write();
        if let Some(existing) = components.iter().find(|c| c.id() == id) {
            if existing.component_type() != component_type {
                return Err(ScriptError::usage(format!(
                    "Component {} already exists as {}",
                    id,
                    existing.component_type().name()
                )));
            }
            return Ok(existing.clone());
        }
        let component = ScriptComponent::new(id, component_type, x, y);
        components.push(component.clone());
        Ok(component)
    }

    pub fn add_knob(&self, id: &str, x: i64, y: i64) -> Result<Arc<ScriptComponent>, ScriptError> {
        self.add_component(id, ComponentType::Knob, x, y)
    }

    pub fn add_button(&self, id: &str, x: i64, y: i64) -> Result<Arc<ScriptComponent>, ScriptError> {
        self.add_component(id, ComponentType::Button, x, y)
    }

    pub fn get_component(&self, id: &str) -> Option<Arc<ScriptComponent>> {
        self.components.read().iter().find(|c| c.id() == id).cloned()
    }

    pub fn components(&self) -> Vec<Arc<ScriptComponent>> {
        self.components.read().clone()
    }

    /// Buttons of a radio group in creation order.
    pub fn radio_group_members(&self, group: i64) -> Vec<Arc<ScriptComponent>> {
        self.components
            .read()
            .iter()
            .filter(|c| c.component_type() == ComponentType::Button && c.radio_group() == group)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_are_unique_by_id() {
        let content = ScriptContent::new();
        let a = content.add_knob("Knob1", 0, 0).unwrap();
        let b = content.add_knob("Knob1", 10, 10).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(content.add_button("Knob1", 0, 0).is_err());
        assert_eq!(content.len(), 1);
    }

    #[test]
    fn test_property_list_is_ordered_and_validated() {
        let knob = ScriptComponent::new("Knob1", ComponentType::Knob, 5, 6);
        assert_eq!(knob.property_ids()[0], "text");
        assert!(!knob.has_property("radioGroup"));
        assert_eq!(knob.property("x"), Some(DynamicValue::Int(5)));
        let err = knob.set_property_silently("colour", DynamicValue::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "Illegal property id: colour");
        assert!(!knob.set_property_silently("x", DynamicValue::Int(5)).unwrap());
        assert!(knob.set_property_silently("x", DynamicValue::Int(7)).unwrap());
    }

    #[test]
    fn test_radio_group_members() {
        let content = ScriptContent::new();
        let b1 = content.add_button("B1", 0, 0).unwrap();
        let b2 = content.add_button("B2", 0, 0).unwrap();
        content.add_button("B3", 0, 0).unwrap();
        b1.set_property_silently("radioGroup", DynamicValue::Int(1)).unwrap();
        b2.set_property_silently("radioGroup", DynamicValue::Int(1)).unwrap();
        let ids: Vec<_> = content
            .radio_group_members(1)
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(ids, vec!["B1", "B2"]);
    }

    #[test]
    fn test_mouse_levels() {
        assert_eq!(
            MouseCallbackLevel::from_name("Clicks & Hover"),
            Some(MouseCallbackLevel::ClicksAndHover)
        );
        assert!(MouseEventKind::Drag.required_level() > MouseCallbackLevel::ClicksAndHover);
        assert!(MouseEventKind::MouseDown.required_level() <= MouseCallbackLevel::ClicksOnly);
        assert_eq!(MouseCallbackLevel::from_name("Sometimes"), None);
    }
}
