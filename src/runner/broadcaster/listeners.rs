//! Sources a broadcaster can be attached to.
//!
//! A source listener turns host events (component changes, mouse events,
//! module parameters, complex data, radio groups, other broadcasters) into
//! broadcaster messages. Hosts only hold it weakly; the broadcaster owns it,
//! so detaching is a matter of dropping it.

use std::sync::{Arc, Weak};

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::value::{DynamicValue, PropertyMap};
use crate::runner::host::complex_data::{ComplexDataListener, ComplexDataRef};
use crate::runner::host::content::{ComponentListener, MouseCallbackLevel, MouseEvent};
use crate::runner::host::modules::ModuleListener;
use crate::runner::host::{ComplexData, ComplexEventType, Module, ScriptComponent};
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::content::component_value;

use super::metadata::Metadata;
use super::targets::{Target, TargetKind};
use super::ScriptBroadcaster;

pub(crate) enum SourceKind {
    ComponentProperties {
        components: Vec<Arc<ScriptComponent>>,
        properties: Vec<String>,
    },
    ComponentValue {
        components: Vec<Arc<ScriptComponent>>,
    },
    ComponentVisibility {
        components: Vec<Arc<ScriptComponent>>,
    },
    MouseEvents {
        components: Vec<Arc<ScriptComponent>>,
        level: MouseCallbackLevel,
    },
    ModuleParameter {
        modules: Vec<Arc<Module>>,
        parameters: Vec<String>,
    },
    ComplexData {
        type_name: String,
        event: ComplexEventType,
        slots: Vec<ComplexDataRef>,
    },
    RadioGroup {
        buttons: Vec<Arc<ScriptComponent>>,
    },
    OtherBroadcasters {
        sources: Vec<Arc<ScriptBroadcaster>>,
    },
}

pub struct SourceListener {
    broadcaster: Weak<ScriptBroadcaster>,
    metadata: Metadata,
    pub(crate) kind: SourceKind,
}

impl SourceListener {
    pub(crate) fn new(broadcaster: Weak<ScriptBroadcaster>, metadata: Metadata, kind: SourceKind) -> Arc<Self> {
        Arc::new(SourceListener {
            broadcaster,
            metadata,
            kind,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn listener_type(&self) -> String {
        match &self.kind {
            SourceKind::ComponentProperties { .. } => "ComponentProperties".to_string(),
            SourceKind::ComponentValue { .. } => "ComponentValue".to_string(),
            SourceKind::ComponentVisibility { .. } => "ComponentVisibility".to_string(),
            SourceKind::MouseEvents { .. } => "MouseEvents".to_string(),
            SourceKind::ModuleParameter { .. } => "ModuleParameter".to_string(),
            SourceKind::ComplexData { type_name, .. } => type_name.clone(),
            SourceKind::RadioGroup { .. } => "RadioGroup".to_string(),
            SourceKind::OtherBroadcasters { .. } => "BroadcasterSource".to_string(),
        }
    }

    /// Registers with the host objects this source listens to.
    pub(crate) fn connect(self: &Arc<Self>, generation: u64) {
        match &self.kind {
            SourceKind::ComponentProperties { components, .. }
            | SourceKind::ComponentValue { components }
            | SourceKind::ComponentVisibility { components }
            | SourceKind::MouseEvents { components, .. }
            | SourceKind::RadioGroup { buttons: components } => {
                for component in components {
                    let weak: Weak<dyn ComponentListener> = Arc::downgrade(self) as Weak<dyn ComponentListener>;
                    component.add_listener(weak);
                }
            }
            SourceKind::ModuleParameter { modules, .. } => {
                for module in modules {
                    let weak: Weak<dyn ModuleListener> = Arc::downgrade(self) as Weak<dyn ModuleListener>;
                    module.add_listener(generation, weak);
                }
            }
            SourceKind::ComplexData { slots, .. } => {
                for slot in slots {
                    let weak: Weak<dyn ComplexDataListener> =
                        Arc::downgrade(self) as Weak<dyn ComplexDataListener>;
                    slot.add_listener(generation, weak);
                }
            }
            SourceKind::OtherBroadcasters { .. } => {}
        }
    }

    /// Calls `target` with every message the current source state would produce.
    pub(crate) fn replay(
        &self,
        ctx: &mut EvalContext,
        broadcaster: &ScriptBroadcaster,
        target: &Target,
    ) -> Result<(), ScriptError> {
        match &self.kind {
            SourceKind::ComponentProperties {
                components,
                properties,
            } => {
                for component in components {
                    for property in properties {
                        let value = component.property(property).unwrap_or_default();
                        let args = vec![
                            component_value(component.clone()),
                            DynamicValue::from(property.as_str()),
                            value,
                        ];
                        target.call(ctx, broadcaster, &args)?;
                    }
                }
            }
            SourceKind::ComponentValue { components } => {
                for component in components {
                    let args = vec![component_value(component.clone()), component.value()];
                    target.call(ctx, broadcaster, &args)?;
                }
            }
            SourceKind::ComponentVisibility { components } => {
                for component in components {
                    let args = vec![
                        DynamicValue::from(component.id()),
                        DynamicValue::Bool(component.is_visible()),
                    ];
                    target.call(ctx, broadcaster, &args)?;
                }
            }
            SourceKind::MouseEvents { .. } => {}
            SourceKind::ModuleParameter { modules, parameters } => {
                for module in modules {
                    for parameter in parameters {
                        let value = module.attribute(parameter).unwrap_or(0.0);
                        let args = vec![
                            DynamicValue::from(module.id()),
                            DynamicValue::from(parameter.as_str()),
                            DynamicValue::Double(value),
                        ];
                        target.call(ctx, broadcaster, &args)?;
                    }
                }
            }
            SourceKind::ComplexData { event, slots, .. } => {
                for slot in slots {
                    let args = vec![
                        DynamicValue::from(slot.owner_id()),
                        DynamicValue::from(slot.index()),
                        slot.current_value(*event),
                    ];
                    target.call(ctx, broadcaster, &args)?;
                }
            }
            SourceKind::RadioGroup { buttons, .. } => {
                if let Some(index) = buttons.iter().position(|b| b.value().is_truthy()) {
                    target.call(ctx, broadcaster, &[DynamicValue::from(index)])?;
                }
            }
            SourceKind::OtherBroadcasters { sources } => {
                for source in sources {
                    let values = source.last_values();
                    if values.iter().all(|v| !v.is_undefined_or_void()) {
                        target.call(ctx, broadcaster, &values)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs after every successful fan-out of the owning broadcaster.
    pub(crate) fn after_fan_out(&self, ctx: &mut EvalContext, args: &[DynamicValue]) -> Result<(), ScriptError> {
        if let SourceKind::RadioGroup { buttons, .. } = &self.kind {
            let selected = args.get(0).map(|v| v.to_number()).unwrap_or(-1.0);
            for (index, button) in buttons.iter().enumerate() {
                let on = selected >= 0.0 && index == selected as usize;
                button.set_value(ctx, DynamicValue::Int(on as i64))?;
            }
        }
        Ok(())
    }

    /// Undoes registrations the host can't drop on its own.
    pub(crate) fn disconnect(&self, destination: &ScriptBroadcaster) {
        if let SourceKind::OtherBroadcasters { sources } = &self.kind {
            for source in sources {
                source.remove_targets_where(|t| match &t.kind {
                    TargetKind::Forward { destination: d, .. } => {
                        d.upgrade().map(|d| std::ptr::eq(&*d, destination)).unwrap_or(true)
                    }
                    _ => false,
                });
            }
        }
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(&DynamicValue)) {
        if let SourceKind::OtherBroadcasters { sources } = &self.kind {
            for source in sources {
                visitor(&source.to_value());
            }
        }
    }

    fn send(&self, ctx: &mut EvalContext, args: Vec<DynamicValue>) -> Result<(), ScriptError> {
        match self.broadcaster.upgrade() {
            Some(broadcaster) => broadcaster.send_message(ctx, args, false),
            None => Ok(()),
        }
    }
}

impl ComponentListener for SourceListener {
    fn property_changed(
        &self,
        ctx: &mut EvalContext,
        component: &Arc<ScriptComponent>,
        property: &str,
        value: &DynamicValue,
    ) -> Result<(), ScriptError> {
        match &self.kind {
            SourceKind::ComponentProperties { properties, .. } if properties.iter().any(|p| p == property) => {
                let args = vec![
                    component_value(component.clone()),
                    DynamicValue::from(property),
                    value.clone(),
                ];
                self.send(ctx, args)
            }
            SourceKind::ComponentVisibility { .. } if property == "visible" => {
                let args = vec![
                    DynamicValue::from(component.id()),
                    DynamicValue::Bool(value.is_truthy()),
                ];
                self.send(ctx, args)
            }
            _ => Ok(()),
        }
    }

    fn value_changed(
        &self,
        ctx: &mut EvalContext,
        component: &Arc<ScriptComponent>,
        value: &DynamicValue,
    ) -> Result<(), ScriptError> {
        match &self.kind {
            SourceKind::ComponentValue { .. } => {
                let args = vec![component_value(component.clone()), value.clone()];
                self.send(ctx, args)
            }
            SourceKind::RadioGroup { buttons, .. } if value.is_truthy() => {
                match buttons.iter().position(|b| Arc::ptr_eq(b, component)) {
                    Some(index) => self.send(ctx, vec![DynamicValue::from(index)]),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn mouse_event(
        &self,
        ctx: &mut EvalContext,
        component: &Arc<ScriptComponent>,
        event: &MouseEvent,
    ) -> Result<(), ScriptError> {
        if let SourceKind::MouseEvents { level, .. } = &self.kind {
            if *level == MouseCallbackLevel::NoCallbacks || event.kind.required_level() > *level {
                return Ok(());
            }
            let mut properties = PropertyMap::new();
            properties.set("type", DynamicValue::from(event.kind.name()));
            properties.set("x", DynamicValue::Double(event.x));
            properties.set("y", DynamicValue::Double(event.y));
            let event_object = ctx.new_object(properties)?;
            return self.send(ctx, vec![component_value(component.clone()), event_object]);
        }
        Ok(())
    }
}

impl ModuleListener for SourceListener {
    fn parameter_changed(
        &self,
        ctx: &mut EvalContext,
        module: &Module,
        parameter: &str,
        value: f64,
    ) -> Result<(), ScriptError> {
        if let SourceKind::ModuleParameter { parameters, .. } = &self.kind {
            if parameters.iter().any(|p| p == parameter) {
                let args = vec![
                    DynamicValue::from(module.id()),
                    DynamicValue::from(parameter),
                    DynamicValue::Double(value),
                ];
                return self.send(ctx, args);
            }
        }
        Ok(())
    }
}

impl ComplexDataListener for SourceListener {
    fn complex_data_changed(
        &self,
        ctx: &mut EvalContext,
        data: &ComplexData,
        event: ComplexEventType,
        value: &DynamicValue,
    ) -> Result<(), ScriptError> {
        if let SourceKind::ComplexData { event: wanted, .. } = &self.kind {
            if *wanted == event {
                let args = vec![
                    DynamicValue::from(data.owner_id()),
                    DynamicValue::from(data.index()),
                    value.clone(),
                ];
                return self.send(ctx, args);
            }
        }
        Ok(())
    }
}
