//! The callbacks a host invokes on a compiled script.

use std::time::Duration;

use crate::runner::ds::error::ScriptResult;
use crate::runner::ds::value::DynamicValue;
use crate::runner::host::HiseEvent;

use super::thread::ThreadKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    OnInit,
    OnNoteOn,
    OnNoteOff,
    OnController,
    OnTimer,
    OnControl,
    PrepareToPlay,
    ProcessBlock,
    RenderVoice,
    StartVoice,
    StopVoice,
}

impl Callback {
    pub const ALL: [Callback; 11] = [
        Callback::OnInit,
        Callback::OnNoteOn,
        Callback::OnNoteOff,
        Callback::OnController,
        Callback::OnTimer,
        Callback::OnControl,
        Callback::PrepareToPlay,
        Callback::ProcessBlock,
        Callback::RenderVoice,
        Callback::StartVoice,
        Callback::StopVoice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Callback::OnInit => "onInit",
            Callback::OnNoteOn => "onNoteOn",
            Callback::OnNoteOff => "onNoteOff",
            Callback::OnController => "onController",
            Callback::OnTimer => "onTimer",
            Callback::OnControl => "onControl",
            Callback::PrepareToPlay => "prepareToPlay",
            Callback::ProcessBlock => "processBlock",
            Callback::RenderVoice => "renderVoice",
            Callback::StartVoice => "startVoice",
            Callback::StopVoice => "stopVoice",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Parameter count the host calls this callback with.
    pub fn parameter_count(&self) -> usize {
        match self {
            Callback::OnInit
            | Callback::OnNoteOn
            | Callback::OnNoteOff
            | Callback::OnController
            | Callback::OnTimer => 0,
            Callback::ProcessBlock | Callback::StartVoice | Callback::StopVoice => 1,
            Callback::OnControl | Callback::PrepareToPlay | Callback::RenderVoice => 2,
        }
    }

    /// The thread the host normally invokes this callback from.
    pub fn default_thread(&self) -> ThreadKind {
        match self {
            Callback::OnInit | Callback::OnControl | Callback::PrepareToPlay => ThreadKind::Message,
            _ => ThreadKind::Audio,
        }
    }
}

/// What a host gets back from one callback invocation.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub result: ScriptResult,
    /// The callback's return value; `Undefined` if it failed or isn't defined.
    pub value: DynamicValue,
    /// The MIDI event after the callback ran, for event callbacks.
    pub event: Option<HiseEvent>,
    pub elapsed: Duration,
}

impl CallbackOutcome {
    pub(crate) fn ok(value: DynamicValue, elapsed: Duration) -> Self {
        CallbackOutcome {
            result: ScriptResult::Ok,
            value,
            event: None,
            elapsed,
        }
    }

    pub(crate) fn fail(message: impl Into<String>, elapsed: Duration) -> Self {
        CallbackOutcome {
            result: ScriptResult::fail(message),
            value: DynamicValue::Undefined,
            event: None,
            elapsed,
        }
    }

    pub fn was_ok(&self) -> bool {
        self.result.was_ok()
    }

    pub fn failed(&self) -> bool {
        self.result.failed()
    }

    pub fn error_message(&self) -> &str {
        self.result.error_message()
    }

    /// Whether the script called `Message.ignoreEvent(true)`.
    pub fn event_ignored(&self) -> bool {
        self.event.as_ref().map(|e| e.is_ignored()).unwrap_or(false)
    }
}
