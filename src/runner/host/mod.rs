//! Host collaborators the scripting engine talks to: interface components,
//! processing modules with their complex data, MIDI events and the audio
//! settings reported by `prepareToPlay`.

pub mod complex_data;
pub mod content;
pub mod event;
pub mod modules;

use parking_lot::RwLock;

pub use complex_data::{ComplexData, ComplexDataType, ComplexEventType};
pub use content::{ComponentType, MouseEventKind, ScriptComponent, ScriptContent};
pub use event::HiseEvent;
pub use modules::{Module, ModuleHost};

/// Sample rate and block size of the host's audio stream.
pub struct AudioSettings {
    inner: RwLock<(f64, usize)>,
}

impl AudioSettings {
    pub fn new() -> Self {
        AudioSettings {
            inner: RwLock::new((44100.0, 512)),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.inner.read().0
    }

    pub fn block_size(&self) -> usize {
        self.inner.read().1
    }

    pub fn set(&self, sample_rate: f64, block_size: usize) {
        *self.inner.write() = (sample_rate, block_size);
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self::new()
    }
}
