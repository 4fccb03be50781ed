//! The diagnostic sink scripts print to and callback failures are reported to.
//! Everything written here is forwarded to the `log` facade as well.

use log::{error, info, warn};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Print,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub message: String,
}

#[derive(Default)]
pub struct ScriptConsole {
    entries: Mutex<Vec<ConsoleEntry>>,
}

impl ScriptConsole {
    pub fn new() -> Self {
        ScriptConsole {
            entries: Mutex::new(vec![]),
        }
    }

    fn push(&self, level: ConsoleLevel, message: String) {
        self.entries.lock().push(ConsoleEntry { level, message });
    }

    pub fn print(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push(ConsoleLevel::Print, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(ConsoleLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.push(ConsoleLevel::Error, message);
    }

    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.entries.lock().clone()
    }

    /// Message texts of every entry, in order.
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == ConsoleLevel::Error)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Removes and returns everything written so far.
    pub fn take(&self) -> Vec<ConsoleEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(text))
    }
}
