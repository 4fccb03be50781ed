//! Allocation tracking for script-visible heap values.
//!
//! The heap keeps a weak handle to every object, array, closure, scope and
//! script-created native object so the cycle checker can walk the whole graph.
//! It never owns anything itself; reference counting still decides lifetime.

use std::sync::{Arc, Weak};

use crate::runner::ds::error::ScriptError;
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::{ArrayObject, DynamicObject, FunctionObject, NativeObjectRef};
use crate::runner::plugin::types::NativeObject;

/// Below this many entries the heap never bothers compacting.
const MIN_COMPACT_THRESHOLD: usize = 256;

/// Configuration for the heap tracker.
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Maximum live tracked allocations. `None` means unlimited.
    pub max_tracked_allocations: Option<usize>,
}

impl HeapConfig {
    pub fn unlimited() -> Self {
        HeapConfig {
            max_tracked_allocations: None,
        }
    }

    pub fn with_limit(max: usize) -> Self {
        HeapConfig {
            max_tracked_allocations: Some(max),
        }
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::unlimited()
    }
}

pub(crate) enum HeapEntry {
    Object(Weak<DynamicObject>),
    Array(Weak<ArrayObject>),
    Function(Weak<FunctionObject>),
    Scope(Weak<Scope>),
    Native(Weak<dyn NativeObject>),
}

impl HeapEntry {
    fn is_alive(&self) -> bool {
        match self {
            HeapEntry::Object(w) => w.strong_count() > 0,
            HeapEntry::Array(w) => w.strong_count() > 0,
            HeapEntry::Function(w) => w.strong_count() > 0,
            HeapEntry::Scope(w) => w.strong_count() > 0,
            HeapEntry::Native(w) => w.strong_count() > 0,
        }
    }
}

/// Live allocation counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub objects: usize,
    pub arrays: usize,
    pub functions: usize,
    pub scopes: usize,
    pub natives: usize,
}

impl HeapStats {
    pub fn total(&self) -> usize {
        self.objects + self.arrays + self.functions + self.scopes + self.natives
    }
}

pub struct Heap {
    config: HeapConfig,
    entries: Vec<HeapEntry>,
    compact_at: usize,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Self {
        Heap {
            config,
            entries: vec![],
            compact_at: MIN_COMPACT_THRESHOLD,
        }
    }

    pub fn track_object(&mut self, object: &Arc<DynamicObject>) -> Result<(), ScriptError> {
        self.track(HeapEntry::Object(Arc::downgrade(object)))
    }

    pub fn track_array(&mut self, array: &Arc<ArrayObject>) -> Result<(), ScriptError> {
        self.track(HeapEntry::Array(Arc::downgrade(array)))
    }

    pub fn track_function(&mut self, function: &Arc<FunctionObject>) -> Result<(), ScriptError> {
        self.track(HeapEntry::Function(Arc::downgrade(function)))
    }

    pub fn track_scope(&mut self, scope: &Arc<Scope>) -> Result<(), ScriptError> {
        self.track(HeapEntry::Scope(Arc::downgrade(scope)))
    }

    pub fn track_native(&mut self, native: &NativeObjectRef) -> Result<(), ScriptError> {
        self.track(HeapEntry::Native(Arc::downgrade(native)))
    }

    fn track(&mut self, entry: HeapEntry) -> Result<(), ScriptError> {
        if self.entries.len() >= self.compact_at {
            self.compact();
        }
        if let Some(max) = self.config.max_tracked_allocations {
            if self.entries.len() >= max {
                self.compact();
                if self.entries.len() >= max {
                    return Err(ScriptError::range("Out of memory"));
                }
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Drops entries whose allocation has been freed.
    pub fn compact(&mut self) {
        self.entries.retain(|e| e.is_alive());
        self.compact_at = (self.entries.len() * 2).max(MIN_COMPACT_THRESHOLD);
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats::default();
        for entry in self.entries.iter().filter(|e| e.is_alive()) {
            match entry {
                HeapEntry::Object(_) => stats.objects += 1,
                HeapEntry::Array(_) => stats.arrays += 1,
                HeapEntry::Function(_) => stats.functions += 1,
                HeapEntry::Scope(_) => stats.scopes += 1,
                HeapEntry::Native(_) => stats.natives += 1,
            }
        }
        stats
    }

    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_alive()).count()
    }

    /// Tracked entries including dead ones not compacted yet.
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_max_tracked(&self) -> Option<usize> {
        self.config.max_tracked_allocations
    }

    pub(crate) fn entries(&self) -> &[HeapEntry] {
        &self.entries
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::value::DynamicValue;

    #[test]
    fn test_heap_unlimited() {
        let mut heap = Heap::new(HeapConfig::unlimited());
        let objects: Vec<_> = (0..1000).map(|_| Arc::new(DynamicObject::new())).collect();
        for o in &objects {
            assert!(heap.track_object(o).is_ok());
        }
        assert_eq!(heap.stats().objects, 1000);
    }

    #[test]
    fn test_heap_limited() {
        let mut heap = Heap::new(HeapConfig::with_limit(2));
        let a = Arc::new(ArrayObject::new(vec![]));
        let b = Arc::new(ArrayObject::new(vec![]));
        let c = Arc::new(ArrayObject::new(vec![]));
        assert!(heap.track_array(&a).is_ok());
        assert!(heap.track_array(&b).is_ok());

        let result = heap.track_array(&c);
        match result {
            Err(ScriptError::Range { message, .. }) => assert_eq!(message, "Out of memory"),
            _ => panic!("Expected a range error"),
        }
    }

    #[test]
    fn test_freed_allocations_make_room() {
        let mut heap = Heap::new(HeapConfig::with_limit(1));
        {
            let a = Arc::new(DynamicObject::new());
            heap.track_object(&a).unwrap();
        }
        let b = Arc::new(DynamicObject::new());
        assert!(heap.track_object(&b).is_ok());
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn test_compact_removes_dead_entries() {
        let mut heap = Heap::default();
        let keep = Arc::new(DynamicObject::new());
        heap.track_object(&keep).unwrap();
        for _ in 0..10 {
            let temp = Arc::new(ArrayObject::new(vec![DynamicValue::Int(1)]));
            heap.track_array(&temp).unwrap();
        }
        assert_eq!(heap.tracked_count(), 11);
        heap.compact();
        assert_eq!(heap.tracked_count(), 1);
        assert_eq!(heap.stats(), HeapStats { objects: 1, ..HeapStats::default() });
    }
}
