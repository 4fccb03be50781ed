//! The environment of one compiled script.
//!
//! A realm owns the global scope, the heap tracker, the interface content and
//! the callback table of a single compilation. Recompiling builds a brand-new
//! realm and swaps it in; the old one is torn down afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::runner::ds::cycle_checker::{check_cycles, CycleReport};
use crate::runner::ds::error::ScriptError;
use crate::runner::ds::heap::{Heap, HeapConfig};
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::{DynamicValue, FunctionRef};
use crate::runner::host::{AudioSettings, HiseEvent, ModuleHost, ScriptContent};
use crate::runner::plugin::config::EngineConfig;
use crate::runner::processor::console::ScriptConsole;
use crate::runner::processor::thread_pool::ScriptThreadPool;
use crate::runner::processor::timer::{TimerId, TimerService};
use crate::runner::processor::ProcessorCore;

/// Long-lived services a realm borrows from its processor.
#[derive(Clone)]
pub struct RealmServices {
    pub config: Arc<EngineConfig>,
    pub console: Arc<ScriptConsole>,
    pub modules: Arc<ModuleHost>,
    pub audio: Arc<AudioSettings>,
    pub pool: Option<ScriptThreadPool>,
    pub timers: Option<Arc<TimerService>>,
    pub processor: Weak<ProcessorCore>,
    pub started: Instant,
}

impl RealmServices {
    /// Services for a realm that runs without a processor: no pool, no timers.
    pub fn standalone(config: EngineConfig) -> Self {
        RealmServices {
            config: Arc::new(config),
            console: Arc::new(ScriptConsole::new()),
            modules: Arc::new(ModuleHost::new()),
            audio: Arc::new(AudioSettings::new()),
            pool: None,
            timers: None,
            processor: Weak::new(),
            started: Instant::now(),
        }
    }
}

pub struct ScriptRealm {
    generation: u64,
    global: Arc<Scope>,
    heap: Mutex<Heap>,
    services: RealmServices,
    content: Arc<ScriptContent>,
    current_event: Mutex<Option<HiseEvent>>,
    callbacks: RwLock<HashMap<String, FunctionRef>>,
}

impl ScriptRealm {
    pub fn new(generation: u64, services: RealmServices) -> Arc<Self> {
        let heap_config = match services.config.max_tracked_allocations() {
            Some(max) => HeapConfig::with_limit(max),
            None => HeapConfig::unlimited(),
        };
        let global = Scope::new_global();
        let mut heap = Heap::new(heap_config);
        // The global scope is the root of the graph; it can never be over the limit.
        let _ = heap.track_scope(&global);
        Arc::new(ScriptRealm {
            generation,
            global,
            heap: Mutex::new(heap),
            services,
            content: Arc::new(ScriptContent::new()),
            current_event: Mutex::new(None),
            callbacks: RwLock::new(HashMap::new()),
        })
    }

    pub fn standalone() -> Arc<Self> {
        Self::new(0, RealmServices::standalone(EngineConfig::default()))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn global_scope(&self) -> &Arc<Scope> {
        &self.global
    }

    pub fn heap(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services.config
    }

    pub fn services(&self) -> &RealmServices {
        &self.services
    }

    pub fn console(&self) -> &Arc<ScriptConsole> {
        &self.services.console
    }

    pub fn content(&self) -> &Arc<ScriptContent> {
        &self.content
    }

    pub fn modules(&self) -> &Arc<ModuleHost> {
        &self.services.modules
    }

    pub fn audio(&self) -> &AudioSettings {
        &self.services.audio
    }

    pub fn uptime(&self) -> Duration {
        self.services.started.elapsed()
    }

    pub fn processor(&self) -> Option<Arc<ProcessorCore>> {
        self.services.processor.upgrade()
    }

    pub fn current_event(&self) -> MutexGuard<'_, Option<HiseEvent>> {
        self.current_event.lock()
    }

    pub fn set_current_event(&self, event: Option<HiseEvent>) {
        *self.current_event.lock() = event;
    }

    pub fn callback(&self, name: &str) -> Option<FunctionRef> {
        self.callbacks.read().get(name).cloned()
    }

    pub fn callback_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.callbacks.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn set_callbacks(&self, callbacks: HashMap<String, FunctionRef>) {
        *self.callbacks.write() = callbacks;
    }

    /// Runs `job` on the script pool. The job receives this realm only if it
    /// is still the live one when the job starts.
    pub fn spawn_async(&self, job: impl FnOnce(&Arc<ScriptRealm>) + Send + 'static) -> Result<(), ScriptError> {
        let pool = self
            .services
            .pool
            .clone()
            .ok_or_else(|| ScriptError::usage("Asynchronous execution needs a script processor"))?;
        let processor = self.services.processor.clone();
        let generation = self.generation;
        pool.spawn(move || {
            if let Some(core) = processor.upgrade() {
                core.with_live_realm(generation, job);
            }
        });
        Ok(())
    }

    /// Schedules `job` on the script pool after `delay`. Timers are cancelled
    /// when the realm is torn down.
    pub fn schedule(
        &self,
        delay: Duration,
        job: impl FnOnce(&Arc<ScriptRealm>) + Send + 'static,
    ) -> Result<TimerId, ScriptError> {
        let timers = self
            .services
            .timers
            .clone()
            .ok_or_else(|| ScriptError::usage("Delayed execution needs a script processor"))?;
        let pool = self
            .services
            .pool
            .clone()
            .ok_or_else(|| ScriptError::usage("Delayed execution needs a script processor"))?;
        let processor = self.services.processor.clone();
        let generation = self.generation;
        Ok(timers.schedule(delay, generation, move || {
            pool.spawn(move || {
                if let Some(core) = processor.upgrade() {
                    core.with_live_realm(generation, job);
                }
            })
        }))
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        match &self.services.timers {
            Some(timers) => timers.cancel(id),
            None => false,
        }
    }

    pub fn check_cyclic_references(&self, break_cycles: bool) -> CycleReport {
        let heap = self.heap.lock();
        let report = check_cycles(&heap, &[self.global.clone()], break_cycles);
        drop(heap);
        if break_cycles {
            self.heap.lock().compact();
        }
        report
    }

    /// Releases everything this realm keeps alive once it stopped being live.
    pub(crate) fn teardown(&self) -> CycleReport {
        if let Some(timers) = &self.services.timers {
            timers.cancel_group(self.generation);
        }
        self.services.modules.remove_listeners(self.generation);
        let callbacks = std::mem::take(&mut *self.callbacks.write());
        drop(callbacks);
        self.global.clear();
        *self.current_event.lock() = None;
        if self.services.config.heap.collect_cycles_on_recompile {
            self.check_cyclic_references(true)
        } else {
            CycleReport::default()
        }
    }

    /// Shorthand used by API classes to report script output.
    pub fn print(&self, value: &DynamicValue) {
        self.services.console.print(value.to_display_string());
    }
}
