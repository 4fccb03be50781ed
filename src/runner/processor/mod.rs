//! The script processor: compiles scripts and runs their callbacks.
//!
//! Every compile builds a fresh [`ScriptRealm`] and swaps it in under the
//! exclusive side of the compile lock. Callbacks, async jobs and snippet
//! evaluation take the shared side, so none of them ever sees a realm that is
//! only partially set up. A failed compile leaves the previous realm live.

pub mod callback;
pub mod console;
pub mod thread;
pub mod thread_pool;
pub mod timer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::parser::ast::{ProgramData, StatementType};
use crate::parser::HiseParser;
use crate::runner::ds::cycle_checker::CycleReport;
use crate::runner::ds::error::{ScriptError, ScriptResult};
use crate::runner::ds::realm::{RealmServices, ScriptRealm};
use crate::runner::ds::value::{ArrayObject, AudioBuffer, DynamicValue, FunctionRef, NativeObjectRef};
use crate::runner::eval::function::call_function;
use crate::runner::eval::statement::execute_program;
use crate::runner::host::{AudioSettings, HiseEvent, ModuleHost, ScriptContent};
use crate::runner::plugin::config::EngineConfig;
use crate::runner::plugin::registry::ApiRegistry;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::content::component_value;

use self::callback::{Callback, CallbackOutcome};
use self::console::ScriptConsole;
use self::thread::{is_audio_thread, script_stack_size, ThreadKind, ThreadKindGuard};
use self::thread_pool::ScriptThreadPool;
use self::timer::TimerService;

/// Failure to start the processor's background threads.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to start the script pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to start the timer thread: {0}")]
    Timer(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Uncompiled,
    Compiling,
    Ready,
    Executing,
}

struct Compiled {
    realm: Arc<ScriptRealm>,
}

/// Shared state behind a [`ScriptProcessor`]. Background jobs reach it
/// through a weak handle.
pub struct ProcessorCore {
    compiled: RwLock<Option<Compiled>>,
    compiling: Mutex<bool>,
    executing: AtomicUsize,
    generation: AtomicU64,
    registry: Mutex<ApiRegistry>,
    config: Arc<EngineConfig>,
    console: Arc<ScriptConsole>,
    modules: Arc<ModuleHost>,
    audio: Arc<AudioSettings>,
    pool: ScriptThreadPool,
    timers: Arc<TimerService>,
    self_ref: Weak<ProcessorCore>,
    started: Instant,
}

/// Counts a running callback for [`ProcessorState::Executing`].
struct ExecutingGuard<'a>(&'a AtomicUsize);

impl<'a> ExecutingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        ExecutingGuard(counter)
    }
}

impl<'a> Drop for ExecutingGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ProcessorCore {
    fn services(&self) -> RealmServices {
        RealmServices {
            config: self.config.clone(),
            console: self.console.clone(),
            modules: self.modules.clone(),
            audio: self.audio.clone(),
            pool: Some(self.pool.clone()),
            timers: Some(self.timers.clone()),
            processor: self.self_ref.clone(),
            started: self.started,
        }
    }

    /// Runs `job` against the live realm, but only if it still belongs to
    /// `generation`. Jobs of a replaced script are dropped.
    pub(crate) fn with_live_realm(&self, generation: u64, job: impl FnOnce(&Arc<ScriptRealm>)) {
        let compiled = self.compiled.read();
        match compiled.as_ref() {
            Some(c) if c.realm.generation() == generation => {
                let _executing = ExecutingGuard::enter(&self.executing);
                job(&c.realm);
            }
            _ => debug!("dropping job of stale script generation {}", generation),
        }
    }

    pub fn state(&self) -> ProcessorState {
        if *self.compiling.lock() {
            return ProcessorState::Compiling;
        }
        if self.executing.load(Ordering::SeqCst) > 0 {
            return ProcessorState::Executing;
        }
        match self.compiled.try_read() {
            Some(c) if c.is_some() => ProcessorState::Ready,
            Some(_) => ProcessorState::Uncompiled,
            None => ProcessorState::Compiling,
        }
    }

    fn live_realm(&self) -> Option<Arc<ScriptRealm>> {
        self.compiled.read().as_ref().map(|c| c.realm.clone())
    }
}

/// Checks the signature of every well-known callback the program declares.
fn validate_callbacks(program: &ProgramData) -> Result<(), ScriptError> {
    for stmt in program.body.iter() {
        if let StatementType::FunctionDeclaration(data) = stmt {
            if let Some(callback) = Callback::from_name(data.name()) {
                if data.params.len() != callback.parameter_count() {
                    return Err(ScriptError::usage(format!(
                        "{} must have {} parameters, got {}",
                        callback.name(),
                        callback.parameter_count(),
                        data.params.len()
                    ))
                    .with_location(&data.meta));
                }
            }
        }
    }
    Ok(())
}

fn collect_callbacks(realm: &ScriptRealm) -> HashMap<String, FunctionRef> {
    let mut callbacks = HashMap::new();
    for callback in Callback::ALL.iter() {
        if let Some(DynamicValue::Function(f)) = realm.global_scope().lookup(callback.name()) {
            callbacks.insert(callback.name().to_string(), f);
        }
    }
    callbacks
}

fn channels_value(channels: &[Vec<f32>]) -> (DynamicValue, Vec<Arc<AudioBuffer>>) {
    let buffers: Vec<Arc<AudioBuffer>> = channels
        .iter()
        .map(|c| Arc::new(AudioBuffer::from_samples(c.clone())))
        .collect();
    let elements = buffers.iter().cloned().map(DynamicValue::Buffer).collect();
    (DynamicValue::Array(Arc::new(ArrayObject::new(elements))), buffers)
}

fn copy_back(channels: &mut [Vec<f32>], buffers: &[Arc<AudioBuffer>]) {
    for (channel, buffer) in channels.iter_mut().zip(buffers.iter()) {
        *channel = buffer.to_vec();
    }
}

/// Hosts one script: compiles it and invokes its callbacks.
pub struct ScriptProcessor {
    core: Arc<ProcessorCore>,
}

impl ScriptProcessor {
    pub fn new(config: EngineConfig) -> Result<Self, ProcessorError> {
        let stack_size = script_stack_size(config.execution.max_call_depth);
        let pool = ScriptThreadPool::new(stack_size)?;
        let timers = Arc::new(TimerService::new(stack_size)?);
        let core = Arc::new_cyclic(|self_ref| ProcessorCore {
            compiled: RwLock::new(None),
            compiling: Mutex::new(false),
            executing: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            registry: Mutex::new(ApiRegistry::with_standard_classes()),
            config: Arc::new(config),
            console: Arc::new(ScriptConsole::new()),
            modules: Arc::new(ModuleHost::new()),
            audio: Arc::new(AudioSettings::new()),
            pool,
            timers,
            self_ref: self_ref.clone(),
            started: Instant::now(),
        });
        Ok(ScriptProcessor { core })
    }

    pub fn with_default_config() -> Result<Self, ProcessorError> {
        Self::new(EngineConfig::default())
    }

    pub fn state(&self) -> ProcessorState {
        self.core.state()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    pub fn console(&self) -> &Arc<ScriptConsole> {
        &self.core.console
    }

    pub fn modules(&self) -> &Arc<ModuleHost> {
        &self.core.modules
    }

    pub fn audio(&self) -> &AudioSettings {
        &self.core.audio
    }

    pub fn thread_pool(&self) -> &ScriptThreadPool {
        &self.core.pool
    }

    /// Blocks until all queued asynchronous work has run.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.core.pool.wait_until_idle(timeout)
    }

    /// Interface content of the live script.
    pub fn content(&self) -> Option<Arc<ScriptContent>> {
        self.core.live_realm().map(|r| r.content().clone())
    }

    pub fn realm(&self) -> Option<Arc<ScriptRealm>> {
        self.core.live_realm()
    }

    /// Makes `object` a global of every script compiled from now on.
    pub fn register_native_object(&self, name: &str, object: NativeObjectRef) {
        self.core.registry.lock().register_native_object(name, object);
    }

    /// Compiles `source` and, if it parses and `onInit` succeeds, makes it the live script.
    pub fn compile(&self, source: &str) -> ScriptResult {
        let start = Instant::now();
        let result = self.compile_internal(source);
        match &result {
            Ok(()) => info!("compiled script in {}ms", start.elapsed().as_millis()),
            Err(e) => self.core.console.error(format!("Compile error: {}", e.report())),
        }
        result.into()
    }

    fn compile_internal(&self, source: &str) -> Result<(), ScriptError> {
        let program = HiseParser::parse_to_ast_from_str(source)?;
        validate_callbacks(&program)?;

        let core = &self.core;
        let generation = core.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let realm = ScriptRealm::new(generation, core.services());
        core.registry.lock().install(&realm)?;

        let mut compiled = core.compiled.write();
        *core.compiling.lock() = true;
        let init = {
            let _thread = ThreadKindGuard::enter(ThreadKind::Message);
            let mut ctx = EvalContext::new(realm.clone(), Some(core.config.compile_budget()));
            execute_program(&program, &mut ctx)
        };
        let previous = match init {
            Ok(_) => {
                realm.set_callbacks(collect_callbacks(&realm));
                compiled.replace(Compiled { realm: realm.clone() })
            }
            Err(e) => {
                *core.compiling.lock() = false;
                drop(compiled);
                realm.teardown();
                return Err(e);
            }
        };
        *core.compiling.lock() = false;
        drop(compiled);

        if let Some(previous) = previous {
            let report = previous.realm.teardown();
            debug!(
                "released script generation {}: {} cyclic allocations",
                previous.realm.generation(),
                report.cyclic
            );
        }
        Ok(())
    }

    /// Invokes a callback by name. An undefined callback succeeds with `Undefined`.
    pub fn execute_callback(&self, name: &str, args: Vec<DynamicValue>, thread: ThreadKind) -> CallbackOutcome {
        self.run_callback(name, args, thread, None)
    }

    fn run_callback(
        &self,
        name: &str,
        args: Vec<DynamicValue>,
        thread: ThreadKind,
        event: Option<HiseEvent>,
    ) -> CallbackOutcome {
        let start = Instant::now();
        let _thread = ThreadKindGuard::enter(thread);
        let compiled = self.core.compiled.read();
        let realm = match compiled.as_ref() {
            Some(c) => c.realm.clone(),
            None => return CallbackOutcome::fail("No script compiled", start.elapsed()),
        };
        let function = match realm.callback(name) {
            Some(f) => f,
            None => return CallbackOutcome::ok(DynamicValue::Undefined, start.elapsed()),
        };
        let _executing = ExecutingGuard::enter(&self.core.executing);
        let has_event = event.is_some();
        if has_event {
            realm.set_current_event(event);
        }
        let budget = match thread {
            ThreadKind::Audio => self.core.config.audio_budget(),
            _ => self.core.config.message_budget(),
        };
        let mut ctx = EvalContext::new(realm.clone(), Some(budget));
        let result = call_function(&mut ctx, &function, DynamicValue::Undefined, args);
        let event = if has_event { realm.current_event().take() } else { None };
        let mut outcome = match result {
            Ok(value) => CallbackOutcome::ok(value, start.elapsed()),
            Err(e) => {
                let message = format!("{}: {}", name, e.report());
                if e.is_timeout() {
                    warn!("{} exceeded its {}ms budget", name, budget.as_millis());
                }
                self.core.console.error(message.clone());
                CallbackOutcome::fail(message, start.elapsed())
            }
        };
        outcome.event = event;
        outcome
    }

    pub fn note_on(&self, event: HiseEvent) -> CallbackOutcome {
        self.run_callback(Callback::OnNoteOn.name(), vec![], ThreadKind::Audio, Some(event))
    }

    pub fn note_off(&self, event: HiseEvent) -> CallbackOutcome {
        self.run_callback(Callback::OnNoteOff.name(), vec![], ThreadKind::Audio, Some(event))
    }

    pub fn controller(&self, event: HiseEvent) -> CallbackOutcome {
        self.run_callback(Callback::OnController.name(), vec![], ThreadKind::Audio, Some(event))
    }

    pub fn timer(&self) -> CallbackOutcome {
        self.execute_callback(Callback::OnTimer.name(), vec![], ThreadKind::Audio)
    }

    /// `onControl(component, value)` for the component with id `component_id`.
    pub fn control(&self, component_id: &str, value: DynamicValue) -> CallbackOutcome {
        let component = self
            .content()
            .and_then(|content| content.get_component(component_id));
        match component {
            Some(component) => self.execute_callback(
                Callback::OnControl.name(),
                vec![component_value(component), value],
                ThreadKind::Message,
            ),
            None => CallbackOutcome::fail(
                format!("Component with name {} wasn't found", component_id),
                Duration::from_millis(0),
            ),
        }
    }

    pub fn prepare_to_play(&self, sample_rate: f64, block_size: usize) -> CallbackOutcome {
        self.core.audio.set(sample_rate, block_size);
        self.execute_callback(
            Callback::PrepareToPlay.name(),
            vec![DynamicValue::Double(sample_rate), DynamicValue::from(block_size)],
            ThreadKind::Message,
        )
    }

    /// Runs `processBlock(channels)`; samples written by the script are copied back.
    pub fn process_block(&self, channels: &mut [Vec<f32>]) -> CallbackOutcome {
        let (value, buffers) = channels_value(channels);
        let outcome = self.execute_callback(Callback::ProcessBlock.name(), vec![value], ThreadKind::Audio);
        copy_back(channels, &buffers);
        outcome
    }

    pub fn render_voice(&self, voice_index: usize, channels: &mut [Vec<f32>]) -> CallbackOutcome {
        let (value, buffers) = channels_value(channels);
        let outcome = self.execute_callback(
            Callback::RenderVoice.name(),
            vec![DynamicValue::from(voice_index), value],
            ThreadKind::Audio,
        );
        copy_back(channels, &buffers);
        outcome
    }

    /// Runs `startVoice(voiceIndex)`. Without the callback the value is `Undefined`.
    pub fn start_voice(&self, voice_index: usize) -> CallbackOutcome {
        let mut outcome = self.execute_callback(
            Callback::StartVoice.name(),
            vec![DynamicValue::from(voice_index)],
            ThreadKind::Audio,
        );
        if !outcome.was_ok() {
            outcome.value = DynamicValue::Undefined;
        }
        outcome
    }

    pub fn stop_voice(&self, voice_index: usize) -> CallbackOutcome {
        self.execute_callback(
            Callback::StopVoice.name(),
            vec![DynamicValue::from(voice_index)],
            ThreadKind::Audio,
        )
    }

    /// Runs a standalone snippet against the live global scope.
    pub fn evaluate(&self, snippet: &str) -> Result<DynamicValue, ScriptError> {
        let program = HiseParser::parse_to_ast_from_str(snippet)?;
        let compiled = self.core.compiled.read();
        let realm = match compiled.as_ref() {
            Some(c) => c.realm.clone(),
            None => return Err(ScriptError::usage("No script compiled")),
        };
        let _executing = ExecutingGuard::enter(&self.core.executing);
        let mut ctx = EvalContext::new(realm, Some(self.core.config.message_budget()));
        let completion = execute_program(&program, &mut ctx)?;
        Ok(completion.value.unwrap_or_default())
    }

    /// Runs host code that touches script state (component values, module
    /// parameters, complex data) with a message thread context of the live
    /// script. Listeners notified by `f` see a consistent realm.
    pub fn with_script_context<R>(
        &self,
        f: impl FnOnce(&mut EvalContext) -> Result<R, ScriptError>,
    ) -> Result<R, ScriptError> {
        let _thread = ThreadKindGuard::enter(ThreadKind::Message);
        let compiled = self.core.compiled.read();
        let realm = match compiled.as_ref() {
            Some(c) => c.realm.clone(),
            None => return Err(ScriptError::usage("No script compiled")),
        };
        let _executing = ExecutingGuard::enter(&self.core.executing);
        let mut ctx = EvalContext::new(realm, Some(self.core.config.message_budget()));
        f(&mut ctx)
    }

    /// Looks for allocations only kept alive by reference cycles and
    /// optionally breaks them. Never runs on the audio thread.
    ///
    /// Takes the exclusive side of the compile lock, so it waits for running
    /// callbacks and async jobs and keeps new ones out until it is done. Must
    /// not be called from inside a callback or `with_script_context`.
    pub fn check_cyclic_references(&self, break_cycles: bool) -> Result<CycleReport, ScriptError> {
        if is_audio_thread() {
            return Err(ScriptError::usage("Cyclic reference checks can't run on the audio thread"));
        }
        let compiled = self.core.compiled.write();
        match compiled.as_ref() {
            Some(c) => Ok(c.realm.check_cyclic_references(break_cycles)),
            None => Err(ScriptError::usage("No script compiled")),
        }
    }
}

impl Drop for ScriptProcessor {
    fn drop(&mut self) {
        let previous = self.core.compiled.write().take();
        if let Some(previous) = previous {
            previous.realm.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(source: &str) -> ScriptProcessor {
        let processor = ScriptProcessor::with_default_config().unwrap();
        let result = processor.compile(source);
        assert!(result.was_ok(), "{}", result.error_message());
        processor
    }

    #[test]
    fn test_state_machine() {
        let p = ScriptProcessor::with_default_config().unwrap();
        assert_eq!(p.state(), ProcessorState::Uncompiled);
        assert!(p.compile("var x = 1;").was_ok());
        assert_eq!(p.state(), ProcessorState::Ready);
    }

    #[test]
    fn test_callback_signature_is_checked() {
        let p = ScriptProcessor::with_default_config().unwrap();
        let result = p.compile("function onControl(component) {}");
        assert!(result.error_message().starts_with("onControl must have 2 parameters, got 1"));
        assert_eq!(p.state(), ProcessorState::Uncompiled);
    }

    #[test]
    fn test_failed_compile_keeps_previous_script() {
        let p = processor("var version = 1; function onNoteOn() { return version; }");
        assert!(p.compile("var version = 2; throw 'init failed';").failed());
        let outcome = p.note_on(HiseEvent::note_on(1, 60, 100));
        assert_eq!(outcome.value, DynamicValue::Int(1));
        assert!(p.console().contains("init failed"));
    }

    #[test]
    fn test_undefined_callback_is_ok() {
        let p = processor("var x = 1;");
        let outcome = p.start_voice(0);
        assert!(outcome.was_ok());
        assert_eq!(outcome.value, DynamicValue::Undefined);
    }

    #[test]
    fn test_no_script_compiled() {
        let p = ScriptProcessor::with_default_config().unwrap();
        assert_eq!(p.timer().error_message(), "No script compiled");
        assert!(p.check_cyclic_references(false).is_err());
    }

    #[test]
    fn test_timeout_on_audio_thread() {
        let p = processor("function onTimer() { while (true) {} }");
        let outcome = p.timer();
        assert!(!outcome.was_ok());
        assert!(outcome.error_message().contains("timed out"));
        assert!(outcome.elapsed < Duration::from_millis(200));
    }

    #[test]
    fn test_note_on_sees_event_and_can_ignore_it() {
        let p = processor(
            "var last = 0;
             function onNoteOn() { last = Message.getNoteNumber(); Message.ignoreEvent(true); }",
        );
        let outcome = p.note_on(HiseEvent::note_on(1, 64, 100));
        assert!(outcome.was_ok(), "{}", outcome.error_message());
        assert!(outcome.event_ignored());
        assert_eq!(p.evaluate("last;").unwrap(), DynamicValue::Int(64));
    }

    #[test]
    fn test_process_block_writes_back() {
        let p = processor("function processBlock(channels) { channels[0][1] = 0.5; }");
        let mut channels = vec![vec![0.0f32; 4], vec![0.0f32; 4]];
        assert!(p.process_block(&mut channels).was_ok());
        assert_eq!(channels[0], vec![0.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_cycle_check_refused_on_audio_thread() {
        let p = processor("var a = {};");
        let _audio = ThreadKindGuard::enter(ThreadKind::Audio);
        let err = p.check_cyclic_references(false).unwrap_err();
        assert_eq!(err.to_string(), "Cyclic reference checks can't run on the audio thread");
    }
}
