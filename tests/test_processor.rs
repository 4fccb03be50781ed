//! Tests for the script processor: compiling, callbacks, the watchdog and
//! the compile lock.

extern crate hisescript;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hisescript::runner::ds::value::DynamicValue;
use hisescript::runner::host::HiseEvent;
use hisescript::runner::plugin::config::EngineConfig;
use hisescript::runner::processor::thread::ThreadKind;
use hisescript::runner::processor::{ProcessorState, ScriptProcessor};

fn compiled(source: &str) -> ScriptProcessor {
    let processor = ScriptProcessor::with_default_config().unwrap();
    let result = processor.compile(source);
    assert!(result.was_ok(), "{}", result.error_message());
    processor
}

// ============================================================================
// Compiling
// ============================================================================

#[test]
fn test_parse_error_keeps_processor_uncompiled() {
    let processor = ScriptProcessor::with_default_config().unwrap();
    let result = processor.compile("var x = ;");
    assert!(result.failed());
    assert_eq!(processor.state(), ProcessorState::Uncompiled);
    assert_eq!(processor.console().errors().len(), 1);
}

#[test]
fn test_parse_error_keeps_previous_script() {
    let processor = compiled("var v = 'old'; function onTimer() { return v; }");
    assert!(processor.compile("var v = 'new'; function onTimer( { }").failed());
    assert_eq!(processor.timer().value, DynamicValue::from("old"));
}

#[test]
fn test_recompile_replaces_globals_and_content() {
    let processor = compiled("var a = 1; Content.addKnob('Knob1', 0, 0);");
    assert!(processor.content().unwrap().get_component("Knob1").is_some());
    assert!(processor.compile("var b = 2;").was_ok());
    assert!(processor.content().unwrap().get_component("Knob1").is_none());
    assert!(processor.evaluate("a;").is_err());
    assert_eq!(processor.evaluate("b;").unwrap(), DynamicValue::Int(2));
}

#[test]
fn test_wrong_callback_signature_is_compile_error() {
    let processor = ScriptProcessor::with_default_config().unwrap();
    let result = processor.compile("function prepareToPlay(sampleRate) {}");
    assert!(result.error_message().contains("prepareToPlay must have 2 parameters"));
}

#[test]
fn test_registered_native_object_is_visible() {
    let processor = ScriptProcessor::with_default_config().unwrap();
    assert!(processor.realm().is_none());
    processor.compile("var x = 1;");
    let realm = processor.realm().unwrap();
    let math = realm.global_scope().lookup("Math").unwrap();
    processor.register_native_object("Maths", math.as_native().unwrap().clone());
    assert!(processor.compile("var y = Maths.abs(-3);").was_ok());
    assert_eq!(processor.evaluate("y;").unwrap(), DynamicValue::Int(3));
}

// ============================================================================
// Callbacks
// ============================================================================

#[test]
fn test_note_callbacks_share_globals() {
    let processor = compiled(
        "var held = [];
         function onNoteOn() { held.push(Message.getNoteNumber()); }
         function onNoteOff() { held.remove(Message.getNoteNumber()); }",
    );
    processor.note_on(HiseEvent::note_on(1, 60, 100));
    processor.note_on(HiseEvent::note_on(1, 64, 100));
    processor.note_off(HiseEvent::note_off(1, 60));
    assert_eq!(processor.evaluate("held.join(',');").unwrap(), DynamicValue::from("64"));
}

#[test]
fn test_controller_callback_gets_event() {
    let processor = compiled("var cc = -1; function onController() { cc = Message.getControllerValue(); }");
    let outcome = processor.controller(HiseEvent::controller(1, 1, 77));
    assert!(outcome.was_ok());
    assert!(outcome.event.is_some());
    assert_eq!(processor.evaluate("cc;").unwrap(), DynamicValue::Int(77));
}

#[test]
fn test_on_control_receives_component_and_value() {
    let processor = compiled(
        "const var knob = Content.addKnob('Knob1', 0, 0);
         var seen = '';
         function onControl(component, value) { seen = component.getId() + '=' + value; }",
    );
    assert!(processor.control("Knob1", DynamicValue::Double(0.25)).was_ok());
    assert_eq!(processor.evaluate("seen;").unwrap(), DynamicValue::from("Knob1=0.25"));
    assert!(processor.control("Nope", DynamicValue::Int(1)).failed());
}

#[test]
fn test_prepare_to_play_sets_audio_settings() {
    let processor = compiled("var info = ''; function prepareToPlay(sampleRate, blockSize) { info = sampleRate + '/' + blockSize; }");
    assert!(processor.prepare_to_play(48000.0, 256).was_ok());
    assert_eq!(processor.evaluate("info;").unwrap(), DynamicValue::from("48000/256"));
    assert_eq!(
        processor.evaluate("Engine.getSampleRate() + ',' + Engine.getBufferSize();").unwrap(),
        DynamicValue::from("48000,256")
    );
}

#[test]
fn test_render_voice_writes_samples() {
    let processor = compiled(
        "function renderVoice(voiceIndex, channels) {
            for (var i = 0; i < channels[0].length; i++) channels[0][i] = voiceIndex;
         }",
    );
    let mut channels = vec![vec![0.0f32; 3]];
    assert!(processor.render_voice(2, &mut channels).was_ok());
    assert_eq!(channels[0], vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_start_and_stop_voice() {
    let processor = compiled(
        "var active = 0;
         function startVoice(voiceIndex) { active++; return voiceIndex * 2; }
         function stopVoice(voiceIndex) { active--; }",
    );
    assert_eq!(processor.start_voice(3).value, DynamicValue::Int(6));
    processor.stop_voice(3);
    assert_eq!(processor.evaluate("active;").unwrap(), DynamicValue::Int(0));
}

#[test]
fn test_missing_start_voice_returns_undefined() {
    let processor = compiled("var x = 0;");
    let outcome = processor.start_voice(0);
    assert!(outcome.was_ok());
    assert_eq!(outcome.value, DynamicValue::Undefined);
}

#[test]
fn test_callback_error_is_reported_to_console() {
    let processor = compiled("function onTimer() { throw 'broken'; }");
    let outcome = processor.timer();
    assert!(outcome.failed());
    assert!(outcome.error_message().starts_with("onTimer: broken"));
    assert!(processor.console().contains("onTimer: broken"));
}

#[test]
fn test_is_audio_thread_follows_callback_thread() {
    let processor = compiled("var audio = []; function onTimer() { audio.push(Engine.isAudioThread()); }");
    processor.timer();
    processor.execute_callback("onTimer", vec![], ThreadKind::Message);
    assert_eq!(processor.evaluate("audio.join(',');").unwrap(), DynamicValue::from("true,false"));
}

// ============================================================================
// Watchdog
// ============================================================================

#[test]
fn test_timeout_watchdog() {
    let config = EngineConfig::from_toml_str("[execution]\naudio_thread_budget_ms = 10").unwrap();
    let processor = ScriptProcessor::new(config).unwrap();
    assert!(processor.compile("function onTimer() { while (true) {} }").was_ok());
    let start = Instant::now();
    let outcome = processor.timer();
    assert!(outcome.failed());
    assert!(outcome.error_message().contains("timed out"));
    assert!(start.elapsed() < Duration::from_millis(50), "{:?}", start.elapsed());
}

#[test]
fn test_timeout_is_not_catchable() {
    let config = EngineConfig::from_toml_str("[execution]\naudio_thread_budget_ms = 10").unwrap();
    let processor = ScriptProcessor::new(config).unwrap();
    processor.compile(
        "var caught = false;
         function onTimer() { try { while (true) {} } catch (e) { caught = true; } }",
    );
    assert!(processor.timer().failed());
    assert_eq!(processor.evaluate("caught;").unwrap(), DynamicValue::Bool(false));
}

#[test]
fn test_infinite_on_init_fails_compile() {
    let config = EngineConfig::from_toml_str("[execution]\ncompile_budget_ms = 20").unwrap();
    let processor = ScriptProcessor::new(config).unwrap();
    let result = processor.compile("while (true) {}");
    assert!(result.failed());
    assert_eq!(processor.state(), ProcessorState::Uncompiled);
}

#[test]
fn test_config_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[execution]\nmessage_thread_budget_ms = 42\n[heap]\ncollect_cycles_on_recompile = false").unwrap();
    let config = EngineConfig::load(file.path()).unwrap();
    let processor = ScriptProcessor::new(config).unwrap();
    assert_eq!(processor.config().execution.message_thread_budget_ms, 42);
    assert!(!processor.config().heap.collect_cycles_on_recompile);
    assert_eq!(processor.config().execution.audio_thread_budget_ms, 5);
}

// ============================================================================
// Compile lock
// ============================================================================

#[test]
fn test_callbacks_never_see_half_compiled_script() {
    let processor = Arc::new(compiled("var v = 0; function onTimer() { return [v, 0]; }"));
    let done = Arc::new(AtomicBool::new(false));
    let compiler = {
        let processor = processor.clone();
        let done = done.clone();
        thread::spawn(move || {
            for n in 1..40 {
                let source = format!(
                    "var v = {n}; var pad = []; for (var i = 0; i < 50; i++) pad.push(i); function onTimer() {{ return [v, {n}]; }}",
                    n = n
                );
                assert!(processor.compile(&source).was_ok());
            }
            done.store(true, Ordering::SeqCst);
        })
    };
    let mut checked = 0;
    while !done.load(Ordering::SeqCst) {
        let outcome = processor.timer();
        assert!(outcome.was_ok(), "{}", outcome.error_message());
        let pair = outcome.value.to_display_string();
        let parts: Vec<&str> = pair.split(',').collect();
        assert_eq!(parts[0], parts[1], "inconsistent callback result {}", pair);
        checked += 1;
    }
    compiler.join().unwrap();
    assert!(checked > 0);
    assert_eq!(processor.timer().value.to_display_string(), "39,39");
}

// ============================================================================
// Cycle checker
// ============================================================================

#[test]
fn test_cyclic_objects_are_found_and_reclaimed() {
    let processor = compiled("var a = {}; var b = {}; a.other = b; b.other = a; a = null; b = null;");
    let report = processor.check_cyclic_references(false).unwrap();
    assert_eq!(report.cyclic, 2);
    let report = processor.check_cyclic_references(true).unwrap();
    assert_eq!(report.cyclic, 2);
    let report = processor.check_cyclic_references(false).unwrap();
    assert_eq!(report.cyclic, 0);
}

#[test]
fn test_reachable_cycles_are_kept() {
    let processor = compiled("var a = {}; var b = {}; a.other = b; b.other = a;");
    let report = processor.check_cyclic_references(true).unwrap();
    assert_eq!(report.cyclic, 0);
    assert_eq!(processor.evaluate("a.other.other == a;").unwrap(), DynamicValue::Bool(true));
}

#[test]
fn test_cycle_check_waits_for_running_callback() {
    let config = EngineConfig::from_toml_str("[execution]\nmessage_thread_budget_ms = 300").unwrap();
    let processor = Arc::new(ScriptProcessor::new(config).unwrap());
    assert!(processor
        .compile("var a = {}; var b = {}; a.other = b; b.other = a; function onTimer() { while (true) {} }")
        .was_ok());
    let start = Instant::now();
    let runner = {
        let processor = processor.clone();
        thread::spawn(move || processor.execute_callback("onTimer", vec![], ThreadKind::Message))
    };
    while processor.state() != ProcessorState::Executing {
        thread::sleep(Duration::from_millis(1));
    }
    let report = processor.check_cyclic_references(true).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(250), "{:?}", start.elapsed());
    assert_eq!(report.cyclic, 0);
    assert!(runner.join().unwrap().failed());
}
