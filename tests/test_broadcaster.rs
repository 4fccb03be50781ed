//! Tests for broadcasters driven by a running script processor: host
//! sources, asynchronous delivery and listener ordering.

extern crate hisescript;

use std::thread;
use std::time::Duration;

use hisescript::runner::ds::value::DynamicValue;
use hisescript::runner::host::{ComplexDataType, Module, MouseEventKind};
use hisescript::runner::processor::ScriptProcessor;

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn compiled(source: &str) -> ScriptProcessor {
    let processor = ScriptProcessor::with_default_config().unwrap();
    compile_into(&processor, source);
    processor
}

fn compile_into(processor: &ScriptProcessor, source: &str) {
    let result = processor.compile(source);
    assert!(result.was_ok(), "{}", result.error_message());
}

fn settle(processor: &ScriptProcessor) {
    assert!(processor.wait_until_idle(IDLE_TIMEOUT));
}

fn joined(processor: &ScriptProcessor, name: &str) -> String {
    processor
        .evaluate(&format!("{}.join('|');", name))
        .unwrap()
        .to_display_string()
}

// ============================================================================
// Component sources
// ============================================================================

#[test]
fn test_knob_value_change_reaches_listener_once() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster({ component: undefined, property: '', value: 0 });
         const var knob = Content.addKnob('Knob1', 0, 0);
         var calls = [];
         bc.attachToComponentProperties(knob, 'value', 'knobWatcher');
         bc.addListener('logger', 'log', function(component, property, value) {
             calls.push(component.getId() + ',' + property + ',' + value);
         });",
    );
    assert_eq!(joined(&processor, "calls"), "Knob1,value,0");

    let knob = processor.content().unwrap().get_component("Knob1").unwrap();
    processor
        .with_script_context(|ctx| knob.set_value(ctx, DynamicValue::Double(0.5)))
        .unwrap();
    settle(&processor);
    assert_eq!(joined(&processor, "calls"), "Knob1,value,0|Knob1,value,0.5");
}

#[test]
fn test_radio_group_selects_one_button() {
    let processor = compiled(
        "const var buttons = [Content.addButton('B0', 0, 0), Content.addButton('B1', 0, 0), Content.addButton('B2', 0, 0)];
         for (b in buttons) b.set('radioGroup', 1);
         const var bc = Engine.createBroadcaster(0);
         var selected = [];
         bc.attachToRadioGroup(1, 'tabs');
         bc.addListener('pages', 'show page', function(index) { selected.push(index); });",
    );
    assert_eq!(joined(&processor, "selected"), "");

    let content = processor.content().unwrap();
    let b1 = content.get_component("B1").unwrap();
    processor
        .with_script_context(|ctx| b1.set_value(ctx, DynamicValue::Int(1)))
        .unwrap();
    settle(&processor);

    assert_eq!(joined(&processor, "selected"), "1");
    let values: Vec<String> = ["B0", "B1", "B2"]
        .iter()
        .map(|id| content.get_component(id).unwrap().value().to_display_string())
        .collect();
    assert_eq!(values, vec!["0", "1", "0"]);
}

// ============================================================================
// Module and complex data sources
// ============================================================================

#[test]
fn test_module_parameter_changes_are_forwarded() {
    let processor = ScriptProcessor::with_default_config().unwrap();
    let lfo = processor
        .modules()
        .add_module(Module::new("LFO1").with_parameter("Frequency", 2.0).with_parameter("Depth", 1.0));
    compile_into(
        &processor,
        "const var bc = Engine.createBroadcaster({ processorId: undefined, parameterId: undefined, value: undefined });
         var seen = [];
         bc.attachToModuleParameter('LFO1', 'Frequency', 'lfo watcher');
         bc.addListener('log', 'log', function(processorId, parameterId, value) {
             seen.push(processorId + ':' + parameterId + ':' + value);
         });",
    );
    assert_eq!(joined(&processor, "seen"), "LFO1:Frequency:2");

    processor
        .with_script_context(|ctx| {
            lfo.set_attribute(Some(ctx), "Depth", 0.5)?;
            lfo.set_attribute(Some(ctx), "Frequency", 3.0)
        })
        .unwrap();
    settle(&processor);
    assert_eq!(joined(&processor, "seen"), "LFO1:Frequency:2|LFO1:Frequency:3");
}

#[test]
fn test_table_content_changes_are_forwarded() {
    let processor = ScriptProcessor::with_default_config().unwrap();
    let table = processor
        .modules()
        .add_module(Module::new("Table1").with_complex_data(ComplexDataType::Table, 1));
    compile_into(
        &processor,
        "const var bc = Engine.createBroadcaster({ processorId: undefined, index: undefined, value: undefined });
         var seen = [];
         bc.attachToComplexData('Table.Content', 'Table1', 0, 'table watcher');
         bc.addListener('log', 'log', function(processorId, index, value) {
             seen.push(processorId + ':' + index + ':' + value);
         });",
    );
    let slot = table.complex_data(ComplexDataType::Table, 0).unwrap();
    processor
        .with_script_context(|ctx| slot.set_content(Some(ctx), vec![0.0, 0.5, 1.0]))
        .unwrap();
    settle(&processor);
    assert_eq!(joined(&processor, "seen"), "Table1:0:|Table1:0:0;0.5;1");
}

// ============================================================================
// Asynchronous delivery
// ============================================================================

#[test]
fn test_async_messages_coalesce_without_queue() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var received = [];
         bc.addListener('a', 'log', function(v) { received.push(v); });
         function onTimer() { for (var i = 1; i <= 5; i++) bc.sendAsyncMessage(i); }",
    );
    assert!(processor.timer().was_ok());
    settle(&processor);
    let received = joined(&processor, "received");
    let values: Vec<&str> = received.split('|').collect();
    assert_eq!(values.first(), Some(&"0"));
    assert_eq!(values.last(), Some(&"5"));
    assert!(values.len() <= 6, "{}", received);
}

#[test]
fn test_async_messages_keep_every_value_with_queue() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         bc.setEnableQueue(true);
         var received = [];
         bc.addListener('a', 'log', function(v) { received.push(v); });
         function onTimer() { for (var i = 1; i <= 5; i++) bc.sendAsyncMessage(i); }",
    );
    assert!(processor.timer().was_ok());
    settle(&processor);
    assert_eq!(joined(&processor, "received"), "0|1|2|3|4|5");
}

#[test]
fn test_delayed_message_arrives_later() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var received = [];
         bc.addListener('a', 'log', function(v) { received.push(v); });
         bc.sendMessageWithDelay(7, 20);",
    );
    assert_eq!(joined(&processor, "received"), "0");
    thread::sleep(Duration::from_millis(150));
    settle(&processor);
    assert_eq!(joined(&processor, "received"), "0|7");
}

#[test]
fn test_async_listener_error_goes_to_console() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         bc.addListener('a', 'picky', function(v) { if (v == 2) throw 'two is not allowed'; });",
    );
    processor.evaluate("bc.sendAsyncMessage(2);").unwrap();
    settle(&processor);
    assert!(processor.console().contains("two is not allowed"));
}

// ============================================================================
// Ordering and threads
// ============================================================================

#[test]
fn test_listeners_run_in_priority_order() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var order = [];
         bc.addListener('a', { id: 'five', priority: 5 }, function(v) { order.push(5); });
         bc.addListener('b', { id: 'one', priority: 1 }, function(v) { order.push(1); });
         bc.addListener('c', { id: 'ten', priority: 10 }, function(v) { order.push(10); });",
    );
    let result = processor
        .evaluate("order = []; bc.sendSyncMessage(1); order.join(',');")
        .unwrap();
    assert_eq!(result, DynamicValue::from("1,5,10"));
}

#[test]
fn test_sync_send_on_audio_thread_needs_realtime_mode() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         function onTimer() { bc.sendSyncMessage(1); }",
    );
    let outcome = processor.timer();
    assert!(outcome.failed());
    assert!(
        outcome.error_message().contains("enable realtime safe execution"),
        "{}",
        outcome.error_message()
    );
}

#[test]
fn test_recompile_drops_old_source_listeners() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster({ component: undefined, value: undefined });
         const var knob = Content.addKnob('Knob1', 0, 0);
         bc.attachToComponentValue(knob, 'value watcher');",
    );
    let old_knob = processor.content().unwrap().get_component("Knob1").unwrap();
    assert_eq!(old_knob.num_listeners(), 1);
    compile_into(&processor, "var x = 1;");
    processor
        .with_script_context(|ctx| old_knob.set_value(ctx, DynamicValue::Int(1)))
        .unwrap();
    settle(&processor);
    assert!(processor.console().errors().is_empty());
}

#[test]
fn test_async_target_can_recurse_to_call_depth_limit() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var depth = 0;
         function down(n) { return n <= 1 ? 1 : 1 + down(n - 1); }
         bc.addListener('deep', 'deep', function(v) { if (v > 0) depth = down(v); });",
    );
    let levels = processor.config().execution.max_call_depth - 2;
    processor.evaluate(&format!("bc.sendAsyncMessage({});", levels)).unwrap();
    settle(&processor);
    assert!(processor.console().errors().is_empty(), "{:?}", processor.console().errors());
    assert_eq!(processor.evaluate("depth;").unwrap(), DynamicValue::from(levels));
}

// ============================================================================
// Delays
// ============================================================================

fn after_delays(processor: &ScriptProcessor) {
    thread::sleep(Duration::from_millis(200));
    settle(processor);
}

#[test]
fn test_second_delayed_message_replaces_the_first() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var received = [];
         bc.addListener('a', 'log', function(v) { received.push(v); });",
    );
    processor
        .evaluate("bc.sendMessageWithDelay(1, 30); bc.sendMessageWithDelay(2, 30);")
        .unwrap();
    after_delays(&processor);
    assert_eq!(joined(&processor, "received"), "0|2");
}

#[test]
fn test_second_delayed_call_replaces_the_first() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var calls = [];
         inline function record(v) { calls.push(v); }",
    );
    processor
        .evaluate("bc.callWithDelay(30, [1], record); bc.callWithDelay(30, [2], record);")
        .unwrap();
    after_delays(&processor);
    assert_eq!(joined(&processor, "calls"), "2");
}

#[test]
fn test_delayed_listener_is_rescheduled_by_each_message() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var received = [];
         bc.addDelayedListener(30, 'a', 'late', function(v) { received.push(v); });",
    );
    assert_eq!(joined(&processor, "received"), "");
    processor
        .evaluate("bc.sendSyncMessage(1); bc.sendSyncMessage(2); bc.sendSyncMessage(3);")
        .unwrap();
    assert_eq!(joined(&processor, "received"), "");
    after_delays(&processor);
    assert_eq!(joined(&processor, "received"), "3");
}

#[test]
fn test_delayed_listener_with_zero_delay_is_immediate() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster(0);
         var received = [];
         bc.addDelayedListener(0, 'a', 'now', function(v) { received.push(v); });
         bc.sendSyncMessage(4);",
    );
    assert_eq!(joined(&processor, "received"), "0|4");
}

// ============================================================================
// Visibility and mouse sources
// ============================================================================

#[test]
fn test_visibility_changes_are_forwarded() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster({ id: undefined, isVisible: undefined });
         Content.addKnob('Knob1', 0, 0);
         var seen = [];
         bc.attachToComponentVisibility('Knob1', 'visibility');
         bc.addListener('log', 'log', function(id, isVisible) { seen.push(id + ':' + isVisible); });",
    );
    assert_eq!(joined(&processor, "seen"), "Knob1:true");

    let knob = processor.content().unwrap().get_component("Knob1").unwrap();
    processor
        .with_script_context(|ctx| {
            knob.set_property(ctx, "text", DynamicValue::from("ignored"))?;
            knob.set_property(ctx, "visible", DynamicValue::Bool(false))
        })
        .unwrap();
    settle(&processor);
    assert_eq!(joined(&processor, "seen"), "Knob1:true|Knob1:false");
}

#[test]
fn test_mouse_events_are_filtered_by_callback_level() {
    let processor = compiled(
        "const var bc = Engine.createBroadcaster({ component: undefined, event: undefined });
         bc.setEnableQueue(true);
         Content.addButton('Button1', 0, 0);
         var seen = [];
         bc.attachToComponentMouseEvents('Button1', 'Clicks & Hover', 'mouse');
         bc.addListener('log', 'log', function(component, event) {
             seen.push(component.getId() + ':' + event.type + '@' + event.x);
         });",
    );
    assert_eq!(joined(&processor, "seen"), "");

    let button = processor.content().unwrap().get_component("Button1").unwrap();
    processor
        .with_script_context(|ctx| {
            button.send_mouse_event(ctx, MouseEventKind::Enter, 1.0, 2.0)?;
            button.send_mouse_event(ctx, MouseEventKind::Drag, 3.0, 4.0)?;
            button.send_mouse_event(ctx, MouseEventKind::Move, 5.0, 6.0)?;
            button.send_mouse_event(ctx, MouseEventKind::MouseDown, 7.0, 8.0)
        })
        .unwrap();
    settle(&processor);
    assert_eq!(joined(&processor, "seen"), "Button1:enter@1|Button1:mouseDown@7");
}
