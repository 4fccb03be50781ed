//! # hisescript - an embeddable scripting engine for audio plugins
//!
//! A tree-walking interpreter for a JavaScript-like language, built to run
//! inside a real-time audio host:
//! - PEG parser producing a shared, immutable AST
//! - Evaluator with a per-call watchdog budget and a realtime-safety check
//! - Native API classes (`Console`, `Math`, `Engine`, `Content`, `Synth`, `Message`, ...)
//! - Broadcasters: typed message fan-out with component, module and
//!   complex-data sources
//! - A heap tracker with a cycle checker for reference-counted values
//!
//! ## Quick Start
//!
//! ```
//! use hisescript::runner::processor::ScriptProcessor;
//! use hisescript::runner::ds::value::DynamicValue;
//!
//! let processor = ScriptProcessor::with_default_config().unwrap();
//! let result = processor.compile("
//!     var counter = 0;
//!     function onTimer() { counter += 1; }
//! ");
//! assert!(result.was_ok());
//!
//! processor.timer();
//! processor.timer();
//! assert_eq!(processor.evaluate("counter;").unwrap(), DynamicValue::Int(2));
//! ```
//!
//! ## Threads
//!
//! Callbacks run on the thread that invokes them. The host tells the engine
//! which kind of thread that is (audio, message) so the right watchdog
//! budget applies and non-realtime-safe work is refused on the audio thread.
//! Asynchronous broadcaster messages and delayed calls run on a single
//! script pool thread.
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG parser and AST types
//! - **[`runner`]** - Everything that runs a script
//!   - **[`runner::processor`]** - Compile lock, callbacks, threads, console
//!   - **[`runner::eval`]** - Tree-walking evaluator
//!   - **[`runner::ds`]** - Values, scopes, realms, heap and cycle checker
//!   - **[`runner::plugin`]** - Native object model, registry, configuration
//!   - **[`runner::std_lib`]** - Standard API classes
//!   - **[`runner::broadcaster`]** - Broadcaster objects and their sources
//!   - **[`runner::host`]** - Components, modules and MIDI events

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
