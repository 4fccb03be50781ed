//! CLI wrapper for the hisescript engine.
//!
//! Usage:
//!   hisescript <file>                     # Compile a script file
//!   hisescript -e "code"                  # Compile inline code
//!   hisescript <file> --callback onTimer  # Compile, then invoke a callback
//!   hisescript                            # Start REPL (interactive mode)

use hisescript::runner::ds::value::DynamicValue;
use hisescript::runner::plugin::config::EngineConfig;
use hisescript::runner::processor::callback::Callback;
use hisescript::runner::processor::console::{ConsoleEntry, ConsoleLevel};
use hisescript::runner::processor::ScriptProcessor;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

/// How long the CLI waits for asynchronous work before exiting.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Options {
    file: Option<String>,
    code: Option<String>,
    config: Option<String>,
    callbacks: Vec<String>,
}

fn main() {
    let options = match parse_args(env::args().skip(1).collect()) {
        Some(options) => options,
        None => {
            print_usage();
            process::exit(1);
        }
    };

    let config = match &options.config {
        Some(path) => match EngineConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let processor = match ScriptProcessor::new(config) {
        Ok(processor) => processor,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let source = match (&options.file, &options.code) {
        (Some(file), None) => match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", file, e);
                process::exit(1);
            }
        },
        (None, Some(code)) => code.clone(),
        (None, None) if options.callbacks.is_empty() => {
            run_repl(&processor);
            return;
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    };

    let mut ok = processor.compile(&source).was_ok();
    if ok {
        for name in options.callbacks.iter() {
            ok &= run_callback(&processor, name);
        }
    }
    processor.wait_until_idle(IDLE_TIMEOUT);
    print_console(&processor);
    if !ok {
        process::exit(1);
    }
}

fn parse_args(args: Vec<String>) -> Option<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-e" | "--eval" => options.code = Some(args.next()?),
            "-c" | "--config" => options.config = Some(args.next()?),
            "--callback" => options.callbacks.push(args.next()?),
            _ if options.file.is_none() && !arg.starts_with('-') => options.file = Some(arg),
            _ => return None,
        }
    }
    Some(options)
}

fn print_usage() {
    eprintln!("hisescript - audio plugin scripting engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  hisescript <file>                 Compile a script file");
    eprintln!("  hisescript -e \"code\"              Compile inline code");
    eprintln!("  hisescript --eval \"code\"          Compile inline code");
    eprintln!("  --callback <name>                 Invoke a callback after compiling (repeatable)");
    eprintln!("  --config <file>                   Load engine settings from a TOML file");
    eprintln!("  hisescript                        Start REPL (interactive mode)");
}

fn run_callback(processor: &ScriptProcessor, name: &str) -> bool {
    let callback = match Callback::from_name(name) {
        Some(callback) => callback,
        None => {
            eprintln!("Unknown callback '{}'", name);
            return false;
        }
    };
    let args = vec![DynamicValue::Undefined; callback.parameter_count()];
    let outcome = processor.execute_callback(name, args, callback.default_thread());
    if outcome.was_ok() && !outcome.value.is_undefined_or_void() {
        println!("{}", outcome.value.to_display_string());
    }
    outcome.was_ok()
}

fn print_entry(entry: &ConsoleEntry) {
    match entry.level {
        ConsoleLevel::Print => println!("{}", entry.message),
        ConsoleLevel::Warning => eprintln!("Warning: {}", entry.message),
        ConsoleLevel::Error => eprintln!("Error: {}", entry.message),
    }
}

fn print_console(processor: &ScriptProcessor) {
    for entry in processor.console().take() {
        print_entry(&entry);
    }
}

fn run_repl(processor: &ScriptProcessor) {
    println!("hisescript v0.1.0");
    println!("Type script code and press Enter. Type .exit to quit.");
    println!();

    // Snippets run against the global scope of an empty script.
    processor.compile("");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }

        let input = input.trim();

        if input == ".exit" || input == ".quit" {
            break;
        }

        if input.is_empty() {
            continue;
        }

        let result = processor.evaluate(input);
        processor.wait_until_idle(IDLE_TIMEOUT);
        print_console(processor);
        match result {
            Ok(value) => {
                if !value.is_undefined_or_void() {
                    println!("{}", value.to_display_string());
                }
            }
            Err(e) => eprintln!("Error: {}", e.report()),
        }
    }

    println!("Goodbye!");
}
