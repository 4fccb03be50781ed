/// Benchmark runner for the script interpreter.
///
/// Times a set of scripts through a standalone realm and through the
/// processor's callback path, then verifies the results.

extern crate hisescript;

use std::sync::Arc;
use std::time::{Duration, Instant};

use hisescript::parser::HiseParser;
use hisescript::runner::ds::realm::ScriptRealm;
use hisescript::runner::ds::value::DynamicValue;
use hisescript::runner::eval::statement::execute_program;
use hisescript::runner::plugin::registry::ApiRegistry;
use hisescript::runner::plugin::types::EvalContext;
use hisescript::runner::processor::ScriptProcessor;

fn new_realm() -> Arc<ScriptRealm> {
    let realm = ScriptRealm::standalone();
    ApiRegistry::with_standard_classes()
        .install(&realm)
        .unwrap_or_else(|e| panic!("Failed to install API classes: {}", e));
    realm
}

/// Run a benchmark in a fresh realm per iteration and return the execution time.
fn run_benchmark(name: &str, code: &str, iterations: u32) -> Duration {
    let program = HiseParser::parse_to_ast_from_str(code)
        .unwrap_or_else(|e| panic!("Failed to parse benchmark {}: {}", name, e));

    let start = Instant::now();
    for _ in 0..iterations {
        let mut ctx = EvalContext::new(new_realm(), None);
        let _ = execute_program(&program, &mut ctx);
    }
    start.elapsed()
}

/// Run a benchmark as the body of `onTimer` and return the execution time.
fn run_benchmark_callback(name: &str, code: &str, iterations: u32) -> Duration {
    let processor = ScriptProcessor::with_default_config().unwrap_or_else(|e| panic!("{}", e));
    let source = format!("function onTimer() {{ {} }}", code);
    let result = processor.compile(&source);
    if result.failed() {
        panic!("Failed to compile benchmark {}: {}", name, result.error_message());
    }

    let start = Instant::now();
    for _ in 0..iterations {
        processor.timer();
    }
    start.elapsed()
}

fn run_and_get_var(code: &str, var_name: &str) -> DynamicValue {
    let realm = new_realm();
    let program = HiseParser::parse_to_ast_from_str(code).unwrap_or_else(|e| panic!("{}", e));
    let mut ctx = EvalContext::new(realm.clone(), None);
    let _ = execute_program(&program, &mut ctx);
    realm.global_scope().lookup(var_name).unwrap_or_default()
}

// ============================================================================
// Benchmark definitions
// ============================================================================

const BENCH_FIBONACCI: &str = r#"
var n = 20;
var a = 0;
var b = 1;
for (var i = 0; i < n; i++) {
    var temp = a;
    a = b;
    b = temp + b;
}
"#;

const BENCH_LOOP_SUM: &str = r#"
var sum = 0;
for (var i = 0; i < 10000; i++) {
    sum += i;
}
"#;

const BENCH_NESTED_LOOPS: &str = r#"
var count = 0;
for (var i = 0; i < 100; i++) {
    for (var j = 0; j < 100; j++) {
        count++;
    }
}
"#;

const BENCH_BITWISE: &str = r#"
var result = 0;
for (var i = 0; i < 1000; i++) {
    result = (result ^ i) & 0xFFFF;
}
"#;

const BENCH_ARRAY_PUSH: &str = r#"
var list = [];
for (var i = 0; i < 1000; i++) {
    list.push(i * 2);
}
var total = 0;
for (v in list) total += v;
"#;

const BENCH_OBJECT_ACCESS: &str = r#"
var o = { x: 1, y: 2 };
var acc = 0;
for (var i = 0; i < 2000; i++) {
    o.x = o.y + i;
    acc += o.x;
}
"#;

const BENCH_FUNCTION_CALLS: &str = r#"
function square(x) { return x * x; }
var calls = 0;
for (var i = 0; i < 1000; i++) {
    calls += square(i) % 7;
}
"#;

const BENCH_PRIME_SIEVE: &str = r#"
var count = 0;
for (var n = 2; n < 100; n++) {
    var isPrime = true;
    for (var i = 2; i * i <= n; i++) {
        if (n % i == 0) {
            isPrime = false;
            break;
        }
    }
    if (isPrime) {
        count++;
    }
}
"#;

const BENCH_MATH: &str = r#"
var s = 0.0;
for (var i = 0; i < 1000; i++) {
    s += Math.sin(i * 0.01) * Math.range(i, 0, 500);
}
"#;

fn main() {
    println!("=======================================================");
    println!("  HiseScript Interpreter - Performance Benchmarks");
    println!("  Standalone realm vs processor callback");
    println!("=======================================================\n");

    let benchmarks: Vec<(&str, &str, u32)> = vec![
        ("Fibonacci (n=20)", BENCH_FIBONACCI, 1000),
        ("Loop Sum (10K iterations)", BENCH_LOOP_SUM, 100),
        ("Nested Loops (100x100)", BENCH_NESTED_LOOPS, 100),
        ("Bitwise Operations (1K)", BENCH_BITWISE, 500),
        ("Array Push (1K)", BENCH_ARRAY_PUSH, 200),
        ("Object Access (2K)", BENCH_OBJECT_ACCESS, 200),
        ("Function Calls (1K)", BENCH_FUNCTION_CALLS, 200),
        ("Prime Sieve (<100)", BENCH_PRIME_SIEVE, 200),
        ("Math (1K)", BENCH_MATH, 200),
    ];

    println!("{:<30} {:>14} {:>14}", "Benchmark", "Standalone", "Callback");
    println!("{}", "-".repeat(60));

    let mut total_standalone = Duration::ZERO;
    let mut total_callback = Duration::ZERO;

    for (name, code, iterations) in &benchmarks {
        let standalone = run_benchmark(name, code, *iterations);
        let callback = run_benchmark_callback(name, code, *iterations);
        total_standalone += standalone;
        total_callback += callback;
        println!("{:<30} {:>12.2?} {:>12.2?}", name, standalone, callback);
    }

    println!("{}", "-".repeat(60));
    println!("{:<30} {:>12.2?} {:>12.2?}", "TOTAL", total_standalone, total_callback);

    println!("\n=======================================================");
    println!("  Correctness Verification");
    println!("=======================================================\n");

    let verifications: Vec<(&str, &str, &str, i64)> = vec![
        ("Fibonacci", BENCH_FIBONACCI, "a", 6765),
        ("Loop Sum", BENCH_LOOP_SUM, "sum", 49995000),
        ("Nested Loops", BENCH_NESTED_LOOPS, "count", 10000),
        ("Array Push", BENCH_ARRAY_PUSH, "total", 999000),
        ("Prime Count", BENCH_PRIME_SIEVE, "count", 25),
    ];

    println!("{:<20} {:>12} {:>12}", "Test", "Expected", "Actual");
    println!("{}", "-".repeat(46));

    for (name, code, var, expected) in verifications {
        let actual = match run_and_get_var(code, var) {
            DynamicValue::Int(n) => n,
            _ => -1,
        };
        let status = if actual == expected { "ok" } else { "FAIL" };
        println!("{:<20} {:>12} {:>6} {:>5}", name, expected, actual, status);
    }
}
