//! Statement execution.
//!
//! Statements produce a [`Completion`]. `Return` unwinds to the function
//! boundary, `Break` and `Continue` to the nearest loop or switch. Errors pick
//! up the position of the innermost statement they pass through.

use std::sync::Arc;

use crate::parser::ast::{
    BlockStatementData, CatchClauseData, ExpressionType, ForIteratorData, FunctionBodyData,
    FunctionData, HasMeta, ProgramData, StatementType, SwitchCaseData, VariableDeclarationData,
    VariableDeclarationKind, VariableDeclarationOrExpression,
};
use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::test_and_comparison::strict_equals;
use crate::runner::ds::scope::{BindingKind, ScopeKind, MAX_REGISTERS};
use crate::runner::ds::value::{DynamicValue, ObjectRef};
use crate::runner::plugin::types::EvalContext;

use super::expression::{assign_identifier, evaluate_expression};
use super::types::{Completion, CompletionType, EvalResult};

/// Runs a whole program at the context's current scope, which is expected to
/// be the global scope. Returns the value of the last expression statement.
pub fn execute_program(program: &ProgramData, ctx: &mut EvalContext) -> EvalResult {
    for name in program.var_names.iter() {
        ctx.scope.declare(name, DynamicValue::Undefined, BindingKind::Hoisted)?;
    }
    hoist_function_declarations(&program.body, ctx)?;
    execute_statement_list(&program.body, ctx)
}

/// Runs a function body in the already prepared function scope.
pub fn execute_function_body(body: &FunctionBodyData, ctx: &mut EvalContext) -> EvalResult {
    hoist_function_declarations(&body.body, ctx)?;
    execute_statement_list(&body.body, ctx)
}

fn hoist_function_declarations(body: &[StatementType], ctx: &mut EvalContext) -> Result<(), ScriptError> {
    for stmt in body {
        if let StatementType::FunctionDeclaration(data) = stmt {
            declare_function(data, ctx).map_err(|e| e.with_location(&data.meta))?;
        }
    }
    Ok(())
}

fn declare_function(data: &Arc<FunctionData>, ctx: &mut EvalContext) -> Result<(), ScriptError> {
    let function = ctx.new_function(data.clone(), None)?;
    let name = data.name().to_string();
    let scope = ctx.scope.variable_scope();
    scope.declare(&name, function, BindingKind::Var)
}

fn execute_statement_list(body: &[StatementType], ctx: &mut EvalContext) -> EvalResult {
    let mut last_value = None;
    for stmt in body {
        let completion = execute_statement(stmt, ctx)?;
        if completion.is_abrupt() {
            return Ok(completion.update_empty(last_value));
        }
        if completion.value.is_some() {
            last_value = completion.value;
        }
    }
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: last_value,
    })
}

/// Execute a statement and return its completion.
pub fn execute_statement(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    execute_statement_inner(stmt, ctx).map_err(|e| e.with_location(stmt.get_meta()))
}

fn execute_statement_inner(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    match stmt {
        StatementType::EmptyStatement { .. } => Ok(Completion::normal()),

        StatementType::ExpressionStatement { expression, .. } => {
            let value = evaluate_expression(expression, ctx)?;
            Ok(Completion::normal_with_value(value))
        }

        StatementType::BlockStatement(block) => execute_block_statement(block, ctx),

        StatementType::VariableDeclaration(decl) => {
            execute_variable_declaration(decl, ctx)?;
            Ok(Completion::normal())
        }

        // Hoisted when the enclosing body started.
        StatementType::FunctionDeclaration(_) => Ok(Completion::normal()),

        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            if evaluate_expression(test, ctx)?.is_truthy() {
                execute_statement(consequent, ctx)
            } else if let Some(alternate) = alternate {
                execute_statement(alternate, ctx)
            } else {
                Ok(Completion::normal())
            }
        }

        StatementType::WhileStatement { test, body, .. } => execute_while_statement(test, body, ctx),

        StatementType::DoWhileStatement { test, body, .. } => {
            execute_do_while_statement(body, test, ctx)
        }

        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => {
            let needs_scope = matches!(
                init,
                Some(VariableDeclarationOrExpression::VariableDeclaration(d))
                    if d.kind == VariableDeclarationKind::Local
            );
            if needs_scope {
                ctx.with_child_scope(ScopeKind::Block, |ctx| {
                    execute_for_statement(init.as_ref(), test.as_ref(), update.as_ref(), body, ctx)
                })
            } else {
                execute_for_statement(init.as_ref(), test.as_ref(), update.as_ref(), body, ctx)
            }
        }

        StatementType::ForInStatement(data) => {
            if data.kind == Some(VariableDeclarationKind::Local) {
                ctx.with_child_scope(ScopeKind::Block, |ctx| execute_for_in_statement(data, ctx))
            } else {
                execute_for_in_statement(data, ctx)
            }
        }

        StatementType::SwitchStatement {
            discriminant,
            cases,
            ..
        } => execute_switch_statement(discriminant, cases, ctx),

        StatementType::BreakStatement { .. } => Ok(Completion::break_completion()),

        StatementType::ContinueStatement { .. } => Ok(Completion::continue_completion()),

        StatementType::ReturnStatement { argument, .. } => {
            let value = match argument {
                Some(arg) => evaluate_expression(arg, ctx)?,
                None => DynamicValue::Undefined,
            };
            Ok(Completion::return_value(value))
        }

        StatementType::ThrowStatement { argument, .. } => {
            let value = evaluate_expression(argument, ctx)?;
            Err(ScriptError::thrown(value))
        }

        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => execute_try_statement(block, handler.as_ref(), finalizer.as_ref(), ctx),
    }
}

fn execute_block_statement(block: &BlockStatementData, ctx: &mut EvalContext) -> EvalResult {
    if block.declares_locals {
        ctx.with_child_scope(ScopeKind::Block, |ctx| execute_statement_list(&block.body, ctx))
    } else {
        execute_statement_list(&block.body, ctx)
    }
}

fn execute_variable_declaration(decl: &VariableDeclarationData, ctx: &mut EvalContext) -> Result<(), ScriptError> {
    for declarator in decl.declarations.iter() {
        let name = declarator.id.name.as_str();
        let value = match &declarator.init {
            Some(init) => Some(evaluate_expression(init, ctx)?),
            None => None,
        };
        match decl.kind {
            VariableDeclarationKind::Var => {
                let scope = ctx.scope.variable_scope();
                match value {
                    Some(v) => scope.declare(name, v, BindingKind::Var)?,
                    None => scope.declare(name, DynamicValue::Undefined, BindingKind::Hoisted)?,
                }
            }
            VariableDeclarationKind::Const => {
                let scope = ctx.scope.variable_scope();
                scope.declare(name, value.unwrap_or_default(), BindingKind::Const)?;
            }
            VariableDeclarationKind::Local => {
                ctx.scope
                    .declare(name, value.unwrap_or_default(), BindingKind::Local)?;
            }
            VariableDeclarationKind::Register => {
                let global = ctx.realm.global_scope().clone();
                if !global.has_own_binding(name) && global.count_of_kind(BindingKind::Register) >= MAX_REGISTERS {
                    return Err(ScriptError::usage(format!(
                        "You can't declare more than {} register variables",
                        MAX_REGISTERS
                    )));
                }
                global.declare(name, value.unwrap_or_default(), BindingKind::Register)?;
            }
        }
    }
    Ok(())
}

/// Folds a loop body's completion into the loop: `Some` ends the loop with
/// that completion.
fn loop_body_outcome(completion: Completion) -> Option<Completion> {
    match completion.completion_type {
        CompletionType::Break => Some(Completion::normal()),
        CompletionType::Return => Some(completion),
        CompletionType::Continue | CompletionType::Normal => None,
    }
}

fn execute_while_statement(test: &ExpressionType, body: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    loop {
        ctx.check_timeout()?;
        if !evaluate_expression(test, ctx)?.is_truthy() {
            return Ok(Completion::normal());
        }
        if let Some(done) = loop_body_outcome(execute_statement(body, ctx)?) {
            return Ok(done);
        }
    }
}

fn execute_do_while_statement(body: &StatementType, test: &ExpressionType, ctx: &mut EvalContext) -> EvalResult {
    loop {
        ctx.check_timeout()?;
        if let Some(done) = loop_body_outcome(execute_statement(body, ctx)?) {
            return Ok(done);
        }
        if !evaluate_expression(test, ctx)?.is_truthy() {
            return Ok(Completion::normal());
        }
    }
}

fn execute_for_statement(
    init: Option<&VariableDeclarationOrExpression>,
    test: Option<&ExpressionType>,
    update: Option<&ExpressionType>,
    body: &StatementType,
    ctx: &mut EvalContext,
) -> EvalResult {
    match init {
        Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
            execute_variable_declaration(decl, ctx)?;
        }
        Some(VariableDeclarationOrExpression::Expression(expr)) => {
            evaluate_expression(expr, ctx)?;
        }
        None => {}
    }
    loop {
        ctx.check_timeout()?;
        if let Some(test) = test {
            if !evaluate_expression(test, ctx)?.is_truthy() {
                return Ok(Completion::normal());
            }
        }
        if let Some(done) = loop_body_outcome(execute_statement(body, ctx)?) {
            return Ok(done);
        }
        if let Some(update) = update {
            evaluate_expression(update, ctx)?;
        }
    }
}

fn bind_loop_variable(data: &ForIteratorData, value: DynamicValue, ctx: &mut EvalContext) -> Result<(), ScriptError> {
    let name = data.left.name.as_str();
    match data.kind {
        Some(VariableDeclarationKind::Var) => ctx.scope.variable_scope().declare(name, value, BindingKind::Var),
        Some(VariableDeclarationKind::Local) => ctx.scope.declare(name, value, BindingKind::Local),
        Some(other) => Err(ScriptError::type_error(format!(
            "Can't use {} as a loop variable",
            other.as_str()
        ))),
        None => assign_identifier(ctx, name, value),
    }
}

/// `for (x in c)`: array and buffer values, or object keys in insertion order.
fn execute_for_in_statement(data: &ForIteratorData, ctx: &mut EvalContext) -> EvalResult {
    let collection = evaluate_expression(&data.right, ctx)?;
    let items: Vec<DynamicValue> = match &collection {
        DynamicValue::Array(a) => a.to_vec(),
        DynamicValue::Buffer(b) => b.to_vec().into_iter().map(|s| DynamicValue::Double(s as f64)).collect(),
        DynamicValue::Object(ObjectRef::Script(o)) => o.keys().into_iter().map(DynamicValue::String).collect(),
        DynamicValue::Object(ObjectRef::Native(n)) => match n.as_debuggable() {
            Some(d) => d
                .debug_entries()
                .into_iter()
                .map(|(k, _)| DynamicValue::String(k))
                .collect(),
            None => vec![],
        },
        other => {
            return Err(ScriptError::type_error(format!(
                "Can't iterate over {}",
                other.kind_name()
            )))
        }
    };
    for item in items {
        ctx.check_timeout()?;
        bind_loop_variable(data, item, ctx)?;
        if let Some(done) = loop_body_outcome(execute_statement(&data.body, ctx)?) {
            return Ok(done);
        }
    }
    Ok(Completion::normal())
}

fn execute_switch_statement(
    discriminant: &ExpressionType,
    cases: &[SwitchCaseData],
    ctx: &mut EvalContext,
) -> EvalResult {
    let value = evaluate_expression(discriminant, ctx)?;
    let mut start = None;
    for (index, case) in cases.iter().enumerate() {
        if let Some(test) = &case.test {
            if strict_equals(&value, &evaluate_expression(test, ctx)?) {
                start = Some(index);
                break;
            }
        }
    }
    let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
        Some(s) => s,
        None => return Ok(Completion::normal()),
    };
    for case in &cases[start..] {
        let completion = execute_statement_list(&case.consequent, ctx)?;
        match completion.completion_type {
            CompletionType::Normal => {}
            CompletionType::Break => return Ok(Completion::normal()),
            CompletionType::Continue | CompletionType::Return => return Ok(completion),
        }
    }
    Ok(Completion::normal())
}

fn execute_catch_clause(handler: &CatchClauseData, error: &ScriptError, ctx: &mut EvalContext) -> EvalResult {
    let caught = error.to_caught_value();
    ctx.with_child_scope(ScopeKind::Block, |ctx| {
        ctx.scope.declare(&handler.param.name, caught, BindingKind::Local)?;
        execute_statement_list(&handler.body.body, ctx)
    })
}

fn execute_try_statement(
    block: &BlockStatementData,
    handler: Option<&CatchClauseData>,
    finalizer: Option<&BlockStatementData>,
    ctx: &mut EvalContext,
) -> EvalResult {
    let result = match (execute_block_statement(block, ctx), handler) {
        (Err(e), Some(handler)) if e.is_catchable() => execute_catch_clause(handler, &e, ctx),
        (other, _) => other,
    };
    // The watchdog abort bypasses `finally` as well.
    if let Err(e) = &result {
        if e.is_timeout() {
            return result;
        }
    }
    if let Some(finalizer) = finalizer {
        let completion = execute_block_statement(finalizer, ctx)?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::ds::realm::ScriptRealm;
    use std::time::{Duration, Instant};

    fn run_with_budget(code: &str, budget: Option<Duration>) -> Result<DynamicValue, ScriptError> {
        let program = HiseParser::parse_to_ast_from_str(code)?;
        let mut ctx = EvalContext::new(ScriptRealm::standalone(), budget);
        Ok(execute_program(&program, &mut ctx)?.get_value())
    }

    fn run(code: &str) -> DynamicValue {
        run_with_budget(code, None).unwrap()
    }

    #[test]
    fn test_loops_with_break_and_continue() {
        assert_eq!(
            run("var s = 0; for (var i = 0; i < 10; i++) { if (i == 5) break; if (i % 2) continue; s += i; } s;"),
            DynamicValue::Int(6)
        );
        assert_eq!(run("var n = 0; do { n++; } while (n < 3); n;"), DynamicValue::Int(3));
    }

    #[test]
    fn test_for_in_iterates_array_values_and_object_keys() {
        assert_eq!(run("var s = 0; for (x in [1, 2, 3]) s += x; s;"), DynamicValue::Int(6));
        assert_eq!(run("var k = ''; for (key in {b: 1, a: 2}) k += key; k;"), DynamicValue::from("ba"));
    }

    #[test]
    fn test_switch_falls_through_until_break() {
        let code = "var r = ''; switch (2) { case 1: r += 'a'; case 2: r += 'b'; case 3: r += 'c'; break; default: r += 'd'; } r;";
        assert_eq!(run(code), DynamicValue::from("bc"));
        assert_eq!(run("var r = 0; switch (9) { case 1: r = 1; break; default: r = 2; } r;"), DynamicValue::Int(2));
        assert_eq!(run("var r = 0; switch (1.0) { case 1: r = 1; } r;"), DynamicValue::Int(1));
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(
            run("var r = ''; try { throw 'x'; } catch (e) { r = e; } finally { r += '!'; } r;"),
            DynamicValue::from("x!")
        );
        assert_eq!(
            run("var r; try { var a = undefinedThing; } catch (e) { r = e; } r;"),
            DynamicValue::from("Unknown identifier undefinedThing")
        );
    }

    #[test]
    fn test_local_is_block_scoped() {
        assert_eq!(
            run("function f() { local a = 1; { local a = 2; } return a; } f();"),
            DynamicValue::Int(1)
        );
    }

    #[test]
    fn test_const_cannot_be_reassigned() {
        let err = run_with_budget("const var c = 1; c = 2;", None).unwrap_err();
        assert_eq!(err.to_string(), "Can't modify const variable c");
        assert_eq!(err.location().map(|l| l.line), Some(1));
    }

    #[test]
    fn test_redeclaring_with_other_kind_fails() {
        let err = run_with_budget("var x = 1; reg x = 2;", None).unwrap_err();
        assert_eq!(err.to_string(), "Identifier x is already defined as variable");
    }

    #[test]
    fn test_register_limit() {
        let mut code = String::new();
        for i in 0..=MAX_REGISTERS {
            code.push_str(&format!("reg r{} = {};\n", i, i));
        }
        let err = run_with_budget(&code, None).unwrap_err();
        assert!(matches!(err, ScriptError::Usage { .. }));
    }

    #[test]
    fn test_infinite_loop_times_out_and_skips_catch() {
        let start = Instant::now();
        let err = run_with_budget(
            "var caught = false; try { while (true) {} } catch (e) { caught = true; }",
            Some(Duration::from_millis(10)),
        )
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_array_auto_extension() {
        assert_eq!(
            run("var a = [1, 2]; a[a.length + 5] = 9; a.length;"),
            DynamicValue::Int(8)
        );
        assert_eq!(run("var a = []; a[3] = 1; typeof a[1];"), DynamicValue::from("undefined"));
    }

    #[test]
    fn test_closure_counter() {
        assert_eq!(
            run("function make() { var x = 0; return { inc: function() { x += 1; return x; } }; } var c = make(); c.inc(); c.inc();"),
            DynamicValue::Int(2)
        );
    }
}
