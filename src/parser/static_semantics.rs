//! Parse-time checks and the declaration summaries the evaluator relies on.

use crate::parser::ast::{
    ExpressionType, FunctionData, FunctionKind, HasMeta, MemberExpressionType, ProgramData,
    StatementType, VariableDeclarationKind, VariableDeclarationOrExpression,
};
use crate::parser::api::ParseError;

/// Names hoisted into the enclosing function (or global) scope: `var` and `const`.
///
/// Nested function bodies are not entered; they hoist into their own scope.
pub(crate) fn collect_var_names(body: &[StatementType]) -> Vec<String> {
    let mut names = vec![];
    for stmt in body {
        collect_from_statement(stmt, &mut names);
    }
    names
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn is_hoisted(kind: VariableDeclarationKind) -> bool {
    matches!(
        kind,
        VariableDeclarationKind::Var | VariableDeclarationKind::Const
    )
}

fn collect_from_statement(stmt: &StatementType, names: &mut Vec<String>) {
    match stmt {
        StatementType::VariableDeclaration(decl) if is_hoisted(decl.kind) => {
            for d in &decl.declarations {
                push_unique(names, &d.id.name);
            }
        }
        StatementType::BlockStatement(block) => {
            for s in &block.body {
                collect_from_statement(s, names);
            }
        }
        StatementType::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_from_statement(consequent, names);
            if let Some(alt) = alternate {
                collect_from_statement(alt, names);
            }
        }
        StatementType::WhileStatement { body, .. } | StatementType::DoWhileStatement { body, .. } => {
            collect_from_statement(body, names)
        }
        StatementType::ForStatement { init, body, .. } => {
            if let Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) = init {
                if is_hoisted(decl.kind) {
                    for d in &decl.declarations {
                        push_unique(names, &d.id.name);
                    }
                }
            }
            collect_from_statement(body, names);
        }
        StatementType::ForInStatement(data) => {
            if data.kind == Some(VariableDeclarationKind::Var) {
                push_unique(names, &data.left.name);
            }
            collect_from_statement(&data.body, names);
        }
        StatementType::SwitchStatement { cases, .. } => {
            for case in cases {
                for s in &case.consequent {
                    collect_from_statement(s, names);
                }
            }
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            for s in &block.body {
                collect_from_statement(s, names);
            }
            if let Some(h) = handler {
                for s in &h.body.body {
                    collect_from_statement(s, names);
                }
            }
            if let Some(f) = finalizer {
                for s in &f.body {
                    collect_from_statement(s, names);
                }
            }
        }
        _ => {}
    }
}

/// Whether a block's own statements declare `local` bindings.
pub(crate) fn block_declares_locals(body: &[StatementType]) -> bool {
    body.iter().any(|s| match s {
        StatementType::VariableDeclaration(decl) => decl.kind == VariableDeclarationKind::Local,
        StatementType::ForInStatement(data) => data.kind == Some(VariableDeclarationKind::Local),
        StatementType::ForStatement {
            init: Some(VariableDeclarationOrExpression::VariableDeclaration(decl)),
            ..
        } => decl.kind == VariableDeclarationKind::Local,
        _ => false,
    })
}

#[derive(Clone, Copy)]
struct Context {
    in_function: bool,
    in_inline_function: bool,
    at_top_level: bool,
    loop_depth: usize,
    switch_depth: usize,
}

impl Context {
    fn program() -> Self {
        Context {
            in_function: false,
            in_inline_function: false,
            at_top_level: true,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    fn enter_function(&self, function: &FunctionData) -> Self {
        Context {
            in_function: true,
            in_inline_function: function.kind == FunctionKind::Inline,
            at_top_level: false,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    fn nested(&self) -> Self {
        Context {
            at_top_level: false,
            ..*self
        }
    }

    fn in_loop(&self) -> Self {
        Context {
            loop_depth: self.loop_depth + 1,
            ..self.nested()
        }
    }

    fn in_switch(&self) -> Self {
        Context {
            switch_depth: self.switch_depth + 1,
            ..self.nested()
        }
    }
}

/// Rejects programs that are well-formed syntactically but cannot run.
pub(crate) fn validate_program(program: &ProgramData) -> Result<(), ParseError> {
    let ctx = Context::program();
    for stmt in &program.body {
        validate_statement(stmt, ctx)?;
    }
    Ok(())
}

fn validate_declaration_kind(
    kind: VariableDeclarationKind,
    stmt: &StatementType,
    ctx: Context,
) -> Result<(), ParseError> {
    let meta = stmt.get_meta();
    match kind {
        VariableDeclarationKind::Local if !ctx.in_function => Err(ParseError::at(
            meta,
            "Cannot define local variables outside of functions",
        )),
        VariableDeclarationKind::Var if ctx.in_inline_function => Err(ParseError::at(
            meta,
            "Can't declare var statement in inline function",
        )),
        VariableDeclarationKind::Register if ctx.in_function => Err(ParseError::at(
            meta,
            "reg variables must be declared outside of functions",
        )),
        _ => Ok(()),
    }
}

fn validate_statement(stmt: &StatementType, ctx: Context) -> Result<(), ParseError> {
    match stmt {
        StatementType::EmptyStatement { .. } => Ok(()),
        StatementType::ExpressionStatement { expression, .. } => validate_expression(expression, ctx),
        StatementType::BlockStatement(block) => {
            let inner = ctx.nested();
            for s in &block.body {
                validate_statement(s, inner)?;
            }
            Ok(())
        }
        StatementType::VariableDeclaration(decl) => {
            validate_declaration_kind(decl.kind, stmt, ctx)?;
            for d in &decl.declarations {
                if let Some(init) = &d.init {
                    validate_expression(init, ctx)?;
                }
            }
            Ok(())
        }
        StatementType::FunctionDeclaration(function) => {
            if function.kind == FunctionKind::Inline && !ctx.at_top_level {
                return Err(ParseError::at(
                    &function.meta,
                    "inline functions must be declared at the top level",
                ));
            }
            validate_function(function, ctx)
        }
        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            validate_expression(test, ctx)?;
            validate_statement(consequent, ctx.nested())?;
            if let Some(alt) = alternate {
                validate_statement(alt, ctx.nested())?;
            }
            Ok(())
        }
        StatementType::WhileStatement { test, body, .. }
        | StatementType::DoWhileStatement { test, body, .. } => {
            validate_expression(test, ctx)?;
            validate_statement(body, ctx.in_loop())
        }
        StatementType::ForStatement {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
                    validate_declaration_kind(decl.kind, stmt, ctx)?;
                    for d in &decl.declarations {
                        if let Some(e) = &d.init {
                            validate_expression(e, ctx)?;
                        }
                    }
                }
                Some(VariableDeclarationOrExpression::Expression(e)) => validate_expression(e, ctx)?,
                None => {}
            }
            if let Some(t) = test {
                validate_expression(t, ctx)?;
            }
            if let Some(u) = update {
                validate_expression(u, ctx)?;
            }
            validate_statement(body, ctx.in_loop())
        }
        StatementType::ForInStatement(data) => {
            if let Some(kind) = data.kind {
                validate_declaration_kind(kind, stmt, ctx)?;
            }
            validate_expression(&data.right, ctx)?;
            validate_statement(&data.body, ctx.in_loop())
        }
        StatementType::SwitchStatement {
            discriminant,
            cases,
            ..
        } => {
            validate_expression(discriminant, ctx)?;
            let inner = ctx.in_switch();
            for case in cases {
                if let Some(t) = &case.test {
                    validate_expression(t, ctx)?;
                }
                for s in &case.consequent {
                    validate_statement(s, inner)?;
                }
            }
            Ok(())
        }
        StatementType::BreakStatement { meta } => {
            if ctx.loop_depth == 0 && ctx.switch_depth == 0 {
                Err(ParseError::at(meta, "break statement outside of a loop or switch"))
            } else {
                Ok(())
            }
        }
        StatementType::ContinueStatement { meta } => {
            if ctx.loop_depth == 0 {
                Err(ParseError::at(meta, "continue statement outside of a loop"))
            } else {
                Ok(())
            }
        }
        StatementType::ReturnStatement { meta, argument } => {
            if !ctx.in_function {
                return Err(ParseError::at(meta, "return statement outside of a function"));
            }
            match argument {
                Some(a) => validate_expression(a, ctx),
                None => Ok(()),
            }
        }
        StatementType::ThrowStatement { argument, .. } => validate_expression(argument, ctx),
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            let inner = ctx.nested();
            for s in &block.body {
                validate_statement(s, inner)?;
            }
            if let Some(h) = handler {
                for s in &h.body.body {
                    validate_statement(s, inner)?;
                }
            }
            if let Some(f) = finalizer {
                for s in &f.body {
                    validate_statement(s, inner)?;
                }
            }
            Ok(())
        }
    }
}

fn validate_function(function: &FunctionData, ctx: Context) -> Result<(), ParseError> {
    let inner = ctx.enter_function(function);
    for s in &function.body.body {
        validate_statement(s, inner)?;
    }
    Ok(())
}

fn validate_expression(expr: &ExpressionType, ctx: Context) -> Result<(), ParseError> {
    match expr {
        ExpressionType::Literal(_) | ExpressionType::Identifier(_) | ExpressionType::ThisExpression { .. } => {
            Ok(())
        }
        ExpressionType::FunctionExpression(function) => validate_function(function, ctx),
        ExpressionType::ArrayExpression { elements, .. } => {
            for e in elements {
                validate_expression(e, ctx)?;
            }
            Ok(())
        }
        ExpressionType::ObjectExpression { properties, .. } => {
            for p in properties {
                validate_expression(&p.value, ctx)?;
            }
            Ok(())
        }
        ExpressionType::UnaryExpression { argument, .. }
        | ExpressionType::UpdateExpression { argument, .. } => validate_expression(argument, ctx),
        ExpressionType::BinaryExpression { left, right, .. }
        | ExpressionType::AssignmentExpression { left, right, .. }
        | ExpressionType::LogicalExpression { left, right, .. } => {
            validate_expression(left, ctx)?;
            validate_expression(right, ctx)
        }
        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            validate_expression(test, ctx)?;
            validate_expression(consequent, ctx)?;
            validate_expression(alternate, ctx)
        }
        ExpressionType::CallExpression {
            callee, arguments, ..
        }
        | ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            validate_expression(callee, ctx)?;
            for a in arguments {
                validate_expression(a, ctx)?;
            }
            Ok(())
        }
        ExpressionType::MemberExpression(member) => match member {
            MemberExpressionType::SimpleMemberExpression { object, .. } => {
                validate_expression(object, ctx)
            }
            MemberExpressionType::ComputedMemberExpression {
                object, property, ..
            } => {
                validate_expression(object, ctx)?;
                validate_expression(property, ctx)
            }
        },
    }
}
