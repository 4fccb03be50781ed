//! Structural check for code that may run on the audio thread.
//!
//! A function passes if it is declared `inline` and its body contains no
//! expression that allocates script heap: array and object literals, nested
//! functions and `new`. Calls to named functions are resolved in the global
//! scope when the check runs: the callee must be an inline function that
//! passes too, or a native method flagged realtime safe. The check only reads
//! the AST and never runs the code.

use std::sync::Arc;

use crate::parser::ast::{
    ExpressionType, FunctionData, MemberExpressionType, StatementType,
    VariableDeclarationOrExpression,
};
use crate::runner::ds::realm::ScriptRealm;
use crate::runner::ds::value::{DynamicValue, ObjectRef};
use crate::runner::plugin::types::{downcast_native, BoundNativeMethod};

/// Whether `value` may be called from a realtime broadcaster target.
pub fn is_realtime_safe(realm: &ScriptRealm, value: &DynamicValue) -> bool {
    match value {
        DynamicValue::Function(f) => is_realtime_safe_function(realm, &f.data),
        DynamicValue::Object(ObjectRef::Native(n)) => match downcast_native::<BoundNativeMethod>(value) {
            Some(_) => native_method_is_safe(value),
            None => n.as_callable().is_none(),
        },
        _ => true,
    }
}

pub fn is_realtime_safe_function(realm: &ScriptRealm, data: &Arc<FunctionData>) -> bool {
    RealtimeCheck {
        realm,
        visited: vec![],
        params: vec![],
    }
    .function_is_safe(data)
}

fn native_method_is_safe(value: &DynamicValue) -> bool {
    downcast_native::<BoundNativeMethod>(value)
        .and_then(|bound| bound.receiver.binding().find_method(bound.method_name).map(|m| m.realtime_safe))
        .unwrap_or(false)
}

struct RealtimeCheck<'a> {
    realm: &'a ScriptRealm,
    /// Functions already checked or being checked, so recursion terminates.
    visited: Vec<*const FunctionData>,
    /// Parameter names of the function whose body is being walked.
    params: Vec<String>,
}

impl<'a> RealtimeCheck<'a> {
    fn function_is_safe(&mut self, data: &Arc<FunctionData>) -> bool {
        if !data.is_inline() {
            return false;
        }
        let ptr = Arc::as_ptr(data);
        if self.visited.contains(&ptr) {
            return true;
        }
        self.visited.push(ptr);
        let params = data.params.iter().map(|p| p.name.clone()).collect();
        let outer = std::mem::replace(&mut self.params, params);
        let safe = data.body.body.iter().all(|s| self.statement_is_safe(s));
        self.params = outer;
        safe
    }

    /// A called name must resolve to something known to be safe. Parameters
    /// and unknown names can't be checked and fail.
    fn callee_is_safe(&mut self, callee: &ExpressionType) -> bool {
        let name = match callee {
            ExpressionType::Identifier(id) => &id.name,
            other => return self.expression_is_safe(other),
        };
        if self.params.iter().any(|p| p == name) {
            return false;
        }
        match self.realm.global_scope().lookup(name) {
            Some(DynamicValue::Function(f)) => self.function_is_safe(&f.data),
            Some(value @ DynamicValue::Object(ObjectRef::Native(_))) => native_method_is_safe(&value),
            _ => false,
        }
    }

    fn statement_is_safe(&mut self, stmt: &StatementType) -> bool {
        match stmt {
            StatementType::EmptyStatement { .. }
            | StatementType::BreakStatement { .. }
            | StatementType::ContinueStatement { .. } => true,
            StatementType::ExpressionStatement { expression, .. } => self.expression_is_safe(expression),
            StatementType::ThrowStatement { argument, .. } => self.expression_is_safe(argument),
            StatementType::ReturnStatement { argument, .. } => argument.iter().all(|e| self.expression_is_safe(e)),
            StatementType::BlockStatement(block) => block.body.iter().all(|s| self.statement_is_safe(s)),
            StatementType::VariableDeclaration(decl) => decl
                .declarations
                .iter()
                .all(|d| d.init.iter().all(|e| self.expression_is_safe(e))),
            StatementType::FunctionDeclaration(_) => false,
            StatementType::IfStatement {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.expression_is_safe(test)
                    && self.statement_is_safe(consequent)
                    && alternate.iter().all(|a| self.statement_is_safe(a))
            }
            StatementType::WhileStatement { test, body, .. }
            | StatementType::DoWhileStatement { test, body, .. } => {
                self.expression_is_safe(test) && self.statement_is_safe(body)
            }
            StatementType::ForStatement {
                init,
                test,
                update,
                body,
                ..
            } => {
                let init_safe = match init {
                    Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => decl
                        .declarations
                        .iter()
                        .all(|d| d.init.iter().all(|e| self.expression_is_safe(e))),
                    Some(VariableDeclarationOrExpression::Expression(e)) => self.expression_is_safe(e),
                    None => true,
                };
                init_safe
                    && test.iter().all(|e| self.expression_is_safe(e))
                    && update.iter().all(|e| self.expression_is_safe(e))
                    && self.statement_is_safe(body)
            }
            StatementType::ForInStatement(data) => {
                self.expression_is_safe(&data.right) && self.statement_is_safe(&data.body)
            }
            StatementType::SwitchStatement {
                discriminant,
                cases,
                ..
            } => {
                self.expression_is_safe(discriminant)
                    && cases.iter().all(|c| {
                        c.test.iter().all(|e| self.expression_is_safe(e)) && c.consequent.iter().all(|s| self.statement_is_safe(s))
                    })
            }
            StatementType::TryStatement {
                block,
                handler,
                finalizer,
                ..
            } => {
                block.body.iter().all(|s| self.statement_is_safe(s))
                    && handler.iter().all(|h| h.body.body.iter().all(|s| self.statement_is_safe(s)))
                    && finalizer.iter().all(|f| f.body.iter().all(|s| self.statement_is_safe(s)))
            }
        }
    }

    fn expression_is_safe(&mut self, expr: &ExpressionType) -> bool {
        match expr {
            ExpressionType::Literal(_)
            | ExpressionType::Identifier(_)
            | ExpressionType::ThisExpression { .. } => true,
            ExpressionType::ArrayExpression { .. }
            | ExpressionType::ObjectExpression { .. }
            | ExpressionType::FunctionExpression(_)
            | ExpressionType::NewExpression { .. } => false,
            ExpressionType::UnaryExpression { argument, .. }
            | ExpressionType::UpdateExpression { argument, .. } => self.expression_is_safe(argument),
            ExpressionType::BinaryExpression { left, right, .. }
            | ExpressionType::AssignmentExpression { left, right, .. }
            | ExpressionType::LogicalExpression { left, right, .. } => {
                self.expression_is_safe(left) && self.expression_is_safe(right)
            }
            ExpressionType::ConditionalExpression {
                test,
                consequent,
                alternate,
                ..
            } => self.expression_is_safe(test) && self.expression_is_safe(consequent) && self.expression_is_safe(alternate),
            ExpressionType::CallExpression {
                callee, arguments, ..
            } => self.callee_is_safe(callee) && arguments.iter().all(|e| self.expression_is_safe(e)),
            ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
                object, ..
            }) => self.expression_is_safe(object),
            ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
                object,
                property,
                ..
            }) => self.expression_is_safe(object) && self.expression_is_safe(property),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::eval::statement::execute_program;
    use crate::runner::plugin::registry::ApiRegistry;
    use crate::runner::plugin::types::EvalContext;

    fn realm_with(code: &str) -> Arc<ScriptRealm> {
        let realm = ScriptRealm::standalone();
        ApiRegistry::with_standard_classes().install(&realm).unwrap();
        let program = HiseParser::parse_to_ast_from_str(code).unwrap();
        let mut ctx = EvalContext::new(realm.clone(), None);
        execute_program(&program, &mut ctx).unwrap();
        realm
    }

    fn check(code: &str, name: &str) -> bool {
        let realm = realm_with(code);
        let value = realm.global_scope().lookup(name).unwrap();
        is_realtime_safe(&realm, &value)
    }

    #[test]
    fn test_inline_function_without_allocation_is_safe() {
        assert!(check(
            "inline function f(a, b) { local x = a * 2; if (x > b) Console.print(x); }",
            "f"
        ));
    }

    #[test]
    fn test_regular_function_is_not_safe() {
        assert!(!check("function f(a) { return a; }", "f"));
    }

    #[test]
    fn test_inline_function_creating_arrays_is_not_safe() {
        assert!(!check("inline function f(a) { local x = [a]; }", "f"));
    }

    #[test]
    fn test_call_to_regular_function_is_not_safe() {
        assert!(!check(
            "inline function rt(v) { helper(v); }
             function helper(v) { return [v, { a: v }]; }",
            "rt"
        ));
    }

    #[test]
    fn test_call_to_allocating_inline_function_is_not_safe() {
        assert!(!check(
            "inline function rt(v) { return 1 + helper(v); }
             inline function helper(v) { return [v]; }",
            "rt"
        ));
    }

    #[test]
    fn test_call_to_safe_inline_function_is_safe() {
        assert!(check(
            "inline function rt(v) { return helper(v, 2); }
             inline function helper(v, k) { return v * k; }",
            "rt"
        ));
    }

    #[test]
    fn test_recursive_inline_functions_terminate() {
        assert!(check(
            "inline function even(n) { return n == 0 ? true : odd(n - 1); }
             inline function odd(n) { return n == 0 ? false : even(n - 1); }",
            "even"
        ));
    }

    #[test]
    fn test_unknown_and_parameter_callees_are_not_safe() {
        assert!(!check("inline function rt(v) { missing(v); }", "rt"));
        assert!(!check("inline function rt(f) { f(1); }", "rt"));
    }

    #[test]
    fn test_call_to_native_method_uses_its_flag() {
        let code = "const var magnitude = Math.abs;
                    const var create = Engine.createBroadcaster;
                    inline function good(v) { return magnitude(v); }
                    inline function bad(v) { create(v); }";
        assert!(check(code, "good"));
        assert!(!check(code, "bad"));
    }
}
