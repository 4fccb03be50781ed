//! Expression evaluation.
//!
//! Every expression form of the AST evaluates to a [`DynamicValue`]. Assignment
//! targets are first turned into a [`Reference`] so compound assignment and
//! update expressions evaluate the target's base exactly once.

use std::cmp::Ordering;

use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, ExpressionType, LiteralData, LiteralType,
    LogicalOperator, MemberExpressionType, NumberLiteralType, UnaryOperator, UpdateOperator,
};
use crate::runner::ds::error::ScriptError;
use crate::runner::ds::operations::arithmetic::{apply_arithmetic, bitwise_not, negate};
use crate::runner::ds::operations::object::{
    delete_property, get_property, has_property, property_key, set_property,
};
use crate::runner::ds::operations::test_and_comparison::{compare, loose_equals, strict_equals};
use crate::runner::ds::operations::type_conversion::to_numeric;
use crate::runner::ds::scope::BindingKind;
use crate::runner::ds::value::{DynamicValue, ObjectRef, PropertyMap};
use crate::runner::plugin::types::EvalContext;

use super::function::{call_method, call_value, construct};
use super::types::{Reference, ReferenceResult, ValueResult};

/// Evaluate an expression and return its value.
pub fn evaluate_expression(expr: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match expr {
        ExpressionType::Literal(lit) => Ok(evaluate_literal(lit)),

        ExpressionType::Identifier(id) => ctx.scope.resolve(&id.name),

        ExpressionType::ThisExpression { .. } => Ok(ctx.this_value.clone()),

        ExpressionType::ArrayExpression { elements, .. } => {
            let values = evaluate_arguments(elements, ctx)?;
            ctx.new_array(values)
        }

        ExpressionType::ObjectExpression { properties, .. } => {
            let mut map = PropertyMap::new();
            for property in properties {
                let value = evaluate_expression(&property.value, ctx)?;
                map.set(&property.key, value);
            }
            ctx.new_object(map)
        }

        ExpressionType::FunctionExpression(data) => {
            let bound_this = match data.kind {
                crate::parser::ast::FunctionKind::Arrow => Some(ctx.this_value.clone()),
                _ => None,
            };
            ctx.new_function(data.clone(), bound_this)
        }

        ExpressionType::UnaryExpression {
            operator, argument, ..
        } => evaluate_unary_expression(*operator, argument, ctx),

        ExpressionType::UpdateExpression {
            operator,
            argument,
            prefix,
            ..
        } => evaluate_update_expression(*operator, argument, *prefix, ctx),

        ExpressionType::BinaryExpression {
            operator,
            left,
            right,
            ..
        } => {
            let left = evaluate_expression(left, ctx)?;
            let right = evaluate_expression(right, ctx)?;
            evaluate_binary_operation(*operator, &left, &right)
        }

        ExpressionType::LogicalExpression {
            operator,
            left,
            right,
            ..
        } => {
            let left = evaluate_expression(left, ctx)?;
            match operator {
                LogicalOperator::And if !left.is_truthy() => Ok(left),
                LogicalOperator::Or if left.is_truthy() => Ok(left),
                _ => evaluate_expression(right, ctx),
            }
        }

        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            if evaluate_expression(test, ctx)?.is_truthy() {
                evaluate_expression(consequent, ctx)
            } else {
                evaluate_expression(alternate, ctx)
            }
        }

        ExpressionType::AssignmentExpression {
            operator,
            left,
            right,
            ..
        } => evaluate_assignment_expression(*operator, left, right, ctx),

        ExpressionType::CallExpression {
            callee, arguments, ..
        } => evaluate_call_expression(callee, arguments, ctx),

        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            let callee = evaluate_expression(callee, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            construct(ctx, &callee, args)
        }

        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member_parts(member, ctx)?;
            get_property(ctx, &base, &key)
        }
    }
}

fn evaluate_literal(lit: &LiteralData) -> DynamicValue {
    match &lit.value {
        LiteralType::NullLiteral => DynamicValue::Void,
        LiteralType::UndefinedLiteral => DynamicValue::Undefined,
        LiteralType::BooleanLiteral(b) => DynamicValue::Bool(*b),
        LiteralType::StringLiteral(s) => DynamicValue::String(s.clone()),
        LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(i)) => DynamicValue::Int(*i),
        LiteralType::NumberLiteral(NumberLiteralType::FloatLiteral(f)) => DynamicValue::Double(*f),
    }
}

pub(crate) fn evaluate_arguments(
    arguments: &[ExpressionType],
    ctx: &mut EvalContext,
) -> Result<Vec<DynamicValue>, ScriptError> {
    let mut values = Vec::with_capacity(arguments.len());
    for argument in arguments {
        values.push(evaluate_expression(argument, ctx)?);
    }
    Ok(values)
}

fn evaluate_member_parts(
    member: &MemberExpressionType,
    ctx: &mut EvalContext,
) -> Result<(DynamicValue, DynamicValue), ScriptError> {
    match member {
        MemberExpressionType::SimpleMemberExpression {
            object, property, ..
        } => {
            let base = evaluate_expression(object, ctx)?;
            Ok((base, DynamicValue::String(property.name.clone())))
        }
        MemberExpressionType::ComputedMemberExpression {
            object, property, ..
        } => {
            let base = evaluate_expression(object, ctx)?;
            let key = evaluate_expression(property, ctx)?;
            Ok((base, key))
        }
    }
}

fn evaluate_reference(expr: &ExpressionType, ctx: &mut EvalContext) -> ReferenceResult {
    match expr {
        ExpressionType::Identifier(id) => Ok(Reference::Binding(id.name.clone())),
        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member_parts(member, ctx)?;
            Ok(Reference::Property { base, key })
        }
        _ => Err(ScriptError::type_error("Invalid assignment target")),
    }
}

fn get_reference_value(reference: &Reference, ctx: &mut EvalContext) -> ValueResult {
    match reference {
        Reference::Binding(name) => ctx.scope.resolve(name),
        Reference::Property { base, key } => get_property(ctx, base, key),
    }
}

fn put_reference_value(reference: &Reference, value: DynamicValue, ctx: &mut EvalContext) -> Result<(), ScriptError> {
    match reference {
        Reference::Binding(name) => assign_identifier(ctx, name, value),
        Reference::Property { base, key } => set_property(ctx, base, key, value),
    }
}

/// Assigns to an existing binding, or creates a global variable when the name
/// is not declared anywhere in the chain.
pub(crate) fn assign_identifier(ctx: &mut EvalContext, name: &str, value: DynamicValue) -> Result<(), ScriptError> {
    if ctx.scope.assign(name, value.clone())? {
        return Ok(());
    }
    ctx.realm
        .global_scope()
        .declare(name, value, BindingKind::Var)
}

fn evaluate_assignment_expression(
    operator: AssignmentOperator,
    left: &ExpressionType,
    right: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    let reference = evaluate_reference(left, ctx)?;
    let value = match operator.binary_operator() {
        None => evaluate_expression(right, ctx)?,
        Some(op) => {
            let current = get_reference_value(&reference, ctx)?;
            let rhs = evaluate_expression(right, ctx)?;
            evaluate_binary_operation(op, &current, &rhs)?
        }
    };
    put_reference_value(&reference, value.clone(), ctx)?;
    Ok(value)
}

fn evaluate_update_expression(
    operator: UpdateOperator,
    argument: &ExpressionType,
    prefix: bool,
    ctx: &mut EvalContext,
) -> ValueResult {
    let reference = evaluate_reference(argument, ctx)?;
    let old_value = DynamicValue::from(to_numeric(&get_reference_value(&reference, ctx)?));
    let op = match operator {
        UpdateOperator::PlusPlus => BinaryOperator::Add,
        UpdateOperator::MinusMinus => BinaryOperator::Subtract,
    };
    let new_value = evaluate_binary_operation(op, &old_value, &DynamicValue::Int(1))?;
    put_reference_value(&reference, new_value.clone(), ctx)?;
    Ok(if prefix { new_value } else { old_value })
}

fn evaluate_unary_expression(
    operator: UnaryOperator,
    argument: &ExpressionType,
    ctx: &mut EvalContext,
) -> ValueResult {
    match operator {
        UnaryOperator::TypeOf => {
            // An undeclared identifier is "undefined" rather than an error.
            if let ExpressionType::Identifier(id) = argument {
                return Ok(DynamicValue::from(match ctx.scope.lookup(&id.name) {
                    Some(v) => v.type_of(),
                    None => "undefined",
                }));
            }
            let value = evaluate_expression(argument, ctx)?;
            Ok(DynamicValue::from(value.type_of()))
        }
        UnaryOperator::Delete => match argument {
            ExpressionType::MemberExpression(member) => {
                let (base, key) = evaluate_member_parts(member, ctx)?;
                Ok(DynamicValue::Bool(delete_property(&base, &key)?))
            }
            _ => Ok(DynamicValue::Bool(false)),
        },
        _ => {
            let value = evaluate_expression(argument, ctx)?;
            Ok(match operator {
                UnaryOperator::Minus => negate(&value),
                UnaryOperator::Plus => DynamicValue::from(to_numeric(&value)),
                UnaryOperator::LogicalNot => DynamicValue::Bool(!value.is_truthy()),
                UnaryOperator::BitwiseNot => bitwise_not(&value),
                UnaryOperator::TypeOf | UnaryOperator::Delete => DynamicValue::Undefined,
            })
        }
    }
}

/// Applies a binary operator to two evaluated operands.
pub fn evaluate_binary_operation(op: BinaryOperator, left: &DynamicValue, right: &DynamicValue) -> ValueResult {
    let result = match op {
        BinaryOperator::LooselyEqual => DynamicValue::Bool(loose_equals(left, right)),
        BinaryOperator::LooselyUnequal => DynamicValue::Bool(!loose_equals(left, right)),
        BinaryOperator::StrictlyEqual => DynamicValue::Bool(strict_equals(left, right)),
        BinaryOperator::StrictlyUnequal => DynamicValue::Bool(!strict_equals(left, right)),
        BinaryOperator::LessThan => DynamicValue::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOperator::LessThanEqual => DynamicValue::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )),
        BinaryOperator::GreaterThan => DynamicValue::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOperator::GreaterThanEqual => DynamicValue::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        )),
        BinaryOperator::In => DynamicValue::Bool(has_property(right, left)?),
        BinaryOperator::InstanceOf => DynamicValue::Bool(instance_of(left, right)?),
        arithmetic => apply_arithmetic(arithmetic, left, right).ok_or_else(|| {
            ScriptError::type_error(format!("Unsupported operator {}", arithmetic.as_str()))
        })?,
    };
    Ok(result)
}

fn instance_of(value: &DynamicValue, class: &DynamicValue) -> Result<bool, ScriptError> {
    let class_name = match class {
        DynamicValue::Object(ObjectRef::Native(n)) => n.class_name(),
        DynamicValue::Function(_) => return Ok(false),
        other => {
            return Err(ScriptError::type_error(format!(
                "Right-hand side of 'instanceof' is not a class: {}",
                other.kind_name()
            )))
        }
    };
    Ok(match value {
        DynamicValue::Array(_) => class_name == "Array",
        DynamicValue::Buffer(_) => class_name == "Buffer",
        DynamicValue::Object(ObjectRef::Script(_)) => class_name == "Object",
        DynamicValue::Object(ObjectRef::Native(n)) => n.binding().is_a(class_name),
        _ => false,
    })
}

fn evaluate_call_expression(
    callee: &ExpressionType,
    arguments: &[ExpressionType],
    ctx: &mut EvalContext,
) -> ValueResult {
    match callee {
        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member_parts(member, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            call_method(ctx, &base, &property_key(&key), args)
        }
        ExpressionType::Identifier(id) => {
            let function = ctx.scope.lookup(&id.name).ok_or_else(|| {
                ScriptError::reference(format!("Unknown function '{}'", id.name))
            })?;
            let args = evaluate_arguments(arguments, ctx)?;
            if !function.is_callable() {
                return Err(ScriptError::type_error(format!("{} is not a function", id.name)));
            }
            call_value(ctx, &function, DynamicValue::Undefined, args)
        }
        other => {
            let function = evaluate_expression(other, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            call_value(ctx, &function, DynamicValue::Undefined, args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HiseParser;
    use crate::runner::ds::realm::ScriptRealm;
    use crate::runner::eval::statement::execute_program;

    fn eval(code: &str) -> Result<DynamicValue, ScriptError> {
        let program = HiseParser::parse_to_ast_from_str(code)?;
        let mut ctx = EvalContext::new(ScriptRealm::standalone(), None);
        Ok(execute_program(&program, &mut ctx)?.get_value())
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(eval("7 / 2;").unwrap(), DynamicValue::Double(3.5));
        assert_eq!(eval("8 / 2;").unwrap(), DynamicValue::Int(4));
        assert_eq!(eval("1 + 2 * 3;").unwrap(), DynamicValue::Int(7));
        assert_eq!(eval("'a' + 1;").unwrap(), DynamicValue::from("a1"));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(eval("var x = 0; false && (x = 1); x;").unwrap(), DynamicValue::Int(0));
        assert_eq!(eval("0 || 'b';").unwrap(), DynamicValue::from("b"));
    }

    #[test]
    fn test_compound_assignment_on_member() {
        assert_eq!(eval("var o = {a: 1}; o.a += 4; o.a;").unwrap(), DynamicValue::Int(5));
        assert_eq!(eval("var a = [1]; a[0] <<= 3; a[0];").unwrap(), DynamicValue::Int(8));
    }

    #[test]
    fn test_update_expressions() {
        assert_eq!(eval("var i = 1; var j = i++; j * 10 + i;").unwrap(), DynamicValue::Int(12));
        assert_eq!(eval("var i = 1; ++i;").unwrap(), DynamicValue::Int(2));
    }

    #[test]
    fn test_typeof_and_in() {
        assert_eq!(eval("typeof notDeclared;").unwrap(), DynamicValue::from("undefined"));
        assert_eq!(eval("typeof null;").unwrap(), DynamicValue::from("object"));
        assert_eq!(eval("'a' in {a: 1};").unwrap(), DynamicValue::Bool(true));
    }

    #[test]
    fn test_unknown_identifier_read_is_reference_error() {
        let err = eval("var y = x + 1;").unwrap_err();
        assert!(matches!(err, ScriptError::Reference { .. }));
        assert_eq!(err.to_string(), "Unknown identifier x");
    }

    #[test]
    fn test_assignment_to_undeclared_creates_global() {
        assert_eq!(eval("function f() { z = 3; } f(); z;").unwrap(), DynamicValue::Int(3));
    }

    #[test]
    fn test_arrow_function_keeps_this() {
        assert_eq!(
            eval("var o = {v: 2, f: function() { var g = () => this.v; return g(); }}; o.f();").unwrap(),
            DynamicValue::Int(2)
        );
    }

    #[test]
    fn test_new_with_script_function() {
        assert_eq!(eval("function P(x) { this.x = x; } var p = new P(3); p.x;").unwrap(), DynamicValue::Int(3));
    }
}
