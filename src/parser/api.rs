use std::sync::Arc;
use std::time::Instant;

use pest::error::{Error, ErrorVariant, LineColLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use super::ast::*;
use super::static_semantics::{block_declares_locals, collect_var_names, validate_program};
use super::util::{
    parse_float_literal, parse_hex_literal, parse_integer_literal, unescape_string, TAB_WIDTH,
};

#[derive(Parser)]
#[grammar = "parser/hise_grammar.pest"] // relative to src
pub struct HiseParser;

/// A rejected script. The whole compile fails; nothing is partially applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn at(meta: &Meta, message: impl Into<String>) -> Self {
        ParseError::new(message, meta.line, meta.column)
    }
}

impl From<Error<Rule>> for ParseError {
    fn from(e: Error<Rule>) -> Self {
        let (line, column) = match e.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        let message = match &e.variant {
            ErrorVariant::ParsingError {
                positives,
                negatives,
            } => describe_expected(positives, negatives),
            ErrorVariant::CustomError { message } => message.clone(),
        };
        ParseError::new(message, line, column)
    }
}

fn describe_expected(positives: &[Rule], negatives: &[Rule]) -> String {
    let names = |rules: &[Rule]| {
        rules
            .iter()
            .map(|r| format!("{:?}", r))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match (positives.is_empty(), negatives.is_empty()) {
        (false, true) => format!("Found unexpected token, expected {}", names(positives)),
        (true, false) => format!("Found unexpected {}", names(negatives)),
        (false, false) => format!(
            "Found unexpected {}, expected {}",
            names(negatives),
            names(positives)
        ),
        (true, true) => "Unexpected token".to_string(),
    }
}

type BuildResult<T> = Result<T, ParseError>;

lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_bit_or, Assoc::Left))
        .op(Op::infix(Rule::op_bit_xor, Assoc::Left))
        .op(Op::infix(Rule::op_bit_and, Assoc::Left))
        .op(Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left)
            | Op::infix(Rule::op_strict_eq, Assoc::Left)
            | Op::infix(Rule::op_strict_ne, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left)
            | Op::infix(Rule::op_instanceof, Assoc::Left)
            | Op::infix(Rule::op_in, Assoc::Left))
        .op(Op::infix(Rule::op_shl, Assoc::Left)
            | Op::infix(Rule::op_shr, Assoc::Left)
            | Op::infix(Rule::op_ushr, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left))
        .op(Op::prefix(Rule::op_not)
            | Op::prefix(Rule::op_bit_not)
            | Op::prefix(Rule::op_neg)
            | Op::prefix(Rule::op_plus)
            | Op::prefix(Rule::op_typeof)
            | Op::prefix(Rule::op_delete)
            | Op::prefix(Rule::op_pre_inc)
            | Op::prefix(Rule::op_pre_dec));
}

impl HiseParser {
    /// Parses a complete script (or a standalone snippet) into a checked AST.
    pub fn parse_to_ast_from_str(script: &str) -> Result<ProgramData, ParseError> {
        let start = Instant::now();
        let mut pairs = HiseParser::parse(Rule::program, script)?;
        let program_pair = pairs
            .next()
            .ok_or_else(|| ParseError::new("Empty parse result", 1, 1))?;
        let meta = meta_of(&program_pair);
        let mut body = vec![];
        for pair in program_pair.into_inner() {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            body.push(build_ast_from_statement(pair)?);
        }
        let var_names = collect_var_names(&body);
        let program = ProgramData {
            meta,
            body,
            var_names,
        };
        validate_program(&program)?;
        log::trace!(
            "parsed {} top-level statements in {}us",
            program.body.len(),
            start.elapsed().as_micros()
        );
        Ok(program)
    }

    /// Renders the raw pest token tree, used by the CLI for grammar debugging.
    pub fn parse_to_token_tree(script: &str) -> Result<String, ParseError> {
        let mut tree = vec![];
        for pair in HiseParser::parse(Rule::program, script)? {
            tree.push(pair_to_string(pair, 0).join("\n"));
        }
        Ok(tree.join("\n"))
    }
}

fn pair_to_string(pair: Pair<Rule>, level: usize) -> Vec<String> {
    let mut tree = vec![];
    let span = pair.as_span();
    tree.push(format!(
        "{}{:?} => ({},{}) #{:?}",
        " ".repeat(level * TAB_WIDTH),
        pair.as_rule(),
        span.start(),
        span.end(),
        span.as_str()
    ));
    for child_pair in pair.into_inner() {
        tree.append(pair_to_string(child_pair, level + 1).as_mut());
    }
    tree
}

fn meta_of(pair: &Pair<Rule>) -> Meta {
    let span = pair.as_span();
    let (line, column) = span.start_pos().line_col();
    Meta {
        start_index: span.start(),
        end_index: span.end(),
        line,
        column,
    }
}

fn span_meta(start: &Meta, end: &Meta) -> Meta {
    Meta {
        start_index: start.start_index,
        end_index: end.end_index,
        line: start.line,
        column: start.column,
    }
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> ParseError {
    ParseError::at(
        &meta_of(pair),
        format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id),
    )
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_var
            | Rule::kw_const
            | Rule::kw_reg
            | Rule::kw_local
            | Rule::kw_inline
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_in
            | Rule::kw_while
            | Rule::kw_do
            | Rule::kw_switch
            | Rule::kw_case
            | Rule::kw_default
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_return
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_finally
            | Rule::kw_throw
            | Rule::kw_new
    )
}

/// Inner pairs without the keyword tokens that only anchor a production.
fn significant<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn next_pair<'i, I: Iterator<Item = Pair<'i, Rule>>>(
    iter: &mut I,
    meta: &Meta,
) -> BuildResult<Pair<'i, Rule>> {
    iter.next()
        .ok_or_else(|| ParseError::at(meta, "Unexpected end of production"))
}

// ============================================================================
// Statements
// ============================================================================

fn build_ast_from_statement(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let meta = meta_of(&pair);
    match pair.as_rule() {
        Rule::block => Ok(StatementType::BlockStatement(build_ast_from_block(pair)?)),
        Rule::variable_statement => {
            let mut inner = pair.into_inner();
            let declaration = next_pair(&mut inner, &meta)?;
            Ok(StatementType::VariableDeclaration(
                build_ast_from_variable_declaration(declaration)?,
            ))
        }
        Rule::function_declaration => Ok(StatementType::FunctionDeclaration(Arc::new(
            build_ast_from_function(pair, FunctionKind::Normal)?,
        ))),
        Rule::inline_function_declaration => Ok(StatementType::FunctionDeclaration(Arc::new(
            build_ast_from_function(pair, FunctionKind::Inline)?,
        ))),
        Rule::if_statement => {
            let mut inner = significant(pair);
            let test = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            let consequent = Box::new(build_ast_from_statement(next_pair(&mut inner, &meta)?)?);
            let alternate = match inner.next() {
                Some(p) => Some(Box::new(build_ast_from_statement(p)?)),
                None => None,
            };
            Ok(StatementType::IfStatement {
                meta,
                test,
                consequent,
                alternate,
            })
        }
        Rule::for_in_statement => build_ast_from_for_in_statement(pair),
        Rule::for_statement => build_ast_from_for_statement(pair),
        Rule::while_statement => {
            let mut inner = significant(pair);
            let test = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            let body = Box::new(build_ast_from_statement(next_pair(&mut inner, &meta)?)?);
            Ok(StatementType::WhileStatement { meta, test, body })
        }
        Rule::do_while_statement => {
            let mut inner = significant(pair);
            let body = Box::new(build_ast_from_statement(next_pair(&mut inner, &meta)?)?);
            let test = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            Ok(StatementType::DoWhileStatement { meta, test, body })
        }
        Rule::switch_statement => {
            let mut inner = significant(pair);
            let discriminant = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            let mut cases = vec![];
            for case_pair in inner {
                cases.push(build_ast_from_switch_case(case_pair)?);
            }
            Ok(StatementType::SwitchStatement {
                meta,
                discriminant,
                cases,
            })
        }
        Rule::try_statement => {
            let mut block = None;
            let mut handler = None;
            let mut finalizer = None;
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::block => block = Some(build_ast_from_block(inner)?),
                    Rule::catch_clause => {
                        let clause_meta = meta_of(&inner);
                        let mut parts = significant(inner);
                        let param = build_identifier(next_pair(&mut parts, &clause_meta)?);
                        let body = build_ast_from_block(next_pair(&mut parts, &clause_meta)?)?;
                        handler = Some(CatchClauseData {
                            meta: clause_meta,
                            param,
                            body,
                        });
                    }
                    Rule::finally_clause => {
                        let clause_meta = meta_of(&inner);
                        let mut parts = significant(inner);
                        finalizer = Some(build_ast_from_block(next_pair(&mut parts, &clause_meta)?)?);
                    }
                    _ => return Err(get_unexpected_error(2, &inner)),
                }
            }
            let block = block.ok_or_else(|| ParseError::at(&meta, "try without block"))?;
            if handler.is_none() && finalizer.is_none() {
                return Err(ParseError::at(&meta, "Missing catch or finally after try"));
            }
            Ok(StatementType::TryStatement {
                meta,
                block,
                handler,
                finalizer,
            })
        }
        Rule::throw_statement => {
            let mut inner = significant(pair);
            let argument = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            Ok(StatementType::ThrowStatement { meta, argument })
        }
        Rule::return_statement => {
            let argument = match significant(pair).next() {
                Some(p) => Some(build_ast_from_expression(p)?),
                None => None,
            };
            Ok(StatementType::ReturnStatement { meta, argument })
        }
        Rule::break_statement => Ok(StatementType::BreakStatement { meta }),
        Rule::continue_statement => Ok(StatementType::ContinueStatement { meta }),
        Rule::empty_statement => Ok(StatementType::EmptyStatement { meta }),
        Rule::expression_statement => {
            let mut inner = pair.into_inner();
            let expression = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            Ok(StatementType::ExpressionStatement { meta, expression })
        }
        _ => Err(get_unexpected_error(1, &pair)),
    }
}

fn build_ast_from_block(pair: Pair<Rule>) -> BuildResult<BlockStatementData> {
    let meta = meta_of(&pair);
    let mut body = vec![];
    for inner in pair.into_inner() {
        body.push(build_ast_from_statement(inner)?);
    }
    let declares_locals = block_declares_locals(&body);
    Ok(BlockStatementData {
        meta,
        body,
        declares_locals,
    })
}

fn build_ast_from_variable_declaration(pair: Pair<Rule>) -> BuildResult<VariableDeclarationData> {
    let meta = meta_of(&pair);
    let mut inner = pair.into_inner();
    let kind_pair = next_pair(&mut inner, &meta)?;
    let kind = match kind_pair.into_inner().next().map(|p| p.as_rule()) {
        Some(Rule::kw_const) => VariableDeclarationKind::Const,
        Some(Rule::kw_var) => VariableDeclarationKind::Var,
        Some(Rule::kw_reg) => VariableDeclarationKind::Register,
        Some(Rule::kw_local) => VariableDeclarationKind::Local,
        _ => return Err(ParseError::at(&meta, "Unknown declaration kind")),
    };
    let mut declarations = vec![];
    for declarator in inner {
        let declarator_meta = meta_of(&declarator);
        let mut parts = declarator.into_inner();
        let id = build_identifier(next_pair(&mut parts, &declarator_meta)?);
        let init = match parts.next() {
            Some(p) => Some(build_ast_from_expression(p)?),
            None => None,
        };
        if kind == VariableDeclarationKind::Const && init.is_none() {
            return Err(ParseError::at(
                &declarator_meta,
                format!("const variable {} needs an initial value", id.name),
            ));
        }
        declarations.push(VariableDeclaratorData {
            meta: declarator_meta,
            id,
            init,
        });
    }
    Ok(VariableDeclarationData {
        meta,
        declarations,
        kind,
    })
}

fn build_ast_from_for_in_statement(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let meta = meta_of(&pair);
    let mut kind = None;
    let mut left = None;
    let mut right = None;
    let mut body = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::kw_var => kind = Some(VariableDeclarationKind::Var),
            Rule::kw_local => kind = Some(VariableDeclarationKind::Local),
            Rule::kw_for | Rule::kw_in => {}
            Rule::identifier if left.is_none() => left = Some(build_identifier(inner)),
            Rule::expression if right.is_none() => right = Some(build_ast_from_expression(inner)?),
            _ => body = Some(Box::new(build_ast_from_statement(inner)?)),
        }
    }
    match (left, right, body) {
        (Some(left), Some(right), Some(body)) => Ok(StatementType::ForInStatement(ForIteratorData {
            meta,
            kind,
            left,
            right,
            body,
        })),
        _ => Err(ParseError::at(&meta, "Malformed for-in statement")),
    }
}

fn build_ast_from_for_statement(pair: Pair<Rule>) -> BuildResult<StatementType> {
    let meta = meta_of(&pair);
    let mut init = None;
    let mut test = None;
    let mut update = None;
    let mut body = None;
    for inner in significant(pair) {
        let inner_meta = meta_of(&inner);
        match inner.as_rule() {
            Rule::for_init => {
                let p = next_pair(&mut inner.into_inner(), &inner_meta)?;
                init = Some(if p.as_rule() == Rule::variable_declaration {
                    VariableDeclarationOrExpression::VariableDeclaration(
                        build_ast_from_variable_declaration(p)?,
                    )
                } else {
                    VariableDeclarationOrExpression::Expression(build_ast_from_expression(p)?)
                });
            }
            Rule::for_test => {
                test = Some(build_ast_from_expression(next_pair(
                    &mut inner.into_inner(),
                    &inner_meta,
                )?)?)
            }
            Rule::for_update => {
                update = Some(build_ast_from_expression(next_pair(
                    &mut inner.into_inner(),
                    &inner_meta,
                )?)?)
            }
            _ => body = Some(Box::new(build_ast_from_statement(inner)?)),
        }
    }
    let body = body.ok_or_else(|| ParseError::at(&meta, "for statement without body"))?;
    Ok(StatementType::ForStatement {
        meta,
        init,
        test,
        update,
        body,
    })
}

fn build_ast_from_switch_case(pair: Pair<Rule>) -> BuildResult<SwitchCaseData> {
    let meta = meta_of(&pair);
    let mut test = None;
    let mut consequent = vec![];
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::kw_case | Rule::kw_default => {}
            Rule::expression if test.is_none() && consequent.is_empty() => {
                test = Some(build_ast_from_expression(inner)?)
            }
            _ => consequent.push(build_ast_from_statement(inner)?),
        }
    }
    Ok(SwitchCaseData {
        meta,
        test,
        consequent,
    })
}

fn build_ast_from_function(pair: Pair<Rule>, kind: FunctionKind) -> BuildResult<FunctionData> {
    let meta = meta_of(&pair);
    let mut id = None;
    let mut params = vec![];
    let mut body = None;
    for inner in significant(pair) {
        match inner.as_rule() {
            Rule::identifier => id = Some(build_identifier(inner)),
            Rule::parameter_list => params = build_parameters(inner)?,
            Rule::function_body => body = Some(build_ast_from_function_body(inner)?),
            _ => return Err(get_unexpected_error(3, &inner)),
        }
    }
    let body = body.ok_or_else(|| ParseError::at(&meta, "function without body"))?;
    Ok(FunctionData {
        meta,
        id,
        params,
        body,
        kind,
    })
}

fn build_parameters(pair: Pair<Rule>) -> BuildResult<Vec<IdentifierData>> {
    let mut params: Vec<IdentifierData> = vec![];
    for p in pair.into_inner() {
        let param = build_identifier(p);
        if params.iter().any(|existing| existing.name == param.name) {
            return Err(ParseError::at(
                &param.meta,
                format!("Duplicate parameter name {}", param.name),
            ));
        }
        params.push(param);
    }
    Ok(params)
}

fn build_ast_from_function_body(pair: Pair<Rule>) -> BuildResult<FunctionBodyData> {
    let meta = meta_of(&pair);
    let mut body = vec![];
    for inner in pair.into_inner() {
        body.push(build_ast_from_statement(inner)?);
    }
    let var_names = collect_var_names(&body);
    Ok(FunctionBodyData {
        meta,
        body,
        var_names,
    })
}

fn build_identifier(pair: Pair<Rule>) -> IdentifierData {
    IdentifierData {
        name: pair.as_str().to_string(),
        meta: meta_of(&pair),
    }
}

// ============================================================================
// Expressions
// ============================================================================

fn build_ast_from_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = meta_of(&pair);
    let mut inner = pair.into_inner();
    let left = build_ast_from_conditional(next_pair(&mut inner, &meta)?)?;
    let op_pair = match inner.next() {
        Some(p) => p,
        None => return Ok(left),
    };
    let operator = match op_pair.as_str() {
        "=" => AssignmentOperator::Equals,
        "+=" => AssignmentOperator::AddEquals,
        "-=" => AssignmentOperator::SubtractEquals,
        "*=" => AssignmentOperator::MultiplyEquals,
        "/=" => AssignmentOperator::DivideEquals,
        "%=" => AssignmentOperator::ModuloEquals,
        "<<=" => AssignmentOperator::BitwiseLeftShiftEquals,
        ">>=" => AssignmentOperator::BitwiseRightShiftEquals,
        ">>>=" => AssignmentOperator::BitwiseUnsignedRightShiftEquals,
        "|=" => AssignmentOperator::BitwiseOrEquals,
        "&=" => AssignmentOperator::BitwiseAndEquals,
        "^=" => AssignmentOperator::BitwiseXorEquals,
        _ => return Err(get_unexpected_error(4, &op_pair)),
    };
    if !left.is_assignment_target() {
        return Err(ParseError::at(&meta_of(&op_pair), "Invalid assignment target"));
    }
    let right = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
    Ok(ExpressionType::AssignmentExpression {
        meta,
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn build_ast_from_conditional(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = meta_of(&pair);
    let mut inner = pair.into_inner();
    let test = build_ast_from_binary(next_pair(&mut inner, &meta)?)?;
    match inner.next() {
        None => Ok(test),
        Some(consequent) => {
            let consequent = build_ast_from_expression(consequent)?;
            let alternate = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
            Ok(ExpressionType::ConditionalExpression {
                meta,
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            })
        }
    }
}

fn build_ast_from_binary(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    PRATT_PARSER
        .map_primary(build_ast_from_postfix_expression)
        .map_prefix(|op, rhs| {
            let argument = rhs?;
            let meta = span_meta(&meta_of(&op), argument.get_meta());
            let operator = match op.as_rule() {
                Rule::op_pre_inc | Rule::op_pre_dec => {
                    if !argument.is_assignment_target() {
                        return Err(ParseError::at(
                            &meta,
                            "Invalid left-hand side in prefix operation",
                        ));
                    }
                    let operator = if op.as_rule() == Rule::op_pre_inc {
                        UpdateOperator::PlusPlus
                    } else {
                        UpdateOperator::MinusMinus
                    };
                    return Ok(ExpressionType::UpdateExpression {
                        meta,
                        operator,
                        argument: Box::new(argument),
                        prefix: true,
                    });
                }
                Rule::op_not => UnaryOperator::LogicalNot,
                Rule::op_bit_not => UnaryOperator::BitwiseNot,
                Rule::op_neg => UnaryOperator::Minus,
                Rule::op_plus => UnaryOperator::Plus,
                Rule::op_typeof => UnaryOperator::TypeOf,
                Rule::op_delete => {
                    if !matches!(argument, ExpressionType::MemberExpression(_)) {
                        return Err(ParseError::at(&meta, "delete needs a property reference"));
                    }
                    UnaryOperator::Delete
                }
                _ => return Err(get_unexpected_error(5, &op)),
            };
            Ok(ExpressionType::UnaryExpression {
                meta,
                operator,
                argument: Box::new(argument),
            })
        })
        .map_infix(|lhs, op, rhs| {
            let left = lhs?;
            let right = rhs?;
            let meta = span_meta(left.get_meta(), right.get_meta());
            let logical = match op.as_rule() {
                Rule::op_or => Some(LogicalOperator::Or),
                Rule::op_and => Some(LogicalOperator::And),
                _ => None,
            };
            if let Some(operator) = logical {
                return Ok(ExpressionType::LogicalExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
            let operator = match op.as_rule() {
                Rule::op_bit_or => BinaryOperator::BitwiseOr,
                Rule::op_bit_xor => BinaryOperator::BitwiseXor,
                Rule::op_bit_and => BinaryOperator::BitwiseAnd,
                Rule::op_eq => BinaryOperator::LooselyEqual,
                Rule::op_ne => BinaryOperator::LooselyUnequal,
                Rule::op_strict_eq => BinaryOperator::StrictlyEqual,
                Rule::op_strict_ne => BinaryOperator::StrictlyUnequal,
                Rule::op_lt => BinaryOperator::LessThan,
                Rule::op_le => BinaryOperator::LessThanEqual,
                Rule::op_gt => BinaryOperator::GreaterThan,
                Rule::op_ge => BinaryOperator::GreaterThanEqual,
                Rule::op_instanceof => BinaryOperator::InstanceOf,
                Rule::op_in => BinaryOperator::In,
                Rule::op_shl => BinaryOperator::BitwiseLeftShift,
                Rule::op_shr => BinaryOperator::BitwiseRightShift,
                Rule::op_ushr => BinaryOperator::BitwiseUnsignedRightShift,
                Rule::op_add => BinaryOperator::Add,
                Rule::op_sub => BinaryOperator::Subtract,
                Rule::op_mul => BinaryOperator::Multiply,
                Rule::op_div => BinaryOperator::Divide,
                Rule::op_mod => BinaryOperator::Modulo,
                _ => return Err(get_unexpected_error(6, &op)),
            };
            Ok(ExpressionType::BinaryExpression {
                meta,
                operator,
                left: Box::new(left),
                right: Box::new(right),
            })
        })
        .parse(pair.into_inner())
}

fn build_ast_from_postfix_expression(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = meta_of(&pair);
    let mut inner = pair.into_inner();
    let expr = build_ast_from_primary(next_pair(&mut inner, &meta)?)?;
    apply_postfix_operations(expr, inner)
}

fn apply_postfix_operations<'i, I: Iterator<Item = Pair<'i, Rule>>>(
    mut expr: ExpressionType,
    operations: I,
) -> BuildResult<ExpressionType> {
    for op in operations {
        let meta = span_meta(expr.get_meta(), &meta_of(&op));
        expr = match op.as_rule() {
            Rule::call_arguments => ExpressionType::CallExpression {
                meta,
                callee: Box::new(expr),
                arguments: build_arguments(op)?,
            },
            Rule::member_access => {
                let op_meta = meta_of(&op);
                let name_pair = next_pair(&mut op.into_inner(), &op_meta)?;
                ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
                    meta,
                    object: Box::new(expr),
                    property: build_identifier(name_pair),
                })
            }
            Rule::index_access => {
                let op_meta = meta_of(&op);
                let index = build_ast_from_expression(next_pair(&mut op.into_inner(), &op_meta)?)?;
                ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
                    meta,
                    object: Box::new(expr),
                    property: Box::new(index),
                })
            }
            Rule::op_post_inc | Rule::op_post_dec => {
                if !expr.is_assignment_target() {
                    return Err(ParseError::at(
                        &meta,
                        "Invalid left-hand side in postfix operation",
                    ));
                }
                let operator = if op.as_rule() == Rule::op_post_inc {
                    UpdateOperator::PlusPlus
                } else {
                    UpdateOperator::MinusMinus
                };
                ExpressionType::UpdateExpression {
                    meta,
                    operator,
                    argument: Box::new(expr),
                    prefix: false,
                }
            }
            _ => return Err(get_unexpected_error(7, &op)),
        };
    }
    Ok(expr)
}

fn build_arguments(pair: Pair<Rule>) -> BuildResult<Vec<ExpressionType>> {
    let mut arguments = vec![];
    for p in pair.into_inner() {
        arguments.push(build_ast_from_expression(p)?);
    }
    Ok(arguments)
}

fn build_ast_from_primary(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = meta_of(&pair);
    let literal = |value: LiteralType| -> BuildResult<ExpressionType> {
        Ok(ExpressionType::Literal(LiteralData { value, meta }))
    };
    match pair.as_rule() {
        Rule::identifier => Ok(ExpressionType::Identifier(build_identifier(pair))),
        Rule::this_expression => Ok(ExpressionType::ThisExpression { meta }),
        Rule::kw_true => literal(LiteralType::BooleanLiteral(true)),
        Rule::kw_false => literal(LiteralType::BooleanLiteral(false)),
        Rule::kw_null => literal(LiteralType::NullLiteral),
        Rule::kw_undefined => literal(LiteralType::UndefinedLiteral),
        Rule::integer_literal | Rule::float_literal | Rule::hex_literal => {
            literal(LiteralType::NumberLiteral(build_number(&pair)?))
        }
        Rule::string_literal => literal(LiteralType::StringLiteral(build_string(pair)?)),
        Rule::paren_expression => {
            build_ast_from_expression(next_pair(&mut pair.into_inner(), &meta)?)
        }
        Rule::array_literal => {
            let mut elements = vec![];
            for p in pair.into_inner() {
                elements.push(build_ast_from_expression(p)?);
            }
            Ok(ExpressionType::ArrayExpression { meta, elements })
        }
        Rule::object_literal => {
            let mut properties: Vec<PropertyData> = vec![];
            for p in pair.into_inner() {
                let property = build_property(p)?;
                if let Some(existing) = properties.iter_mut().find(|e| e.key == property.key) {
                    *existing = property;
                } else {
                    properties.push(property);
                }
            }
            Ok(ExpressionType::ObjectExpression { meta, properties })
        }
        Rule::function_expression => Ok(ExpressionType::FunctionExpression(Arc::new(
            build_ast_from_function(pair, FunctionKind::Normal)?,
        ))),
        Rule::arrow_function => build_ast_from_arrow_function(pair),
        Rule::new_expression => {
            let mut callee = None;
            let mut arguments = vec![];
            for inner in significant(pair) {
                match inner.as_rule() {
                    Rule::new_callee => {
                        let callee_meta = meta_of(&inner);
                        let mut parts = inner.into_inner();
                        let head = build_ast_from_primary(next_pair(&mut parts, &callee_meta)?)?;
                        callee = Some(apply_postfix_operations(head, parts)?);
                    }
                    Rule::call_arguments => arguments = build_arguments(inner)?,
                    _ => return Err(get_unexpected_error(8, &inner)),
                }
            }
            let callee = callee.ok_or_else(|| ParseError::at(&meta, "new without constructor"))?;
            Ok(ExpressionType::NewExpression {
                meta,
                callee: Box::new(callee),
                arguments,
            })
        }
        _ => Err(get_unexpected_error(9, &pair)),
    }
}

fn build_ast_from_arrow_function(pair: Pair<Rule>) -> BuildResult<ExpressionType> {
    let meta = meta_of(&pair);
    let mut inner = pair.into_inner();
    let params = build_parameters(next_pair(&mut inner, &meta)?)?;
    let body_pair = next_pair(&mut inner, &meta)?;
    let body = if body_pair.as_rule() == Rule::function_body {
        build_ast_from_function_body(body_pair)?
    } else {
        let expr = build_ast_from_expression(body_pair)?;
        let expr_meta = *expr.get_meta();
        FunctionBodyData {
            meta: expr_meta,
            body: vec![StatementType::ReturnStatement {
                meta: expr_meta,
                argument: Some(expr),
            }],
            var_names: vec![],
        }
    };
    Ok(ExpressionType::FunctionExpression(Arc::new(FunctionData {
        meta,
        id: None,
        params,
        body,
        kind: FunctionKind::Arrow,
    })))
}

fn build_property(pair: Pair<Rule>) -> BuildResult<PropertyData> {
    let meta = meta_of(&pair);
    let mut inner = pair.into_inner();
    let key_pair = next_pair(&mut inner, &meta)?;
    let key = match key_pair.as_rule() {
        Rule::identifier_name => key_pair.as_str().to_string(),
        Rule::string_literal => build_string(key_pair)?,
        Rule::integer_literal | Rule::float_literal | Rule::hex_literal => {
            match build_number(&key_pair)? {
                NumberLiteralType::IntegerLiteral(i) => i.to_string(),
                NumberLiteralType::FloatLiteral(f) => f.to_string(),
            }
        }
        _ => return Err(get_unexpected_error(10, &key_pair)),
    };
    let value = build_ast_from_expression(next_pair(&mut inner, &meta)?)?;
    Ok(PropertyData { meta, key, value })
}

fn build_number(pair: &Pair<Rule>) -> BuildResult<NumberLiteralType> {
    let text = pair.as_str();
    let result = match pair.as_rule() {
        Rule::hex_literal => parse_hex_literal(text),
        Rule::float_literal => parse_float_literal(text),
        _ => parse_integer_literal(text),
    };
    result.map_err(|message| ParseError::at(&meta_of(pair), message))
}

fn build_string(pair: Pair<Rule>) -> BuildResult<String> {
    let meta = meta_of(&pair);
    let body = next_pair(&mut pair.into_inner(), &meta)?;
    unescape_string(body.as_str()).map_err(|message| ParseError::at(&meta, message))
}
