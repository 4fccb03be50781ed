//! Renders an AST back to source text.
//!
//! Every compound expression is parenthesised, so the output re-parses to the
//! same tree regardless of operator precedence.

use crate::parser::ast::*;
use crate::parser::util::{escape_string, format_float_literal, spaces, TAB_WIDTH};

pub fn print_program(program: &ProgramData) -> String {
    let mut printer = Printer::new();
    for stmt in &program.body {
        printer.statement(stmt);
    }
    printer.out
}

pub fn print_expression(expr: &ExpressionType) -> String {
    let mut printer = Printer::new();
    printer.expression(expr);
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
        }
    }

    fn line_start(&mut self) {
        self.out.push_str(&spaces(self.indent * TAB_WIDTH));
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn statement(&mut self, stmt: &StatementType) {
        self.line_start();
        self.statement_inline(stmt);
        self.push("\n");
    }

    fn statement_inline(&mut self, stmt: &StatementType) {
        match stmt {
            StatementType::EmptyStatement { .. } => self.push(";"),
            StatementType::ExpressionStatement { expression, .. } => {
                let text = print_expression(expression);
                if text.starts_with('{') {
                    self.push("(");
                    self.push(&text);
                    self.push(")");
                } else {
                    self.push(&text);
                }
                self.push(";");
            }
            StatementType::BlockStatement(block) => self.block(&block.body),
            StatementType::VariableDeclaration(decl) => {
                self.variable_declaration(decl);
                self.push(";");
            }
            StatementType::FunctionDeclaration(function) => self.function(function),
            StatementType::IfStatement {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.push("if (");
                self.expression(test);
                self.push(") ");
                self.statement_inline(consequent);
                if let Some(alt) = alternate {
                    self.push(" else ");
                    self.statement_inline(alt);
                }
            }
            StatementType::WhileStatement { test, body, .. } => {
                self.push("while (");
                self.expression(test);
                self.push(") ");
                self.statement_inline(body);
            }
            StatementType::DoWhileStatement { test, body, .. } => {
                self.push("do ");
                self.statement_inline(body);
                self.push(" while (");
                self.expression(test);
                self.push(");");
            }
            StatementType::ForStatement {
                init,
                test,
                update,
                body,
                ..
            } => {
                self.push("for (");
                match init {
                    Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
                        self.variable_declaration(decl)
                    }
                    Some(VariableDeclarationOrExpression::Expression(e)) => self.expression(e),
                    None => {}
                }
                self.push("; ");
                if let Some(t) = test {
                    self.expression(t);
                }
                self.push("; ");
                if let Some(u) = update {
                    self.expression(u);
                }
                self.push(") ");
                self.statement_inline(body);
            }
            StatementType::ForInStatement(data) => {
                self.push("for (");
                match data.kind {
                    Some(VariableDeclarationKind::Local) => self.push("local "),
                    Some(_) => self.push("var "),
                    None => {}
                }
                self.push(&data.left.name);
                self.push(" in ");
                self.expression(&data.right);
                self.push(") ");
                self.statement_inline(&data.body);
            }
            StatementType::SwitchStatement {
                discriminant,
                cases,
                ..
            } => {
                self.push("switch (");
                self.expression(discriminant);
                self.push(") {\n");
                self.indent += 1;
                for case in cases {
                    self.line_start();
                    match &case.test {
                        Some(t) => {
                            self.push("case ");
                            self.expression(t);
                            self.push(":\n");
                        }
                        None => self.push("default:\n"),
                    }
                    self.indent += 1;
                    for s in &case.consequent {
                        self.statement(s);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line_start();
                self.push("}");
            }
            StatementType::BreakStatement { .. } => self.push("break;"),
            StatementType::ContinueStatement { .. } => self.push("continue;"),
            StatementType::ReturnStatement { argument, .. } => match argument {
                Some(a) => {
                    self.push("return ");
                    self.expression(a);
                    self.push(";");
                }
                None => self.push("return;"),
            },
            StatementType::ThrowStatement { argument, .. } => {
                self.push("throw ");
                self.expression(argument);
                self.push(";");
            }
            StatementType::TryStatement {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.push("try ");
                self.block(&block.body);
                if let Some(h) = handler {
                    self.push(" catch (");
                    self.push(&h.param.name);
                    self.push(") ");
                    self.block(&h.body.body);
                }
                if let Some(f) = finalizer {
                    self.push(" finally ");
                    self.block(&f.body);
                }
            }
        }
    }

    fn block(&mut self, body: &[StatementType]) {
        self.push("{\n");
        self.indent += 1;
        for s in body {
            self.statement(s);
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    fn variable_declaration(&mut self, decl: &VariableDeclarationData) {
        self.push(decl.kind.as_str());
        self.push(" ");
        for (i, d) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&d.id.name);
            if let Some(init) = &d.init {
                self.push(" = ");
                self.expression(init);
            }
        }
    }

    fn parameters(&mut self, params: &[IdentifierData]) {
        self.push("(");
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        self.push(&names.join(", "));
        self.push(")");
    }

    fn function(&mut self, function: &FunctionData) {
        match function.kind {
            FunctionKind::Arrow => {
                self.parameters(&function.params);
                self.push(" => ");
            }
            FunctionKind::Inline | FunctionKind::Normal => {
                if function.kind == FunctionKind::Inline {
                    self.push("inline ");
                }
                self.push("function");
                if let Some(id) = &function.id {
                    self.push(" ");
                    self.push(&id.name);
                }
                self.parameters(&function.params);
                self.push(" ");
            }
        }
        self.block(&function.body.body);
    }

    fn arguments(&mut self, arguments: &[ExpressionType]) {
        self.push("(");
        for (i, a) in arguments.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expression(a);
        }
        self.push(")");
    }

    fn expression(&mut self, expr: &ExpressionType) {
        match expr {
            ExpressionType::Literal(lit) => self.literal(&lit.value),
            ExpressionType::Identifier(id) => self.push(&id.name),
            ExpressionType::ThisExpression { .. } => self.push("this"),
            ExpressionType::ArrayExpression { elements, .. } => {
                self.push("[");
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expression(e);
                }
                self.push("]");
            }
            ExpressionType::ObjectExpression { properties, .. } => {
                self.push("{");
                for (i, p) in properties.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(&escape_string(&p.key));
                    self.push(": ");
                    self.expression(&p.value);
                }
                self.push("}");
            }
            ExpressionType::FunctionExpression(function) => {
                self.push("(");
                self.function(function);
                self.push(")");
            }
            ExpressionType::UnaryExpression {
                operator, argument, ..
            } => {
                self.push("(");
                self.push(operator.as_str());
                self.expression(argument);
                self.push(")");
            }
            ExpressionType::UpdateExpression {
                operator,
                argument,
                prefix,
                ..
            } => {
                self.push("(");
                if *prefix {
                    self.push(operator.as_str());
                    self.expression(argument);
                } else {
                    self.expression(argument);
                    self.push(operator.as_str());
                }
                self.push(")");
            }
            ExpressionType::BinaryExpression {
                operator,
                left,
                right,
                ..
            } => self.infix(left, operator.as_str(), right),
            ExpressionType::LogicalExpression {
                operator,
                left,
                right,
                ..
            } => self.infix(left, operator.as_str(), right),
            ExpressionType::AssignmentExpression {
                operator,
                left,
                right,
                ..
            } => self.infix(left, operator.as_str(), right),
            ExpressionType::ConditionalExpression {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.push("(");
                self.expression(test);
                self.push(" ? ");
                self.expression(consequent);
                self.push(" : ");
                self.expression(alternate);
                self.push(")");
            }
            ExpressionType::CallExpression {
                callee, arguments, ..
            } => {
                self.expression(callee);
                self.arguments(arguments);
            }
            ExpressionType::NewExpression {
                callee, arguments, ..
            } => {
                self.push("new ");
                if is_simple_constructor(callee) {
                    self.expression(callee);
                } else {
                    self.push("(");
                    self.expression(callee);
                    self.push(")");
                }
                self.arguments(arguments);
            }
            ExpressionType::MemberExpression(member) => match member {
                MemberExpressionType::SimpleMemberExpression {
                    object, property, ..
                } => {
                    self.member_object(object);
                    self.push(".");
                    self.push(&property.name);
                }
                MemberExpressionType::ComputedMemberExpression {
                    object, property, ..
                } => {
                    self.member_object(object);
                    self.push("[");
                    self.expression(property);
                    self.push("]");
                }
            },
        }
    }

    fn member_object(&mut self, object: &ExpressionType) {
        if let ExpressionType::Literal(LiteralData {
            value: LiteralType::NumberLiteral(_),
            ..
        }) = object
        {
            self.push("(");
            self.expression(object);
            self.push(")");
        } else {
            self.expression(object);
        }
    }

    fn infix(&mut self, left: &ExpressionType, op: &str, right: &ExpressionType) {
        self.push("(");
        self.expression(left);
        self.push(" ");
        self.push(op);
        self.push(" ");
        self.expression(right);
        self.push(")");
    }

    fn literal(&mut self, value: &LiteralType) {
        match value {
            LiteralType::StringLiteral(s) => self.push(&escape_string(s)),
            LiteralType::BooleanLiteral(b) => self.push(if *b { "true" } else { "false" }),
            LiteralType::NullLiteral => self.push("null"),
            LiteralType::UndefinedLiteral => self.push("undefined"),
            LiteralType::NumberLiteral(NumberLiteralType::IntegerLiteral(i)) => {
                self.push(&i.to_string())
            }
            LiteralType::NumberLiteral(NumberLiteralType::FloatLiteral(f)) => {
                if f.is_infinite() {
                    self.push("1e999");
                } else {
                    self.push(&format_float_literal(*f));
                }
            }
        }
    }
}

fn is_simple_constructor(callee: &ExpressionType) -> bool {
    match callee {
        ExpressionType::Identifier(_) => true,
        ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
            object,
            ..
        }) => is_simple_constructor(object),
        ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
            object,
            ..
        }) => is_simple_constructor(object),
        _ => false,
    }
}
