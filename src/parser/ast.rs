use std::fmt::Debug;
use std::sync::Arc;

/// Source position of a node. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Meta {
    pub start_index: usize,
    pub end_index: usize,
    pub line: usize,
    pub column: usize,
}

pub trait HasMeta {
    fn get_meta(&self) -> &Meta;
}

#[derive(Debug, Clone)]
pub struct IdentifierData {
    pub name: String,
    pub meta: Meta,
}

#[derive(Debug, Clone)]
pub enum ExpressionType {
    Literal(LiteralData),
    Identifier(IdentifierData),
    ThisExpression {
        meta: Meta,
    },
    ArrayExpression {
        meta: Meta,
        elements: Vec<ExpressionType>,
    },
    ObjectExpression {
        meta: Meta,
        properties: Vec<PropertyData>,
    },
    FunctionExpression(Arc<FunctionData>),
    UnaryExpression {
        meta: Meta,
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    UpdateExpression {
        meta: Meta,
        operator: UpdateOperator,
        argument: Box<ExpressionType>,
        prefix: bool,
    },
    BinaryExpression {
        meta: Meta,
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    AssignmentExpression {
        meta: Meta,
        operator: AssignmentOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    LogicalExpression {
        meta: Meta,
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    ConditionalExpression {
        meta: Meta,
        test: Box<ExpressionType>,
        consequent: Box<ExpressionType>,
        alternate: Box<ExpressionType>,
    },
    CallExpression {
        //A function or method call expression.
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    NewExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    MemberExpression(MemberExpressionType),
}

impl ExpressionType {
    /// True for the expression forms that may appear on the left of an assignment.
    pub fn is_assignment_target(&self) -> bool {
        matches!(
            self,
            ExpressionType::Identifier(_) | ExpressionType::MemberExpression(_)
        )
    }
}

impl HasMeta for ExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionType::Literal(data) => &data.meta,
            ExpressionType::Identifier(data) => &data.meta,
            ExpressionType::ThisExpression { meta }
            | ExpressionType::ArrayExpression { meta, .. }
            | ExpressionType::ObjectExpression { meta, .. }
            | ExpressionType::UnaryExpression { meta, .. }
            | ExpressionType::UpdateExpression { meta, .. }
            | ExpressionType::BinaryExpression { meta, .. }
            | ExpressionType::AssignmentExpression { meta, .. }
            | ExpressionType::LogicalExpression { meta, .. }
            | ExpressionType::ConditionalExpression { meta, .. }
            | ExpressionType::CallExpression { meta, .. }
            | ExpressionType::NewExpression { meta, .. } => meta,
            ExpressionType::FunctionExpression(data) => &data.meta,
            ExpressionType::MemberExpression(data) => data.get_meta(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MemberExpressionType {
    SimpleMemberExpression {
        meta: Meta,
        object: Box<ExpressionType>,
        property: IdentifierData,
    },
    ComputedMemberExpression {
        meta: Meta,
        object: Box<ExpressionType>,
        property: Box<ExpressionType>,
    },
}

impl HasMeta for MemberExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            MemberExpressionType::SimpleMemberExpression { meta, .. } => meta,
            MemberExpressionType::ComputedMemberExpression { meta, .. } => meta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Equals,
    AddEquals,
    SubtractEquals,
    MultiplyEquals,
    DivideEquals,
    ModuloEquals,
    BitwiseLeftShiftEquals,
    BitwiseRightShiftEquals,
    BitwiseUnsignedRightShiftEquals,
    BitwiseOrEquals,
    BitwiseAndEquals,
    BitwiseXorEquals,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies before storing.
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        Some(match self {
            AssignmentOperator::Equals => return None,
            AssignmentOperator::AddEquals => BinaryOperator::Add,
            AssignmentOperator::SubtractEquals => BinaryOperator::Subtract,
            AssignmentOperator::MultiplyEquals => BinaryOperator::Multiply,
            AssignmentOperator::DivideEquals => BinaryOperator::Divide,
            AssignmentOperator::ModuloEquals => BinaryOperator::Modulo,
            AssignmentOperator::BitwiseLeftShiftEquals => BinaryOperator::BitwiseLeftShift,
            AssignmentOperator::BitwiseRightShiftEquals => BinaryOperator::BitwiseRightShift,
            AssignmentOperator::BitwiseUnsignedRightShiftEquals => {
                BinaryOperator::BitwiseUnsignedRightShift
            }
            AssignmentOperator::BitwiseOrEquals => BinaryOperator::BitwiseOr,
            AssignmentOperator::BitwiseAndEquals => BinaryOperator::BitwiseAnd,
            AssignmentOperator::BitwiseXorEquals => BinaryOperator::BitwiseXor,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentOperator::Equals => "=",
            AssignmentOperator::AddEquals => "+=",
            AssignmentOperator::SubtractEquals => "-=",
            AssignmentOperator::MultiplyEquals => "*=",
            AssignmentOperator::DivideEquals => "/=",
            AssignmentOperator::ModuloEquals => "%=",
            AssignmentOperator::BitwiseLeftShiftEquals => "<<=",
            AssignmentOperator::BitwiseRightShiftEquals => ">>=",
            AssignmentOperator::BitwiseUnsignedRightShiftEquals => ">>>=",
            AssignmentOperator::BitwiseOrEquals => "|=",
            AssignmentOperator::BitwiseAndEquals => "&=",
            AssignmentOperator::BitwiseXorEquals => "^=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    TypeOf,
    Delete,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::TypeOf => "typeof ",
            UnaryOperator::Delete => "delete ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    PlusPlus,
    MinusMinus,
}

impl UpdateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperator::PlusPlus => "++",
            UpdateOperator::MinusMinus => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LooselyEqual,
    LooselyUnequal,
    StrictlyEqual,
    StrictlyUnequal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    BitwiseLeftShift,
    BitwiseRightShift,
    BitwiseUnsignedRightShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseOr,
    BitwiseAnd,
    BitwiseXor,
    In,
    InstanceOf,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::LooselyEqual => "==",
            BinaryOperator::LooselyUnequal => "!=",
            BinaryOperator::StrictlyEqual => "===",
            BinaryOperator::StrictlyUnequal => "!==",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::BitwiseLeftShift => "<<",
            BinaryOperator::BitwiseRightShift => ">>",
            BinaryOperator::BitwiseUnsignedRightShift => ">>>",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::In => "in",
            BinaryOperator::InstanceOf => "instanceof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    Or,
    And,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::Or => "||",
            LogicalOperator::And => "&&",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralData {
    pub value: LiteralType,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    StringLiteral(String),
    BooleanLiteral(bool),
    NullLiteral,
    UndefinedLiteral,
    NumberLiteral(NumberLiteralType),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLiteralType {
    IntegerLiteral(i64),
    FloatLiteral(f64),
}

#[derive(Debug, Clone)]
pub struct PropertyData {
    pub meta: Meta,
    pub key: String,
    pub value: ExpressionType,
}

#[derive(Debug, Clone)]
pub struct ProgramData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
    /// Names declared with `var`/`const` at top level, hoisted into the global scope.
    pub var_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BlockStatementData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
    /// Whether the block directly declares `local` bindings and needs its own scope.
    pub declares_locals: bool,
}

#[derive(Debug, Clone)]
pub enum StatementType {
    EmptyStatement {
        meta: Meta,
    },
    ExpressionStatement {
        meta: Meta,
        expression: ExpressionType,
    },
    BlockStatement(BlockStatementData),
    VariableDeclaration(VariableDeclarationData),
    FunctionDeclaration(Arc<FunctionData>),
    IfStatement {
        meta: Meta,
        test: ExpressionType,
        consequent: Box<StatementType>,
        alternate: Option<Box<StatementType>>,
    },
    WhileStatement {
        meta: Meta,
        test: ExpressionType,
        body: Box<StatementType>,
    },
    DoWhileStatement {
        meta: Meta,
        test: ExpressionType,
        body: Box<StatementType>,
    },
    ForStatement {
        meta: Meta,
        init: Option<VariableDeclarationOrExpression>,
        test: Option<ExpressionType>,
        update: Option<ExpressionType>,
        body: Box<StatementType>,
    },
    ForInStatement(ForIteratorData),
    SwitchStatement {
        meta: Meta,
        discriminant: ExpressionType,
        cases: Vec<SwitchCaseData>,
    },
    BreakStatement {
        meta: Meta,
    },
    ContinueStatement {
        meta: Meta,
    },
    ReturnStatement {
        meta: Meta,
        argument: Option<ExpressionType>,
    },
    ThrowStatement {
        meta: Meta,
        argument: ExpressionType,
    },
    TryStatement {
        meta: Meta,
        block: BlockStatementData,
        handler: Option<CatchClauseData>,
        finalizer: Option<BlockStatementData>,
    },
}

impl HasMeta for StatementType {
    fn get_meta(&self) -> &Meta {
        match self {
            StatementType::EmptyStatement { meta }
            | StatementType::ExpressionStatement { meta, .. }
            | StatementType::IfStatement { meta, .. }
            | StatementType::WhileStatement { meta, .. }
            | StatementType::DoWhileStatement { meta, .. }
            | StatementType::ForStatement { meta, .. }
            | StatementType::SwitchStatement { meta, .. }
            | StatementType::BreakStatement { meta }
            | StatementType::ContinueStatement { meta }
            | StatementType::ReturnStatement { meta, .. }
            | StatementType::ThrowStatement { meta, .. }
            | StatementType::TryStatement { meta, .. } => meta,
            StatementType::BlockStatement(data) => &data.meta,
            StatementType::VariableDeclaration(data) => &data.meta,
            StatementType::FunctionDeclaration(data) => &data.meta,
            StatementType::ForInStatement(data) => &data.meta,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionBodyData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
    /// Names declared with `var`/`const` anywhere in the body except nested functions.
    pub var_names: Vec<String>,
}

/// `for (x in collection)`.
#[derive(Debug, Clone)]
pub struct ForIteratorData {
    pub meta: Meta,
    pub kind: Option<VariableDeclarationKind>,
    pub left: IdentifierData,
    pub right: ExpressionType,
    pub body: Box<StatementType>,
}

#[derive(Debug, Clone)]
pub enum VariableDeclarationOrExpression {
    VariableDeclaration(VariableDeclarationData),
    Expression(ExpressionType),
}

#[derive(Debug, Clone)]
pub struct VariableDeclarationData {
    pub meta: Meta,
    pub declarations: Vec<VariableDeclaratorData>,
    pub kind: VariableDeclarationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableDeclarationKind {
    Var,
    Const,
    Local,
    Register,
}

impl VariableDeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableDeclarationKind::Var => "var",
            VariableDeclarationKind::Const => "const var",
            VariableDeclarationKind::Local => "local",
            VariableDeclarationKind::Register => "reg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchCaseData {
    pub meta: Meta,
    /// `None` for the `default` clause.
    pub test: Option<ExpressionType>,
    pub consequent: Vec<StatementType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Inline,
    Arrow,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub meta: Meta,
    pub id: Option<IdentifierData>,
    pub params: Vec<IdentifierData>,
    pub body: FunctionBodyData,
    pub kind: FunctionKind,
}

impl FunctionData {
    pub fn name(&self) -> &str {
        self.id.as_ref().map(|id| id.name.as_str()).unwrap_or("anonymous")
    }

    pub fn is_inline(&self) -> bool {
        self.kind == FunctionKind::Inline
    }
}

#[derive(Debug, Clone)]
pub struct CatchClauseData {
    pub meta: Meta,
    pub param: IdentifierData,
    pub body: BlockStatementData,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaratorData {
    pub meta: Meta,
    pub id: IdentifierData,
    pub init: Option<ExpressionType>,
}
