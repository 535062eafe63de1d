use crate::language::{span::Span, types::QualifiedName};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    By,
    Modulo,
    Not,
    And,
    Or,
    Equal,
    Different,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Times => "*",
            Operator::By => "/",
            Operator::Modulo => "%",
            Operator::Not => "not",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Equal => "=",
            Operator::Different => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Debug)]
pub struct Module {
    pub name: String,
    pub definitions: Vec<Definition>,
}

#[derive(Clone, Debug)]
pub enum Definition {
    Type(TypeDefinition),
    Value(ValueDefinition),
    Operator(OperatorDefinition),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedIdentifier {
    pub segments: Vec<String>,
    pub span: Span,
}

impl ScopedIdentifier {
    pub fn new(segments: Vec<String>, span: Span) -> Self {
        Self { segments, span }
    }

    pub fn single(segment: impl Into<String>, span: Span) -> Self {
        Self {
            segments: vec![segment.into()],
            span,
        }
    }

    pub fn to_qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.segments.clone())
    }
}

impl fmt::Display for ScopedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("::"))
    }
}

#[derive(Clone, Debug)]
pub struct TypeDefinition {
    pub identifier: ScopedIdentifier,
    pub type_parameters: Vec<String>,
    pub body: TypeSpecifier,
    pub span: Span,
}

/// A named value. When `signature` is present the body is a function whose
/// input, arguments and output the signature declares; without one the
/// definition is a module constant.
#[derive(Clone, Debug)]
pub struct ValueDefinition {
    pub identifier: ScopedIdentifier,
    pub signature: Option<FunctionType>,
    pub body: Expression,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct OperatorDefinition {
    pub op: Operator,
    pub left: Option<TypeSpecifier>,
    pub right: TypeSpecifier,
    pub output: TypeSpecifier,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TypeSpecifier {
    Nothing(Span),
    Never(Span),
    Product {
        fields: Vec<TypeField>,
        span: Span,
    },
    Sum {
        fields: Vec<TypeField>,
        span: Span,
    },
    Nominal {
        identifier: ScopedIdentifier,
        type_arguments: Vec<TypeSpecifier>,
        span: Span,
    },
    Function(Box<FunctionType>),
    Existential {
        interfaces: Vec<ScopedIdentifier>,
        span: Span,
    },
    Universal {
        interfaces: Vec<ScopedIdentifier>,
        span: Span,
    },
    Belonging {
        owner: Box<TypeSpecifier>,
        member: ScopedIdentifier,
        span: Span,
    },
}

impl TypeSpecifier {
    pub fn span(&self) -> Span {
        match self {
            TypeSpecifier::Nothing(span) | TypeSpecifier::Never(span) => *span,
            TypeSpecifier::Product { span, .. }
            | TypeSpecifier::Sum { span, .. }
            | TypeSpecifier::Nominal { span, .. }
            | TypeSpecifier::Existential { span, .. }
            | TypeSpecifier::Universal { span, .. }
            | TypeSpecifier::Belonging { span, .. } => *span,
            TypeSpecifier::Function(function) => function.span,
        }
    }
}

#[derive(Clone, Debug)]
pub enum TypeField {
    Plain(TypeSpecifier),
    Tagged {
        tag: String,
        tag_span: Span,
        specifier: Option<TypeSpecifier>,
    },
    Homogeneous {
        specifier: TypeSpecifier,
        count: HomogeneousCount,
        span: Span,
    },
}

impl TypeField {
    pub fn span(&self) -> Span {
        match self {
            TypeField::Plain(specifier) => specifier.span(),
            TypeField::Tagged {
                tag_span,
                specifier,
                ..
            } => specifier
                .as_ref()
                .map(|specifier| tag_span.merge(specifier.span()))
                .unwrap_or(*tag_span),
            TypeField::Homogeneous { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub enum HomogeneousCount {
    Literal(u64),
    Identifier(String),
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub input: Option<TypeField>,
    pub arguments: Vec<TypeField>,
    pub output: TypeSpecifier,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Expression {
    Unit(Span),
    IntLiteral {
        value: i64,
        span: Span,
    },
    FloatLiteral {
        value: f64,
        span: Span,
    },
    BoolLiteral {
        value: bool,
        span: Span,
    },
    StringLiteral {
        value: String,
        span: Span,
    },
    Unary {
        op: Operator,
        operand: Box<Expression>,
        span: Span,
    },
    Binary {
        op: Operator,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    /// A bare (possibly qualified) name: a scope field, a record field of
    /// the pipeline input, or a type/function name in callee position.
    Field {
        identifier: ScopedIdentifier,
        span: Span,
    },
    /// Introduces a new name inside a branch capture group.
    Binding {
        identifier: String,
        span: Span,
    },
    Tagged {
        tag: String,
        tag_span: Span,
        expression: Box<Expression>,
        span: Span,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        span: Span,
    },
    Access {
        prefix: Box<Expression>,
        field: String,
        field_span: Span,
        span: Span,
    },
    Branched {
        branches: Vec<Branch>,
        default_branch: Option<Box<Expression>>,
        span: Span,
    },
    Piped {
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Function {
        signature: Box<FunctionType>,
        body: Box<Expression>,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Unit(span) => *span,
            Expression::IntLiteral { span, .. }
            | Expression::FloatLiteral { span, .. }
            | Expression::BoolLiteral { span, .. }
            | Expression::StringLiteral { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Field { span, .. }
            | Expression::Binding { span, .. }
            | Expression::Tagged { span, .. }
            | Expression::Call { span, .. }
            | Expression::Access { span, .. }
            | Expression::Branched { span, .. }
            | Expression::Piped { span, .. }
            | Expression::Function { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Branch {
    pub captures: Vec<Expression>,
    pub guard: Option<Expression>,
    pub body: BranchBody,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum BranchBody {
    /// Produces the branch's value and leaves the match.
    Simple(Expression),
    /// Feeds its value back as the match's next input.
    Looped(Expression),
}
