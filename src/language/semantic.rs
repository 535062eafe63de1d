use crate::language::{
    ast::Operator,
    types::{FunctionSignature, Tag, TypeSpecifier},
};
use std::collections::BTreeMap;

/// A fully typed expression node. Every variant either carries its
/// resolved type or is a literal whose type is fixed. Nodes are immutable
/// once produced; the checker never patches a tree in place.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedExpression {
    Unit,
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    /// The pipeline value flowing into the current expression.
    Input {
        ty: TypeSpecifier,
    },
    FieldInScope {
        name: String,
        ty: TypeSpecifier,
    },
    Unary {
        op: Operator,
        operand: Box<TypedExpression>,
        ty: TypeSpecifier,
    },
    Binary {
        op: Operator,
        left: Box<TypedExpression>,
        right: Box<TypedExpression>,
        ty: TypeSpecifier,
    },
    /// Record construction by type name.
    Initializer {
        ty: TypeSpecifier,
        arguments: BTreeMap<Tag, TypedExpression>,
    },
    /// Choice-arm construction by qualified tag.
    Constructor {
        ty: TypeSpecifier,
        tag: Tag,
        payload: Option<Box<TypedExpression>>,
    },
    Call {
        signature: FunctionSignature,
        input: Box<TypedExpression>,
        arguments: BTreeMap<Tag, TypedExpression>,
        ty: TypeSpecifier,
    },
    Access {
        prefix: Box<TypedExpression>,
        field: Tag,
        ty: TypeSpecifier,
    },
    Branched {
        branches: Vec<TypedBranch>,
        default_branch: Option<Box<TypedExpression>>,
        ty: TypeSpecifier,
    },
    Piped {
        left: Box<TypedExpression>,
        right: Box<TypedExpression>,
        ty: TypeSpecifier,
    },
}

impl TypedExpression {
    pub fn ty(&self) -> TypeSpecifier {
        match self {
            TypedExpression::Unit => TypeSpecifier::nothing(),
            TypedExpression::IntLiteral(_) => TypeSpecifier::int(),
            TypedExpression::FloatLiteral(_) => TypeSpecifier::float(),
            TypedExpression::BoolLiteral(_) => TypeSpecifier::bool(),
            TypedExpression::StringLiteral(_) => TypeSpecifier::string(),
            TypedExpression::Input { ty }
            | TypedExpression::FieldInScope { ty, .. }
            | TypedExpression::Unary { ty, .. }
            | TypedExpression::Binary { ty, .. }
            | TypedExpression::Initializer { ty, .. }
            | TypedExpression::Constructor { ty, .. }
            | TypedExpression::Call { ty, .. }
            | TypedExpression::Access { ty, .. }
            | TypedExpression::Branched { ty, .. }
            | TypedExpression::Piped { ty, .. } => ty.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypedBranch {
    pub pattern: Pattern,
    pub guard: Option<TypedExpression>,
    pub body: TypedBranchBody,
}

impl TypedBranch {
    /// Looped branches contribute no value to the surrounding match.
    pub fn ty(&self) -> TypeSpecifier {
        match &self.body {
            TypedBranchBody::Simple(body) => body.ty(),
            TypedBranchBody::Looped(_) => TypeSpecifier::never(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedBranchBody {
    Simple(TypedExpression),
    Looped(TypedExpression),
}

/// One branch's match shape. Patterns live only long enough to produce the
/// branch scope; they are consumed during checking and kept on the typed
/// branch for downstream consumers.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Wildcard,
    Binding(String),
    Value(TypedExpression),
    Destructor(BTreeMap<Tag, Pattern>),
    Constructor { tag: Tag, pattern: Box<Pattern> },
}
