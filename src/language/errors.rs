use crate::language::{
    ast::Operator,
    span::Span,
    types::{QualifiedName, Tag, TypeSpecifier},
};
use miette::SourceSpan;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SemanticErrorKind {
    #[error("type `{identifier}` is declared more than once")]
    TypeRedeclaration {
        identifier: QualifiedName,
        other_spans: Vec<Span>,
    },
    #[error("function `{signature}` is declared more than once")]
    ValueRedeclaration {
        signature: String,
        other_spans: Vec<Span>,
    },
    #[error("operator `{op}` is already defined for these operand types")]
    OperatorRedeclaration { op: Operator },
    #[error("type `{identifier}` is not in scope")]
    TypeNotInScope { identifier: QualifiedName },
    #[error("type `{identifier}` shadows a builtin type")]
    TypeShadowing { identifier: QualifiedName },
    #[error("type `{identifier}` depends on itself")]
    CyclicType { identifier: QualifiedName },
    #[error("fixed-size products are not allowed inside a choice type")]
    HomogeneousTypeProductInSum,
    #[error("field `{tag}` appears more than once")]
    DuplicateFieldName { tag: Tag },
    #[error("field `{tag}` needs a type")]
    FieldTypeRequired { tag: Tag },
    #[error("function `{identifier}` has the same name as a type")]
    FunctionRedeclaringType { identifier: QualifiedName },
    #[error("no function named `{identifier}`")]
    UndefinedFunction { identifier: QualifiedName },
    #[error("function `{identifier}` is not defined for input `{input}`")]
    UndefinedFunctionOnInput {
        identifier: QualifiedName,
        input: TypeSpecifier,
    },
    #[error("arguments do not match any overload of `{identifier}` for input `{input}`")]
    ArgumentMismatch {
        identifier: QualifiedName,
        input: TypeSpecifier,
    },
    #[error("expression expects input `{expected}` but receives `{received}`")]
    InputMismatch {
        expected: TypeSpecifier,
        received: TypeSpecifier,
    },
    #[error("operation `{op}` is not defined for `{left}` and `{right}`")]
    InvalidOperation {
        op: Operator,
        left: TypeSpecifier,
        right: TypeSpecifier,
    },
    #[error("expression of type `Never` can not produce a value")]
    ReachedNever,
    #[error("field `{field}` is not in scope")]
    FieldNotInScope { field: Tag },
    #[error("bindings are only allowed inside a branch capture group")]
    BindingNotAllowed,
    #[error("expression field `{tag}` appears more than once")]
    DuplicateExpressionField { tag: Tag },
    #[error("guard must produce `Bool`, found `{received}`")]
    GuardNotBool { received: TypeSpecifier },
    #[error("branch captures {received} values but the input provides {expected}")]
    CaptureGroupCountMismatch { expected: usize, received: usize },
    #[error("looped branch must produce the match input `{expected}`, found `{received}`")]
    LoopedExpressionTypeMismatch {
        expected: TypeSpecifier,
        received: TypeSpecifier,
    },
    #[error("function body produces `{received}` but is declared to produce `{expected}`")]
    OutputMismatch {
        expected: TypeSpecifier,
        received: TypeSpecifier,
    },
    #[error("{feature} is not supported yet")]
    UnsupportedYet { feature: String },
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub span: Span,
    pub help: Option<String>,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            help: None,
        }
    }

    pub fn unsupported(feature: impl Into<String>, span: Span) -> Self {
        Self::new(
            SemanticErrorKind::UnsupportedYet {
                feature: feature.into(),
            },
            span,
        )
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn to_source_span(&self) -> SourceSpan {
        (self.span.start, self.span.len()).into()
    }
}

/// Stable order for diagnostic lists: by source position, then by message
/// so reruns produce identical output.
pub fn sort_errors(errors: &mut [SemanticError]) {
    errors.sort_by(|a, b| {
        a.span
            .cmp(&b.span)
            .then_with(|| a.message().cmp(&b.message()))
    });
}
