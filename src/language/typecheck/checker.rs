use crate::language::{
    ast,
    errors::{SemanticError, SemanticErrorKind},
    semantic::TypedExpression,
    span::Span,
    typecheck::{branches, Context, FunctionDecl, OperatorKey},
    types::{FunctionSignature, QualifiedName, RawType, Tag, TypeSpecifier},
};
use std::collections::{BTreeMap, BTreeSet};

/// Names visible to the expression being checked: function arguments, a
/// named input, and pattern bindings. Layering builds a new scope; the
/// parent is never touched.
#[derive(Clone, Debug, Default)]
pub struct LocalScope {
    fields: BTreeMap<String, TypeSpecifier>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: BTreeMap<String, TypeSpecifier>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&TypeSpecifier> {
        self.fields.get(name)
    }

    pub fn extended(
        &self,
        bindings: impl IntoIterator<Item = (String, TypeSpecifier)>,
    ) -> LocalScope {
        let mut fields = self.fields.clone();
        fields.extend(bindings);
        Self { fields }
    }
}

/// Checks one function body against its resolved signature. Untagged
/// inputs flow in as the pipeline value; tagged inputs appear as a scope
/// field and leave the pipeline empty.
pub fn check_function_body(
    signature: &FunctionSignature,
    decl: &FunctionDecl,
    body: &ast::Expression,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    let mut fields: BTreeMap<String, TypeSpecifier> = signature
        .arguments
        .iter()
        .filter_map(|(tag, ty)| match tag {
            Tag::Named(name) => Some((name.clone(), ty.clone())),
            Tag::Unnamed(_) => None,
        })
        .collect();

    let input = match &decl.input_tag {
        Some(tag) => {
            fields.insert(tag.clone(), signature.input.clone());
            TypeSpecifier::nothing()
        }
        None => signature.input.clone(),
    };

    check(body, &input, &LocalScope::from_fields(fields), ctx)
}

/// Bidirectional check of one expression: the expected input type flows
/// down, the resolved type flows up on the typed node. Fail-fast: the
/// first error poisons the whole expression.
pub fn check(
    expression: &ast::Expression,
    input: &TypeSpecifier,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    if input.is_never() {
        return Err(SemanticError::new(
            SemanticErrorKind::ReachedNever,
            expression.span(),
        ));
    }

    match expression {
        ast::Expression::Unit(span) => {
            expect_nothing_input(input, *span)?;
            Ok(TypedExpression::Unit)
        }
        ast::Expression::IntLiteral { value, span } => {
            expect_nothing_input(input, *span)?;
            Ok(TypedExpression::IntLiteral(*value))
        }
        ast::Expression::FloatLiteral { value, span } => {
            expect_nothing_input(input, *span)?;
            Ok(TypedExpression::FloatLiteral(*value))
        }
        ast::Expression::BoolLiteral { value, span } => {
            expect_nothing_input(input, *span)?;
            Ok(TypedExpression::BoolLiteral(*value))
        }
        ast::Expression::StringLiteral { value, span } => {
            expect_nothing_input(input, *span)?;
            Ok(TypedExpression::StringLiteral(value.clone()))
        }
        ast::Expression::Unary { op, operand, span } => {
            let right = check(operand, &TypeSpecifier::nothing(), scope, ctx)?;
            let right_ty = right.ty();
            if right_ty.is_never() {
                return Err(SemanticError::new(SemanticErrorKind::ReachedNever, *span));
            }
            let key = OperatorKey {
                left: input.clone(),
                right: right_ty.clone(),
                op: *op,
            };
            let Some(output) = ctx.operators.get(&key) else {
                return Err(SemanticError::new(
                    SemanticErrorKind::InvalidOperation {
                        op: *op,
                        left: input.clone(),
                        right: right_ty,
                    },
                    *span,
                ));
            };
            if input.is_nothing() {
                Ok(TypedExpression::Unary {
                    op: *op,
                    operand: Box::new(right),
                    ty: output.clone(),
                })
            } else {
                // a unary over a flowing input is really a binary operation
                // on the pipeline value
                Ok(TypedExpression::Binary {
                    op: *op,
                    left: Box::new(TypedExpression::Input { ty: input.clone() }),
                    right: Box::new(right),
                    ty: output.clone(),
                })
            }
        }
        ast::Expression::Binary {
            op,
            left,
            right,
            span,
        } => {
            expect_nothing_input(input, *span)?;
            let left_typed = check(left, &TypeSpecifier::nothing(), scope, ctx)?;
            let right_typed = check(right, &TypeSpecifier::nothing(), scope, ctx)?;
            let (left_ty, right_ty) = (left_typed.ty(), right_typed.ty());
            if left_ty.is_never() || right_ty.is_never() {
                return Err(SemanticError::new(SemanticErrorKind::ReachedNever, *span));
            }
            let key = OperatorKey {
                left: left_ty.clone(),
                right: right_ty.clone(),
                op: *op,
            };
            let Some(output) = ctx.operators.get(&key) else {
                return Err(SemanticError::new(
                    SemanticErrorKind::InvalidOperation {
                        op: *op,
                        left: left_ty,
                        right: right_ty,
                    },
                    *span,
                ));
            };
            Ok(TypedExpression::Binary {
                op: *op,
                left: Box::new(left_typed),
                right: Box::new(right_typed),
                ty: output.clone(),
            })
        }
        ast::Expression::Field { identifier, span } => {
            check_field(identifier, *span, input, scope, ctx)
        }
        ast::Expression::Binding { span, .. } => Err(SemanticError::new(
            SemanticErrorKind::BindingNotAllowed,
            *span,
        )),
        ast::Expression::Tagged { span, .. } => Err(SemanticError::unsupported(
            "tagged expressions outside argument lists",
            *span,
        )),
        ast::Expression::Call {
            callee,
            arguments,
            span,
        } => check_call(callee, arguments, *span, input, scope, ctx),
        ast::Expression::Access {
            prefix,
            field,
            field_span,
            ..
        } => {
            let prefix_typed = check(prefix, input, scope, ctx)?;
            let raw = raw_type(&prefix_typed.ty(), ctx, *field_span)?;
            let tag = Tag::named(field.clone());
            match raw {
                RawType::Record(fields) => match fields.get(&tag) {
                    Some(field_ty) => Ok(TypedExpression::Access {
                        prefix: Box::new(prefix_typed),
                        field: tag,
                        ty: field_ty.clone(),
                    }),
                    None => Err(SemanticError::new(
                        SemanticErrorKind::FieldNotInScope { field: tag },
                        *field_span,
                    )),
                },
                _ => Err(SemanticError::new(
                    SemanticErrorKind::FieldNotInScope { field: tag },
                    *field_span,
                )),
            }
        }
        ast::Expression::Branched {
            branches,
            default_branch,
            span,
        } => branches::check_branched(branches, default_branch.as_deref(), *span, input, scope, ctx),
        ast::Expression::Piped { left, right, .. } => {
            let left_typed = check(left, input, scope, ctx)?;
            let right_typed = check(right, &left_typed.ty(), scope, ctx)?;
            let ty = right_typed.ty();
            Ok(TypedExpression::Piped {
                left: Box::new(left_typed),
                right: Box::new(right_typed),
                ty,
            })
        }
        ast::Expression::Function { span, .. } => {
            Err(SemanticError::unsupported("function expressions", *span))
        }
    }
}

fn expect_nothing_input(input: &TypeSpecifier, span: Span) -> Result<(), SemanticError> {
    if input.is_nothing() {
        Ok(())
    } else {
        Err(SemanticError::new(
            SemanticErrorKind::InputMismatch {
                expected: TypeSpecifier::nothing(),
                received: input.clone(),
            },
            span,
        ))
    }
}

/// Resolves a type down to its raw shape through the declarations map.
/// Dangling nominals are a resolution-phase contract violation; reported
/// here as `TypeNotInScope` rather than trusted.
pub fn raw_type(
    ty: &TypeSpecifier,
    ctx: &Context,
    span: Span,
) -> Result<RawType, SemanticError> {
    let mut seen: BTreeSet<QualifiedName> = BTreeSet::new();
    let mut current = ty.clone();
    loop {
        match current {
            TypeSpecifier::Raw(raw) => return Ok(raw),
            TypeSpecifier::Nominal(identifier) => {
                let not_in_scope = || {
                    SemanticError::new(
                        SemanticErrorKind::TypeNotInScope {
                            identifier: identifier.clone(),
                        },
                        span,
                    )
                };
                if !seen.insert(identifier.clone()) {
                    // cyclic alias chain, already reported during resolution
                    return Err(not_in_scope());
                }
                current = ctx.types.get(&identifier).cloned().ok_or_else(not_in_scope)?;
            }
        }
    }
}

fn check_field(
    identifier: &ast::ScopedIdentifier,
    span: Span,
    input: &TypeSpecifier,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    if let [name] = identifier.segments.as_slice() {
        if input.is_nothing() {
            return match scope.get(name) {
                Some(ty) => Ok(TypedExpression::FieldInScope {
                    name: name.clone(),
                    ty: ty.clone(),
                }),
                None => Err(SemanticError::new(
                    SemanticErrorKind::FieldNotInScope {
                        field: Tag::named(name.clone()),
                    },
                    span,
                )),
            };
        }
        // with a flowing input a bare name reads a record field of it
        let tag = Tag::named(name.clone());
        return match raw_type(input, ctx, span)? {
            RawType::Record(fields) => match fields.get(&tag) {
                Some(field_ty) => Ok(TypedExpression::Access {
                    prefix: Box::new(TypedExpression::Input { ty: input.clone() }),
                    field: tag,
                    ty: field_ty.clone(),
                }),
                None => Err(SemanticError::new(
                    SemanticErrorKind::FieldNotInScope { field: tag },
                    span,
                )),
            },
            _ => Err(SemanticError::new(
                SemanticErrorKind::FieldNotInScope { field: tag },
                span,
            )),
        };
    }

    // a qualified name can be a bare choice arm like `Toggle::on`
    if let Some((constructor, ty)) = bare_constructor(identifier, ctx, span)? {
        expect_nothing_input(input, span)?;
        return Ok(TypedExpression::Constructor {
            ty,
            tag: constructor,
            payload: None,
        });
    }

    Err(SemanticError::unsupported(
        "qualified value references",
        span,
    ))
}

/// `Type::arm` with a payload-free arm constructs the arm directly.
fn bare_constructor(
    identifier: &ast::ScopedIdentifier,
    ctx: &Context,
    span: Span,
) -> Result<Option<(Tag, TypeSpecifier)>, SemanticError> {
    let Some((arm, type_segments)) = identifier.segments.split_last() else {
        return Ok(None);
    };
    if type_segments.is_empty() {
        return Ok(None);
    }
    let type_name = QualifiedName::new(type_segments.to_vec());
    if !ctx.types.contains_key(&type_name) {
        return Ok(None);
    }
    let nominal = TypeSpecifier::Nominal(type_name);
    let RawType::Choice(arms) = raw_type(&nominal, ctx, span)? else {
        return Ok(None);
    };
    let tag = Tag::named(arm.clone());
    match arms.get(&tag) {
        Some(payload) if payload.is_nothing() => Ok(Some((tag, nominal))),
        Some(_) => Err(SemanticError::new(
            SemanticErrorKind::ArgumentMismatch {
                identifier: identifier.to_qualified_name(),
                input: TypeSpecifier::nothing(),
            },
            span,
        )),
        None => Err(SemanticError::new(
            SemanticErrorKind::FieldNotInScope { field: tag },
            span,
        )),
    }
}

/// Tagged-interleave lowering of an argument list: named arguments keep
/// their tag, positional ones take the running index. Every argument is
/// its own expression and checks with an empty input.
pub fn check_arguments(
    arguments: &[ast::Expression],
    scope: &LocalScope,
    ctx: &Context,
) -> Result<BTreeMap<Tag, TypedExpression>, SemanticError> {
    let mut typed = BTreeMap::new();
    let mut counter: u64 = 0;
    for argument in arguments {
        let (tag, value, span) = match argument {
            ast::Expression::Tagged {
                tag,
                tag_span,
                expression,
                ..
            } => (Tag::named(tag.clone()), expression.as_ref(), *tag_span),
            other => {
                let tag = Tag::Unnamed(counter);
                (tag, other, other.span())
            }
        };
        counter += 1;
        if typed.contains_key(&tag) {
            return Err(SemanticError::new(
                SemanticErrorKind::DuplicateExpressionField { tag },
                span,
            ));
        }
        typed.insert(tag, check(value, &TypeSpecifier::nothing(), scope, ctx)?);
    }
    Ok(typed)
}

fn check_call(
    callee: &ast::Expression,
    arguments: &[ast::Expression],
    span: Span,
    input: &TypeSpecifier,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    let typed_arguments = check_arguments(arguments, scope, ctx)?;

    match callee {
        ast::Expression::Field { identifier, .. } => {
            let qualified = identifier.to_qualified_name();

            if ctx.types.contains_key(&qualified) {
                expect_nothing_input(input, span)?;
                return check_initializer(&qualified, typed_arguments, span, ctx);
            }

            if let Some(constructor) =
                constructor_call(identifier, &typed_arguments, span, input, ctx)?
            {
                return Ok(constructor);
            }

            let input_expression = if input.is_nothing() {
                TypedExpression::Unit
            } else {
                TypedExpression::Input { ty: input.clone() }
            };
            function_call(
                qualified,
                input.clone(),
                input_expression,
                typed_arguments,
                span,
                ctx,
            )
        }
        // method-call sugar: `value.name(args)` pipes the prefix into the
        // function as its input
        ast::Expression::Access { prefix, field, .. } => {
            let prefix_typed = check(prefix, input, scope, ctx)?;
            let prefix_ty = prefix_typed.ty();
            function_call(
                QualifiedName::single(field.clone()),
                prefix_ty,
                prefix_typed,
                typed_arguments,
                span,
                ctx,
            )
        }
        _ => Err(SemanticError::unsupported("computed call targets", span)),
    }
}

fn check_initializer(
    type_name: &QualifiedName,
    arguments: BTreeMap<Tag, TypedExpression>,
    span: Span,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    let nominal = TypeSpecifier::Nominal(type_name.clone());
    match raw_type(&nominal, ctx, span)? {
        RawType::Record(fields) => {
            let shapes_match = fields.len() == arguments.len()
                && fields.iter().all(|(tag, field_ty)| {
                    arguments
                        .get(tag)
                        .is_some_and(|argument| &argument.ty() == field_ty)
                });
            if !shapes_match {
                return Err(SemanticError::new(
                    SemanticErrorKind::ArgumentMismatch {
                        identifier: type_name.clone(),
                        input: TypeSpecifier::nothing(),
                    },
                    span,
                ));
            }
            Ok(TypedExpression::Initializer {
                ty: nominal,
                arguments,
            })
        }
        RawType::Choice(_) => Err(SemanticError::unsupported(
            "constructing a choice by type name",
            span,
        )),
        RawType::Intrinsic(_) => Err(SemanticError::unsupported(
            "intrinsic initializers",
            span,
        )),
    }
}

/// `Type::arm(payload)` over a declared choice type.
fn constructor_call(
    identifier: &ast::ScopedIdentifier,
    arguments: &BTreeMap<Tag, TypedExpression>,
    span: Span,
    input: &TypeSpecifier,
    ctx: &Context,
) -> Result<Option<TypedExpression>, SemanticError> {
    let Some((arm, type_segments)) = identifier.segments.split_last() else {
        return Ok(None);
    };
    if type_segments.is_empty() {
        return Ok(None);
    }
    let type_name = QualifiedName::new(type_segments.to_vec());
    if !ctx.types.contains_key(&type_name) {
        return Ok(None);
    }
    expect_nothing_input(input, span)?;

    let nominal = TypeSpecifier::Nominal(type_name);
    let RawType::Choice(arms) = raw_type(&nominal, ctx, span)? else {
        return Err(SemanticError::unsupported(
            "member calls on non-choice types",
            span,
        ));
    };
    let tag = Tag::named(arm.clone());
    let Some(payload_ty) = arms.get(&tag) else {
        return Err(SemanticError::new(
            SemanticErrorKind::FieldNotInScope { field: tag },
            span,
        ));
    };

    let mismatch = || {
        SemanticError::new(
            SemanticErrorKind::ArgumentMismatch {
                identifier: identifier.to_qualified_name(),
                input: TypeSpecifier::nothing(),
            },
            span,
        )
    };

    if payload_ty.is_nothing() {
        if arguments.is_empty() {
            return Ok(Some(TypedExpression::Constructor {
                ty: nominal,
                tag,
                payload: None,
            }));
        }
        return Err(mismatch());
    }

    if arguments.len() != 1 {
        return Err(mismatch());
    }
    let Some(payload) = arguments.get(&Tag::Unnamed(0)) else {
        return Err(mismatch());
    };
    if &payload.ty() != payload_ty {
        return Err(mismatch());
    }
    Ok(Some(TypedExpression::Constructor {
        ty: nominal,
        tag,
        payload: Some(Box::new(payload.clone())),
    }))
}

/// Overload lookup with actionable failures, most specific first: unknown
/// name, then known name but not for this input, then argument mismatch.
fn function_call(
    identifier: QualifiedName,
    input: TypeSpecifier,
    input_expression: TypedExpression,
    arguments: BTreeMap<Tag, TypedExpression>,
    span: Span,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    let signature = FunctionSignature {
        identifier: identifier.clone(),
        input: input.clone(),
        arguments: arguments
            .iter()
            .map(|(tag, argument)| (tag.clone(), argument.ty()))
            .collect(),
    };

    if let Some(decl) = ctx.functions.get(&signature) {
        return Ok(TypedExpression::Call {
            signature,
            input: Box::new(input_expression),
            arguments,
            ty: decl.output.clone(),
        });
    }

    if !ctx.knows_function(&identifier) {
        return Err(SemanticError::new(
            SemanticErrorKind::UndefinedFunction { identifier },
            span,
        ));
    }
    if !ctx.knows_function_on_input(&identifier, &input) {
        return Err(SemanticError::new(
            SemanticErrorKind::UndefinedFunctionOnInput { identifier, input },
            span,
        ));
    }
    Err(SemanticError::new(
        SemanticErrorKind::ArgumentMismatch { identifier, input },
        span,
    ))
}
