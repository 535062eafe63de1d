use crate::language::{
    ast,
    errors::{SemanticError, SemanticErrorKind},
    semantic::{Pattern, TypedBranch, TypedBranchBody, TypedExpression},
    span::Span,
    typecheck::{
        checker::{check, raw_type, LocalScope},
        Context,
    },
    types::{RawType, Tag, TypeSpecifier},
};
use std::collections::BTreeMap;

/// Checks a branched expression against the value flowing into it. Each
/// branch matches the whole input (one capture) or, for record inputs,
/// its fields one capture each. Exhaustiveness is not checked; a match
/// that falls through is a runtime concern of the caller.
pub fn check_branched(
    branches: &[ast::Branch],
    default_branch: Option<&ast::Expression>,
    span: Span,
    input: &TypeSpecifier,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<TypedExpression, SemanticError> {
    let input_raw = raw_type(input, ctx, span)?;

    let mut typed_branches = Vec::with_capacity(branches.len());
    for branch in branches {
        typed_branches.push(check_branch(branch, input, &input_raw, scope, ctx)?);
    }

    let typed_default = match default_branch {
        Some(default) => Some(Box::new(check(
            default,
            &TypeSpecifier::nothing(),
            scope,
            ctx,
        )?)),
        None => None,
    };

    let ty = result_type(&typed_branches, typed_default.as_deref());
    Ok(TypedExpression::Branched {
        branches: typed_branches,
        default_branch: typed_default,
        ty,
    })
}

fn check_branch(
    branch: &ast::Branch,
    input: &TypeSpecifier,
    input_raw: &RawType,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<TypedBranch, SemanticError> {
    let mut bindings: BTreeMap<String, TypeSpecifier> = BTreeMap::new();

    let pattern = match (input_raw, branch.captures.as_slice()) {
        (_, [capture]) => lower_pattern(capture, input, &mut bindings, scope, ctx)?,
        (RawType::Record(fields), captures) if captures.len() == fields.len() => {
            Pattern::Destructor(destructure(captures, fields, &mut bindings, scope, ctx)?)
        }
        (RawType::Record(fields), captures) => {
            return Err(SemanticError::new(
                SemanticErrorKind::CaptureGroupCountMismatch {
                    expected: fields.len().max(1),
                    received: captures.len(),
                },
                branch.span,
            ));
        }
        (_, captures) => {
            return Err(SemanticError::new(
                SemanticErrorKind::CaptureGroupCountMismatch {
                    expected: 1,
                    received: captures.len(),
                },
                branch.span,
            ));
        }
    };

    let branch_scope = scope.extended(bindings);

    let guard = match &branch.guard {
        Some(guard) => {
            let typed = check(guard, &TypeSpecifier::nothing(), &branch_scope, ctx)?;
            let received = typed.ty();
            if received != TypeSpecifier::bool() {
                return Err(SemanticError::new(
                    SemanticErrorKind::GuardNotBool { received },
                    guard.span(),
                ));
            }
            Some(typed)
        }
        None => None,
    };

    let body = match &branch.body {
        ast::BranchBody::Simple(body) => TypedBranchBody::Simple(check(
            body,
            &TypeSpecifier::nothing(),
            &branch_scope,
            ctx,
        )?),
        ast::BranchBody::Looped(body) => {
            let typed = check(body, &TypeSpecifier::nothing(), &branch_scope, ctx)?;
            let received = typed.ty();
            if &received != input {
                return Err(SemanticError::new(
                    SemanticErrorKind::LoopedExpressionTypeMismatch {
                        expected: input.clone(),
                        received,
                    },
                    body.span(),
                ));
            }
            TypedBranchBody::Looped(typed)
        }
    };

    Ok(TypedBranch {
        pattern,
        guard,
        body,
    })
}

/// One capture per record field. A tagged capture names its field; an
/// untagged capture takes the field at its own position in the record's
/// declaration order, whatever that field's tag is.
fn destructure(
    captures: &[ast::Expression],
    fields: &BTreeMap<Tag, TypeSpecifier>,
    bindings: &mut BTreeMap<String, TypeSpecifier>,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<BTreeMap<Tag, Pattern>, SemanticError> {
    let order = field_order(fields);
    let mut patterns = BTreeMap::new();
    for (position, capture) in captures.iter().enumerate() {
        let (tag, value, span) = match capture {
            ast::Expression::Tagged {
                tag,
                tag_span,
                expression,
                ..
            } => (Some(Tag::named(tag.clone())), expression.as_ref(), *tag_span),
            other => (None, other, other.span()),
        };
        let tag = match tag {
            Some(named) => named,
            None => match order.get(position) {
                Some(field) => field.clone(),
                None => {
                    return Err(SemanticError::new(
                        SemanticErrorKind::FieldNotInScope {
                            field: Tag::Unnamed(position as u64),
                        },
                        span,
                    ));
                }
            },
        };
        let Some(field_ty) = fields.get(&tag) else {
            return Err(SemanticError::new(
                SemanticErrorKind::FieldNotInScope { field: tag },
                span,
            ));
        };
        if patterns.contains_key(&tag) {
            return Err(SemanticError::new(
                SemanticErrorKind::DuplicateExpressionField { tag },
                span,
            ));
        }
        patterns.insert(tag, lower_pattern(value, field_ty, bindings, scope, ctx)?);
    }
    Ok(patterns)
}

/// Reconstructs the declaration order of a record's fields: an unnamed
/// tag is its own position, named tags fill the remaining positions in
/// tag order.
fn field_order(fields: &BTreeMap<Tag, TypeSpecifier>) -> Vec<Tag> {
    let mut slots: Vec<Option<Tag>> = vec![None; fields.len()];
    let mut rest = Vec::new();
    for tag in fields.keys() {
        match tag {
            Tag::Unnamed(index)
                if (*index as usize) < slots.len() && slots[*index as usize].is_none() =>
            {
                slots[*index as usize] = Some(tag.clone());
            }
            _ => rest.push(tag.clone()),
        }
    }
    let mut rest = rest.into_iter();
    let mut ordered = Vec::with_capacity(fields.len());
    for slot in slots {
        match slot {
            Some(tag) => ordered.push(tag),
            None => {
                if let Some(tag) = rest.next() {
                    ordered.push(tag);
                }
            }
        }
    }
    ordered
}

/// Lowers one capture expression into a pattern against the type it
/// matches. Bindings land in the branch scope; everything else is either
/// structure or a plain value compared at runtime.
fn lower_pattern(
    capture: &ast::Expression,
    matched: &TypeSpecifier,
    bindings: &mut BTreeMap<String, TypeSpecifier>,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<Pattern, SemanticError> {
    match capture {
        ast::Expression::Binding { identifier, .. } => {
            bindings.insert(identifier.clone(), matched.clone());
            Ok(Pattern::Binding(identifier.clone()))
        }
        ast::Expression::Field { identifier, .. } if identifier.segments == ["_"] => {
            Ok(Pattern::Wildcard)
        }
        ast::Expression::Tagged {
            tag,
            tag_span,
            expression,
            ..
        } => {
            let RawType::Choice(arms) = raw_type(matched, ctx, *tag_span)? else {
                return Err(SemanticError::new(
                    SemanticErrorKind::FieldNotInScope {
                        field: Tag::named(tag.clone()),
                    },
                    *tag_span,
                ));
            };
            let tag = Tag::named(tag.clone());
            let Some(payload_ty) = arms.get(&tag) else {
                return Err(SemanticError::new(
                    SemanticErrorKind::FieldNotInScope { field: tag },
                    *tag_span,
                ));
            };
            let pattern = lower_pattern(expression, payload_ty, bindings, scope, ctx)?;
            Ok(Pattern::Constructor {
                tag,
                pattern: Box::new(pattern),
            })
        }
        ast::Expression::Call {
            callee,
            arguments,
            span,
        } => {
            let RawType::Record(fields) = raw_type(matched, ctx, *span)? else {
                return value_pattern(capture, matched, scope, ctx);
            };
            // the callee must name the matched type itself
            let named = match callee.as_ref() {
                ast::Expression::Field { identifier, .. } => {
                    Some(TypeSpecifier::Nominal(identifier.to_qualified_name()))
                }
                _ => None,
            };
            match named {
                Some(named) if &named == matched => {}
                named => {
                    return Err(SemanticError::new(
                        SemanticErrorKind::InputMismatch {
                            expected: matched.clone(),
                            received: named.unwrap_or_else(TypeSpecifier::nothing),
                        },
                        *span,
                    )
                    .with_help("destructure a record with its own type name"));
                }
            }
            Ok(Pattern::Destructor(destructure(
                arguments, &fields, bindings, scope, ctx,
            )?))
        }
        _ => value_pattern(capture, matched, scope, ctx),
    }
}

/// A capture that introduces no names is an ordinary expression whose
/// value the match compares against. It sees the enclosing scope only.
fn value_pattern(
    capture: &ast::Expression,
    matched: &TypeSpecifier,
    scope: &LocalScope,
    ctx: &Context,
) -> Result<Pattern, SemanticError> {
    let typed = check(capture, &TypeSpecifier::nothing(), scope, ctx)?;
    let received = typed.ty();
    if &received != matched {
        return Err(SemanticError::new(
            SemanticErrorKind::InputMismatch {
                expected: matched.clone(),
                received,
            },
            capture.span(),
        ));
    }
    Ok(Pattern::Value(typed))
}

/// The distinct types the match can produce, in the order branches first
/// produce them. Looped branches produce nothing; neither does a branch
/// typed `Never`.
fn result_type(
    branches: &[TypedBranch],
    default_branch: Option<&TypedExpression>,
) -> TypeSpecifier {
    let mut distinct: Vec<TypeSpecifier> = Vec::new();
    let produced = branches
        .iter()
        .map(TypedBranch::ty)
        .chain(default_branch.map(TypedExpression::ty));
    for ty in produced {
        if !ty.is_never() && !distinct.contains(&ty) {
            distinct.push(ty);
        }
    }
    match distinct.len() {
        0 => TypeSpecifier::never(),
        1 => distinct.remove(0),
        _ => TypeSpecifier::Raw(RawType::Choice(
            distinct
                .into_iter()
                .enumerate()
                .map(|(index, ty)| (Tag::Unnamed(index as u64), ty))
                .collect(),
        )),
    }
}
