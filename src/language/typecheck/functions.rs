use crate::language::{
    ast,
    errors::{sort_errors, SemanticError, SemanticErrorKind},
    typecheck::{
        resolve, DeclarationsContext, FunctionDecl, FunctionDeclarationsMap, FunctionLookupMap,
        OperatorKey, OperatorMap,
    },
    types::{FunctionSignature, QualifiedName, Tag, TypeDeclarationsMap, TypeSpecifier},
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug)]
pub struct FunctionResolution {
    pub declarations: FunctionDeclarationsMap,
    pub lookup: FunctionLookupMap,
    pub operators: OperatorMap,
    pub errors: Vec<SemanticError>,
}

/// Mirrors type symbol resolution over value and operator definitions,
/// keyed by full signature so overloads on input type or argument shape
/// coexist. Consumes the already frozen type declarations (module merged
/// over base) to lower every signature type.
pub fn resolve_function_symbols(
    module: &ast::Module,
    types: &TypeDeclarationsMap,
    base: &DeclarationsContext,
) -> FunctionResolution {
    let mut errors = Vec::new();
    let known: BTreeSet<QualifiedName> = types.keys().cloned().collect();

    let mut groups: BTreeMap<FunctionSignature, Vec<&ast::ValueDefinition>> = BTreeMap::new();
    let mut decls: BTreeMap<FunctionSignature, FunctionDecl> = BTreeMap::new();

    for definition in &module.definitions {
        let value = match definition {
            ast::Definition::Value(value) => value,
            ast::Definition::Type(_) => continue,
            ast::Definition::Operator(_) => continue,
        };
        let identifier = value.identifier.to_qualified_name();

        let Some(signature_syntax) = &value.signature else {
            errors.push(SemanticError::unsupported(
                "module constants",
                value.span,
            ));
            continue;
        };

        if known.contains(&identifier) {
            errors.push(SemanticError::new(
                SemanticErrorKind::FunctionRedeclaringType {
                    identifier: identifier.clone(),
                },
                value.identifier.span,
            ));
            continue;
        }

        errors.extend(signature_scope_errors(signature_syntax, &known));

        match lower_signature(&identifier, signature_syntax) {
            Ok((signature, decl)) => {
                groups.entry(signature.clone()).or_default().push(value);
                decls.entry(signature).or_insert(decl);
            }
            Err(error) => errors.push(error),
        }
    }

    let mut lookup = FunctionLookupMap::new();
    let mut declarations = FunctionDeclarationsMap::new();
    for (signature, definitions) in &groups {
        if definitions.len() > 1 {
            let all_spans: Vec<_> = definitions
                .iter()
                .map(|definition| definition.identifier.span)
                .collect();
            for duplicate in &definitions[1..] {
                errors.push(SemanticError::new(
                    SemanticErrorKind::ValueRedeclaration {
                        signature: signature.canonical_name(),
                        other_spans: all_spans.clone(),
                    },
                    duplicate.identifier.span,
                ));
            }
        }
        if let Some(first) = definitions.first() {
            lookup.insert(signature.clone(), (*first).clone());
        }
        if let Some(decl) = decls.get(signature) {
            declarations.insert(signature.clone(), decl.clone());
        }
    }

    let operators = resolve_operators(module, base, &mut errors);

    sort_errors(&mut errors);

    FunctionResolution {
        declarations,
        lookup,
        operators,
        errors,
    }
}

/// Builds the overload key and declaration record from a surface function
/// type. An untagged input flows in as the pipeline value; a tagged input
/// instead binds a named scope field, so its tag must not collide with an
/// argument tag.
pub fn lower_signature(
    identifier: &QualifiedName,
    signature: &ast::FunctionType,
) -> Result<(FunctionSignature, FunctionDecl), SemanticError> {
    let (input_tag, input) = match &signature.input {
        None => (None, TypeSpecifier::nothing()),
        Some(ast::TypeField::Plain(specifier)) => (None, resolve::lower_specifier(specifier)?),
        Some(ast::TypeField::Tagged {
            tag,
            tag_span,
            specifier,
        }) => {
            let Some(specifier) = specifier else {
                return Err(SemanticError::new(
                    SemanticErrorKind::FieldTypeRequired {
                        tag: Tag::named(tag.clone()),
                    },
                    *tag_span,
                ));
            };
            (
                Some(tag.clone()),
                resolve::lower_specifier(specifier)?,
            )
        }
        Some(homogeneous @ ast::TypeField::Homogeneous { .. }) => {
            let fields = resolve::product_fields(std::slice::from_ref(homogeneous))?;
            (
                None,
                TypeSpecifier::Raw(crate::language::types::RawType::Record(fields)),
            )
        }
    };

    let arguments = resolve::product_fields(&signature.arguments)?;

    if let Some(tag) = &input_tag {
        if arguments.contains_key(&Tag::named(tag.clone())) {
            return Err(SemanticError::new(
                SemanticErrorKind::DuplicateFieldName {
                    tag: Tag::named(tag.clone()),
                },
                signature.span,
            ));
        }
    }

    let output = resolve::lower_specifier(&signature.output)?;

    Ok((
        FunctionSignature {
            identifier: identifier.clone(),
            input,
            arguments,
        },
        FunctionDecl { input_tag, output },
    ))
}

fn signature_scope_errors(
    signature: &ast::FunctionType,
    known: &BTreeSet<QualifiedName>,
) -> Vec<SemanticError> {
    let mut references = Vec::new();
    if let Some(input) = &signature.input {
        collect_field_references(input, &mut references);
    }
    for argument in &signature.arguments {
        collect_field_references(argument, &mut references);
    }
    resolve::collect_type_identifiers(&signature.output, &mut references);

    references
        .into_iter()
        .filter(|reference| !known.contains(&reference.to_qualified_name()))
        .map(|reference| {
            SemanticError::new(
                SemanticErrorKind::TypeNotInScope {
                    identifier: reference.to_qualified_name(),
                },
                reference.span,
            )
        })
        .collect()
}

fn collect_field_references<'a>(
    field: &'a ast::TypeField,
    into: &mut Vec<&'a ast::ScopedIdentifier>,
) {
    match field {
        ast::TypeField::Plain(specifier) => resolve::collect_type_identifiers(specifier, into),
        ast::TypeField::Tagged { specifier, .. } => {
            if let Some(specifier) = specifier {
                resolve::collect_type_identifiers(specifier, into);
            }
        }
        ast::TypeField::Homogeneous { specifier, .. } => {
            resolve::collect_type_identifiers(specifier, into)
        }
    }
}

/// Operator overloads extend the builtin table; unary definitions store
/// `Nothing` on the left. Redefining a key the base context already owns
/// is a redeclaration like any other.
fn resolve_operators(
    module: &ast::Module,
    base: &DeclarationsContext,
    errors: &mut Vec<SemanticError>,
) -> OperatorMap {
    let mut operators = OperatorMap::new();
    for definition in &module.definitions {
        let ast::Definition::Operator(operator) = definition else {
            continue;
        };
        let lowered = (|| -> Result<(OperatorKey, TypeSpecifier), SemanticError> {
            let left = match &operator.left {
                Some(specifier) => resolve::lower_specifier(specifier)?,
                None => TypeSpecifier::nothing(),
            };
            let right = resolve::lower_specifier(&operator.right)?;
            let output = resolve::lower_specifier(&operator.output)?;
            Ok((
                OperatorKey {
                    left,
                    right,
                    op: operator.op,
                },
                output,
            ))
        })();
        match lowered {
            Ok((key, output)) => {
                if operators.contains_key(&key) || base.operators.contains_key(&key) {
                    errors.push(SemanticError::new(
                        SemanticErrorKind::OperatorRedeclaration { op: operator.op },
                        operator.span,
                    ));
                } else {
                    operators.insert(key, output);
                }
            }
            Err(error) => errors.push(error),
        }
    }
    operators
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Span;
    use crate::language::typecheck::builtins;

    fn sp(start: usize) -> Span {
        Span::new(start, start + 1)
    }

    fn nominal(name: &str, span: Span) -> ast::TypeSpecifier {
        ast::TypeSpecifier::Nominal {
            identifier: ast::ScopedIdentifier::single(name, span),
            type_arguments: Vec::new(),
            span,
        }
    }

    fn unit_body() -> ast::Expression {
        ast::Expression::Unit(Span::new(0, 0))
    }

    fn value_definition(
        name: &str,
        span: Span,
        signature: ast::FunctionType,
    ) -> ast::Definition {
        ast::Definition::Value(ast::ValueDefinition {
            identifier: ast::ScopedIdentifier::single(name, span),
            signature: Some(signature),
            body: unit_body(),
            span,
        })
    }

    fn resolve_in_base(definitions: Vec<ast::Definition>) -> FunctionResolution {
        let base = builtins::builtin_context();
        resolve_function_symbols(
            &ast::Module {
                name: "main".to_string(),
                definitions,
            },
            &base.types,
            base,
        )
    }

    fn int_to_int(input_name: Option<&str>) -> ast::FunctionType {
        ast::FunctionType {
            input: Some(match input_name {
                Some(name) => ast::TypeField::Tagged {
                    tag: name.to_string(),
                    tag_span: sp(0),
                    specifier: Some(nominal("Int", sp(1))),
                },
                None => ast::TypeField::Plain(nominal("Int", sp(1))),
            }),
            arguments: Vec::new(),
            output: nominal("Int", sp(2)),
            span: sp(0),
        }
    }

    #[test]
    fn overloads_on_input_type_coexist() {
        let resolution = resolve_in_base(vec![
            value_definition("double", sp(0), int_to_int(None)),
            value_definition(
                "double",
                sp(10),
                ast::FunctionType {
                    input: Some(ast::TypeField::Plain(nominal("Float", sp(11)))),
                    arguments: Vec::new(),
                    output: nominal("Float", sp(12)),
                    span: sp(10),
                },
            ),
        ]);
        assert!(resolution.errors.is_empty(), "{:?}", resolution.errors);
        assert_eq!(resolution.declarations.len(), 2);
    }

    #[test]
    fn identical_signatures_collide() {
        let resolution = resolve_in_base(vec![
            value_definition("double", sp(0), int_to_int(None)),
            value_definition("double", sp(10), int_to_int(None)),
        ]);
        let redeclarations: Vec<_> = resolution
            .errors
            .iter()
            .filter(|error| {
                matches!(error.kind, SemanticErrorKind::ValueRedeclaration { .. })
            })
            .collect();
        assert_eq!(redeclarations.len(), 1);
        // the first declaration still resolves
        assert_eq!(resolution.declarations.len(), 1);
    }

    #[test]
    fn input_tag_does_not_split_overloads() {
        // same name, same input type, different input tag: still one entry
        let resolution = resolve_in_base(vec![
            value_definition("double", sp(0), int_to_int(None)),
            value_definition("double", sp(10), int_to_int(Some("value"))),
        ]);
        assert_eq!(resolution.declarations.len(), 1);
        assert!(resolution
            .errors
            .iter()
            .any(|error| matches!(error.kind, SemanticErrorKind::ValueRedeclaration { .. })));
    }

    #[test]
    fn function_sharing_a_type_name_is_its_own_error() {
        let resolution = resolve_in_base(vec![value_definition("Int", sp(0), int_to_int(None))]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::FunctionRedeclaringType { identifier })
                if identifier == &QualifiedName::single("Int")
        ));
    }

    #[test]
    fn named_input_may_not_collide_with_an_argument() {
        let signature = ast::FunctionType {
            input: Some(ast::TypeField::Tagged {
                tag: "value".to_string(),
                tag_span: sp(1),
                specifier: Some(nominal("Int", sp(2))),
            }),
            arguments: vec![ast::TypeField::Tagged {
                tag: "value".to_string(),
                tag_span: sp(3),
                specifier: Some(nominal("Int", sp(4))),
            }],
            output: nominal("Int", sp(5)),
            span: sp(0),
        };
        let resolution = resolve_in_base(vec![value_definition("clamp", sp(0), signature)]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::DuplicateFieldName { tag }) if tag == &Tag::named("value")
        ));
    }

    #[test]
    fn unknown_signature_types_are_reported() {
        let signature = ast::FunctionType {
            input: Some(ast::TypeField::Plain(nominal("Mystery", sp(1)))),
            arguments: Vec::new(),
            output: nominal("Int", sp(2)),
            span: sp(0),
        };
        let resolution = resolve_in_base(vec![value_definition("consume", sp(0), signature)]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::TypeNotInScope { identifier })
                if identifier == &QualifiedName::single("Mystery")
        ));
    }

    #[test]
    fn redefining_a_builtin_operator_is_rejected() {
        let resolution = resolve_in_base(vec![ast::Definition::Operator(
            ast::OperatorDefinition {
                op: ast::Operator::Plus,
                left: Some(nominal("Int", sp(1))),
                right: nominal("Int", sp(2)),
                output: nominal("Int", sp(3)),
                span: sp(0),
            },
        )]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::OperatorRedeclaration { op: ast::Operator::Plus })
        ));
    }
}
