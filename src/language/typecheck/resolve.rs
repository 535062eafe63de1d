use crate::language::{
    ast,
    errors::{sort_errors, SemanticError, SemanticErrorKind},
    typecheck::{DeclarationsContext, TypeLookupMap},
    types::{QualifiedName, RawType, Tag, TypeDeclarationsMap, TypeSpecifier},
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug)]
pub struct TypeResolution {
    pub declarations: TypeDeclarationsMap,
    pub lookup: TypeLookupMap,
    pub errors: Vec<SemanticError>,
}

/// Resolves every type declared in the module against the supplied base
/// context: redeclaration grouping, scope checks, cycle detection, then
/// lowering into the frozen declarations map. Collects every error it
/// finds; a broken declaration never stops the pass.
pub fn resolve_type_symbols(module: &ast::Module, base: &DeclarationsContext) -> TypeResolution {
    let mut errors = Vec::new();

    let mut groups: BTreeMap<QualifiedName, Vec<&ast::TypeDefinition>> = BTreeMap::new();
    for definition in &module.definitions {
        if let ast::Definition::Type(type_definition) = definition {
            groups
                .entry(type_definition.identifier.to_qualified_name())
                .or_default()
                .push(type_definition);
        }
    }

    let mut lookup = TypeLookupMap::new();
    for (identifier, definitions) in &groups {
        if definitions.len() > 1 {
            let all_spans: Vec<_> = definitions
                .iter()
                .map(|definition| definition.identifier.span)
                .collect();
            for duplicate in &definitions[1..] {
                errors.push(SemanticError::new(
                    SemanticErrorKind::TypeRedeclaration {
                        identifier: identifier.clone(),
                        other_spans: all_spans.clone(),
                    },
                    duplicate.identifier.span,
                ));
            }
        }
        if let Some(first) = definitions.first() {
            lookup.insert(identifier.clone(), (*first).clone());
        }
    }

    for (identifier, definition) in &lookup {
        if base.types.contains_key(identifier) {
            errors.push(SemanticError::new(
                SemanticErrorKind::TypeShadowing {
                    identifier: identifier.clone(),
                },
                definition.identifier.span,
            ));
        }
    }

    let known: BTreeSet<QualifiedName> = lookup
        .keys()
        .chain(base.types.keys())
        .cloned()
        .collect();
    for definition in lookup.values() {
        for reference in undefined_types(&definition.body, &known) {
            errors.push(SemanticError::new(
                SemanticErrorKind::TypeNotInScope {
                    identifier: reference.to_qualified_name(),
                },
                reference.span,
            ));
        }
    }

    errors.extend(check_cycles(&lookup));

    let mut declarations = TypeDeclarationsMap::new();
    for (identifier, definition) in &lookup {
        if !definition.type_parameters.is_empty() {
            errors.push(SemanticError::unsupported(
                "generic type parameters",
                definition.identifier.span,
            ));
            continue;
        }
        match lower_specifier(&definition.body) {
            Ok(lowered) => {
                declarations.insert(identifier.clone(), lowered);
            }
            Err(error) => errors.push(error),
        }
    }

    sort_errors(&mut errors);

    TypeResolution {
        declarations,
        lookup,
        errors,
    }
}

/// Lowers surface type syntax into the canonical semantic form. Nominal
/// references stay references; they resolve through the declarations map
/// at use sites so forward references cost nothing here.
pub fn lower_specifier(specifier: &ast::TypeSpecifier) -> Result<TypeSpecifier, SemanticError> {
    match specifier {
        ast::TypeSpecifier::Nothing(_) => Ok(TypeSpecifier::nothing()),
        ast::TypeSpecifier::Never(_) => Ok(TypeSpecifier::never()),
        ast::TypeSpecifier::Product { fields, .. } => {
            Ok(TypeSpecifier::Raw(RawType::Record(product_fields(fields)?)))
        }
        ast::TypeSpecifier::Sum { fields, .. } => {
            Ok(TypeSpecifier::Raw(RawType::Choice(sum_fields(fields)?)))
        }
        ast::TypeSpecifier::Nominal {
            identifier,
            type_arguments,
            span,
        } => {
            if type_arguments.is_empty() {
                Ok(TypeSpecifier::Nominal(identifier.to_qualified_name()))
            } else {
                Err(SemanticError::unsupported("generic type arguments", *span))
            }
        }
        ast::TypeSpecifier::Function(function) => Err(SemanticError::unsupported(
            "function types in type position",
            function.span,
        )),
        ast::TypeSpecifier::Existential { span, .. }
        | ast::TypeSpecifier::Universal { span, .. }
        | ast::TypeSpecifier::Belonging { span, .. } => Err(SemanticError::unsupported(
            "constrained generic types",
            *span,
        )),
    }
}

/// Record fields, left to right. The unnamed counter advances for every
/// field so a positional tag survives its neighbours gaining names, and a
/// homogeneous field expands into one unnamed slot per element.
pub fn product_fields(
    fields: &[ast::TypeField],
) -> Result<BTreeMap<Tag, TypeSpecifier>, SemanticError> {
    let mut lowered = BTreeMap::new();
    let mut counter: u64 = 0;
    for field in fields {
        match field {
            ast::TypeField::Plain(specifier) => {
                lowered.insert(Tag::Unnamed(counter), lower_specifier(specifier)?);
                counter += 1;
            }
            ast::TypeField::Tagged {
                tag,
                tag_span,
                specifier,
            } => {
                let named = Tag::named(tag.clone());
                if lowered.contains_key(&named) {
                    return Err(SemanticError::new(
                        SemanticErrorKind::DuplicateFieldName { tag: named },
                        *tag_span,
                    ));
                }
                let Some(specifier) = specifier else {
                    return Err(SemanticError::new(
                        SemanticErrorKind::FieldTypeRequired { tag: named },
                        *tag_span,
                    ));
                };
                lowered.insert(named, lower_specifier(specifier)?);
                counter += 1;
            }
            ast::TypeField::Homogeneous {
                specifier,
                count,
                span,
            } => {
                let element = lower_specifier(specifier)?;
                match count {
                    ast::HomogeneousCount::Literal(value) => {
                        for index in 0..*value {
                            lowered.insert(Tag::Unnamed(counter + index), element.clone());
                        }
                        counter += value;
                    }
                    ast::HomogeneousCount::Identifier(_) => {
                        return Err(SemanticError::unsupported(
                            "type-level value parameters",
                            *span,
                        ));
                    }
                }
            }
        }
    }
    Ok(lowered)
}

/// Choice arms, left to right. A tagged arm without a payload is a bare
/// case carrying `Nothing`; homogeneous fields have no meaning inside a
/// choice and are rejected outright.
pub fn sum_fields(
    fields: &[ast::TypeField],
) -> Result<BTreeMap<Tag, TypeSpecifier>, SemanticError> {
    let mut lowered = BTreeMap::new();
    let mut counter: u64 = 0;
    for field in fields {
        match field {
            ast::TypeField::Plain(specifier) => {
                lowered.insert(Tag::Unnamed(counter), lower_specifier(specifier)?);
                counter += 1;
            }
            ast::TypeField::Tagged {
                tag,
                tag_span,
                specifier,
            } => {
                let named = Tag::named(tag.clone());
                if lowered.contains_key(&named) {
                    return Err(SemanticError::new(
                        SemanticErrorKind::DuplicateFieldName { tag: named },
                        *tag_span,
                    ));
                }
                let payload = match specifier {
                    Some(specifier) => lower_specifier(specifier)?,
                    None => TypeSpecifier::nothing(),
                };
                lowered.insert(named, payload);
                counter += 1;
            }
            ast::TypeField::Homogeneous { span, .. } => {
                return Err(SemanticError::new(
                    SemanticErrorKind::HomogeneousTypeProductInSum,
                    *span,
                ));
            }
        }
    }
    Ok(lowered)
}

/// Every nominal reference inside the specifier, in syntax order.
pub fn collect_type_identifiers<'a>(
    specifier: &'a ast::TypeSpecifier,
    into: &mut Vec<&'a ast::ScopedIdentifier>,
) {
    match specifier {
        ast::TypeSpecifier::Nothing(_) | ast::TypeSpecifier::Never(_) => {}
        ast::TypeSpecifier::Nominal { identifier, .. } => into.push(identifier),
        ast::TypeSpecifier::Product { fields, .. } | ast::TypeSpecifier::Sum { fields, .. } => {
            for field in fields {
                collect_field_identifiers(field, into);
            }
        }
        ast::TypeSpecifier::Function(function) => {
            if let Some(input) = &function.input {
                collect_field_identifiers(input, into);
            }
            for argument in &function.arguments {
                collect_field_identifiers(argument, into);
            }
            collect_type_identifiers(&function.output, into);
        }
        ast::TypeSpecifier::Existential { .. } | ast::TypeSpecifier::Universal { .. } => {}
        ast::TypeSpecifier::Belonging { owner, .. } => collect_type_identifiers(owner, into),
    }
}

fn collect_field_identifiers<'a>(
    field: &'a ast::TypeField,
    into: &mut Vec<&'a ast::ScopedIdentifier>,
) {
    match field {
        ast::TypeField::Plain(specifier) => collect_type_identifiers(specifier, into),
        ast::TypeField::Tagged { specifier, .. } => {
            if let Some(specifier) = specifier {
                collect_type_identifiers(specifier, into);
            }
        }
        ast::TypeField::Homogeneous { specifier, .. } => {
            collect_type_identifiers(specifier, into)
        }
    }
}

/// References that resolve through neither the module nor the base
/// context.
pub fn undefined_types<'a>(
    specifier: &'a ast::TypeSpecifier,
    known: &BTreeSet<QualifiedName>,
) -> Vec<&'a ast::ScopedIdentifier> {
    let mut references = Vec::new();
    collect_type_identifiers(specifier, &mut references);
    references
        .into_iter()
        .filter(|reference| !known.contains(&reference.to_qualified_name()))
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum NodeState {
    Visiting,
    Visited,
}

struct CycleWalker<'a> {
    lookup: &'a TypeLookupMap,
    states: BTreeMap<QualifiedName, NodeState>,
    errors: Vec<SemanticError>,
}

/// Three-color walk over the nominal reference graph. Meeting a node that
/// is still `Visiting` means the current path closed a cycle; the walk
/// reports it and backs out instead of recursing forever.
fn check_cycles(lookup: &TypeLookupMap) -> Vec<SemanticError> {
    let mut walker = CycleWalker {
        lookup,
        states: BTreeMap::new(),
        errors: Vec::new(),
    };
    for (identifier, definition) in lookup {
        walker.visit_definition(identifier, definition);
    }
    walker.errors
}

impl CycleWalker<'_> {
    fn visit_definition(&mut self, identifier: &QualifiedName, definition: &ast::TypeDefinition) {
        match self.states.get(identifier) {
            Some(NodeState::Visited) => return,
            Some(NodeState::Visiting) => {
                self.errors.push(SemanticError::new(
                    SemanticErrorKind::CyclicType {
                        identifier: identifier.clone(),
                    },
                    definition.identifier.span,
                ));
                return;
            }
            None => {}
        }
        self.states
            .insert(identifier.clone(), NodeState::Visiting);
        self.visit_specifier(&definition.body);
        self.states.insert(identifier.clone(), NodeState::Visited);
    }

    fn visit_specifier(&mut self, specifier: &ast::TypeSpecifier) {
        match specifier {
            ast::TypeSpecifier::Nominal { identifier, .. } => {
                let qualified = identifier.to_qualified_name();
                // intrinsics and unknown names have no local definition
                let definition = self.lookup.get(&qualified).cloned();
                if let Some(definition) = definition {
                    self.visit_definition(&qualified, &definition);
                }
            }
            ast::TypeSpecifier::Product { fields, .. }
            | ast::TypeSpecifier::Sum { fields, .. } => {
                for field in fields {
                    match field {
                        ast::TypeField::Plain(inner) => self.visit_specifier(inner),
                        ast::TypeField::Tagged { specifier, .. } => {
                            if let Some(inner) = specifier {
                                self.visit_specifier(inner);
                            }
                        }
                        ast::TypeField::Homogeneous { specifier, .. } => {
                            self.visit_specifier(specifier)
                        }
                    }
                }
            }
            _ => {}
        }
    }
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

    fn type_definition(name: &str, span: Span, body: ast::TypeSpecifier) -> ast::Definition {
        ast::Definition::Type(ast::TypeDefinition {
            identifier: ast::ScopedIdentifier::single(name, span),
            type_parameters: Vec::new(),
            body,
            span,
        })
    }

    fn module(definitions: Vec<ast::Definition>) -> ast::Module {
        ast::Module {
            name: "main".to_string(),
            definitions,
        }
    }

    fn resolve(definitions: Vec<ast::Definition>) -> TypeResolution {
        resolve_type_symbols(&module(definitions), builtins::builtin_context())
    }

    #[test]
    fn redeclaring_a_type_keeps_the_first_declaration() {
        let resolution = resolve(vec![
            type_definition(
                "Foo",
                sp(0),
                ast::TypeSpecifier::Product {
                    fields: vec![ast::TypeField::Plain(nominal("Int", sp(1)))],
                    span: sp(1),
                },
            ),
            type_definition(
                "Foo",
                sp(10),
                ast::TypeSpecifier::Product {
                    fields: vec![ast::TypeField::Plain(nominal("Bool", sp(11)))],
                    span: sp(11),
                },
            ),
        ]);
        let redeclarations: Vec<_> = resolution
            .errors
            .iter()
            .filter(|error| matches!(error.kind, SemanticErrorKind::TypeRedeclaration { .. }))
            .collect();
        assert_eq!(redeclarations.len(), 1);
        if let SemanticErrorKind::TypeRedeclaration { other_spans, .. } = &redeclarations[0].kind {
            assert_eq!(other_spans, &vec![sp(0), sp(10)]);
        }
        assert_eq!(
            resolution.declarations.get(&QualifiedName::single("Foo")),
            Some(&TypeSpecifier::Raw(RawType::Record(BTreeMap::from([(
                Tag::Unnamed(0),
                TypeSpecifier::int()
            )]))))
        );
    }

    #[test]
    fn unknown_reference_is_reported_but_still_lowered() {
        let resolution = resolve(vec![type_definition(
            "Wrapper",
            sp(0),
            ast::TypeSpecifier::Product {
                fields: vec![ast::TypeField::Plain(nominal("Mystery", sp(3)))],
                span: sp(2),
            },
        )]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::TypeNotInScope { identifier })
                if identifier == &QualifiedName::single("Mystery")
        ));
        assert!(resolution
            .declarations
            .contains_key(&QualifiedName::single("Wrapper")));
    }

    #[test]
    fn mutual_recursion_is_a_cycle() {
        let resolution = resolve(vec![
            type_definition(
                "A",
                sp(0),
                ast::TypeSpecifier::Product {
                    fields: vec![ast::TypeField::Plain(nominal("B", sp(1)))],
                    span: sp(1),
                },
            ),
            type_definition(
                "B",
                sp(10),
                ast::TypeSpecifier::Product {
                    fields: vec![ast::TypeField::Plain(nominal("A", sp(11)))],
                    span: sp(11),
                },
            ),
        ]);
        assert!(resolution
            .errors
            .iter()
            .any(|error| matches!(error.kind, SemanticErrorKind::CyclicType { .. })));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let resolution = resolve(vec![type_definition(
            "List",
            sp(0),
            ast::TypeSpecifier::Sum {
                fields: vec![
                    ast::TypeField::Tagged {
                        tag: "empty".to_string(),
                        tag_span: sp(1),
                        specifier: None,
                    },
                    ast::TypeField::Tagged {
                        tag: "cons".to_string(),
                        tag_span: sp(2),
                        specifier: Some(nominal("List", sp(3))),
                    },
                ],
                span: sp(1),
            },
        )]);
        assert!(resolution
            .errors
            .iter()
            .any(|error| matches!(error.kind, SemanticErrorKind::CyclicType { identifier: ref id } if id == &QualifiedName::single("List"))));
    }

    #[test]
    fn unnamed_indices_count_every_field() {
        let resolution = resolve(vec![type_definition(
            "Mixed",
            sp(0),
            ast::TypeSpecifier::Product {
                fields: vec![
                    ast::TypeField::Plain(nominal("Int", sp(1))),
                    ast::TypeField::Tagged {
                        tag: "name".to_string(),
                        tag_span: sp(2),
                        specifier: Some(nominal("String", sp(3))),
                    },
                    ast::TypeField::Plain(nominal("Bool", sp(4))),
                ],
                span: sp(1),
            },
        )]);
        assert!(resolution.errors.is_empty());
        assert_eq!(
            resolution.declarations.get(&QualifiedName::single("Mixed")),
            Some(&TypeSpecifier::Raw(RawType::Record(BTreeMap::from([
                (Tag::Unnamed(0), TypeSpecifier::int()),
                (Tag::named("name"), TypeSpecifier::string()),
                (Tag::Unnamed(2), TypeSpecifier::bool()),
            ]))))
        );
    }

    #[test]
    fn homogeneous_product_expands_positionally() {
        let resolution = resolve(vec![type_definition(
            "Point",
            sp(0),
            ast::TypeSpecifier::Product {
                fields: vec![ast::TypeField::Homogeneous {
                    specifier: nominal("Float", sp(1)),
                    count: ast::HomogeneousCount::Literal(2),
                    span: sp(1),
                }],
                span: sp(1),
            },
        )]);
        assert!(resolution.errors.is_empty());
        assert_eq!(
            resolution.declarations.get(&QualifiedName::single("Point")),
            Some(&TypeSpecifier::Raw(RawType::Record(BTreeMap::from([
                (Tag::Unnamed(0), TypeSpecifier::float()),
                (Tag::Unnamed(1), TypeSpecifier::float()),
            ]))))
        );
    }

    #[test]
    fn homogeneous_field_in_sum_is_rejected() {
        let resolution = resolve(vec![type_definition(
            "Broken",
            sp(0),
            ast::TypeSpecifier::Sum {
                fields: vec![
                    ast::TypeField::Tagged {
                        tag: "ok".to_string(),
                        tag_span: sp(1),
                        specifier: None,
                    },
                    ast::TypeField::Homogeneous {
                        specifier: nominal("Int", sp(2)),
                        count: ast::HomogeneousCount::Literal(3),
                        span: sp(2),
                    },
                ],
                span: sp(1),
            },
        )]);
        assert!(resolution
            .errors
            .iter()
            .any(|error| error.kind == SemanticErrorKind::HomogeneousTypeProductInSum));
        assert!(!resolution
            .declarations
            .contains_key(&QualifiedName::single("Broken")));
    }

    #[test]
    fn bare_choice_arm_carries_nothing() {
        let resolution = resolve(vec![type_definition(
            "Toggle",
            sp(0),
            ast::TypeSpecifier::Sum {
                fields: vec![
                    ast::TypeField::Tagged {
                        tag: "on".to_string(),
                        tag_span: sp(1),
                        specifier: None,
                    },
                    ast::TypeField::Tagged {
                        tag: "off".to_string(),
                        tag_span: sp(2),
                        specifier: None,
                    },
                ],
                span: sp(1),
            },
        )]);
        assert_eq!(
            resolution.declarations.get(&QualifiedName::single("Toggle")),
            Some(&TypeSpecifier::Raw(RawType::Choice(BTreeMap::from([
                (Tag::named("on"), TypeSpecifier::nothing()),
                (Tag::named("off"), TypeSpecifier::nothing()),
            ]))))
        );
    }

    #[test]
    fn duplicate_record_tag_is_rejected() {
        let resolution = resolve(vec![type_definition(
            "Twice",
            sp(0),
            ast::TypeSpecifier::Product {
                fields: vec![
                    ast::TypeField::Tagged {
                        tag: "x".to_string(),
                        tag_span: sp(1),
                        specifier: Some(nominal("Int", sp(2))),
                    },
                    ast::TypeField::Tagged {
                        tag: "x".to_string(),
                        tag_span: sp(3),
                        specifier: Some(nominal("Int", sp(4))),
                    },
                ],
                span: sp(1),
            },
        )]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::DuplicateFieldName { tag }) if tag == &Tag::named("x")
        ));
    }

    #[test]
    fn shadowing_a_builtin_is_reported() {
        let resolution = resolve(vec![type_definition(
            "Int",
            sp(0),
            ast::TypeSpecifier::Product {
                fields: Vec::new(),
                span: sp(1),
            },
        )]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::TypeShadowing { identifier })
                if identifier == &QualifiedName::single("Int")
        ));
    }

    #[test]
    fn constrained_generics_are_explicitly_unsupported() {
        let resolution = resolve(vec![type_definition(
            "Showable",
            sp(0),
            ast::TypeSpecifier::Existential {
                interfaces: vec![ast::ScopedIdentifier::single("Show", sp(1))],
                span: sp(1),
            },
        )]);
        assert!(matches!(
            resolution.errors.first().map(|e| &e.kind),
            Some(SemanticErrorKind::UnsupportedYet { .. })
        ));
    }

    #[test]
    fn resolution_is_idempotent() {
        let definitions = vec![
            type_definition(
                "A",
                sp(0),
                ast::TypeSpecifier::Product {
                    fields: vec![ast::TypeField::Plain(nominal("B", sp(1)))],
                    span: sp(1),
                },
            ),
            type_definition(
                "B",
                sp(10),
                ast::TypeSpecifier::Product {
                    fields: vec![ast::TypeField::Plain(nominal("A", sp(11)))],
                    span: sp(11),
                },
            ),
        ];
        let first = resolve(definitions.clone());
        let second = resolve(definitions);
        assert_eq!(first.declarations, second.declarations);
        assert_eq!(first.errors, second.errors);
    }
}
