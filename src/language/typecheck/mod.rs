pub mod branches;
pub mod builtins;
pub mod checker;
pub mod functions;
pub mod resolve;

use crate::language::{
    ast::{self, Operator},
    errors::{sort_errors, SemanticError, SemanticErrorKind},
    semantic::TypedExpression,
    types::{FunctionSignature, QualifiedName, TypeDeclarationsMap, TypeSpecifier},
};
use std::collections::{BTreeMap, BTreeSet};

pub type TypeLookupMap = BTreeMap<QualifiedName, ast::TypeDefinition>;
pub type FunctionDeclarationsMap = BTreeMap<FunctionSignature, FunctionDecl>;
pub type FunctionLookupMap = BTreeMap<FunctionSignature, ast::ValueDefinition>;
pub type OperatorMap = BTreeMap<OperatorKey, TypeSpecifier>;

/// Exact-match key of the operator overload table. Unary operators are
/// stored with `Nothing` on the left.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperatorKey {
    pub left: TypeSpecifier,
    pub right: TypeSpecifier,
    pub op: Operator,
}

/// What resolution records per overload beyond the signature key: how the
/// body addresses the input, and the declared output type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    /// `Some` when the input is tagged: the body then sees the input as a
    /// named scope field and its pipeline input is `Nothing`.
    pub input_tag: Option<String>,
    pub output: TypeSpecifier,
}

/// Frozen declaration tables handed into resolution and checking. The
/// intrinsic builtin context is one of these, shared by reference and
/// never mutated; each module's resolution produces another.
#[derive(Clone, Debug, Default)]
pub struct DeclarationsContext {
    pub types: TypeDeclarationsMap,
    pub functions: FunctionDeclarationsMap,
    pub operators: OperatorMap,
}

/// Merged view of base plus module declarations, with the derived overload
/// indexes the call checker needs to tell "unknown name" apart from
/// "known name, wrong input".
#[derive(Clone, Debug)]
pub struct Context {
    pub types: TypeDeclarationsMap,
    pub functions: FunctionDeclarationsMap,
    pub operators: OperatorMap,
    function_names: BTreeSet<QualifiedName>,
    function_inputs: BTreeSet<(QualifiedName, TypeSpecifier)>,
}

impl Context {
    pub fn new(
        types: TypeDeclarationsMap,
        functions: FunctionDeclarationsMap,
        operators: OperatorMap,
    ) -> Self {
        let function_names = functions
            .keys()
            .map(|signature| signature.identifier.clone())
            .collect();
        let function_inputs = functions
            .keys()
            .map(|signature| (signature.identifier.clone(), signature.input.clone()))
            .collect();
        Self {
            types,
            functions,
            operators,
            function_names,
            function_inputs,
        }
    }

    pub fn merged(base: &DeclarationsContext, module: &DeclarationsContext) -> Self {
        let mut types = base.types.clone();
        types.extend(module.types.clone());
        let mut functions = base.functions.clone();
        functions.extend(module.functions.clone());
        let mut operators = base.operators.clone();
        operators.extend(module.operators.clone());
        Self::new(types, functions, operators)
    }

    pub fn knows_function(&self, identifier: &QualifiedName) -> bool {
        self.function_names.contains(identifier)
    }

    pub fn knows_function_on_input(
        &self,
        identifier: &QualifiedName,
        input: &TypeSpecifier,
    ) -> bool {
        self.function_inputs
            .contains(&(identifier.clone(), input.clone()))
    }
}

/// Everything one resolve-then-check run produces for a module. `bodies`
/// only holds definitions whose body checked cleanly; a failed definition
/// contributes an error instead, never a partial tree.
#[derive(Clone, Debug)]
pub struct ModuleAnalysis {
    pub types: TypeDeclarationsMap,
    pub type_lookup: TypeLookupMap,
    pub functions: FunctionDeclarationsMap,
    pub function_lookup: FunctionLookupMap,
    pub operators: OperatorMap,
    pub bodies: BTreeMap<FunctionSignature, TypedExpression>,
    pub errors: Vec<SemanticError>,
}

impl ModuleAnalysis {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Full front-end run over one module: type symbols, function symbols,
/// then every function body independently. Declaration phases collect
/// every error they find; each body is fail-fast and reports at most one.
pub fn analyze_module(module: &ast::Module, base: &DeclarationsContext) -> ModuleAnalysis {
    let type_resolution = resolve::resolve_type_symbols(module, base);
    let mut errors = type_resolution.errors;

    let mut merged_types = base.types.clone();
    merged_types.extend(type_resolution.declarations.clone());

    let function_resolution = functions::resolve_function_symbols(module, &merged_types, base);
    errors.extend(function_resolution.errors);

    let ctx = Context::merged(
        base,
        &DeclarationsContext {
            types: type_resolution.declarations.clone(),
            functions: function_resolution.declarations.clone(),
            operators: function_resolution.operators.clone(),
        },
    );

    let mut bodies = BTreeMap::new();
    for (signature, definition) in &function_resolution.lookup {
        let Some(decl) = function_resolution.declarations.get(signature) else {
            continue;
        };
        match checker::check_function_body(signature, decl, &definition.body, &ctx) {
            Ok(body) => {
                let body_ty = body.ty();
                if body_ty != decl.output {
                    errors.push(SemanticError::new(
                        SemanticErrorKind::OutputMismatch {
                            expected: decl.output.clone(),
                            received: body_ty,
                        },
                        definition.body.span(),
                    ));
                } else {
                    bodies.insert(signature.clone(), body);
                }
            }
            Err(error) => errors.push(error),
        }
    }

    sort_errors(&mut errors);

    ModuleAnalysis {
        types: type_resolution.declarations,
        type_lookup: type_resolution.lookup,
        functions: function_resolution.declarations,
        function_lookup: function_resolution.lookup,
        operators: function_resolution.operators,
        bodies,
        errors,
    }
}
