use crate::language::{
    ast::Operator,
    types::{Intrinsic, QualifiedName, RawType, TypeSpecifier},
};
use crate::language::typecheck::{DeclarationsContext, OperatorKey, OperatorMap};
use std::collections::BTreeMap;
use std::sync::OnceLock;

static BUILTINS: OnceLock<DeclarationsContext> = OnceLock::new();

/// The intrinsic declarations every module resolves against. Built once
/// per process and handed around by reference; callers must treat it as
/// frozen.
pub fn builtin_context() -> &'static DeclarationsContext {
    BUILTINS.get_or_init(build)
}

fn build() -> DeclarationsContext {
    let types = [
        Intrinsic::Int,
        Intrinsic::UInt,
        Intrinsic::Float,
        Intrinsic::Bool,
        Intrinsic::String,
    ]
    .into_iter()
    .map(|intrinsic| {
        (
            QualifiedName::single(intrinsic.name()),
            TypeSpecifier::Raw(RawType::Intrinsic(intrinsic)),
        )
    })
    .collect();

    DeclarationsContext {
        types,
        functions: BTreeMap::new(),
        operators: operator_table(),
    }
}

fn operator_table() -> OperatorMap {
    use Operator::*;

    let mut table = OperatorMap::new();
    let nothing = TypeSpecifier::nothing();
    let int = TypeSpecifier::int();
    let uint = TypeSpecifier::uint();
    let float = TypeSpecifier::float();
    let bool_ty = TypeSpecifier::bool();
    let string = TypeSpecifier::string();

    let mut insert = |left: &TypeSpecifier, op: Operator, right: &TypeSpecifier, out: &TypeSpecifier| {
        table.insert(
            OperatorKey {
                left: left.clone(),
                right: right.clone(),
                op,
            },
            out.clone(),
        );
    };

    for numeric in [&int, &uint, &float] {
        for op in [Plus, Minus, Times, By] {
            insert(numeric, op, numeric, numeric);
        }
        for op in [Equal, Different, LessThan, LessThanOrEqual, GreaterThan, GreaterThanOrEqual] {
            insert(numeric, op, numeric, &bool_ty);
        }
        // unary sign, stored with Nothing on the left
        insert(&nothing, Plus, numeric, numeric);
        insert(&nothing, Minus, numeric, numeric);
    }
    insert(&int, Modulo, &int, &int);
    insert(&uint, Modulo, &uint, &uint);

    for op in [Equal, Different] {
        insert(&bool_ty, op, &bool_ty, &bool_ty);
        insert(&string, op, &string, &bool_ty);
    }
    insert(&bool_ty, And, &bool_ty, &bool_ty);
    insert(&bool_ty, Or, &bool_ty, &bool_ty);
    insert(&nothing, Not, &bool_ty, &bool_ty);

    table
}
