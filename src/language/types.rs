use std::collections::BTreeMap;
use std::fmt;

/// Identifies one field or argument inside a record, choice or argument
/// list. Unnamed tags are positional: the index counts every field of the
/// list, tagged or not, so a field keeps its position when a neighbour
/// gains a name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Named(String),
    Unnamed(u64),
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Tag::Named(name.into())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Named(name) => write!(f, "{name}"),
            Tag::Unnamed(index) => write!(f, "_{index}"),
        }
    }
}

/// Module-qualified symbol path. Every symbol table in the front end is
/// keyed by one of these.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    pub segments: Vec<String>,
}

impl QualifiedName {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn single(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("::"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Intrinsic {
    Int,
    UInt,
    Float,
    Bool,
    String,
}

impl Intrinsic {
    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::Int => "Int",
            Intrinsic::UInt => "UInt",
            Intrinsic::Float => "Float",
            Intrinsic::Bool => "Bool",
            Intrinsic::String => "String",
        }
    }
}

/// The fully lowered, structural shape of a type. `Nothing` is the empty
/// record and `Never` the empty choice, so neither needs a variant of its
/// own.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RawType {
    Intrinsic(Intrinsic),
    Record(BTreeMap<Tag, TypeSpecifier>),
    Choice(BTreeMap<Tag, TypeSpecifier>),
}

/// A resolved type: either a by-name reference into the type declarations
/// map or an already lowered raw shape. Nominal references are lookup
/// keys, never pointers, which keeps recursive type graphs acyclic in
/// memory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeSpecifier {
    Nominal(QualifiedName),
    Raw(RawType),
}

impl TypeSpecifier {
    pub fn nothing() -> Self {
        TypeSpecifier::Raw(RawType::Record(BTreeMap::new()))
    }

    pub fn never() -> Self {
        TypeSpecifier::Raw(RawType::Choice(BTreeMap::new()))
    }

    pub fn nominal(name: impl Into<String>) -> Self {
        TypeSpecifier::Nominal(QualifiedName::single(name))
    }

    pub fn int() -> Self {
        Self::nominal(Intrinsic::Int.name())
    }

    pub fn uint() -> Self {
        Self::nominal(Intrinsic::UInt.name())
    }

    pub fn float() -> Self {
        Self::nominal(Intrinsic::Float.name())
    }

    pub fn bool() -> Self {
        Self::nominal(Intrinsic::Bool.name())
    }

    pub fn string() -> Self {
        Self::nominal(Intrinsic::String.name())
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, TypeSpecifier::Raw(RawType::Record(fields)) if fields.is_empty())
    }

    pub fn is_never(&self) -> bool {
        matches!(self, TypeSpecifier::Raw(RawType::Choice(arms)) if arms.is_empty())
    }

    pub fn canonical_name(&self) -> String {
        match self {
            TypeSpecifier::Nominal(identifier) => identifier.to_string(),
            TypeSpecifier::Raw(raw) => raw.canonical_name(),
        }
    }
}

impl RawType {
    pub fn canonical_name(&self) -> String {
        fn fields(fields: &BTreeMap<Tag, TypeSpecifier>, separator: &str) -> String {
            fields
                .iter()
                .map(|(tag, ty)| format!("{tag}: {}", ty.canonical_name()))
                .collect::<Vec<_>>()
                .join(separator)
        }
        match self {
            RawType::Intrinsic(intrinsic) => intrinsic.name().to_string(),
            RawType::Record(record) if record.is_empty() => "Nothing".to_string(),
            RawType::Record(record) => format!("[{}]", fields(record, ", ")),
            RawType::Choice(choice) if choice.is_empty() => "Never".to_string(),
            RawType::Choice(choice) => format!("[{}]", fields(choice, " | ")),
        }
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

/// Overload key for functions: two definitions collide only when name,
/// input type and argument tags/types all agree. The input's tag is not
/// part of the key; it only changes how the body sees the input and lives
/// on the resolved declaration instead.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionSignature {
    pub identifier: QualifiedName,
    pub input: TypeSpecifier,
    pub arguments: BTreeMap<Tag, TypeSpecifier>,
}

impl FunctionSignature {
    pub fn canonical_name(&self) -> String {
        let arguments = self
            .arguments
            .iter()
            .map(|(tag, ty)| format!("{tag}: {}", ty.canonical_name()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} |> {}({arguments})",
            self.input.canonical_name(),
            self.identifier
        )
    }
}

pub type TypeDeclarationsMap = BTreeMap<QualifiedName, TypeSpecifier>;
