use super::{class, make_fqn, UniqueId};

/// A user-defined type. Only the payload meaningful for its variant is
/// carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub kind: TypeKind,
    pub depends_upon: Vec<UniqueId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Base(BaseType),
    Composite(CompositeType),
    Enum(EnumType),
    Domain(DomainType),
    Range(RangeType),

    /// A placeholder created before the functions of a base type.
    Shell,
}

impl Type {
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_TYPE, self.oid)
    }

    pub fn object_type(&self) -> &'static str {
        match self.kind {
            TypeKind::Domain(_) => "DOMAIN",
            _ => "TYPE",
        }
    }

    /// Base and range types need a shell created before their support
    /// functions.
    pub fn needs_shell(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Base(_) | TypeKind::Range(_) | TypeKind::Shell
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseType {
    pub input: String,
    pub output: String,
    pub receive: String,
    pub send: String,
    pub mod_in: String,
    pub mod_out: String,

    /// `-1` for variable length.
    pub internal_length: i32,

    pub passed_by_value: bool,

    /// `c`, `s`, `i` or `d`.
    pub alignment: String,

    /// `p`, `e`, `m` or `x`.
    pub storage: String,

    pub default: String,
    pub element: String,
    pub delimiter: String,
    pub category: String,
    pub preferred: bool,
    pub collatable: bool,

    /// Default column encoding (`ALTER TYPE .. SET DEFAULT ENCODING`).
    pub storage_options: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: String,
    pub collation: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeType {
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumType {
    /// Labels, already quoted and comma-separated.
    pub labels: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainType {
    pub base_type: String,
    pub default: String,
    pub collation: String,
    pub not_null: bool,
    pub constraints: Vec<DomainConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainConstraint {
    pub name: String,

    /// Rendered by `pg_get_constraintdef`, e.g. `CHECK (VALUE > 0)`.
    pub def: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeType {
    pub subtype: String,
    pub subtype_opclass: String,
    pub collation: String,
    pub canonical: String,
    pub subtype_diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collation {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub collate: String,
    pub ctype: String,
    pub provider: String,
    pub is_deterministic: Option<bool>,
}

impl Collation {
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_COLLATION, self.oid)
    }
}
