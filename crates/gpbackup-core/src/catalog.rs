mod acl;
pub use acl::{all_privileges_for, sort_acls, Acl, AclKind, Privileges};

mod foreign;
pub use foreign::{ExternalProtocol, ForeignDataWrapper, ForeignServer, UserMapping};

mod function;
pub use function::{
    extract_language_functions, Aggregate, AggregateKind, Cast, CastContext, CastMethod,
    Conversion, DataAccess, Extension, FinalModify, Function, FunctionExecLocation, FunctionRef,
    Language, Parallel, Transform, Volatility,
};

mod global;
pub use global::{
    Database, ResourceGroup, ResourceQueue, Role, RoleGucs, RoleMember, SessionGucs, Tablespace,
    TimeConstraint,
};

mod metadata;
pub use metadata::{MetadataMap, ObjectMetadata};

mod operator;
pub use operator::{
    Operator, OperatorClass, OperatorClassFunction, OperatorClassOperator, OperatorFamily,
};

mod postdata;
pub use postdata::{
    Constraint, ConstraintKind, DefaultPrivilegeObject, DefaultPrivileges, EventTrigger, Index,
    Rule, Trigger, TriggerEnabled,
};

mod relation;
pub use relation::{
    ext_part_name, AlteredPartitionSchema, AttachPartitionInfo, ColumnDefinition, ExecLocation,
    ExternalTableDefinition, ForeignTableDefinition, PartitionInfo, PartitionLevel,
    RejectLimitType, Relation, ReplicaIdentity, Table,
};

mod schema;
pub use schema::Schema;

mod sequence;
pub use sequence::{IdentityKind, Sequence, SequenceDefinition};

mod statistics;
pub use statistics::{AttributeStatistic, TupleStatistic};

mod text_search;
pub use text_search::{
    TextSearchConfiguration, TextSearchDictionary, TextSearchParser, TextSearchTemplate,
};

mod types;
pub use types::{
    Attribute, BaseType, Collation, CompositeType, DomainConstraint, DomainType, EnumType,
    RangeType, Type, TypeKind,
};

mod unique_id;
pub use unique_id::{class, UniqueId};

mod view;
pub use view::View;

use crate::sort::Sortable;

/// Joins an already-quoted schema and name.
pub fn make_fqn(schema: &str, name: &str) -> String {
    format!("{schema}.{name}")
}

/// Doubles single quotes so `s` can be embedded in a string literal.
pub fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

/// The objects whose creation order is decided by their dependencies.
#[derive(Debug, Clone, PartialEq)]
pub enum SortableObject {
    Function(Function),
    Type(Type),
    Table(Table),
    View(View),
    Protocol(ExternalProtocol),
    Aggregate(Aggregate),
}

impl Sortable for SortableObject {
    fn fqn(&self) -> String {
        match self {
            SortableObject::Function(f) => f.fqn(),
            SortableObject::Type(t) => t.fqn(),
            SortableObject::Table(t) => t.fqn(),
            SortableObject::View(v) => v.fqn(),
            SortableObject::Protocol(p) => p.name.clone(),
            SortableObject::Aggregate(a) => a.fqn(),
        }
    }

    fn unique_id(&self) -> UniqueId {
        match self {
            SortableObject::Function(f) => f.unique_id(),
            SortableObject::Type(t) => t.unique_id(),
            SortableObject::Table(t) => t.unique_id(),
            SortableObject::View(v) => v.unique_id(),
            SortableObject::Protocol(p) => p.unique_id(),
            SortableObject::Aggregate(a) => a.unique_id(),
        }
    }

    fn depends_upon(&self) -> &[UniqueId] {
        match self {
            SortableObject::Function(f) => &f.depends_upon,
            SortableObject::Type(t) => &t.depends_upon,
            SortableObject::Table(t) => &t.depends_upon,
            SortableObject::View(v) => &v.depends_upon,
            SortableObject::Protocol(p) => &p.depends_upon,
            SortableObject::Aggregate(a) => &a.depends_upon,
        }
    }
}

impl SortableObject {
    pub fn set_depends_upon(&mut self, deps: Vec<UniqueId>) {
        match self {
            SortableObject::Function(f) => f.depends_upon = deps,
            SortableObject::Type(t) => t.depends_upon = deps,
            SortableObject::Table(t) => t.depends_upon = deps,
            SortableObject::View(v) => v.depends_upon = deps,
            SortableObject::Protocol(p) => p.depends_upon = deps,
            SortableObject::Aggregate(a) => a.depends_upon = deps,
        }
    }
}
