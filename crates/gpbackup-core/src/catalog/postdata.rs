use super::{class, make_fqn, Acl, UniqueId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    pub oid: u32,
    pub name: String,
    pub owning_schema: String,
    pub owning_table: String,
    pub tablespace: String,

    /// Output of `pg_get_indexdef`, without the trailing semicolon.
    pub def: String,

    pub is_clustered: bool,
    pub supports_replica_identity: bool,
}

impl Index {
    pub fn fqn(&self) -> String {
        make_fqn(&self.owning_schema, &self.name)
    }

    pub fn owning_table_fqn(&self) -> String {
        make_fqn(&self.owning_schema, &self.owning_table)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_INDEX, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub oid: u32,
    pub name: String,
    pub owning_schema: String,
    pub owning_table: String,

    /// Output of `pg_get_ruledef`, including the semicolon.
    pub def: String,
}

impl Rule {
    pub fn owning_table_fqn(&self) -> String {
        make_fqn(&self.owning_schema, &self.owning_table)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_REWRITE, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    pub oid: u32,
    pub name: String,
    pub owning_schema: String,
    pub owning_table: String,

    /// Output of `pg_get_triggerdef`, without the trailing semicolon.
    pub def: String,
}

impl Trigger {
    pub fn owning_table_fqn(&self) -> String {
        make_fqn(&self.owning_schema, &self.owning_table)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_TRIGGER, self.oid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerEnabled {
    #[default]
    Origin,
    Disabled,
    Always,
    Replica,
}

impl TriggerEnabled {
    pub fn from_code(code: &str) -> TriggerEnabled {
        match code {
            "D" => TriggerEnabled::Disabled,
            "A" => TriggerEnabled::Always,
            "R" => TriggerEnabled::Replica,
            _ => TriggerEnabled::Origin,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTrigger {
    pub oid: u32,
    pub name: String,
    pub event: String,
    pub function_name: String,
    pub enabled: TriggerEnabled,

    /// Quoted, comma-separated command tags.
    pub event_tags: String,
}

impl EventTrigger {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_EVENT_TRIGGER, self.oid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConstraintKind {
    Check,
    ForeignKey,
    #[default]
    PrimaryKey,
    Unique,
    Exclusion,
}

impl ConstraintKind {
    pub fn from_code(code: &str) -> ConstraintKind {
        match code {
            "c" => ConstraintKind::Check,
            "f" => ConstraintKind::ForeignKey,
            "u" => ConstraintKind::Unique,
            "x" => ConstraintKind::Exclusion,
            _ => ConstraintKind::PrimaryKey,
        }
    }
}

/// A table constraint, added after the table is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub kind: ConstraintKind,

    /// Output of `pg_get_constraintdef`.
    pub def: String,

    /// Quoted FQN of the table the constraint belongs to.
    pub owning_object: String,

    pub is_partition_parent: bool,
}

impl Constraint {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_CONSTRAINT, self.oid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPrivilegeObject {
    Table,
    Sequence,
    Function,
    Type,
    Schema,
}

impl DefaultPrivilegeObject {
    pub fn from_code(code: &str) -> Option<DefaultPrivilegeObject> {
        match code {
            "r" => Some(DefaultPrivilegeObject::Table),
            "S" => Some(DefaultPrivilegeObject::Sequence),
            "f" => Some(DefaultPrivilegeObject::Function),
            "T" => Some(DefaultPrivilegeObject::Type),
            "n" => Some(DefaultPrivilegeObject::Schema),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DefaultPrivilegeObject::Table => "TABLE",
            DefaultPrivilegeObject::Sequence => "SEQUENCE",
            DefaultPrivilegeObject::Function => "FUNCTION",
            DefaultPrivilegeObject::Type => "TYPE",
            DefaultPrivilegeObject::Schema => "SCHEMA",
        }
    }
}

/// `ALTER DEFAULT PRIVILEGES` state for one role, schema and object kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPrivileges {
    pub owner: String,
    pub schema: String,
    pub object_type: DefaultPrivilegeObject,
    pub privileges: Vec<Acl>,
}
