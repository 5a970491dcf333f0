use super::{Relation, UniqueId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub relation: Relation,

    /// Quoted FQN of the owning table, if any.
    pub owning_table: String,

    /// `table.column` the sequence is owned by, if any.
    pub owning_column: String,

    pub unqualified_owning_column: String,

    pub identity: Option<IdentityKind>,

    pub definition: SequenceDefinition,
}

impl Sequence {
    pub fn fqn(&self) -> String {
        self.relation.fqn()
    }

    pub fn unique_id(&self) -> UniqueId {
        self.relation.unique_id()
    }

    pub fn is_identity(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Always,
    ByDefault,
}

impl IdentityKind {
    pub fn from_code(code: &str) -> Option<IdentityKind> {
        match code {
            "a" => Some(IdentityKind::Always),
            "d" => Some(IdentityKind::ByDefault),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            IdentityKind::Always => "ALWAYS",
            IdentityKind::ByDefault => "BY DEFAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceDefinition {
    pub last_value: i64,

    /// `smallint`, `integer` or `bigint`.
    pub data_type: String,

    pub start: i64,
    pub increment: i64,
    pub max_value: i64,
    pub min_value: i64,
    pub cache: i64,
    pub log_count: i64,
    pub is_cycled: bool,
    pub is_called: bool,
}

impl Default for SequenceDefinition {
    fn default() -> SequenceDefinition {
        SequenceDefinition {
            last_value: 1,
            data_type: "bigint".to_string(),
            start: 1,
            increment: 1,
            max_value: i64::MAX,
            min_value: 1,
            cache: 1,
            log_count: 0,
            is_cycled: false,
            is_called: false,
        }
    }
}

impl SequenceDefinition {
    /// Implicit bounds of the sequence's data type.
    pub fn type_bounds(&self) -> (i64, i64) {
        match self.data_type.as_str() {
            "smallint" => (i16::MIN as i64, i16::MAX as i64),
            "integer" => (i32::MIN as i64, i32::MAX as i64),
            _ => (i64::MIN, i64::MAX),
        }
    }
}
