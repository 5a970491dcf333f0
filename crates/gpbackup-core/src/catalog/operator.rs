use super::{class, make_fqn, UniqueId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operator {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub procedure: String,

    /// `-` when the operator is prefix.
    pub left_arg: String,

    /// `-` when the operator is postfix.
    pub right_arg: String,

    /// `0` when unset.
    pub commutator: String,
    pub negator: String,
    pub restrict: String,
    pub join: String,
    pub can_hash: bool,
    pub can_merge: bool,
}

impl Operator {
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_OPERATOR, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorFamily {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub index_method: String,
}

impl OperatorFamily {
    pub fn fqn(&self) -> String {
        format!("{} USING {}", make_fqn(&self.schema, &self.name), self.index_method)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_OPFAMILY, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorClass {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub family_schema: String,
    pub family_name: String,
    pub index_method: String,
    pub ty: String,
    pub is_default: bool,

    /// `-` when the stored type equals the indexed type.
    pub storage_type: String,

    pub operators: Vec<OperatorClassOperator>,
    pub functions: Vec<OperatorClassFunction>,
}

impl OperatorClass {
    pub fn fqn(&self) -> String {
        format!("{} USING {}", make_fqn(&self.schema, &self.name), self.index_method)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_OPCLASS, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorClassOperator {
    pub strategy_number: i32,
    pub operator: String,
    pub recheck: bool,
    pub order_by_family: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorClassFunction {
    pub support_number: i32,
    pub left_type: String,
    pub right_type: String,
    pub function_name: String,
}
