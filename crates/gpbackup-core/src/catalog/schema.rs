use super::{class, UniqueId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub oid: u32,

    /// Quoted schema name
    pub name: String,
}

impl Schema {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_NAMESPACE, self.oid)
    }
}
