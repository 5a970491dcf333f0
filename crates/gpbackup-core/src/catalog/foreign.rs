use super::{class, FunctionRef, UniqueId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignDataWrapper {
    pub oid: u32,
    pub name: String,
    pub handler: Option<FunctionRef>,
    pub validator: Option<FunctionRef>,
    pub options: String,
}

impl ForeignDataWrapper {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_FOREIGN_DATA_WRAPPER, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignServer {
    pub oid: u32,
    pub name: String,
    pub ty: String,
    pub version: String,
    pub foreign_data_wrapper: String,
    pub options: String,
}

impl ForeignServer {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_FOREIGN_SERVER, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserMapping {
    pub oid: u32,
    pub user: String,
    pub server: String,
    pub options: String,
}

impl UserMapping {
    pub fn fqn(&self) -> String {
        format!("{} ON {}", self.user, self.server)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_USER_MAPPING, self.oid)
    }
}

/// A custom protocol usable in external table locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalProtocol {
    pub oid: u32,
    pub name: String,
    pub owner: String,
    pub trusted: bool,
    pub read_function: Option<FunctionRef>,
    pub write_function: Option<FunctionRef>,
    pub validator: Option<FunctionRef>,
    pub depends_upon: Vec<UniqueId>,
}

impl ExternalProtocol {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_EXTPROTOCOL, self.oid)
    }
}
