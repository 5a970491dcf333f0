use std::fmt;

/// Identifies a catalog object: the oid of the catalog table it lives in and
/// its oid within that catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId {
    pub class_id: u32,
    pub oid: u32,
}

impl UniqueId {
    pub const fn new(class_id: u32, oid: u32) -> UniqueId {
        UniqueId { class_id, oid }
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ClassID:{} Oid:{}}}", self.class_id, self.oid)
    }
}

/// Catalog table oids used as [`UniqueId::class_id`].
pub mod class {
    pub const PG_AGGREGATE: u32 = 1255;
    pub const PG_AUTHID: u32 = 1260;
    pub const PG_CAST: u32 = 2605;
    pub const PG_CLASS: u32 = 1259;
    pub const PG_COLLATION: u32 = 3456;
    pub const PG_CONSTRAINT: u32 = 2606;
    pub const PG_CONVERSION: u32 = 2607;
    pub const PG_DATABASE: u32 = 1262;
    pub const PG_EVENT_TRIGGER: u32 = 3466;
    pub const PG_EXTENSION: u32 = 3079;
    pub const PG_EXTPROTOCOL: u32 = 7175;
    pub const PG_FOREIGN_DATA_WRAPPER: u32 = 2328;
    pub const PG_FOREIGN_SERVER: u32 = 1417;
    pub const PG_INDEX: u32 = 2610;
    pub const PG_LANGUAGE: u32 = 2612;
    pub const PG_NAMESPACE: u32 = 2615;
    pub const PG_OPCLASS: u32 = 2616;
    pub const PG_OPERATOR: u32 = 2617;
    pub const PG_OPFAMILY: u32 = 2753;
    pub const PG_PROC: u32 = 1255;
    pub const PG_RESGROUP: u32 = 6436;
    pub const PG_RESQUEUE: u32 = 6026;
    pub const PG_REWRITE: u32 = 2618;
    pub const PG_TABLESPACE: u32 = 1213;
    pub const PG_TRANSFORM: u32 = 3576;
    pub const PG_TRIGGER: u32 = 2620;
    pub const PG_TS_CONFIG: u32 = 3602;
    pub const PG_TS_DICT: u32 = 3600;
    pub const PG_TS_PARSER: u32 = 3601;
    pub const PG_TS_TEMPLATE: u32 = 3764;
    pub const PG_TYPE: u32 = 1247;
    pub const PG_USER_MAPPING: u32 = 1418;
}
