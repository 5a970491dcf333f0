use super::{class, UniqueId};

/// The session settings every metadata file starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGucs {
    pub client_encoding: String,
}

impl Default for SessionGucs {
    fn default() -> SessionGucs {
        SessionGucs {
            client_encoding: "UTF8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    pub oid: u32,
    pub name: String,
    pub tablespace: String,
    pub encoding: String,
    pub collate: String,
    pub ctype: String,
}

impl Database {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_DATABASE, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tablespace {
    pub oid: u32,
    pub name: String,

    /// Set on clusters that still use filespaces.
    pub filespace: String,

    /// Quoted coordinator location.
    pub location: String,

    pub segment_locations: Vec<String>,
    pub options: String,
}

impl Tablespace {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_TABLESPACE, self.oid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQueue {
    pub oid: u32,
    pub name: String,

    /// `-1` when unlimited.
    pub active_statements: i32,

    /// Floats rendered by the server, `-1` when unlimited.
    pub max_cost: String,

    pub cost_overcommit: bool,
    pub min_cost: String,
    pub priority: String,

    /// `-1` when unlimited.
    pub memory_limit: String,
}

impl Default for ResourceQueue {
    fn default() -> ResourceQueue {
        ResourceQueue {
            oid: 0,
            name: String::new(),
            active_statements: -1,
            max_cost: "-1".to_string(),
            cost_overcommit: false,
            min_cost: "0".to_string(),
            priority: "medium".to_string(),
            memory_limit: "-1".to_string(),
        }
    }
}

impl ResourceQueue {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_RESQUEUE, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGroup {
    pub oid: u32,
    pub name: String,
    pub concurrency: i32,
    pub cpu_rate_limit: i32,
    pub memory_limit: i32,
    pub memory_shared_quota: i32,
    pub memory_spill_ratio: i32,
}

impl ResourceGroup {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_RESGROUP, self.oid)
    }

    /// The built-in groups exist in every cluster and are altered instead
    /// of created.
    pub fn is_builtin(&self) -> bool {
        matches!(self.name.as_str(), "default_group" | "admin_group")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeConstraint {
    pub start_day: i32,
    pub start_time: String,
    pub end_day: i32,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub oid: u32,
    pub name: String,
    pub superuser: bool,
    pub inherit: bool,
    pub create_role: bool,
    pub create_db: bool,
    pub can_login: bool,

    /// `-1` when unlimited.
    pub connection_limit: i32,

    /// Pre-hashed password.
    pub password: String,

    pub valid_until: String,
    pub resource_queue: String,
    pub resource_group: String,
    pub create_ext_http: bool,
    pub create_readable_ext_gpfdist: bool,
    pub create_writable_ext_gpfdist: bool,
    pub create_readable_ext_hdfs: bool,
    pub create_writable_ext_hdfs: bool,
    pub time_constraints: Vec<TimeConstraint>,
}

impl Default for Role {
    fn default() -> Role {
        Role {
            oid: 0,
            name: String::new(),
            superuser: false,
            inherit: true,
            create_role: false,
            create_db: false,
            can_login: false,
            connection_limit: -1,
            password: String::new(),
            valid_until: String::new(),
            resource_queue: "pg_default".to_string(),
            resource_group: String::new(),
            create_ext_http: false,
            create_readable_ext_gpfdist: false,
            create_writable_ext_gpfdist: false,
            create_readable_ext_hdfs: false,
            create_writable_ext_hdfs: false,
            time_constraints: vec![],
        }
    }
}

impl Role {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_AUTHID, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMember {
    pub role: String,
    pub member: String,
    pub grantor: String,
    pub is_admin: bool,
}

/// `ALTER ROLE .. SET` settings of one role, optionally scoped to a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGucs {
    pub role: String,
    pub database: String,
    pub config: Vec<String>,
}
