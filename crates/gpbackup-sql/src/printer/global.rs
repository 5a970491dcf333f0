use super::{set_clause, Block, Comma, Printer};
use gpbackup_core::{
    catalog::{
        Database, ObjectMetadata, ResourceGroup, ResourceQueue, Role, RoleGucs, RoleMember,
        SessionGucs, Tablespace,
    },
    toc::MetadataEntry,
};

const DAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

impl Printer<'_> {
    /// Settings every restore session needs before replaying metadata.
    pub fn session_gucs(&self, gucs: &SessionGucs) -> Block {
        let mut sql = String::from(
            "SET statement_timeout = 0;\nSET check_function_bodies = false;\nSET client_min_messages = error;\n",
        );
        fmt!(sql, "SET client_encoding = '{}';\n", gucs.client_encoding);
        sql.push_str("SET standard_conforming_strings = on;\n");
        if self.version.before("7") {
            sql.push_str("SET default_with_oids = off;\n");
        }
        Block::new(MetadataEntry::new("", "", "SESSION GUCS"), sql)
    }

    pub fn create_database(&self, database: &Database, meta: &ObjectMetadata) -> Vec<Block> {
        let mut sql = format!("\n\nCREATE DATABASE {}", database.name);
        if !database.tablespace.is_empty() && database.tablespace != "pg_default" {
            fmt!(sql, " TABLESPACE {}", database.tablespace);
        }
        sql.push(';');

        let mut blocks = vec![Block::new(
            MetadataEntry::new("", &database.name, "DATABASE"),
            sql,
        )];
        let metadata = self.object_metadata(meta, &database.name, "DATABASE", None);
        if !metadata.is_empty() {
            blocks.push(Block::new(
                MetadataEntry::new("", &database.name, "DATABASE METADATA"),
                metadata,
            ));
        }
        blocks
    }

    pub fn database_gucs(&self, database: &str, gucs: &[String]) -> Vec<Block> {
        gucs.iter()
            .map(|guc| {
                Block::new(
                    MetadataEntry::new("", database, "DATABASE GUC"),
                    format!("\nALTER DATABASE {database} {};", set_clause(guc)),
                )
            })
            .collect()
    }

    pub fn create_resource_queue(&self, queue: &ResourceQueue, meta: &ObjectMetadata) -> Block {
        let mut attributes = vec![];
        if queue.active_statements != -1 {
            attributes.push(format!("ACTIVE_STATEMENTS={}", queue.active_statements));
        }
        if is_above(&queue.max_cost, -1.0) {
            attributes.push(format!("MAX_COST={}", queue.max_cost));
        }
        if queue.cost_overcommit {
            attributes.push("COST_OVERCOMMIT=TRUE".to_string());
        }
        if is_above(&queue.min_cost, 0.0) {
            attributes.push(format!("MIN_COST={}", queue.min_cost));
        }
        if queue.priority != "medium" {
            attributes.push(format!("PRIORITY={}", queue.priority.to_uppercase()));
        }
        if queue.memory_limit != "-1" {
            attributes.push(format!("MEMORY_LIMIT='{}'", queue.memory_limit));
        }

        // pg_default exists in every cluster
        let verb = if queue.name == "pg_default" {
            "ALTER"
        } else {
            "CREATE"
        };
        let mut sql = format!(
            "\n\n{verb} RESOURCE QUEUE {} WITH ({});",
            queue.name,
            Comma(&attributes)
        );
        sql.push_str(&self.object_metadata(meta, &queue.name, "RESOURCE QUEUE", None));

        Block::new(MetadataEntry::new("", &queue.name, "RESOURCE QUEUE"), sql)
    }

    pub fn create_resource_group(&self, group: &ResourceGroup, meta: &ObjectMetadata) -> Block {
        let settings = [
            ("CPU_RATE_LIMIT", group.cpu_rate_limit),
            ("MEMORY_LIMIT", group.memory_limit),
            ("MEMORY_SHARED_QUOTA", group.memory_shared_quota),
            ("MEMORY_SPILL_RATIO", group.memory_spill_ratio),
            ("CONCURRENCY", group.concurrency),
        ];

        let mut sql = String::new();
        if group.is_builtin() {
            for (setting, value) in settings {
                fmt!(
                    sql,
                    "\n\nALTER RESOURCE GROUP {} SET {setting} {value};",
                    group.name
                );
            }
        } else {
            let settings: Vec<String> = settings
                .iter()
                .map(|(setting, value)| format!("{setting}={value}"))
                .collect();
            fmt!(
                sql,
                "\n\nCREATE RESOURCE GROUP {} WITH ({});",
                group.name,
                Comma(&settings)
            );
        }
        sql.push_str(&self.object_metadata(meta, &group.name, "RESOURCE GROUP", None));

        Block::new(MetadataEntry::new("", &group.name, "RESOURCE GROUP"), sql)
    }

    pub fn create_role(&self, role: &Role, meta: &ObjectMetadata) -> Block {
        let flag = |set: bool, keyword: &str| {
            if set {
                keyword.to_string()
            } else {
                format!("NO{keyword}")
            }
        };

        let mut attributes = vec![
            flag(role.superuser, "SUPERUSER"),
            flag(role.inherit, "INHERIT"),
            flag(role.create_role, "CREATEROLE"),
            flag(role.create_db, "CREATEDB"),
            flag(role.can_login, "LOGIN"),
        ];
        if role.connection_limit != -1 {
            attributes.push(format!("CONNECTION LIMIT {}", role.connection_limit));
        }
        if !role.password.is_empty() {
            attributes.push(format!("PASSWORD '{}'", role.password));
        }
        if !role.valid_until.is_empty() {
            attributes.push(format!("VALID UNTIL '{}'", role.valid_until));
        }
        if !role.resource_queue.is_empty() {
            attributes.push(format!("RESOURCE QUEUE {}", role.resource_queue));
        }
        if !role.resource_group.is_empty() {
            attributes.push(format!("RESOURCE GROUP {}", role.resource_group));
        }
        attributes.extend(external_table_attributes(role));

        let mut sql = format!(
            "\n\nCREATE ROLE {name};\nALTER ROLE {name} WITH {};",
            attributes.join(" "),
            name = role.name
        );
        for constraint in &role.time_constraints {
            let day = |n: i32| DAYS.get(n as usize).copied().unwrap_or("Sunday");
            fmt!(
                sql,
                "\nALTER ROLE {} DENY BETWEEN DAY '{}' TIME '{}' AND DAY '{}' TIME '{}';",
                role.name,
                day(constraint.start_day),
                constraint.start_time,
                day(constraint.end_day),
                constraint.end_time
            );
        }
        sql.push_str(&self.object_metadata(meta, &role.name, "ROLE", None));

        Block::new(MetadataEntry::new("", &role.name, "ROLE"), sql)
    }

    pub fn role_gucs(&self, gucs: &RoleGucs) -> Block {
        let scope = if gucs.database.is_empty() {
            String::new()
        } else {
            format!("IN DATABASE {} ", gucs.database)
        };
        let mut sql = String::new();
        for setting in &gucs.config {
            fmt!(
                sql,
                "\n\nALTER ROLE {} {scope}{};",
                gucs.role,
                set_clause(setting)
            );
        }
        Block::new(MetadataEntry::new("", &gucs.role, "ROLE GUCS"), sql)
    }

    pub fn grant_role(&self, member: &RoleMember) -> Block {
        let mut sql = format!("\nGRANT {} TO {}", member.role, member.member);
        if member.is_admin {
            sql.push_str(" WITH ADMIN OPTION");
        }
        if !member.grantor.is_empty() {
            fmt!(sql, " GRANTED BY {}", member.grantor);
        }
        sql.push(';');
        Block::new(MetadataEntry::new("", &member.member, "ROLE GRANT"), sql)
    }

    pub fn create_tablespace(&self, tablespace: &Tablespace, meta: &ObjectMetadata) -> Block {
        let mut sql = if !tablespace.filespace.is_empty() {
            format!(
                "\n\nCREATE TABLESPACE {} FILESPACE {};",
                tablespace.name, tablespace.filespace
            )
        } else {
            let mut sql = format!(
                "\n\nCREATE TABLESPACE {} LOCATION {}",
                tablespace.name, tablespace.location
            );
            if !tablespace.segment_locations.is_empty() {
                fmt!(sql, " WITH ({})", Comma(&tablespace.segment_locations));
            }
            sql.push(';');
            if !tablespace.options.is_empty() {
                fmt!(
                    sql,
                    "\n\nALTER TABLESPACE {} SET ({});",
                    tablespace.name,
                    tablespace.options
                );
            }
            sql
        };
        sql.push_str(&self.object_metadata(meta, &tablespace.name, "TABLESPACE", None));

        Block::new(MetadataEntry::new("", &tablespace.name, "TABLESPACE"), sql)
    }
}

fn is_above(value: &str, floor: f64) -> bool {
    value.parse::<f64>().is_ok_and(|v| v > floor)
}

fn external_table_attributes(role: &Role) -> Vec<String> {
    let mut attributes = vec![];
    if role.create_ext_http {
        attributes.push("CREATEEXTTABLE (protocol='http')".to_string());
    }
    if role.create_readable_ext_gpfdist {
        attributes.push("CREATEEXTTABLE (protocol='gpfdist', type='readable')".to_string());
    }
    if role.create_writable_ext_gpfdist {
        attributes.push("CREATEEXTTABLE (protocol='gpfdist', type='writable')".to_string());
    }
    if role.create_readable_ext_hdfs {
        attributes.push("CREATEEXTTABLE (protocol='gphdfs', type='readable')".to_string());
    }
    if role.create_writable_ext_hdfs {
        attributes.push("CREATEEXTTABLE (protocol='gphdfs', type='writable')".to_string());
    }
    attributes
}
