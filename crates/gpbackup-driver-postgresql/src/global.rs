use crate::{
    query::{by_version, quote_setting, RowExt},
    PostgreSQL,
};
use gpbackup_core::{
    catalog::{
        Database, ResourceGroup, ResourceQueue, Role, RoleGucs, RoleMember, Tablespace,
        TimeConstraint,
    },
    driver::SegmentConfig,
    version::DbVersion,
    Error, Result,
};
use std::collections::HashMap;

pub(crate) fn segments_query(version: &DbVersion) -> &'static str {
    by_version(
        version,
        &[
            (
                "6",
                "SELECT content::int AS content, hostname, datadir
FROM gp_segment_configuration
WHERE role = 'p'
ORDER BY content",
            ),
            (
                "",
                "SELECT s.content::int AS content, s.hostname, e.fselocation AS datadir
FROM gp_segment_configuration s
JOIN pg_filespace_entry e ON s.dbid = e.fsedbid
JOIN pg_filespace f ON e.fsefsoid = f.oid
WHERE s.role = 'p' AND f.fsname = 'pg_system'
ORDER BY s.content",
            ),
        ],
    )
}

pub(crate) async fn segments(db: &PostgreSQL) -> Result<Vec<SegmentConfig>> {
    db.query(segments_query(&db.version))
        .await?
        .iter()
        .map(|row| {
            Ok(SegmentConfig {
                content_id: row.int("content")?,
                hostname: row.text("hostname")?,
                data_dir: row.text("datadir")?,
            })
        })
        .collect()
}

pub(crate) async fn current_database(db: &PostgreSQL) -> Result<Database> {
    let locale = if db.version.at_least("6") {
        "d.datcollate::text AS collate, d.datctype::text AS ctype"
    } else {
        "'' AS collate, '' AS ctype"
    };
    let sql = format!(
        "SELECT d.oid,
	quote_ident(d.datname) AS name,
	CASE WHEN t.spcname = 'pg_default' THEN '' ELSE quote_ident(t.spcname) END AS tablespace,
	pg_encoding_to_char(d.encoding) AS encoding,
	{locale}
FROM pg_database d
JOIN pg_tablespace t ON d.dattablespace = t.oid
WHERE d.datname = current_database()"
    );
    let row = db.query_one(&sql, "current database").await?;
    Ok(Database {
        oid: row.oid("oid")?,
        name: row.text("name")?,
        tablespace: row.text("tablespace")?,
        encoding: row.text("encoding")?,
        collate: row.text("collate")?,
        ctype: row.text("ctype")?,
    })
}

pub(crate) async fn database_gucs(db: &PostgreSQL) -> Result<Vec<String>> {
    let sql = if db.version.at_least("6") {
        "SELECT unnest(setconfig) AS config
FROM pg_db_role_setting r
JOIN pg_database d ON r.setdatabase = d.oid
WHERE d.datname = current_database() AND r.setrole = 0"
    } else {
        "SELECT unnest(datconfig) AS config FROM pg_database WHERE datname = current_database()"
    };
    db.query(sql)
        .await?
        .iter()
        .map(|row| Ok(quote_setting(&row.text("config")?)))
        .collect()
}

pub(crate) fn tablespaces_query(version: &DbVersion) -> &'static str {
    by_version(
        version,
        &[
            (
                "6",
                "SELECT oid,
	quote_ident(spcname) AS name,
	'''' || pg_tablespace_location(oid)::text || '''' AS location,
	coalesce(array_to_string(spcoptions, ', '), '') AS options,
	'' AS filespace
FROM pg_tablespace
WHERE spcname != 'pg_default' AND spcname != 'pg_global'
ORDER BY oid",
            ),
            (
                "",
                "SELECT t.oid,
	quote_ident(t.spcname) AS name,
	'' AS location,
	'' AS options,
	quote_ident(f.fsname) AS filespace
FROM pg_tablespace t
JOIN pg_filespace f ON t.spcfsoid = f.oid
WHERE t.spcname != 'pg_default' AND t.spcname != 'pg_global'
ORDER BY t.oid",
            ),
        ],
    )
}

pub(crate) async fn tablespaces(db: &PostgreSQL) -> Result<Vec<Tablespace>> {
    let mut tablespaces = db
        .query(tablespaces_query(&db.version))
        .await?
        .iter()
        .map(|row| {
            Ok(Tablespace {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                filespace: row.text("filespace")?,
                location: row.text("location")?,
                options: row.text("options")?,
                segment_locations: vec![],
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if db.version.at_least("6") {
        for tablespace in &mut tablespaces {
            tablespace.segment_locations = segment_locations(db, tablespace.oid).await?;
        }
    }
    Ok(tablespaces)
}

/// `contentN='location'` for every segment whose location differs from the
/// coordinator's.
async fn segment_locations(db: &PostgreSQL, oid: u32) -> Result<Vec<String>> {
    let sql = format!(
        "WITH segment_locations AS (
	SELECT gp_segment_id AS content, tblspc_loc
	FROM gp_tablespace_segment_location({oid})
	WHERE gp_segment_id >= 0
)
SELECT 'content' || content || '=''' || tblspc_loc || '''' AS location
FROM segment_locations
WHERE tblspc_loc != pg_tablespace_location({oid})
ORDER BY content"
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| row.text("location"))
        .collect()
}

pub(crate) async fn resource_queues(db: &PostgreSQL) -> Result<Vec<ResourceQueue>> {
    let sql = "SELECT r.oid,
	quote_ident(r.rsqname) AS name,
	r.rsqcountlimit::int AS active_statements,
	ROUND(r.rsqcostlimit::numeric, 2)::text AS max_cost,
	r.rsqovercommit AS cost_overcommit,
	ROUND(r.rsqignorecostlimit::numeric, 2)::text AS min_cost,
	coalesce(priority.ressetting::text, 'medium') AS priority,
	coalesce(memory.ressetting::text, '-1') AS memory_limit
FROM pg_resqueue r
LEFT JOIN (
	SELECT c.resqueueid, c.ressetting
	FROM pg_resqueuecapability c JOIN pg_resourcetype t ON c.restypid = t.restypid
	WHERE t.resname = 'priority'
) priority ON priority.resqueueid = r.oid
LEFT JOIN (
	SELECT c.resqueueid, c.ressetting
	FROM pg_resqueuecapability c JOIN pg_resourcetype t ON c.restypid = t.restypid
	WHERE t.resname = 'memory_limit'
) memory ON memory.resqueueid = r.oid
ORDER BY r.oid";

    db.query(sql)
        .await?
        .iter()
        .map(|row| {
            Ok(ResourceQueue {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                active_statements: row.int("active_statements")?,
                max_cost: row.text("max_cost")?,
                cost_overcommit: row.flag("cost_overcommit")?,
                min_cost: row.text("min_cost")?,
                priority: row.text("priority")?.to_lowercase(),
                memory_limit: row.text("memory_limit")?,
            })
        })
        .collect()
}

pub(crate) async fn resource_groups(db: &PostgreSQL) -> Result<Vec<ResourceGroup>> {
    if db.version.at_least("7") {
        tracing::debug!("resource group capabilities are not read on this release");
        return Ok(vec![]);
    }

    let capability = |limittype: i32, alias: &str| {
        format!(
            "(SELECT value FROM pg_resgroupcapability c WHERE c.resgroupid = g.oid AND c.reslimittype = {limittype})::int AS {alias}"
        )
    };
    let sql = format!(
        "SELECT g.oid,
	quote_ident(g.rsgname) AS name,
	{},
	{},
	{},
	{},
	{}
FROM pg_resgroup g
ORDER BY g.oid",
        capability(1, "concurrency"),
        capability(2, "cpu_rate_limit"),
        capability(3, "memory_limit"),
        capability(4, "memory_shared_quota"),
        capability(5, "memory_spill_ratio"),
    );

    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(ResourceGroup {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                concurrency: row.int("concurrency")?,
                cpu_rate_limit: row.int("cpu_rate_limit")?,
                memory_limit: row.int("memory_limit")?,
                memory_shared_quota: row.int("memory_shared_quota")?,
                memory_spill_ratio: row.int("memory_spill_ratio")?,
            })
        })
        .collect()
}

pub(crate) fn roles_query(version: &DbVersion) -> String {
    let hdfs = if version.before("6") {
        "r.rolcreaterexthdfs AS create_readable_ext_hdfs,
	r.rolcreatewexthdfs AS create_writable_ext_hdfs"
    } else {
        "false AS create_readable_ext_hdfs,
	false AS create_writable_ext_hdfs"
    };
    format!(
        "SELECT r.oid,
	quote_ident(r.rolname) AS name,
	r.rolsuper AS superuser,
	r.rolinherit AS inherit,
	r.rolcreaterole AS create_role,
	r.rolcreatedb AS create_db,
	r.rolcanlogin AS can_login,
	r.rolconnlimit::int AS connection_limit,
	coalesce(r.rolpassword, '') AS password,
	coalesce(r.rolvaliduntil::text, '') AS valid_until,
	quote_ident(q.rsqname) AS resource_queue,
	coalesce(quote_ident(g.rsgname), '') AS resource_group,
	r.rolcreaterexthttp AS create_ext_http,
	r.rolcreaterextgpfd AS create_readable_ext_gpfdist,
	r.rolcreatewextgpfd AS create_writable_ext_gpfdist,
	{hdfs}
FROM pg_authid r
JOIN pg_resqueue q ON r.rolresqueue = q.oid
LEFT JOIN pg_resgroup g ON r.rolresgroup = g.oid
ORDER BY r.oid"
    )
}

pub(crate) async fn roles(db: &PostgreSQL) -> Result<Vec<Role>> {
    let mut roles = db
        .query(&roles_query(&db.version))
        .await?
        .iter()
        .map(|row| {
            Ok(Role {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                superuser: row.flag("superuser")?,
                inherit: row.flag("inherit")?,
                create_role: row.flag("create_role")?,
                create_db: row.flag("create_db")?,
                can_login: row.flag("can_login")?,
                connection_limit: row.int("connection_limit")?,
                password: row.text("password")?,
                valid_until: row.text("valid_until")?,
                resource_queue: row.text("resource_queue")?,
                resource_group: row.text("resource_group")?,
                create_ext_http: row.flag("create_ext_http")?,
                create_readable_ext_gpfdist: row.flag("create_readable_ext_gpfdist")?,
                create_writable_ext_gpfdist: row.flag("create_writable_ext_gpfdist")?,
                create_readable_ext_hdfs: row.flag("create_readable_ext_hdfs")?,
                create_writable_ext_hdfs: row.flag("create_writable_ext_hdfs")?,
                time_constraints: vec![],
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut constraints = time_constraints(db).await?;
    for role in &mut roles {
        role.time_constraints = constraints.remove(&role.oid).unwrap_or_default();
    }
    Ok(roles)
}

async fn time_constraints(db: &PostgreSQL) -> Result<HashMap<u32, Vec<TimeConstraint>>> {
    let sql = "SELECT authid,
	start_day::int AS start_day,
	start_time::text AS start_time,
	end_day::int AS end_day,
	end_time::text AS end_time
FROM pg_auth_time_constraint
ORDER BY authid, start_day, start_time";

    let mut by_role: HashMap<u32, Vec<TimeConstraint>> = HashMap::new();
    for row in db.query(sql).await? {
        by_role
            .entry(row.oid("authid")?)
            .or_default()
            .push(TimeConstraint {
                start_day: row.int("start_day")?,
                start_time: row.text("start_time")?,
                end_day: row.int("end_day")?,
                end_time: row.text("end_time")?,
            });
    }
    Ok(by_role)
}

pub(crate) async fn role_gucs(db: &PostgreSQL) -> Result<Vec<RoleGucs>> {
    let sql = if db.version.at_least("6") {
        "SELECT quote_ident(r.rolname) AS role,
	CASE WHEN s.setdatabase = 0 THEN '' ELSE quote_ident(d.datname) END AS database,
	s.setconfig AS config
FROM pg_db_role_setting s
JOIN pg_roles r ON s.setrole = r.oid
LEFT JOIN pg_database d ON s.setdatabase = d.oid
WHERE s.setdatabase = 0 OR d.datname = current_database()
ORDER BY r.rolname, database"
    } else {
        "SELECT quote_ident(rolname) AS role, '' AS database, rolconfig AS config
FROM pg_roles
WHERE rolconfig IS NOT NULL
ORDER BY rolname"
    };

    let mut gucs = vec![];
    for row in db.query(sql).await? {
        let config: Vec<String> = row.texts("config")?.iter().map(|s| quote_setting(s)).collect();
        if config.is_empty() {
            continue;
        }
        gucs.push(RoleGucs {
            role: row.text("role")?,
            database: row.text("database")?,
            config,
        });
    }
    Ok(gucs)
}

pub(crate) async fn role_members(db: &PostgreSQL) -> Result<Vec<RoleMember>> {
    let sql = "SELECT quote_ident(pg_get_userbyid(roleid)) AS role,
	quote_ident(pg_get_userbyid(member)) AS member,
	CASE WHEN grantor = 0 THEN '' ELSE quote_ident(pg_get_userbyid(grantor)) END AS grantor,
	admin_option
FROM pg_auth_members
ORDER BY roleid, member";

    let members = db
        .query(sql)
        .await?
        .iter()
        .map(|row| {
            Ok(RoleMember {
                role: row.text("role")?,
                member: row.text("member")?,
                grantor: row.text("grantor")?,
                is_admin: row.flag("admin_option")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if members.iter().any(|m| m.role.is_empty() || m.member.is_empty()) {
        return Err(Error::unexpected_shape(
            "role membership references a role that no longer exists",
        ));
    }
    Ok(members)
}
