use crate::{
    metadata::parse_privilege,
    query::{by_version, literal, literal_list, options_clause, RowExt},
    PostgreSQL,
};
use gpbackup_core::{
    catalog::*,
    driver::Scope,
    filter::{extension_filter_clause, split_fqn, FilteredRelation, PartitionLink},
    version::DbVersion,
    Error, Result,
};
use std::collections::{HashMap, HashSet};

pub(crate) async fn existing_schemas(db: &PostgreSQL, names: &[String]) -> Result<HashSet<String>> {
    if names.is_empty() {
        return Ok(HashSet::new());
    }
    let sql = format!(
        "SELECT nspname::text AS name FROM pg_namespace WHERE nspname IN ({})",
        literal_list(names)
    );
    db.query(&sql).await?.iter().map(|row| row.text("name")).collect()
}

/// Partition level code of the relation aliased `c`.
fn partition_level_expr(version: &DbVersion) -> &'static str {
    by_version(
        version,
        &[
            (
                "7",
                "CASE WHEN c.relkind = 'p' AND NOT c.relispartition THEN 'p'
		WHEN c.relkind = 'p' THEN 'i'
		WHEN c.relispartition THEN 'l'
		ELSE 'n' END",
            ),
            (
                "",
                "CASE WHEN c.oid IN (SELECT parrelid FROM pg_partition WHERE NOT paristemplate) THEN 'p'
		WHEN c.oid IN (SELECT r.parchildrelid FROM pg_partition_rule r JOIN pg_partition_rule sub ON sub.parparentrule = r.oid) THEN 'i'
		WHEN c.oid IN (SELECT parchildrelid FROM pg_partition_rule) THEN 'l'
		ELSE 'n' END",
            ),
        ],
    )
}

pub(crate) fn lookup_relations_query(version: &DbVersion, fqns: &[String]) -> Result<String> {
    let mut values = vec![];
    for fqn in fqns {
        let (schema, name) = split_fqn(fqn)?;
        values.push(format!(
            "({}, {}, {})",
            literal(fqn),
            literal(&schema),
            literal(&name)
        ));
    }
    Ok(format!(
        "SELECT v.fqn,
	c.oid,
	{} AS level,
	(c.relkind = 'm' AND NOT ({})) AS isextmatview
FROM (VALUES {}) AS v(fqn, schema, name)
JOIN pg_namespace n ON n.nspname = v.schema
JOIN pg_class c ON c.relnamespace = n.oid AND c.relname = v.name",
        partition_level_expr(version),
        extension_filter_clause("c"),
        values.join(", "),
    ))
}

pub(crate) async fn lookup_relations(
    db: &PostgreSQL,
    fqns: &[String],
) -> Result<Vec<FilteredRelation>> {
    if fqns.is_empty() {
        return Ok(vec![]);
    }
    db.query(&lookup_relations_query(&db.version, fqns)?)
        .await?
        .iter()
        .map(|row| {
            Ok(FilteredRelation {
                fqn: row.text("fqn")?,
                oid: row.oid("oid")?,
                partition_level: PartitionLevel::from_code(&row.text("level")?),
                is_extension_matview: row.flag("isextmatview")?,
            })
        })
        .collect()
}

fn partition_links_query(version: &DbVersion) -> &'static str {
    by_version(
        version,
        &[
            (
                "7",
                "SELECT i.inhparent AS parentoid,
	i.inhrelid AS childoid,
	e.reloid IS NOT NULL AS isexternal
FROM pg_inherits i
JOIN pg_class c ON c.oid = i.inhrelid
LEFT JOIN pg_exttable e ON e.reloid = i.inhrelid
WHERE c.relispartition
ORDER BY i.inhrelid",
            ),
            (
                "",
                "SELECT coalesce(parent_rule.parchildrelid, p.parrelid) AS parentoid,
	r.parchildrelid AS childoid,
	e.reloid IS NOT NULL AS isexternal
FROM pg_partition_rule r
JOIN pg_partition p ON r.paroid = p.oid
LEFT JOIN pg_partition_rule parent_rule ON r.parparentrule = parent_rule.oid
LEFT JOIN pg_exttable e ON e.reloid = r.parchildrelid
ORDER BY r.parchildrelid",
            ),
        ],
    )
}

pub(crate) async fn partition_links(db: &PostgreSQL) -> Result<Vec<PartitionLink>> {
    db.query(partition_links_query(&db.version))
        .await?
        .iter()
        .map(|row| {
            Ok(PartitionLink {
                parent_oid: row.oid("parentoid")?,
                child_oid: row.oid("childoid")?,
                is_external: row.flag("isexternal")?,
            })
        })
        .collect()
}

pub(crate) async fn schema_object_counts(
    db: &PostgreSQL,
    scope: &Scope,
) -> Result<HashMap<String, usize>> {
    let sql = format!(
        "SELECT n.nspname::text AS schema, count(c.oid) AS count
FROM pg_namespace n
LEFT JOIN pg_class c ON c.relnamespace = n.oid AND c.relkind IN ('r', 'p', 'f', 'v', 'm', 'S')
WHERE {}
GROUP BY n.nspname",
        scope.schema_clause("n"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let count: i64 = row.get_as("count")?;
            Ok((row.text("schema")?, count.max(0) as usize))
        })
        .collect()
}

pub(crate) fn schemas_query(scope: &Scope) -> String {
    let mut sql = format!(
        "SELECT n.oid, quote_ident(n.nspname) AS name
FROM pg_namespace n
WHERE {}
AND {}",
        scope.schema_clause("n"),
        extension_filter_clause("n"),
    );
    if scope.is_table_filtered() && !scope.include_oids.is_empty() {
        sql.push_str(&format!(
            "\nAND n.oid IN (SELECT c.relnamespace FROM pg_class c WHERE c.oid IN ({}))",
            crate::query::oid_list(&scope.include_oids)
        ));
    }
    sql.push_str("\nORDER BY name");
    sql
}

pub(crate) async fn schemas(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Schema>> {
    db.query(&schemas_query(scope))
        .await?
        .iter()
        .map(|row| {
            Ok(Schema {
                oid: row.oid("oid")?,
                name: row.text("name")?,
            })
        })
        .collect()
}

fn table_relkinds(version: &DbVersion) -> &'static str {
    by_version(version, &[("7", "'r', 'p', 'f'"), ("6", "'r', 'f'"), ("", "'r'")])
}

/// Leaves non-external leaf partitions out before 7; the root carries their
/// rows and the partition definition their DDL.
fn child_partition_filter(version: &DbVersion, scope: &Scope) -> &'static str {
    if scope.leaf_partition_data || version.at_least("7") {
        return "";
    }
    "
AND c.oid NOT IN (
	SELECT p.parchildrelid
	FROM pg_partition_rule p
	LEFT JOIN pg_exttable e ON p.parchildrelid = e.reloid
	WHERE e.reloid IS NULL)"
}

/// Predicate over `pg_class c` / `pg_namespace n` selecting the tables this
/// backup covers.
fn table_clause(version: &DbVersion, scope: &Scope) -> String {
    format!(
        "{}{}
AND c.relkind IN ({})
AND {}",
        scope.relation_clause(),
        child_partition_filter(version, scope),
        table_relkinds(version),
        extension_filter_clause("c"),
    )
}

pub(crate) fn tables_query(version: &DbVersion, scope: &Scope) -> String {
    let unlogged = if version.at_least("6") { "c.relpersistence = 'u'" } else { "false" };
    let replident = if version.at_least("6") { "c.relreplident::text" } else { "'d'" };
    let force_rls = if version.at_least("7") { "c.relforcerowsecurity" } else { "false" };
    let of_type = if version.at_least("6") {
        "CASE WHEN c.reloftype <> 0 THEN c.reloftype::regtype::text ELSE '' END"
    } else {
        "''"
    };
    let (access_method, am_join) = if version.at_least("7") {
        (
            "CASE WHEN am.amname IS NULL OR am.amname = 'heap' THEN '' ELSE quote_ident(am.amname) END",
            "\nLEFT JOIN pg_am am ON am.oid = c.relam",
        )
    } else {
        ("''", "")
    };
    format!(
        "SELECT c.oid,
	n.oid AS schemaoid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.relname) AS name,
	{level} AS partitionlevel,
	coalesce(array_to_string(c.reloptions, ', '), '') AS storageopts,
	coalesce(quote_ident(t.spcname), '') AS tablespace,
	{unlogged} AS isunlogged,
	{replident} AS replicaidentity,
	{force_rls} AS forcerowsecurity,
	{access_method} AS accessmethod,
	{of_type} AS oftype
FROM pg_class c
JOIN pg_namespace n ON c.relnamespace = n.oid
LEFT JOIN pg_tablespace t ON t.oid = c.reltablespace{am_join}
WHERE {clause}
ORDER BY c.oid",
        level = partition_level_expr(version),
        clause = table_clause(version, scope),
    )
}

pub(crate) fn columns_query(version: &DbVersion, scope: &Scope) -> String {
    let generated = if version.at_least("7") { "a.attgenerated = 's'" } else { "false" };
    let (collation, collation_join) = if version.at_least("6") {
        (
            "CASE WHEN a.attcollation <> ty.typcollation THEN quote_ident(cn.nspname) || '.' || quote_ident(coll.collname) ELSE '' END",
            "
LEFT JOIN pg_collation coll ON coll.oid = a.attcollation
LEFT JOIN pg_namespace cn ON cn.oid = coll.collnamespace",
        )
    } else {
        ("''", "")
    };
    let fdw_options = if version.at_least("6") {
        options_clause("a.attfdwoptions")
    } else {
        "''".to_string()
    };
    let (privileges, label_provider, label, label_join) = if version.at_least("6") {
        (
            "a.attacl::text[]",
            "coalesce(sec.provider, '')",
            "coalesce(sec.label, '')",
            "
LEFT JOIN pg_seclabel sec ON sec.objoid = a.attrelid AND sec.classoid = 'pg_class'::regclass AND sec.objsubid = a.attnum",
        )
    } else {
        ("NULL::text[]", "''", "''", "")
    };
    format!(
        "SELECT a.attrelid AS oid,
	quote_ident(a.attname) AS name,
	a.attnotnull,
	a.atthasdef,
	coalesce(pg_catalog.pg_get_expr(ad.adbin, ad.adrelid), '') AS defaultval,
	{generated} AS isgenerated,
	pg_catalog.format_type(a.atttypid, a.atttypmod) AS type,
	{collation} AS collation,
	CASE WHEN a.attstorage = ty.typstorage THEN ''
		WHEN a.attstorage = 'p' THEN 'PLAIN'
		WHEN a.attstorage = 'm' THEN 'MAIN'
		WHEN a.attstorage = 'e' THEN 'EXTERNAL'
		WHEN a.attstorage = 'x' THEN 'EXTENDED'
		ELSE '' END AS storage,
	a.attstattarget::int AS stattarget,
	coalesce(array_to_string(enc.attoptions, ','), '') AS encoding,
	coalesce(array_to_string(a.attoptions, ','), '') AS options,
	{fdw_options} AS fdwoptions,
	coalesce(pg_catalog.col_description(a.attrelid, a.attnum), '') AS comment,
	{privileges} AS privileges,
	{label_provider} AS securitylabelprovider,
	{label} AS securitylabel,
	NOT a.attislocal AS isinherited
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_type ty ON ty.oid = a.atttypid
LEFT JOIN pg_attrdef ad ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum
LEFT JOIN pg_attribute_encoding enc ON enc.attrelid = a.attrelid AND enc.attnum = a.attnum{collation_join}{label_join}
WHERE {clause}
AND a.attnum > 0
AND NOT a.attisdropped
ORDER BY a.attrelid, a.attnum",
        clause = table_clause(version, scope),
    )
}

pub(crate) fn distribution_policies_query(version: &DbVersion) -> &'static str {
    by_version(
        version,
        &[
            (
                "6",
                "SELECT p.localoid AS oid,
	pg_catalog.pg_get_table_distributedby(p.localoid) AS policy
FROM gp_distribution_policy p",
            ),
            (
                "",
                "SELECT p.localoid AS oid,
	CASE WHEN p.attrnums IS NULL THEN 'DISTRIBUTED RANDOMLY'
	ELSE 'DISTRIBUTED BY (' || array_to_string(ARRAY(
		SELECT quote_ident(a.attname) FROM pg_attribute a
		WHERE a.attrelid = p.localoid AND a.attnum = ANY(p.attrnums)), ', ') || ')' END AS policy
FROM gp_distribution_policy p",
            ),
        ],
    )
}

pub(crate) fn external_tables_query(version: &DbVersion) -> String {
    let (error_table, join_column, log_errors) = if version.at_least("6") {
        (
            "CASE WHEN logerrors = 'false' THEN '' ELSE quote_ident(c.relname) END AS errtablename,
	CASE WHEN logerrors = 'false' THEN '' ELSE coalesce(
		(SELECT quote_ident(nspname) FROM pg_namespace n WHERE n.oid = c.relnamespace), '') END AS errtableschema,",
            "reloid",
            "logerrors",
        )
    } else {
        (
            "coalesce(quote_ident(c.relname), '') AS errtablename,
	coalesce((SELECT quote_ident(nspname) FROM pg_namespace n WHERE n.oid = c.relnamespace), '') AS errtableschema,",
            "fmterrtbl",
            "fmterrtbl IS NOT NULL",
        )
    };
    let options = if version.at_least("6") {
        "coalesce(array_to_string(ARRAY(SELECT pg_catalog.quote_ident(option_name) || ' ' || pg_catalog.quote_literal(option_value) FROM pg_options_to_table(e.options) ORDER BY option_name), E',\\n\\t'), '')"
    } else {
        "''"
    };
    format!(
        "SELECT e.reloid AS oid,
	CASE WHEN urilocation IS NOT NULL THEN unnest(urilocation) ELSE '' END AS location,
	array_to_string(execlocation, ',') AS execlocation,
	fmttype::text AS formattype,
	fmtopts AS formatopts,
	{options} AS options,
	coalesce(command, '') AS command,
	coalesce(rejectlimit, 0)::int AS rejectlimit,
	coalesce(rejectlimittype::text, '') AS rejectlimittype,
	{error_table}
	{log_errors} AS logerrors,
	pg_encoding_to_char(encoding)::text AS encoding,
	writable
FROM pg_exttable e
LEFT JOIN pg_class c ON e.{join_column} = c.oid"
    )
}

async fn external_tables(db: &PostgreSQL) -> Result<HashMap<u32, ExternalTableDefinition>> {
    let mut definitions: HashMap<u32, ExternalTableDefinition> = HashMap::new();
    for row in db.query(&external_tables_query(&db.version)).await? {
        let oid = row.oid("oid")?;
        let location = row.text("location")?;
        if !definitions.contains_key(&oid) {
            definitions.insert(
                oid,
                ExternalTableDefinition {
                    oid,
                    uris: vec![],
                    command: row.text("command")?,
                    exec_location: ExecLocation::parse(&row.text("execlocation")?),
                    format_type: row.text("formattype")?,
                    format_opts: row.text("formatopts")?,
                    options: row.text("options")?,
                    encoding: row.text("encoding")?,
                    writable: row.flag("writable")?,
                    reject_limit: row.int("rejectlimit")?,
                    reject_limit_type: match row.text("rejectlimittype")?.as_str() {
                        "p" => RejectLimitType::Percent,
                        _ => RejectLimitType::Rows,
                    },
                    log_errors: row.flag("logerrors")?,
                    error_table_schema: row.text("errtableschema")?,
                    error_table_name: row.text("errtablename")?,
                },
            );
        }
        if !location.is_empty() {
            if let Some(definition) = definitions.get_mut(&oid) {
                definition.uris.push(location);
            }
        }
    }
    Ok(definitions)
}

async fn texts_by_oid(db: &PostgreSQL, sql: &str, column: &str) -> Result<HashMap<u32, String>> {
    db.query(sql)
        .await?
        .iter()
        .map(|row| Ok((row.oid("oid")?, row.text(column)?)))
        .collect()
}

async fn distribution_policies(db: &PostgreSQL) -> Result<HashMap<u32, String>> {
    texts_by_oid(db, distribution_policies_query(&db.version), "policy").await
}

async fn columns(db: &PostgreSQL, scope: &Scope) -> Result<HashMap<u32, Vec<ColumnDefinition>>> {
    let quoted_roles = db.quoted_roles().await?;
    let mut columns: HashMap<u32, Vec<ColumnDefinition>> = HashMap::new();
    for row in db.query(&columns_query(&db.version, scope)).await? {
        let default = row.text("defaultval")?;
        let privileges = match row.get_as::<Option<Vec<String>>>("privileges")? {
            Some(items) if items.is_empty() => vec![Acl::empty()],
            Some(items) => items
                .iter()
                .filter_map(|item| parse_privilege("Default", Some(item), quoted_roles))
                .collect(),
            None => vec![],
        };
        let column = ColumnDefinition {
            not_null: row.flag("attnotnull")?,
            default: (row.flag("atthasdef")? && !default.is_empty()).then_some(default),
            is_generated: row.flag("isgenerated")?,
            collation: row.text("collation")?,
            storage: row.text("storage")?,
            stat_target: row.int("stattarget")?,
            encoding: row.text("encoding")?,
            options: row.text("options")?,
            fdw_options: row.text("fdwoptions")?,
            comment: row.text("comment")?,
            privileges,
            security_label_provider: row.text("securitylabelprovider")?,
            security_label: row.text("securitylabel")?,
            is_inherited: row.flag("isinherited")?,
            ..ColumnDefinition::new(row.text("name")?, row.text("type")?)
        };
        columns.entry(row.oid("oid")?).or_default().push(column);
    }
    Ok(columns)
}

async fn inherits(db: &PostgreSQL) -> Result<HashMap<u32, Vec<String>>> {
    let legacy_children = if db.version.before("7") {
        "\nWHERE i.inhrelid NOT IN (SELECT parchildrelid FROM pg_partition_rule)"
    } else {
        ""
    };
    let sql = format!(
        "SELECT i.inhrelid AS oid,
	quote_ident(pn.nspname) || '.' || quote_ident(p.relname) AS parent
FROM pg_inherits i
JOIN pg_class p ON p.oid = i.inhparent
JOIN pg_namespace pn ON pn.oid = p.relnamespace{legacy_children}
ORDER BY i.inhrelid, i.inhseqno"
    );
    let mut parents: HashMap<u32, Vec<String>> = HashMap::new();
    for row in db.query(&sql).await? {
        parents.entry(row.oid("oid")?).or_default().push(row.text("parent")?);
    }
    Ok(parents)
}

/// Legacy partition and subpartition template definitions of root tables.
async fn partition_defs(db: &PostgreSQL) -> Result<HashMap<u32, (String, String)>> {
    if db.version.at_least("7") {
        return Ok(HashMap::new());
    }
    let sql = "SELECT p.parrelid AS oid,
	coalesce(pg_get_partition_def(p.parrelid, true, true), '') AS partitiondef,
	coalesce(pg_get_partition_template_def(p.parrelid, true, true), '') AS templatedef
FROM pg_partition p
WHERE p.parlevel = 0 AND NOT p.paristemplate";
    db.query(sql)
        .await?
        .iter()
        .map(|row| {
            Ok((
                row.oid("oid")?,
                (row.text("partitiondef")?, row.text("templatedef")?),
            ))
        })
        .collect()
}

async fn partition_keys(db: &PostgreSQL) -> Result<HashMap<u32, String>> {
    if db.version.before("7") {
        return Ok(HashMap::new());
    }
    texts_by_oid(
        db,
        "SELECT partrelid AS oid, pg_get_partkeydef(partrelid) AS keydef FROM pg_partitioned_table",
        "keydef",
    )
    .await
}

async fn attach_partitions(db: &PostgreSQL) -> Result<HashMap<u32, AttachPartitionInfo>> {
    if db.version.before("7") {
        return Ok(HashMap::new());
    }
    let sql = "SELECT c.oid,
	quote_ident(n.nspname) || '.' || quote_ident(c.relname) AS relname,
	quote_ident(pn.nspname) || '.' || quote_ident(p.relname) AS parent,
	pg_get_expr(c.relpartbound, c.oid) AS expr
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_inherits i ON i.inhrelid = c.oid
JOIN pg_class p ON p.oid = i.inhparent
JOIN pg_namespace pn ON pn.oid = p.relnamespace
WHERE c.relispartition";
    db.query(sql)
        .await?
        .iter()
        .map(|row| {
            Ok((
                row.oid("oid")?,
                AttachPartitionInfo {
                    relname: row.text("relname")?,
                    parent: row.text("parent")?,
                    expr: row.text("expr")?,
                },
            ))
        })
        .collect()
}

/// Partitions living in a different schema than their root.
async fn altered_partition_schemas(
    db: &PostgreSQL,
) -> Result<HashMap<u32, Vec<AlteredPartitionSchema>>> {
    if db.version.at_least("7") {
        return Ok(HashMap::new());
    }
    let sql = "SELECT p.parrelid AS oid,
	quote_ident(rn.nspname) AS oldschema,
	quote_ident(cc.relname) AS name,
	quote_ident(cn.nspname) AS newschema
FROM pg_partition_rule pr
JOIN pg_partition p ON p.oid = pr.paroid
JOIN pg_class rc ON rc.oid = p.parrelid
JOIN pg_namespace rn ON rn.oid = rc.relnamespace
JOIN pg_class cc ON cc.oid = pr.parchildrelid
JOIN pg_namespace cn ON cn.oid = cc.relnamespace
WHERE rn.nspname <> cn.nspname
ORDER BY pr.parchildrelid";
    let mut altered: HashMap<u32, Vec<AlteredPartitionSchema>> = HashMap::new();
    for row in db.query(sql).await? {
        altered
            .entry(row.oid("oid")?)
            .or_default()
            .push(AlteredPartitionSchema {
                old_schema: row.text("oldschema")?,
                name: row.text("name")?,
                new_schema: row.text("newschema")?,
            });
    }
    Ok(altered)
}

async fn foreign_tables(db: &PostgreSQL) -> Result<HashMap<u32, ForeignTableDefinition>> {
    if db.version.before("6") {
        return Ok(HashMap::new());
    }
    let external = if db.version.at_least("7") {
        "\nWHERE ft.ftrelid NOT IN (SELECT reloid FROM pg_exttable)"
    } else {
        ""
    };
    let sql = format!(
        "SELECT ft.ftrelid AS oid,
	quote_ident(fs.srvname) AS server,
	{} AS options
FROM pg_foreign_table ft
JOIN pg_foreign_server fs ON ft.ftserver = fs.oid{external}",
        options_clause("ft.ftoptions"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok((
                row.oid("oid")?,
                ForeignTableDefinition {
                    server: row.text("server")?,
                    options: row.text("options")?,
                },
            ))
        })
        .collect()
}

pub(crate) async fn tables(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Table>> {
    tracing::debug!("retrieving table definitions");
    let rows = db.query(&tables_query(&db.version, scope)).await?;
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let mut columns = columns(db, scope).await?;
    let policies = distribution_policies(db).await?;
    let mut externals = external_tables(db).await?;
    let mut foreign = foreign_tables(db).await?;
    let mut inherits = inherits(db).await?;
    let mut part_defs = partition_defs(db).await?;
    let mut part_keys = partition_keys(db).await?;
    let mut attached = attach_partitions(db).await?;
    let mut altered = altered_partition_schemas(db).await?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in rows {
        let oid = row.oid("oid")?;
        let partition_level = PartitionLevel::from_code(&row.text("partitionlevel")?);
        let external = externals.remove(&oid);
        let (part_def, part_template_def) = part_defs.remove(&oid).unwrap_or_default();
        let relation = Relation {
            schema_oid: row.oid("schemaoid")?,
            ..Relation::new(oid, row.text("schema")?, row.text("name")?)
        };
        tables.push(Table {
            columns: columns.remove(&oid).unwrap_or_default(),
            dist_policy: policies.get(&oid).cloned().unwrap_or_default(),
            partition_level,
            part_def,
            part_template_def,
            partition_key_def: part_keys.remove(&oid).unwrap_or_default(),
            inherits: inherits.remove(&oid).unwrap_or_default(),
            tablespace: row.text("tablespace")?,
            storage_opts: row.text("storageopts")?,
            access_method: row.text("accessmethod")?,
            of_type: row.text("oftype")?,
            is_unlogged: row.flag("isunlogged")?,
            force_row_security: row.flag("forcerowsecurity")?,
            replica_identity: ReplicaIdentity::from_code(&row.text("replicaidentity")?),
            is_external_partition: external.is_some() && partition_level == PartitionLevel::Leaf,
            external,
            foreign: foreign.remove(&oid),
            attach_partition: attached.remove(&oid),
            altered_partition_schemas: altered.remove(&oid).unwrap_or_default(),
            depends_upon: vec![],
            relation,
        });
    }
    Ok(tables)
}

pub(crate) fn sequences_query(version: &DbVersion, scope: &Scope) -> String {
    let (identity, deptypes) = if version.at_least("7") {
        (
            "coalesce(a.attidentity::text, '') AS attidentity,
	coalesce(d.deptype = 'i', false) AS isidentity",
            "('a', 'i')",
        )
    } else {
        ("'' AS attidentity,\n\tfalse AS isidentity", "('a')")
    };
    format!(
        "SELECT n.oid AS schemaoid,
	c.oid AS oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.relname) AS name,
	coalesce(d.refobjid, 0) AS owningtableoid,
	coalesce(quote_ident(m.nspname), '') AS owningtableschema,
	coalesce(quote_ident(t.relname), '') AS owningtable,
	coalesce(quote_ident(a.attname), '') AS owningcolumn,
	{identity}
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_depend d ON c.oid = d.objid AND d.deptype IN {deptypes}
LEFT JOIN pg_class t ON t.oid = d.refobjid
LEFT JOIN pg_namespace m ON m.oid = t.relnamespace
LEFT JOIN pg_attribute a ON a.attrelid = d.refobjid AND a.attnum = d.refobjsubid
WHERE c.relkind = 'S'
AND {}
AND {}
ORDER BY n.nspname, c.relname",
        scope.relation_clause(),
        extension_filter_clause("c"),
    )
}

pub(crate) fn sequence_definition_query(version: &DbVersion, fqn: &str) -> String {
    if version.at_least("7") {
        return format!(
            "SELECT s.seqstart AS startval,
	r.last_value AS lastval,
	pg_catalog.format_type(s.seqtypid, NULL) AS type,
	s.seqincrement AS increment,
	s.seqmax AS maxval,
	s.seqmin AS minval,
	s.seqcache AS cacheval,
	r.log_cnt AS logcnt,
	s.seqcycle AS iscycled,
	r.is_called AS iscalled
FROM {fqn} r
JOIN pg_sequence s ON s.seqrelid = {}::regclass::oid",
            literal(fqn)
        );
    }
    let start = if version.at_least("6") { "start_value" } else { "1::bigint" };
    format!(
        "SELECT last_value AS lastval,
	{start} AS startval,
	'bigint' AS type,
	increment_by AS increment,
	max_value AS maxval,
	min_value AS minval,
	cache_value AS cacheval,
	log_cnt AS logcnt,
	is_cycled AS iscycled,
	is_called AS iscalled
FROM {fqn}"
    )
}

async fn sequence_definition(db: &PostgreSQL, fqn: &str) -> Result<SequenceDefinition> {
    let row = db
        .query_one(&sequence_definition_query(&db.version, fqn), fqn)
        .await?;
    Ok(SequenceDefinition {
        last_value: row.get_as("lastval")?,
        data_type: row.text("type")?,
        start: row.get_as("startval")?,
        increment: row.get_as("increment")?,
        max_value: row.get_as("maxval")?,
        min_value: row.get_as("minval")?,
        cache: row.get_as("cacheval")?,
        log_count: row.get_as("logcnt")?,
        is_cycled: row.flag("iscycled")?,
        is_called: row.flag("iscalled")?,
    })
}

pub(crate) async fn sequences(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Sequence>> {
    let rows = db.query(&sequences_query(&db.version, scope)).await?;
    let mut sequences = Vec::with_capacity(rows.len());
    for row in rows {
        let relation = Relation {
            schema_oid: row.oid("schemaoid")?,
            ..Relation::new(row.oid("oid")?, row.text("schema")?, row.text("name")?)
        };
        let owning_oid = row.oid("owningtableoid")?;
        let mut owning_table = row.text("owningtable")?;
        let column = row.text("owningcolumn")?;
        if !owning_table.is_empty() {
            owning_table = make_fqn(&row.text("owningtableschema")?, &owning_table);
        }
        let mut owning_column = if column.is_empty() {
            String::new()
        } else {
            make_fqn(&owning_table, &column)
        };
        // Ownership of an excluded table cannot be restored.
        if scope.exclude_oids.contains(&owning_oid) {
            owning_table.clear();
            owning_column.clear();
        }
        let identity = if row.flag("isidentity")? {
            IdentityKind::from_code(&row.text("attidentity")?)
        } else {
            None
        };
        let definition = sequence_definition(db, &relation.fqn()).await?;
        sequences.push(Sequence {
            relation,
            owning_table,
            owning_column,
            unqualified_owning_column: column,
            identity,
            definition,
        });
    }
    Ok(sequences)
}

pub(crate) fn views_query(version: &DbVersion, scope: &Scope) -> String {
    let extra = if version.at_least("6") {
        "coalesce(' WITH (' || array_to_string(c.reloptions, ', ') || ')', '') AS options,
	coalesce(quote_ident(t.spcname), '') AS tablespace,
	c.relkind = 'm' AS ismaterialized"
    } else {
        "'' AS options,\n\t'' AS tablespace,\n\tfalse AS ismaterialized"
    };
    format!(
        "SELECT c.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.relname) AS name,
	pg_get_viewdef(c.oid) AS definition,
	{extra}
FROM pg_class c
LEFT JOIN pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_tablespace t ON t.oid = c.reltablespace
WHERE c.relkind IN ('m', 'v')
AND {}
AND {}",
        scope.relation_clause(),
        extension_filter_clause("c"),
    )
}

/// Views and materialized views.
///
/// `pg_get_viewdef` takes locks that would otherwise be held until the
/// backup transaction ends, so the definitions are read inside a savepoint
/// that is rolled back afterwards.
pub(crate) async fn views(db: &PostgreSQL, scope: &Scope) -> Result<Vec<View>> {
    db.batch("SAVEPOINT gpbackup_get_views").await?;
    let rows = db.query(&views_query(&db.version, scope)).await;
    db.batch("ROLLBACK TO SAVEPOINT gpbackup_get_views").await?;
    let rows = rows?;

    let policies = distribution_policies(db).await?;
    let mut views = vec![];
    for row in rows {
        let view = View {
            oid: row.oid("oid")?,
            schema: row.text("schema")?,
            name: row.text("name")?,
            options: row.text("options")?,
            definition: row.get_as("definition")?,
            tablespace: row.text("tablespace")?,
            is_materialized: row.flag("ismaterialized")?,
            dist_policy: String::new(),
            depends_upon: vec![],
        };
        let Some(definition) = &view.definition else {
            tracing::warn!(
                view = %view.fqn(),
                "View '{}' not backed up, most likely dropped after gpbackup had begun.",
                view.fqn()
            );
            continue;
        };
        if definition.contains("::anyarray") {
            return Err(Error::unexpected_shape(format!(
                "Detected anyarray type cast in view definition for View '{}'. Drop the view or recreate the view without explicit array type casts.",
                view.fqn()
            )));
        }
        let dist_policy = if view.is_materialized {
            policies.get(&view.oid).cloned().unwrap_or_default()
        } else {
            String::new()
        };
        views.push(View { dist_policy, ..view });
    }
    Ok(views)
}

pub(crate) const PARTITION_INFO_QUERY: &str = "SELECT pr1.oid AS partitionruleoid,
	pr1.parparentrule AS partitionparentruleoid,
	cl.oid AS parentrelationoid,
	quote_ident(n.nspname) AS parentschema,
	quote_ident(cl.relname) AS parentrelationname,
	pr1.parchildrelid AS relationoid,
	CASE WHEN pr1.parname = '' THEN '' ELSE quote_ident(pr1.parname) END AS partitionname,
	CASE WHEN pp.parkind <> 'r'::\"char\" OR pr1.parisdefault THEN 0
		ELSE pg_catalog.rank() OVER (PARTITION BY pp.oid, cl.relname, pp.parlevel, cl3.relname
			ORDER BY pr1.parisdefault, pr1.parruleord) END::int AS partitionrank,
	e.reloid IS NOT NULL AS isexternal
FROM pg_namespace n, pg_namespace n2, pg_class cl
	LEFT JOIN pg_tablespace sp ON cl.reltablespace = sp.oid, pg_class cl2
	LEFT JOIN pg_tablespace sp3 ON cl2.reltablespace = sp3.oid, pg_partition pp, pg_partition_rule pr1
	LEFT JOIN pg_partition_rule pr2 ON pr1.parparentrule = pr2.oid
	LEFT JOIN pg_class cl3 ON pr2.parchildrelid = cl3.oid
	LEFT JOIN pg_exttable e ON e.reloid = pr1.parchildrelid
WHERE pp.paristemplate = false
	AND pp.parrelid = cl.oid
	AND pr1.paroid = pp.oid
	AND cl2.oid = pr1.parchildrelid
	AND cl.relnamespace = n.oid
	AND cl2.relnamespace = n2.oid";

/// Every legacy partition rule. Declarative partitions on 7 carry their
/// bounds in the table itself, so nothing is returned there.
pub(crate) async fn partition_infos(db: &PostgreSQL, _scope: &Scope) -> Result<Vec<PartitionInfo>> {
    if db.version.at_least("7") {
        return Ok(vec![]);
    }
    db.query(PARTITION_INFO_QUERY)
        .await?
        .iter()
        .map(|row| {
            Ok(PartitionInfo {
                rule_oid: row.oid("partitionruleoid")?,
                parent_rule_oid: row.oid("partitionparentruleoid")?,
                parent_relation_oid: row.oid("parentrelationoid")?,
                parent_schema: row.text("parentschema")?,
                parent_relation_name: row.text("parentrelationname")?,
                relation_oid: row.oid("relationoid")?,
                partition_name: row.text("partitionname")?,
                rank: row.int("partitionrank")?,
                is_external: row.flag("isexternal")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::filter::Filters;
    use pretty_assertions::assert_eq;

    fn version(release: &str) -> DbVersion {
        DbVersion::from_release(release).unwrap()
    }

    #[test]
    fn leaf_partitions_dropped_unless_requested_before_7() {
        let scope = Scope::default();
        assert!(tables_query(&version("6.20.0"), &scope).contains("SELECT p.parchildrelid"));
        assert!(!tables_query(&version("7.0.0"), &scope).contains("SELECT p.parchildrelid"));

        let leaves = Scope {
            leaf_partition_data: true,
            ..Scope::default()
        };
        assert!(!tables_query(&version("6.20.0"), &leaves).contains("SELECT p.parchildrelid"));
    }

    #[test]
    fn relkinds_by_version() {
        assert_eq!(table_relkinds(&version("5.28.0")), "'r'");
        assert_eq!(table_relkinds(&version("6.1.0")), "'r', 'f'");
        assert_eq!(table_relkinds(&version("7.1.0")), "'r', 'p', 'f'");
    }

    #[test]
    fn table_filter_oids_reach_queries() {
        let scope = Scope {
            include_oids: vec![10, 11],
            exclude_oids: vec![12],
            ..Scope::default()
        };
        let sql = tables_query(&version("6.20.0"), &scope);
        assert!(sql.contains("AND c.oid NOT IN (12)"));
        assert!(sql.contains("AND c.oid IN (10,11)"));
        assert!(columns_query(&version("6.20.0"), &scope).contains("AND c.oid IN (10,11)"));
    }

    #[test]
    fn lookup_splits_quoted_names() {
        let sql = lookup_relations_query(
            &version("6.20.0"),
            &[r#""My Schema".tbl"#.to_string()],
        )
        .unwrap();
        assert!(sql.contains(r#"('"My Schema".tbl', 'My Schema', 'tbl')"#));

        let err = lookup_relations_query(&version("6.20.0"), &["nodot".to_string()]).unwrap_err();
        assert!(err.is_filter_validation());
    }

    #[test]
    fn error_tables_by_version() {
        let v5 = external_tables_query(&version("5.28.0"));
        assert!(v5.contains("ON e.fmterrtbl = c.oid"));
        assert!(v5.contains("fmterrtbl IS NOT NULL AS logerrors"));

        let v6 = external_tables_query(&version("6.20.0"));
        assert!(v6.contains("ON e.reloid = c.oid"));
        assert!(v6.contains("WHEN logerrors = 'false'"));
        assert!(v6.contains("pg_options_to_table(e.options)"));
    }

    #[test]
    fn sequence_definitions_come_from_pg_sequence_on_7() {
        let v7 = sequence_definition_query(&version("7.0.0"), "public.seq");
        assert!(v7.contains("JOIN pg_sequence s ON s.seqrelid = 'public.seq'::regclass::oid"));

        let v5 = sequence_definition_query(&version("5.28.0"), "public.seq");
        assert!(v5.contains("1::bigint AS startval"));
        assert!(v5.ends_with("FROM public.seq"));
    }

    #[test]
    fn identity_columns_only_on_7() {
        let scope = Scope::default();
        assert!(sequences_query(&version("7.0.0"), &scope).contains("d.deptype IN ('a', 'i')"));
        assert!(sequences_query(&version("6.20.0"), &scope).contains("false AS isidentity"));
    }

    #[test]
    fn schemas_follow_included_tables() {
        let scope = Scope {
            filters: Filters {
                include_relations: vec!["public.t".into()],
                ..Filters::default()
            },
            include_oids: vec![42],
            ..Scope::default()
        };
        assert!(schemas_query(&scope).contains("WHERE c.oid IN (42))"));
        assert!(!schemas_query(&Scope::default()).contains("relnamespace"));
    }

    #[test]
    fn materialized_views_from_6() {
        assert!(views_query(&version("6.20.0"), &Scope::default()).contains("c.relkind = 'm' AS ismaterialized"));
        assert!(views_query(&version("5.28.0"), &Scope::default()).contains("false AS ismaterialized"));
    }
}
