use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{
    catalog::{
        sort_acls, Acl, DefaultPrivilegeObject, DefaultPrivileges, MetadataMap, ObjectMetadata,
        UniqueId,
    },
    driver::{MetadataKind, Scope},
    version::DbVersion,
    Result,
};
use std::collections::HashMap;

/// Oids below this belong to objects created by initdb.
const FIRST_NORMAL_OBJECT_ID: u32 = 16384;

/// Where the metadata of one object kind lives.
#[derive(Debug, Clone, Default)]
struct Params {
    catalog: &'static str,
    name: &'static str,
    schema: &'static str,
    acl: &'static str,
    owner: &'static str,
    filter: &'static str,
    shared: bool,
}

fn params(version: &DbVersion, kind: MetadataKind) -> Params {
    use MetadataKind::*;

    let new = |catalog, name| Params {
        catalog,
        name,
        ..Params::default()
    };

    match kind {
        Aggregate | Function => Params {
            schema: "pronamespace",
            acl: "proacl",
            owner: "proowner",
            filter: match (kind, version.at_least("7")) {
                (Aggregate, true) => "prokind = 'a'",
                (Aggregate, false) => "proisagg = 't'",
                (_, true) => "prokind <> 'a'",
                (_, false) => "proisagg = 'f'",
            },
            ..new("pg_proc", "proname")
        },
        Cast => new("pg_cast", ""),
        Collation => Params {
            schema: "collnamespace",
            owner: "collowner",
            ..new("pg_collation", "collname")
        },
        Constraint => Params {
            schema: "connamespace",
            ..new("pg_constraint", "conname")
        },
        Conversion => Params {
            schema: "connamespace",
            owner: "conowner",
            ..new("pg_conversion", "conname")
        },
        Database => Params {
            acl: "datacl",
            owner: "datdba",
            shared: true,
            ..new("pg_database", "datname")
        },
        EventTrigger => Params {
            owner: "evtowner",
            ..new("pg_event_trigger", "evtname")
        },
        Extension => new("pg_extension", "extname"),
        ExternalProtocol => Params {
            acl: "ptcacl",
            owner: "ptcowner",
            ..new("pg_extprotocol", "ptcname")
        },
        ForeignDataWrapper => Params {
            acl: "fdwacl",
            owner: "fdwowner",
            ..new("pg_foreign_data_wrapper", "fdwname")
        },
        ForeignServer => Params {
            acl: "srvacl",
            owner: "srvowner",
            ..new("pg_foreign_server", "srvname")
        },
        Language => Params {
            acl: "lanacl",
            owner: "lanowner",
            ..new("pg_language", "lanname")
        },
        Operator => Params {
            schema: "oprnamespace",
            owner: "oprowner",
            ..new("pg_operator", "oprname")
        },
        OperatorClass => Params {
            schema: "opcnamespace",
            owner: "opcowner",
            ..new("pg_opclass", "opcname")
        },
        OperatorFamily => Params {
            schema: "opfnamespace",
            owner: "opfowner",
            ..new("pg_opfamily", "opfname")
        },
        Relation => Params {
            schema: "relnamespace",
            acl: "relacl",
            owner: "relowner",
            ..new("pg_class", "relname")
        },
        ResourceGroup => Params {
            shared: true,
            ..new("pg_resgroup", "rsgname")
        },
        ResourceQueue => Params {
            shared: true,
            ..new("pg_resqueue", "rsqname")
        },
        Role => Params {
            shared: true,
            ..new("pg_authid", "rolname")
        },
        Schema => Params {
            acl: "nspacl",
            owner: "nspowner",
            ..new("pg_namespace", "nspname")
        },
        Tablespace => Params {
            acl: "spcacl",
            owner: "spcowner",
            shared: true,
            ..new("pg_tablespace", "spcname")
        },
        TextSearchConfiguration => Params {
            schema: "cfgnamespace",
            owner: "cfgowner",
            ..new("pg_ts_config", "cfgname")
        },
        TextSearchDictionary => Params {
            schema: "dictnamespace",
            owner: "dictowner",
            ..new("pg_ts_dict", "dictname")
        },
        TextSearchParser => Params {
            schema: "prsnamespace",
            ..new("pg_ts_parser", "prsname")
        },
        TextSearchTemplate => Params {
            schema: "tmplnamespace",
            ..new("pg_ts_template", "tmplname")
        },
        Type => Params {
            schema: "typnamespace",
            acl: if version.at_least("6") { "typacl" } else { "" },
            owner: "typowner",
            ..new("pg_type", "typname")
        },
        Index => new("pg_index", "indexrelid"),
        Rule => new("pg_rewrite", "oid"),
        Trigger => new("pg_trigger", "oid"),
    }
}

/// Kinds that only carry comments, keyed on an oid column of `catalog`.
fn comments_only(kind: MetadataKind) -> bool {
    matches!(
        kind,
        MetadataKind::Index | MetadataKind::Rule | MetadataKind::Trigger
    )
}

pub(crate) fn metadata_query(version: &DbVersion, scope: &Scope, kind: MetadataKind) -> String {
    let params = params(version, kind);
    if comments_only(kind) {
        return comments_query(&params);
    }
    let catalog = params.catalog;

    let mut joins = vec![];
    let (privileges, acl_kind) = if params.acl.is_empty() {
        ("NULL".to_string(), "''".to_string())
    } else {
        let acl = params.acl;
        let privileges = if version.at_least("7") {
            joins.push(format!(
                "LEFT JOIN LATERAL unnest(o.{acl}) ljl_unnest ON o.{acl} IS NOT NULL AND array_length(o.{acl}, 1) != 0"
            ));
            "ljl_unnest::text".to_string()
        } else {
            format!(
                "CASE
		WHEN o.{acl} IS NULL THEN NULL
		WHEN array_upper(o.{acl}, 1) = 0 THEN o.{acl}[0]::text
		ELSE unnest(o.{acl})::text END"
            )
        };
        let kind = format!(
            "CASE
		WHEN o.{acl} IS NULL THEN ''
		WHEN array_upper(o.{acl}, 1) = 0 THEN 'Empty'
		ELSE '' END"
        );
        (privileges, kind)
    };

    let mut filter = "1 = 1".to_string();
    if !params.schema.is_empty() {
        joins.insert(0, format!("JOIN pg_namespace n ON o.{} = n.oid", params.schema));
        filter = scope.schema_clause("n");
    }
    if !params.filter.is_empty() {
        filter.push_str(&format!(" AND o.{}", params.filter));
    }

    let (description, subid) = if params.shared {
        ("pg_shdescription", "")
    } else {
        ("pg_description", " AND d.objsubid = 0")
    };

    let mut labels = String::new();
    if version.at_least("6") {
        labels = "coalesce(sec.label, '') AS security_label,
	coalesce(sec.provider, '') AS security_label_provider,"
            .to_string();
        let (table, subid) = if params.shared {
            ("pg_shseclabel", "")
        } else {
            ("pg_seclabel", " AND sec.objsubid = 0")
        };
        joins.insert(
            0,
            format!(
                "LEFT JOIN {table} sec ON (sec.objoid = o.oid AND sec.classoid = '{catalog}'::regclass{subid})"
            ),
        );
    }

    let owner = if params.owner.is_empty() {
        "''".to_string()
    } else {
        format!("quote_ident(pg_get_userbyid(o.{}))", params.owner)
    };

    format!(
        "SELECT '{catalog}'::regclass::oid AS classid,
	o.oid,
	{acl_kind} AS kind,
	{owner} AS owner,
	{privileges} AS privileges,
	{labels}
	coalesce(d.description, '') AS comment
FROM {catalog} o
LEFT JOIN {description} d ON (d.objoid = o.oid AND d.classoid = '{catalog}'::regclass{subid})
{}
WHERE {filter}
ORDER BY o.oid",
        joins.join("\n")
    )
}

fn comments_query(params: &Params) -> String {
    let oid = params.name;
    let comment_table = if params.catalog == "pg_index" {
        "pg_class"
    } else {
        params.catalog
    };
    format!(
        "SELECT '{catalog}'::regclass::oid AS classid,
	o.{oid} AS oid,
	coalesce(d.description, '') AS comment
FROM {catalog} o
JOIN pg_description d ON (d.objoid = o.{oid} AND d.classoid = '{comment_table}'::regclass AND d.objsubid = 0)
WHERE o.{oid} >= {FIRST_NORMAL_OBJECT_ID}",
        catalog = params.catalog,
    )
}

/// One row of a metadata query; an object with several grants spans
/// several consecutive rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetadataRow {
    pub(crate) id: UniqueId,
    pub(crate) kind: String,
    pub(crate) owner: String,
    pub(crate) privileges: Option<String>,
    pub(crate) comment: String,
    pub(crate) security_label_provider: String,
    pub(crate) security_label: String,
}

/// Parses an aclitem and maps its grantee to the quoted role name.
///
/// The server prints grantees double-quoted when they need it; the quoted
/// form is looked up from the stored name so it matches `quote_ident`.
pub(crate) fn parse_privilege(
    kind: &str,
    privileges: Option<&str>,
    quoted_roles: &HashMap<String, String>,
) -> Option<Acl> {
    if kind == "Empty" {
        return Some(Acl::empty());
    }
    let mut acl = Acl::parse(privileges?)?;
    if !acl.grantee.is_empty() {
        let stored = match acl
            .grantee
            .strip_prefix('"')
            .and_then(|g| g.strip_suffix('"'))
        {
            Some(inner) => inner.replace("\"\"", "\""),
            None => acl.grantee.clone(),
        };
        if let Some(quoted) = quoted_roles.get(&stored) {
            acl.grantee = quoted.clone();
        }
    }
    Some(acl)
}

pub(crate) fn build_metadata_map(
    rows: Vec<MetadataRow>,
    quoted_roles: &HashMap<String, String>,
) -> MetadataMap {
    let mut map = MetadataMap::new();
    for row in rows {
        let metadata = map.entry(row.id).or_insert_with(|| ObjectMetadata {
            privileges: vec![],
            owner: row.owner.clone(),
            comment: row.comment.clone(),
            security_label_provider: row.security_label_provider.clone(),
            security_label: row.security_label.clone(),
        });
        if let Some(acl) = parse_privilege(&row.kind, row.privileges.as_deref(), quoted_roles) {
            metadata.privileges.push(acl);
        }
    }
    for metadata in map.values_mut() {
        sort_acls(&mut metadata.privileges);
    }
    map
}

pub(crate) async fn object_metadata(
    db: &PostgreSQL,
    scope: &Scope,
    kind: MetadataKind,
) -> Result<MetadataMap> {
    tracing::debug!(?kind, "reading object metadata");
    let rows = db.query(&metadata_query(&db.version, scope, kind)).await?;

    if comments_only(kind) {
        let mut map = MetadataMap::new();
        for row in rows {
            map.insert(
                UniqueId::new(row.oid("classid")?, row.oid("oid")?),
                ObjectMetadata {
                    comment: row.text("comment")?,
                    ..ObjectMetadata::default()
                },
            );
        }
        return Ok(map);
    }

    let labelled = db.version.at_least("6");
    let rows = rows
        .iter()
        .map(|row| {
            Ok(MetadataRow {
                id: UniqueId::new(row.oid("classid")?, row.oid("oid")?),
                kind: row.text("kind")?,
                owner: row.text("owner")?,
                privileges: row.get_as("privileges")?,
                comment: row.text("comment")?,
                security_label_provider: if labelled {
                    row.text("security_label_provider")?
                } else {
                    String::new()
                },
                security_label: if labelled {
                    row.text("security_label")?
                } else {
                    String::new()
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(build_metadata_map(rows, db.quoted_roles().await?))
}

pub(crate) fn default_privileges_query(version: &DbVersion) -> String {
    let (privileges, lateral) = if version.at_least("7") {
        (
            "ljl_unnest::text",
            "LEFT JOIN LATERAL unnest(a.defaclacl) ljl_unnest ON a.defaclacl IS NOT NULL AND array_length(a.defaclacl, 1) != 0",
        )
    } else {
        (
            "CASE
		WHEN a.defaclacl IS NULL THEN NULL
		WHEN array_upper(a.defaclacl, 1) = 0 THEN a.defaclacl[0]::text
		ELSE unnest(a.defaclacl)::text END",
            "",
        )
    };
    format!(
        "SELECT a.oid,
	quote_ident(r.rolname) AS owner,
	coalesce(quote_ident(n.nspname), '') AS schema,
	{privileges} AS privileges,
	CASE
		WHEN a.defaclacl IS NULL THEN ''
		WHEN array_upper(a.defaclacl, 1) = 0 THEN 'Empty'
		ELSE ''
	END AS kind,
	a.defaclobjtype::text AS objecttype
FROM pg_default_acl a
JOIN pg_roles r ON r.oid = a.defaclrole
LEFT JOIN pg_namespace n ON n.oid = a.defaclnamespace
{lateral}
ORDER BY n.nspname, a.defaclobjtype, r.rolname"
    )
}

pub(crate) async fn default_privileges(
    db: &PostgreSQL,
    _scope: &Scope,
) -> Result<Vec<DefaultPrivileges>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let rows = db.query(&default_privileges_query(&db.version)).await?;
    let quoted_roles = db.quoted_roles().await?;

    let mut result: Vec<DefaultPrivileges> = vec![];
    let mut current = None;
    for row in rows {
        let oid = row.oid("oid")?;
        let code = row.text("objecttype")?;
        let Some(object_type) = DefaultPrivilegeObject::from_code(&code) else {
            tracing::warn!(object_type = %code, "skipping default privileges for unknown object type");
            continue;
        };
        if current != Some(oid) {
            current = Some(oid);
            result.push(DefaultPrivileges {
                owner: row.text("owner")?,
                schema: row.text("schema")?,
                object_type,
                privileges: vec![],
            });
        }
        let privileges: Option<String> = row.get_as("privileges")?;
        if let (Some(last), Some(acl)) = (
            result.last_mut(),
            parse_privilege(&row.text("kind")?, privileges.as_deref(), quoted_roles),
        ) {
            last.privileges.push(acl);
        }
    }
    for entry in &mut result {
        sort_acls(&mut entry.privileges);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::catalog::{class, AclKind};
    use pretty_assertions::assert_eq;

    fn version(release: &str) -> DbVersion {
        DbVersion::from_release(release).unwrap()
    }

    fn roles() -> HashMap<String, String> {
        HashMap::from([
            ("testrole".to_string(), "testrole".to_string()),
            ("Test Role".to_string(), "\"Test Role\"".to_string()),
        ])
    }

    #[test]
    fn acls_unnest_laterally_on_7() {
        let scope = Scope::default();
        let v7 = metadata_query(&version("7.1.0"), &scope, MetadataKind::Relation);
        assert!(v7.contains("LEFT JOIN LATERAL unnest(o.relacl) ljl_unnest"));
        let v6 = metadata_query(&version("6.20.0"), &scope, MetadataKind::Relation);
        assert!(v6.contains("ELSE unnest(o.relacl)::text END"));
        assert!(v6.contains("JOIN pg_namespace n ON o.relnamespace = n.oid"));
    }

    #[test]
    fn shared_objects_use_shared_catalogs() {
        let sql = metadata_query(&version("6.20.0"), &Scope::default(), MetadataKind::Role);
        assert!(sql.contains("LEFT JOIN pg_shdescription d"));
        assert!(sql.contains("LEFT JOIN pg_shseclabel sec"));
        assert!(!sql.contains("objsubid"));
        assert!(sql.contains("NULL AS privileges"));
    }

    #[test]
    fn labels_only_from_6() {
        let sql = metadata_query(&version("5.28.0"), &Scope::default(), MetadataKind::Schema);
        assert!(!sql.contains("seclabel"));
    }

    #[test]
    fn aggregates_and_functions_split_by_version() {
        let scope = Scope::default();
        assert!(metadata_query(&version("7.0.0"), &scope, MetadataKind::Aggregate)
            .contains("o.prokind = 'a'"));
        assert!(metadata_query(&version("6.20.0"), &scope, MetadataKind::Function)
            .contains("o.proisagg = 'f'"));
    }

    #[test]
    fn extensions_and_parsers_carry_comments_only() {
        let scope = Scope::default();
        let sql = metadata_query(&version("6.20.0"), &scope, MetadataKind::Extension);
        assert!(sql.contains("FROM pg_extension o"), "{sql}");
        assert!(sql.contains("'' AS owner"), "{sql}");
        assert!(sql.contains("NULL AS privileges"), "{sql}");

        let sql = metadata_query(&version("6.20.0"), &scope, MetadataKind::TextSearchParser);
        assert!(sql.contains("JOIN pg_namespace n ON o.prsnamespace = n.oid"), "{sql}");
        let sql = metadata_query(&version("6.20.0"), &scope, MetadataKind::TextSearchTemplate);
        assert!(sql.contains("FROM pg_ts_template o"), "{sql}");
    }

    #[test]
    fn index_comments_are_keyed_by_pg_index() {
        let sql = metadata_query(&version("6.20.0"), &Scope::default(), MetadataKind::Index);
        assert!(sql.starts_with("SELECT 'pg_index'::regclass::oid AS classid,\n\to.indexrelid AS oid"));
        assert!(sql.contains("d.classoid = 'pg_class'::regclass"));
        assert!(sql.ends_with("WHERE o.indexrelid >= 16384"));
    }

    #[test]
    fn quoted_grantees_map_to_role_names() {
        let acl = parse_privilege("", Some("\"Test Role\"=r/testrole"), &roles()).unwrap();
        assert_eq!(acl.grantee, "\"Test Role\"");
        let acl = parse_privilege("", Some("=U/testrole"), &roles()).unwrap();
        assert_eq!(acl.grantee, "");
        assert_eq!(parse_privilege("", None, &roles()), None);
        assert_eq!(parse_privilege("Empty", None, &roles()).unwrap().kind, AclKind::Empty);
    }

    #[test]
    fn rows_group_by_object() {
        let id = UniqueId::new(class::PG_CLASS, 1);
        let row = |privileges: &str| MetadataRow {
            id,
            owner: "testrole".into(),
            comment: "a table".into(),
            privileges: Some(privileges.into()),
            ..MetadataRow::default()
        };
        let other = MetadataRow {
            id: UniqueId::new(class::PG_CLASS, 2),
            owner: "testrole".into(),
            ..MetadataRow::default()
        };
        let map = build_metadata_map(
            vec![row("testrole=arwdDxt/testrole"), row("=r/testrole"), other],
            &roles(),
        );

        let table = &map[&id];
        assert_eq!(table.comment, "a table");
        assert_eq!(
            table.privileges.iter().map(|a| a.grantee.as_str()).collect::<Vec<_>>(),
            ["", "testrole"]
        );
        assert!(map[&UniqueId::new(class::PG_CLASS, 2)].privileges.is_empty());
    }
}
