use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{
    catalog::{
        Attribute, BaseType, Collation, CompositeType, DomainConstraint, DomainType, EnumType,
        RangeType, Type, TypeKind,
    },
    driver::Scope,
    filter::extension_filter_clause,
    version::DbVersion,
    Result,
};
use std::collections::HashMap;
use tokio_postgres::Row;

/// Shared `FROM`/`WHERE` for every type query: user schemas, no extension
/// members, no array types.
fn type_filter(scope: &Scope, typtype: &str) -> String {
    format!(
        "FROM pg_type t
JOIN pg_namespace n ON t.typnamespace = n.oid
WHERE {}
AND {}
AND t.typtype = '{typtype}'
AND NOT EXISTS (SELECT 1 FROM pg_type el WHERE el.typarray = t.oid)",
        scope.schema_clause("n"),
        extension_filter_clause("t"),
    )
}

fn collation_name(version: &DbVersion, collation: &str, default: &str) -> String {
    if version.before("6") {
        return "''".to_string();
    }
    format!(
        "CASE WHEN {collation} <> 0 AND {collation} <> {default} THEN (SELECT quote_ident(cn.nspname) || '.' || quote_ident(coll.collname) FROM pg_collation coll JOIN pg_namespace cn ON coll.collnamespace = cn.oid WHERE coll.oid = {collation}) ELSE '' END"
    )
}

pub(crate) fn base_types_query(version: &DbVersion, scope: &Scope) -> String {
    let collatable = if version.at_least("6") {
        "t.typcollation <> 0"
    } else {
        "false"
    };
    let procedure = |column: &str| {
        format!("CASE WHEN t.{column}::oid = 0 THEN '' ELSE t.{column}::regproc::text END AS {column}")
    };
    let filter = type_filter(scope, "b").replacen(
        "FROM pg_type t\n",
        "FROM pg_type t\nLEFT JOIN pg_type_encoding e ON t.oid = e.typid\n",
        1,
    );
    format!(
        "SELECT t.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(t.typname) AS name,
	t.typinput::regproc::text AS typinput,
	t.typoutput::regproc::text AS typoutput,
	{},
	{},
	{},
	{},
	t.typlen::int AS typlen,
	t.typbyval,
	t.typalign::text AS typalign,
	t.typstorage::text AS typstorage,
	coalesce(t.typdefault, '') AS typdefault,
	CASE WHEN t.typelem <> 0 THEN pg_catalog.format_type(t.typelem, NULL) ELSE '' END AS element,
	t.typdelim::text AS typdelim,
	t.typcategory::text AS typcategory,
	t.typispreferred,
	{collatable} AS collatable,
	coalesce(array_to_string(e.typoptions, ', '), '') AS storageoptions
{filter}
AND t.typisdefined
ORDER BY t.oid",
        procedure("typreceive"),
        procedure("typsend"),
        procedure("typmodin"),
        procedure("typmodout"),
    )
}

fn named(row: &Row, kind: TypeKind) -> Result<Type> {
    Ok(Type {
        oid: row.oid("oid")?,
        schema: row.text("schema")?,
        name: row.text("name")?,
        kind,
        depends_upon: vec![],
    })
}

async fn base_types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    db.query(&base_types_query(&db.version, scope))
        .await?
        .iter()
        .map(|row| {
            let base = BaseType {
                input: row.text("typinput")?,
                output: row.text("typoutput")?,
                receive: row.text("typreceive")?,
                send: row.text("typsend")?,
                mod_in: row.text("typmodin")?,
                mod_out: row.text("typmodout")?,
                internal_length: row.int("typlen")?,
                passed_by_value: row.flag("typbyval")?,
                alignment: row.text("typalign")?,
                storage: row.text("typstorage")?,
                default: row.text("typdefault")?,
                element: row.text("element")?,
                delimiter: row.text("typdelim")?,
                category: row.text("typcategory")?,
                preferred: row.flag("typispreferred")?,
                collatable: row.flag("collatable")?,
                storage_options: row.text("storageoptions")?,
            };
            named(row, TypeKind::Base(base))
        })
        .collect()
}

async fn shell_types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    let sql = format!(
        "SELECT t.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(t.typname) AS name
{}
AND NOT t.typisdefined
ORDER BY t.oid",
        type_filter(scope, "p")
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| named(row, TypeKind::Shell))
        .collect()
}

pub(crate) fn composite_attributes_query(version: &DbVersion) -> String {
    format!(
        "SELECT t.oid AS typeoid,
	quote_ident(a.attname) AS name,
	pg_catalog.format_type(a.atttypid, a.atttypmod) AS type,
	{} AS collation,
	coalesce(d.description, '') AS comment
FROM pg_type t
JOIN pg_attribute a ON t.typrelid = a.attrelid
LEFT JOIN pg_type at ON a.atttypid = at.oid
LEFT JOIN pg_description d ON (d.objoid = a.attrelid AND d.classoid = 'pg_class'::regclass AND d.objsubid = a.attnum)
WHERE t.typtype = 'c'
AND a.attnum > 0
AND NOT a.attisdropped
ORDER BY t.oid, a.attnum",
        collation_name(version, "a.attcollation", "at.typcollation")
    )
}

async fn composite_types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    let mut attributes: HashMap<u32, Vec<Attribute>> = HashMap::new();
    for row in db.query(&composite_attributes_query(&db.version)).await? {
        attributes
            .entry(row.oid("typeoid")?)
            .or_default()
            .push(Attribute {
                name: row.text("name")?,
                ty: row.text("type")?,
                collation: row.text("collation")?,
                comment: row.text("comment")?,
            });
    }

    let sql = format!(
        "SELECT t.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(t.typname) AS name
{}
AND (SELECT c.relkind FROM pg_class c WHERE c.oid = t.typrelid) = 'c'
ORDER BY t.oid",
        type_filter(scope, "c")
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let attributes = attributes.remove(&row.oid("oid")?).unwrap_or_default();
            named(row, TypeKind::Composite(CompositeType { attributes }))
        })
        .collect()
}

async fn enum_types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    let order = if db.version.at_least("6") {
        "e.enumsortorder"
    } else {
        "e.oid"
    };
    let sql = format!(
        "SELECT t.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(t.typname) AS name,
	array_to_string(ARRAY(SELECT quote_literal(e.enumlabel) FROM pg_enum e WHERE e.enumtypid = t.oid ORDER BY {order}), E',\\n\\t') AS labels
{}
ORDER BY t.oid",
        type_filter(scope, "e")
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let labels = row.text("labels")?;
            named(row, TypeKind::Enum(EnumType { labels }))
        })
        .collect()
}

async fn domain_types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    let constraints_sql = "SELECT contypid,
	quote_ident(conname) AS name,
	pg_get_constraintdef(oid, TRUE) AS def
FROM pg_constraint
WHERE contypid <> 0
ORDER BY conname";
    let mut constraints: HashMap<u32, Vec<DomainConstraint>> = HashMap::new();
    for row in db.query(constraints_sql).await? {
        constraints
            .entry(row.oid("contypid")?)
            .or_default()
            .push(DomainConstraint {
                name: row.text("name")?,
                def: row.text("def")?,
            });
    }

    let sql = format!(
        "SELECT t.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(t.typname) AS name,
	pg_catalog.format_type(t.typbasetype, t.typtypmod) AS basetype,
	coalesce(t.typdefault, '') AS typdefault,
	{} AS collation,
	t.typnotnull
{}
ORDER BY t.oid",
        if db.version.at_least("6") {
            collation_name(
                &db.version,
                "t.typcollation",
                "(SELECT bt.typcollation FROM pg_type bt WHERE bt.oid = t.typbasetype)",
            )
        } else {
            "''".to_string()
        },
        type_filter(scope, "d")
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let domain = DomainType {
                base_type: row.text("basetype")?,
                default: row.text("typdefault")?,
                collation: row.text("collation")?,
                not_null: row.flag("typnotnull")?,
                constraints: constraints.remove(&row.oid("oid")?).unwrap_or_default(),
            };
            named(row, TypeKind::Domain(domain))
        })
        .collect()
}

async fn range_types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT t.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(t.typname) AS name,
	pg_catalog.format_type(r.rngsubtype, NULL) AS subtype,
	CASE WHEN opc.opcdefault THEN '' ELSE quote_ident(opn.nspname) || '.' || quote_ident(opc.opcname) END AS opclass,
	{} AS collation,
	CASE WHEN r.rngcanonical::oid = 0 THEN '' ELSE r.rngcanonical::regproc::text END AS canonical,
	CASE WHEN r.rngsubdiff::oid = 0 THEN '' ELSE r.rngsubdiff::regproc::text END AS subdiff
FROM pg_range r
JOIN pg_type st ON r.rngsubtype = st.oid
JOIN pg_opclass opc ON r.rngsubopc = opc.oid
JOIN pg_namespace opn ON opc.opcnamespace = opn.oid
{}
AND r.rngtypid = t.oid
ORDER BY t.oid",
        collation_name(&db.version, "r.rngcollation", "st.typcollation"),
        type_filter(scope, "r").replacen("FROM pg_type t\n", "CROSS JOIN pg_type t\n", 1)
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let range = RangeType {
                subtype: row.text("subtype")?,
                subtype_opclass: row.text("opclass")?,
                collation: row.text("collation")?,
                canonical: row.text("canonical")?,
                subtype_diff: row.text("subdiff")?,
            };
            named(row, TypeKind::Range(range))
        })
        .collect()
}

pub(crate) async fn types(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Type>> {
    let mut types = base_types(db, scope).await?;
    types.extend(shell_types(db, scope).await?);
    types.extend(composite_types(db, scope).await?);
    types.extend(enum_types(db, scope).await?);
    types.extend(domain_types(db, scope).await?);
    types.extend(range_types(db, scope).await?);
    types.sort_by_key(|ty| ty.oid);
    Ok(types)
}

pub(crate) async fn collations(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Collation>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let provider = if db.version.at_least("7") {
        "c.collprovider::text AS provider, c.collisdeterministic AS deterministic"
    } else {
        "'' AS provider, NULL::boolean AS deterministic"
    };
    let sql = format!(
        "SELECT c.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.collname) AS name,
	c.collcollate::text AS collate,
	c.collctype::text AS ctype,
	{provider}
FROM pg_collation c
JOIN pg_namespace n ON c.collnamespace = n.oid
WHERE {}
AND {}
ORDER BY c.oid",
        scope.schema_clause("n"),
        extension_filter_clause("c"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(Collation {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                collate: row.text("collate")?,
                ctype: row.text("ctype")?,
                provider: row.text("provider")?,
                is_deterministic: row.get_as("deterministic")?,
            })
        })
        .collect()
}
