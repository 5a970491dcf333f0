use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{driver::Scope, version::DbVersion, Result};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Predicate selecting append-optimized tables aliased `c`.
fn ao_storage_clause(version: &DbVersion) -> &'static str {
    if version.at_least("7") {
        "c.relam IN (SELECT oid FROM pg_am WHERE amname IN ('ao_row', 'ao_column'))"
    } else {
        "c.relstorage IN ('ao', 'co')"
    }
}

pub(crate) fn ao_segment_tables_query(version: &DbVersion, scope: &Scope) -> String {
    format!(
        "SELECT quote_ident(n.nspname) || '.' || quote_ident(c.relname) AS aotablefqn,
	'pg_aoseg.' || quote_ident(seg.relname) AS aosegtablefqn
FROM pg_class c
JOIN pg_namespace n ON c.relnamespace = n.oid
JOIN pg_appendonly ao ON ao.relid = c.oid
JOIN pg_class seg ON seg.oid = ao.segrelid
WHERE {}
AND {}
ORDER BY c.oid",
        ao_storage_clause(version),
        scope.relation_clause(),
    )
}

pub(crate) fn last_ddl_query(version: &DbVersion, scope: &Scope) -> String {
    format!(
        "SELECT quote_ident(n.nspname) || '.' || quote_ident(c.relname) AS aotablefqn,
	max(lo.statime)::text AS lastddltimestamp
FROM pg_class c
JOIN pg_namespace n ON c.relnamespace = n.oid
JOIN pg_stat_last_operation lo ON lo.objid = c.oid
WHERE {}
AND {}
AND lo.staactionname IN ('CREATE', 'ALTER', 'TRUNCATE')
GROUP BY n.nspname, c.relname",
        ao_storage_clause(version),
        scope.relation_clause(),
    )
}

pub(crate) async fn ao_mod_counts(db: &PostgreSQL, scope: &Scope) -> Result<IndexMap<String, i64>> {
    let mut counts = IndexMap::new();
    for row in db.query(&ao_segment_tables_query(&db.version, scope)).await? {
        let table = row.text("aotablefqn")?;
        let segments = row.text("aosegtablefqn")?;
        let sql = format!("SELECT coalesce(sum(modcount), 0)::bigint AS modcount FROM {segments}");
        let modcount: i64 = db.query_one(&sql, &segments).await?.get_as("modcount")?;
        counts.insert(table, modcount);
    }
    Ok(counts)
}

pub(crate) async fn ao_last_ddl(db: &PostgreSQL, scope: &Scope) -> Result<HashMap<String, String>> {
    db.query(&last_ddl_query(&db.version, scope))
        .await?
        .iter()
        .map(|row| Ok((row.text("aotablefqn")?, row.text("lastddltimestamp")?)))
        .collect()
}
