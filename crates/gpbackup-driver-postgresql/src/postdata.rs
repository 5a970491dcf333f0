use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{
    catalog::{Constraint, ConstraintKind, EventTrigger, Index, Rule, Trigger, TriggerEnabled},
    driver::Scope,
    filter::extension_filter_clause,
    version::DbVersion,
    Result,
};
use std::collections::HashSet;

pub(crate) fn constraints_query(version: &DbVersion, scope: &Scope) -> String {
    let (partition_parent, inherited) = if version.at_least("7") {
        ("c.relkind = 'p'", "\nAND con.conislocal")
    } else {
        (
            "c.oid IN (SELECT parrelid FROM pg_partition)",
            "\nAND c.oid NOT IN (SELECT parchildrelid FROM pg_partition_rule)",
        )
    };
    format!(
        "SELECT con.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(con.conname) AS name,
	con.contype::text AS contype,
	pg_get_constraintdef(con.oid, TRUE) AS def,
	quote_ident(n.nspname) || '.' || quote_ident(c.relname) AS owningobject,
	{partition_parent} AS ispartitionparent
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE {}{inherited}
AND con.contype IN ('c', 'f', 'p', 'u', 'x')
AND {}
ORDER BY con.conname",
        scope.relation_clause(),
        extension_filter_clause("c"),
    )
}

pub(crate) async fn constraints(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Constraint>> {
    db.query(&constraints_query(&db.version, scope))
        .await?
        .iter()
        .map(|row| {
            Ok(Constraint {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                kind: ConstraintKind::from_code(&row.text("contype")?),
                def: row.text("def")?,
                owning_object: row.text("owningobject")?,
                is_partition_parent: row.flag("ispartitionparent")?,
            })
        })
        .collect()
}

pub(crate) fn indexes_query(version: &DbVersion, scope: &Scope) -> String {
    let (ready, replident, constraint_join, constraint_filter, partitions) = if version.at_least("7") {
        (
            "\nAND i.indisready",
            "i.indisreplident",
            "\nLEFT JOIN pg_constraint con ON i.indexrelid = con.conindid",
            "\nAND con.conindid IS NULL",
            // Indexes of attached partitions are recreated by the parent's index.
            "\nAND i.indexrelid NOT IN (SELECT inhrelid FROM pg_inherits)",
        )
    } else if version.at_least("6") {
        (
            "\nAND i.indisready",
            "i.indisreplident",
            "\nLEFT JOIN pg_constraint con ON i.indexrelid = con.conindid",
            "\nAND con.conindid IS NULL",
            "\nAND n.nspname || '.' || c.relname NOT IN (SELECT partitionschemaname || '.' || partitiontablename FROM pg_partitions)",
        )
    } else {
        (
            "",
            "false",
            "",
            "",
            "\nAND n.nspname || '.' || c.relname NOT IN (SELECT partitionschemaname || '.' || partitiontablename FROM pg_partitions)",
        )
    };
    format!(
        "SELECT DISTINCT i.indexrelid AS oid,
	quote_ident(ic.relname) AS name,
	quote_ident(n.nspname) AS owningschema,
	quote_ident(c.relname) AS owningtable,
	coalesce(quote_ident(s.spcname), '') AS tablespace,
	pg_get_indexdef(i.indexrelid) AS def,
	i.indisclustered AS isclustered,
	{replident} AS supportsreplicaidentity
FROM pg_index i
JOIN pg_class ic ON ic.oid = i.indexrelid
JOIN pg_namespace n ON ic.relnamespace = n.oid
JOIN pg_class c ON c.oid = i.indrelid
LEFT JOIN pg_tablespace s ON ic.reltablespace = s.oid{constraint_join}
WHERE {}
AND i.indisvalid{ready}
AND i.indisprimary = 'f'{partitions}{constraint_filter}
AND {}
ORDER BY name",
        scope.relation_clause(),
        extension_filter_clause("c"),
    )
}

/// Names of the indexes created implicitly by unique constraints, as
/// `schema.index`. Before 6 there is no `conindid` to join on.
const IMPLICIT_INDEX_NAMES_QUERY: &str = "SELECT DISTINCT
	n.nspname || '.' || t.relname || '_' || a.attname || '_key' AS name
FROM pg_constraint c
JOIN pg_class t ON c.conrelid = t.oid
JOIN pg_namespace n ON t.relnamespace = n.oid
JOIN pg_attribute a ON c.conrelid = a.attrelid
JOIN pg_index i ON i.indrelid = c.conrelid
WHERE a.attnum > 0
AND i.indisunique = 't'
AND i.indisprimary = 'f'";

pub(crate) async fn indexes(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Index>> {
    let implicit: HashSet<String> = if db.version.before("6") {
        db.query(IMPLICIT_INDEX_NAMES_QUERY)
            .await?
            .iter()
            .map(|row| row.text("name"))
            .collect::<Result<_>>()?
    } else {
        HashSet::new()
    };

    let mut indexes = vec![];
    for row in db.query(&indexes_query(&db.version, scope)).await? {
        let index = Index {
            oid: row.oid("oid")?,
            name: row.text("name")?,
            owning_schema: row.text("owningschema")?,
            owning_table: row.text("owningtable")?,
            tablespace: row.text("tablespace")?,
            def: row.text("def")?,
            is_clustered: row.flag("isclustered")?,
            supports_replica_identity: row.flag("supportsreplicaidentity")?,
        };
        if implicit.contains(&index.fqn()) {
            continue;
        }
        indexes.push(index);
    }
    Ok(indexes)
}

pub(crate) fn rules_query(scope: &Scope) -> String {
    format!(
        "SELECT r.oid,
	quote_ident(r.rulename) AS name,
	quote_ident(n.nspname) AS owningschema,
	quote_ident(c.relname) AS owningtable,
	pg_get_ruledef(r.oid) AS def
FROM pg_rewrite r
JOIN pg_class c ON c.oid = r.ev_class
JOIN pg_namespace n ON c.relnamespace = n.oid
WHERE {}
AND rulename NOT LIKE '%RETURN'
AND rulename NOT LIKE 'pg_%'
AND {}
ORDER BY rulename",
        scope.relation_clause(),
        extension_filter_clause("c"),
    )
}

pub(crate) async fn rules(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Rule>> {
    db.query(&rules_query(scope))
        .await?
        .iter()
        .map(|row| {
            Ok(Rule {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                owning_schema: row.text("owningschema")?,
                owning_table: row.text("owningtable")?,
                def: row.text("def")?,
            })
        })
        .collect()
}

pub(crate) fn triggers_query(version: &DbVersion, scope: &Scope) -> String {
    let user_defined = if version.before("6") {
        "tgisconstraint = 'f'"
    } else {
        "NOT tgisinternal"
    };
    format!(
        "SELECT t.oid,
	quote_ident(t.tgname) AS name,
	quote_ident(n.nspname) AS owningschema,
	quote_ident(c.relname) AS owningtable,
	pg_get_triggerdef(t.oid) AS def
FROM pg_trigger t
JOIN pg_class c ON c.oid = t.tgrelid
JOIN pg_namespace n ON c.relnamespace = n.oid
WHERE {}
AND tgname NOT LIKE 'pg_%'
AND {user_defined}
AND {}
ORDER BY tgname",
        scope.relation_clause(),
        extension_filter_clause("c"),
    )
}

pub(crate) async fn triggers(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Trigger>> {
    db.query(&triggers_query(&db.version, scope))
        .await?
        .iter()
        .map(|row| {
            Ok(Trigger {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                owning_schema: row.text("owningschema")?,
                owning_table: row.text("owningtable")?,
                def: row.text("def")?,
            })
        })
        .collect()
}

pub(crate) async fn event_triggers(db: &PostgreSQL, _scope: &Scope) -> Result<Vec<EventTrigger>> {
    if db.version.before("6") {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT et.oid,
	quote_ident(et.evtname) AS name,
	et.evtevent AS event,
	coalesce(array_to_string(array(select quote_literal(x) from unnest(evttags) as t(x)), ', '), '') AS eventtags,
	et.evtfoid::regproc::text AS functionname,
	et.evtenabled::text AS enabled
FROM pg_event_trigger et
WHERE {}
ORDER BY name",
        extension_filter_clause("et"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(EventTrigger {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                event: row.text("event")?,
                function_name: row.text("functionname")?,
                enabled: TriggerEnabled::from_code(&row.text("enabled")?),
                event_tags: row.text("eventtags")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(release: &str) -> DbVersion {
        DbVersion::from_release(release).unwrap()
    }

    #[test]
    fn constraint_backed_indexes_skipped_from_6() {
        let v6 = indexes_query(&version("6.20.0"), &Scope::default());
        assert!(v6.contains("AND con.conindid IS NULL"));
        assert!(v6.contains("i.indisreplident AS supportsreplicaidentity"));

        let v5 = indexes_query(&version("5.28.0"), &Scope::default());
        assert!(!v5.contains("conindid"));
        assert!(v5.contains("pg_partitions"));
    }

    #[test]
    fn partition_child_indexes_skipped_on_7() {
        let v7 = indexes_query(&version("7.0.0"), &Scope::default());
        assert!(v7.contains("NOT IN (SELECT inhrelid FROM pg_inherits)"));
        assert!(!v7.contains("pg_partitions"));
    }

    #[test]
    fn builtin_rules_and_triggers_excluded() {
        let rules = rules_query(&Scope::default());
        assert!(rules.contains("rulename NOT LIKE '%RETURN'"));
        assert!(rules.contains("rulename NOT LIKE 'pg_%'"));

        assert!(triggers_query(&version("5.28.0"), &Scope::default()).contains("tgisconstraint = 'f'"));
        assert!(triggers_query(&version("6.20.0"), &Scope::default()).contains("NOT tgisinternal"));
    }

    #[test]
    fn inherited_constraints_skipped() {
        let v7 = constraints_query(&version("7.0.0"), &Scope::default());
        assert!(v7.contains("AND con.conislocal"));
        assert!(v7.contains("c.relkind = 'p' AS ispartitionparent"));

        let v6 = constraints_query(&version("6.20.0"), &Scope::default());
        assert!(v6.contains("NOT IN (SELECT parchildrelid FROM pg_partition_rule)"));
    }
}
