use crate::{
    query::{oid_list, RowExt},
    PostgreSQL,
};
use gpbackup_core::{
    catalog::{AttributeStatistic, TupleStatistic},
    version::DbVersion,
    Result,
};

pub(crate) fn tuple_statistics_query(oids: &[u32]) -> String {
    format!(
        "SELECT c.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.relname) AS name,
	c.relpages,
	c.reltuples
FROM pg_class c
JOIN pg_namespace n ON c.relnamespace = n.oid
WHERE c.oid IN ({})
ORDER BY n.nspname, c.relname",
        oid_list(oids)
    )
}

pub(crate) async fn tuple_statistics(db: &PostgreSQL, oids: &[u32]) -> Result<Vec<TupleStatistic>> {
    if oids.is_empty() {
        return Ok(vec![]);
    }
    db.query(&tuple_statistics_query(oids))
        .await?
        .iter()
        .map(|row| {
            Ok(TupleStatistic {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                table: row.text("name")?,
                rel_pages: row.int("relpages")?,
                rel_tuples: row.get_as("reltuples")?,
            })
        })
        .collect()
}

fn slots(prefix: &str, render: impl Fn(&str) -> String) -> String {
    (1..=5)
        .map(|i| render(&format!("{prefix}{i}")))
        .collect::<Vec<_>>()
        .join(",\n\t")
}

pub(crate) fn attribute_statistics_query(version: &DbVersion, oids: &[u32]) -> String {
    let inherit = if version.at_least("6") { "s.stainherit" } else { "false" };
    let collations = if version.at_least("7") {
        format!(
            ",\n\t{}",
            slots("stacoll", |c| format!("s.{c}"))
        )
    } else {
        String::new()
    };
    format!(
        "SELECT c.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.relname) AS name,
	a.attname::text AS attname,
	quote_ident(tn.nspname) || '.' || quote_ident(t.typname) AS typename,
	s.starelid AS relid,
	s.staattnum AS attnum,
	{inherit} AS inherit,
	s.stanullfrac,
	s.stawidth,
	s.stadistinct,
	{kinds},
	{operators}{collations},
	{numbers},
	{values}
FROM pg_statistic s
JOIN pg_class c ON c.oid = s.starelid
JOIN pg_namespace n ON c.relnamespace = n.oid
JOIN pg_attribute a ON a.attrelid = s.starelid AND a.attnum = s.staattnum
JOIN pg_type t ON t.oid = a.atttypid
JOIN pg_namespace tn ON tn.oid = t.typnamespace
WHERE c.oid IN ({oids})
AND NOT a.attisdropped
ORDER BY n.nspname, c.relname, a.attnum",
        kinds = slots("stakind", |c| format!("s.{c}")),
        operators = slots("staop", |c| format!("s.{c}")),
        numbers = slots("stanumbers", |c| format!("coalesce(s.{c}::text, 'NULL') AS {c}")),
        values = slots("stavalues", |c| format!("coalesce(s.{c}::text, 'NULL') AS {c}")),
        oids = oid_list(oids),
    )
}

pub(crate) async fn attribute_statistics(
    db: &PostgreSQL,
    oids: &[u32],
) -> Result<Vec<AttributeStatistic>> {
    if oids.is_empty() {
        return Ok(vec![]);
    }
    let with_collations = db.version.at_least("7");
    let mut statistics = vec![];
    for row in db
        .query(&attribute_statistics_query(&db.version, oids))
        .await?
    {
        let mut kinds = [0i16; 5];
        let mut operators = [0u32; 5];
        let mut collations = vec![];
        let mut numbers: [String; 5] = Default::default();
        let mut values: [String; 5] = Default::default();
        for i in 0..5 {
            let slot = i + 1;
            kinds[i] = row.get_as(&format!("stakind{slot}"))?;
            operators[i] = row.oid(&format!("staop{slot}"))?;
            if with_collations {
                collations.push(row.oid(&format!("stacoll{slot}"))?);
            }
            numbers[i] = row.text(&format!("stanumbers{slot}"))?;
            values[i] = row.text(&format!("stavalues{slot}"))?;
        }
        statistics.push(AttributeStatistic {
            oid: row.oid("oid")?,
            schema: row.text("schema")?,
            table: row.text("name")?,
            attname: row.text("attname")?,
            type_name: row.text("typename")?,
            relid: row.oid("relid")?,
            attnum: row.get_as("attnum")?,
            inherit: row.flag("inherit")?,
            null_fraction: row.get_as("stanullfrac")?,
            width: row.int("stawidth")?,
            distinct: row.get_as("stadistinct")?,
            kinds,
            operators,
            collations,
            numbers,
            values,
        });
    }
    Ok(statistics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(release: &str) -> DbVersion {
        DbVersion::from_release(release).unwrap()
    }

    #[test]
    fn slot_columns() {
        let sql = attribute_statistics_query(&version("6.20.0"), &[5, 6]);
        assert!(sql.contains("s.stakind1,\n\ts.stakind2,\n\ts.stakind3,\n\ts.stakind4,\n\ts.stakind5"));
        assert!(sql.contains("coalesce(s.stavalues5::text, 'NULL') AS stavalues5"));
        assert!(sql.contains("s.stainherit AS inherit"));
        assert!(sql.contains("WHERE c.oid IN (5,6)"));
        assert!(!sql.contains("stacoll"));
    }

    #[test]
    fn collations_on_7() {
        let sql = attribute_statistics_query(&version("7.0.0"), &[5]);
        assert!(sql.contains("s.staop5,\n\ts.stacoll1"));
    }

    #[test]
    fn no_inherit_before_6() {
        let sql = attribute_statistics_query(&version("5.28.0"), &[5]);
        assert!(sql.contains("false AS inherit"));
    }
}
