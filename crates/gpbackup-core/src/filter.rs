//! Include and exclude filters on schemas and relations.

use crate::{catalog::PartitionLevel, Error, Result};
use regex::Regex;
use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

/// Schemas that never hold user objects.
const SYSTEM_SCHEMAS: &[&str] = &[
    "gp_toolkit",
    "information_schema",
    "pg_aoseg",
    "pg_bitmapindex",
    "pg_catalog",
];

/// The object filters of one backup, as given by the user.
///
/// Relation entries are `schema.table` with each part either a plain name or
/// a double-quoted identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub include_relations: Vec<String>,
    pub exclude_relations: Vec<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.include_schemas.is_empty()
            && self.exclude_schemas.is_empty()
            && self.include_relations.is_empty()
            && self.exclude_relations.is_empty()
    }

    /// An include filter restricts the backup to a subset of the database,
    /// which also drops the cluster-wide objects from the global section.
    pub fn has_include(&self) -> bool {
        !self.include_schemas.is_empty() || !self.include_relations.is_empty()
    }

    /// Checks the shape of every relation named in a filter.
    pub fn validate_shape(&self) -> Result<()> {
        validate_fqns(&self.include_relations)?;
        validate_fqns(&self.exclude_relations)
    }

    /// Whether objects in `schema` (an unquoted name) are part of the backup.
    pub fn includes_schema(&self, schema: &str) -> bool {
        if !self.include_schemas.is_empty() {
            return self.include_schemas.iter().any(|s| s == schema);
        }
        !self.exclude_schemas.iter().any(|s| s == schema)
    }

    /// SQL predicate restricting the namespace aliased `alias` to the
    /// schemas this backup covers.
    pub fn schema_filter_clause(&self, alias: &str) -> String {
        let mut clause = format!(
            "{alias}.nspname NOT LIKE 'pg_temp_%' AND {alias}.nspname NOT LIKE 'pg_toast%' AND {alias}.nspname NOT IN ({})",
            quoted_list(SYSTEM_SCHEMAS.iter().copied())
        );
        if !self.include_schemas.is_empty() {
            clause.push_str(&format!(
                "\nAND {alias}.nspname IN ({})",
                quoted_list(self.include_schemas.iter().map(String::as_str))
            ));
        }
        if !self.exclude_schemas.is_empty() {
            clause.push_str(&format!(
                "\nAND {alias}.nspname NOT IN ({})",
                quoted_list(self.exclude_schemas.iter().map(String::as_str))
            ));
        }
        clause
    }
}

/// SQL predicate excluding objects that belong to an extension.
pub fn extension_filter_clause(alias: &str) -> String {
    let column = if alias.is_empty() {
        "oid".to_string()
    } else {
        format!("{alias}.oid")
    };
    format!("{column} NOT IN (select objid from pg_depend where deptype = 'e')")
}

/// SQL predicate restricting relations aliased `c` to resolved oids.
pub fn relation_filter_clause(include: &[u32], exclude: &[u32]) -> String {
    let join = |oids: &[u32]| {
        oids.iter()
            .map(|oid| oid.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    let mut clause = String::new();
    if !exclude.is_empty() {
        clause.push_str(&format!("\nAND c.oid NOT IN ({})", join(exclude)));
    }
    if !include.is_empty() {
        clause.push_str(&format!("\nAND c.oid IN ({})", join(include)));
    }
    clause
}

fn quoted_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .map(|item| format!("'{}'", item.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",")
}

static FQN: LazyLock<Regex> = LazyLock::new(|| {
    let segment = r#"(?:[^."]+|"(?:[^"]|"")+")"#;
    Regex::new(&format!(r"^({segment})\.({segment})$")).expect("valid regex")
});

/// Checks that every entry has the shape `schema.table`.
pub fn validate_fqns(fqns: &[String]) -> Result<()> {
    for fqn in fqns {
        if !FQN.is_match(fqn) {
            return Err(Error::filter_validation(format!(
                "Table \"{fqn}\" is not correctly fully-qualified.  Please ensure table is in the format \"schema.table\"."
            )));
        }
    }
    Ok(())
}

/// Splits `schema.table` into its unquoted parts.
pub fn split_fqn(fqn: &str) -> Result<(String, String)> {
    let Some(captures) = FQN.captures(fqn) else {
        return Err(Error::filter_validation(format!(
            "Table \"{fqn}\" is not correctly fully-qualified.  Please ensure table is in the format \"schema.table\"."
        )));
    };
    Ok((unquote(&captures[1]), unquote(&captures[2])))
}

fn unquote(segment: &str) -> String {
    match segment
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => segment.to_string(),
    }
}

/// Checks filtered schemas against the schemas that exist.
///
/// A missing included schema is an error; a missing excluded one only
/// warrants a warning.
pub fn validate_schemas(filters: &Filters, existing: &HashSet<String>) -> Result<()> {
    for schema in &filters.exclude_schemas {
        if !existing.contains(schema) {
            tracing::warn!(schema = %schema, "Excluded schema {schema} does not exist");
        }
    }
    for schema in &filters.include_schemas {
        if !existing.contains(schema) {
            return Err(Error::filter_validation(format!("Schema {schema} does not exist")));
        }
    }
    Ok(())
}

/// Reports included schemas that hold no backed up object.
///
/// This is only a warning unless `strict` is set.
pub fn check_empty_schemas(
    filters: &Filters,
    object_counts: &HashMap<String, usize>,
    strict: bool,
) -> Result<()> {
    for schema in &filters.include_schemas {
        if object_counts.get(schema).copied().unwrap_or(0) > 0 {
            continue;
        }
        if strict {
            return Err(Error::filter_validation(format!(
                "Included schema {schema} does not contain any objects"
            )));
        }
        tracing::warn!(schema = %schema, "Included schema {schema} does not contain any objects");
    }
    Ok(())
}

/// A relation named in a filter, as found in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredRelation {
    /// The name as written in the filter.
    pub fqn: String,
    pub oid: u32,
    pub partition_level: PartitionLevel,
    /// A materialized view created by an extension.
    pub is_extension_matview: bool,
}

/// Checks filtered relations against what the catalog holds and returns
/// the oids of the included and excluded relations that exist.
pub fn validate_relations(
    filters: &Filters,
    found: &[FilteredRelation],
) -> Result<(Vec<u32>, Vec<u32>)> {
    let by_name: HashMap<&str, &FilteredRelation> =
        found.iter().map(|rel| (rel.fqn.as_str(), rel)).collect();

    let mut include = vec![];
    for fqn in &filters.include_relations {
        let Some(rel) = by_name.get(fqn.as_str()) else {
            return Err(Error::filter_validation(format!("Table {fqn} does not exist")));
        };
        reject_unfilterable(rel)?;
        include.push(rel.oid);
    }

    let mut exclude = vec![];
    for fqn in &filters.exclude_relations {
        match by_name.get(fqn.as_str()) {
            Some(rel) => {
                reject_unfilterable(rel)?;
                exclude.push(rel.oid);
            }
            None => tracing::warn!(table = %fqn, "Excluded table {fqn} does not exist"),
        }
    }

    Ok((include, exclude))
}

fn reject_unfilterable(rel: &FilteredRelation) -> Result<()> {
    if rel.partition_level == PartitionLevel::Intermediate {
        return Err(Error::filter_validation(format!(
            "Cannot filter on {}, as it is an intermediate partition table.  Only parent partition tables and leaf partition tables may be specified.",
            rel.fqn
        )));
    }
    if rel.is_extension_matview {
        return Err(Error::filter_validation(format!(
            "Cannot filter on {}, as it is a materialized view owned by an extension.",
            rel.fqn
        )));
    }
    Ok(())
}

/// One parent-to-child link of a partition hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLink {
    pub parent_oid: u32,
    pub child_oid: u32,
    pub is_external: bool,
}

/// Adds the partitions below each included relation.
///
/// With `leaf_partition_data` every descendant is included. Without it only
/// external leaves are added, so their DDL is still dumped while the parent
/// carries the data.
pub fn expand_partitions(
    included: &[u32],
    links: &[PartitionLink],
    leaf_partition_data: bool,
) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<&PartitionLink>> = HashMap::new();
    for link in links {
        children.entry(link.parent_oid).or_default().push(link);
    }

    let mut seen: HashSet<u32> = included.iter().copied().collect();
    let mut expanded = included.to_vec();
    let mut stack: Vec<u32> = included.iter().rev().copied().collect();

    while let Some(oid) = stack.pop() {
        let Some(links) = children.get(&oid) else {
            continue;
        };
        for link in links.iter().rev() {
            stack.push(link.child_oid);
        }
        for link in links {
            if (leaf_partition_data || link.is_external) && seen.insert(link.child_oid) {
                expanded.push(link.child_oid);
            }
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqn_shapes() {
        let ok = [
            "public.foo",
            r#""My Schema"."My Table""#,
            r#"public."has.dot""#,
            r#""quo""te".t"#,
        ];
        for fqn in ok {
            assert!(validate_fqns(&[fqn.to_string()]).is_ok(), "{fqn}");
        }

        let bad = ["foo", "a.b.c", ".foo", r#""unterminated.t"#, "public."];
        for fqn in bad {
            let err = validate_fqns(&[fqn.to_string()]).unwrap_err();
            assert!(err.is_filter_validation(), "{fqn}");
        }
    }

    #[test]
    fn split_unquotes() {
        assert_eq!(
            split_fqn(r#""quo""te"."a.b""#).unwrap(),
            (r#"quo"te"#.to_string(), "a.b".to_string())
        );
    }

    #[test]
    fn schema_clause() {
        let filters = Filters {
            include_schemas: vec!["sales".into(), "o'brien".into()],
            ..Filters::default()
        };
        let clause = filters.schema_filter_clause("n");
        assert!(clause.ends_with("\nAND n.nspname IN ('sales','o''brien')"));
        assert!(clause.starts_with("n.nspname NOT LIKE 'pg_temp_%'"));
    }

    #[test]
    fn extension_clause() {
        assert_eq!(
            extension_filter_clause("p"),
            "p.oid NOT IN (select objid from pg_depend where deptype = 'e')"
        );
        assert_eq!(
            extension_filter_clause(""),
            "oid NOT IN (select objid from pg_depend where deptype = 'e')"
        );
    }

    #[test]
    fn includes_take_precedence() {
        let filters = Filters {
            include_schemas: vec!["a".into()],
            exclude_schemas: vec!["a".into()],
            ..Filters::default()
        };
        assert!(filters.includes_schema("a"));
        assert!(!filters.includes_schema("b"));
    }

    #[test]
    fn missing_schemas() {
        let existing: HashSet<String> = ["public".to_string()].into();
        let filters = Filters {
            exclude_schemas: vec!["gone".into()],
            ..Filters::default()
        };
        assert!(validate_schemas(&filters, &existing).is_ok());

        let filters = Filters {
            include_schemas: vec!["gone".into()],
            ..Filters::default()
        };
        let err = validate_schemas(&filters, &existing).unwrap_err();
        assert_eq!(err.to_string(), "Schema gone does not exist");
    }

    #[test]
    fn empty_schema_is_strict_error() {
        let filters = Filters {
            include_schemas: vec!["empty".into()],
            ..Filters::default()
        };
        let counts = HashMap::new();
        assert!(check_empty_schemas(&filters, &counts, false).is_ok());
        assert!(check_empty_schemas(&filters, &counts, true)
            .unwrap_err()
            .is_filter_validation());
    }

    #[test]
    fn intermediate_partitions_rejected() {
        let filters = Filters {
            include_relations: vec!["public.mid".into()],
            ..Filters::default()
        };
        let found = [FilteredRelation {
            fqn: "public.mid".into(),
            oid: 5,
            partition_level: PartitionLevel::Intermediate,
            is_extension_matview: false,
        }];
        let err = validate_relations(&filters, &found).unwrap_err();
        assert!(err.to_string().contains("intermediate partition table"));
    }

    #[test]
    fn expansion() {
        let links = [
            PartitionLink { parent_oid: 1, child_oid: 2, is_external: false },
            PartitionLink { parent_oid: 2, child_oid: 3, is_external: false },
            PartitionLink { parent_oid: 2, child_oid: 4, is_external: true },
            PartitionLink { parent_oid: 9, child_oid: 10, is_external: false },
        ];
        assert_eq!(expand_partitions(&[1], &links, true), [1, 2, 3, 4]);
        assert_eq!(expand_partitions(&[1], &links, false), [1, 4]);
        assert_eq!(expand_partitions(&[7], &links, true), [7]);
    }
}
