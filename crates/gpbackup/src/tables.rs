//! Deciding which tables get DDL and which get their rows copied.

use gpbackup_core::{
    catalog::{ext_part_name, ColumnDefinition, PartitionLevel, Table},
    driver::Scope,
    filter::PartitionLink,
    version::DbVersion,
};
use std::collections::{HashMap, HashSet};

/// The tables of one backup, both lists in catalog (oid) order.
#[derive(Debug, Default)]
pub struct TableSplit {
    /// Tables whose DDL goes to the predata section.
    pub metadata: Vec<Table>,
    /// Tables whose rows are copied.
    pub data: Vec<Table>,
}

impl TableSplit {
    /// Unquoted-as-stored FQNs of the data tables.
    pub fn data_fqns(&self) -> Vec<String> {
        self.data.iter().map(Table::fqn).collect()
    }
}

/// Splits the tables returned by the catalog.
///
/// Before 7 an external leaf partition is created as a standalone table
/// under its `_ext_part_` name and exchanged into the hierarchy later, so
/// its name is rewritten here. External and foreign tables never carry
/// data.
pub fn split_tables(tables: Vec<Table>, scope: &Scope, version: &DbVersion) -> TableSplit {
    let gp7 = version.at_least("7");
    let mut split = TableSplit::default();

    if scope.leaf_partition_data || scope.is_table_filtered() {
        let included: HashSet<u32> = scope.include_oids.iter().copied().collect();
        for mut table in tables {
            let external_leaf = is_external_leaf(&table);
            if external_leaf && !gp7 {
                table.relation.name = ext_part_name(&table.relation.name);
            }

            let copies = if scope.leaf_partition_data {
                !is_partitioned(&table)
            } else if gp7 {
                table.attach_partition.is_none()
            } else {
                included.contains(&table.relation.oid)
            };
            if copies && table.has_data() {
                split.data.push(table.clone());
            }

            let has_own_ddl = !matches!(
                table.partition_level,
                PartitionLevel::Leaf | PartitionLevel::Intermediate
            );
            if external_leaf || gp7 || has_own_ddl {
                split.metadata.push(table);
            }
        }
        return split;
    }

    let excluded: HashSet<&str> = scope
        .filters
        .exclude_relations
        .iter()
        .map(String::as_str)
        .collect();
    for mut table in tables {
        if gp7
            && table
                .attach_partition
                .as_ref()
                .is_some_and(|attach| excluded.contains(attach.parent.as_str()))
        {
            continue;
        }
        if !gp7 && is_external_leaf(&table) {
            table.relation.name = ext_part_name(&table.relation.name);
        }
        if table.attach_partition.is_none() && table.has_data() {
            split.data.push(table.clone());
        }
        split.metadata.push(table);
    }
    split
}

fn is_external_leaf(table: &Table) -> bool {
    table.is_external() && table.partition_level == PartitionLevel::Leaf
}

fn is_partitioned(table: &Table) -> bool {
    matches!(
        table.partition_level,
        PartitionLevel::Root | PartitionLevel::Intermediate
    )
}

/// The `(a,b,c)` column list recorded with each data entry, so a restore
/// can name the columns it copies into. Generated columns are left out.
pub fn attribute_string(columns: &[ColumnDefinition]) -> String {
    let names: Vec<&str> = columns
        .iter()
        .filter(|column| !column.is_generated)
        .map(|column| column.name.as_str())
        .collect();
    if names.is_empty() {
        return String::new();
    }
    format!("({})", names.join(","))
}

/// FQN of the partitioned root above each partition, for the roots found
/// in `tables`.
pub fn partition_roots(links: &[PartitionLink], tables: &[Table]) -> HashMap<u32, String> {
    let parents: HashMap<u32, u32> = links
        .iter()
        .map(|link| (link.child_oid, link.parent_oid))
        .collect();
    let roots: HashMap<u32, String> = tables
        .iter()
        .filter(|table| table.partition_level == PartitionLevel::Root)
        .map(|table| (table.relation.oid, table.fqn()))
        .collect();

    parents
        .keys()
        .filter_map(|&child| {
            let mut oid = child;
            for _ in 0..parents.len() {
                match parents.get(&oid) {
                    Some(&parent) => oid = parent,
                    None => break,
                }
            }
            roots.get(&oid).map(|root| (child, root.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::{
        catalog::{AttachPartitionInfo, ExternalTableDefinition, Relation},
        filter::Filters,
    };
    use pretty_assertions::assert_eq;

    fn make_table(oid: u32, name: &str, level: PartitionLevel) -> Table {
        Table {
            relation: Relation::new(oid, "public", name),
            partition_level: level,
            ..Table::default()
        }
    }

    fn external(mut table: Table) -> Table {
        table.external = Some(ExternalTableDefinition::default());
        table.is_external_partition = true;
        table
    }

    fn names(tables: &[Table]) -> Vec<String> {
        tables.iter().map(Table::fqn).collect()
    }

    fn v6() -> DbVersion {
        DbVersion::parse("PostgreSQL 9.4.26 (Greenplum Database 6.20.0 build commit:abc)").unwrap()
    }

    fn v7() -> DbVersion {
        DbVersion::parse("PostgreSQL 12.12 (Greenplum Database 7.0.0 build commit:abc)").unwrap()
    }

    #[test]
    fn external_leaf_keeps_ddl_without_data() {
        let tables = vec![
            make_table(100, "sales", PartitionLevel::Root),
            external(make_table(101, "sales_1_prt_old", PartitionLevel::Leaf)),
        ];
        let split = split_tables(tables, &Scope::default(), &v6());

        assert_eq!(
            names(&split.metadata),
            ["public.sales", "public.sales_1_prt_old_ext_part_"]
        );
        assert_eq!(names(&split.data), ["public.sales"]);
    }

    #[test]
    fn leaf_partition_data_copies_leaves() {
        let tables = vec![
            make_table(100, "sales", PartitionLevel::Root),
            make_table(101, "sales_1_prt_a", PartitionLevel::Intermediate),
            make_table(102, "sales_1_prt_a_2_prt_x", PartitionLevel::Leaf),
            make_table(103, "plain", PartitionLevel::None),
        ];
        let scope = Scope {
            leaf_partition_data: true,
            ..Scope::default()
        };
        let split = split_tables(tables, &scope, &v6());

        assert_eq!(names(&split.metadata), ["public.sales", "public.plain"]);
        assert_eq!(
            names(&split.data),
            ["public.sales_1_prt_a_2_prt_x", "public.plain"]
        );
    }

    #[test]
    fn include_list_selects_data_before_7() {
        let tables = vec![
            make_table(100, "wanted", PartitionLevel::None),
            external(make_table(101, "wanted_1_prt_ext", PartitionLevel::Leaf)),
        ];
        let scope = Scope {
            filters: Filters {
                include_relations: vec!["public.wanted".into()],
                ..Filters::default()
            },
            include_oids: vec![100, 101],
            ..Scope::default()
        };
        let split = split_tables(tables, &scope, &v6());

        assert_eq!(split.metadata.len(), 2);
        assert_eq!(names(&split.data), ["public.wanted"]);
    }

    #[test]
    fn attached_partitions_are_not_copied_on_7() {
        let mut leaf = make_table(101, "sales_1_prt_a", PartitionLevel::Leaf);
        leaf.attach_partition = Some(AttachPartitionInfo {
            relname: "public.sales_1_prt_a".into(),
            parent: "public.sales".into(),
            expr: "FOR VALUES IN (1)".into(),
        });
        let tables = vec![make_table(100, "sales", PartitionLevel::Root), leaf.clone()];
        let split = split_tables(tables, &Scope::default(), &v7());
        assert_eq!(names(&split.metadata), ["public.sales", "public.sales_1_prt_a"]);
        assert_eq!(names(&split.data), ["public.sales"]);

        let scope = Scope {
            filters: Filters {
                exclude_relations: vec!["public.sales".into()],
                ..Filters::default()
            },
            ..Scope::default()
        };
        let split = split_tables(vec![leaf], &scope, &v7());
        assert!(split.metadata.is_empty());
    }

    #[test]
    fn foreign_tables_have_no_data() {
        let mut table = make_table(100, "remote", PartitionLevel::None);
        table.foreign = Some(Default::default());
        let split = split_tables(vec![table], &Scope::default(), &v6());
        assert_eq!(split.metadata.len(), 1);
        assert!(split.data.is_empty());
    }

    #[test]
    fn attribute_lists() {
        let mut generated = ColumnDefinition::new("c", "int");
        generated.is_generated = true;
        let columns = vec![
            ColumnDefinition::new("a", "int"),
            ColumnDefinition::new("b", "text"),
            generated,
        ];
        assert_eq!(attribute_string(&columns), "(a,b)");
        assert_eq!(attribute_string(&[]), "");
    }

    #[test]
    fn leaves_map_to_their_root() {
        let link = |parent_oid, child_oid| PartitionLink {
            parent_oid,
            child_oid,
            is_external: false,
        };
        let links = vec![link(1, 2), link(2, 3), link(2, 4), link(9, 10)];
        let tables = vec![
            make_table(1, "sales", PartitionLevel::Root),
            make_table(2, "sales_1_prt_2020", PartitionLevel::Intermediate),
            make_table(3, "sales_1_prt_2020_2_prt_q1", PartitionLevel::Leaf),
        ];
        let roots = partition_roots(&links, &tables);
        assert_eq!(roots.get(&3).map(String::as_str), Some("public.sales"));
        assert_eq!(roots.get(&4).map(String::as_str), Some("public.sales"));
        assert_eq!(roots.get(&2).map(String::as_str), Some("public.sales"));
        assert_eq!(roots.get(&10), None);
    }
}
