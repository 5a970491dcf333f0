use super::{Block, Printer};
use gpbackup_core::{
    catalog::{escape_single_quotes, make_fqn, AttributeStatistic, TupleStatistic},
    toc::MetadataEntry,
};

impl Printer<'_> {
    /// Restores the planner statistics of one table: its page and tuple
    /// counts, then each analyzed column's `pg_statistic` row.
    pub fn table_statistics(
        &self,
        tuple: &TupleStatistic,
        attributes: &[AttributeStatistic],
    ) -> Block {
        let fqn = escape_single_quotes(&make_fqn(&tuple.schema, &tuple.table));
        let mut sql = format!(
            "\n\nUPDATE pg_class\nSET\n\trelpages = {}::int,\n\treltuples = {:.6}::real\nWHERE oid = '{fqn}'::regclass::oid;\n",
            tuple.rel_pages, tuple.rel_tuples
        );
        for attribute in attributes {
            sql.push_str(&self.attribute_statistic(&fqn, attribute));
        }

        Block::new(
            MetadataEntry::new(&tuple.schema, &tuple.table, "STATISTICS"),
            sql,
        )
    }

    fn attribute_statistic(&self, fqn: &str, attribute: &AttributeStatistic) -> String {
        let attname = escape_single_quotes(&attribute.attname);
        let attnum = format!(
            "(SELECT a.attnum FROM pg_attribute a WHERE a.attrelid = '{fqn}'::regclass::oid AND a.attname = '{attname}')"
        );

        let mut columns = vec![
            format!("'{fqn}'::regclass::oid"),
            format!("{attnum}::smallint"),
        ];
        if self.version.at_least("6") {
            columns.push(format!("{}::boolean", attribute.inherit));
        }
        columns.push(format!("{:.6}::real", attribute.null_fraction));
        columns.push(format!("{}::integer", attribute.width));
        columns.push(format!("{:.6}::real", attribute.distinct));
        columns.extend(attribute.kinds.iter().map(|kind| format!("{kind}::smallint")));
        columns.extend(attribute.operators.iter().map(|op| format!("{op}::oid")));
        columns.extend(attribute.collations.iter().map(|coll| format!("{coll}::oid")));
        columns.extend(attribute.numbers.iter().map(|numbers| array_literal(numbers, "real")));
        columns.extend(
            attribute
                .values
                .iter()
                .map(|values| array_literal(values, &attribute.type_name)),
        );

        format!(
            "\nDELETE FROM pg_statistic WHERE starelid = '{fqn}'::regclass::oid AND staattnum = {attnum};\nINSERT INTO pg_statistic VALUES (\n\t{}\n);\n",
            columns.join(",\n\t")
        )
    }
}

fn array_literal(literal: &str, element_type: &str) -> String {
    if literal.is_empty() || literal == "NULL" {
        return "NULL".to_string();
    }
    format!("'{}'::{element_type}[]", escape_single_quotes(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::version::DbVersion;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_without_column_statistics() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let tuple = TupleStatistic {
            oid: 1,
            schema: "public".into(),
            table: "foo".into(),
            rel_pages: 4,
            rel_tuples: 100.0,
        };
        let block = Printer::new(&version).table_statistics(&tuple, &[]);
        assert_eq!(
            block.sql,
            "\n\nUPDATE pg_class\nSET\n\trelpages = 4::int,\n\treltuples = 100.000000::real\nWHERE oid = 'public.foo'::regclass::oid;\n"
        );
        assert_eq!(block.entry.objecttype, "STATISTICS");
        assert_eq!(block.entry.name, "foo");
    }

    #[test]
    fn column_statistics_are_replaced() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let tuple = TupleStatistic {
            schema: "public".into(),
            table: "foo".into(),
            ..TupleStatistic::default()
        };
        let attribute = AttributeStatistic {
            schema: "public".into(),
            table: "foo".into(),
            attname: "a".into(),
            type_name: "int4".into(),
            null_fraction: 0.5,
            width: 4,
            distinct: -1.0,
            kinds: [2, 3, 0, 0, 0],
            operators: [97, 97, 0, 0, 0],
            numbers: [
                "NULL".into(),
                "{1}".into(),
                "NULL".into(),
                "NULL".into(),
                "NULL".into(),
            ],
            values: [
                "{1,2,3}".into(),
                "NULL".into(),
                "NULL".into(),
                "NULL".into(),
                "NULL".into(),
            ],
            ..AttributeStatistic::default()
        };
        let sql = Printer::new(&version)
            .table_statistics(&tuple, &[attribute])
            .sql;

        assert!(sql.contains("\nDELETE FROM pg_statistic WHERE starelid = 'public.foo'::regclass::oid AND staattnum = (SELECT a.attnum FROM pg_attribute a WHERE a.attrelid = 'public.foo'::regclass::oid AND a.attname = 'a');\n"));
        assert!(sql.contains("\n\tfalse::boolean,\n\t0.500000::real,\n\t4::integer,\n\t-1.000000::real,\n\t2::smallint,\n\t3::smallint,"));
        assert!(sql.contains("\n\tNULL,\n\t'{1}'::real[],"));
        assert!(sql.contains("\n\t'{1,2,3}'::int4[],"));
        assert!(sql.ends_with("\n\tNULL\n);\n"));
    }
}
