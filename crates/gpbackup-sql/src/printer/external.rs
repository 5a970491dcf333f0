use super::{relation::column_definitions, Block, Printer};
use gpbackup_core::{
    catalog::{
        escape_single_quotes, make_fqn, ExecLocation, ExternalTableDefinition, PartitionInfo,
        RejectLimitType, Table,
    },
    toc::MetadataEntry,
};
use std::collections::HashMap;

impl Printer<'_> {
    pub(super) fn external_table(&self, table: &Table, external: &ExternalTableDefinition) -> String {
        let direction = if external.writable { "WRITABLE" } else { "READABLE" };
        let web = if external.is_web() { "WEB " } else { "" };

        let mut sql = format!(
            "\n\nCREATE {direction} EXTERNAL {web}TABLE {} (\n{}) ",
            table.fqn(),
            column_definitions(&table.columns, false)
        );
        sql.push_str(&self.external_table_clauses(table, external));
        if external.writable {
            fmt!(sql, "\n{}", table.dist_policy);
        }
        sql.push_str(";\n");
        sql
    }

    /// Everything between the column list and the distribution clause.
    fn external_table_clauses(&self, table: &Table, external: &ExternalTableDefinition) -> String {
        let mut sql = String::new();

        if external.command.is_empty() {
            let uris: Vec<String> = external.uris.iter().map(|uri| format!("'{uri}'")).collect();
            fmt!(sql, "LOCATION (\n\t{}\n)", uris.join(",\n\t"));
        } else {
            fmt!(sql, "EXECUTE '{}'", escape_single_quotes(&external.command));
        }
        sql.push_str(&self.exec_location(&external.exec_location));

        fmt!(sql, "\n{}", format_statement(external));
        if !external.options.is_empty() {
            fmt!(sql, "\nOPTIONS (\n\t{}\n)", external.options);
        }
        if !external.encoding.is_empty() {
            fmt!(sql, "\nENCODING '{}'", external.encoding);
        }

        let error_table = make_fqn(&external.error_table_schema, &external.error_table_name);
        let has_error_table = !external.error_table_name.is_empty();
        if external.log_errors || has_error_table {
            // Error tables other than the table itself only exist before 6
            if has_error_table && error_table != table.fqn() && self.version.before("6") {
                fmt!(sql, "\nLOG ERRORS INTO {error_table}");
            } else {
                sql.push_str("\nLOG ERRORS");
            }
        }
        if external.reject_limit != 0 {
            let unit = match external.reject_limit_type {
                RejectLimitType::Rows => "ROWS",
                RejectLimitType::Percent => "PERCENT",
            };
            fmt!(sql, "\nSEGMENT REJECT LIMIT {} {unit}", external.reject_limit);
        }
        sql
    }

    fn exec_location(&self, location: &ExecLocation) -> String {
        match location {
            ExecLocation::AllSegments => String::new(),
            ExecLocation::Coordinator if self.version.before("7") => " ON MASTER".to_string(),
            ExecLocation::Coordinator => " ON COORDINATOR".to_string(),
            ExecLocation::Count(n) => format!(" ON {n}"),
            ExecLocation::PerHost | ExecLocation::Host(None) => " ON HOST".to_string(),
            ExecLocation::Host(Some(host)) => format!(" ON HOST '{host}'"),
            ExecLocation::Segment(id) => format!(" ON SEGMENT {id}"),
        }
    }

    /// Swaps each external leaf partition, created earlier as a standalone
    /// table, into its place in the partition hierarchy.
    ///
    /// `partitions` maps partition rule oids to their rules so the chain of
    /// intermediate levels can be named. Partitions whose standalone table is
    /// not among `tables` were filtered out and are skipped.
    pub fn exchange_external_partitions(
        &self,
        external: &[PartitionInfo],
        partitions: &HashMap<u32, PartitionInfo>,
        tables: &[Table],
    ) -> Vec<Block> {
        let by_oid: HashMap<u32, &Table> = tables
            .iter()
            .map(|table| (table.relation.oid, table))
            .collect();

        let mut blocks = vec![];
        for partition in external {
            let Some(table) = by_oid.get(&partition.relation_oid) else {
                continue;
            };
            let ext_fqn = table.fqn();

            let mut ancestors = vec![];
            let mut parent_rule = partition.parent_rule_oid;
            while parent_rule != 0 {
                let Some(parent) = partitions.get(&parent_rule) else {
                    break;
                };
                ancestors.push(partition_selector(parent));
                parent_rule = parent.parent_rule_oid;
            }

            let mut sql = format!("\n\nALTER TABLE {}", partition.parent_fqn());
            for selector in ancestors.iter().rev() {
                fmt!(sql, " ALTER PARTITION {selector}");
            }
            fmt!(
                sql,
                " EXCHANGE PARTITION {} WITH TABLE {ext_fqn} WITHOUT VALIDATION;\n\nDROP TABLE {ext_fqn};\n",
                partition_selector(partition)
            );

            blocks.push(Block::new(
                MetadataEntry::new(
                    &table.relation.schema,
                    &table.relation.name,
                    "EXCHANGE PARTITION",
                )
                .with_reference(partition.parent_fqn()),
                sql,
            ));
        }
        blocks
    }
}

fn partition_selector(partition: &PartitionInfo) -> String {
    if partition.partition_name.is_empty() {
        format!("FOR (RANK({}))", partition.rank)
    } else {
        partition.partition_name.clone()
    }
}

#[derive(Debug, PartialEq)]
enum FormatToken<'a> {
    Word(&'a str),
    Quoted(&'a str),
}

/// Splits `pg_exttable.fmtopts` into bare words and quoted values. A quoted
/// value ends at a quote followed by whitespace or the end of the text, so
/// values may themselves contain quotes.
fn tokenize_format_options(opts: &str) -> Vec<FormatToken<'_>> {
    let bytes = opts.as_bytes();
    let mut tokens = vec![];
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if bytes[i] == b'\'' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() {
                let closes = bytes[end] == b'\''
                    && bytes.get(end + 1).map_or(true, |next| next.is_ascii_whitespace());
                if closes {
                    break;
                }
                end += 1;
            }
            tokens.push(FormatToken::Quoted(&opts[start..end.min(bytes.len())]));
            i = end + 1;
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            tokens.push(FormatToken::Word(&opts[start..i]));
        }
    }
    tokens
}

fn escape_string(value: &str) -> String {
    format!("E'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `FORMAT '...' (...)` clause of an external table.
pub fn format_statement(external: &ExternalTableDefinition) -> String {
    let mut sql = format!("FORMAT '{}'", external.format_keyword());
    let tokens = tokenize_format_options(&external.format_opts);
    if tokens.is_empty() {
        return sql;
    }

    let options = match external.format_type.as_str() {
        "t" | "c" | "" => tokens
            .iter()
            .map(|token| match token {
                FormatToken::Word(word) => word.to_string(),
                FormatToken::Quoted(value) => escape_string(value),
            })
            .collect::<Vec<_>>()
            .join(" "),
        // Custom formats take key = value pairs
        _ => {
            let mut pairs = vec![];
            let mut tokens = tokens.iter().peekable();
            while let Some(token) = tokens.next() {
                match (token, tokens.peek()) {
                    (FormatToken::Word(key), Some(FormatToken::Quoted(value))) => {
                        pairs.push(format!("{key} = {}", escape_string(value)));
                        tokens.next();
                    }
                    (FormatToken::Word(word), _) => pairs.push(word.to_string()),
                    (FormatToken::Quoted(value), _) => pairs.push(escape_string(value)),
                }
            }
            pairs.join(", ")
        }
    };
    fmt!(sql, " ({options})");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::{catalog::Relation, catalog::ObjectMetadata, version::DbVersion};
    use pretty_assertions::assert_eq;

    fn make_external(external: ExternalTableDefinition) -> Table {
        Table {
            relation: Relation::new(1, "public", "tablename"),
            dist_policy: "DISTRIBUTED RANDOMLY".into(),
            external: Some(ExternalTableDefinition {
                format_type: "t".into(),
                encoding: "UTF-8".into(),
                ..external
            }),
            ..Table::default()
        }
    }

    fn print(version: &str, table: &Table) -> String {
        let version = DbVersion::from_release(version).unwrap();
        Printer::new(&version)
            .create_table(table, &ObjectMetadata::default())
            .sql
    }

    #[test]
    fn readable_external_table() {
        let table = make_external(ExternalTableDefinition {
            uris: vec!["file://host:port/path/file".into()],
            ..ExternalTableDefinition::default()
        });
        assert_eq!(
            print("6.20.0", &table),
            "\n\nCREATE READABLE EXTERNAL TABLE public.tablename (\n) LOCATION (\n\t'file://host:port/path/file'\n)\nFORMAT 'TEXT'\nENCODING 'UTF-8';\n"
        );
    }

    #[test]
    fn writable_web_table() {
        let table = make_external(ExternalTableDefinition {
            command: "hostname".into(),
            writable: true,
            ..ExternalTableDefinition::default()
        });
        assert_eq!(
            print("6.20.0", &table),
            "\n\nCREATE WRITABLE EXTERNAL WEB TABLE public.tablename (\n) EXECUTE 'hostname'\nFORMAT 'TEXT'\nENCODING 'UTF-8'\nDISTRIBUTED RANDOMLY;\n"
        );
    }

    #[test]
    fn execute_locations() {
        let cases = [
            (ExecLocation::Coordinator, "EXECUTE 'host''name' ON MASTER\n"),
            (ExecLocation::Count(3), "EXECUTE 'host''name' ON 3\n"),
            (ExecLocation::PerHost, "EXECUTE 'host''name' ON HOST\n"),
            (
                ExecLocation::Host(Some("localhost".into())),
                "EXECUTE 'host''name' ON HOST 'localhost'\n",
            ),
            (ExecLocation::Segment(0), "EXECUTE 'host''name' ON SEGMENT 0\n"),
        ];
        for (exec_location, expected) in cases {
            let table = make_external(ExternalTableDefinition {
                command: "host'name".into(),
                exec_location,
                ..ExternalTableDefinition::default()
            });
            assert!(print("6.20.0", &table).contains(expected), "{expected}");
        }
    }

    #[test]
    fn error_logging_and_reject_limit() {
        let table = make_external(ExternalTableDefinition {
            uris: vec!["file://host/file".into()],
            error_table_schema: "public".into(),
            error_table_name: "tablename".into(),
            reject_limit: 2,
            reject_limit_type: RejectLimitType::Percent,
            options: "foo 'bar'".into(),
            ..ExternalTableDefinition::default()
        });
        assert!(print("5.28.0", &table).ends_with(
            "FORMAT 'TEXT'\nOPTIONS (\n\tfoo 'bar'\n)\nENCODING 'UTF-8'\nLOG ERRORS\nSEGMENT REJECT LIMIT 2 PERCENT;\n"
        ));

        let mut separate = table.clone();
        if let Some(external) = &mut separate.external {
            external.error_table_name = "errors".into();
        }
        assert!(print("5.28.0", &separate).contains("\nLOG ERRORS INTO public.errors\n"));
    }

    #[test]
    fn text_format_options() {
        let external = ExternalTableDefinition {
            format_type: "t".into(),
            format_opts: r"delimiter '\t' null '\N' escape '\' fill missing fields".into(),
            ..ExternalTableDefinition::default()
        };
        assert_eq!(
            format_statement(&external),
            r"FORMAT 'TEXT' (delimiter E'\\t' null E'\\N' escape E'\\' fill missing fields)"
        );
    }

    #[test]
    fn csv_format_with_quote_character() {
        let external = ExternalTableDefinition {
            format_type: "c".into(),
            format_opts: r#"delimiter ',' null '' escape '"' quote '''"#.into(),
            ..ExternalTableDefinition::default()
        };
        assert_eq!(
            format_statement(&external),
            r#"FORMAT 'CSV' (delimiter E',' null E'' escape E'"' quote E'\'')"#
        );
    }

    #[test]
    fn custom_format_pairs() {
        let external = ExternalTableDefinition {
            format_type: "b".into(),
            format_opts: "formatter 'gphdfs_import' opt1 '\t'".into(),
            ..ExternalTableDefinition::default()
        };
        assert_eq!(
            format_statement(&external),
            "FORMAT 'CUSTOM' (formatter = E'gphdfs_import', opt1 = E'\t')"
        );
    }

    #[test]
    fn exchange_three_level_partition() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let tables = vec![Table {
            relation: Relation::new(1, "public", "partition_table_ext_part_"),
            ..Table::default()
        }];
        let rule = |rule_oid, parent_rule_oid, name: &str, rank| PartitionInfo {
            rule_oid,
            parent_rule_oid,
            parent_relation_oid: 2,
            parent_schema: "public".into(),
            parent_relation_name: "partition_table".into(),
            partition_name: name.into(),
            rank,
            ..PartitionInfo::default()
        };
        let external = PartitionInfo {
            relation_oid: 1,
            is_external: true,
            ..rule(10, 11, "", 1)
        };
        let partitions = HashMap::from([(11, rule(11, 12, "partition_name", 0)), (12, rule(12, 0, "", 3))]);

        let blocks =
            Printer::new(&version).exchange_external_partitions(&[external], &partitions, &tables);
        assert_eq!(
            blocks[0].sql,
            "\n\nALTER TABLE public.partition_table ALTER PARTITION FOR (RANK(3)) ALTER PARTITION partition_name EXCHANGE PARTITION FOR (RANK(1)) WITH TABLE public.partition_table_ext_part_ WITHOUT VALIDATION;\n\nDROP TABLE public.partition_table_ext_part_;\n"
        );
        assert_eq!(blocks[0].entry.objecttype, "EXCHANGE PARTITION");
    }
}
