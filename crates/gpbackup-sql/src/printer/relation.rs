use super::{Block, Comma, Printer};
use gpbackup_core::{
    catalog::{
        escape_single_quotes, make_fqn, ColumnDefinition, Constraint, ObjectMetadata,
        ReplicaIdentity, Schema, Table, View,
    },
    toc::MetadataEntry,
};

impl Printer<'_> {
    /// `public` always exists, so only its metadata is printed.
    pub fn create_schema(&self, schema: &Schema, meta: &ObjectMetadata) -> Block {
        let mut sql = String::new();
        if schema.name != "public" {
            fmt!(sql, "\n\nCREATE SCHEMA {};", schema.name);
        }
        sql.push_str(&self.object_metadata(meta, &schema.name, "SCHEMA", None));

        Block::new(MetadataEntry::new("", &schema.name, "SCHEMA"), sql)
    }

    /// The table, its column settings, metadata and the statements that
    /// depend on the table existing.
    pub fn create_table(&self, table: &Table, meta: &ObjectMetadata) -> Block {
        let fqn = table.fqn();
        let mut sql = match &table.external {
            Some(external) => self.external_table(table, external),
            None => self.regular_table(table),
        };
        sql.push_str(&self.object_metadata(meta, &fqn, table.object_type(), None));

        for statement in self.post_create_table(table, meta) {
            fmt!(sql, "\n\n{statement}\n");
        }

        Block::new(
            MetadataEntry::new(&table.relation.schema, &table.relation.name, table.object_type()),
            sql,
        )
    }

    fn regular_table(&self, table: &Table) -> String {
        let fqn = table.fqn();
        let modifier = if table.is_unlogged {
            "UNLOGGED "
        } else if table.is_foreign() {
            "FOREIGN "
        } else {
            ""
        };
        let of_type = if table.of_type.is_empty() {
            String::new()
        } else {
            format!("OF {} ", table.of_type)
        };

        let mut sql = format!("\n\nCREATE {modifier}TABLE {fqn} {of_type}(\n");
        sql.push_str(&column_definitions(&table.columns, !table.of_type.is_empty()));
        sql.push_str(") ");

        if !table.partition_key_def.is_empty() {
            fmt!(sql, "PARTITION BY {} ", table.partition_key_def);
        }
        // Attached partitions get their parent through ATTACH PARTITION
        if !table.inherits.is_empty() && table.attach_partition.is_none() {
            fmt!(sql, "INHERITS ({}) ", Comma(&table.inherits));
        }
        if let Some(foreign) = &table.foreign {
            fmt!(sql, "SERVER {} ", foreign.server);
            if !foreign.options.is_empty() {
                fmt!(sql, "OPTIONS ({}) ", foreign.options);
            }
        }
        if !table.access_method.is_empty() {
            fmt!(sql, "USING {} ", table.access_method);
        }
        if !table.storage_opts.is_empty() {
            fmt!(sql, "WITH ({}) ", table.storage_opts);
        }
        if !table.tablespace.is_empty() {
            fmt!(sql, "TABLESPACE {} ", table.tablespace);
        }
        sql.push_str(&table.dist_policy);
        if !table.part_def.is_empty() {
            fmt!(sql, " {}", table.part_def.trim());
        }
        sql.push_str(";\n");
        if !table.part_template_def.is_empty() {
            fmt!(sql, "{};\n", table.part_template_def.trim());
        }

        for column in &table.columns {
            if column.stat_target > -1 {
                fmt!(
                    sql,
                    "\nALTER TABLE ONLY {fqn} ALTER COLUMN {} SET STATISTICS {};",
                    column.name,
                    column.stat_target
                );
            }
            if !column.storage.is_empty() {
                fmt!(
                    sql,
                    "\nALTER TABLE ONLY {fqn} ALTER COLUMN {} SET STORAGE {};",
                    column.name,
                    column.storage
                );
            }
            if !column.options.is_empty() {
                fmt!(
                    sql,
                    "\nALTER TABLE ONLY {fqn} ALTER COLUMN {} SET ({});",
                    column.name,
                    column.options
                );
            }
        }
        sql
    }

    fn post_create_table(&self, table: &Table, meta: &ObjectMetadata) -> Vec<String> {
        let fqn = table.fqn();
        let mut statements = vec![];

        for column in &table.columns {
            if !column.comment.is_empty() {
                statements.push(format!(
                    "COMMENT ON COLUMN {fqn}.{} IS '{}';",
                    column.name,
                    escape_single_quotes(&column.comment)
                ));
            }
            if !column.privileges.is_empty() {
                let column_meta = ObjectMetadata {
                    privileges: column.privileges.clone(),
                    owner: meta.owner.clone(),
                    ..ObjectMetadata::default()
                };
                let privileges = self.privileges(&column_meta, &fqn, "COLUMN", Some(&column.name));
                statements.push(privileges.trim().to_string());
            }
            if !column.security_label.is_empty() {
                statements.push(format!(
                    "SECURITY LABEL FOR {} ON COLUMN {fqn}.{} IS '{}';",
                    column.security_label_provider,
                    column.name,
                    escape_single_quotes(&column.security_label)
                ));
            }
        }

        // Index identities come with the index
        if !table.is_foreign() {
            match table.replica_identity {
                ReplicaIdentity::Nothing => {
                    statements.push(format!("ALTER TABLE {fqn} REPLICA IDENTITY NOTHING;"))
                }
                ReplicaIdentity::Full => {
                    statements.push(format!("ALTER TABLE {fqn} REPLICA IDENTITY FULL;"))
                }
                ReplicaIdentity::Default | ReplicaIdentity::Index => {}
            }
        }

        for altered in &table.altered_partition_schemas {
            statements.push(format!(
                "ALTER TABLE {} SET SCHEMA {};",
                make_fqn(&altered.old_schema, &altered.name),
                altered.new_schema
            ));
        }

        if self.version.at_least("7") {
            if let (Some(attach), Some(parent)) = (&table.attach_partition, table.inherits.first()) {
                statements.push(format!(
                    "ALTER TABLE ONLY {parent} ATTACH PARTITION {} {};",
                    attach.relname, attach.expr
                ));
            }
            if table.force_row_security {
                statements.push(format!("ALTER TABLE ONLY {fqn} FORCE ROW LEVEL SECURITY;"));
            }
        }
        statements
    }

    /// `None` when the view's definition could not be read, which happens if
    /// it was dropped while the backup ran.
    pub fn create_view(&self, view: &View, meta: &ObjectMetadata) -> Option<Block> {
        let fqn = view.fqn();
        let Some(definition) = &view.definition else {
            tracing::warn!(view = %fqn, "no definition found for view; skipping");
            return None;
        };

        let mut sql = if view.is_materialized {
            let tablespace = if view.tablespace.is_empty() {
                String::new()
            } else {
                format!(" TABLESPACE {}", view.tablespace)
            };
            format!(
                "\n\nCREATE MATERIALIZED VIEW {fqn}{}{tablespace} AS {}\nWITH NO DATA\n{};\n",
                view.options,
                definition.trim_end().trim_end_matches(';'),
                view.dist_policy
            )
        } else {
            format!("\n\nCREATE VIEW {fqn}{} AS {definition}\n", view.options)
        };
        sql.push_str(&self.object_metadata(meta, &fqn, view.object_type(), None));

        Some(Block::new(
            MetadataEntry::new(&view.schema, &view.name, view.object_type()),
            sql,
        ))
    }

    pub fn create_constraint(&self, constraint: &Constraint, meta: &ObjectMetadata) -> Block {
        // Constraints on a partition parent cascade to its children
        let only = if constraint.is_partition_parent { "" } else { "ONLY " };
        let mut sql = format!(
            "\n\nALTER TABLE {only}{} ADD CONSTRAINT {} {};",
            constraint.owning_object, constraint.name, constraint.def
        );
        sql.push_str(&self.object_metadata(
            meta,
            &constraint.name,
            "CONSTRAINT",
            Some(&constraint.owning_object),
        ));

        Block::new(
            MetadataEntry::new(&constraint.schema, &constraint.name, "CONSTRAINT")
                .with_reference(&constraint.owning_object),
            sql,
        )
    }
}

/// Column lines of a `CREATE TABLE`, each ending the list with a newline.
pub(super) fn column_definitions(columns: &[ColumnDefinition], typed: bool) -> String {
    let lines: Vec<String> = columns
        .iter()
        .map(|column| {
            let mut line = if typed {
                format!("\t{} WITH OPTIONS", column.name)
            } else {
                format!("\t{} {}", column.name, column.ty)
            };
            if !column.fdw_options.is_empty() {
                fmt!(line, " OPTIONS ({})", column.fdw_options);
            }
            if !column.collation.is_empty() {
                fmt!(line, " COLLATE {}", column.collation);
            }
            if let Some(default) = &column.default {
                if !column.is_generated {
                    fmt!(line, " DEFAULT {default}");
                } else if !column.is_inherited {
                    // Inherited generated columns take the parent's expression
                    fmt!(line, " GENERATED ALWAYS AS {default} STORED");
                }
            }
            if column.not_null {
                line.push_str(" NOT NULL");
            }
            if !column.encoding.is_empty() {
                fmt!(line, " ENCODING ({})", column.encoding);
            }
            line
        })
        .collect();

    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join(",\n"))
    }
}
