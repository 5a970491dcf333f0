use super::{Block, Printer};
use gpbackup_core::{
    catalog::{escape_single_quotes, ObjectMetadata, Sequence},
    toc::MetadataEntry,
};

impl Printer<'_> {
    /// `CREATE SEQUENCE` plus the `setval` call restoring its position.
    /// Identity sequences are created with their column instead.
    pub fn create_sequence(&self, sequence: &Sequence, meta: &ObjectMetadata) -> Option<Block> {
        if sequence.is_identity() {
            return None;
        }

        let fqn = sequence.fqn();
        let definition = &sequence.definition;
        let mut sql = format!(
            "\n\nCREATE SEQUENCE {fqn}{};",
            self.sequence_definition(sequence)
        );
        fmt!(
            sql,
            "\n\nSELECT pg_catalog.setval('{}', {}, {});\n",
            escape_single_quotes(&fqn),
            definition.last_value,
            definition.is_called
        );
        sql.push_str(&self.object_metadata(meta, &fqn, "SEQUENCE", None));

        Some(Block::new(
            MetadataEntry::new(&sequence.relation.schema, &sequence.relation.name, "SEQUENCE"),
            sql,
        ))
    }

    /// Recreates an identity column's sequence by adding the identity to
    /// its column.
    pub fn create_identity_column(&self, sequence: &Sequence) -> Option<Block> {
        let identity = sequence.identity?;
        let sql = format!(
            "\n\nALTER TABLE {}\nALTER COLUMN {} ADD GENERATED {} AS IDENTITY (\n\tSEQUENCE NAME {}{});\n",
            sequence.owning_table,
            sequence.unqualified_owning_column,
            identity.keyword(),
            sequence.fqn(),
            self.sequence_definition(sequence)
        );

        Some(Block::new(
            MetadataEntry::new(&sequence.relation.schema, &sequence.relation.name, "SEQUENCE")
                .with_reference(&sequence.owning_table),
            sql,
        ))
    }

    /// Ties a sequence to the column using it. Printed once both exist.
    pub fn sequence_owned_by(&self, sequence: &Sequence) -> Option<Block> {
        if sequence.is_identity() || sequence.owning_column.is_empty() {
            return None;
        }
        Some(Block::new(
            MetadataEntry::new(
                &sequence.relation.schema,
                &sequence.relation.name,
                "SEQUENCE OWNER",
            )
            .with_reference(&sequence.owning_table),
            format!(
                "\n\nALTER SEQUENCE {} OWNED BY {};\n",
                sequence.fqn(),
                sequence.owning_column
            ),
        ))
    }

    fn sequence_definition(&self, sequence: &Sequence) -> String {
        let definition = &sequence.definition;
        let mut sql = String::new();
        let (mut min, mut max) = (i64::MIN, i64::MAX);

        // Identity columns cannot be declared AS smallint or integer
        if self.version.at_least("7") && !sequence.is_identity() {
            if definition.data_type != "bigint" {
                fmt!(sql, "\n\tAS {}", definition.data_type);
            }
            (min, max) = definition.type_bounds();
        }

        if self.version.at_least("6") {
            fmt!(sql, "\n\tSTART WITH {}", definition.start);
        } else if !definition.is_called {
            fmt!(sql, "\n\tSTART WITH {}", definition.last_value);
        }
        fmt!(sql, "\n\tINCREMENT BY {}", definition.increment);

        let default_max = (definition.max_value == max && definition.increment > 0)
            || (definition.max_value == -1 && definition.increment < 0);
        if default_max {
            sql.push_str("\n\tNO MAXVALUE");
        } else {
            fmt!(sql, "\n\tMAXVALUE {}", definition.max_value);
        }

        let default_min = (definition.min_value == min && definition.increment < 0)
            || (definition.min_value == 1 && definition.increment > 0);
        if default_min {
            sql.push_str("\n\tNO MINVALUE");
        } else {
            fmt!(sql, "\n\tMINVALUE {}", definition.min_value);
        }

        fmt!(sql, "\n\tCACHE {}", definition.cache);
        if definition.is_cycled {
            sql.push_str("\n\tCYCLE");
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::{
        catalog::{IdentityKind, Relation, SequenceDefinition},
        version::DbVersion,
    };
    use pretty_assertions::assert_eq;

    fn make_sequence() -> Sequence {
        Sequence {
            relation: Relation::new(1, "public", "seq_name"),
            ..Sequence::default()
        }
    }

    #[test]
    fn default_sequence() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let block = Printer::new(&version)
            .create_sequence(&make_sequence(), &ObjectMetadata::default())
            .unwrap();
        assert_eq!(
            block.sql,
            "\n\nCREATE SEQUENCE public.seq_name\n\tSTART WITH 1\n\tINCREMENT BY 1\n\tNO MAXVALUE\n\tNO MINVALUE\n\tCACHE 1;\n\nSELECT pg_catalog.setval('public.seq_name', 1, false);\n"
        );
    }

    #[test]
    fn smallint_sequence_on_7() {
        let version = DbVersion::from_release("7.0.0").unwrap();
        let mut sequence = make_sequence();
        sequence.definition = SequenceDefinition {
            data_type: "smallint".into(),
            max_value: i16::MAX as i64,
            increment: 1,
            is_cycled: true,
            ..SequenceDefinition::default()
        };
        let sql = Printer::new(&version)
            .create_sequence(&sequence, &ObjectMetadata::default())
            .unwrap()
            .sql;
        assert!(sql.starts_with(
            "\n\nCREATE SEQUENCE public.seq_name\n\tAS smallint\n\tSTART WITH 1\n\tINCREMENT BY 1\n\tNO MAXVALUE\n\tNO MINVALUE\n\tCACHE 1\n\tCYCLE;"
        ));
    }

    #[test]
    fn sequence_before_6_starts_at_last_value() {
        let version = DbVersion::from_release("5.28.0").unwrap();
        let mut sequence = make_sequence();
        sequence.definition.last_value = 7;
        sequence.definition.max_value = 1000;
        let sql = Printer::new(&version)
            .create_sequence(&sequence, &ObjectMetadata::default())
            .unwrap()
            .sql;
        assert!(sql.contains("\n\tSTART WITH 7\n\tINCREMENT BY 1\n\tMAXVALUE 1000\n"));
    }

    #[test]
    fn identity_sequences_belong_to_their_column() {
        let version = DbVersion::from_release("7.0.0").unwrap();
        let mut sequence = make_sequence();
        sequence.identity = Some(IdentityKind::Always);
        sequence.owning_table = "public.t".into();
        sequence.owning_column = "public.t.id".into();
        sequence.unqualified_owning_column = "id".into();
        let printer = Printer::new(&version);

        assert!(printer.create_sequence(&sequence, &ObjectMetadata::default()).is_none());
        assert!(printer.sequence_owned_by(&sequence).is_none());
        assert_eq!(
            printer.create_identity_column(&sequence).unwrap().sql,
            "\n\nALTER TABLE public.t\nALTER COLUMN id ADD GENERATED ALWAYS AS IDENTITY (\n\tSEQUENCE NAME public.seq_name\n\tSTART WITH 1\n\tINCREMENT BY 1\n\tNO MAXVALUE\n\tNO MINVALUE\n\tCACHE 1);\n"
        );
    }

    #[test]
    fn owned_by_references_the_table() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let mut sequence = make_sequence();
        sequence.owning_table = "public.t".into();
        sequence.owning_column = "public.t.id".into();
        let block = Printer::new(&version).sequence_owned_by(&sequence).unwrap();
        assert_eq!(block.sql, "\n\nALTER SEQUENCE public.seq_name OWNED BY public.t.id;\n");
        assert_eq!(block.entry.objecttype, "SEQUENCE OWNER");
        assert_eq!(block.entry.referenceobject, "public.t");
    }
}
