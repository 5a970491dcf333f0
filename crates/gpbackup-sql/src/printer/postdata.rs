use super::{Block, Printer};
use gpbackup_core::{
    catalog::{EventTrigger, Index, ObjectMetadata, Rule, Trigger, TriggerEnabled},
    toc::MetadataEntry,
};

/// One block per statement, all under the same entry, so a restore can
/// replay them individually. The object's metadata follows in its own block.
fn statement_blocks(entry: MetadataEntry, statements: Vec<String>, metadata: String) -> Vec<Block> {
    let mut blocks: Vec<Block> = statements
        .into_iter()
        .map(|statement| Block::new(entry.clone(), format!("\n\n{statement}\n")))
        .collect();
    if !metadata.is_empty() {
        blocks.push(Block::new(entry, metadata));
    }
    blocks
}

impl Printer<'_> {
    pub fn create_index(&self, index: &Index, meta: &ObjectMetadata) -> Vec<Block> {
        let fqn = index.fqn();
        let table = index.owning_table_fqn();

        let mut statements = vec![format!("{};", index.def)];
        if !index.tablespace.is_empty() {
            statements.push(format!("ALTER INDEX {fqn} SET TABLESPACE {};", index.tablespace));
        }
        if index.is_clustered {
            statements.push(format!("ALTER TABLE {table} CLUSTER ON {};", index.name));
        }

        statement_blocks(
            MetadataEntry::new(&index.owning_schema, &index.name, "INDEX").with_reference(&table),
            statements,
            self.object_metadata(meta, &fqn, "INDEX", None),
        )
    }

    pub fn create_rule(&self, rule: &Rule, meta: &ObjectMetadata) -> Vec<Block> {
        let table = rule.owning_table_fqn();
        statement_blocks(
            MetadataEntry::new(&rule.owning_schema, &rule.name, "RULE").with_reference(&table),
            vec![rule.def.clone()],
            self.object_metadata(meta, &rule.name, "RULE", Some(&table)),
        )
    }

    pub fn create_trigger(&self, trigger: &Trigger, meta: &ObjectMetadata) -> Vec<Block> {
        let table = trigger.owning_table_fqn();
        statement_blocks(
            MetadataEntry::new(&trigger.owning_schema, &trigger.name, "TRIGGER")
                .with_reference(&table),
            vec![format!("{};", trigger.def)],
            self.object_metadata(meta, &trigger.name, "TRIGGER", Some(&table)),
        )
    }

    pub fn create_event_trigger(&self, trigger: &EventTrigger, meta: &ObjectMetadata) -> Vec<Block> {
        let mut create = format!("CREATE EVENT TRIGGER {}\nON {}", trigger.name, trigger.event);
        if !trigger.event_tags.is_empty() {
            fmt!(create, "\nWHEN TAG IN ({})", trigger.event_tags);
        }
        fmt!(create, "\nEXECUTE PROCEDURE {}();", trigger.function_name);

        let mut statements = vec![create];
        let enable = match trigger.enabled {
            TriggerEnabled::Origin => None,
            TriggerEnabled::Disabled => Some("DISABLE"),
            TriggerEnabled::Always => Some("ENABLE ALWAYS"),
            TriggerEnabled::Replica => Some("ENABLE REPLICA"),
        };
        if let Some(enable) = enable {
            statements.push(format!("ALTER EVENT TRIGGER {} {enable};", trigger.name));
        }

        statement_blocks(
            MetadataEntry::new("", &trigger.name, "EVENT TRIGGER"),
            statements,
            self.object_metadata(meta, &trigger.name, "EVENT TRIGGER", None),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::version::DbVersion;
    use pretty_assertions::assert_eq;

    fn sql(blocks: Vec<Block>) -> Vec<String> {
        blocks.into_iter().map(|block| block.sql).collect()
    }

    #[test]
    fn clustered_index_in_tablespace() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let index = Index {
            name: "idx".into(),
            owning_schema: "public".into(),
            owning_table: "t".into(),
            tablespace: "fast".into(),
            def: "CREATE INDEX idx ON public.t USING btree (a)".into(),
            is_clustered: true,
            ..Index::default()
        };
        let meta = ObjectMetadata {
            comment: "an index".into(),
            ..ObjectMetadata::default()
        };
        let blocks = Printer::new(&version).create_index(&index, &meta);
        assert!(blocks.iter().all(|block| block.entry.referenceobject == "public.t"));
        assert_eq!(
            sql(blocks),
            [
                "\n\nCREATE INDEX idx ON public.t USING btree (a);\n",
                "\n\nALTER INDEX public.idx SET TABLESPACE fast;\n",
                "\n\nALTER TABLE public.t CLUSTER ON idx;\n",
                "\n\nCOMMENT ON INDEX public.idx IS 'an index';\n",
            ]
        );
    }

    #[test]
    fn trigger_comment_names_its_table() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let trigger = Trigger {
            name: "trig".into(),
            owning_schema: "public".into(),
            owning_table: "t".into(),
            def: "CREATE TRIGGER trig BEFORE INSERT ON public.t FOR EACH ROW EXECUTE PROCEDURE public.f()".into(),
            ..Trigger::default()
        };
        let meta = ObjectMetadata {
            comment: "fires".into(),
            ..ObjectMetadata::default()
        };
        let blocks = Printer::new(&version).create_trigger(&trigger, &meta);
        assert_eq!(
            blocks[1].sql,
            "\n\nCOMMENT ON TRIGGER trig ON public.t IS 'fires';\n"
        );
    }

    #[test]
    fn disabled_event_trigger() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let trigger = EventTrigger {
            name: "et".into(),
            event: "ddl_command_start".into(),
            function_name: "public.abort_any_command".into(),
            enabled: TriggerEnabled::Disabled,
            event_tags: "'DROP FUNCTION'".into(),
            ..EventTrigger::default()
        };
        assert_eq!(
            sql(Printer::new(&version).create_event_trigger(&trigger, &ObjectMetadata::default())),
            [
                "\n\nCREATE EVENT TRIGGER et\nON ddl_command_start\nWHEN TAG IN ('DROP FUNCTION')\nEXECUTE PROCEDURE public.abort_any_command();\n",
                "\n\nALTER EVENT TRIGGER et DISABLE;\n",
            ]
        );
    }
}
