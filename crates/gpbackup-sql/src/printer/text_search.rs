use super::{Block, Comma, Printer};
use gpbackup_core::{
    catalog::{
        ObjectMetadata, TextSearchConfiguration, TextSearchDictionary, TextSearchParser,
        TextSearchTemplate,
    },
    toc::MetadataEntry,
};

impl Printer<'_> {
    pub fn create_text_search_parser(&self, parser: &TextSearchParser, meta: &ObjectMetadata) -> Block {
        let fqn = parser.fqn();
        let mut sql = format!(
            "\n\nCREATE TEXT SEARCH PARSER {fqn} (\n\tSTART = {},\n\tGETTOKEN = {},\n\tEND = {},\n\tLEXTYPES = {}",
            parser.start_func, parser.token_func, parser.end_func, parser.lex_types_func
        );
        if !parser.headline_func.is_empty() {
            fmt!(sql, ",\n\tHEADLINE = {}", parser.headline_func);
        }
        sql.push_str("\n);");
        sql.push_str(&self.object_metadata(meta, &fqn, "TEXT SEARCH PARSER", None));

        Block::new(
            MetadataEntry::new(&parser.schema, &parser.name, "TEXT SEARCH PARSER"),
            sql,
        )
    }

    pub fn create_text_search_template(
        &self,
        template: &TextSearchTemplate,
        meta: &ObjectMetadata,
    ) -> Block {
        let fqn = template.fqn();
        let mut sql = format!("\n\nCREATE TEXT SEARCH TEMPLATE {fqn} (");
        if !template.init_func.is_empty() {
            fmt!(sql, "\n\tINIT = {},", template.init_func);
        }
        fmt!(sql, "\n\tLEXIZE = {}\n);", template.lexize_func);
        sql.push_str(&self.object_metadata(meta, &fqn, "TEXT SEARCH TEMPLATE", None));

        Block::new(
            MetadataEntry::new(&template.schema, &template.name, "TEXT SEARCH TEMPLATE"),
            sql,
        )
    }

    pub fn create_text_search_dictionary(
        &self,
        dictionary: &TextSearchDictionary,
        meta: &ObjectMetadata,
    ) -> Block {
        let fqn = dictionary.fqn();
        let mut sql = format!(
            "\n\nCREATE TEXT SEARCH DICTIONARY {fqn} (\n\tTEMPLATE = {}",
            dictionary.template
        );
        if !dictionary.init_option.is_empty() {
            fmt!(sql, ",\n\t{}", dictionary.init_option);
        }
        sql.push_str("\n);");
        sql.push_str(&self.object_metadata(meta, &fqn, "TEXT SEARCH DICTIONARY", None));

        Block::new(
            MetadataEntry::new(&dictionary.schema, &dictionary.name, "TEXT SEARCH DICTIONARY"),
            sql,
        )
    }

    /// The configuration followed by one mapping block per token type, in
    /// token name order.
    pub fn create_text_search_configuration(
        &self,
        configuration: &TextSearchConfiguration,
        meta: &ObjectMetadata,
    ) -> Vec<Block> {
        let fqn = configuration.fqn();
        let entry = MetadataEntry::new(
            &configuration.schema,
            &configuration.name,
            "TEXT SEARCH CONFIGURATION",
        );

        let mut blocks = vec![Block::new(
            entry.clone(),
            format!(
                "\n\nCREATE TEXT SEARCH CONFIGURATION {fqn} (\n\tPARSER = {}\n);",
                configuration.parser
            ),
        )];

        for (token, dictionaries) in &configuration.token_to_dicts {
            blocks.push(Block::new(
                entry.clone(),
                format!(
                    "\n\nALTER TEXT SEARCH CONFIGURATION {fqn}\n\tADD MAPPING FOR \"{token}\" WITH {};",
                    Comma(dictionaries)
                ),
            ));
        }

        let metadata = self.object_metadata(meta, &fqn, "TEXT SEARCH CONFIGURATION", None);
        if !metadata.is_empty() {
            blocks.push(Block::new(entry, metadata));
        }
        blocks
    }
}
