use super::{Block, Comma, Printer};
use gpbackup_core::{
    catalog::{ExternalProtocol, ForeignDataWrapper, ForeignServer, ObjectMetadata, UserMapping},
    toc::MetadataEntry,
};

impl Printer<'_> {
    pub fn create_foreign_data_wrapper(
        &self,
        wrapper: &ForeignDataWrapper,
        meta: &ObjectMetadata,
    ) -> Block {
        let mut sql = format!("\n\nCREATE FOREIGN DATA WRAPPER {}", wrapper.name);
        if let Some(handler) = &wrapper.handler {
            fmt!(sql, "\n\tHANDLER {}", handler.qualified_name);
        }
        if let Some(validator) = &wrapper.validator {
            fmt!(sql, "\n\tVALIDATOR {}", validator.qualified_name);
        }
        if !wrapper.options.is_empty() {
            fmt!(sql, "\n\tOPTIONS ({})", wrapper.options);
        }
        sql.push(';');
        sql.push_str(&self.object_metadata(meta, &wrapper.name, "FOREIGN DATA WRAPPER", None));

        Block::new(
            MetadataEntry::new("", &wrapper.name, "FOREIGN DATA WRAPPER"),
            sql,
        )
    }

    pub fn create_foreign_server(&self, server: &ForeignServer, meta: &ObjectMetadata) -> Block {
        let mut sql = format!("\n\nCREATE SERVER {}", server.name);
        if !server.ty.is_empty() {
            fmt!(sql, "\n\tTYPE '{}'", server.ty);
        }
        if !server.version.is_empty() {
            fmt!(sql, "\n\tVERSION '{}'", server.version);
        }
        fmt!(sql, "\n\tFOREIGN DATA WRAPPER {}", server.foreign_data_wrapper);
        if !server.options.is_empty() {
            fmt!(sql, "\n\tOPTIONS ({})", server.options);
        }
        sql.push(';');
        sql.push_str(&self.object_metadata(meta, &server.name, "FOREIGN SERVER", None));

        Block::new(MetadataEntry::new("", &server.name, "FOREIGN SERVER"), sql)
    }

    pub fn create_user_mapping(&self, mapping: &UserMapping) -> Block {
        let mut sql = format!(
            "\n\nCREATE USER MAPPING FOR {}\n\tSERVER {}",
            mapping.user, mapping.server
        );
        if !mapping.options.is_empty() {
            fmt!(sql, "\n\tOPTIONS ({})", mapping.options);
        }
        sql.push(';');

        Block::new(MetadataEntry::new("", mapping.fqn(), "USER MAPPING"), sql)
    }

    pub fn create_external_protocol(
        &self,
        protocol: &ExternalProtocol,
        meta: &ObjectMetadata,
    ) -> Block {
        let trusted = if protocol.trusted { "TRUSTED " } else { "" };
        let functions: Vec<String> = [
            ("readfunc", &protocol.read_function),
            ("writefunc", &protocol.write_function),
            ("validatorfunc", &protocol.validator),
        ]
        .into_iter()
        .filter_map(|(keyword, function)| {
            function
                .as_ref()
                .map(|function| format!("{keyword} = {}", function.qualified_name))
        })
        .collect();

        let mut sql = format!(
            "\n\nCREATE {trusted}PROTOCOL {} ({});\n",
            protocol.name,
            Comma(&functions)
        );
        sql.push_str(&self.object_metadata(meta, &protocol.name, "PROTOCOL", None));

        Block::new(MetadataEntry::new("", &protocol.name, "PROTOCOL"), sql)
    }
}
