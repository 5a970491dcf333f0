use super::{Block, Comma, Fields, Printer};
use gpbackup_core::{
    catalog::{
        escape_single_quotes, BaseType, Collation, CompositeType, DomainType, EnumType,
        ObjectMetadata, RangeType, Type, TypeKind,
    },
    toc::MetadataEntry,
};

impl Printer<'_> {
    /// Placeholder created before the input and output functions of a base
    /// or range type, which refer to the type by name.
    pub fn create_shell_type(&self, ty: &Type) -> Block {
        Block::new(
            MetadataEntry::new(&ty.schema, &ty.name, "TYPE"),
            format!("\n\nCREATE TYPE {};\n", ty.fqn()),
        )
    }

    /// Full definition of a non-shell type. Shell types print nothing here.
    pub fn create_type(&self, ty: &Type, meta: &ObjectMetadata) -> Option<Block> {
        let fqn = ty.fqn();
        let mut sql = match &ty.kind {
            TypeKind::Base(base) => self.base_type(&fqn, base),
            TypeKind::Composite(composite) => composite_type(&fqn, composite),
            TypeKind::Enum(labels) => enum_type(&fqn, labels),
            TypeKind::Domain(domain) => domain_type(&fqn, domain),
            TypeKind::Range(range) => range_type(&fqn, range),
            TypeKind::Shell => return None,
        };

        sql.push_str(&self.object_metadata(meta, &fqn, ty.object_type(), None));

        // Attribute comments follow the type so the attributes exist
        if let TypeKind::Composite(composite) = &ty.kind {
            for attribute in composite.attributes.iter().filter(|a| !a.comment.is_empty()) {
                fmt!(
                    sql,
                    "\n\nCOMMENT ON COLUMN {fqn}.{} IS '{}';\n",
                    attribute.name,
                    escape_single_quotes(&attribute.comment)
                );
            }
        }

        Some(Block::new(
            MetadataEntry::new(&ty.schema, &ty.name, ty.object_type()),
            sql,
        ))
    }

    fn base_type(&self, fqn: &str, base: &BaseType) -> String {
        let mut fields = vec![
            format!("INPUT = {}", base.input),
            format!("OUTPUT = {}", base.output),
        ];
        for (keyword, function) in [
            ("RECEIVE", &base.receive),
            ("SEND", &base.send),
            ("TYPMOD_IN", &base.mod_in),
            ("TYPMOD_OUT", &base.mod_out),
        ] {
            if !function.is_empty() {
                fields.push(format!("{keyword} = {function}"));
            }
        }
        if base.internal_length > 0 {
            fields.push(format!("INTERNALLENGTH = {}", base.internal_length));
        }
        if base.passed_by_value {
            fields.push("PASSEDBYVALUE".to_string());
        }
        let alignment = match base.alignment.as_str() {
            "d" => Some("double"),
            "i" => Some("int4"),
            "s" => Some("int2"),
            _ => None,
        };
        if let Some(alignment) = alignment {
            fields.push(format!("ALIGNMENT = {alignment}"));
        }
        let storage = match base.storage.as_str() {
            "e" => Some("external"),
            "m" => Some("main"),
            "x" => Some("extended"),
            _ => None,
        };
        if let Some(storage) = storage {
            fields.push(format!("STORAGE = {storage}"));
        }
        if !base.default.is_empty() {
            fields.push(format!("DEFAULT = '{}'", escape_single_quotes(&base.default)));
        }
        if !base.element.is_empty() {
            fields.push(format!("ELEMENT = {}", base.element));
        }
        if !base.delimiter.is_empty() {
            fields.push(format!("DELIMITER = '{}'", escape_single_quotes(&base.delimiter)));
        }
        if !base.category.is_empty() && base.category != "U" {
            fields.push(format!("CATEGORY = '{}'", base.category));
        }
        if base.preferred {
            fields.push("PREFERRED = true".to_string());
        }
        if base.collatable {
            fields.push("COLLATABLE = true".to_string());
        }

        let mut sql = format!("\n\nCREATE TYPE {fqn} (\n\t{}\n);\n", Fields(&fields));
        if !base.storage_options.is_empty() {
            fmt!(
                sql,
                "\nALTER TYPE {fqn}\n\tSET DEFAULT ENCODING ({});\n",
                base.storage_options
            );
        }
        sql
    }

    pub fn create_collation(&self, collation: &Collation, meta: &ObjectMetadata) -> Block {
        let fqn = collation.fqn();
        let mut options = vec![
            format!("LC_COLLATE = '{}'", collation.collate),
            format!("LC_CTYPE = '{}'", collation.ctype),
        ];
        if self.version.at_least("7") {
            if !collation.provider.is_empty() {
                let provider = match collation.provider.as_str() {
                    "c" => "libc",
                    "i" => "icu",
                    _ => "default",
                };
                options.push(format!("PROVIDER = '{provider}'"));
            }
            if collation.is_deterministic == Some(false) {
                options.push("DETERMINISTIC = 'false'".to_string());
            }
        }

        let mut sql = format!("\n\nCREATE COLLATION {fqn} ({});\n", Comma(&options));
        sql.push_str(&self.object_metadata(meta, &fqn, "COLLATION", None));

        Block::new(
            MetadataEntry::new(&collation.schema, &collation.name, "COLLATION"),
            sql,
        )
    }
}

fn composite_type(fqn: &str, composite: &CompositeType) -> String {
    let attributes: Vec<String> = composite
        .attributes
        .iter()
        .map(|attribute| {
            let mut line = format!("\t{} {}", attribute.name, attribute.ty);
            if !attribute.collation.is_empty() {
                fmt!(line, " COLLATE {}", attribute.collation);
            }
            line
        })
        .collect();
    format!("\n\nCREATE TYPE {fqn} AS (\n{}\n);\n", attributes.join(",\n"))
}

fn enum_type(fqn: &str, labels: &EnumType) -> String {
    format!("\n\nCREATE TYPE {fqn} AS ENUM (\n\t{}\n);\n", labels.labels)
}

fn domain_type(fqn: &str, domain: &DomainType) -> String {
    let mut sql = format!("\n\nCREATE DOMAIN {fqn} AS {}", domain.base_type);
    if !domain.default.is_empty() {
        fmt!(sql, " DEFAULT {}", domain.default);
    }
    if !domain.collation.is_empty() {
        fmt!(sql, " COLLATE {}", domain.collation);
    }
    if domain.not_null {
        sql.push_str(" NOT NULL");
    }
    for constraint in &domain.constraints {
        fmt!(sql, "\n\tCONSTRAINT {} {}", constraint.name, constraint.def);
    }
    sql.push_str(";\n");
    sql
}

fn range_type(fqn: &str, range: &RangeType) -> String {
    let mut fields = vec![format!("SUBTYPE = {}", range.subtype)];
    for (keyword, value) in [
        ("SUBTYPE_OPCLASS", &range.subtype_opclass),
        ("COLLATION", &range.collation),
        ("CANONICAL", &range.canonical),
        ("SUBTYPE_DIFF", &range.subtype_diff),
    ] {
        if !value.is_empty() {
            fields.push(format!("{keyword} = {value}"));
        }
    }
    format!("\n\nCREATE TYPE {fqn} AS RANGE (\n\t{}\n);\n", Fields(&fields))
}
