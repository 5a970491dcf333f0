use super::{dollar_quote, set_clause, Block, Printer};
use gpbackup_core::{
    catalog::{
        escape_single_quotes, make_fqn, Aggregate, AggregateKind, Cast, CastContext, CastMethod,
        Conversion, Extension, FinalModify, Function, FunctionExecLocation, FunctionRef, Language,
        ObjectMetadata, Parallel, Transform, Volatility,
    },
    toc::MetadataEntry,
};

fn qualified(function: &Option<FunctionRef>) -> &str {
    function
        .as_ref()
        .map(|f| f.qualified_name.as_str())
        .unwrap_or_default()
}

impl Printer<'_> {
    pub fn create_function(&self, function: &Function, meta: &ObjectMetadata) -> Block {
        let fqn = make_fqn(&function.schema, &function.name);
        let mut sql = String::new();

        match &function.result_type {
            Some(result) => fmt!(
                sql,
                "\n\nCREATE FUNCTION {fqn}({}) RETURNS {result} AS",
                function.arguments
            ),
            None => fmt!(sql, "\n\nCREATE PROCEDURE {fqn}({}) AS", function.arguments),
        }

        // probin holds either nothing or "-" when there is no library
        if !function.binary_path.is_empty() && function.binary_path != "-" {
            fmt!(sql, "\n'{}', '{}'\n", function.binary_path, function.body);
        } else {
            fmt!(sql, "\n{}\n", dollar_quote(&function.body));
        }
        fmt!(sql, "LANGUAGE {}", function.language);
        self.function_modifiers(&mut sql, function);
        sql.push_str(";\n");

        let object_type = function.object_type();
        let signature = format!("{fqn}({})", function.ident_args);
        sql.push_str(&self.object_metadata(meta, &signature, object_type, None));

        Block::new(
            MetadataEntry::new(
                &function.schema,
                format!("{}({})", function.name, function.ident_args),
                object_type,
            ),
            sql,
        )
    }

    fn function_modifiers(&self, sql: &mut String, function: &Function) {
        if self.version.before("7") {
            if let Some(access) = function.data_access {
                fmt!(sql, " {}", access.keyword());
            }
        }
        match function.volatility {
            Volatility::Immutable => sql.push_str(" IMMUTABLE"),
            Volatility::Stable => sql.push_str(" STABLE"),
            Volatility::Volatile => {}
        }
        match function.exec_location {
            FunctionExecLocation::Coordinator if self.version.before("7") => {
                sql.push_str(" EXECUTE ON MASTER")
            }
            FunctionExecLocation::Coordinator => sql.push_str(" EXECUTE ON COORDINATOR"),
            FunctionExecLocation::AllSegments => sql.push_str(" EXECUTE ON ALL SEGMENTS"),
            FunctionExecLocation::InitPlan => sql.push_str(" EXECUTE ON INITPLAN"),
            FunctionExecLocation::Any => {}
        }
        if function.is_window {
            sql.push_str(" WINDOW");
        }
        if function.is_strict {
            sql.push_str(" STRICT");
        }
        if function.is_leakproof {
            sql.push_str(" LEAKPROOF");
        }
        if function.is_security_definer {
            sql.push_str(" SECURITY DEFINER");
        }
        if function.cost != 0.0 && function.cost != function.default_cost() {
            fmt!(sql, "\nCOST {}", function.cost);
        }
        if function.returns_set && function.rows != 0.0 && function.rows != 1000.0 {
            fmt!(sql, "\nROWS {}", function.rows);
        }
        if self.version.at_least("7") {
            if !function.transform_types.is_empty() {
                fmt!(sql, "\nTRANSFORM {}\n", function.transform_types);
            }
            if !function.planner_support.is_empty() && function.planner_support != "-" {
                fmt!(sql, "\nSUPPORT {}", function.planner_support);
            }
            // Procedures take no parallel clause
            if !function.is_procedure() {
                fmt!(sql, " PARALLEL {}", function.parallel.keyword());
            }
        }
        if !function.config.is_empty() {
            let settings: Vec<String> = function.config.iter().map(|s| set_clause(s)).collect();
            fmt!(sql, "\n{}", settings.join(" "));
        }
    }

    pub fn create_aggregate(&self, aggregate: &Aggregate, meta: &ObjectMetadata) -> Block {
        let mut sql = String::new();
        let ordered = if aggregate.is_ordered { "ORDERED " } else { "" };
        let arguments = if aggregate.arguments.is_empty() {
            "*"
        } else {
            aggregate.arguments.as_str()
        };

        fmt!(
            sql,
            "\n\nCREATE {ordered}AGGREGATE {}.{}({arguments}) (\n",
            aggregate.schema,
            aggregate.name
        );
        fmt!(sql, "\tSFUNC = {},\n", qualified(&aggregate.transition_function));
        fmt!(sql, "\tSTYPE = {}", aggregate.transition_type);

        if aggregate.transition_space != 0 {
            fmt!(sql, ",\n\tSSPACE = {}", aggregate.transition_space);
        }
        for (keyword, function) in [
            ("PREFUNC", &aggregate.preliminary_function),
            ("COMBINEFUNC", &aggregate.combine_function),
            ("SERIALFUNC", &aggregate.serial_function),
            ("DESERIALFUNC", &aggregate.deserial_function),
            ("FINALFUNC", &aggregate.final_function),
        ] {
            if let Some(function) = function {
                fmt!(sql, ",\n\t{keyword} = {}", function.qualified_name);
            }
        }
        if aggregate.final_func_extra {
            sql.push_str(",\n\tFINALFUNC_EXTRA");
        }
        if let Some(initial) = &aggregate.initial_value {
            fmt!(sql, ",\n\tINITCOND = '{}'", escape_single_quotes(initial));
        }
        if !aggregate.sort_operator.is_empty() {
            fmt!(sql, ",\n\tSORTOP = {}", aggregate.sort_operator);
        }
        if aggregate.kind == AggregateKind::Hypothetical {
            sql.push_str(",\n\tHYPOTHETICAL");
        }

        if let Some(function) = &aggregate.m_transition_function {
            fmt!(sql, ",\n\tMSFUNC = {}", function.qualified_name);
        }
        if let Some(function) = &aggregate.m_inverse_transition_function {
            fmt!(sql, ",\n\tMINVFUNC = {}", function.qualified_name);
        }
        if !aggregate.m_transition_type.is_empty() {
            fmt!(sql, ",\n\tMSTYPE = {}", aggregate.m_transition_type);
        }
        if aggregate.m_transition_space != 0 {
            fmt!(sql, ",\n\tMSSPACE = {}", aggregate.m_transition_space);
        }
        if let Some(function) = &aggregate.m_final_function {
            fmt!(sql, ",\n\tMFINALFUNC = {}", function.qualified_name);
        }
        if aggregate.m_final_func_extra {
            sql.push_str(",\n\tMFINALFUNC_EXTRA");
        }
        if let Some(initial) = &aggregate.m_initial_value {
            fmt!(sql, ",\n\tMINITCOND = '{}'", escape_single_quotes(initial));
        }

        if self.version.at_least("7") {
            let default = if aggregate.kind == AggregateKind::OrderedSet {
                FinalModify::ReadWrite
            } else {
                FinalModify::ReadOnly
            };
            for (keyword, modify) in [
                ("FINALFUNC_MODIFY", aggregate.final_modify),
                ("MFINALFUNC_MODIFY", aggregate.m_final_modify),
            ] {
                let modify = modify.unwrap_or(default);
                if modify != default {
                    fmt!(sql, ",\n\t{keyword} = {}", modify.keyword());
                }
            }
        }
        if let Some(parallel) = aggregate.parallel {
            fmt!(sql, ",\n\tPARALLEL = {}", parallel.keyword());
        }
        sql.push_str("\n);\n");

        let ident_args = if aggregate.ident_args.is_empty() {
            "*"
        } else {
            aggregate.ident_args.as_str()
        };
        let signature = format!(
            "{}({ident_args})",
            make_fqn(&aggregate.schema, &aggregate.name)
        );
        sql.push_str(&self.object_metadata(meta, &signature, "AGGREGATE", None));

        Block::new(
            MetadataEntry::new(
                &aggregate.schema,
                format!("{}({ident_args})", aggregate.name),
                "AGGREGATE",
            ),
            sql,
        )
    }

    pub fn create_cast(&self, cast: &Cast, meta: &ObjectMetadata) -> Block {
        let fqn = cast.fqn();
        let mut sql = format!("\n\nCREATE CAST {fqn}\n");
        match cast.method {
            CastMethod::InOut => sql.push_str("\tWITH INOUT"),
            CastMethod::Binary => sql.push_str("\tWITHOUT FUNCTION"),
            CastMethod::Function => {
                let function = cast.function.as_ref().map(FunctionRef::fqn).unwrap_or_default();
                fmt!(sql, "\tWITH FUNCTION {function}");
            }
        }
        match cast.context {
            CastContext::Assignment => sql.push_str("\nAS ASSIGNMENT"),
            CastContext::Implicit => sql.push_str("\nAS IMPLICIT"),
            CastContext::Explicit => {}
        }
        sql.push(';');
        sql.push_str(&self.object_metadata(meta, &fqn, "CAST", None));

        Block::new(MetadataEntry::new("", fqn, "CAST"), sql)
    }

    pub fn create_extension(&self, extension: &Extension, meta: &ObjectMetadata) -> Block {
        let mut sql = format!(
            "\n\nSET search_path={schema},pg_catalog;\nCREATE EXTENSION IF NOT EXISTS {} WITH SCHEMA {schema};\nSET search_path=pg_catalog;",
            extension.name,
            schema = extension.schema,
        );
        sql.push_str(&self.object_metadata(meta, &extension.name, "EXTENSION", None));

        Block::new(MetadataEntry::new("", &extension.name, "EXTENSION"), sql)
    }

    /// The language itself, then a block handing its support functions to
    /// the language owner together with the language's own metadata.
    pub fn create_language(&self, language: &Language, meta: &ObjectMetadata) -> Vec<Block> {
        let mut sql = "\n\nCREATE ".to_string();
        if self.version.at_least("6") {
            sql.push_str("OR REPLACE ");
        }
        if language.trusted {
            sql.push_str("TRUSTED ");
        }
        fmt!(sql, "PROCEDURAL LANGUAGE {}", language.name);

        let mut alter = String::new();
        for (keyword, function) in [
            ("HANDLER", &language.handler),
            ("INLINE", &language.inline),
            ("VALIDATOR", &language.validator),
        ] {
            let Some(function) = function else { continue };
            fmt!(sql, " {keyword} {}", function.qualified_name);
            if !language.owner.is_empty() {
                fmt!(
                    alter,
                    "\nALTER FUNCTION {} OWNER TO {};",
                    function.fqn(),
                    language.owner
                );
            }
        }
        sql.push(';');

        let entry = MetadataEntry::new("", &language.name, "LANGUAGE");
        let mut blocks = vec![Block::new(entry.clone(), sql)];

        alter.push_str(&self.object_metadata(meta, &language.name, "LANGUAGE", None));
        if !alter.is_empty() {
            blocks.push(Block::new(entry, alter));
        }
        blocks
    }

    /// `None` when neither conversion function exists; such a transform
    /// cannot be recreated.
    pub fn create_transform(&self, transform: &Transform, meta: &ObjectMetadata) -> Option<Block> {
        let type_fqn = transform.type_fqn();
        if transform.from_sql.is_none() && transform.to_sql.is_none() {
            tracing::warn!(
                r#type = %type_fqn,
                language = %transform.language,
                "skipping invalid transform; at least one of FROM and TO functions should be specified"
            );
            return None;
        }

        let mut clauses = vec![];
        match &transform.from_sql {
            Some(function) => clauses.push(format!("FROM SQL WITH FUNCTION {}", function.fqn())),
            None => tracing::warn!(r#type = %type_fqn, language = %transform.language, "no FROM function found for transform"),
        }
        match &transform.to_sql {
            Some(function) => clauses.push(format!("TO SQL WITH FUNCTION {}", function.fqn())),
            None => tracing::warn!(r#type = %type_fqn, language = %transform.language, "no TO function found for transform"),
        }

        let name = format!("FOR {type_fqn} LANGUAGE {}", transform.language);
        let mut sql = format!("\n\nCREATE TRANSFORM {name} ({});", clauses.join(", "));
        sql.push_str(&self.object_metadata(meta, &name, "TRANSFORM", None));

        Some(Block::new(MetadataEntry::new("", name, "TRANSFORM"), sql))
    }

    pub fn create_conversion(&self, conversion: &Conversion, meta: &ObjectMetadata) -> Block {
        let fqn = conversion.fqn();
        let default = if conversion.is_default { " DEFAULT" } else { "" };
        let mut sql = format!(
            "\n\nCREATE{default} CONVERSION {fqn} FOR '{}' TO '{}' FROM {};",
            conversion.for_encoding, conversion.to_encoding, conversion.function
        );
        sql.push_str(&self.object_metadata(meta, &fqn, "CONVERSION", None));

        Block::new(
            MetadataEntry::new(&conversion.schema, &conversion.name, "CONVERSION"),
            sql,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::version::DbVersion;
    use pretty_assertions::assert_eq;

    fn function() -> Function {
        Function {
            oid: 1,
            schema: "public".into(),
            name: "add".into(),
            arguments: "integer, integer".into(),
            ident_args: "integer, integer".into(),
            result_type: Some("integer".into()),
            body: "SELECT $1 + $2".into(),
            ..Function::default()
        }
    }

    #[test]
    fn sql_function() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let mut f = function();
        f.volatility = Volatility::Immutable;
        f.is_strict = true;
        let block = Printer::new(&version).create_function(&f, &ObjectMetadata::default());
        assert_eq!(
            block.sql,
            "\n\nCREATE FUNCTION public.add(integer, integer) RETURNS integer AS\n$_$SELECT $1 + $2$_$\nLANGUAGE sql IMMUTABLE STRICT;\n"
        );
        assert_eq!(block.entry.name, "add(integer, integer)");
        assert_eq!(block.entry.objecttype, "FUNCTION");
    }

    #[test]
    fn c_function_with_cost() {
        let version = DbVersion::from_release("7.1.0").unwrap();
        let mut f = function();
        f.language = "c".into();
        f.binary_path = "$libdir/add".into();
        f.body = "add_ints".into();
        f.cost = 5.0;
        f.parallel = Parallel::Safe;
        let block = Printer::new(&version).create_function(&f, &ObjectMetadata::default());
        assert_eq!(
            block.sql,
            "\n\nCREATE FUNCTION public.add(integer, integer) RETURNS integer AS\n'$libdir/add', 'add_ints'\nLANGUAGE c\nCOST 5 PARALLEL SAFE;\n"
        );
    }

    #[test]
    fn set_returning_rows() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let mut f = function();
        f.returns_set = true;
        f.rows = 1000.0;
        let printer = Printer::new(&version);
        assert!(!printer.create_function(&f, &ObjectMetadata::default()).sql.contains("ROWS"));
        f.rows = 20.0;
        assert!(printer
            .create_function(&f, &ObjectMetadata::default())
            .sql
            .contains("\nROWS 20;"));
    }

    #[test]
    fn aggregate_without_arguments() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let aggregate = Aggregate {
            schema: "public".into(),
            name: "agg".into(),
            transition_function: Some(FunctionRef {
                qualified_name: "public.step".into(),
                ..FunctionRef::default()
            }),
            transition_type: "integer".into(),
            initial_value: Some("0".into()),
            ..Aggregate::default()
        };
        let block = Printer::new(&version).create_aggregate(&aggregate, &ObjectMetadata::default());
        assert_eq!(
            block.sql,
            "\n\nCREATE AGGREGATE public.agg(*) (\n\tSFUNC = public.step,\n\tSTYPE = integer,\n\tINITCOND = '0'\n);\n"
        );
        assert_eq!(block.entry.name, "agg(*)");
    }

    #[test]
    fn cast_with_function() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let cast = Cast {
            source_type: "text".into(),
            target_type: "integer".into(),
            method: CastMethod::Function,
            context: CastContext::Implicit,
            function: Some(FunctionRef {
                qualified_name: "public.to_int".into(),
                arguments: "text".into(),
                ..FunctionRef::default()
            }),
            ..Cast::default()
        };
        let block = Printer::new(&version).create_cast(&cast, &ObjectMetadata::default());
        assert_eq!(
            block.sql,
            "\n\nCREATE CAST (text AS integer)\n\tWITH FUNCTION public.to_int(text)\nAS IMPLICIT;"
        );
    }

    #[test]
    fn transform_without_functions_is_skipped() {
        let version = DbVersion::from_release("7.0.0").unwrap();
        let transform = Transform {
            type_schema: "public".into(),
            type_name: "hstore".into(),
            language: "plperl".into(),
            ..Transform::default()
        };
        assert!(Printer::new(&version)
            .create_transform(&transform, &ObjectMetadata::default())
            .is_none());
    }
}
