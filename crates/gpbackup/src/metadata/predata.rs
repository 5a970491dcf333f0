use super::MetadataLookup;
use gpbackup_core::{
    catalog::{
        extract_language_functions, PartitionInfo, SortableObject, Table, TypeKind, UniqueId,
    },
    driver::{MetadataKind, Scope},
    sort::{topological_sort, Sortable},
    Catalog, Result,
};
use gpbackup_sql::{MetadataWriter, Printer};
use std::{
    collections::{HashMap, HashSet},
    io::Write,
};

use MetadataKind::*;

/// Writes the predata section: every object that must exist before data is
/// loaded.
///
/// `tables` are the tables whose DDL is backed up. With an include-table
/// filter only the objects tied to those tables are written.
pub(crate) async fn backup_predata<W: Write>(
    conn: &dyn Catalog,
    scope: &Scope,
    tables: &[Table],
    out: &mut MetadataWriter<'_, W>,
) -> Result<()> {
    tracing::info!("Writing pre-data metadata");
    let printer = Printer::new(conn.version());
    let table_only = scope.is_table_filtered();
    let schema_filtered = !scope.filters.include_schemas.is_empty();

    let kinds: &[MetadataKind] = if table_only {
        &[Relation, Constraint]
    } else {
        &[
            Schema,
            Extension,
            Language,
            Function,
            Aggregate,
            Type,
            Relation,
            ExternalProtocol,
            Collation,
            TextSearchParser,
            TextSearchTemplate,
            TextSearchDictionary,
            TextSearchConfiguration,
            Operator,
            OperatorFamily,
            OperatorClass,
            Conversion,
            Cast,
            ForeignDataWrapper,
            ForeignServer,
            Constraint,
        ]
    };
    let meta = MetadataLookup::load(conn, scope, kinds).await?;

    let mut sortable: Vec<SortableObject> = vec![];
    if !table_only {
        for schema in conn.schemas(scope).await? {
            out.emit(printer.create_schema(&schema, meta.get(Schema, schema.unique_id())))?;
        }
        for extension in conn.extensions(scope).await? {
            out.emit(printer.create_extension(&extension, meta.get(Extension, extension.unique_id())))?;
        }

        let languages = if schema_filtered {
            vec![]
        } else {
            conn.languages(scope).await?
        };
        let (language_functions, functions) =
            extract_language_functions(conn.functions(scope).await?, &languages);
        for function in &language_functions {
            out.emit(printer.create_function(function, meta.get(Function, function.unique_id())))?;
        }
        for language in &languages {
            out.emit_all(printer.create_language(language, meta.get(Language, language.unique_id())))?;
        }

        let types = conn.types(scope).await?;
        for ty in types.iter().filter(|ty| ty.needs_shell()) {
            out.emit(printer.create_shell_type(ty))?;
        }
        for ty in types.iter().filter(|ty| matches!(ty.kind, TypeKind::Enum(_))) {
            out.emit_all(printer.create_type(ty, meta.get(Type, ty.unique_id())))?;
        }

        sortable.extend(functions.into_iter().map(SortableObject::Function));
        sortable.extend(
            types
                .into_iter()
                .filter(|ty| !matches!(ty.kind, TypeKind::Enum(_) | TypeKind::Shell))
                .map(SortableObject::Type),
        );
        if !schema_filtered {
            sortable.extend(
                conn.external_protocols(scope)
                    .await?
                    .into_iter()
                    .map(SortableObject::Protocol),
            );
        }
        sortable.extend(
            conn.aggregates(scope)
                .await?
                .into_iter()
                .map(SortableObject::Aggregate),
        );
    }

    let sequences = conn.sequences(scope).await?;
    for sequence in &sequences {
        out.emit_all(printer.create_sequence(sequence, meta.get(Relation, sequence.relation.unique_id())))?;
    }

    sortable.extend(tables.iter().cloned().map(SortableObject::Table));
    sortable.extend(conn.views(scope).await?.into_iter().map(SortableObject::View));

    let dependencies = conn.dependencies(scope).await?;
    for object in sort_dependent_objects(sortable, &dependencies)? {
        match &object {
            SortableObject::Function(function) => {
                out.emit(printer.create_function(function, meta.get(Function, function.unique_id())))?
            }
            SortableObject::Type(ty) => {
                out.emit_all(printer.create_type(ty, meta.get(Type, ty.unique_id())))?
            }
            SortableObject::Table(table) => {
                out.emit(printer.create_table(table, meta.get(Relation, table.unique_id())))?
            }
            SortableObject::View(view) => {
                match printer.create_view(view, meta.get(Relation, view.unique_id())) {
                    Some(block) => out.emit(block)?,
                    None => tracing::warn!(
                        view = %view.fqn(),
                        "View {} was dropped during the backup and is skipped",
                        view.fqn()
                    ),
                }
            }
            SortableObject::Protocol(protocol) => out.emit(printer.create_external_protocol(
                protocol,
                meta.get(ExternalProtocol, protocol.unique_id()),
            ))?,
            SortableObject::Aggregate(aggregate) => out.emit(
                printer.create_aggregate(aggregate, meta.get(Aggregate, aggregate.unique_id())),
            )?,
        }
    }

    for sequence in &sequences {
        out.emit_all(printer.create_identity_column(sequence))?;
        out.emit_all(printer.sequence_owned_by(sequence))?;
    }

    let partitions = conn.partition_infos(scope).await?;
    let external: Vec<PartitionInfo> = partitions
        .iter()
        .filter(|partition| partition.is_external)
        .cloned()
        .collect();
    if !external.is_empty() {
        let by_rule: HashMap<u32, PartitionInfo> = partitions
            .into_iter()
            .map(|partition| (partition.rule_oid, partition))
            .collect();
        out.emit_all(printer.exchange_external_partitions(&external, &by_rule, tables))?;
    }

    if !table_only {
        backup_standalone_objects(conn, scope, &printer, &meta, out).await?;
    }

    for constraint in conn.constraints(scope).await? {
        out.emit(printer.create_constraint(&constraint, meta.get(Constraint, constraint.unique_id())))?;
    }

    tracing::info!("Pre-data metadata backup complete");
    Ok(())
}

/// Objects that only depend on things created earlier in the section.
async fn backup_standalone_objects<W: Write>(
    conn: &dyn Catalog,
    scope: &Scope,
    printer: &Printer<'_>,
    meta: &MetadataLookup,
    out: &mut MetadataWriter<'_, W>,
) -> Result<()> {
    for collation in conn.collations(scope).await? {
        out.emit(printer.create_collation(&collation, meta.get(Collation, collation.unique_id())))?;
    }

    for parser in conn.text_search_parsers(scope).await? {
        out.emit(printer.create_text_search_parser(
            &parser,
            meta.get(TextSearchParser, parser.unique_id()),
        ))?;
    }
    for template in conn.text_search_templates(scope).await? {
        out.emit(printer.create_text_search_template(
            &template,
            meta.get(TextSearchTemplate, template.unique_id()),
        ))?;
    }
    for dictionary in conn.text_search_dictionaries(scope).await? {
        out.emit(printer.create_text_search_dictionary(
            &dictionary,
            meta.get(TextSearchDictionary, dictionary.unique_id()),
        ))?;
    }
    for configuration in conn.text_search_configurations(scope).await? {
        out.emit_all(printer.create_text_search_configuration(
            &configuration,
            meta.get(TextSearchConfiguration, configuration.unique_id()),
        ))?;
    }

    for operator in conn.operators(scope).await? {
        out.emit(printer.create_operator(&operator, meta.get(Operator, operator.unique_id())))?;
    }
    for family in conn.operator_families(scope).await? {
        out.emit(printer.create_operator_family(&family, meta.get(OperatorFamily, family.unique_id())))?;
    }
    for class in conn.operator_classes(scope).await? {
        out.emit(printer.create_operator_class(&class, meta.get(OperatorClass, class.unique_id())))?;
    }

    for conversion in conn.conversions(scope).await? {
        out.emit(printer.create_conversion(&conversion, meta.get(Conversion, conversion.unique_id())))?;
    }
    for cast in conn.casts(scope).await? {
        out.emit(printer.create_cast(&cast, meta.get(Cast, cast.unique_id())))?;
    }
    let none = Default::default();
    for transform in conn.transforms(scope).await? {
        out.emit_all(printer.create_transform(&transform, &none))?;
    }

    for wrapper in conn.foreign_data_wrappers(scope).await? {
        out.emit(printer.create_foreign_data_wrapper(
            &wrapper,
            meta.get(ForeignDataWrapper, wrapper.unique_id()),
        ))?;
    }
    for server in conn.foreign_servers(scope).await? {
        out.emit(printer.create_foreign_server(&server, meta.get(ForeignServer, server.unique_id())))?;
    }
    for mapping in conn.user_mappings(scope).await? {
        out.emit(printer.create_user_mapping(&mapping))?;
    }
    Ok(())
}

/// Orders functions, types, tables, views, protocols and aggregates so each
/// comes after everything it depends on.
///
/// Dependencies on objects outside `objects` were either created earlier in
/// the section or are not part of this backup, so they are dropped and
/// logged at debug level.
pub(crate) fn sort_dependent_objects(
    mut objects: Vec<SortableObject>,
    dependencies: &HashMap<UniqueId, Vec<UniqueId>>,
) -> Result<Vec<SortableObject>> {
    let present: HashSet<UniqueId> = objects.iter().map(Sortable::unique_id).collect();
    for object in &mut objects {
        let id = object.unique_id();
        let (mut depends, mut dropped): (Vec<UniqueId>, Vec<UniqueId>) = object
            .depends_upon()
            .iter()
            .chain(dependencies.get(&id).into_iter().flatten())
            .copied()
            .filter(|dep| *dep != id)
            .partition(|dep| present.contains(dep));
        depends.sort();
        depends.dedup();
        dropped.sort();
        dropped.dedup();
        if !dropped.is_empty() {
            tracing::debug!(
                object = %object.fqn(),
                ?dropped,
                "dependencies outside the sorted set are ignored"
            );
        }
        object.set_depends_upon(depends);
    }
    topological_sort(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::catalog::{class, Function, Relation, View};
    use pretty_assertions::assert_eq;

    fn make_function(oid: u32, name: &str) -> SortableObject {
        SortableObject::Function(Function {
            oid,
            schema: "public".into(),
            name: name.into(),
            ..Function::default()
        })
    }

    fn make_view(oid: u32, name: &str) -> SortableObject {
        SortableObject::View(View {
            oid,
            schema: "public".into(),
            name: name.into(),
            definition: Some("SELECT 1".into()),
            ..View::default()
        })
    }

    fn make_table(oid: u32, name: &str) -> SortableObject {
        SortableObject::Table(Table {
            relation: Relation::new(oid, "public", name),
            ..Table::default()
        })
    }

    fn names(objects: &[SortableObject]) -> Vec<String> {
        objects.iter().map(Sortable::fqn).collect()
    }

    #[test]
    fn objects_follow_their_dependencies() {
        let objects = vec![make_view(30, "v"), make_table(20, "t"), make_function(10, "f")];
        let dependencies = HashMap::from([
            (
                UniqueId::new(class::PG_CLASS, 30),
                vec![UniqueId::new(class::PG_CLASS, 20)],
            ),
            (
                UniqueId::new(class::PG_CLASS, 20),
                vec![UniqueId::new(class::PG_PROC, 10)],
            ),
        ]);

        let sorted = sort_dependent_objects(objects, &dependencies).unwrap();
        assert_eq!(names(&sorted), ["public.f", "public.t", "public.v"]);
    }

    #[test]
    fn dependencies_outside_the_set_are_ignored() {
        let objects = vec![make_table(20, "t"), make_function(10, "f")];
        let dependencies = HashMap::from([(
            UniqueId::new(class::PG_CLASS, 20),
            vec![
                UniqueId::new(class::PG_TYPE, 999),
                UniqueId::new(class::PG_PROC, 10),
            ],
        )]);
        let sorted = sort_dependent_objects(objects, &dependencies).unwrap();
        assert_eq!(names(&sorted), ["public.f", "public.t"]);
        assert_eq!(sorted[1].depends_upon(), [UniqueId::new(class::PG_PROC, 10)]);
    }

    #[test]
    fn cycles_are_reported() {
        let objects = vec![make_view(1, "a"), make_view(2, "b")];
        let dependencies = HashMap::from([
            (UniqueId::new(class::PG_CLASS, 1), vec![UniqueId::new(class::PG_CLASS, 2)]),
            (UniqueId::new(class::PG_CLASS, 2), vec![UniqueId::new(class::PG_CLASS, 1)]),
        ]);
        let err = sort_dependent_objects(objects, &dependencies).unwrap_err();
        assert!(err.is_dependency_cycle());
    }
}
