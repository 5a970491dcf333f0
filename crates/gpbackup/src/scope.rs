use gpbackup_core::{
    driver::Scope,
    filter::{check_empty_schemas, expand_partitions, validate_relations, validate_schemas},
    options::BackupOptions,
    Catalog, Result,
};

/// Checks the filters against the catalog and resolves the relation
/// filters to oids.
pub(crate) async fn resolve(conn: &dyn Catalog, options: &BackupOptions) -> Result<Scope> {
    let filters = options.filters.clone();
    let mut scope = Scope {
        leaf_partition_data: options.leaf_partition_data,
        ..Scope::default()
    };

    let schemas: Vec<String> = filters
        .include_schemas
        .iter()
        .chain(&filters.exclude_schemas)
        .cloned()
        .collect();
    if !schemas.is_empty() {
        let existing = conn.existing_schemas(&schemas).await?;
        validate_schemas(&filters, &existing)?;
    }

    let relations: Vec<String> = filters
        .include_relations
        .iter()
        .chain(&filters.exclude_relations)
        .cloned()
        .collect();
    if !relations.is_empty() {
        let found = conn.lookup_relations(&relations).await?;
        let (include, exclude) = validate_relations(&filters, &found)?;
        scope.exclude_oids = exclude;
        if !include.is_empty() {
            let links = conn.partition_links().await?;
            scope.include_oids = expand_partitions(&include, &links, options.leaf_partition_data);
        }
    }

    scope.filters = filters;

    if !scope.filters.include_schemas.is_empty() {
        let counts = conn.schema_object_counts(&scope).await?;
        check_empty_schemas(&scope.filters, &counts, options.strict_filters)?;
    }

    tracing::debug!(
        included = scope.include_oids.len(),
        excluded = scope.exclude_oids.len(),
        "resolved backup scope"
    );
    Ok(scope)
}
