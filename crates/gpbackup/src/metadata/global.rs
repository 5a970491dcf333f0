use super::MetadataLookup;
use gpbackup_core::{
    driver::{MetadataKind, Scope},
    options::BackupOptions,
    Catalog, Result,
};
use gpbackup_sql::{MetadataWriter, Printer};
use std::io::Write;

/// Writes the global section: session settings, then cluster-wide objects.
pub(crate) async fn backup_global<W: Write>(
    conn: &dyn Catalog,
    scope: &Scope,
    options: &BackupOptions,
    out: &mut MetadataWriter<'_, W>,
) -> Result<()> {
    tracing::info!("Writing global database metadata");
    let printer = Printer::new(conn.version());

    out.emit(printer.session_gucs(&conn.session_gucs().await?))?;
    if options.without_globals {
        return Ok(());
    }

    let mut kinds = vec![MetadataKind::Tablespace, MetadataKind::Database];
    if options.backs_up_globals() {
        kinds.extend([
            MetadataKind::ResourceQueue,
            MetadataKind::ResourceGroup,
            MetadataKind::Role,
        ]);
    }
    let meta = MetadataLookup::load(conn, scope, &kinds).await?;

    for tablespace in conn.tablespaces().await? {
        out.emit(printer.create_tablespace(
            &tablespace,
            meta.get(MetadataKind::Tablespace, tablespace.unique_id()),
        ))?;
    }

    let database = conn.current_database().await?;
    out.emit_all(printer.create_database(
        &database,
        meta.get(MetadataKind::Database, database.unique_id()),
    ))?;
    out.emit_all(printer.database_gucs(&database.name, &conn.database_gucs().await?))?;

    if !options.backs_up_globals() {
        return Ok(());
    }

    for queue in conn.resource_queues().await? {
        out.emit(printer.create_resource_queue(
            &queue,
            meta.get(MetadataKind::ResourceQueue, queue.unique_id()),
        ))?;
    }
    for group in conn.resource_groups().await? {
        out.emit(printer.create_resource_group(
            &group,
            meta.get(MetadataKind::ResourceGroup, group.unique_id()),
        ))?;
    }

    for role in conn.roles().await? {
        out.emit(printer.create_role(&role, meta.get(MetadataKind::Role, role.unique_id())))?;
    }
    for gucs in conn.role_gucs().await? {
        out.emit(printer.role_gucs(&gucs))?;
    }
    for member in conn.role_members().await? {
        out.emit(printer.grant_role(&member))?;
    }

    tracing::info!("Global database metadata backup complete");
    Ok(())
}
