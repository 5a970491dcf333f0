use super::MetadataLookup;
use gpbackup_core::{
    driver::{MetadataKind, Scope},
    Catalog, Result,
};
use gpbackup_sql::{MetadataWriter, Printer};
use std::io::Write;

/// Writes the postdata section. Default privileges come last so they do
/// not apply to objects created by the restore itself.
pub(crate) async fn backup_postdata<W: Write>(
    conn: &dyn Catalog,
    scope: &Scope,
    out: &mut MetadataWriter<'_, W>,
) -> Result<()> {
    tracing::info!("Writing post-data metadata");
    let printer = Printer::new(conn.version());
    let database_wide = !scope.is_table_filtered();

    let meta = MetadataLookup::load(
        conn,
        scope,
        &[
            MetadataKind::Index,
            MetadataKind::Rule,
            MetadataKind::Trigger,
            MetadataKind::EventTrigger,
        ],
    )
    .await?;

    for index in conn.indexes(scope).await? {
        out.emit_all(printer.create_index(&index, meta.get(MetadataKind::Index, index.unique_id())))?;
    }
    for rule in conn.rules(scope).await? {
        out.emit_all(printer.create_rule(&rule, meta.get(MetadataKind::Rule, rule.unique_id())))?;
    }
    for trigger in conn.triggers(scope).await? {
        out.emit_all(printer.create_trigger(&trigger, meta.get(MetadataKind::Trigger, trigger.unique_id())))?;
    }

    if database_wide {
        for trigger in conn.event_triggers(scope).await? {
            out.emit_all(printer.create_event_trigger(
                &trigger,
                meta.get(MetadataKind::EventTrigger, trigger.unique_id()),
            ))?;
        }
        for privileges in conn.default_privileges(scope).await? {
            out.emit(printer.default_privileges(&privileges))?;
        }
    }

    tracing::info!("Post-data metadata backup complete");
    Ok(())
}
