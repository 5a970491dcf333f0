use gpbackup_core::{
    catalog::{AttributeStatistic, Table},
    Catalog, Result,
};
use gpbackup_sql::{MetadataWriter, Printer};
use std::{collections::HashMap, io::Write};

/// Writes the planner statistics of `tables`, one entry per table.
/// External and foreign tables have none.
pub(crate) async fn backup_statistics<W: Write>(
    conn: &dyn Catalog,
    tables: &[Table],
    out: &mut MetadataWriter<'_, W>,
) -> Result<()> {
    let oids: Vec<u32> = tables
        .iter()
        .filter(|table| table.has_data())
        .map(|table| table.relation.oid)
        .collect();
    if oids.is_empty() {
        return Ok(());
    }

    let printer = Printer::new(conn.version());
    let mut attributes: HashMap<u32, Vec<AttributeStatistic>> = HashMap::new();
    for attribute in conn.attribute_statistics(&oids).await? {
        attributes.entry(attribute.oid).or_default().push(attribute);
    }

    for tuple in conn.tuple_statistics(&oids).await? {
        let columns = attributes.remove(&tuple.oid).unwrap_or_default();
        out.emit(printer.table_statistics(&tuple, &columns))?;
    }
    Ok(())
}
