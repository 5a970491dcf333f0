//! Reading catalog objects and writing the DDL sections of the metadata
//! file.

mod global;
pub(crate) use global::backup_global;

mod postdata;
pub(crate) use postdata::backup_postdata;

mod predata;
pub(crate) use predata::{backup_predata, sort_dependent_objects};

mod statistics;
pub(crate) use statistics::backup_statistics;

use gpbackup_core::{
    catalog::{MetadataMap, ObjectMetadata, UniqueId},
    driver::{MetadataKind, Scope},
    Catalog, Result,
};
use std::collections::HashMap;

/// Owner, comment, label and grants of every object of the loaded kinds.
#[derive(Debug, Default)]
pub(crate) struct MetadataLookup {
    maps: HashMap<MetadataKind, MetadataMap>,
    empty: ObjectMetadata,
}

impl MetadataLookup {
    pub async fn load(conn: &dyn Catalog, scope: &Scope, kinds: &[MetadataKind]) -> Result<MetadataLookup> {
        let mut lookup = MetadataLookup::default();
        for kind in kinds {
            let map = conn.object_metadata(scope, *kind).await?;
            lookup.maps.insert(*kind, map);
        }
        Ok(lookup)
    }

    /// Metadata of `id`; objects without any have the empty metadata.
    pub fn get(&self, kind: MetadataKind, id: UniqueId) -> &ObjectMetadata {
        self.maps
            .get(&kind)
            .and_then(|map| map.get(&id))
            .unwrap_or(&self.empty)
    }

    #[cfg(test)]
    pub fn insert(&mut self, kind: MetadataKind, id: UniqueId, meta: ObjectMetadata) {
        self.maps.entry(kind).or_default().insert(id, meta);
    }
}
