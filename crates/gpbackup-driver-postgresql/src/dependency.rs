use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{
    catalog::{class, UniqueId},
    driver::Scope,
    Result,
};
use std::collections::HashMap;

/// First oid handed out to user objects.
const FIRST_NORMAL_OID: u32 = 16384;

const SORTED_CLASSES: &str =
    "'pg_proc'::regclass, 'pg_type'::regclass, 'pg_class'::regclass, 'pg_extprotocol'::regclass";

pub(crate) fn dependencies_query() -> String {
    format!(
        "SELECT d.classid, d.objid, d.refclassid, d.refobjid
FROM pg_depend d
WHERE d.deptype = 'n'
AND d.classid IN ({SORTED_CLASSES})
AND d.refclassid IN ({SORTED_CLASSES})
AND d.objid >= {FIRST_NORMAL_OID}
AND d.refobjid >= {FIRST_NORMAL_OID}
UNION
SELECT 'pg_class'::regclass::oid AS classid, r.ev_class AS objid, d.refclassid, d.refobjid
FROM pg_depend d
JOIN pg_rewrite r ON r.oid = d.objid
WHERE d.classid = 'pg_rewrite'::regclass
AND d.deptype = 'n'
AND r.ev_class <> d.refobjid
AND d.refclassid IN ({SORTED_CLASSES})
AND d.refobjid >= {FIRST_NORMAL_OID}"
    )
}

const TYPE_LINKS_QUERY: &str = "SELECT t.oid,
	t.typrelid,
	coalesce(c.relkind::text, '') AS relkind,
	CASE WHEN t.typelem <> 0 AND t.typlen = -1 THEN t.typelem ELSE 0 END AS elem
FROM pg_type t
LEFT JOIN pg_class c ON c.oid = t.typrelid
WHERE t.oid >= 16384";

/// Maps catalog rows onto the objects that are actually sorted: composite
/// type relations to their type, table row types to their table and array
/// types to their element type.
#[derive(Debug, Default)]
pub(crate) struct TypeLinks {
    composite_type_of_relation: HashMap<u32, u32>,
    relation_of_row_type: HashMap<u32, u32>,
    element_of_array: HashMap<u32, u32>,
}

impl TypeLinks {
    pub(crate) fn add(&mut self, type_oid: u32, relation: u32, relkind: &str, element: u32) {
        if element != 0 {
            self.element_of_array.insert(type_oid, element);
        }
        match relkind {
            "" => {}
            "c" => {
                self.composite_type_of_relation.insert(relation, type_oid);
            }
            _ => {
                self.relation_of_row_type.insert(type_oid, relation);
            }
        }
    }

    pub(crate) fn normalize(&self, id: UniqueId) -> UniqueId {
        match id.class_id {
            class::PG_CLASS => match self.composite_type_of_relation.get(&id.oid) {
                Some(&ty) => UniqueId::new(class::PG_TYPE, ty),
                None => id,
            },
            class::PG_TYPE => {
                let mut oid = id.oid;
                while let Some(&element) = self.element_of_array.get(&oid) {
                    oid = element;
                }
                match self.relation_of_row_type.get(&oid) {
                    Some(&relation) => UniqueId::new(class::PG_CLASS, relation),
                    None => UniqueId::new(class::PG_TYPE, oid),
                }
            }
            _ => id,
        }
    }
}

/// Collects normalized edges, dropping self references and duplicates.
pub(crate) fn collect_edges(
    links: &TypeLinks,
    raw: impl IntoIterator<Item = (UniqueId, UniqueId)>,
) -> HashMap<UniqueId, Vec<UniqueId>> {
    let mut edges: HashMap<UniqueId, Vec<UniqueId>> = HashMap::new();
    for (object, reference) in raw {
        let object = links.normalize(object);
        let reference = links.normalize(reference);
        if object == reference {
            continue;
        }
        let deps = edges.entry(object).or_default();
        if !deps.contains(&reference) {
            deps.push(reference);
        }
    }
    for deps in edges.values_mut() {
        deps.sort();
    }
    edges
}

/// Edges are returned for every user object; the caller keeps the ones
/// between objects it is about to sort.
pub(crate) async fn dependencies(
    db: &PostgreSQL,
    _scope: &Scope,
) -> Result<HashMap<UniqueId, Vec<UniqueId>>> {
    let mut links = TypeLinks::default();
    for row in db.query(TYPE_LINKS_QUERY).await? {
        links.add(
            row.oid("oid")?,
            row.oid("typrelid")?,
            &row.text("relkind")?,
            row.oid("elem")?,
        );
    }

    let mut raw = vec![];
    for row in db.query(&dependencies_query()).await? {
        raw.push((
            UniqueId::new(row.oid("classid")?, row.oid("objid")?),
            UniqueId::new(row.oid("refclassid")?, row.oid("refobjid")?),
        ));
    }
    Ok(collect_edges(&links, raw))
}
