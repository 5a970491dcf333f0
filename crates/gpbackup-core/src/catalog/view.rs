use super::{class, make_fqn, UniqueId};

/// A view or materialized view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub oid: u32,
    pub schema: String,
    pub name: String,

    /// Rendered ` WITH (...)` clause including its leading space.
    pub options: String,

    /// Output of `pg_get_viewdef`. `None` if the view disappeared while the
    /// definition was being read.
    pub definition: Option<String>,

    pub tablespace: String,
    pub is_materialized: bool,
    pub dist_policy: String,
    pub depends_upon: Vec<UniqueId>,
}

impl View {
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_CLASS, self.oid)
    }

    pub fn object_type(&self) -> &'static str {
        if self.is_materialized {
            "MATERIALIZED VIEW"
        } else {
            "VIEW"
        }
    }
}
