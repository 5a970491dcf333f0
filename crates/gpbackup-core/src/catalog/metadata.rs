use super::{Acl, UniqueId};
use std::collections::HashMap;

/// Ownership, comment, security label and privileges of one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMetadata {
    pub privileges: Vec<Acl>,
    pub owner: String,
    pub comment: String,
    pub security_label_provider: String,
    pub security_label: String,
}

impl ObjectMetadata {
    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
            && self.owner.is_empty()
            && self.comment.is_empty()
            && self.security_label.is_empty()
    }
}

/// Metadata for every object of one or more kinds, keyed by identity.
pub type MetadataMap = HashMap<UniqueId, ObjectMetadata>;
