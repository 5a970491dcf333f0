use regex::Regex;
use std::{fmt, sync::LazyLock};

/// A set of privilege bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Privileges(u16);

impl Privileges {
    pub const NONE: Privileges = Privileges(0);
    pub const SELECT: Privileges = Privileges(1 << 0);
    pub const INSERT: Privileges = Privileges(1 << 1);
    pub const UPDATE: Privileges = Privileges(1 << 2);
    pub const DELETE: Privileges = Privileges(1 << 3);
    pub const TRUNCATE: Privileges = Privileges(1 << 4);
    pub const REFERENCES: Privileges = Privileges(1 << 5);
    pub const TRIGGER: Privileges = Privileges(1 << 6);
    pub const EXECUTE: Privileges = Privileges(1 << 7);
    pub const USAGE: Privileges = Privileges(1 << 8);
    pub const CREATE: Privileges = Privileges(1 << 9);
    pub const TEMPORARY: Privileges = Privileges(1 << 10);
    pub const CONNECT: Privileges = Privileges(1 << 11);

    /// Every privilege in canonical GRANT order, with its keyword and its
    /// `aclitem` character.
    pub const CANONICAL: [(Privileges, &'static str, char); 12] = [
        (Privileges::SELECT, "SELECT", 'r'),
        (Privileges::INSERT, "INSERT", 'a'),
        (Privileges::UPDATE, "UPDATE", 'w'),
        (Privileges::DELETE, "DELETE", 'd'),
        (Privileges::TRUNCATE, "TRUNCATE", 'D'),
        (Privileges::REFERENCES, "REFERENCES", 'x'),
        (Privileges::TRIGGER, "TRIGGER", 't'),
        (Privileges::EXECUTE, "EXECUTE", 'X'),
        (Privileges::USAGE, "USAGE", 'U'),
        (Privileges::CREATE, "CREATE", 'C'),
        (Privileges::TEMPORARY, "TEMPORARY", 'T'),
        (Privileges::CONNECT, "CONNECT", 'c'),
    ];

    pub const fn union(self, other: Privileges) -> Privileges {
        Privileges(self.0 | other.0)
    }

    pub const fn contains(self, other: Privileges) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Privileges) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Privileges) {
        self.0 &= !other.0;
    }

    fn from_acl_char(c: char) -> Option<Privileges> {
        Privileges::CANONICAL
            .iter()
            .find(|(_, _, ch)| *ch == c)
            .map(|(bit, _, _)| *bit)
    }

    /// Keywords of the set bits, in canonical order.
    pub fn keywords(self) -> impl Iterator<Item = &'static str> {
        Privileges::CANONICAL
            .into_iter()
            .filter(move |(bit, _, _)| self.contains(*bit))
            .map(|(_, keyword, _)| keyword)
    }
}

impl std::ops::BitOr for Privileges {
    type Output = Privileges;

    fn bitor(self, rhs: Privileges) -> Privileges {
        self.union(rhs)
    }
}

/// Distinguishes a regular grant from the "all privileges revoked" marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AclKind {
    #[default]
    Default,

    /// The object has an ACL array with no entries: every privilege,
    /// including the owner's, was revoked.
    Empty,
}

/// One parsed `aclitem`: a grantee with the privileges granted to it.
///
/// A privilege is either in `granted` or in `grantable` (granted WITH GRANT
/// OPTION), never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Acl {
    /// Role name, already identifier-quoted. Empty means PUBLIC.
    pub grantee: String,
    pub granted: Privileges,
    pub grantable: Privileges,
    pub kind: AclKind,
}

const EMPTY_ACL: &str = "GRANTEE=/GRANTOR";

static ACL_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)=([a-zA-Z\*]*)/(.*)$").expect("valid regex"));

impl Acl {
    /// The marker for an object whose privileges were all revoked.
    pub fn empty() -> Acl {
        Acl {
            grantee: String::new(),
            granted: Privileges::NONE,
            grantable: Privileges::NONE,
            kind: AclKind::Empty,
        }
    }

    /// Parses the text form of an `aclitem`, `grantee=privs/grantor`.
    ///
    /// Characters are read left to right. A `*` promotes the privilege
    /// before it to WITH GRANT OPTION. Unknown characters are skipped.
    /// Returns `None` when the text is not shaped like an aclitem.
    pub fn parse(text: &str) -> Option<Acl> {
        if text == EMPTY_ACL {
            return Some(Acl::empty());
        }

        let captures = ACL_ITEM.captures(text)?;
        let mut acl = Acl {
            grantee: captures[1].to_string(),
            ..Acl::default()
        };

        let mut last: Option<Privileges> = None;
        for c in captures[2].chars() {
            if c == '*' {
                if let Some(bit) = last {
                    acl.granted.remove(bit);
                    acl.grantable.insert(bit);
                }
                continue;
            }
            last = Privileges::from_acl_char(c);
            if let Some(bit) = last {
                acl.granted.insert(bit);
            }
        }

        Some(acl)
    }

    /// The name to use in GRANT statements.
    pub fn grantee_or_public(&self) -> &str {
        if self.grantee.is_empty() {
            "PUBLIC"
        } else {
            &self.grantee
        }
    }
}

impl fmt::Display for Acl {
    /// Renders the aclitem text form with an empty grantor.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == AclKind::Empty {
            return f.write_str(EMPTY_ACL);
        }
        write!(f, "{}=", self.grantee)?;
        for (bit, _, c) in Privileges::CANONICAL {
            if self.granted.contains(bit) {
                write!(f, "{c}")?;
            } else if self.grantable.contains(bit) {
                write!(f, "{c}*")?;
            }
        }
        f.write_str("/")
    }
}

/// Sorts ACLs by grantee so emitted privileges are reproducible.
pub fn sort_acls(acls: &mut [Acl]) {
    acls.sort_by(|a, b| a.grantee.cmp(&b.grantee));
}

/// Privilege bits that make up `ALL` for each object type.
pub fn all_privileges_for(object_type: &str) -> Privileges {
    use Privileges as P;

    match object_type {
        "COLUMN" => P::SELECT | P::INSERT | P::UPDATE | P::REFERENCES,
        "DATABASE" => P::CREATE | P::TEMPORARY | P::CONNECT,
        "FOREIGN DATA WRAPPER" | "FOREIGN SERVER" | "LANGUAGE" | "TYPE" | "DOMAIN" => P::USAGE,
        "FOREIGN TABLE" => {
            P::SELECT | P::INSERT | P::UPDATE | P::DELETE | P::REFERENCES | P::TRIGGER
        }
        "FUNCTION" | "PROCEDURE" | "AGGREGATE" => P::EXECUTE,
        "PROTOCOL" => P::SELECT | P::INSERT,
        "SCHEMA" => P::USAGE | P::CREATE,
        "SEQUENCE" => P::SELECT | P::UPDATE | P::USAGE,
        "TABLE" | "VIEW" | "MATERIALIZED VIEW" => {
            P::SELECT | P::INSERT | P::UPDATE | P::DELETE | P::TRUNCATE | P::REFERENCES | P::TRIGGER
        }
        "TABLESPACE" => P::CREATE,
        _ => P::NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_grantable() {
        let acl = Acl::parse("gpadmin=arwdDxt*/gpadmin").unwrap();
        assert_eq!(acl.grantee, "gpadmin");
        assert!(acl.granted.contains(Privileges::SELECT | Privileges::TRUNCATE));
        assert!(!acl.granted.contains(Privileges::TRIGGER));
        assert_eq!(acl.grantable, Privileges::TRIGGER);
    }

    #[test]
    fn parse_public_grantee() {
        let acl = Acl::parse("=r/owner").unwrap();
        assert_eq!(acl.grantee_or_public(), "PUBLIC");
        assert_eq!(acl.granted, Privileges::SELECT);
    }

    #[test]
    fn parse_ignores_unknown_characters() {
        let acl = Acl::parse("role=rQm/owner").unwrap();
        assert_eq!(acl.granted, Privileges::SELECT);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Acl::parse("not an acl"), None);
    }

    #[test]
    fn empty_marker() {
        let acl = Acl::parse("GRANTEE=/GRANTOR").unwrap();
        assert_eq!(acl.kind, AclKind::Empty);
        assert_eq!(acl.to_string(), "GRANTEE=/GRANTOR");
    }

    #[test]
    fn text_form_round_trips() {
        for text in ["testrole=arwdDxt/", "=U*C/", "\"quoted role\"=X/", "r=arwdDxtXUCTc/"] {
            let acl = Acl::parse(text).unwrap();
            assert_eq!(Acl::parse(&acl.to_string()), Some(acl));
        }
    }

    #[test]
    fn keywords_are_canonical() {
        let privs = Privileges::CONNECT | Privileges::SELECT | Privileges::EXECUTE;
        assert_eq!(
            privs.keywords().collect::<Vec<_>>(),
            ["SELECT", "EXECUTE", "CONNECT"]
        );
    }
}
