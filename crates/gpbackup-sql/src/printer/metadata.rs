use super::{Block, Printer};
use gpbackup_core::{
    catalog::{all_privileges_for, escape_single_quotes, Acl, DefaultPrivileges, ObjectMetadata, Privileges},
    toc::MetadataEntry,
};

/// Privileges granted plainly and WITH GRANT OPTION, rendered for a `GRANT`.
///
/// A set holding every privilege `object_type` supports renders as `ALL`;
/// otherwise keywords are listed in canonical order, comma separated.
/// `EXECUTE` is only ever granted as part of `ALL`.
pub fn privilege_strings(acl: &Acl, object_type: &str) -> (String, String) {
    let all = all_privileges_for(object_type);
    let render = |privileges: Privileges| {
        if !all.is_empty() && privileges.contains(all) {
            return "ALL".to_string();
        }
        privileges
            .keywords()
            .filter(|keyword| *keyword != "EXECUTE")
            .collect::<Vec<_>>()
            .join(",")
    };
    (render(acl.granted), render(acl.grantable))
}

impl Printer<'_> {
    /// `REVOKE`/`GRANT` statements reproducing the object's ACL, or an empty
    /// string when the object has default privileges.
    pub fn privileges(
        &self,
        meta: &ObjectMetadata,
        name: &str,
        object_type: &str,
        column: Option<&str>,
    ) -> String {
        if meta.privileges.is_empty() {
            return String::new();
        }

        let type_str = match object_type {
            "VIEW" | "MATERIALIZED VIEW" | "FOREIGN TABLE" => String::new(),
            "COLUMN" => "TABLE ".to_string(),
            _ => format!("{object_type} "),
        };
        let column_str = column.map(|c| format!("({c}) ")).unwrap_or_default();
        let target = format!("{column_str}ON {type_str}{name}");

        let mut statements = vec![format!("REVOKE ALL {target} FROM PUBLIC;")];
        if !meta.owner.is_empty() {
            statements.push(format!("REVOKE ALL {target} FROM {};", meta.owner));
        }
        for acl in &meta.privileges {
            let grantee = acl.grantee_or_public();
            let (granted, grantable) = privilege_strings(acl, object_type);
            if !granted.is_empty() {
                statements.push(format!("GRANT {granted} {target} TO {grantee};"));
            }
            if !grantable.is_empty() {
                statements.push(format!(
                    "GRANT {grantable} {target} TO {grantee} WITH GRANT OPTION;"
                ));
            }
        }

        format!("\n\n{}", statements.join("\n"))
    }

    pub fn owner(&self, meta: &ObjectMetadata, name: &str, object_type: &str) -> String {
        if meta.owner.is_empty() {
            return String::new();
        }
        let type_str = match object_type {
            "SEQUENCE" | "VIEW" if self.version.before("6") => "TABLE",
            "FOREIGN SERVER" => "SERVER",
            _ => object_type,
        };
        format!("\n\nALTER {type_str} {name} OWNER TO {};", meta.owner)
    }

    pub fn comment(
        &self,
        meta: &ObjectMetadata,
        name: &str,
        object_type: &str,
        owning_table: Option<&str>,
    ) -> String {
        if meta.comment.is_empty() {
            return String::new();
        }
        let table_str = owning_table.map(|t| format!(" ON {t}")).unwrap_or_default();
        format!(
            "\n\nCOMMENT ON {object_type} {name}{table_str} IS '{}';",
            escape_single_quotes(&meta.comment)
        )
    }

    pub fn security_label(&self, meta: &ObjectMetadata, name: &str, object_type: &str) -> String {
        if meta.security_label.is_empty() {
            return String::new();
        }
        format!(
            "\n\nSECURITY LABEL FOR {} ON {object_type} {name} IS '{}';",
            meta.security_label_provider,
            escape_single_quotes(&meta.security_label)
        )
    }

    /// Comment, owner, privileges and security label of one object, each on
    /// its own line.
    pub fn object_metadata(
        &self,
        meta: &ObjectMetadata,
        name: &str,
        object_type: &str,
        owning_table: Option<&str>,
    ) -> String {
        let mut out = String::new();
        for statement in [
            self.comment(meta, name, object_type, owning_table),
            self.owner(meta, name, object_type),
            self.privileges(meta, name, object_type, None),
            self.security_label(meta, name, object_type),
        ] {
            if !statement.is_empty() {
                out.push_str(&statement);
                out.push('\n');
            }
        }
        out
    }

    /// `ALTER DEFAULT PRIVILEGES` statements for one role, schema and kind.
    pub fn default_privileges(&self, privileges: &DefaultPrivileges) -> Block {
        let object_type = privileges.object_type.keyword();

        let mut prefix = "ALTER DEFAULT PRIVILEGES".to_string();
        if !privileges.owner.is_empty() {
            fmt!(prefix, " FOR ROLE {}", privileges.owner);
        }
        if !privileges.schema.is_empty() {
            fmt!(prefix, " IN SCHEMA {}", privileges.schema);
        }

        let mut statements = vec![format!("{prefix} REVOKE ALL ON {object_type}S FROM PUBLIC;")];
        if !privileges.owner.is_empty() {
            statements.push(format!(
                "{prefix} REVOKE ALL ON {object_type}S FROM {};",
                privileges.owner
            ));
        }
        for acl in &privileges.privileges {
            let grantee = acl.grantee_or_public();
            let (granted, grantable) = privilege_strings(acl, object_type);
            if !granted.is_empty() {
                statements.push(format!("{prefix} GRANT {granted} ON {object_type}S TO {grantee};"));
            }
            if !grantable.is_empty() {
                statements.push(format!(
                    "{prefix} GRANT {grantable} ON {object_type}S TO {grantee} WITH GRANT OPTION;"
                ));
            }
        }

        Block::new(
            MetadataEntry::new(&privileges.schema, "", "DEFAULT PRIVILEGES"),
            format!("\n\n{}\n", statements.join("\n")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbackup_core::version::DbVersion;

    fn acl(text: &str) -> Acl {
        Acl::parse(text).unwrap()
    }

    #[test]
    fn all_is_type_specific() {
        let full = acl("alice=arwdDxt/bob");
        assert_eq!(privilege_strings(&full, "TABLE").0, "ALL");
        assert_eq!(
            privilege_strings(&full, "FOREIGN TABLE").0,
            "SELECT,INSERT,UPDATE,DELETE,TRUNCATE,REFERENCES,TRIGGER"
        );
        assert_eq!(privilege_strings(&acl("alice=X/bob"), "FUNCTION").0, "ALL");
        assert_eq!(privilege_strings(&acl("alice=U/bob"), "CAST").0, "USAGE");
    }

    #[test]
    fn execute_is_never_listed_alone() {
        let (granted, grantable) = privilege_strings(&acl("alice=X/bob"), "TABLE");
        assert_eq!(granted, "");
        assert_eq!(grantable, "");
    }

    #[test]
    fn revoked_everything() {
        let version = DbVersion::from_release("6.20.0").unwrap();
        let meta = ObjectMetadata {
            privileges: vec![Acl::empty()],
            owner: "owner".into(),
            ..ObjectMetadata::default()
        };
        assert_eq!(
            Printer::new(&version).privileges(&meta, "public.t", "TABLE", None),
            "\n\nREVOKE ALL ON TABLE public.t FROM PUBLIC;\nREVOKE ALL ON TABLE public.t FROM owner;"
        );
    }

    #[test]
    fn sequence_owner_before_6() {
        let meta = ObjectMetadata {
            owner: "owner".into(),
            ..ObjectMetadata::default()
        };
        let v5 = DbVersion::from_release("5.28.0").unwrap();
        let v6 = DbVersion::from_release("6.0.0").unwrap();
        assert_eq!(
            Printer::new(&v5).owner(&meta, "public.s", "SEQUENCE"),
            "\n\nALTER TABLE public.s OWNER TO owner;"
        );
        assert_eq!(
            Printer::new(&v6).owner(&meta, "public.s", "SEQUENCE"),
            "\n\nALTER SEQUENCE public.s OWNER TO owner;"
        );
    }
}
