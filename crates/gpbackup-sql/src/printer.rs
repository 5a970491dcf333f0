#[macro_use]
mod fmt;

mod delim;
use delim::{Comma, Fields};

// Printers by object kind
mod external;
mod foreign;
mod function;
mod global;
mod metadata;
mod operator;
mod postdata;
mod relation;
mod sequence;
mod statistics;
mod text_search;
mod types;

pub use metadata::privilege_strings;

use gpbackup_core::{toc::MetadataEntry, version::DbVersion};

/// A run of SQL text and the TOC entry that will cover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub entry: MetadataEntry,
    pub sql: String,
}

impl Block {
    pub fn new(entry: MetadataEntry, sql: impl Into<String>) -> Block {
        Block {
            entry,
            sql: sql.into(),
        }
    }
}

/// Renders catalog objects as the DDL that recreates them.
///
/// Printers never touch the output file; they return [`Block`]s which a
/// [`MetadataWriter`](crate::MetadataWriter) writes and records. Output
/// differs between server releases, so each printer consults the version of
/// the cluster being backed up.
#[derive(Debug, Clone, Copy)]
pub struct Printer<'a> {
    version: &'a DbVersion,
}

impl<'a> Printer<'a> {
    pub fn new(version: &'a DbVersion) -> Printer<'a> {
        Printer { version }
    }

    pub fn version(&self) -> &DbVersion {
        self.version
    }
}

/// Wraps `body` in the shortest `$_..$` quote that does not occur in it.
pub fn dollar_quote(body: &str) -> String {
    let mut tag = String::from("$");
    while body.contains(&tag) {
        tag.push('_');
    }
    format!("{tag}${body}{tag}$")
}

/// `SET name TO value` for a `name=value` setting as stored in the catalog.
pub(crate) fn set_clause(setting: &str) -> String {
    match setting.split_once('=') {
        Some((name, value)) => format!("SET {name} TO {value}"),
        None => format!("SET {setting}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_quote_picks_unused_tag() {
        assert_eq!(dollar_quote("SELECT 1"), "$$SELECT 1$$");
        assert_eq!(dollar_quote("SELECT '$1'"), "$_$SELECT '$1'$_$");
        assert_eq!(dollar_quote("$ and $_"), "$__$$ and $_$__$");
    }

    #[test]
    fn set_clause_splits_at_first_equals() {
        assert_eq!(set_clause("search_path=public, \"$user\""), "SET search_path TO public, \"$user\"");
        assert_eq!(set_clause("opt=a=b"), "SET opt TO a=b");
    }
}
