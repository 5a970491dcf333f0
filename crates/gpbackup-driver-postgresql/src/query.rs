use gpbackup_core::{catalog::escape_single_quotes, version::DbVersion, Error, Result};
use postgres_types::FromSql;
use tokio_postgres::Row;

/// Typed column access that reports failures as catalog errors.
pub(crate) trait RowExt {
    fn get_as<'a, T: FromSql<'a>>(&'a self, column: &str) -> Result<T>;

    /// A text column where NULL reads as empty.
    fn text(&self, column: &str) -> Result<String> {
        Ok(self.get_as::<Option<String>>(column)?.unwrap_or_default())
    }

    fn oid(&self, column: &str) -> Result<u32> {
        Ok(self.get_as::<Option<u32>>(column)?.unwrap_or_default())
    }

    fn flag(&self, column: &str) -> Result<bool> {
        Ok(self.get_as::<Option<bool>>(column)?.unwrap_or_default())
    }

    fn int(&self, column: &str) -> Result<i32> {
        Ok(self.get_as::<Option<i32>>(column)?.unwrap_or_default())
    }

    fn texts(&self, column: &str) -> Result<Vec<String>> {
        Ok(self.get_as::<Option<Vec<String>>>(column)?.unwrap_or_default())
    }
}

impl RowExt for Row {
    fn get_as<'a, T: FromSql<'a>>(&'a self, column: &str) -> Result<T> {
        self.try_get(column).map_err(|err| {
            Error::catalog_unavailable(err).context(format!("reading column {column}"))
        })
    }
}

/// Picks the fragment for the newest release `version` has reached.
///
/// Fragments are listed newest first; the last one, keyed by an empty
/// release, serves every older version.
pub(crate) fn by_version<T: Clone>(version: &DbVersion, fragments: &[(&str, T)]) -> T {
    let index = fragments
        .iter()
        .position(|(release, _)| release.is_empty() || version.at_least(release))
        .unwrap_or(fragments.len() - 1);
    fragments[index].1.clone()
}

pub(crate) fn literal(value: &str) -> String {
    format!("'{}'", escape_single_quotes(value))
}

pub(crate) fn literal_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| literal(value.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn oid_list(oids: &[u32]) -> String {
    oids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Settings whose values are lists or keywords and must not be quoted.
const UNQUOTED_SETTINGS: &[&str] = &["search_path", "DateStyle", "temp_tablespaces"];

/// Turns a stored `name=value` setting into one whose value can be pasted
/// after `SET name TO`.
pub(crate) fn quote_setting(setting: &str) -> String {
    match setting.split_once('=') {
        Some((name, value)) if UNQUOTED_SETTINGS.iter().any(|s| s.eq_ignore_ascii_case(name)) => {
            format!("{name}={value}")
        }
        Some((name, value)) => format!("{name}={}", literal(value)),
        None => setting.to_string(),
    }
}

/// `quote_ident(opt) || ' ' || quote_literal(value)` over an options array,
/// comma-separated.
pub(crate) fn options_clause(column: &str) -> String {
    format!(
        "coalesce(array_to_string(ARRAY(SELECT pg_catalog.quote_ident(option_name) || ' ' || pg_catalog.quote_literal(option_value) FROM pg_options_to_table({column}) ORDER BY option_name), ', '), '')"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn version(release: &str) -> DbVersion {
        DbVersion::from_release(release).unwrap()
    }

    #[test]
    fn newest_reached_fragment_wins() {
        let fragments = [("7", "seven"), ("6.2", "six-two"), ("", "old")];
        assert_eq!(by_version(&version("7.1.0"), &fragments), "seven");
        assert_eq!(by_version(&version("6.26.0"), &fragments), "six-two");
        assert_eq!(by_version(&version("6.1.0"), &fragments), "old");
        assert_eq!(by_version(&version("5.28.0"), &fragments), "old");
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(literal_list(&["a", "o'brien"]), "'a','o''brien'");
        assert_eq!(oid_list(&[1, 22, 333]), "1,22,333");
    }

    #[test]
    fn settings_are_quoted_unless_listed() {
        assert_eq!(quote_setting("work_mem=64MB"), "work_mem='64MB'");
        assert_eq!(
            quote_setting("search_path=public, \"$user\""),
            "search_path=public, \"$user\""
        );
        assert_eq!(quote_setting("datestyle=ISO, MDY"), "datestyle=ISO, MDY");
    }
}
