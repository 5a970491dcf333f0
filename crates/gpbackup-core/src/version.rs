//! Database version detection.

use crate::{Error, Result};
use regex::Regex;
use std::{fmt, sync::LazyLock};

/// Oldest release a backup can be taken from.
pub const MINIMUM_VERSION: semver::Version = semver::Version::new(5, 1, 0);

/// Newest major release the catalog queries know about.
pub const MAXIMUM_MAJOR: u64 = 7;

/// The release of the connected cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DbVersion {
    pub semver: semver::Version,
    /// The full `SELECT version()` text.
    pub version_string: String,
}

static RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(Greenplum Database ([0-9]+\.[0-9]+\.[0-9]+[^ )]*)").expect("valid regex")
});

impl DbVersion {
    /// Parses the output of `SELECT version()`.
    ///
    /// The release is read from the `(Greenplum Database X.Y.Z ...)` part;
    /// suffixes such as `-beta.1` or `+dev.3.gabc` are kept as pre-release
    /// and build metadata.
    pub fn parse(version_string: &str) -> Result<DbVersion> {
        let Some(captures) = RELEASE.captures(version_string) else {
            return Err(Error::unexpected_shape(format!(
                "cannot find a Greenplum Database release in version string {version_string:?}"
            )));
        };
        let semver = semver::Version::parse(&captures[1])?;

        Ok(DbVersion {
            semver,
            version_string: version_string.to_string(),
        })
    }

    /// Builds a version from a bare `X.Y.Z`; used by tests and callers that
    /// already know the release.
    pub fn from_release(release: &str) -> Result<DbVersion> {
        Ok(DbVersion {
            semver: semver::Version::parse(release)?,
            version_string: format!("PostgreSQL (Greenplum Database {release})"),
        })
    }

    /// Fails unless the release is one the catalog queries support.
    pub fn ensure_supported(&self) -> Result<()> {
        let release = self.release();
        if release < MINIMUM_VERSION || self.semver.major > MAXIMUM_MAJOR {
            return Err(Error::version_unsupported(self.semver.to_string()));
        }
        Ok(())
    }

    pub fn major(&self) -> u64 {
        self.semver.major
    }

    /// `true` when the cluster is at least `target`, which may name only a
    /// major (`"6"`) or a major and minor (`"6.2"`).
    pub fn at_least(&self, target: &str) -> bool {
        self.release() >= expand(target)
    }

    pub fn before(&self, target: &str) -> bool {
        !self.at_least(target)
    }

    /// `true` when the cluster's major release is exactly `major`.
    pub fn is(&self, major: u64) -> bool {
        self.semver.major == major
    }

    fn release(&self) -> semver::Version {
        semver::Version::new(self.semver.major, self.semver.minor, self.semver.patch)
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.semver, f)
    }
}

fn expand(target: &str) -> semver::Version {
    let mut parts = target
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0));
    semver::Version::new(
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}
