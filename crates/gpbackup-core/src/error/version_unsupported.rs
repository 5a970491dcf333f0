use super::Error;

/// Error when the connected database version falls outside the supported
/// range.
#[derive(Debug)]
pub(super) struct VersionUnsupported {
    version: Box<str>,
}

impl std::error::Error for VersionUnsupported {}

impl core::fmt::Display for VersionUnsupported {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "database version {} is not supported", self.version)
    }
}

impl Error {
    /// Creates a version unsupported error.
    pub fn version_unsupported(version: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::VersionUnsupported(VersionUnsupported {
            version: version.into().into(),
        }))
    }

    /// Returns `true` if this error is a version unsupported error.
    pub fn is_version_unsupported(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::VersionUnsupported(_)))
    }
}
