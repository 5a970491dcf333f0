use super::Error;

/// Error when an object depends on something that is not part of the input
/// set.
#[derive(Debug)]
pub(super) struct DanglingDependency {
    object: Box<str>,
    missing: Box<str>,
}

impl std::error::Error for DanglingDependency {}

impl core::fmt::Display for DanglingDependency {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{} depends on {}, which is not part of the backup set",
            self.object, self.missing
        )
    }
}

impl Error {
    /// Creates a dangling dependency error.
    pub fn dangling_dependency(object: impl Into<String>, missing: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::DanglingDependency(DanglingDependency {
            object: object.into().into(),
            missing: missing.into().into(),
        }))
    }

    /// Returns `true` if this error is a dangling dependency error.
    pub fn is_dangling_dependency(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::DanglingDependency(_)))
    }
}
