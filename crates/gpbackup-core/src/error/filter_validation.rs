use super::Error;

/// Error when an include or exclude filter is rejected.
///
/// This occurs when:
/// - A table name is not of the form `schema.table`
/// - An included schema or table does not exist
/// - An intermediate partition is named in a filter
/// - Conflicting flags are combined
#[derive(Debug)]
pub(super) struct FilterValidation {
    message: Box<str>,
}

impl std::error::Error for FilterValidation {}

impl core::fmt::Display for FilterValidation {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    /// Creates a filter validation error.
    pub fn filter_validation(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::FilterValidation(FilterValidation {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a filter validation error.
    pub fn is_filter_validation(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::FilterValidation(_)))
    }
}
