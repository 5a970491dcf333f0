use super::Error;

/// Error when an incremental backup has no prior backup with matching
/// flags to build upon.
#[derive(Debug)]
pub(super) struct IncrementalNoMatch {
    message: Box<str>,
}

impl std::error::Error for IncrementalNoMatch {}

impl core::fmt::Display for IncrementalNoMatch {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "no base backup for incremental: {}", self.message)
    }
}

impl Error {
    /// Creates an incremental-no-match error.
    pub fn incremental_no_match(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::IncrementalNoMatch(IncrementalNoMatch {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is an incremental-no-match error.
    pub fn is_incremental_no_match(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::IncrementalNoMatch(_)))
    }
}
