use super::Error;

/// Error when the COPY of a single table fails.
///
/// This is the only non-fatal kind: the table is marked failed and the
/// remaining tables are still attempted.
#[derive(Debug)]
pub(super) struct CopyFailed {
    table: Box<str>,
    message: Box<str>,
}

impl std::error::Error for CopyFailed {}

impl core::fmt::Display for CopyFailed {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "COPY of {} failed: {}", self.table, self.message)
    }
}

impl Error {
    /// Creates a COPY failure for `table`.
    pub fn copy_failed(table: impl Into<String>, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::CopyFailed(CopyFailed {
            table: table.into().into(),
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a COPY failure.
    pub fn is_copy_failed(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::CopyFailed(_)))
    }
}
