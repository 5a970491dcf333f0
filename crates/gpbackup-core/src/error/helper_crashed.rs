use super::Error;

/// Error when a segment helper process exits unexpectedly.
#[derive(Debug)]
pub(super) struct HelperCrashed {
    content: i32,
    message: Box<str>,
}

impl std::error::Error for HelperCrashed {}

impl core::fmt::Display for HelperCrashed {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "helper process on segment {} failed: {}",
            self.content, self.message
        )
    }
}

impl Error {
    /// Creates a helper failure for the segment with content id `content`.
    pub fn helper_crashed(content: i32, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::HelperCrashed(HelperCrashed {
            content,
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a helper failure.
    pub fn is_helper_crashed(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::HelperCrashed(_)))
    }
}
