use super::Error;

/// Error when a catalog query returns a result of the wrong shape, such as
/// zero rows where one is mandatory.
#[derive(Debug)]
pub(super) struct UnexpectedShape {
    message: Box<str>,
}

impl std::error::Error for UnexpectedShape {}

impl core::fmt::Display for UnexpectedShape {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "unexpected query result: {}", self.message)
    }
}

impl Error {
    /// Creates an unexpected shape error.
    pub fn unexpected_shape(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::UnexpectedShape(UnexpectedShape {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is an unexpected shape error.
    pub fn is_unexpected_shape(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::UnexpectedShape(_)))
    }
}
