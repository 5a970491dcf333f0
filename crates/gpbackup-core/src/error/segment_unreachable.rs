use super::Error;

/// Error when one or more hosts could not run a dispatched command.
#[derive(Debug)]
pub(super) struct SegmentUnreachable {
    message: Box<str>,
}

impl std::error::Error for SegmentUnreachable {}

impl core::fmt::Display for SegmentUnreachable {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "segment unreachable: {}", self.message)
    }
}

impl Error {
    /// Creates a segment unreachable error.
    pub fn segment_unreachable(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::SegmentUnreachable(SegmentUnreachable {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a segment unreachable error.
    pub fn is_segment_unreachable(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::SegmentUnreachable(_)))
    }
}
