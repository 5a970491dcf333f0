use super::Error;

/// Error when the object dependency graph contains a cycle.
///
/// The residual subgraph is written to the log before this error is
/// returned; the message only summarizes it.
#[derive(Debug)]
pub(super) struct DependencyCycle {
    message: Box<str>,
}

impl std::error::Error for DependencyCycle {}

impl core::fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "dependency resolution failed: {}", self.message)
    }
}

impl Error {
    /// Creates a dependency cycle error.
    pub fn dependency_cycle(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::DependencyCycle(DependencyCycle {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a dependency cycle error.
    pub fn is_dependency_cycle(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::DependencyCycle(_)))
    }
}
