use super::Error;
use std::path::{Path, PathBuf};

/// Error when a coordinator artifact (TOC, manifest, history, metadata file)
/// cannot be read or written.
///
/// Failures on these files leave the backup set unusable, so they always
/// abort the run.
#[derive(Debug)]
pub(super) struct ArtifactIo {
    path: PathBuf,
    inner: std::io::Error,
}

impl std::error::Error for ArtifactIo {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl core::fmt::Display for ArtifactIo {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "artifact {}: {}", self.path.display(), self.inner)
    }
}

impl Error {
    /// Creates an artifact I/O error for the file at `path`.
    pub fn artifact_io(path: impl AsRef<Path>, err: std::io::Error) -> Error {
        Error::from(super::ErrorKind::ArtifactIo(ArtifactIo {
            path: path.as_ref().to_path_buf(),
            inner: err,
        }))
    }

    /// Returns `true` if this error is an artifact I/O error.
    pub fn is_artifact_io(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::ArtifactIo(_)))
    }
}
