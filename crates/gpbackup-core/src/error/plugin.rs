use super::Error;

/// Error when the storage plugin reports an API version older than the one
/// this engine requires.
#[derive(Debug)]
pub(super) struct PluginIncompatible {
    found: Box<str>,
    required: Box<str>,
}

impl std::error::Error for PluginIncompatible {}

impl core::fmt::Display for PluginIncompatible {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "plugin API version {} is incompatible; at least {} is required",
            self.found, self.required
        )
    }
}

/// Error when a plugin command exits non-zero.
#[derive(Debug)]
pub(super) struct PluginIo {
    message: Box<str>,
}

impl std::error::Error for PluginIo {}

impl core::fmt::Display for PluginIo {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "plugin command failed: {}", self.message)
    }
}

impl Error {
    /// Creates a plugin version mismatch error.
    pub fn plugin_incompatible(found: impl Into<String>, required: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::PluginIncompatible(PluginIncompatible {
            found: found.into().into(),
            required: required.into().into(),
        }))
    }

    /// Returns `true` if this error is a plugin version mismatch.
    pub fn is_plugin_incompatible(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::PluginIncompatible(_)))
    }

    /// Creates a plugin I/O error.
    pub fn plugin_io(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::PluginIo(PluginIo {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a plugin I/O error.
    pub fn is_plugin_io(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::PluginIo(_)))
    }
}
