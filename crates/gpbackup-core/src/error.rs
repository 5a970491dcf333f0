mod adhoc;
mod artifact_io;
mod catalog_unavailable;
mod copy_failed;
mod dangling_dependency;
mod dependency_cycle;
mod filter_validation;
mod helper_crashed;
mod incremental_no_match;
mod plugin;
mod segment_unreachable;
mod unexpected_shape;
mod version_unsupported;

use adhoc::AdhocError;
use artifact_io::ArtifactIo;
use catalog_unavailable::CatalogUnavailable;
use copy_failed::CopyFailed;
use dangling_dependency::DanglingDependency;
use dependency_cycle::DependencyCycle;
use filter_validation::FilterValidation;
use helper_crashed::HelperCrashed;
use incremental_no_match::IncrementalNoMatch;
use plugin::{PluginIncompatible, PluginIo};
use segment_unreachable::SegmentUnreachable;
use std::sync::Arc;
use unexpected_shape::UnexpectedShape;
use version_unsupported::VersionUnsupported;

/// Returns early with an ad hoc [`Error`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// Builds an ad hoc [`Error`] from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// An error raised while taking a backup.
///
/// The error is a single pointer wide. Callers wrap lower level failures with
/// [`Error::context`] so the rendered message reads from the outermost
/// operation down to the root cause.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context is shown first,
    /// followed by earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }

        match err.inner.as_mut().and_then(Arc::get_mut) {
            Some(inner) if inner.cause.is_none() => {
                inner.cause = Some(self);
                err
            }
            // The consequent is shared or already chained; wrap it instead of
            // rewriting its cause.
            _ => Error {
                inner: Some(Arc::new(ErrorInner {
                    kind: ErrorKind::Adhoc(AdhocError::new(err.to_string())),
                    cause: Some(self),
                })),
            },
        }
    }

    /// Returns the innermost error of the chain.
    pub fn root(&self) -> &Error {
        let mut last = self;
        for err in self.chain() {
            last = err;
        }
        last
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    /// Returns `true` if any error in the chain matches `pred`.
    fn any_kind(&self, pred: impl Fn(&ErrorKind) -> bool) -> bool {
        self.chain().any(|err| pred(err.kind()))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }

    /// Returns `true` when the error must abort the whole backup.
    ///
    /// Per-table COPY failures are recorded and the run continues; everything
    /// else unwinds to the cleanup hook.
    pub fn is_fatal(&self) -> bool {
        !self.is_copy_failed()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            ErrorKind::CatalogUnavailable(err) => Some(err),
            ErrorKind::ArtifactIo(err) => Some(err),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    ArtifactIo(ArtifactIo),
    CatalogUnavailable(CatalogUnavailable),
    CopyFailed(CopyFailed),
    DanglingDependency(DanglingDependency),
    DependencyCycle(DependencyCycle),
    FilterValidation(FilterValidation),
    HelperCrashed(HelperCrashed),
    IncrementalNoMatch(IncrementalNoMatch),
    PluginIncompatible(PluginIncompatible),
    PluginIo(PluginIo),
    SegmentUnreachable(SegmentUnreachable),
    UnexpectedShape(UnexpectedShape),
    VersionUnsupported(VersionUnsupported),
    Unknown,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            ArtifactIo(err) => core::fmt::Display::fmt(err, f),
            CatalogUnavailable(err) => core::fmt::Display::fmt(err, f),
            CopyFailed(err) => core::fmt::Display::fmt(err, f),
            DanglingDependency(err) => core::fmt::Display::fmt(err, f),
            DependencyCycle(err) => core::fmt::Display::fmt(err, f),
            FilterValidation(err) => core::fmt::Display::fmt(err, f),
            HelperCrashed(err) => core::fmt::Display::fmt(err, f),
            IncrementalNoMatch(err) => core::fmt::Display::fmt(err, f),
            PluginIncompatible(err) => core::fmt::Display::fmt(err, f),
            PluginIo(err) => core::fmt::Display::fmt(err, f),
            SegmentUnreachable(err) => core::fmt::Display::fmt(err, f),
            UnexpectedShape(err) => core::fmt::Display::fmt(err, f),
            VersionUnsupported(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown gpbackup error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<semver::Error> for Error {
    fn from(err: semver::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

impl IntoError for &str {
    fn into_error(self) -> Error {
        Error::from(ErrorKind::Adhoc(AdhocError::new(self)))
    }
}

impl IntoError for String {
    fn into_error(self) -> Error {
        Error::from(ErrorKind::Adhoc(AdhocError::new(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("test error: {}", 42));
        assert_eq!(err.to_string(), "test error: 42");
    }

    #[test]
    fn error_chain_display() {
        let root = Error::from_args(format_args!("root cause"));
        let mid = Error::from_args(format_args!("middle context"));
        let top = Error::from_args(format_args!("top context"));

        let chained = root.context(mid).context(top);
        assert_eq!(
            chained.to_string(),
            "top context: middle context: root cause"
        );
    }

    #[test]
    fn context_accepts_strings() {
        let err = Error::copy_failed("public.foo", "segment 3 reported an error")
            .context("data section");
        assert_eq!(
            err.to_string(),
            "data section: COPY of public.foo failed: segment 3 reported an error"
        );
        assert!(err.is_copy_failed());
    }

    #[test]
    fn anyhow_bridge() {
        let anyhow_err = anyhow::anyhow!("something failed");
        let our_err: Error = anyhow_err.into();
        assert_eq!(our_err.to_string(), "something failed");
    }

    #[test]
    fn std_error_bridge() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let our_err: Error = io_err.into();
        assert!(our_err.to_string().contains("file not found"));
    }

    #[test]
    fn fatal_classification() {
        assert!(!Error::copy_failed("public.t", "boom").is_fatal());
        assert!(Error::helper_crashed(2, "exit status 1").is_fatal());
        assert!(Error::dependency_cycle("3 objects").is_fatal());
    }

    #[test]
    fn kind_predicates_see_through_context() {
        let err = Error::version_unsupported("8.0.0").context(err!("setup"));
        assert!(err.is_version_unsupported());
        assert!(!err.is_filter_validation());
    }
}
