use super::Error;

/// Error when the catalog connection fails while fetching metadata.
///
/// This wraps the underlying driver error, for example a dropped connection
/// or a query rejected by the server.
#[derive(Debug)]
pub(super) struct CatalogUnavailable {
    inner: Box<dyn std::error::Error + Send + Sync>,
}

impl std::error::Error for CatalogUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl core::fmt::Display for CatalogUnavailable {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("catalog unavailable: ")?;
        core::fmt::Display::fmt(&self.inner, f)?;
        let mut source = self.inner.source();
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}

impl Error {
    /// Creates an error from a failed catalog operation.
    pub fn catalog_unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::from(super::ErrorKind::CatalogUnavailable(CatalogUnavailable {
            inner: Box::new(err),
        }))
    }

    /// Returns `true` if this error is a catalog failure.
    pub fn is_catalog_unavailable(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::CatalogUnavailable(_)))
    }
}
