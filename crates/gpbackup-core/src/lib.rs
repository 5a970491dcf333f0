pub mod artifact;

pub mod catalog;

pub mod driver;
pub use driver::{Catalog, Driver};

mod error;
pub use error::Error;

pub mod filepath;
pub mod filter;
pub mod history;
pub mod incremental;
pub mod manifest;
pub mod options;
pub mod report;
pub mod sort;
pub mod toc;
pub mod version;

/// A Result type alias that uses the backup [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
