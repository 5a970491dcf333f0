pub mod printer;
pub use printer::{Block, Printer};

mod writer;
pub use writer::MetadataWriter;
