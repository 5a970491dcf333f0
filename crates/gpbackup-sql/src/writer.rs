use crate::Block;
use gpbackup_core::{
    toc::{Section, Toc},
    Error, Result,
};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Writes statement blocks to one section file and records where each block
/// landed.
///
/// Offsets are counted from the bytes actually handed to the underlying
/// writer, so every TOC entry covers exactly its block.
#[derive(Debug)]
pub struct MetadataWriter<'a, W> {
    out: W,

    /// Path reported in I/O errors.
    path: PathBuf,

    byte_count: u64,

    toc: &'a mut Toc,

    section: Section,
}

impl<'a, W: Write> MetadataWriter<'a, W> {
    pub fn new(out: W, path: impl AsRef<Path>, toc: &'a mut Toc, section: Section) -> Self {
        MetadataWriter {
            out,
            path: path.as_ref().to_path_buf(),
            byte_count: 0,
            toc,
            section,
        }
    }

    /// Continues a file that already holds `offset` bytes, so entries of a
    /// section written later still point at the right place.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.byte_count = offset;
        self
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub fn section(&self) -> Section {
        self.section
    }

    /// Switches the section new entries are recorded in. The global, predata
    /// and postdata sections share one file.
    pub fn set_section(&mut self, section: Section) {
        self.section = section;
    }

    /// Writes `block` and records its TOC entry.
    pub fn emit(&mut self, block: Block) -> Result<()> {
        let start = self.byte_count;
        self.write_raw(&block.sql)?;
        self.toc
            .add_metadata_entry(self.section, block.entry, start, self.byte_count);
        Ok(())
    }

    pub fn emit_all(&mut self, blocks: impl IntoIterator<Item = Block>) -> Result<()> {
        for block in blocks {
            self.emit(block)?;
        }
        Ok(())
    }

    /// Writes text that no TOC entry covers.
    pub fn write_raw(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|err| Error::artifact_io(&self.path, err))?;
        self.byte_count += text.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|err| Error::artifact_io(&self.path, err))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
