//! Table of contents: byte ranges of every statement in the metadata files
//! and the list of tables whose data was copied.

use crate::{artifact, catalog::make_fqn, incremental::AoEntry, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};

/// The four metadata sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Global,
    Predata,
    Postdata,
    Statistics,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Global => "global",
            Section::Predata => "predata",
            Section::Postdata => "postdata",
            Section::Statistics => "statistics",
        }
    }
}

/// Byte range of one statement block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub schema: String,
    pub name: String,
    pub objecttype: String,
    pub referenceobject: String,
    pub startbyte: u64,
    pub endbyte: u64,
}

impl MetadataEntry {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        object_type: impl Into<String>,
    ) -> MetadataEntry {
        MetadataEntry {
            schema: schema.into(),
            name: name.into(),
            objecttype: object_type.into(),
            ..MetadataEntry::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> MetadataEntry {
        self.referenceobject = reference.into();
        self
    }

    /// The name other entries use to reference this one.
    pub fn fqn(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            make_fqn(&self.schema, &self.name)
        }
    }
}

/// A table whose data was copied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub schema: String,
    pub name: String,
    pub oid: u32,

    /// Comma-separated, quoted column list used by COPY.
    pub attributestring: String,

    pub rowscopied: i64,

    /// Root of the partition tree for leaf partitions.
    #[serde(default)]
    pub partitionroot: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl DataEntry {
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalEntries {
    #[serde(default)]
    pub ao: IndexMap<String, AoEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    #[serde(default)]
    pub globalentries: Vec<MetadataEntry>,
    #[serde(default)]
    pub predataentries: Vec<MetadataEntry>,
    #[serde(default)]
    pub postdataentries: Vec<MetadataEntry>,
    #[serde(default)]
    pub statisticsentries: Vec<MetadataEntry>,
    #[serde(default)]
    pub dataentries: Vec<DataEntry>,
    #[serde(default)]
    pub incrementalmetadata: IncrementalEntries,
}

impl Toc {
    pub fn entries(&self, section: Section) -> &[MetadataEntry] {
        match section {
            Section::Global => &self.globalentries,
            Section::Predata => &self.predataentries,
            Section::Postdata => &self.postdataentries,
            Section::Statistics => &self.statisticsentries,
        }
    }

    fn entries_mut(&mut self, section: Section) -> &mut Vec<MetadataEntry> {
        match section {
            Section::Global => &mut self.globalentries,
            Section::Predata => &mut self.predataentries,
            Section::Postdata => &mut self.postdataentries,
            Section::Statistics => &mut self.statisticsentries,
        }
    }

    /// Records `entry` covering `[start, end)` of the section's file.
    pub fn add_metadata_entry(&mut self, section: Section, mut entry: MetadataEntry, start: u64, end: u64) {
        entry.startbyte = start;
        entry.endbyte = end;
        self.entries_mut(section).push(entry);
    }

    pub fn add_data_entry(&mut self, entry: DataEntry) {
        self.dataentries.push(entry);
    }

    pub fn mark_data_entry_failed(&mut self, oid: u32) {
        if let Some(entry) = self.dataentries.iter_mut().find(|e| e.oid == oid) {
            entry.failed = true;
        }
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &DataEntry> {
        self.dataentries.iter().filter(|entry| entry.failed)
    }

    /// Entries whose reference object is not created by an earlier entry.
    pub fn unresolved_references(&self) -> Vec<&MetadataEntry> {
        let mut known = HashSet::new();
        let mut unresolved = vec![];
        for section in [Section::Global, Section::Predata, Section::Postdata] {
            for entry in self.entries(section) {
                if !entry.referenceobject.is_empty() && !known.contains(&entry.referenceobject) {
                    unresolved.push(entry);
                }
                known.insert(entry.fqn());
            }
        }
        unresolved
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Toc> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Writes the TOC atomically and makes it read-only.
    pub fn write(&self, path: &Path) -> Result<()> {
        artifact::write_atomically(path, self.to_yaml()?.as_bytes(), artifact::READ_ONLY)
    }

    pub fn read(path: &Path) -> Result<Toc> {
        let text = std::fs::read_to_string(path).map_err(|err| crate::Error::artifact_io(path, err))?;
        Toc::from_yaml(&text)
    }
}

/// Byte range of one table's data within a segment's shared data file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDataEntry {
    pub startbyte: u64,
    pub endbyte: u64,
}

/// Per-segment index of the single data file, keyed by table oid in the
/// order the tables were written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentToc {
    #[serde(default)]
    pub dataentries: IndexMap<u32, SegmentDataEntry>,
}

impl SegmentToc {
    /// Byte offset at which the next table's data starts.
    pub fn end(&self) -> u64 {
        self.dataentries
            .last()
            .map(|(_, entry)| entry.endbyte)
            .unwrap_or(0)
    }

    /// Appends a range of `len` bytes for `oid` directly after the previous
    /// table.
    pub fn append(&mut self, oid: u32, len: u64) -> SegmentDataEntry {
        let start = self.end();
        let entry = SegmentDataEntry {
            startbyte: start,
            endbyte: start + len,
        };
        self.dataentries.insert(oid, entry);
        entry
    }

    /// Loads the TOC, treating a missing or empty file as empty.
    pub fn read_or_default(path: &Path) -> Result<SegmentToc> {
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(SegmentToc::default()),
            Ok(text) => Ok(serde_yaml::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(SegmentToc::default()),
            Err(err) => Err(crate::Error::artifact_io(path, err)),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        artifact::write_atomically(path, text.as_bytes(), artifact::DATA_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_ranges_are_contiguous() {
        let mut toc = SegmentToc::default();
        toc.append(10, 40);
        toc.append(20, 25);
        assert_eq!(toc.dataentries[&10].endbyte, toc.dataentries[&20].startbyte);
        assert_eq!(toc.end(), 65);
        assert_eq!(toc.dataentries.keys().copied().collect::<Vec<_>>(), [10, 20]);
    }

    #[test]
    fn references_must_precede() {
        let mut toc = Toc::default();
        toc.add_metadata_entry(Section::Predata, MetadataEntry::new("public", "t", "TABLE"), 0, 10);
        toc.add_metadata_entry(
            Section::Postdata,
            MetadataEntry::new("public", "t_idx", "INDEX").with_reference("public.t"),
            0,
            10,
        );
        toc.add_metadata_entry(
            Section::Postdata,
            MetadataEntry::new("public", "r", "RULE").with_reference("public.missing"),
            10,
            20,
        );
        let unresolved = toc.unresolved_references();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].name, "r");
    }

    #[test]
    fn failed_entries_are_tracked() {
        let mut toc = Toc::default();
        toc.add_data_entry(DataEntry {
            schema: "public".into(),
            name: "a".into(),
            oid: 1,
            ..DataEntry::default()
        });
        toc.mark_data_entry_failed(1);
        assert_eq!(toc.failed_tables().count(), 1);
    }
}
