//! In-memory result table for scanned files.
//!
//! Records are keyed by absolute path and keep insertion order. Selection
//! state lives on each record.

use crate::core::types::FileRecord;
use crate::reputation::item::LookupItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Summary counts over a result table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub total_files: usize,
    pub hashed: usize,
    pub errors: usize,
    pub selected: usize,
    pub total_bytes: u64,
}

/// Ordered store of [`FileRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    records: Vec<FileRecord>,
    index: HashMap<PathBuf, usize>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier record for the same path.
    pub fn insert(&mut self, record: FileRecord) {
        match self.index.get(&record.path) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.path.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = FileRecord>>(&mut self, records: I) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.index.get(path).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Toggle selection of one record. Returns the new state, or `None` if
    /// the path is unknown.
    pub fn toggle(&mut self, path: &Path) -> Option<bool> {
        let i = *self.index.get(path)?;
        Some(self.records[i].toggle_selected())
    }

    /// Set the selection flag of every record.
    pub fn select_all(&mut self, selected: bool) {
        for record in &mut self.records {
            record.selected = selected;
        }
    }

    /// Selected records, in table order.
    pub fn selected(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|r| r.selected)
    }

    /// Lookup queue entries for the selected records that have digests.
    pub fn selected_lookup_items(&self) -> Vec<LookupItem> {
        self.selected().filter_map(LookupItem::from_record).collect()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    pub fn statistics(&self) -> ScanStatistics {
        let errors = self.records.iter().filter(|r| r.digests.is_error()).count();
        ScanStatistics {
            total_files: self.records.len(),
            hashed: self.records.len() - errors,
            errors,
            selected: self.selected().count(),
            total_bytes: self.records.iter().filter_map(|r| r.size_bytes).sum(),
        }
    }
}
