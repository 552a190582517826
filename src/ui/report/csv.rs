//! CSV export functionality.
//!
//! Exports hashed files and lookup results for spreadsheet analysis.

use crate::core::error::{Error, Result};
use crate::core::types::{DigestKind, FileRecord};
use crate::reputation::item::LookupItem;
use std::io::Write;
use std::path::Path;

/// Column headers of the scan export.
pub const SCAN_HEADERS: [&str; 9] = [
    "Selected",
    "Type",
    "Filename",
    "Path",
    "Size",
    "Extension",
    "MD5",
    "SHA1",
    "SHA256",
];

/// Column headers of the lookup export.
pub const LOOKUP_HEADERS: [&str; 8] = [
    "Status",
    "Hash Type",
    "Hash",
    "Malicious",
    "Suspicious",
    "Clean",
    "Last Scan",
    "Filename",
];

const CHECKED: &str = "\u{2611}";
const UNCHECKED: &str = "\u{2610}";

/// CSV exporter for scan and lookup results.
pub struct CsvExporter {
    /// Delimiter byte
    delimiter: u8,
    /// Include header row
    include_header: bool,
}

impl CsvExporter {
    /// Create a new CSV exporter.
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            include_header: true,
        }
    }

    /// Set the delimiter character.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to include headers.
    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    fn writer<W: Write>(&self, out: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(out)
    }

    /// Write scan records. Returns the number of rows written.
    pub fn write_records<W: Write>(&self, records: &[FileRecord], out: W) -> Result<usize> {
        let mut writer = self.writer(out);
        if self.include_header {
            writer.write_record(SCAN_HEADERS)?;
        }

        for record in records {
            writer.write_record([
                if record.selected { CHECKED } else { UNCHECKED }.to_string(),
                record.source.to_string(),
                record.relative_path.clone(),
                record.path.display().to_string(),
                record.size_human(),
                record.extension.clone(),
                record.digests.column(DigestKind::Md5),
                record.digests.column(DigestKind::Sha1),
                record.digests.column(DigestKind::Sha256),
            ])?;
        }

        writer.flush()?;
        Ok(records.len())
    }

    /// Write lookup results. Returns the number of rows written.
    pub fn write_lookups<W: Write>(&self, items: &[LookupItem], out: W) -> Result<usize> {
        let mut writer = self.writer(out);
        if self.include_header {
            writer.write_record(LOOKUP_HEADERS)?;
        }

        for item in items {
            let [malicious, suspicious, clean] = item.count_columns();
            writer.write_record([
                item.status.label().to_string(),
                item.digest_kind.to_string(),
                item.digest.clone(),
                malicious,
                suspicious,
                clean,
                item.last_scan_display(),
                item.filename.clone(),
            ])?;
        }

        writer.flush()?;
        Ok(items.len())
    }

    /// Export scan records to a file.
    pub fn export_records(&self, records: &[FileRecord], output_path: &Path) -> Result<usize> {
        let file = create(output_path)?;
        self.write_records(records, file)
    }

    /// Export lookup results to a file.
    pub fn export_lookups(&self, items: &[LookupItem], output_path: &Path) -> Result<usize> {
        let file = create(output_path)?;
        self.write_lookups(items, file)
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

fn create(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path).map_err(|e| Error::file_write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DigestOutcome, DigestSet, SourceKind};
    use crate::reputation::item::LookupStatus;
    use std::path::PathBuf;

    fn records() -> Vec<FileRecord> {
        let mut ok = FileRecord::new(
            PathBuf::from("/data/docs/report, final.pdf"),
            "docs/report, final.pdf".into(),
            Some(1536),
            DigestOutcome::Computed(DigestSet {
                md5: "m".repeat(32),
                sha1: "s".repeat(40),
                sha256: "x".repeat(64),
            }),
            SourceKind::Folder,
        );
        ok.selected = true;
        let failed = FileRecord::new(
            PathBuf::from("/data/locked"),
            "locked".into(),
            None,
            DigestOutcome::Failed {
                message: "Permission denied".into(),
            },
            SourceKind::Folder,
        );
        vec![ok, failed]
    }

    fn to_string(f: impl FnOnce(&mut Vec<u8>) -> Result<usize>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_scan_csv_schema() {
        let exporter = CsvExporter::new();
        let text = to_string(|buf| exporter.write_records(&records(), buf));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Selected,Type,Filename,Path,Size,Extension,MD5,SHA1,SHA256"
        );
        assert!(lines[1].starts_with("\u{2611},Folder,\"docs/report, final.pdf\""));
        assert!(lines[1].contains(",1.5 KB,.pdf,"));
        assert!(lines[2].starts_with("\u{2610},Folder,locked,/data/locked,Unknown,No Extension,"));
        assert_eq!(lines[2].matches("Error: Permission denied").count(), 3);
    }

    #[test]
    fn test_lookup_csv_schema() {
        let mut item = LookupItem::new("f".repeat(64), DigestKind::Sha256, "a.exe");
        item.status = LookupStatus::NotFound;

        let exporter = CsvExporter::new().with_delimiter(b';');
        let text = to_string(|buf| exporter.write_lookups(&[item], buf));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Status;Hash Type;Hash;Malicious;Suspicious;Clean;Last Scan;Filename"
        );
        assert_eq!(
            lines[1],
            format!("NOT FOUND;SHA256;{};0;0;0;Not scanned;a.exe", "f".repeat(64))
        );
    }

    #[test]
    fn test_without_header() {
        let exporter = CsvExporter::new().with_header(false);
        let text = to_string(|buf| exporter.write_records(&records(), buf));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = CsvExporter::new().export_records(&records(), &path).unwrap();
        assert_eq!(rows, 2);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Selected,"));
    }
}
