//! Dynamic CSV table for key batches.
//!
//! The input file is user-authored and may carry any number of extra
//! columns; everything round-trips to the output untouched. Cells are kept
//! as raw strings so key formatting (leading zeros, dashes) survives.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

/// Required input column holding the product key.
pub const KEY_COLUMN: &str = "CD Key";

/// Columns the checker fills in, created empty when absent from the input.
pub const RESULT_COLUMNS: [&str; 4] = ["Status", "Time Activated", "Package", "Tag"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("could not open input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse input file: {0}")]
    Csv(#[from] csv::Error),

    #[error("input file is missing the required '{KEY_COLUMN}' column")]
    MissingKeyColumn,
}

/// In-memory batch table: one header row plus string cells.
///
/// Rows shorter than the header are padded with empty cells on load, so
/// every accessor below can index unconditionally.
#[derive(Debug, Clone)]
pub struct KeyTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl KeyTable {
    /// Read a CSV with a header row, preserving all columns and raw cell
    /// text. Fails on I/O errors, malformed CSV, or a missing key column.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            // Spreadsheet exports prepend a BOM to the first header cell.
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        if !headers.iter().any(|h| h == KEY_COLUMN) {
            return Err(TableError::MissingKeyColumn);
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Add each of [`RESULT_COLUMNS`] that the input didn't already carry.
    /// Existing columns (and their values) are left alone, which is what
    /// lets a prior output file be re-used as input.
    pub fn ensure_result_columns(&mut self) {
        for col in RESULT_COLUMNS {
            if !self.headers.iter().any(|h| h == col) {
                self.headers.push(col.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text by row index and column name; `""` when the column is
    /// absent.
    pub fn get(&self, row: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|c| self.rows.get(row).map(|r| r[c].as_str()))
            .unwrap_or("")
    }

    /// Overwrite a cell. A missing column is a no-op; callers go through
    /// [`ensure_result_columns`](Self::ensure_result_columns) first.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        if let Some(c) = self.column_index(column) {
            if let Some(r) = self.rows.get_mut(row) {
                r[c] = value.into();
            }
        }
    }

    /// Write the full table to `path`, preceded by a UTF-8 BOM so Excel
    /// and friends pick the right encoding.
    ///
    /// The write goes to a sibling temp file first and is renamed into
    /// place at the end, so a failure partway through can never leave a
    /// half-written file squatting on the output name (which would make
    /// the next run's collision avoidance skip past it).
    pub fn save(&self, path: &Path) -> Result<(), TableError> {
        let tmp = path.with_extension("csv.tmp");
        let result = self
            .write_to(&tmp)
            .and_then(|()| std::fs::rename(&tmp, path).map_err(TableError::from));
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }

    fn write_to(&self, path: &Path) -> Result<(), TableError> {
        let mut file = File::create(path)?;
        file.write_all(b"\xEF\xBB\xBF")?;

        let mut writer = csv::WriterBuilder::new().from_writer(file);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent.csv");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn load_preserves_raw_key_text() {
        let (_dir, path) = write_csv("CD Key,Note\n00AB-99,keep me\n");
        let table = KeyTable::load(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "CD Key"), "00AB-99");
        assert_eq!(table.get(0, "Note"), "keep me");
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let (_dir, path) = write_csv("Key,Status\nabc,\n");
        assert!(matches!(
            KeyTable::load(&path),
            Err(TableError::MissingKeyColumn)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(KeyTable::load(&path), Err(TableError::Io(_))));
    }

    #[test]
    fn ensure_result_columns_is_additive_only() {
        let (_dir, path) = write_csv("CD Key,Status\nK1,Activated\n");
        let mut table = KeyTable::load(&path).unwrap();
        table.ensure_result_columns();

        // Pre-existing Status value untouched, new columns empty.
        assert_eq!(table.get(0, "Status"), "Activated");
        assert_eq!(table.get(0, "Time Activated"), "");
        assert_eq!(table.get(0, "Package"), "");
        assert_eq!(table.get(0, "Tag"), "");

        // Idempotent.
        table.ensure_result_columns();
        assert_eq!(table.column_index("Status"), Some(1));
    }

    #[test]
    fn short_rows_are_padded() {
        let (_dir, path) = write_csv("CD Key,Status,Extra\nK1\n");
        let table = KeyTable::load(&path).unwrap();
        assert_eq!(table.get(0, "Status"), "");
        assert_eq!(table.get(0, "Extra"), "");
    }

    #[test]
    fn save_writes_bom_and_roundtrips() {
        let (_dir, path) = write_csv("CD Key,Extra\nK1,e1\n");
        let mut table = KeyTable::load(&path).unwrap();
        table.ensure_result_columns();
        table.set(0, "Status", "Activated");

        let out = path.with_file_name("out.csv");
        table.save(&out).unwrap();

        let bytes = fs::read(&out).unwrap();
        assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");

        let reloaded = KeyTable::load(&out).unwrap();
        assert_eq!(reloaded.get(0, "CD Key"), "K1");
        assert_eq!(reloaded.get(0, "Extra"), "e1");
        assert_eq!(reloaded.get(0, "Status"), "Activated");
    }

    #[test]
    fn failed_save_leaves_no_file_behind() {
        let (_dir, path) = write_csv("CD Key\nK1\n");
        let table = KeyTable::load(&path).unwrap();

        // A directory on the output name makes the final rename fail.
        let out = path.with_file_name("blocked.csv");
        fs::create_dir(&out).unwrap();

        assert!(table.save(&out).is_err());
        // Neither a partial file nor the staging file survives, so the
        // name is not considered taken by a later run.
        assert!(!out.with_extension("csv.tmp").exists());
        assert!(out.is_dir());

        // Unwritable target directory: fails before anything is created.
        let missing = path.with_file_name("no_such_dir").join("out.csv");
        assert!(table.save(&missing).is_err());
    }

    #[test]
    fn save_leaves_no_staging_file_on_success() {
        let (_dir, path) = write_csv("CD Key\nK1\n");
        let table = KeyTable::load(&path).unwrap();

        let out = path.with_file_name("out.csv");
        table.save(&out).unwrap();
        assert!(out.exists());
        assert!(!out.with_extension("csv.tmp").exists());
    }

    #[test]
    fn bom_on_input_header_is_stripped() {
        let (_dir, path) = write_csv("\u{feff}CD Key\nK1\n");
        let table = KeyTable::load(&path).unwrap();
        assert_eq!(table.column_index(KEY_COLUMN), Some(0));
    }
}
