//! CSV writers for point-process summaries.
//!
//! The type-count table has one row per record and one column per point
//! type seen anywhere in the input:
//!
//! ```text
//! time,events,0,1,2
//! 0.0,0,120,30,0
//! 0.5,41,118,33,2
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::{TimeStepRecord, TypeId};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to the output.
    #[error("failed to write to '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Point counts of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCounts {
    pub time: String,
    pub events: String,
    pub counts: BTreeMap<TypeId, usize>,
}

impl From<&TimeStepRecord> for TypeCounts {
    fn from(record: &TimeStepRecord) -> Self {
        Self {
            time: record.time.clone(),
            events: record.events.clone(),
            counts: record
                .points
                .iter()
                .map(|(&type_id, points)| (type_id, points.len()))
                .collect(),
        }
    }
}

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
pub(crate) fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Write a type-count table to `writer`.
///
/// `name` identifies the destination in error messages. Types missing from
/// a record are written as 0.
pub fn write_type_counts_to<W: Write>(rows: &[TypeCounts], writer: W, name: &str) -> Result<()> {
    let types: BTreeSet<TypeId> = rows
        .iter()
        .flat_map(|row| row.counts.keys().copied())
        .collect();

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["time".to_string(), "events".to_string()];
    header.extend(types.iter().map(|t| t.to_string()));
    csv_writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: name.to_string(),
            source: e,
        })?;

    for row in rows {
        let mut fields = Vec::with_capacity(types.len() + 2);
        fields.push(row.time.clone());
        fields.push(row.events.clone());
        fields.extend(
            types
                .iter()
                .map(|t| row.counts.get(t).copied().unwrap_or(0).to_string()),
        );

        csv_writer
            .write_record(&fields)
            .map_err(|e| WriteError::CsvError {
                path: name.to_string(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: name.to_string(),
        source: e,
    })?;

    Ok(())
}

/// Write a type-count table to a CSV file.
pub fn write_type_counts(path: &Path, rows: &[TypeCounts]) -> Result<()> {
    let writer = create_buffered_writer(path)?;
    write_type_counts_to(rows, writer, &path.display().to_string())
}
