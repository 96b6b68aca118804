//! Concatenation of delimited tables from several runs.

use std::io::Write;
use std::iter;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::core::loaders::{open_input, LoaderError};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Open(#[from] LoaderError),

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV write error: {0}")]
    Write(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Concatenate the tables in `paths` into `writer`.
///
/// The first file's header is written once, prefixed with a `dataset`
/// column. Every data row of the n-th file (1-based) is prefixed with n.
/// Headers of later files are dropped. Returns the number of data rows
/// written.
///
/// Fields are parsed and re-written, not copied byte for byte: quotes that
/// are not needed are removed, and fields containing the delimiter or a
/// quote are quoted on output.
pub fn join_datasets<P, W>(paths: &[P], writer: W, delimiter: u8) -> Result<usize>
where
    P: AsRef<Path>,
    W: Write,
{
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);
    let mut rows = 0;

    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let dataset = (i + 1).to_string();
        let read_error = |e| DatasetError::Read {
            path: path.to_path_buf(),
            source: e,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(open_input(path)?);
        let mut records = reader.records();

        let header = records.next().transpose().map_err(read_error)?;
        if i == 0 {
            let header = header.unwrap_or_default();
            out.write_record(iter::once("dataset").chain(header.iter()))?;
        }

        let mut file_rows = 0;
        for record in records {
            let record = record.map_err(read_error)?;
            out.write_record(iter::once(dataset.as_str()).chain(record.iter()))?;
            file_rows += 1;
        }
        debug!("joined {} rows from {}", file_rows, path.display());
        rows += file_rows;
    }

    out.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_join_two_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "time,count\n0,5\n1,6\n").unwrap();
        fs::write(&b, "time,count\n0,7\n").unwrap();

        let mut out = Vec::new();
        let rows = join_datasets(&[&a, &b], &mut out, b',').unwrap();

        assert_eq!(rows, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "dataset,time,count\n1,0,5\n1,1,6\n2,0,7\n"
        );
    }

    #[test]
    fn test_join_tab_delimited() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.tsv");
        fs::write(&a, "x\ty\n1\t2\n").unwrap();

        let mut out = Vec::new();
        join_datasets(&[&a], &mut out, b'\t').unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "dataset\tx\ty\n1\t1\t2\n");
    }

    #[test]
    fn test_join_header_only_and_empty_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "").unwrap();
        fs::write(&b, "h\n3\n").unwrap();

        let mut out = Vec::new();
        let rows = join_datasets(&[&a, &b], &mut out, b',').unwrap();

        assert_eq!(rows, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "dataset\n2,3\n");
    }

    #[test]
    fn test_join_normalises_quoting() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.csv");
        fs::write(&a, "name,value\n\"x\",1\n\"a,b\",2\n").unwrap();

        let mut out = Vec::new();
        join_datasets(&[&a], &mut out, b',').unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "dataset,name,value\n1,x,1\n1,\"a,b\",2\n"
        );
    }

    #[test]
    fn test_join_missing_file() {
        let dir = tempdir().unwrap();
        let mut out = Vec::new();
        let result = join_datasets(&[dir.path().join("nope.csv")], &mut out, b',');
        assert!(matches!(result, Err(DatasetError::Open(_))));
    }
}
