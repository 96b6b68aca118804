//! Loader for the point-process snapshot format.
//!
//! Each non-blank line of the input is one time step:
//!
//! ```text
//! <time> <events> <type> <x> <y> <type> <x> <y> ...
//! ```
//!
//! Files may be gzip-compressed; compression is detected from the magic
//! number rather than the file extension.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;
use log::warn;
use thiserror::Error;

/// Magic number at the start of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Integer tag partitioning points into rendering groups.
pub type TypeId = i64;

/// Errors that can occur while reading point-process files.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid type id '{token}'")]
    InvalidTypeId { line: usize, token: String },

    #[error("line {line}: invalid coordinate '{token}'")]
    InvalidCoordinate { line: usize, token: String },

    #[error("invalid time value '{0}'")]
    InvalidTime(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Coordinates of all points of one type, paired by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypePoints {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl TypePoints {
    #[inline]
    pub fn push(&mut self, x: f64, y: f64) {
        self.xs.push(x);
        self.ys.push(y);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Iterate over `(x, y)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }
}

/// Trailing point group that was cut short by the end of the line.
///
/// Fields missing from the line are `None`. Such a group is kept on the
/// record so callers can see it, but it is never drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncompleteGroup {
    pub type_id: Option<TypeId>,
    pub x: Option<f64>,
}

/// One time-stamped snapshot of typed points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeStepRecord {
    /// Time as written in the file, kept verbatim for display.
    pub time: String,
    /// Event count as written in the file.
    pub events: String,
    /// Points grouped by type, in order of first appearance on the line.
    pub points: IndexMap<TypeId, TypePoints>,
    pub incomplete: Option<IncompleteGroup>,
}

impl TimeStepRecord {
    /// Numeric value of the time field.
    pub fn time_value(&self) -> Result<f64> {
        self.time
            .parse()
            .map_err(|_| LoaderError::InvalidTime(self.time.clone()))
    }

    /// Total number of complete points across all types.
    pub fn num_points(&self) -> usize {
        self.points.values().map(TypePoints::len).sum()
    }
}

/// Open a file for reading, transparently decompressing gzip input.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| LoaderError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
    (&mut file).take(GZIP_MAGIC.len() as u64).read_to_end(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if magic == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Lazy reader yielding one record per non-blank input line.
pub struct RecordReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<TimeStepRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            match parse_line(&line, self.line_no) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Open `path` and return a lazy iterator over its records.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<RecordReader<Box<dyn BufRead>>> {
    Ok(RecordReader::new(open_input(path)?))
}

/// Count the records in `path` without parsing them.
pub fn count_records<P: AsRef<Path>>(path: P) -> Result<usize> {
    let mut count = 0;
    for line in open_input(path)?.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Split `tokens` into groups of three, padding the last group with `None`.
fn grouper<'a>(tokens: &'a [&'a str]) -> impl Iterator<Item = [Option<&'a str>; 3]> + 'a {
    tokens
        .chunks(3)
        .map(|c| [c.first().copied(), c.get(1).copied(), c.get(2).copied()])
}

fn parse_type_id(token: &str, line: usize) -> Result<TypeId> {
    token.parse().map_err(|_| LoaderError::InvalidTypeId {
        line,
        token: token.to_string(),
    })
}

fn parse_coordinate(token: &str, line: usize) -> Result<f64> {
    token.parse().map_err(|_| LoaderError::InvalidCoordinate {
        line,
        token: token.to_string(),
    })
}

/// Parse a single input line. Returns `Ok(None)` for blank lines.
///
/// `line_no` is 1-based and only used in error messages.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<TimeStepRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = line.split(' ').collect();
    let time = tokens[0].to_string();
    let events = tokens
        .get(1)
        .ok_or(LoaderError::MissingField {
            line: line_no,
            field: "event count",
        })?
        .to_string();

    let mut record = TimeStepRecord {
        time,
        events,
        ..Default::default()
    };

    for group in grouper(&tokens[2..]) {
        match group {
            [Some(t), Some(x), Some(y)] => {
                let type_id = parse_type_id(t, line_no)?;
                let x = parse_coordinate(x, line_no)?;
                let y = parse_coordinate(y, line_no)?;
                record.points.entry(type_id).or_default().push(x, y);
            }
            [t, x, _] => {
                let incomplete = IncompleteGroup {
                    type_id: t.map(|t| parse_type_id(t, line_no)).transpose()?,
                    x: x.map(|x| parse_coordinate(x, line_no)).transpose()?,
                };
                warn!(
                    "line {}: trailing point group is incomplete ({:?}), not drawn",
                    line_no, incomplete
                );
                record.incomplete = Some(incomplete);
            }
        }
    }

    Ok(Some(record))
}
