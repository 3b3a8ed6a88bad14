// Result sinks: two append-only, semicolon-delimited tables. Every row is
// written and flushed as soon as its record is classified, so the files
// double as a progress log if the run is cut short.

use crate::error::AppError;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EXISTING_HEADER: [&str; 8] = [
    "phone",
    "username",
    "display_name",
    "position",
    "registered",
    "invited",
    "presence",
    "status",
];

pub const NON_EXISTING_HEADER: [&str; 4] = ["phone", "position", "registered", "status"];

const DELIMITER: u8 = b';';
// Lets spreadsheet tools detect UTF-8.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One append-only table on disk.
pub struct ResultSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ResultSink {
    /// Open `path` for appending. A new or empty file gets the BOM and the
    /// header row first; with `fresh` any previous content is discarded.
    pub fn open(path: &Path, header: &[&str], fresh: bool) -> Result<Self, AppError> {
        let mut options = OpenOptions::new();
        if fresh {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }
        let mut file = options.open(path).map_err(|e| AppError::io(path, e))?;
        let empty = file
            .metadata()
            .map_err(|e| AppError::io(path, e))?
            .len()
            == 0;
        if empty {
            file.write_all(BOM).map_err(|e| AppError::io(path, e))?;
        }

        let writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .terminator(csv::Terminator::Any(b'\n'))
            .has_headers(false)
            .from_writer(file);
        let mut sink = ResultSink {
            path: path.to_path_buf(),
            writer,
        };
        if empty {
            sink.writer
                .write_record(header)
                .map_err(|e| AppError::table(path, e))?;
            sink.flush()?;
        }
        Ok(sink)
    }

    /// Serialize one row and push it to disk before returning.
    pub fn append<R: Serialize>(&mut self, row: &R) -> Result<(), AppError> {
        self.writer
            .serialize(row)
            .map_err(|e| AppError::table(&self.path, e))?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), AppError> {
        self.writer.flush().map_err(|e| AppError::io(&self.path, e))
    }
}

/// Row for a number that belongs to an account (including banned ones).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRow {
    pub phone: String,
    pub username: String,
    pub display_name: String,
    pub position: usize,
    pub invited: InviteFlag,
    pub presence: String,
    pub status: String,
}

/// Row for a number with no account, or one that could not be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonExistingRow {
    pub phone: String,
    pub position: usize,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteFlag {
    Yes,
    No,
    NotApplicable,
}

impl InviteFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteFlag::Yes => "true",
            InviteFlag::No => "false",
            InviteFlag::NotApplicable => "n/a",
        }
    }
}

// On-disk column order; field order must match the headers above.
#[derive(Serialize)]
struct ExistingRecord<'a> {
    phone: &'a str,
    username: &'a str,
    display_name: &'a str,
    position: usize,
    registered: &'static str,
    invited: &'static str,
    presence: &'a str,
    status: &'a str,
}

#[derive(Serialize)]
struct NonExistingRecord<'a> {
    phone: &'a str,
    position: usize,
    registered: &'static str,
    status: &'a str,
}

/// The pair of sinks a run writes to.
pub struct Sinks {
    pub existing: ResultSink,
    pub non_existing: ResultSink,
}

impl Sinks {
    pub fn open(existing: &Path, non_existing: &Path, fresh: bool) -> Result<Self, AppError> {
        Ok(Sinks {
            existing: ResultSink::open(existing, &EXISTING_HEADER, fresh)?,
            non_existing: ResultSink::open(non_existing, &NON_EXISTING_HEADER, fresh)?,
        })
    }

    pub fn write_existing(&mut self, row: &ExistingRow) -> Result<(), AppError> {
        self.existing.append(&ExistingRecord {
            phone: &row.phone,
            username: &row.username,
            display_name: &row.display_name,
            position: row.position,
            registered: "yes",
            invited: row.invited.as_str(),
            presence: &row.presence,
            status: &row.status,
        })
    }

    pub fn write_non_existing(&mut self, row: &NonExistingRow) -> Result<(), AppError> {
        self.non_existing.append(&NonExistingRecord {
            phone: &row.phone,
            position: row.position,
            registered: "no",
            status: &row.status,
        })
    }
}
