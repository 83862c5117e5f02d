//! Sorted runs and binary record streams.

use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::sort::SortError;

/// Size of one on-disk record in bytes.
pub const RECORD_SIZE: usize = 8;

/// A sorted run on disk.
///
/// The path and the record count are the only metadata kept in memory.
/// Whoever holds the `Run` owns the file and is responsible for deleting
/// it once it has been consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Location of the run file.
    pub path: PathBuf,
    /// Number of records the file holds.
    pub records: u64,
}

impl Run {
    /// Consumes the run, yielding the path of the file it owned.
    ///
    /// Call sites that delete or rename a run go through this so that a
    /// consumed run cannot be used again.
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Buffered reader yielding little-endian `i64` records from one file.
pub struct RunReader {
    path: PathBuf,
    reader: BufReader<fs::File>,
    remaining: u64,
}

impl RunReader {
    /// Opens `path` for sequential record reading.
    ///
    /// The file length must be a whole number of records, otherwise
    /// [`SortError::Format`] is returned before anything is read.
    pub fn open(path: &Path, buf_size: usize) -> Result<Self, SortError> {
        let file = fs::File::open(path).map_err(|err| SortError::Open {
            path: path.to_path_buf(),
            source: err,
        })?;

        let len = file
            .metadata()
            .map_err(|err| SortError::Open {
                path: path.to_path_buf(),
                source: err,
            })?
            .len();
        if len % RECORD_SIZE as u64 != 0 {
            return Err(SortError::Format {
                path: path.to_path_buf(),
                len,
            });
        }

        return Ok(RunReader {
            path: path.to_path_buf(),
            reader: BufReader::with_capacity(buf_size, file),
            remaining: len / RECORD_SIZE as u64,
        });
    }

    /// Number of records not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for RunReader {
    type Item = Result<i64, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let mut record = [0u8; RECORD_SIZE];
        match self.reader.read_exact(&mut record) {
            Ok(()) => {
                self.remaining -= 1;
                Some(Ok(i64::from_le_bytes(record)))
            }
            Err(err) => {
                self.remaining = 0;
                Some(Err(SortError::Read {
                    path: self.path.clone(),
                    source: err,
                }))
            }
        }
    }
}

/// Buffered writer producing one run of little-endian `i64` records.
pub struct RunWriter {
    path: PathBuf,
    writer: BufWriter<fs::File>,
    records: u64,
}

impl RunWriter {
    /// Creates the run file at `path`, truncating any previous content.
    pub fn create(path: &Path, buf_size: usize) -> Result<Self, SortError> {
        let file = fs::File::create(path).map_err(|err| SortError::Open {
            path: path.to_path_buf(),
            source: err,
        })?;

        return Ok(RunWriter {
            path: path.to_path_buf(),
            writer: BufWriter::with_capacity(buf_size, file),
            records: 0,
        });
    }

    /// Appends one record.
    pub fn push(&mut self, value: i64) -> Result<(), SortError> {
        self.writer
            .write_all(&value.to_le_bytes())
            .map_err(|err| SortError::Write {
                path: self.path.clone(),
                source: err,
            })?;
        self.records += 1;
        Ok(())
    }

    /// Flushes and returns the finished run.
    pub fn finish(mut self) -> Result<Run, SortError> {
        self.writer.flush().map_err(|err| SortError::Write {
            path: self.path.clone(),
            source: err,
        })?;

        return Ok(Run {
            path: self.path,
            records: self.records,
        });
    }
}
