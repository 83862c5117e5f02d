//! Run producer: streams one input file into sorted runs.

use std::fs;
use std::path::Path;

use log;

use crate::names::TempNames;
use crate::run::{Run, RunReader, RunWriter};
use crate::sort::SortError;

/// Streams an input file through a bounded buffer, spilling every filled
/// buffer to disk as a sorted run.
///
/// The buffer never holds more than `capacity` records, the per-worker
/// share of the global memory budget. An empty input produces no runs at
/// all. No run data is retained in memory after [`RunProducer::produce`]
/// returns.
#[derive(Debug, Clone)]
pub struct RunProducer {
    capacity: usize,
    buf_size: usize,
}

impl RunProducer {
    /// Creates a producer.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of records buffered at once.
    /// * `buf_size` - Stream read/write buffer size in bytes.
    pub fn new(capacity: usize, buf_size: usize) -> Self {
        RunProducer {
            capacity: capacity.max(1),
            buf_size,
        }
    }

    /// Reads `input` and emits one sorted run per filled buffer.
    ///
    /// Runs are named after the input via [`TempNames::run_path`] with a
    /// monotonically increasing local index. On failure the run being
    /// written is removed; runs already finished are left behind for the
    /// orchestrator's cleanup pass.
    pub fn produce(
        &self,
        input: &Path,
        names: &TempNames,
        file_index: usize,
    ) -> Result<Vec<Run>, SortError> {
        let mut reader = RunReader::open(input, self.buf_size)?;
        let mut runs = Vec::new();
        let mut buffer: Vec<i64> = Vec::with_capacity(self.capacity);

        loop {
            buffer.clear();
            while buffer.len() < self.capacity {
                match reader.next() {
                    Some(Ok(value)) => buffer.push(value),
                    Some(Err(err)) => return Err(err),
                    None => break,
                }
            }
            if buffer.is_empty() {
                break;
            }

            buffer.sort_unstable();

            let path = names.run_path(input, file_index, runs.len());
            runs.push(self.spill(&buffer, &path)?);
            log::debug!(
                "{}: spilled run {} ({} records)",
                input.display(),
                runs.len() - 1,
                buffer.len()
            );
        }

        return Ok(runs);
    }

    fn spill(&self, buffer: &[i64], path: &Path) -> Result<Run, SortError> {
        match self.write_run(buffer, path) {
            Ok(run) => Ok(run),
            Err(err) => {
                // no partially written run may be left behind
                let _ = fs::remove_file(path);
                Err(err)
            }
        }
    }

    fn write_run(&self, buffer: &[i64], path: &Path) -> Result<Run, SortError> {
        let mut writer = RunWriter::create(path, self.buf_size)?;
        for &value in buffer {
            writer.push(value)?;
        }
        writer.finish()
    }
}
