//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log;
use walkdir::WalkDir;

use crate::merger::FileMerger;
use crate::names::TempNames;
use crate::pool::WorkerPool;
use crate::producer::RunProducer;
use crate::run::{Run, RECORD_SIZE};

/// Default global memory budget for run generation (64 MiB).
pub const DEFAULT_MEMORY_LIMIT: u64 = 64 * 1024 * 1024;
/// Default number of runs combined by one merge task.
pub const DEFAULT_MERGE_FANIN: usize = 128;
/// Default per-stream read/write buffer size.
pub const DEFAULT_RW_BUF_SIZE: usize = 64 * 1024;

/// Worker count used when hardware parallelism cannot be determined.
const FALLBACK_WORKERS: usize = 32;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Scratch directory creation error.
    TempDir(io::Error),
    /// Worker thread spawn error.
    PoolBuild(io::Error),
    /// A file could not be opened or created.
    Open { path: PathBuf, source: io::Error },
    /// Failure during streamed reading.
    Read { path: PathBuf, source: io::Error },
    /// Failure during streamed writing.
    Write { path: PathBuf, source: io::Error },
    /// File length is not a whole number of records.
    Format { path: PathBuf, len: u64 },
    /// The final run could be neither renamed nor copied onto the output.
    Rename { path: PathBuf, source: io::Error },
    /// Task submitted after pool shutdown.
    PoolShutdown,
    /// Task discarded before it could resolve.
    Canceled,
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) | SortError::PoolBuild(err) => Some(err),
            SortError::Open { source, .. }
            | SortError::Read { source, .. }
            | SortError::Write { source, .. }
            | SortError::Rename { source, .. } => Some(source),
            SortError::Format { .. } | SortError::PoolShutdown | SortError::Canceled => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "scratch directory not created: {}", err),
            SortError::PoolBuild(err) => write!(f, "worker pool initialization failed: {}", err),
            SortError::Open { path, source } => {
                write!(f, "cannot open {}: {}", path.display(), source)
            }
            SortError::Read { path, source } => {
                write!(f, "read failed on {}: {}", path.display(), source)
            }
            SortError::Write { path, source } => {
                write!(f, "write failed on {}: {}", path.display(), source)
            }
            SortError::Format { path, len } => write!(
                f,
                "{}: length {} bytes is not a whole number of records",
                path.display(),
                len
            ),
            SortError::Rename { path, source } => {
                write!(f, "cannot move the sorted result to {}: {}", path.display(), source)
            }
            SortError::PoolShutdown => write!(f, "task submitted after worker pool shutdown"),
            SortError::Canceled => write!(f, "task was discarded before it could complete"),
        }
    }
}

/// Counters reported by a finished sort job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortStats {
    /// Total records written to the output.
    pub records: u64,
    /// Runs produced during run generation.
    pub runs: usize,
    /// Merge rounds executed.
    pub rounds: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Debug, Clone)]
pub struct ExternalSorterBuilder {
    /// Global memory budget in bytes, shared by all workers.
    memory_limit: u64,
    /// Number of worker threads.
    threads_number: Option<usize>,
    /// Maximum runs combined by one merge task.
    merge_fanin: usize,
    /// Per-stream read/write buffer size.
    rw_buf_size: usize,
    /// Directory to host the scratch space for temporary runs.
    tmp_dir: Option<Box<Path>>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.memory_limit,
            self.threads_number,
            self.merge_fanin,
            self.rw_buf_size,
            self.tmp_dir.as_deref(),
        )
    }

    /// Sets the global memory budget for run generation.
    pub fn with_memory_limit(mut self, memory_limit: u64) -> ExternalSorterBuilder {
        self.memory_limit = memory_limit;
        return self;
    }

    /// Sets the number of worker threads.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets the per-round merge fan-in.
    pub fn with_merge_fanin(mut self, merge_fanin: usize) -> ExternalSorterBuilder {
        self.merge_fanin = merge_fanin;
        return self;
    }

    /// Sets the stream read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Sets a directory to host an isolated scratch space for temporary
    /// runs. Without it runs are placed next to their inputs.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            threads_number: None,
            merge_fanin: DEFAULT_MERGE_FANIN,
            rw_buf_size: DEFAULT_RW_BUF_SIZE,
            tmp_dir: None,
        }
    }
}

/// External sorter.
///
/// Drives one sort job over a directory of binary record files: every
/// input is streamed into sorted runs under a global memory budget, the
/// runs are then merged in rounds of bounded fan-in until a single file
/// remains, which becomes the output.
pub struct ExternalSorter {
    /// Pool executing producer and merge tasks.
    pool: WorkerPool,
    /// Number of workers the pool was started with.
    workers: usize,
    /// Records buffered per producer, floor(M / (W * 8)) clamped to 1.
    /// Computed once at construction and never re-evaluated.
    capacity: usize,
    /// Maximum runs combined by one merge task.
    merge_fanin: usize,
    /// Per-stream read/write buffer size.
    rw_buf_size: usize,
    /// Scratch space holding every temporary when isolation is requested.
    scratch: Option<tempfile::TempDir>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `memory_limit` - Global memory budget in bytes, partitioned evenly
    ///   across workers for run generation.
    /// * `threads_number` - Number of worker threads. If the parameter is
    ///   [`None`] the available hardware parallelism is used.
    /// * `merge_fanin` - Maximum runs combined by one merge task. Values
    ///   below 2 are clamped to 2 so that every round makes progress.
    /// * `rw_buf_size` - Stream read/write buffer size in bytes.
    /// * `tmp_path` - Directory to host an isolated scratch space. If the
    ///   parameter is [`None`] runs are placed next to their inputs and
    ///   intermediates next to the output.
    pub fn new(
        memory_limit: u64,
        threads_number: Option<usize>,
        merge_fanin: usize,
        rw_buf_size: usize,
        tmp_path: Option<&Path>,
    ) -> Result<Self, SortError> {
        let workers = threads_number.unwrap_or_else(default_workers).max(1);
        let capacity = (memory_limit / (workers as u64 * RECORD_SIZE as u64)).max(1) as usize;

        let scratch = match tmp_path {
            Some(path) => Some(tempfile::tempdir_in(path).map_err(SortError::TempDir)?),
            None => None,
        };
        if let Some(scratch) = &scratch {
            log::info!("using {} as a scratch directory", scratch.path().display());
        }

        let pool = WorkerPool::new(workers)?;
        log::info!(
            "worker pool started (workers: {}, buffer: {} records per worker)",
            workers,
            capacity
        );

        return Ok(ExternalSorter {
            pool,
            workers,
            capacity,
            merge_fanin: merge_fanin.max(2),
            rw_buf_size,
            scratch,
        });
    }

    /// Sorts every record found under `input_dir` into `output`.
    ///
    /// Blocks until the job finishes or fails with the first unrecoverable
    /// error. On failure every temporary run known to the orchestrator is
    /// removed on a best-effort basis and no valid output is left at the
    /// target path.
    pub fn sort(&self, input_dir: &Path, output: &Path) -> Result<SortStats, SortError> {
        let job_started = Instant::now();
        let names = self.temp_names();

        log::info!("run generation started (workers: {})", self.workers);
        let phase_started = Instant::now();
        let inputs = collect_inputs(input_dir);
        let runs = self.generate_runs(&inputs, &names)?;
        log::info!(
            "run generation finished ({} input files, {} runs, {} ms)",
            inputs.len(),
            runs.len(),
            phase_started.elapsed().as_millis()
        );

        log::info!("merge started");
        let phase_started = Instant::now();
        let stats = self.merge_runs(runs, output, &names)?;
        log::info!(
            "merge finished ({} rounds, {} ms)",
            stats.rounds,
            phase_started.elapsed().as_millis()
        );

        log::info!(
            "sorted {} records into {} ({} ms)",
            stats.records,
            output.display(),
            job_started.elapsed().as_millis()
        );
        return Ok(stats);
    }

    fn temp_names(&self) -> TempNames {
        TempNames::new(self.scratch.as_ref().map(|dir| dir.path().to_path_buf()))
    }

    /// Phase 1: fans one producer task per input file out to the pool and
    /// accumulates the produced runs.
    ///
    /// Submission happens in batches of `2 * workers` handles. On failure
    /// the in-flight batch is drained first, then every collected run is
    /// removed and the first observed error is returned.
    fn generate_runs(&self, inputs: &[PathBuf], names: &TempNames) -> Result<Vec<Run>, SortError> {
        let producer = RunProducer::new(self.capacity, self.rw_buf_size);
        let batch_size = (2 * self.workers).max(1);

        let mut runs: Vec<Run> = Vec::new();
        let mut failure: Option<SortError> = None;

        for (batch_index, batch) in inputs.chunks(batch_size).enumerate() {
            let mut handles = Vec::with_capacity(batch.len());
            for (offset, input) in batch.iter().enumerate() {
                let producer = producer.clone();
                let names = names.clone();
                let input = input.clone();
                let file_index = batch_index * batch_size + offset;

                match self
                    .pool
                    .submit(move || producer.produce(&input, &names, file_index))
                {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        failure.get_or_insert(err);
                        break;
                    }
                }
            }

            for handle in handles {
                match handle.join().and_then(|result| result) {
                    Ok(mut produced) => runs.append(&mut produced),
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }

            if failure.is_some() {
                break;
            }
        }

        match failure {
            Some(err) => {
                self.cleanup(runs);
                Err(err)
            }
            None => Ok(runs),
        }
    }

    /// Phase 2: merges the run set in rounds of bounded fan-in until a
    /// single run remains, then moves it onto the output path.
    fn merge_runs(
        &self,
        mut runs: Vec<Run>,
        output: &Path,
        names: &TempNames,
    ) -> Result<SortStats, SortError> {
        let initial_runs = runs.len();
        let records: u64 = runs.iter().map(|run| run.records).sum();

        if runs.is_empty() {
            fs::File::create(output).map_err(|err| SortError::Open {
                path: output.to_path_buf(),
                source: err,
            })?;
            return Ok(SortStats {
                records: 0,
                runs: 0,
                rounds: 0,
            });
        }

        let merger = FileMerger::new(self.rw_buf_size);
        let mut rounds = 0;

        while runs.len() > 1 {
            log::debug!("merge round {} ({} runs)", rounds, runs.len());
            runs = self.merge_round(&merger, runs, output, names, rounds)?;
            rounds += 1;
        }

        let survivor = runs.remove(0);
        self.finalize(survivor, output)?;

        return Ok(SortStats {
            records,
            runs: initial_runs,
            rounds,
        });
    }

    /// Executes one merge round: consecutive groups of `merge_fanin` runs
    /// are merged in parallel, singleton groups pass through unchanged.
    ///
    /// The round is a barrier: every submitted merge resolves before the
    /// function returns. Inputs of a completed group are deleted as soon
    /// as its merge resolves successfully. On failure everything still on
    /// disk and known to this round is removed and the first observed
    /// error is returned.
    fn merge_round(
        &self,
        merger: &FileMerger,
        runs: Vec<Run>,
        output: &Path,
        names: &TempNames,
        round: usize,
    ) -> Result<Vec<Run>, SortError> {
        let mut next: Vec<Run> = Vec::new();
        let mut tasks = Vec::new();
        let mut failure: Option<SortError> = None;

        for (group_index, group) in runs.chunks(self.merge_fanin).enumerate() {
            if let [single] = group {
                next.push(single.clone());
                continue;
            }
            if failure.is_some() {
                // submission already failed; keep the group for cleanup
                next.extend(group.iter().cloned());
                continue;
            }

            let target = names.merge_path(output, round, group_index);
            let inputs = Vec::from_iter(group.iter().map(|run| run.path.clone()));
            let merger = merger.clone();
            let task_target = target.clone();

            match self.pool.submit(move || merger.merge(&inputs, &task_target)) {
                Ok(handle) => tasks.push((handle, group.to_vec(), target)),
                Err(err) => {
                    failure.get_or_insert(err);
                    next.extend(group.iter().cloned());
                }
            }
        }

        for (handle, group, target) in tasks {
            match handle.join().and_then(|result| result) {
                Ok(records) => {
                    // the group is consumed; its runs are deleted exactly once
                    for run in group {
                        let path = run.into_path();
                        if let Err(err) = fs::remove_file(&path) {
                            log::warn!("cannot remove merged run {}: {}", path.display(), err);
                        }
                    }
                    next.push(Run {
                        path: target,
                        records,
                    });
                }
                Err(err) => {
                    failure.get_or_insert(err);
                    // the merger removed its partial output; the group
                    // inputs are still on disk and need cleaning up
                    next.extend(group);
                }
            }
        }

        match failure {
            Some(err) => {
                self.cleanup(next);
                Err(err)
            }
            None => Ok(next),
        }
    }

    /// Moves the last surviving run onto the output path, falling back to
    /// a byte copy when rename fails (e.g. across filesystems).
    fn finalize(&self, survivor: Run, output: &Path) -> Result<(), SortError> {
        let path = survivor.into_path();

        if fs::rename(&path, output).is_ok() {
            return Ok(());
        }

        match fs::copy(&path, output) {
            Ok(_) => {
                if let Err(err) = fs::remove_file(&path) {
                    log::warn!("cannot remove final run {}: {}", path.display(), err);
                }
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(output);
                if let Err(remove_err) = fs::remove_file(&path) {
                    log::warn!(
                        "cannot remove temporary run {}: {}",
                        path.display(),
                        remove_err
                    );
                }
                Err(SortError::Rename {
                    path: output.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Best-effort removal of temporary runs.
    fn cleanup(&self, runs: Vec<Run>) {
        for run in runs {
            let path = run.into_path();
            if let Err(err) = fs::remove_file(&path) {
                log::warn!("cannot remove temporary run {}: {}", path.display(), err);
            }
        }
    }
}

/// Enumerates every regular file under `dir`, recursively.
///
/// Symbolic links are not followed. Filesystem errors during iteration
/// are logged and the entry is skipped.
fn collect_inputs(dir: &Path) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => inputs.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => log::warn!("skipping unreadable directory entry: {}", err),
        }
    }
    return inputs;
}

fn default_workers() -> usize {
    let workers = num_cpus::get();
    if workers == 0 {
        FALLBACK_WORKERS
    } else {
        workers
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use rand::prelude::*;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder};
    use crate::run::{RunReader, RECORD_SIZE};

    fn write_records(path: &Path, values: &[i64]) {
        let mut file = fs::File::create(path).unwrap();
        for value in values {
            file.write_all(&value.to_le_bytes()).unwrap();
        }
    }

    fn read_records(path: &Path) -> Vec<i64> {
        let reader = RunReader::open(path, 1024).unwrap();
        reader.collect::<Result<Vec<i64>, _>>().unwrap()
    }

    fn list_files(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::from_iter(
            walkdir::WalkDir::new(dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path()),
        );
        files.sort();
        files
    }

    fn default_sorter() -> ExternalSorter {
        ExternalSorterBuilder::new()
            .with_threads_number(2)
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_sorts_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();
        write_records(&input_dir.join("a.dat"), &[3, 1, 2]);
        write_records(&input_dir.join("b.dat"), &[0, -1]);
        let output = dir.path().join("sorted.bin");

        let stats = default_sorter().sort(&input_dir, &output).unwrap();

        assert_eq!(stats.records, 5);
        assert_eq!(read_records(&output), vec![-1, 0, 1, 2, 3]);
        assert_eq!(fs::metadata(&output).unwrap().len(), 5 * RECORD_SIZE as u64);
    }

    #[rstest]
    fn test_empty_inputs_produce_an_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();
        for index in 0..3 {
            fs::File::create(input_dir.join(format!("empty{}.dat", index))).unwrap();
        }
        let output = dir.path().join("sorted.bin");

        let stats = default_sorter().sort(&input_dir, &output).unwrap();

        assert_eq!(stats.records, 0);
        assert_eq!(stats.runs, 0);
        assert!(output.exists());
        assert_eq!(fs::metadata(&output).unwrap().len(), 0);
    }

    #[rstest]
    fn test_duplicates_survive_a_tiny_budget() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();
        write_records(&input_dir.join("dups.dat"), &[5, 5, 5, 5]);
        let output = dir.path().join("sorted.bin");

        let sorter = ExternalSorterBuilder::new()
            .with_memory_limit(1024)
            .with_threads_number(2)
            .build()
            .unwrap();
        let stats = sorter.sort(&input_dir, &output).unwrap();

        assert_eq!(stats.records, 4);
        assert_eq!(read_records(&output), vec![5, 5, 5, 5]);
    }

    #[rstest]
    fn test_descending_inputs_come_out_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();

        let descending = Vec::from_iter((0..2000i64).rev());
        for index in 0..5 {
            write_records(&input_dir.join(format!("desc{}.dat", index)), &descending);
        }
        let output = dir.path().join("sorted.bin");

        let sorter = ExternalSorterBuilder::new()
            .with_memory_limit(16 * 1024 * 1024)
            .with_threads_number(4)
            .build()
            .unwrap();
        let stats = sorter.sort(&input_dir, &output).unwrap();

        let expected = Vec::from_iter((0..2000i64).flat_map(|value| [value; 5]));
        assert_eq!(stats.records, 10_000);
        assert_eq!(read_records(&output), expected);
    }

    #[rstest]
    fn test_interleaved_duplicates_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();

        let mut expected = Vec::new();
        for index in 0..10 {
            let values = Vec::from_iter((0..500i64).map(|j| {
                if j % 2 == 0 {
                    42
                } else {
                    500 - j
                }
            }));
            expected.extend(&values);
            write_records(&input_dir.join(format!("mix{}.dat", index)), &values);
        }
        let output = dir.path().join("sorted.bin");

        let sorter = ExternalSorterBuilder::new()
            .with_memory_limit(8 * 1024 * 1024)
            .with_threads_number(4)
            .build()
            .unwrap();
        let stats = sorter.sort(&input_dir, &output).unwrap();

        expected.sort_unstable();
        assert_eq!(stats.records, expected.len() as u64);
        assert_eq!(read_records(&output), expected);
    }

    #[rstest]
    fn test_multi_round_merge_cleans_up_after_itself() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let mut expected = Vec::new();
        for index in 0..12 {
            let values = Vec::from_iter((0..100).map(|_| rng.gen::<i64>()));
            expected.extend(&values);
            write_records(&input_dir.join(format!("part{}.dat", index)), &values);
        }
        let inputs_before = list_files(&input_dir);
        let output = dir.path().join("sorted.bin");

        // 16-record buffers force several runs per file, a fan-in of 4
        // forces several merge rounds
        let sorter = ExternalSorterBuilder::new()
            .with_memory_limit(256)
            .with_threads_number(2)
            .with_merge_fanin(4)
            .build()
            .unwrap();
        let stats = sorter.sort(&input_dir, &output).unwrap();

        expected.sort_unstable();
        assert_eq!(stats.records, 1200);
        assert!(stats.runs > 12);
        assert!(stats.rounds > 1);
        assert_eq!(read_records(&output), expected);

        // inputs untouched, every temporary gone
        assert_eq!(list_files(&input_dir), inputs_before);
        assert_eq!(list_files(dir.path()).len(), inputs_before.len() + 1);
    }

    #[rstest]
    fn test_sorted_inputs_stay_intact() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();

        let mut expected = Vec::new();
        for index in 0..4i64 {
            let values = Vec::from_iter(index * 100..(index + 1) * 100);
            expected.extend(&values);
            write_records(&input_dir.join(format!("sorted{}.dat", index)), &values);
        }
        let inputs_before = list_files(&input_dir);
        let output = dir.path().join("sorted.bin");

        let stats = default_sorter().sort(&input_dir, &output).unwrap();

        expected.sort_unstable();
        assert_eq!(stats.records, 400);
        assert_eq!(read_records(&output), expected);
        assert_eq!(list_files(&input_dir), inputs_before);
    }

    #[rstest]
    fn test_scratch_directory_holds_every_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        let scratch_dir = dir.path().join("scratch");
        fs::create_dir(&input_dir).unwrap();
        fs::create_dir(&scratch_dir).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let mut expected = Vec::new();
        for index in 0..6 {
            let values = Vec::from_iter((0..200).map(|_| rng.gen::<i64>()));
            expected.extend(&values);
            write_records(&input_dir.join(format!("part{}.dat", index)), &values);
        }
        let inputs_before = list_files(&input_dir);
        let output = dir.path().join("sorted.bin");

        let sorter = ExternalSorterBuilder::new()
            .with_memory_limit(1024)
            .with_threads_number(2)
            .with_merge_fanin(3)
            .with_tmp_dir(&scratch_dir)
            .build()
            .unwrap();
        let stats = sorter.sort(&input_dir, &output).unwrap();
        drop(sorter);

        expected.sort_unstable();
        assert_eq!(stats.records, 1200);
        assert_eq!(read_records(&output), expected);

        // no temporary ever touched the input directory, and the scratch
        // space vanished with the sorter
        assert_eq!(list_files(&input_dir), inputs_before);
        assert_eq!(list_files(&scratch_dir), Vec::<PathBuf>::new());
        assert_eq!(fs::read_dir(&scratch_dir).unwrap().count(), 0);
    }

    #[rstest]
    fn test_shuffled_dataset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();

        let mut expected = Vec::from_iter(-5000..5000i64);
        expected.shuffle(&mut rand::thread_rng());
        for (index, chunk) in expected.chunks(2000).enumerate() {
            write_records(&input_dir.join(format!("part{}.dat", index)), chunk);
        }
        let output = dir.path().join("sorted.bin");

        let stats = default_sorter().sort(&input_dir, &output).unwrap();

        expected.sort_unstable();
        assert_eq!(stats.records, 10_000);
        assert_eq!(read_records(&output), expected);
    }

    #[rstest]
    fn test_corrupt_input_fails_the_job_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();
        write_records(&input_dir.join("good.dat"), &[1, 2, 3]);
        fs::File::create(input_dir.join("torn.dat"))
            .unwrap()
            .write_all(&[0u8; 11])
            .unwrap();
        let inputs_before = list_files(&input_dir);
        let output = dir.path().join("sorted.bin");

        let result = default_sorter().sort(&input_dir, &output);

        assert!(matches!(result, Err(super::SortError::Format { len: 11, .. })));
        assert!(!output.exists());
        assert_eq!(list_files(&input_dir), inputs_before);
    }

    #[rstest]
    fn test_missing_input_directory_yields_an_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sorted.bin");

        let stats = default_sorter()
            .sort(&dir.path().join("nowhere"), &output)
            .unwrap();

        assert_eq!(stats.records, 0);
        assert_eq!(fs::metadata(&output).unwrap().len(), 0);
    }
}
