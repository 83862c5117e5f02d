//! `binsort` is a parallel external merge sort for binary datasets of 64-bit signed integers.
//!
//! The sorter handles datasets that do not fit into the main memory (RAM) of a computer:
//! every file under an input directory is streamed through a bounded in-memory buffer and
//! spilled to disk as sorted runs, which are then merged hierarchically into a single
//! sorted output file. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `binsort` supports the following features:
//!
//! * **Memory budget:**
//!   a global byte budget caps how many records the run-generation phase buffers at any
//!   instant; the budget is partitioned evenly across workers.
//! * **Multithreading:**
//!   run generation and merging both fan out over a pool of long-lived worker threads,
//!   one handle per task.
//! * **Hierarchical merging:**
//!   any number of runs is merged in rounds of bounded fan-in, so the sorter never opens
//!   more than a fixed number of files per merge regardless of dataset size.
//!
//! Records are 8-byte little-endian signed integers; a file whose length is not a whole
//! number of records is rejected.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use binsort::ExternalSorterBuilder;
//!
//! fn main() {
//!     env_logger::init();
//!
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_memory_limit(64 * 1024 * 1024)
//!         .with_threads_number(8)
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter
//!         .sort(Path::new("./data"), Path::new("./sorted.bin"))
//!         .unwrap();
//!     println!("{} records sorted", stats.records);
//! }
//! ```

pub mod merger;
pub mod names;
pub mod pool;
pub mod producer;
pub mod run;
pub mod sort;

pub use merger::FileMerger;
pub use names::TempNames;
pub use pool::{TaskHandle, WorkerPool};
pub use producer::RunProducer;
pub use run::{Run, RunReader, RunWriter, RECORD_SIZE};
pub use sort::{
    ExternalSorter, ExternalSorterBuilder, SortError, SortStats, DEFAULT_MEMORY_LIMIT,
    DEFAULT_MERGE_FANIN, DEFAULT_RW_BUF_SIZE,
};
