//! Temporary-file naming.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Allocates paths for temporary runs and merge intermediates.
///
/// Paths are unique across workers and rounds: run paths embed the input
/// file plus a per-producer index, merge paths embed the round and group
/// indices. In scratch mode every temporary lives under a dedicated
/// directory; otherwise runs sit next to their input and intermediates
/// next to the output, the rename-friendly default.
#[derive(Debug, Clone, Default)]
pub struct TempNames {
    scratch: Option<PathBuf>,
}

impl TempNames {
    pub fn new(scratch: Option<PathBuf>) -> Self {
        TempNames { scratch }
    }

    /// Path for run `run_index` produced from the input file with
    /// enumeration index `file_index`.
    pub fn run_path(&self, input: &Path, file_index: usize, run_index: usize) -> PathBuf {
        match &self.scratch {
            Some(dir) => dir.join(format!("input-{}.run{}", file_index, run_index)),
            None => with_suffix(input, &format!(".run{}", run_index)),
        }
    }

    /// Path for the intermediate produced by merge group `group` of round
    /// `round`.
    pub fn merge_path(&self, output: &Path, round: usize, group: usize) -> PathBuf {
        match &self.scratch {
            Some(dir) => dir.join(format!("merge-r{}-g{}.run", round, group)),
            None => with_suffix(output, &format!(".r{}-g{}.run", round, group)),
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(suffix);
    path.with_file_name(name)
}
