//! Event-group discovery
//!
//! The input pattern carries one wildcarded directory component, e.g.
//! `download/event_*/processed/*.BHZ.sac`. Everything up to the last `/` is
//! glob-expanded and sorted; each matched directory together with the
//! trailing filename pattern is one event group.

use snafu::Snafu;
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
pub enum JobError {
    #[snafu(display("input pattern '{pattern}' has no directory component"))]
    NoDirectory { pattern: String },

    #[snafu(display("input pattern '{pattern}' is not a valid glob: {source}"))]
    BadPattern { pattern: String, source: glob::PatternError },
}

/// One event group: a directory and the filename pattern to expand in it.
#[derive(Debug, Clone)]
pub struct Group {
    pub dir: PathBuf,
    pub file_pattern: String,
}

impl Group {
    /// Lexicographically sorted trace files of this group.
    pub fn trace_files(&self) -> Vec<PathBuf> {
        let pattern = self.dir.join(&self.file_pattern);
        let mut files: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}

/// Expand the directory part of `pattern` into the ordered list of event
/// groups.
pub fn expand_groups(pattern: &str) -> Result<Vec<Group>, JobError> {
    let (dir_part, file_part) = pattern
        .rsplit_once('/')
        .ok_or_else(|| JobError::NoDirectory {
            pattern: pattern.to_string(),
        })?;
    let paths = glob::glob(dir_part).map_err(|source| JobError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut dirs: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs
        .into_iter()
        .map(|dir| Group {
            dir,
            file_pattern: file_part.to_string(),
        })
        .collect())
}

/// Convenience for logging: the full per-group pattern.
pub fn group_label(group: &Group) -> String {
    Path::new(&group.dir)
        .join(&group.file_pattern)
        .to_string_lossy()
        .into_owned()
}
