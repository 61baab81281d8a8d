//! Artifact selection by glob pattern
//!
//! The image stage consumes exactly one build output. A pattern resolving to
//! zero or several files is an error here, never a silent pick.

use ignore::{overrides::OverrideBuilder, WalkBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from resolving an artifact glob
#[derive(Debug, Error)]
pub enum SelectError {
    /// The glob pattern itself is malformed
    #[error("invalid artifact pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    /// The pattern matched no files
    #[error("artifact pattern '{pattern}' matched no files under {}", .root.display())]
    NoMatch { pattern: String, root: PathBuf },

    /// The pattern matched more than one file
    #[error("artifact pattern '{pattern}' is ambiguous: matched {count} files")]
    Ambiguous { pattern: String, count: usize },
}

/// Returns every file under `root` matching `pattern`, sorted for
/// deterministic ordering.
pub fn matching_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, SelectError> {
    let mut builder = OverrideBuilder::new(root);
    builder
        .add(pattern)
        .map_err(|source| SelectError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
    let matcher = builder.build().map_err(|source| SelectError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut matches = Vec::new();
    for result in WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build()
    {
        let entry = match result {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        if path.is_file() && matcher.matched(path, false).is_whitelist() {
            matches.push(path.to_path_buf());
        }
    }

    matches.sort();
    Ok(matches)
}

/// Resolves `pattern` to exactly one file under `root`.
pub fn select_artifact(root: &Path, pattern: &str) -> Result<PathBuf, SelectError> {
    let mut matches = matching_files(root, pattern)?;

    match matches.len() {
        0 => Err(SelectError::NoMatch {
            pattern: pattern.to_string(),
            root: root.to_path_buf(),
        }),
        1 => Ok(matches.swap_remove(0)),
        count => Err(SelectError::Ambiguous {
            pattern: pattern.to_string(),
            count,
        }),
    }
}
