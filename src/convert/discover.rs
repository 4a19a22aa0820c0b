//! Recursive discovery of source documents.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use super::FileJob;

/// Discovery errors. Any error aborts discovery; partial results are dropped.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{} is not under {}", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// File name glob supporting `*`, `?` and `[...]` classes (`[!...]` negates).
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, DiscoverError> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|source| DiscoverError::Pattern { pattern: pattern.to_string(), source })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    if c == '\\' || c == '[' || c == '^' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(']');
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// Collect a job for every file under `root` whose name matches `pattern`.
///
/// Destinations mirror the source layout under `out_dir` with the extension
/// replaced by `extension`. Jobs are returned in traversal order (sorted by
/// file name within each directory).
///
/// # Errors
/// Returns an error on an invalid pattern or any traversal failure.
pub fn discover(root: &Path, out_dir: &Path, pattern: &str, extension: &str) -> Result<Vec<FileJob>, DiscoverError> {
    let pattern = NamePattern::new(pattern)?;
    let mut jobs = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoverError::Walk { root: root.to_path_buf(), source })?;
        // Links to files count as documents; links to directories are not descended
        let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        if !pattern.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let abs_path = entry.into_path();
        let rel_path = abs_path
            .strip_prefix(root)
            .map_err(|_| DiscoverError::OutsideRoot { path: abs_path.clone(), root: root.to_path_buf() })?
            .to_path_buf();
        let dest_path = out_dir.join(rel_path.with_extension(extension));

        debug!("Found {} -> {}", rel_path.display(), dest_path.display());
        jobs.push(FileJob { abs_path, rel_path, dest_path });
    }

    Ok(jobs)
}
