//! Locating robot description files on disk.
//!
//! Every file named [`DESCRIPTION_FILE_NAME`] below the search root is read;
//! symlinks are not followed. Unreadable files and directories are logged and
//! skipped.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DESCRIPTION_FILE_NAME: &str = "robot_description.yaml";

/// A description file and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionFile {
    pub path: PathBuf,
    pub text: String,
}

/// Find and read every description file under `root`, in path order.
pub fn find_description_files(root: impl AsRef<Path>) -> Vec<DescriptionFile> {
    let root = root.as_ref();
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable path");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && e.file_name() == DESCRIPTION_FILE_NAME)
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "found robot description");
                files.push(DescriptionFile { path, text });
            }
            Err(e) => warn!(path = %path.display(), error = %e, "cannot read robot description"),
        }
    }
    files
}
