//! The file-system collaborator: enumeration and content access.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supplies file enumeration and current text content for a workspace.
///
/// Change deltas are not part of this trait; they arrive at the scanner as an
/// explicit list (see [`crate::scanner::FileChange`]).
pub trait Workspace {
    /// Every file under the workspace root, in traversal order.
    fn files(&self) -> io::Result<Vec<PathBuf>>;

    /// Current text content of one file.
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Workspace rooted at a directory on the local file system.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Workspace for FsWorkspace {
    fn files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        // Name-sorted traversal keeps scan order deterministic.
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}
