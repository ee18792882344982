//! Expands user-supplied files and folders into scan targets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{MediaKind, TargetItem};

/// Expand a mixed list of files and directories into supported media targets.
///
/// Directories are walked recursively. Output keeps first-seen order and holds
/// each path once. Unsupported extensions and missing paths are dropped.
pub fn enumerate<P: AsRef<Path>>(paths: &[P]) -> Vec<TargetItem> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut targets = Vec::new();
    let mut push = |path: PathBuf, kind: MediaKind| {
        if seen.insert(path.clone()) {
            targets.push(TargetItem { path, kind });
        }
    };

    for input in paths {
        let input = input.as_ref();
        if input.is_dir() {
            for path in list_media_files(input) {
                if let Some(kind) = MediaKind::from_path(&path) {
                    push(path, kind);
                }
            }
        } else if input.is_file() {
            if let Some(kind) = MediaKind::from_path(input) {
                push(input.to_path_buf(), kind);
            }
        } else {
            debug!(path = %input.display(), "skipping missing path");
        }
    }
    targets
}

fn list_media_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| MediaKind::from_path(p).is_some())
        .collect();
    files.sort();
    files
}
