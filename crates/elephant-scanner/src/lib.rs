//! C3 — DirectoryScanner.
//!
//! Lazily enumerates `(property_id, group_id, path)` triples from an
//! input tree laid out as `<root>/<property_id>/<group_id>.json`,
//! validating the layout along the way.

use elephant_utils::types::{FileEntry, is_cid_like};
use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input path {0} does not exist or is not a directory")]
    NotADirectory(PathBuf),
    #[error("input directory {0} contains no valid property/group structure")]
    InvalidStructure(PathBuf),
}

/// Lists the immediate subdirectories of `root` whose name passes the CID
/// predicate, in code-point sorted order. I/O errors reading `root`
/// itself propagate; individual unreadable entries are skipped.
async fn list_property_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(root).await {
        Ok(rd) => rd,
        Err(e) => {
            tracing::warn!(path = %root.display(), error = %e, "failed to read root directory");
            return dirs;
        }
    };
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !is_cid_like(&name) {
                    continue;
                }
                match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => dirs.push(entry.path()),
                    _ => continue,
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %root.display(), error = %e, "error while listing root directory");
                break;
            }
        }
    }
    dirs.sort();
    dirs
}

/// Lists `(group_id, path)` pairs for valid `*.json` files directly under
/// `property_dir`, in code-point sorted order by group id. Errors reading
/// this one subdirectory (permission, I/O) are logged and produce an
/// empty result; they do not abort the overall scan.
async fn list_group_files(property_dir: &Path) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(property_dir).await {
        Ok(rd) => rd,
        Err(e) => {
            tracing::warn!(path = %property_dir.display(), error = %e, "skipping unreadable property directory");
            return files;
        }
    };
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if !is_cid_like(stem) {
                    continue;
                }
                match entry.file_type().await {
                    Ok(ft) if ft.is_file() => files.push((stem.to_string(), path)),
                    _ => continue,
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %property_dir.display(), error = %e, "error while listing property directory");
                break;
            }
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Validates the input tree's layout per spec §4.3: the root must
    /// exist, be a directory, and contain at least one property-id
    /// subdirectory that itself contains at least one valid group-id
    /// `*.json` file. Non-CID entries are silently ignored, not errors.
    pub async fn validate_structure(root: &Path) -> Result<(), ScanError> {
        let is_dir = tokio::fs::metadata(root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        for dir in list_property_dirs(root).await {
            if !list_group_files(&dir).await.is_empty() {
                return Ok(());
            }
        }
        Err(ScanError::InvalidStructure(root.to_path_buf()))
    }

    /// Exact count of entries `scan` would produce, without materializing
    /// the file list. Reuses the same traversal as `scan`.
    pub async fn count(root: &Path) -> usize {
        let mut total = 0;
        for dir in list_property_dirs(root).await {
            total += list_group_files(&dir).await.len();
        }
        total
    }

    /// Lazily enumerate `FileEntry` batches of `batch_size`, in
    /// depth-first traversal order (property dirs in sorted order, group
    /// files within a property dir in sorted order).
    pub fn scan(root: PathBuf, batch_size: usize) -> impl Stream<Item = Vec<FileEntry>> {
        stream::unfold(ScanState::new(root, batch_size.max(1)), |mut state| async move {
            match state.next_batch().await {
                Some(batch) => Some((batch, state)),
                None => None,
            }
        })
    }
}

struct ScanState {
    root: PathBuf,
    batch_size: usize,
    property_dirs: Option<std::vec::IntoIter<PathBuf>>,
    current_property_id: String,
    current_files: std::vec::IntoIter<(String, PathBuf)>,
    exhausted: bool,
}

impl ScanState {
    fn new(root: PathBuf, batch_size: usize) -> Self {
        Self {
            root,
            batch_size,
            property_dirs: None,
            current_property_id: String::new(),
            current_files: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    async fn next_batch(&mut self) -> Option<Vec<FileEntry>> {
        if self.exhausted {
            return None;
        }
        if self.property_dirs.is_none() {
            let dirs = list_property_dirs(&self.root).await;
            self.property_dirs = Some(dirs.into_iter());
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            if let Some((group_id, path)) = self.current_files.next() {
                batch.push(FileEntry {
                    property_id: self.current_property_id.clone(),
                    group_id,
                    path,
                });
                continue;
            }
            // current directory's files exhausted, advance to the next one
            let Some(dirs) = self.property_dirs.as_mut() else {
                unreachable!("property_dirs initialized above");
            };
            let Some(next_dir) = dirs.next() else {
                self.exhausted = true;
                break;
            };
            self.current_property_id = next_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.current_files = list_group_files(&next_dir).await.into_iter();
        }

        if batch.is_empty() { None } else { Some(batch) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::fs;
    use tempfile::tempdir;

    const PROP_A: &str = "QmPropAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const GROUP_A: &str = "QmGroupAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const GROUP_B: &str = "QmGroupBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    fn write_fixture(root: &Path, property: &str, group: &str) {
        let dir = root.join(property);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{group}.json")), b"{}").unwrap();
    }

    #[tokio::test]
    async fn empty_directory_fails_validation() {
        let dir = tempdir().unwrap();
        let err = DirectoryScanner::validate_structure(dir.path()).await;
        assert!(matches!(err, Err(ScanError::InvalidStructure(_))));
    }

    #[tokio::test]
    async fn nonexistent_root_fails_validation() {
        let err = DirectoryScanner::validate_structure(Path::new("/no/such/path")).await;
        assert!(matches!(err, Err(ScanError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn non_cid_entries_are_ignored_not_errors() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("not-a-cid")).unwrap();
        write_fixture(dir.path(), PROP_A, GROUP_A);
        assert!(DirectoryScanner::validate_structure(dir.path()).await.is_ok());
        assert_eq!(DirectoryScanner::count(dir.path()).await, 1);
    }

    #[tokio::test]
    async fn scan_yields_batches_in_order() {
        let dir = tempdir().unwrap();
        write_fixture(dir.path(), PROP_A, GROUP_A);
        write_fixture(dir.path(), PROP_A, GROUP_B);

        let batches: Vec<_> = DirectoryScanner::scan(dir.path().to_path_buf(), 1)
            .collect()
            .await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].group_id, GROUP_A);
        assert_eq!(batches[1][0].group_id, GROUP_B);
    }

    #[tokio::test]
    async fn scan_respects_batch_size() {
        let dir = tempdir().unwrap();
        write_fixture(dir.path(), PROP_A, GROUP_A);
        write_fixture(dir.path(), PROP_A, GROUP_B);

        let batches: Vec<_> = DirectoryScanner::scan(dir.path().to_path_buf(), 10)
            .collect()
            .await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn count_matches_scan_total() {
        let dir = tempdir().unwrap();
        write_fixture(dir.path(), PROP_A, GROUP_A);
        write_fixture(dir.path(), PROP_A, GROUP_B);

        let count = DirectoryScanner::count(dir.path()).await;
        let total: usize = DirectoryScanner::scan(dir.path().to_path_buf(), 1)
            .collect::<Vec<_>>()
            .await
            .iter()
            .map(Vec::len)
            .sum();
        assert_eq!(count, total);
    }
}
