//! Blocking, single-level directory reads (spec.md §4.F.1, §4.F.4).
//!
//! Used both synchronously (initial open, on-demand expand) and by the
//! scanner worker thread. Never recurses — breadth-first traversal is
//! driven by re-queuing a `ScanTask` per discovered subdirectory instead.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use super::types::FileInfo;

pub struct DirectoryScanner;

impl DirectoryScanner {
    /// List the immediate children of `dir_path`. `relative_dir` is this
    /// directory's own path relative to the side's root ("" for the
    /// root); each returned `FileInfo.relative_path` is `relative_dir`
    /// joined with the entry's name using `/`.
    ///
    /// A failure to open `dir_path` itself is returned as `Err` — the
    /// caller decides whether that is fatal (root unreadable) or
    /// non-fatal (a directory that became unreadable mid-scan). Per-entry
    /// stat failures never fail the whole listing; they are recorded as
    /// an inaccessible `FileInfo` instead (spec.md §6).
    pub fn scan_single_level(
        dir_path: &Path,
        relative_dir: &str,
        show_hidden: bool,
    ) -> io::Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir_path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let relative_path = if relative_dir.is_empty() {
                name.clone()
            } else {
                format!("{relative_dir}/{name}")
            };
            let path = entry.path();

            out.push(match fs::metadata(&path) {
                Ok(metadata) => FileInfo {
                    path,
                    relative_path,
                    is_directory: metadata.is_dir(),
                    size: if metadata.is_dir() { 0 } else { metadata.len() },
                    mtime: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    is_accessible: true,
                    error_message: None,
                },
                Err(err) => FileInfo {
                    path,
                    relative_path,
                    is_directory: false,
                    size: 0,
                    mtime: SystemTime::UNIX_EPOCH,
                    is_accessible: false,
                    error_message: Some(err.to_string()),
                },
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn lists_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.txt")).unwrap().write_all(b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let entries = DirectoryScanner::scan_single_level(dir.path(), "", true).unwrap();
        assert_eq!(entries.len(), 2);
        let names: Vec<_> = entries.iter().map(|e| e.relative_path.clone()).collect();
        assert!(names.contains(&"a.txt".to_string()));
        assert!(names.contains(&"sub".to_string()));
    }

    #[test]
    fn hides_dotfiles_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        File::create(dir.path().join("visible.txt")).unwrap();

        let filtered = DirectoryScanner::scan_single_level(dir.path(), "", false).unwrap();
        assert_eq!(filtered.len(), 1);

        let unfiltered = DirectoryScanner::scan_single_level(dir.path(), "", true).unwrap();
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn relative_path_is_nested_under_parent() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("leaf.txt")).unwrap();
        let entries = DirectoryScanner::scan_single_level(dir.path(), "a/b", true).unwrap();
        assert_eq!(entries[0].relative_path, "a/b/leaf.txt");
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(DirectoryScanner::scan_single_level(&missing, "", true).is_err());
    }
}
