//! `DiffEngine` — the pure, synchronous half of the diff core (spec.md
//! §4.F.1): building the initial tree from a one-level scan of both roots,
//! and comparing two files' contents. Used by `start_scan` (initial open)
//! and by `open_file_diff` (on-demand compare before pushing the file-diff
//! layer), as well as by the comparator worker for the identical logic.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::DiffError;

use super::scanner::DirectoryScanner;
use super::types::{DifferenceType, FileInfo, TreeNode};

/// 8 KiB chunks, per spec.md §6 "File comparison".
const COMPARE_CHUNK_SIZE: usize = 8 * 1024;

pub struct DiffEngine;

impl DiffEngine {
    /// Synchronously scan both roots one level deep and build the initial
    /// tree (spec.md §4.F.3 steps 1-2). Returns the root node plus the two
    /// per-side file maps, keyed by relative path.
    pub fn build_initial_tree(
        left_root: &Path,
        right_root: &Path,
        show_hidden: bool,
    ) -> Result<(TreeNode, HashMap<String, FileInfo>, HashMap<String, FileInfo>), DiffError> {
        let left_entries = DirectoryScanner::scan_single_level(left_root, "", show_hidden)
            .map_err(|source| DiffError::RootUnreadable { path: left_root.to_path_buf(), source })?;
        let right_entries = DirectoryScanner::scan_single_level(right_root, "", show_hidden)
            .map_err(|source| DiffError::RootUnreadable { path: right_root.to_path_buf(), source })?;

        let mut left_files = HashMap::new();
        for entry in left_entries {
            left_files.insert(entry.relative_path.clone(), entry);
        }
        let mut right_files = HashMap::new();
        for entry in right_entries {
            right_files.insert(entry.relative_path.clone(), entry);
        }

        let mut root = TreeNode::root();
        root.children_scanned = true;

        let mut names: Vec<&String> = left_files.keys().chain(right_files.keys()).collect();
        names.sort();
        names.dedup();

        for name in names {
            let left = left_files.get(name);
            let right = right_files.get(name);
            let is_directory = left.map(|f| f.is_directory).unwrap_or(false)
                || right.map(|f| f.is_directory).unwrap_or(false);

            let (difference_type, content_compared) = match (left.is_some(), right.is_some()) {
                (true, false) => (DifferenceType::OnlyLeft, true),
                (false, true) => (DifferenceType::OnlyRight, true),
                _ => (DifferenceType::Pending, false),
            };

            let child = TreeNode {
                name: name.clone(),
                left_path: left.map(|f| f.path.clone()),
                right_path: right.map(|f| f.path.clone()),
                is_directory,
                difference_type,
                depth: 1,
                is_expanded: false,
                children: Vec::new(),
                parent: Vec::new(),
                children_scanned: false,
                content_compared,
                scan_in_progress: false,
                comparison_error: None,
            };
            root.children.push(Box::new(child));
        }
        root.sort_children();
        for (index, child) in root.children.iter_mut().enumerate() {
            child.parent = vec![index];
        }

        Ok((root, left_files, right_files))
    }

    /// Byte-compare two files: equal sizes, then equal 8 KiB chunks
    /// (spec.md §6). Any I/O error is surfaced so the caller can record it
    /// in `comparison_errors` and treat the pair as different.
    pub fn compare_files(left: &Path, right: &Path) -> Result<bool, DiffError> {
        let left_meta = std::fs::metadata(left)
            .map_err(|source| DiffError::CompareIo { left: left.to_path_buf(), right: right.to_path_buf(), source })?;
        let right_meta = std::fs::metadata(right)
            .map_err(|source| DiffError::CompareIo { left: left.to_path_buf(), right: right.to_path_buf(), source })?;

        if left_meta.len() != right_meta.len() {
            return Ok(false);
        }

        let mut left_reader = BufReader::new(
            File::open(left).map_err(|source| DiffError::CompareIo { left: left.to_path_buf(), right: right.to_path_buf(), source })?,
        );
        let mut right_reader = BufReader::new(
            File::open(right).map_err(|source| DiffError::CompareIo { left: left.to_path_buf(), right: right.to_path_buf(), source })?,
        );

        let mut left_buf = vec![0u8; COMPARE_CHUNK_SIZE];
        let mut right_buf = vec![0u8; COMPARE_CHUNK_SIZE];
        loop {
            let left_read = left_reader
                .read(&mut left_buf)
                .map_err(|source| DiffError::CompareIo { left: left.to_path_buf(), right: right.to_path_buf(), source })?;
            let right_read = right_reader
                .read(&mut right_buf)
                .map_err(|source| DiffError::CompareIo { left: left.to_path_buf(), right: right.to_path_buf(), source })?;

            if left_read != right_read || left_buf[..left_read] != right_buf[..right_read] {
                return Ok(false);
            }
            if left_read == 0 {
                return Ok(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn write_file(path: &Path, contents: &[u8]) {
        File::create(path).unwrap().write_all(contents).unwrap();
    }

    #[test]
    fn identical_files_compare_equal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_file(&a, b"hello world");
        write_file(&b, b"hello world");
        assert!(DiffEngine::compare_files(&a, &b).unwrap());
    }

    #[test]
    fn different_content_same_size_compares_unequal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_file(&a, b"hello world");
        write_file(&b, b"HELLO world");
        assert!(!DiffEngine::compare_files(&a, &b).unwrap());
    }

    #[test]
    fn different_size_short_circuits_without_reading_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_file(&a, b"short");
        write_file(&b, b"a lot longer than short");
        assert!(!DiffEngine::compare_files(&a, &b).unwrap());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("missing");
        let b = dir.path().join("b");
        write_file(&b, b"x");
        assert!(DiffEngine::compare_files(&a, &b).is_err());
    }

    #[test]
    fn build_initial_tree_classifies_top_level() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        write_file(&left.path().join("only_left.txt"), b"x");
        write_file(&right.path().join("only_right.txt"), b"y");
        write_file(&left.path().join("shared.txt"), b"z");
        write_file(&right.path().join("shared.txt"), b"z");
        fs::create_dir(left.path().join("subdir")).unwrap();
        fs::create_dir(right.path().join("subdir")).unwrap();

        let (root, left_files, right_files) =
            DiffEngine::build_initial_tree(left.path(), right.path(), true).unwrap();

        assert!(root.children_scanned);
        assert_eq!(left_files.len(), 3);
        assert_eq!(right_files.len(), 3);

        let only_left = root.children.iter().find(|c| c.name == "only_left.txt").unwrap();
        assert_eq!(only_left.difference_type, DifferenceType::OnlyLeft);
        assert!(only_left.content_compared);

        let shared = root.children.iter().find(|c| c.name == "shared.txt").unwrap();
        assert_eq!(shared.difference_type, DifferenceType::Pending);
        assert!(!shared.content_compared);

        let subdir = root.children.iter().find(|c| c.name == "subdir").unwrap();
        assert_eq!(subdir.difference_type, DifferenceType::Pending);
        assert!(!subdir.children_scanned);
    }
}
