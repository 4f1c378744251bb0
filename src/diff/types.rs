//! Shared data model for the directory diff core (spec.md §3, §4.F.2).

use std::path::PathBuf;
use std::time::SystemTime;

/// Priority levels for progressive scanning tasks (spec.md §4.F.6).
pub mod priority {
    pub const IMMEDIATE: i32 = 1000;
    pub const VISIBLE: i32 = 100;
    pub const EXPANDED: i32 = 50;
    pub const NORMAL: i32 = 10;
    pub const LOW: i32 = 1;
}

/// Immutable metadata for one directory entry (spec.md §3).
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub relative_path: String,
    pub is_directory: bool,
    pub size: u64,
    pub mtime: SystemTime,
    pub is_accessible: bool,
    pub error_message: Option<String>,
}

impl FileInfo {
    /// The entry's own name, i.e. the last `/`-separated component of
    /// `relative_path` — what `merge_children` matches against a node's
    /// existing child names.
    pub fn name_str(&self) -> &str {
        self.relative_path.rsplit('/').next().unwrap_or(&self.relative_path)
    }

    #[cfg(test)]
    pub fn new_for_test(name: &str, is_directory: bool) -> Self {
        FileInfo {
            path: PathBuf::from(name),
            relative_path: name.to_string(),
            is_directory,
            size: 0,
            mtime: SystemTime::UNIX_EPOCH,
            is_accessible: true,
            error_message: None,
        }
    }
}

/// Classification of the relationship between a left and a right entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceType {
    Identical,
    OnlyLeft,
    OnlyRight,
    ContentDifferent,
    /// A directory whose subtree holds at least one difference.
    ContainsDifference,
    /// Not yet scanned (directory) or not yet compared (file).
    Pending,
}

impl DifferenceType {
    /// Separator glyph rendered between the two columns for a row of this
    /// kind (spec.md §6): `=` identical, `!` content-different /
    /// contains-difference, `<` only-left, `>` only-right, `?` pending.
    pub fn separator_glyph(self) -> char {
        match self {
            DifferenceType::Identical => '=',
            DifferenceType::ContentDifferent | DifferenceType::ContainsDifference => '!',
            DifferenceType::OnlyLeft => '<',
            DifferenceType::OnlyRight => '>',
            DifferenceType::Pending => '?',
        }
    }

    pub fn is_identical(self) -> bool {
        matches!(self, DifferenceType::Identical)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, DifferenceType::Pending)
    }
}

/// Task for queuing a single-level directory scan.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub left_path: Option<PathBuf>,
    pub right_path: Option<PathBuf>,
    pub relative_path: String,
    pub priority: i32,
    pub is_visible: bool,
}

/// Task for queuing a two-sided file comparison.
#[derive(Debug, Clone)]
pub struct ComparisonTask {
    pub left_path: PathBuf,
    pub right_path: PathBuf,
    pub relative_path: String,
    pub priority: i32,
    pub is_visible: bool,
}

/// A single node in the directory tree.
///
/// Owned by its parent's `children` vector (spec.md §9's design note rules
/// out a second owning parent reference); `parent` is an index path from
/// the root, read only under the tree lock, and is never used to free or
/// share ownership of a node.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub left_path: Option<PathBuf>,
    pub right_path: Option<PathBuf>,
    pub is_directory: bool,
    pub difference_type: DifferenceType,
    pub depth: usize,
    pub is_expanded: bool,
    pub children: Vec<Box<TreeNode>>,
    /// Index path from the root to this node's parent; empty for the root.
    pub parent: Vec<usize>,
    pub children_scanned: bool,
    pub content_compared: bool,
    pub scan_in_progress: bool,
    /// Set when a comparison of this node's two sides failed (spec.md §7).
    pub comparison_error: Option<String>,
}

impl TreeNode {
    pub fn root() -> Self {
        TreeNode {
            name: String::new(),
            left_path: None,
            right_path: None,
            is_directory: true,
            difference_type: DifferenceType::Pending,
            depth: 0,
            is_expanded: true,
            children: Vec::new(),
            parent: Vec::new(),
            children_scanned: false,
            content_compared: false,
            scan_in_progress: false,
            comparison_error: None,
        }
    }

    /// Annotation suffix shown after the node's name: "…" for an unscanned
    /// directory, "[pending]" for an uncompared two-sided file,
    /// "[scanning…]" while a scan/comparison is in flight, "⚠" when a
    /// comparison error was recorded.
    pub fn annotation_suffix(&self) -> &'static str {
        if self.scan_in_progress {
            return " [scanning…]";
        }
        if self.comparison_error.is_some() {
            return " ⚠";
        }
        if self.is_directory && !self.children_scanned {
            return " …";
        }
        if !self.is_directory && !self.content_compared && self.left_path.is_some() && self.right_path.is_some() {
            return " [pending]";
        }
        ""
    }

    /// Sort key used to keep `children` ordered directories-before-files,
    /// case-insensitive lexical within each group (spec.md invariant 7).
    fn sort_key(node: &TreeNode) -> (bool, String) {
        (!node.is_directory, node.name.to_lowercase())
    }

    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| TreeNode::sort_key(a).cmp(&TreeNode::sort_key(b)));
    }
}
