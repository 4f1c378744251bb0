//! Tree-shaped operations shared by the scanner worker, comparator worker,
//! and the UI-thread expand/collapse/flatten logic (spec.md §3, §4.F.7-9).
//!
//! A node is addressed by its `NodePath`: a sequence of child indices from
//! the root (empty for the root itself). This is the index-path
//! non-owning back-reference spec.md §9 prescribes in place of a second
//! owning `parent` pointer; walking a path is how this crate implements
//! the bottom-up classification propagation the original does via a
//! direct parent pointer.

use super::types::{DifferenceType, FileInfo, TreeNode};

pub type NodePath = Vec<usize>;

pub fn get_node<'a>(root: &'a TreeNode, path: &[usize]) -> Option<&'a TreeNode> {
    let mut node = root;
    for &index in path {
        node = node.children.get(index)?;
    }
    Some(node)
}

pub fn get_node_mut<'a>(root: &'a mut TreeNode, path: &[usize]) -> Option<&'a mut TreeNode> {
    let mut node = root;
    for &index in path {
        node = node.children.get_mut(index)?;
    }
    Some(node)
}

/// Join the names along `path` with `/`, the per-side relative-path
/// separator (spec.md §3, §6).
pub fn relative_path_of(root: &TreeNode, path: &[usize]) -> String {
    let mut parts = Vec::with_capacity(path.len());
    let mut node = root;
    for &index in path {
        node = &node.children[index];
        parts.push(node.name.as_str());
    }
    parts.join("/")
}

/// Find the node addressed by a `/`-joined relative path, by walking
/// children names from the root (spec.md §4.F.4 step 4's "locate the
/// target node by relative path").
pub fn find_path_by_relative(root: &TreeNode, relative_path: &str) -> Option<NodePath> {
    if relative_path.is_empty() {
        return Some(Vec::new());
    }
    let mut path = Vec::new();
    let mut node = root;
    for part in relative_path.split('/') {
        let index = node.children.iter().position(|c| c.name == part)?;
        path.push(index);
        node = &node.children[index];
    }
    Some(path)
}

/// Classify a single node from its own state and (for directories) its
/// children's current classifications, without recursing further
/// (spec.md §4.F.7). Two-sided files keep whatever classification the
/// comparator already assigned; this function never performs I/O.
pub fn classify_node(node: &TreeNode) -> DifferenceType {
    if node.depth == 0 {
        return classify_directory_from_children(node);
    }
    match (node.left_path.is_some(), node.right_path.is_some()) {
        (true, false) => DifferenceType::OnlyLeft,
        (false, true) => DifferenceType::OnlyRight,
        _ => {
            if node.is_directory {
                classify_directory_from_children(node)
            } else if !node.content_compared {
                DifferenceType::Pending
            } else {
                node.difference_type
            }
        }
    }
}

fn classify_directory_from_children(node: &TreeNode) -> DifferenceType {
    if !node.children_scanned && node.children.is_empty() {
        return DifferenceType::Pending;
    }
    let mut has_pending = false;
    for child in &node.children {
        match child.difference_type {
            DifferenceType::Identical => {}
            DifferenceType::Pending => has_pending = true,
            _ => return DifferenceType::ContainsDifference,
        }
    }
    if has_pending {
        DifferenceType::Pending
    } else {
        DifferenceType::Identical
    }
}

/// Reclassify `node`'s direct children, then `node` itself (spec.md
/// §4.F.4 step 8, used right after merging newly scanned children in).
pub fn classify_node_and_children(node: &mut TreeNode) {
    for child in node.children.iter_mut() {
        child.difference_type = classify_node(child);
    }
    node.difference_type = classify_node(node);
}

/// Walk from the root down to the node at `path`, reclassifying every
/// ancestor (not the node itself — its own classification was already
/// set by the caller) on the way back up (spec.md §4.F.5 step 4,
/// §4.F.7's propagation helper).
pub fn propagate_classification(root: &mut TreeNode, path: &[usize]) {
    fn walk(node: &mut TreeNode, remaining: &[usize]) {
        if remaining.is_empty() {
            return;
        }
        let index = remaining[0];
        if index >= node.children.len() {
            return;
        }
        walk(&mut node.children[index], &remaining[1..]);
        node.difference_type = classify_node(node);
    }
    walk(root, path);
}

/// Merge a freshly single-level-scanned directory's children into `node`
/// (spec.md §4.F.4 step 4): existing entries are updated in place
/// (preserving `difference_type`, `content_compared`, `is_expanded`);
/// missing ones are appended as `PENDING`. Re-sorts afterward. Returns
/// the relative paths of newly-appended two-sided files, so the caller
/// can queue comparison tasks for them.
pub fn merge_children(
    node: &mut TreeNode,
    left_children: &[FileInfo],
    right_children: &[FileInfo],
) -> Vec<String> {
    use std::collections::HashMap;

    let left_by_name: HashMap<&str, &FileInfo> =
        left_children.iter().map(|f| (f.name_str(), f)).collect();
    let right_by_name: HashMap<&str, &FileInfo> =
        right_children.iter().map(|f| (f.name_str(), f)).collect();

    let mut names: Vec<&str> = left_by_name.keys().chain(right_by_name.keys()).copied().collect();
    names.sort_unstable();
    names.dedup();

    let mut new_two_sided_files = Vec::new();

    for name in names {
        let left = left_by_name.get(name).copied();
        let right = right_by_name.get(name).copied();
        let is_directory = left.map(|f| f.is_directory).unwrap_or(false)
            || right.map(|f| f.is_directory).unwrap_or(false);

        if let Some(existing) = node.children.iter_mut().find(|c| c.name == name) {
            if let Some(info) = left {
                existing.left_path = Some(info.path.clone());
            }
            if let Some(info) = right {
                existing.right_path = Some(info.path.clone());
            }
        } else {
            let (difference_type, content_compared) = match (left.is_some(), right.is_some()) {
                (true, false) => (DifferenceType::OnlyLeft, true),
                (false, true) => (DifferenceType::OnlyRight, true),
                _ => (DifferenceType::Pending, false),
            };
            if left.is_some() && right.is_some() && !is_directory {
                new_two_sided_files.push(name.to_string());
            }
            node.children.push(Box::new(TreeNode {
                name: name.to_string(),
                left_path: left.map(|f| f.path.clone()),
                right_path: right.map(|f| f.path.clone()),
                is_directory,
                difference_type,
                depth: node.depth + 1,
                is_expanded: false,
                children: Vec::new(),
                parent: Vec::new(),
                children_scanned: false,
                content_compared,
                scan_in_progress: false,
                comparison_error: None,
            }));
        }
    }

    node.sort_children();
    for (index, child) in node.children.iter_mut().enumerate() {
        child.parent = vec![index];
    }

    new_two_sided_files
}

/// Pre-order walk producing the flattened list shown on screen (spec.md
/// §4.F.9): skips the root; skips `IDENTICAL` nodes when `show_identical`
/// is false; `PENDING` is never hidden; expanded directories contribute
/// their children.
pub fn flatten(root: &TreeNode, show_identical: bool) -> Vec<NodePath> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    flatten_children(root, &mut prefix, show_identical, &mut out);
    out
}

fn flatten_children(node: &TreeNode, prefix: &mut NodePath, show_identical: bool, out: &mut Vec<NodePath>) {
    for (index, child) in node.children.iter().enumerate() {
        if show_identical || child.difference_type != DifferenceType::Identical {
            prefix.push(index);
            out.push(prefix.clone());
            if child.is_directory && child.is_expanded {
                flatten_children(child, prefix, show_identical, out);
            }
            prefix.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, depth: usize, difference_type: DifferenceType, is_directory: bool) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            left_path: Some(format!("/left/{name}").into()),
            right_path: Some(format!("/right/{name}").into()),
            is_directory,
            difference_type,
            depth,
            is_expanded: false,
            children: Vec::new(),
            parent: Vec::new(),
            children_scanned: !is_directory,
            content_compared: !is_directory,
            scan_in_progress: false,
            comparison_error: None,
        }
    }

    #[test]
    fn classify_directory_short_circuits_on_first_difference() {
        let mut dir = leaf("d", 1, DifferenceType::Pending, true);
        dir.children_scanned = true;
        dir.children.push(Box::new(leaf("a", 2, DifferenceType::Identical, false)));
        dir.children.push(Box::new(leaf("b", 2, DifferenceType::ContentDifferent, false)));
        assert_eq!(classify_node(&dir), DifferenceType::ContainsDifference);
    }

    #[test]
    fn classify_directory_pending_when_any_child_pending() {
        let mut dir = leaf("d", 1, DifferenceType::Pending, true);
        dir.children_scanned = true;
        dir.children.push(Box::new(leaf("a", 2, DifferenceType::Identical, false)));
        dir.children.push(Box::new(leaf("b", 2, DifferenceType::Pending, false)));
        assert_eq!(classify_node(&dir), DifferenceType::Pending);
    }

    #[test]
    fn classify_directory_identical_when_all_children_identical() {
        let mut dir = leaf("d", 1, DifferenceType::Pending, true);
        dir.children_scanned = true;
        dir.children.push(Box::new(leaf("a", 2, DifferenceType::Identical, false)));
        assert_eq!(classify_node(&dir), DifferenceType::Identical);
    }

    #[test]
    fn unscanned_empty_directory_is_pending() {
        let dir = leaf("d", 1, DifferenceType::Pending, true);
        assert_eq!(classify_node(&dir), DifferenceType::Pending);
    }

    #[test]
    fn propagate_classification_updates_ancestors() {
        let mut root = TreeNode::root();
        root.children_scanned = true;
        let mut dir_a = leaf("a", 1, DifferenceType::Identical, true);
        dir_a.children_scanned = true;
        dir_a.children.push(Box::new(leaf("leaf.txt", 2, DifferenceType::Identical, false)));
        root.children.push(Box::new(dir_a));
        root.difference_type = DifferenceType::Identical;

        // Simulate the comparator flipping the leaf to CONTENT_DIFFERENT.
        get_node_mut(&mut root, &[0, 0]).unwrap().difference_type = DifferenceType::ContentDifferent;
        propagate_classification(&mut root, &[0, 0]);

        assert_eq!(get_node(&root, &[0]).unwrap().difference_type, DifferenceType::ContainsDifference);
        assert_eq!(root.difference_type, DifferenceType::ContainsDifference);
    }

    #[test]
    fn flatten_skips_identical_when_filter_off_but_keeps_pending() {
        let mut root = TreeNode::root();
        root.children.push(Box::new(leaf("identical.txt", 1, DifferenceType::Identical, false)));
        root.children.push(Box::new(leaf("pending.txt", 1, DifferenceType::Pending, false)));

        let visible = flatten(&root, false);
        assert_eq!(visible.len(), 1);
        assert_eq!(relative_path_of(&root, &visible[0]), "pending.txt");

        let visible_all = flatten(&root, true);
        assert_eq!(visible_all.len(), 2);
    }

    #[test]
    fn flatten_descends_into_expanded_directories_only() {
        let mut root = TreeNode::root();
        let mut dir = leaf("dir", 1, DifferenceType::ContainsDifference, true);
        dir.children_scanned = true;
        dir.children.push(Box::new(leaf("child.txt", 2, DifferenceType::ContentDifferent, false)));
        root.children.push(Box::new(dir));

        assert_eq!(flatten(&root, false).len(), 1);

        get_node_mut(&mut root, &[0]).unwrap().is_expanded = true;
        let visible = flatten(&root, false);
        assert_eq!(visible.len(), 2);
        assert_eq!(relative_path_of(&root, &visible[1]), "dir/child.txt");
    }

    #[test]
    fn merge_children_preserves_existing_state_and_appends_new() {
        let mut node = TreeNode::root();
        node.children.push(Box::new(leaf("existing.txt", 1, DifferenceType::ContentDifferent, false)));
        node.children[0].content_compared = true;

        let left = vec![FileInfo::new_for_test("existing.txt", false), FileInfo::new_for_test("new.txt", false)];
        let right = vec![FileInfo::new_for_test("existing.txt", false), FileInfo::new_for_test("new.txt", false)];
        let new_files = merge_children(&mut node, &left, &right);

        assert_eq!(node.children.len(), 2);
        let existing = node.children.iter().find(|c| c.name == "existing.txt").unwrap();
        assert_eq!(existing.difference_type, DifferenceType::ContentDifferent);
        assert!(existing.content_compared);

        let added = node.children.iter().find(|c| c.name == "new.txt").unwrap();
        assert_eq!(added.difference_type, DifferenceType::Pending);
        assert!(!added.content_compared);
        assert_eq!(new_files, vec!["new.txt".to_string()]);
    }
}
