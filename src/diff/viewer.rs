//! `DirectoryDiffViewer` — the `UILayer` that owns the tree, the file maps,
//! the three queues, and the worker threads (spec.md §4.F.1-11).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::input::{CharEvent, KeyCode, KeyEvent, ModifierSet, MouseEvent, MouseEventType, SystemEvent};
use crate::layer::UILayer;
use crate::renderer::{draw_text_clipped, Renderer, TextAttribute};

use super::engine::DiffEngine;
use super::queue::{fifo, FifoReceiver, FifoSender, PriorityQueue};
use super::scanner::DirectoryScanner;
use super::tree::{self, NodePath};
use super::types::{priority, ComparisonTask, DifferenceType, FileInfo, ScanTask, TreeNode};

/// How long a worker blocks on its queue before re-checking `cancelled`
/// (spec.md §5 "Timeouts").
const WORKER_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// How long shutdown waits for a worker to join before warning and moving
/// on (spec.md §4.F.11).
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Left,
    Right,
}

#[derive(Debug, Clone)]
enum ScanStatus {
    Scanning,
    Cancelling,
    Idle,
    FatalError(String),
}

/// Aggregated counts for the status bar (spec.md §6, SPEC_FULL.md §11.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub identical: usize,
    pub different: usize,
    pub only_left: usize,
    pub only_right: usize,
    pub errors: usize,
    pub pending: usize,
}

/// Above this many children, `status_counts` walks the fan-out with
/// `rayon` instead of sequentially (SPEC_FULL.md §11.1).
const PARALLEL_COUNT_THRESHOLD: usize = 10;

fn count_recursive(node: &TreeNode, has_error: bool, counts: &mut StatusCounts) {
    if has_error {
        counts.errors += 1;
    }
    match node.difference_type {
        DifferenceType::Identical => counts.identical += 1,
        DifferenceType::ContentDifferent | DifferenceType::ContainsDifference => counts.different += 1,
        DifferenceType::OnlyLeft => counts.only_left += 1,
        DifferenceType::OnlyRight => counts.only_right += 1,
        DifferenceType::Pending => counts.pending += 1,
    }
    if node.children.len() > PARALLEL_COUNT_THRESHOLD {
        let partials: Vec<StatusCounts> = {
            use rayon::prelude::*;
            node.children
                .par_iter()
                .map(|child| {
                    let mut partial = StatusCounts::default();
                    count_recursive(child, child.comparison_error.is_some(), &mut partial);
                    partial
                })
                .collect()
        };
        for partial in partials {
            counts.identical += partial.identical;
            counts.different += partial.different;
            counts.only_left += partial.only_left;
            counts.only_right += partial.only_right;
            counts.errors += partial.errors;
            counts.pending += partial.pending;
        }
    } else {
        for child in &node.children {
            count_recursive(child, child.comparison_error.is_some(), counts);
        }
    }
}

/// Placeholder pushed by ENTER on a two-sided file (spec.md §1 scopes the
/// concrete diff viewer as an external collaborator; this stands in for
/// it so the layer-push contract is exercised end to end).
pub struct FileDiffPlaceholderLayer {
    relative_path: String,
    close_requested: bool,
}

impl FileDiffPlaceholderLayer {
    pub fn new(relative_path: String) -> Self {
        Self { relative_path, close_requested: false }
    }
}

impl UILayer for FileDiffPlaceholderLayer {
    fn handle_key_event(&mut self, event: &KeyEvent) -> bool {
        match event.key_code {
            KeyCode::Escape => {
                self.close_requested = true;
                true
            }
            KeyCode::Char(c) if c == 'q' as u32 => {
                self.close_requested = true;
                true
            }
            _ => false,
        }
    }
    fn handle_char_event(&mut self, _event: &CharEvent) -> bool {
        false
    }
    fn handle_mouse_event(&mut self, _event: &MouseEvent) -> bool {
        false
    }
    fn handle_system_event(&mut self, _event: &SystemEvent) -> bool {
        false
    }
    fn render(&mut self, renderer: &mut dyn Renderer) {
        renderer.clear();
        draw_text_clipped(renderer, 0, 0, &format!("Diff: {}", self.relative_path), 0, TextAttribute::BOLD);
        draw_text_clipped(renderer, 1, 0, "ESC/q to close", 0, TextAttribute::DIM);
    }
    fn is_full_screen(&self) -> bool {
        true
    }
    fn needs_redraw(&self) -> bool {
        true
    }
    fn mark_dirty(&mut self) {}
    fn clear_dirty(&mut self) {}
    fn should_close(&self) -> bool {
        self.close_requested
    }
}

pub struct DirectoryDiffViewer {
    left_root: PathBuf,
    right_root: PathBuf,
    show_hidden: Arc<dyn Fn() -> bool + Send + Sync>,
    show_identical: bool,

    root: Arc<Mutex<TreeNode>>,
    left_files: Arc<Mutex<HashMap<String, FileInfo>>>,
    right_files: Arc<Mutex<HashMap<String, FileInfo>>>,

    scan_sender: FifoSender<ScanTask>,
    comparison_sender: FifoSender<ComparisonTask>,
    priority_queue: Arc<PriorityQueue>,

    comparison_errors: Arc<Mutex<HashMap<String, String>>>,
    cancelled: Arc<AtomicBool>,
    worker_error: Arc<Mutex<Option<String>>>,
    dirty: Arc<AtomicBool>,

    scanner_handle: Option<JoinHandle<()>>,
    comparator_handle: Option<JoinHandle<()>>,
    priority_handle: Option<JoinHandle<()>>,

    visible_nodes: Vec<NodePath>,
    cursor: usize,
    scroll_offset: usize,
    active_pane: Pane,
    scan_status: ScanStatus,
    closed: bool,
    pending_layer: Option<Box<dyn UILayer>>,
    animation_tick: u64,
    display_height: u16,
}

impl DirectoryDiffViewer {
    pub fn new(
        left_root: PathBuf,
        right_root: PathBuf,
        show_hidden: Arc<dyn Fn() -> bool + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let hidden_now = (show_hidden)();
        let build_result = DiffEngine::build_initial_tree(&left_root, &right_root, hidden_now);

        let (scan_sender, scan_receiver) = fifo::<ScanTask>();
        let (comparison_sender, comparison_receiver) = fifo::<ComparisonTask>();
        let priority_queue = Arc::new(PriorityQueue::new());

        // A root-unreadable error (spec.md §7, "Scan error, fatal") does not
        // fail construction: the viewer is built in its error-screen state
        // instead, matching the original's behavior of entering an
        // error-screen state rather than never existing.
        let (root, left_files, right_files, scan_status, start_cancelled) = match build_result {
            Ok((root, left_files, right_files)) => (root, left_files, right_files, ScanStatus::Scanning, false),
            Err(err) => (TreeNode::root(), HashMap::new(), HashMap::new(), ScanStatus::FatalError(err.to_string()), true),
        };
        let is_fatal = matches!(scan_status, ScanStatus::FatalError(_));

        let mut viewer = Self {
            left_root,
            right_root,
            show_hidden,
            show_identical: true,
            root: Arc::new(Mutex::new(root)),
            left_files: Arc::new(Mutex::new(left_files)),
            right_files: Arc::new(Mutex::new(right_files)),
            scan_sender,
            comparison_sender,
            priority_queue,
            comparison_errors: Arc::new(Mutex::new(HashMap::new())),
            cancelled: Arc::new(AtomicBool::new(start_cancelled)),
            worker_error: Arc::new(Mutex::new(None)),
            dirty: Arc::new(AtomicBool::new(true)),
            scanner_handle: None,
            comparator_handle: None,
            priority_handle: None,
            visible_nodes: Vec::new(),
            cursor: 0,
            scroll_offset: 0,
            active_pane: Pane::Left,
            scan_status,
            closed: false,
            pending_layer: None,
            animation_tick: 0,
            display_height: 24,
        };

        if !is_fatal {
            viewer.queue_initial_tasks();
            viewer.start_workers(scan_receiver, comparison_receiver);
        }
        viewer.reflatten();
        Ok(viewer)
    }

    fn queue_initial_tasks(&self) {
        let root = self.root.lock();
        for child in &root.children {
            if child.left_path.is_none() || child.right_path.is_none() {
                continue;
            }
            if child.is_directory {
                self.scan_sender
                    .send(ScanTask {
                        left_path: child.left_path.clone(),
                        right_path: child.right_path.clone(),
                        relative_path: child.name.clone(),
                        priority: priority::NORMAL,
                        is_visible: true,
                    })
                    .ok();
            } else {
                self.comparison_sender
                    .send(ComparisonTask {
                        left_path: child.left_path.clone().unwrap(),
                        right_path: child.right_path.clone().unwrap(),
                        relative_path: child.name.clone(),
                        priority: priority::NORMAL,
                        is_visible: true,
                    })
                    .ok();
            }
        }
    }

    fn start_workers(&mut self, scan_receiver: FifoReceiver<ScanTask>, comparison_receiver: FifoReceiver<ComparisonTask>) {
        let show_hidden = self.show_hidden.clone();

        let scanner_handle = {
            let root = self.root.clone();
            let left_files = self.left_files.clone();
            let right_files = self.right_files.clone();
            let cancelled = self.cancelled.clone();
            let worker_error = self.worker_error.clone();
            let dirty = self.dirty.clone();
            let scan_sender = self.scan_sender.clone();
            let comparison_sender = self.comparison_sender.clone();
            let show_hidden = show_hidden.clone();
            std::thread::spawn(move || {
                scanner_worker(
                    scan_receiver,
                    scan_sender,
                    comparison_sender,
                    root,
                    left_files,
                    right_files,
                    cancelled,
                    worker_error,
                    dirty,
                    show_hidden,
                )
            })
        };

        let comparator_handle = {
            let root = self.root.clone();
            let comparison_errors = self.comparison_errors.clone();
            let cancelled = self.cancelled.clone();
            let worker_error = self.worker_error.clone();
            let dirty = self.dirty.clone();
            std::thread::spawn(move || {
                comparator_worker(comparison_receiver, root, comparison_errors, cancelled, worker_error, dirty)
            })
        };

        let priority_handle = {
            let priority_queue = self.priority_queue.clone();
            let scan_sender = self.scan_sender.clone();
            let cancelled = self.cancelled.clone();
            std::thread::spawn(move || priority_handler_worker(priority_queue, scan_sender, cancelled))
        };

        self.scanner_handle = Some(scanner_handle);
        self.comparator_handle = Some(comparator_handle);
        self.priority_handle = Some(priority_handle);
    }

    fn mark_dirty_flag(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn reflatten(&mut self) {
        let root = self.root.lock();
        self.visible_nodes = tree::flatten(&root, self.show_identical);
        drop(root);
        if self.cursor >= self.visible_nodes.len() {
            self.cursor = self.visible_nodes.len().saturating_sub(1);
        }
        self.clamp_scroll();
        self.update_priorities();
        self.mark_dirty_flag();
    }

    fn clamp_scroll(&mut self) {
        let height = self.display_height.max(1) as usize;
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + height {
            self.scroll_offset = self.cursor + 1 - height;
        }
        if self.scroll_offset > 0 && self.scroll_offset + height > self.visible_nodes.len() {
            self.scroll_offset = self.visible_nodes.len().saturating_sub(height);
        }
    }

    /// Recompute which visible directories still need scanning and push
    /// `VISIBLE`-priority scan tasks for them (spec.md §4.F.6).
    fn update_priorities(&self) {
        let height = self.display_height.max(1) as usize;
        let start = self.scroll_offset;
        let end = (start + height).min(self.visible_nodes.len());
        let root = self.root.lock();
        for path in &self.visible_nodes[start..end] {
            if let Some(node) = tree::get_node(&root, path) {
                if node.is_directory && !node.children_scanned && !node.scan_in_progress
                    && node.left_path.is_some() && node.right_path.is_some()
                {
                    self.priority_queue.push(ScanTask {
                        left_path: node.left_path.clone(),
                        right_path: node.right_path.clone(),
                        relative_path: tree::relative_path_of(&root, path),
                        priority: priority::VISIBLE,
                        is_visible: true,
                    });
                }
            }
        }
    }

    fn move_cursor_to(&mut self, index: usize) {
        self.cursor = index.min(self.visible_nodes.len().saturating_sub(1));
        self.clamp_scroll();
        self.update_priorities();
        self.mark_dirty_flag();
    }

    /// Searches forward from the cursor only; does not wrap, and leaves the
    /// cursor where it is if nothing matches before the end of the list.
    fn jump_to_next_difference(&mut self) {
        if self.visible_nodes.is_empty() {
            return;
        }
        let root = self.root.lock();
        let n = self.visible_nodes.len();
        for index in (self.cursor + 1)..n {
            if let Some(node) = tree::get_node(&root, &self.visible_nodes[index]) {
                if !node.difference_type.is_identical() {
                    drop(root);
                    self.move_cursor_to(index);
                    return;
                }
            }
        }
    }

    /// Searches backward from the cursor only; does not wrap, and leaves the
    /// cursor where it is if nothing matches before the start of the list.
    fn jump_to_previous_difference(&mut self) {
        if self.visible_nodes.is_empty() {
            return;
        }
        let root = self.root.lock();
        for index in (0..self.cursor).rev() {
            if let Some(node) = tree::get_node(&root, &self.visible_nodes[index]) {
                if !node.difference_type.is_identical() {
                    drop(root);
                    self.move_cursor_to(index);
                    return;
                }
            }
        }
    }

    /// Synchronous single-level scan of a not-yet-scanned directory,
    /// merged into the tree the same way the scanner worker does
    /// (spec.md §4.F.8 "Expand").
    fn scan_node_synchronously(&mut self, path: &[usize]) {
        let (left_path, right_path, relative) = {
            let root = self.root.lock();
            let node = match tree::get_node(&root, path) {
                Some(n) => n,
                None => return,
            };
            (node.left_path.clone(), node.right_path.clone(), tree::relative_path_of(&root, path))
        };

        {
            let mut root = self.root.lock();
            if let Some(node) = tree::get_node_mut(&mut root, path) {
                node.scan_in_progress = true;
            }
        }
        self.mark_dirty_flag();

        let show_hidden = (self.show_hidden)();
        let left_entries = left_path
            .as_deref()
            .and_then(|p| DirectoryScanner::scan_single_level(p, &relative, show_hidden).ok())
            .unwrap_or_default();
        let right_entries = right_path
            .as_deref()
            .and_then(|p| DirectoryScanner::scan_single_level(p, &relative, show_hidden).ok())
            .unwrap_or_default();

        {
            let mut left_files = self.left_files.lock();
            for entry in &left_entries {
                left_files.insert(entry.relative_path.clone(), entry.clone());
            }
        }
        {
            let mut right_files = self.right_files.lock();
            for entry in &right_entries {
                right_files.insert(entry.relative_path.clone(), entry.clone());
            }
        }

        let new_files = {
            let mut root = self.root.lock();
            let node = match tree::get_node_mut(&mut root, path) {
                Some(n) => n,
                None => return,
            };
            let new_files = tree::merge_children(node, &left_entries, &right_entries);
            node.children_scanned = true;
            node.scan_in_progress = false;
            tree::classify_node_and_children(node);
            new_files
        };

        for name in new_files {
            let left = left_entries.iter().find(|f| f.name_str() == name);
            let right = right_entries.iter().find(|f| f.name_str() == name);
            if let (Some(left), Some(right)) = (left, right) {
                self.comparison_sender
                    .send(ComparisonTask {
                        left_path: left.path.clone(),
                        right_path: right.path.clone(),
                        relative_path: format!("{relative}/{name}"),
                        priority: priority::EXPANDED,
                        is_visible: true,
                    })
                    .ok();
            }
        }

        {
            let mut root = self.root.lock();
            tree::propagate_classification(&mut root, path);
        }
        self.mark_dirty_flag();
    }

    fn expand(&mut self, path: &[usize]) {
        let already_scanned = {
            let root = self.root.lock();
            tree::get_node(&root, path).map(|n| n.children_scanned).unwrap_or(true)
        };
        if !already_scanned {
            self.scan_node_synchronously(path);
        }
        {
            let mut root = self.root.lock();
            if let Some(node) = tree::get_node_mut(&mut root, path) {
                node.is_expanded = true;
            }
        }
        self.reflatten();
    }

    fn collapse(&mut self, path: &[usize]) {
        {
            let mut root = self.root.lock();
            if let Some(node) = tree::get_node_mut(&mut root, path) {
                node.is_expanded = false;
            }
        }
        self.reflatten();
    }

    /// Compare a still-`PENDING` file on the UI thread so the correct
    /// classification shows before its diff layer is pushed (spec.md
    /// §4.F.10, ENTER on a pending file).
    fn compare_synchronously(&mut self, path: &[usize]) {
        let (left, right) = {
            let root = self.root.lock();
            match tree::get_node(&root, path) {
                Some(node) => (node.left_path.clone(), node.right_path.clone()),
                None => return,
            }
        };
        let (Some(left), Some(right)) = (left, right) else { return };

        let result = DiffEngine::compare_files(&left, &right);
        let mut root = self.root.lock();
        if let Some(node) = tree::get_node_mut(&mut root, path) {
            match result {
                Ok(equal) => {
                    node.difference_type =
                        if equal { DifferenceType::Identical } else { DifferenceType::ContentDifferent };
                }
                Err(err) => {
                    node.difference_type = DifferenceType::ContentDifferent;
                    node.comparison_error = Some(err.to_string());
                }
            }
            node.content_compared = true;
        }
        drop(root);
        let mut root = self.root.lock();
        tree::propagate_classification(&mut root, path);
    }

    pub fn status_counts(&self) -> StatusCounts {
        let root = self.root.lock();
        let mut counts = StatusCounts::default();
        for child in &root.children {
            count_recursive(child, child.comparison_error.is_some(), &mut counts);
        }
        counts
    }

    fn request_cancel_and_close(&mut self) {
        self.scan_status = ScanStatus::Cancelling;
        self.cancelled.store(true, Ordering::Release);
        self.mark_dirty_flag();
        self.stop_worker_threads();
        self.closed = true;
    }

    /// spec.md §4.F.11: set `cancelled`, join each worker with a 2s
    /// timeout (warn on hang), drain the queues.
    fn stop_worker_threads(&mut self) {
        self.cancelled.store(true, Ordering::Release);

        for handle in [self.scanner_handle.take(), self.comparator_handle.take(), self.priority_handle.take()] {
            if let Some(handle) = handle {
                join_with_timeout(handle, WORKER_JOIN_TIMEOUT);
            }
        }

        // Workers have exited; the FIFO channels hold only whatever was
        // still queued, and are dropped with the viewer. The priority
        // queue is shared with no other owner, so drain it explicitly.
        self.priority_queue.drain();
    }

    fn render_header(&self, renderer: &mut dyn Renderer) {
        let left_attr = if self.active_pane == Pane::Left { TextAttribute::BOLD } else { TextAttribute::NORMAL };
        let right_attr = if self.active_pane == Pane::Right { TextAttribute::BOLD } else { TextAttribute::NORMAL };
        let (_, cols) = renderer.dimensions();
        let half = cols / 2;
        draw_text_clipped(renderer, 0, 0, &self.left_root.display().to_string(), 0, left_attr);
        draw_text_clipped(renderer, 0, half, &self.right_root.display().to_string(), 0, right_attr);
    }

    fn render_rows(&self, renderer: &mut dyn Renderer, start_row: u16, visible_rows: usize) {
        let root = self.root.lock();
        let height = visible_rows.min(self.visible_nodes.len().saturating_sub(self.scroll_offset));
        for row in 0..height {
            let index = self.scroll_offset + row;
            let path = &self.visible_nodes[index];
            let Some(node) = tree::get_node(&root, path) else { continue };
            let indent = "  ".repeat(path.len().saturating_sub(1));
            let marker = if node.is_directory { if node.is_expanded { "v " } else { "> " } } else { "  " };
            let label = format!("{indent}{marker}{}{}", node.name, node.annotation_suffix());
            let attr = if index == self.cursor { TextAttribute::REVERSE } else { TextAttribute::NORMAL };
            draw_text_clipped(renderer, start_row + row as u16, 0, &label, 0, attr);

            let separator = node.difference_type.separator_glyph();
            let (_, cols) = renderer.dimensions();
            draw_text_clipped(renderer, start_row + row as u16, (cols / 2).saturating_sub(2), &separator.to_string(), 0, TextAttribute::NORMAL);
        }
    }

    fn render_status_bar(&self, renderer: &mut dyn Renderer, row: u16) {
        let counts = self.status_counts();
        let status = match &self.scan_status {
            ScanStatus::Scanning => format!("Scanning{}", ".".repeat((self.animation_tick % 4) as usize)),
            ScanStatus::Cancelling => "Cancelling…".to_string(),
            ScanStatus::Idle => "Ready".to_string(),
            ScanStatus::FatalError(message) => format!("Error: {message}"),
        };
        let mut line = format!(
            "Same:{} Diff:{} OnlyLeft:{} OnlyRight:{} Pending:{} Errors:{} | {}",
            counts.identical, counts.different, counts.only_left, counts.only_right, counts.pending, counts.errors, status
        );
        if let Some(message) = self.worker_error.lock().as_ref() {
            line.push_str(&format!(" | worker: {message}"));
        }
        draw_text_clipped(renderer, row, 0, &line, 0, TextAttribute::DIM);
    }
}

fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) {
    // `JoinHandle::join` has no native timeout; the worker loops poll
    // `cancelled` at `WORKER_POLL_TIMEOUT` (100ms) so a 2s budget of
    // short sleeps is equivalent to a real timed join without needing an
    // extra dependency.
    let start = std::time::Instant::now();
    loop {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        if start.elapsed() >= timeout {
            tracing::warn!("worker thread did not exit within shutdown timeout");
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn scanner_worker(
    scan_receiver: FifoReceiver<ScanTask>,
    scan_sender: FifoSender<ScanTask>,
    comparison_sender: FifoSender<ComparisonTask>,
    root: Arc<Mutex<TreeNode>>,
    left_files: Arc<Mutex<HashMap<String, FileInfo>>>,
    right_files: Arc<Mutex<HashMap<String, FileInfo>>>,
    cancelled: Arc<AtomicBool>,
    worker_error: Arc<Mutex<Option<String>>>,
    dirty: Arc<AtomicBool>,
    show_hidden: Arc<dyn Fn() -> bool + Send + Sync>,
) {
    while !cancelled.load(Ordering::Acquire) {
        let task = match scan_receiver.recv_timeout(WORKER_POLL_TIMEOUT) {
            Ok(task) => task,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        if task.relative_path.is_empty() && task.left_path.is_none() && task.right_path.is_none() {
            continue;
        }

        let hidden = (show_hidden)();
        let left_entries = task
            .left_path
            .as_deref()
            .map(|p| DirectoryScanner::scan_single_level(p, &task.relative_path, hidden))
            .transpose();
        let right_entries = task
            .right_path
            .as_deref()
            .map(|p| DirectoryScanner::scan_single_level(p, &task.relative_path, hidden))
            .transpose();

        let (left_entries, right_entries) = match (left_entries, right_entries) {
            (Ok(l), Ok(r)) => (l.unwrap_or_default(), r.unwrap_or_default()),
            (Err(err), _) | (_, Err(err)) => {
                *worker_error.lock() = Some(err.to_string());
                dirty.store(true, Ordering::Release);
                continue;
            }
        };

        {
            let mut left_files = left_files.lock();
            for entry in &left_entries {
                left_files.insert(entry.relative_path.clone(), entry.clone());
            }
        }
        {
            let mut right_files = right_files.lock();
            for entry in &right_entries {
                right_files.insert(entry.relative_path.clone(), entry.clone());
            }
        }

        let path = {
            let root_guard = root.lock();
            tree::find_path_by_relative(&root_guard, &task.relative_path)
        };
        let Some(path) = path else { continue };

        let new_files = {
            let mut root_guard = root.lock();
            let Some(node) = tree::get_node_mut(&mut root_guard, &path) else { continue };
            let new_files = tree::merge_children(node, &left_entries, &right_entries);
            node.children_scanned = true;
            node.scan_in_progress = false;
            tree::classify_node_and_children(node);
            new_files
        };

        for name in &new_files {
            let left = left_entries.iter().find(|f| f.name_str() == name.as_str());
            let right = right_entries.iter().find(|f| f.name_str() == name.as_str());
            if let (Some(left), Some(right)) = (left, right) {
                comparison_sender
                    .send(ComparisonTask {
                        left_path: left.path.clone(),
                        right_path: right.path.clone(),
                        relative_path: format!("{}/{name}", task.relative_path),
                        priority: task.priority,
                        is_visible: task.is_visible,
                    })
                    .ok();
            }
        }

        {
            let root_guard = root.lock();
            if let Some(parent) = tree::get_node(&root_guard, &path) {
                let mut queued_names = std::collections::HashSet::new();
                for entry in left_entries.iter().chain(right_entries.iter()) {
                    if !entry.is_directory || !queued_names.insert(entry.name_str().to_string()) {
                        continue;
                    }
                    if let Some(child) = parent.children.iter().find(|c| c.name == entry.name_str()) {
                        if child.left_path.is_some() && child.right_path.is_some() {
                            scan_sender
                                .send(ScanTask {
                                    left_path: child.left_path.clone(),
                                    right_path: child.right_path.clone(),
                                    relative_path: format!("{}/{}", task.relative_path, child.name),
                                    priority: task.priority,
                                    is_visible: task.is_visible,
                                })
                                .ok();
                        }
                    }
                }
            }
        }

        {
            let mut root_guard = root.lock();
            tree::propagate_classification(&mut root_guard, &path);
        }
        dirty.store(true, Ordering::Release);
    }
}

fn comparator_worker(
    comparison_receiver: FifoReceiver<ComparisonTask>,
    root: Arc<Mutex<TreeNode>>,
    comparison_errors: Arc<Mutex<HashMap<String, String>>>,
    cancelled: Arc<AtomicBool>,
    worker_error: Arc<Mutex<Option<String>>>,
    dirty: Arc<AtomicBool>,
) {
    while !cancelled.load(Ordering::Acquire) {
        let task = match comparison_receiver.recv_timeout(WORKER_POLL_TIMEOUT) {
            Ok(task) => task,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        if task.relative_path.is_empty() {
            continue;
        }

        let result = DiffEngine::compare_files(&task.left_path, &task.right_path);
        let (classification, error) = match result {
            Ok(equal) if equal => (DifferenceType::Identical, None),
            Ok(_) => (DifferenceType::ContentDifferent, None),
            Err(err) => (DifferenceType::ContentDifferent, Some(err.to_string())),
        };

        if let Some(message) = &error {
            comparison_errors.lock().insert(task.relative_path.clone(), message.clone());
        }

        let path = {
            let root_guard = root.lock();
            tree::find_path_by_relative(&root_guard, &task.relative_path)
        };
        let Some(path) = path else {
            *worker_error.lock() = Some(format!("comparator: node vanished for {}", task.relative_path));
            dirty.store(true, Ordering::Release);
            continue;
        };

        {
            let mut root_guard = root.lock();
            if let Some(node) = tree::get_node_mut(&mut root_guard, &path) {
                node.difference_type = classification;
                node.content_compared = true;
                node.comparison_error = error;
            }
            tree::propagate_classification(&mut root_guard, &path);
        }
        dirty.store(true, Ordering::Release);
    }
}

fn priority_handler_worker(priority_queue: Arc<PriorityQueue>, scan_sender: FifoSender<ScanTask>, cancelled: Arc<AtomicBool>) {
    while !cancelled.load(Ordering::Acquire) {
        match priority_queue.pop_timeout(WORKER_POLL_TIMEOUT) {
            Some(task) => {
                scan_sender.send(task).ok();
            }
            None => continue,
        }
    }
}

impl UILayer for DirectoryDiffViewer {
    fn handle_key_event(&mut self, event: &KeyEvent) -> bool {
        if matches!(self.scan_status, ScanStatus::FatalError(_)) {
            let is_close_key =
                matches!(event.key_code, KeyCode::Escape) || matches!(event.key_code, KeyCode::Char(c) if c == 'q' as u32);
            if is_close_key {
                self.closed = true;
            }
            return is_close_key;
        }

        match event.key_code {
            KeyCode::Escape => {
                if matches!(self.scan_status, ScanStatus::Scanning) {
                    self.request_cancel_and_close();
                } else {
                    self.closed = true;
                    self.stop_worker_threads();
                }
                true
            }
            KeyCode::Char(c) if c == 'q' as u32 => {
                self.closed = true;
                self.stop_worker_threads();
                true
            }
            KeyCode::Char(c) if c == '?' as u32 => {
                self.pending_layer = Some(Box::new(HelpDialogLayer::default()));
                true
            }
            KeyCode::Char(c) if c == 'i' as u32 => {
                self.show_identical = !self.show_identical;
                self.reflatten();
                true
            }
            KeyCode::Up if event.modifiers.contains(ModifierSet::SHIFT) => {
                self.jump_to_previous_difference();
                true
            }
            KeyCode::Down if event.modifiers.contains(ModifierSet::SHIFT) => {
                self.jump_to_next_difference();
                true
            }
            KeyCode::Up => {
                if self.cursor > 0 {
                    self.move_cursor_to(self.cursor - 1);
                }
                true
            }
            KeyCode::Down => {
                if self.cursor + 1 < self.visible_nodes.len() {
                    self.move_cursor_to(self.cursor + 1);
                }
                true
            }
            KeyCode::PageUp => {
                let step = self.display_height.max(1) as usize;
                self.move_cursor_to(self.cursor.saturating_sub(step));
                true
            }
            KeyCode::PageDown => {
                let step = self.display_height.max(1) as usize;
                self.move_cursor_to((self.cursor + step).min(self.visible_nodes.len().saturating_sub(1)));
                true
            }
            KeyCode::Home => {
                self.move_cursor_to(0);
                true
            }
            KeyCode::End => {
                self.move_cursor_to(self.visible_nodes.len().saturating_sub(1));
                true
            }
            KeyCode::Tab => {
                self.active_pane = match self.active_pane {
                    Pane::Left => Pane::Right,
                    Pane::Right => Pane::Left,
                };
                self.mark_dirty_flag();
                true
            }
            KeyCode::Left if !event.modifiers.contains(ModifierSet::SHIFT) => {
                self.active_pane = Pane::Left;
                self.mark_dirty_flag();
                true
            }
            KeyCode::Right if !event.modifiers.contains(ModifierSet::SHIFT) => {
                self.active_pane = Pane::Right;
                self.mark_dirty_flag();
                true
            }
            KeyCode::Right if event.modifiers.contains(ModifierSet::SHIFT) => {
                self.handle_shift_right();
                true
            }
            KeyCode::Left if event.modifiers.contains(ModifierSet::SHIFT) => {
                self.handle_shift_left();
                true
            }
            KeyCode::Enter => {
                self.handle_enter();
                true
            }
            _ => false,
        }
    }

    fn handle_char_event(&mut self, _event: &CharEvent) -> bool {
        false
    }

    fn handle_mouse_event(&mut self, event: &MouseEvent) -> bool {
        match event.event_type {
            MouseEventType::Wheel => {
                if event.scroll_delta_y > 0.0 {
                    self.move_cursor_to(self.cursor.saturating_sub(3));
                } else if event.scroll_delta_y < 0.0 {
                    self.move_cursor_to((self.cursor + 3).min(self.visible_nodes.len().saturating_sub(1)));
                }
                true
            }
            MouseEventType::ButtonDown => {
                let row = event.row.max(0) as usize;
                let index = self.scroll_offset + row;
                if index < self.visible_nodes.len() {
                    self.move_cursor_to(index);
                }
                true
            }
            MouseEventType::DoubleClick => {
                let row = event.row.max(0) as usize;
                let index = self.scroll_offset + row;
                if index < self.visible_nodes.len() {
                    self.move_cursor_to(index);
                    self.handle_enter();
                }
                true
            }
            _ => false,
        }
    }

    fn handle_system_event(&mut self, _event: &SystemEvent) -> bool {
        false
    }

    fn render(&mut self, renderer: &mut dyn Renderer) {
        self.animation_tick = self.animation_tick.wrapping_add(1);
        let (rows, _cols) = renderer.dimensions();
        self.display_height = rows.saturating_sub(2);

        renderer.clear();

        if let ScanStatus::FatalError(message) = &self.scan_status {
            draw_text_clipped(renderer, 0, 0, &format!("Fatal error: {message}"), 0, TextAttribute::BOLD);
            draw_text_clipped(renderer, 1, 0, "Press q or ESC to close.", 0, TextAttribute::NORMAL);
            return;
        }

        // No strict "scan complete" signal is threaded back from the
        // workers; both queues and the priority queue being empty is an
        // adequate proxy (spec.md §9's acknowledged "eventual" priority
        // handling already accepts this kind of approximation).
        if !matches!(self.scan_status, ScanStatus::Cancelling) {
            self.scan_status = if self.scan_sender.is_empty() && self.comparison_sender.is_empty() && self.priority_queue.is_empty() {
                ScanStatus::Idle
            } else {
                ScanStatus::Scanning
            };
        }

        self.render_header(renderer);
        self.render_rows(renderer, 1, self.display_height as usize);
        self.render_status_bar(renderer, rows.saturating_sub(1));
    }

    fn is_full_screen(&self) -> bool {
        true
    }

    fn needs_redraw(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&mut self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn clear_dirty(&mut self) {
        self.dirty.store(false, Ordering::Release);
    }

    fn should_close(&self) -> bool {
        self.closed && self.scanner_handle.is_none() && self.comparator_handle.is_none() && self.priority_handle.is_none()
    }

    fn on_deactivate(&mut self) {}

    fn take_pending_layer(&mut self) -> Option<Box<dyn UILayer>> {
        self.pending_layer.take()
    }
}

impl DirectoryDiffViewer {
    fn current_path(&self) -> Option<NodePath> {
        self.visible_nodes.get(self.cursor).cloned()
    }

    fn handle_shift_right(&mut self) {
        let Some(path) = self.current_path() else { return };
        let (is_directory, is_expanded, has_children) = {
            let root = self.root.lock();
            match tree::get_node(&root, &path) {
                Some(node) => (node.is_directory, node.is_expanded, !node.children.is_empty()),
                None => return,
            }
        };
        if !is_directory {
            return;
        }
        if !is_expanded {
            self.expand(&path);
        } else if has_children {
            self.move_cursor_to(self.cursor + 1);
        }
    }

    fn handle_shift_left(&mut self) {
        let Some(path) = self.current_path() else { return };
        let is_expanded = {
            let root = self.root.lock();
            tree::get_node(&root, &path).map(|n| n.is_expanded).unwrap_or(false)
        };
        if is_expanded {
            self.collapse(&path);
        } else if !path.is_empty() {
            let parent_path = path[..path.len() - 1].to_vec();
            if let Some(index) = self.visible_nodes.iter().position(|p| *p == parent_path) {
                self.move_cursor_to(index);
            }
        }
    }

    fn handle_enter(&mut self) {
        let Some(path) = self.current_path() else { return };
        let (is_directory, is_expanded, is_pending, relative_path, two_sided) = {
            let root = self.root.lock();
            match tree::get_node(&root, &path) {
                Some(node) => (
                    node.is_directory,
                    node.is_expanded,
                    node.difference_type.is_pending() && !node.content_compared,
                    tree::relative_path_of(&root, &path),
                    node.left_path.is_some() && node.right_path.is_some(),
                ),
                None => return,
            }
        };

        if is_directory {
            if is_expanded {
                self.collapse(&path);
            } else {
                self.expand(&path);
            }
            return;
        }

        if !two_sided {
            return;
        }
        if is_pending {
            self.compare_synchronously(&path);
        }
        self.pending_layer = Some(Box::new(FileDiffPlaceholderLayer::new(relative_path)));
        self.mark_dirty_flag();
    }
}

/// Minimal help dialog pushed by `?` (spec.md §4.F.10); the concrete
/// dialog contents are out of scope (spec.md §1), only the UILayer
/// contract it must satisfy matters here.
#[derive(Default)]
struct HelpDialogLayer {
    close_requested: bool,
}

impl UILayer for HelpDialogLayer {
    fn handle_key_event(&mut self, _event: &KeyEvent) -> bool {
        self.close_requested = true;
        true
    }
    fn handle_char_event(&mut self, _event: &CharEvent) -> bool {
        false
    }
    fn handle_mouse_event(&mut self, _event: &MouseEvent) -> bool {
        false
    }
    fn handle_system_event(&mut self, _event: &SystemEvent) -> bool {
        false
    }
    fn render(&mut self, renderer: &mut dyn Renderer) {
        draw_text_clipped(renderer, 0, 0, "UP/DOWN move  TAB switch pane  ENTER open  ESC close", 0, TextAttribute::NORMAL);
    }
    fn is_full_screen(&self) -> bool {
        false
    }
    fn needs_redraw(&self) -> bool {
        true
    }
    fn mark_dirty(&mut self) {}
    fn clear_dirty(&mut self) {}
    fn should_close(&self) -> bool {
        self.close_requested
    }
}
