//! The directory diff core (spec.md §4.F): tree model, blocking scanner,
//! synchronous engine, thread-safe queues, and the `DirectoryDiffViewer`
//! layer that wires them together behind worker threads.

pub mod engine;
pub mod queue;
pub mod scanner;
pub mod tree;
pub mod types;
pub mod viewer;

pub use engine::DiffEngine;
pub use scanner::DirectoryScanner;
pub use types::{priority, ComparisonTask, DifferenceType, FileInfo, ScanTask, TreeNode};
pub use viewer::{DirectoryDiffViewer, FileDiffPlaceholderLayer, Pane, StatusCounts};
