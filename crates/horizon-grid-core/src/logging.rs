//! Logging and debugging facilities for Horizon Grid.
//!
//! This module provides:
//! - Stable `tracing` targets for each subsystem
//! - A tree formatter for inspecting presenter hierarchies
//! - Performance tracing spans for reloads and bulk operations
//!
//! # Tracing Integration
//!
//! Horizon Grid uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_grid::mapper=trace")
//!     .init();
//! ```
//!
//! # Tree Visualization
//!
//! Anything implementing [`DebugTree`] can be rendered with [`TreeDebug`]:
//!
//! ```
//! use horizon_grid_core::logging::{DebugTree, TreeDebug, TreeFormatOptions};
//!
//! struct Flat(Vec<&'static str>);
//!
//! impl DebugTree for Flat {
//!     type Node = usize;
//!     fn roots(&self) -> Vec<usize> { (0..self.0.len()).collect() }
//!     fn children(&self, _node: usize) -> Vec<usize> { Vec::new() }
//!     fn label(&self, node: usize) -> String { self.0[node].to_string() }
//! }
//!
//! let text = TreeDebug::with_options(TreeFormatOptions::minimal()).format(&Flat(vec!["a", "b"]));
//! assert!(text.contains("a"));
//! ```

use std::fmt::{Debug, Write as FmtWrite};

/// Span names used throughout Horizon Grid for tracing.
pub mod span_names {
    /// Full mapper reload.
    pub const RELOAD: &str = "horizon_grid::reload";
    /// Edit transaction commit.
    pub const COMMIT: &str = "horizon_grid::commit";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_grid_core::signal";
    /// Batched invalidation target.
    pub const BATCH: &str = "horizon_grid_core::batch";
    /// Data source boundary target.
    pub const SOURCE: &str = "horizon_grid::source";
    /// Row mapper target.
    pub const MAPPER: &str = "horizon_grid::mapper";
    /// Row normalizer target.
    pub const NORMALIZER: &str = "horizon_grid::normalizer";
    /// Row manager target (current row, selection, transactions).
    pub const MANAGER: &str = "horizon_grid::manager";
    /// Container virtualization target.
    pub const VIRTUALIZER: &str = "horizon_grid::virtualizer";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node handles.
    pub show_ids: bool,
    /// Whether to show per-node detail (flags, indices).
    pub show_details: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_details: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for minimal output: labels only.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_details: false,
            ..Default::default()
        }
    }
}

/// A hierarchy that can be rendered by [`TreeDebug`].
pub trait DebugTree {
    /// Handle type for nodes.
    type Node: Copy + Debug;

    /// Top-level nodes in order.
    fn roots(&self) -> Vec<Self::Node>;

    /// Children of a node in order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Primary label for a node.
    fn label(&self, node: Self::Node) -> String;

    /// Optional detail text shown after the label.
    fn details(&self, _node: Self::Node) -> Option<String> {
        None
    }
}

/// Debug utility for visualizing trees.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the whole tree, one node per line.
    pub fn format<T: DebugTree>(&self, tree: &T) -> String {
        let mut output = String::new();
        let roots = tree.roots();
        if roots.is_empty() {
            output.push_str("(empty)\n");
            return output;
        }
        let count = roots.len();
        for (i, root) in roots.into_iter().enumerate() {
            self.format_subtree_into(tree, root, 0, i + 1 == count, &mut output);
        }
        output
    }

    fn format_subtree_into<T: DebugTree>(
        &self,
        tree: &T,
        node: T::Node,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) {
        if let Some(max) = self.options.max_depth
            && depth > max
        {
            return;
        }

        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(&tree.label(node));

        if self.options.show_ids {
            let _ = write!(output, " [{:?}]", node);
        }
        if self.options.show_details
            && let Some(details) = tree.details(node)
        {
            let _ = write!(output, " ({})", details);
        }
        output.push('\n');

        let children = tree.children(node);
        let child_count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.format_subtree_into(tree, child, depth + 1, i + 1 == child_count, output);
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            for _ in 0..self.options.indent_size {
                prefix.push(' ');
            }
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for timing reloads and other bulk operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_grid::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
