//! Recursive tree renderer state.
//!
//! Expansion state lives here, keyed by node id, and never inside the tree
//! itself. The view raises two kinds of events: `Explored` the first time a
//! node with children is opened, and `GenerateRequested` when the user asks
//! for a lesson on any node.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::lesson::GenerateRequest;
use crate::topic::TopicNode;

/// Events raised by the tree view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    /// A node was expanded for the first time this session.
    Explored {
        /// Id of the explored node.
        id: String,
    },
    /// The user asked for a lesson on a node.
    GenerateRequested(GenerateRequest),
}

/// Result of toggling a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    /// Id of the toggled node.
    pub id: String,
    /// Expansion state after the toggle.
    pub expanded: bool,
    /// Set only on the first collapsed-to-expanded transition of the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TreeEvent>,
}

/// One visible row of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRow {
    /// Node id.
    pub id: String,
    /// Node title.
    pub title: String,
    /// Depth below the root (roots are 0).
    pub depth: usize,
    /// Whether the node can be expanded.
    pub has_subtopics: bool,
    /// Whether the node is currently expanded.
    pub expanded: bool,
    /// Node description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TopicRow {
    /// Root rows get the heavier treatment in the UI.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.depth == 0
    }
}

/// Per-node expansion state for the whole forest.
#[derive(Debug, Clone, Default)]
pub struct TreeView {
    expanded: HashMap<String, bool>,
    announced: HashSet<String>,
}

impl TreeView {
    /// Creates a view with every node collapsed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current expansion state of `id`; unknown ids are collapsed.
    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.get(id).copied().unwrap_or(false)
    }

    /// Toggles a node.
    ///
    /// Leaves never change. The `Explored` event fires at most once per node
    /// for the lifetime of the view, on its first expansion.
    pub fn toggle(&mut self, node: &TopicNode) -> ToggleOutcome {
        if !node.has_subtopics() {
            return ToggleOutcome {
                id: node.id.clone(),
                expanded: false,
                event: None,
            };
        }

        let expanded = !self.is_expanded(&node.id);
        self.expanded.insert(node.id.clone(), expanded);

        let event = (expanded && self.announced.insert(node.id.clone())).then(|| {
            TreeEvent::Explored {
                id: node.id.clone(),
            }
        });

        ToggleOutcome {
            id: node.id.clone(),
            expanded,
            event,
        }
    }

    /// The lesson request a tree node produces. Tree requests are never deep dives.
    #[must_use]
    pub fn generate(node: &TopicNode) -> TreeEvent {
        TreeEvent::GenerateRequested(GenerateRequest::new(node.title.clone(), false))
    }

    /// Visible rows for the given roots, depth-first pre-order. Children of
    /// collapsed nodes are skipped.
    pub fn rows<'a>(&self, roots: impl IntoIterator<Item = &'a TopicNode>) -> Vec<TopicRow> {
        let mut rows = Vec::new();
        for root in roots {
            self.push_rows(root, 0, &mut rows);
        }
        rows
    }

    fn push_rows(&self, node: &TopicNode, depth: usize, rows: &mut Vec<TopicRow>) {
        let expanded = node.has_subtopics() && self.is_expanded(&node.id);
        rows.push(TopicRow {
            id: node.id.clone(),
            title: node.title.clone(),
            depth,
            has_subtopics: node.has_subtopics(),
            expanded,
            description: node.description.clone(),
        });

        if expanded {
            for child in &node.subtopics {
                self.push_rows(child, depth + 1, rows);
            }
        }
    }
}
