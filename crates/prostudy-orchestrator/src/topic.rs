//! Topic tree model.
//!
//! The curriculum is an ordered forest: the static seed roots first, then the
//! dynamic roots added during the session (AI suggestions and custom
//! requests). Nodes are owned values, so the structure is a tree by
//! construction. Ids are unique across the whole forest because the explored
//! set is keyed by id alone.

use std::collections::HashSet;

use prostudy_report::slugify;
use serde::{Deserialize, Serialize};

/// A named node in the curriculum tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNode {
    /// Identifier, unique across the whole forest.
    pub id: String,

    /// Display title. Lesson requests are keyed by title, not id.
    pub title: String,

    /// Ordered children, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtopics: Vec<TopicNode>,

    /// Optional one-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TopicNode {
    /// Creates a node without children.
    #[must_use]
    pub fn leaf(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtopics: Vec::new(),
            description: None,
        }
    }

    /// Creates a node with the given children.
    #[must_use]
    pub fn branch(
        id: impl Into<String>,
        title: impl Into<String>,
        subtopics: Vec<TopicNode>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtopics,
            description: None,
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns `true` if the node has at least one child.
    #[must_use]
    pub fn has_subtopics(&self) -> bool {
        !self.subtopics.is_empty()
    }

    /// Depth-first pre-order search for `id` in this subtree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.subtopics.iter().find_map(|child| child.find(id))
    }

    fn collect_titles(&self, out: &mut Vec<String>) {
        out.push(self.title.clone());
        for child in &self.subtopics {
            child.collect_titles(out);
        }
    }

    fn collect_ids<'a>(&'a self, out: &mut HashSet<&'a str>) {
        out.insert(self.id.as_str());
        for child in &self.subtopics {
            child.collect_ids(out);
        }
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.subtopics.iter().map(Self::node_count).sum::<usize>()
    }
}

/// The curriculum forest.
///
/// Seed roots never change. Dynamic roots only grow: suggestions go to the
/// end of the dynamic list, custom requests to its front.
#[derive(Debug, Clone, Default)]
pub struct TopicTree {
    seed: Vec<TopicNode>,
    dynamic: Vec<TopicNode>,
    ids: HashSet<String>,
}

impl TopicTree {
    /// Creates a tree from seed roots.
    ///
    /// Seed ids are expected to be unique already; duplicates are renamed the
    /// same way appended nodes are.
    #[must_use]
    pub fn new(seed: Vec<TopicNode>) -> Self {
        let mut tree = Self::default();
        for mut node in seed {
            tree.claim_ids(&mut node);
            tree.seed.push(node);
        }
        tree
    }

    /// Seed roots.
    #[must_use]
    pub fn seed(&self) -> &[TopicNode] {
        &self.seed
    }

    /// Dynamic roots, in display order.
    #[must_use]
    pub fn dynamic(&self) -> &[TopicNode] {
        &self.dynamic
    }

    /// All roots: seed first, then dynamic.
    pub fn roots(&self) -> impl Iterator<Item = &TopicNode> {
        self.seed.iter().chain(self.dynamic.iter())
    }

    /// Finds a node by id at any depth.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&TopicNode> {
        if !self.ids.contains(id) {
            return None;
        }
        self.roots().find_map(|root| root.find(id))
    }

    /// Returns `true` if some node already uses `id`.
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Every title at every depth, depth-first pre-order, seed then dynamic.
    #[must_use]
    pub fn flatten_titles(&self) -> Vec<String> {
        let mut titles = Vec::with_capacity(self.ids.len());
        for root in self.roots() {
            root.collect_titles(&mut titles);
        }
        titles
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Appends suggested nodes to the end of the dynamic list, in order.
    ///
    /// An empty batch is a no-op. Returns the ids the nodes ended up with.
    pub fn append_suggested(&mut self, nodes: Vec<TopicNode>) -> Vec<String> {
        let mut added = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            self.claim_ids(&mut node);
            added.push(node.id.clone());
            self.dynamic.push(node);
        }
        added
    }

    /// Prepends a custom node to the dynamic list. Returns its final id.
    pub fn append_custom(&mut self, mut node: TopicNode) -> String {
        self.claim_ids(&mut node);
        let id = node.id.clone();
        self.dynamic.insert(0, node);
        id
    }

    /// Registers every id in `node`'s subtree, renaming blanks and collisions.
    fn claim_ids(&mut self, node: &mut TopicNode) {
        let base = if node.id.trim().is_empty() {
            id_from_title(&node.title)
        } else {
            node.id.trim().to_string()
        };
        node.id = self.unique_id(&base);
        self.ids.insert(node.id.clone());

        for child in &mut node.subtopics {
            self.claim_ids(child);
        }
    }

    /// `base` if unused, otherwise `base-2`, `base-3`, ...
    fn unique_id(&self, base: &str) -> String {
        if !self.ids.contains(base) {
            return base.to_string();
        }
        (2u64..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.ids.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Verifies that the id index matches the actual nodes.
    #[cfg(test)]
    pub(crate) fn ids_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        let mut total = 0usize;
        for root in self.roots() {
            total += root.node_count();
            root.collect_ids(&mut seen);
        }
        seen.len() == total && total == self.ids.len()
    }
}

/// Id for a node that arrived without one.
fn id_from_title(title: &str) -> String {
    if title.chars().any(|c| c.is_ascii_alphanumeric()) {
        slugify(title)
    } else {
        "topic".to_string()
    }
}
