//! Session progress counters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Ids of nodes expanded at least once this session. Only ever grows.
#[derive(Debug, Clone, Default)]
pub struct ExploredSet {
    ids: HashSet<String>,
}

impl ExploredSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id`. Returns `true` if it was not already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Returns `true` if `id` has been explored.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of explored ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if nothing has been explored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Counters shown in the session header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Lessons that reached the success state.
    pub lessons_generated: u64,
    /// Size of the explored set.
    pub topics_explored: u64,
}

impl SessionStats {
    /// Records one successful lesson.
    pub fn record_lesson(&mut self) {
        self.lessons_generated = self.lessons_generated.saturating_add(1);
    }

    /// Recomputes `topics_explored` from the explored set.
    pub fn sync_explored(&mut self, explored: &ExploredSet) {
        self.topics_explored = u64::try_from(explored.len()).unwrap_or(u64::MAX);
    }
}
