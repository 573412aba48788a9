//! Bounded navigation history
//!
//! The router pushes the route it is leaving; going back pops from here
//! before falling back to the host's own history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::route::Route;

/// Maximum number of history entries
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// History entry with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Route id that was left
    pub route: String,
    /// Route title at the time
    pub title: String,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_route(route: &Route) -> Self {
        Self {
            route: route.id.clone(),
            title: route.title.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Stack of visited routes, oldest evicted first once full
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationHistory {
    /// Create history with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    /// Add a new entry, evicting the oldest when over capacity
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);

        if self.entries.len() > self.max_entries {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!("History full, evicted {}", evicted.route);
            }
        }
    }

    /// Remove and return the most recent entry
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// The last `limit` entries, oldest first
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Get total number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
