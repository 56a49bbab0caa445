//! Known chats, in sidebar order

use serde::{Deserialize, Serialize};

/// Sidebar entry for one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fav: bool,
}

impl ChatSummary {
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title,
            fav: false,
        }
    }
}

/// Favorites and the rest, each in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedChats {
    pub favorites: Vec<ChatSummary>,
    pub others: Vec<ChatSummary>,
}

/// Registry of chats, unique by id
///
/// Expected to hold tens to low hundreds of entries, so lookups are linear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRegistry {
    entries: Vec<ChatSummary>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, keeping the first entry for each id
    pub fn from_summaries(summaries: impl IntoIterator<Item = ChatSummary>) -> Self {
        let mut registry = Self::new();
        for summary in summaries {
            registry.insert_if_absent(summary);
        }
        registry
    }

    /// Insert unless an entry with the same id exists; true if inserted
    pub fn insert_if_absent(&mut self, summary: ChatSummary) -> bool {
        if self.contains(&summary.id) {
            return false;
        }
        self.entries.push(summary);
        true
    }

    /// Remove by id; absent ids are a no-op
    pub fn remove(&mut self, id: &str) -> Option<ChatSummary> {
        let pos = self.entries.iter().position(|s| s.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&ChatSummary> {
        self.entries.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Returns false if the id is unknown
    pub fn set_title(&mut self, id: &str, title: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|s| s.id == id) {
            Some(entry) => {
                entry.title = Some(title.into());
                true
            }
            None => false,
        }
    }

    /// Flip the favorite flag, returning the new value
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let entry = self.entries.iter_mut().find(|s| s.id == id)?;
        entry.fav = !entry.fav;
        Some(entry.fav)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatSummary> {
        self.entries.iter()
    }

    /// Display projection; recomputed on every call
    pub fn grouped(&self) -> GroupedChats {
        let (favorites, others): (Vec<_>, Vec<_>) =
            self.entries.iter().cloned().partition(|s| s.fav);
        GroupedChats { favorites, others }
    }
}
