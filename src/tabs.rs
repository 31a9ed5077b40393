use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a diagram buffer, allocated by the editor and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named diagram source buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    pub content: String,
    /// Bumped on every content change; used to drop stale render results.
    pub revision: u64,
}

impl Tab {
    pub fn new(id: TabId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
            revision: 0,
        }
    }
}

/// Name given to a tab the session only learned about by id.
pub fn default_tab_name(prefix: &str, id: TabId) -> String {
    format!("{} {}", prefix, id)
}

/// Insertion-ordered tab collection keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TabRegistry {
    tabs: Vec<Tab>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|tab| tab.id).collect()
    }

    /// Adds `tab` unless its id is already present. Returns whether it was added.
    pub fn insert_if_absent(&mut self, tab: Tab) -> bool {
        if self.contains(tab.id) {
            return false;
        }
        self.tabs.push(tab);
        true
    }

    /// Overwrites the content of an existing tab, returning its new revision.
    pub fn set_content(&mut self, id: TabId, content: &str) -> Option<u64> {
        let tab = self.tabs.iter_mut().find(|tab| tab.id == id)?;
        tab.content.clear();
        tab.content.push_str(content);
        tab.revision += 1;
        Some(tab.revision)
    }

    pub fn content(&self, id: TabId) -> Option<&str> {
        self.get(id).map(|tab| tab.content.as_str())
    }

    pub fn revision(&self, id: TabId) -> Option<u64> {
        self.get(id).map(|tab| tab.revision)
    }
}
