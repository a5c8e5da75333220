use crate::directory::types::{DirectMessageLink, DirectoryEntry};

/// A wholesale-replaced list of directory items
///
/// Items keep the order the control API returned them in. Lookups scan from the
/// back so that when two items share a name the last one listed wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Last item matching the predicate
    pub fn find_last(&self, predicate: impl Fn(&T) -> bool) -> Option<&T> {
        self.items.iter().rev().find(|item| predicate(item))
    }
}

impl Collection<DirectoryEntry> {
    pub fn find_by_name(&self, name: &str) -> Option<&DirectoryEntry> {
        self.find_last(|entry| entry.name == name)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&DirectoryEntry> {
        self.find_last(|entry| entry.id == id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&DirectoryEntry> {
        self.find_last(|entry| entry.email() == Some(email))
    }
}

impl Collection<DirectMessageLink> {
    pub fn for_user(&self, user_id: &str) -> Option<&DirectMessageLink> {
        self.find_last(|link| link.user_id == user_id)
    }

    /// Copy of this collection with `link` replacing any existing link for the same user
    pub fn with_link(&self, link: DirectMessageLink) -> Self {
        let mut items: Vec<_> = self
            .items
            .iter()
            .filter(|existing| existing.user_id != link.user_id)
            .cloned()
            .collect();
        items.push(link);
        Self { items }
    }
}
