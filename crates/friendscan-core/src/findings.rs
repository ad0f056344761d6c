use crate::contact::Contact;

/// Append-only, ordered list of contacts found to be former friends.
///
/// Entries are `"nickname / remark"` labels. Nothing is deduplicated: each
/// eligible contact is probed in exactly one batch, so duplicates cannot arise
/// within a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingSet {
    entries: Vec<String>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, contact: &Contact) {
        self.entries.push(contact.label());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }
}

impl IntoIterator for FindingSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
