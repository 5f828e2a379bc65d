use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use super::request::WeakRequest;
use crate::providers::Provider;

/// Sort key of a provider entry: ascending `order`, then insertion sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct EntryKey {
    order: i32,
    seq: u64,
}

pub(crate) struct ProviderEntry {
    pub(crate) provider: Box<dyn Provider>,
    pub(crate) identifier: String,
    /// Requests currently being decided by this provider, by serial
    attached: HashMap<u64, WeakRequest>,
    deletion_pending: bool,
}

impl ProviderEntry {
    fn is_valid(&self) -> bool {
        !self.deletion_pending
    }
}

/// Ordered provider list owned by the dispatch lane
#[derive(Default)]
pub(crate) struct ProviderRegistry {
    entries: BTreeMap<EntryKey, ProviderEntry>,
    next_seq: u64,
}

impl ProviderRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert after every existing entry with the same or lower order
    pub(crate) fn insert(
        &mut self,
        provider: Box<dyn Provider>,
        order: i32,
        identifier: String,
    ) -> EntryKey {
        let key = EntryKey {
            order,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(
            key,
            ProviderEntry {
                provider,
                identifier,
                attached: HashMap::new(),
                deletion_pending: false,
            },
        );
        key
    }

    pub(crate) fn first_valid(&self) -> Option<EntryKey> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.is_valid())
            .map(|(key, _)| *key)
    }

    /// Next selectable entry after `after`, which may itself be gone already
    pub(crate) fn next_valid(&self, after: EntryKey) -> Option<EntryKey> {
        self.entries
            .range((Bound::Excluded(after), Bound::Unbounded))
            .find(|(_, entry)| entry.is_valid())
            .map(|(key, _)| *key)
    }

    pub(crate) fn get(&self, key: EntryKey) -> Option<&ProviderEntry> {
        self.entries.get(&key)
    }

    pub(crate) fn attach(&mut self, key: EntryKey, serial: u64, request: WeakRequest) -> Option<&ProviderEntry> {
        let entry = self.entries.get_mut(&key)?;
        entry.attached.insert(serial, request);
        Some(entry)
    }

    /// Drop the attachment; erases a deletion-pending entry once idle.
    /// Returns true if the entry was erased.
    pub(crate) fn detach(&mut self, key: EntryKey, serial: u64) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        let was_attached = entry.attached.remove(&serial).is_some();
        debug_assert!(was_attached, "request {serial} was not attached");

        if entry.deletion_pending && entry.attached.is_empty() {
            self.entries.remove(&key);
            return true;
        }
        false
    }

    /// Remove every selectable entry matching `matches`.
    ///
    /// Idle entries are erased immediately. Entries with attachments are
    /// marked deletion pending and their attachments returned so the caller
    /// can finalize them. Returns the number of entries taken out of service.
    pub(crate) fn remove_where(
        &mut self,
        mut matches: impl FnMut(&ProviderEntry) -> bool,
    ) -> (usize, Vec<(EntryKey, WeakRequest)>) {
        let mut removed = 0;
        let mut attached = Vec::new();

        self.entries.retain(|key, entry| {
            if entry.deletion_pending || !matches(entry) {
                return true;
            }
            removed += 1;
            if entry.attached.is_empty() {
                return false;
            }
            entry.deletion_pending = true;
            attached.extend(entry.attached.values().map(|request| (*key, request.clone())));
            true
        });

        (removed, attached)
    }

    /// Entries still stored, including deletion-pending ones
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
