//! Local view of the system prompt collection

use crate::backend::{PromptId, PromptRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Local handle for a prompt entry.
///
/// Stable for the entry's lifetime, unlike its position, so completions of
/// in-flight calls still find the right entry after other entries are
/// removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PromptKey(u64);

/// Remote write performed on a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOp {
    Save,
    Update,
    Delete,
}

/// How the local entry relates to the service's record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never persisted
    Draft,
    Saving,
    Synced,
    /// Persisted, with local edits not yet pushed
    Modified,
    Updating,
    Deleting,
    /// Last write failed; the local content is kept for a retry
    Failed { op: PromptOp, message: String },
}

impl SyncStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Saving | Self::Updating | Self::Deleting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEntry {
    pub key: PromptKey,
    pub id: Option<PromptId>,
    pub content: String,
    pub sync: SyncStatus,
}

impl PromptEntry {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Status an idle entry falls back to after a local edit or a failed write
    fn resting_status(&self) -> SyncStatus {
        if self.is_persisted() {
            SyncStatus::Modified
        } else {
            SyncStatus::Draft
        }
    }
}

/// Ordered prompt sequence, addressed by position from the outside
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSet {
    entries: Vec<PromptEntry>,
    next_key: u64,
    /// Entries whose write the service confirmed while a refresh was
    /// outstanding. The refresh may have been read before the write.
    settled_during_refresh: BTreeSet<PromptKey>,
    /// Records deleted while a refresh was outstanding
    deleted_during_refresh: BTreeSet<PromptId>,
}

impl PromptSet {
    pub fn entries(&self) -> &[PromptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PromptEntry> {
        self.entries.get(index)
    }

    pub fn position(&self, key: PromptKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn by_key(&self, key: PromptKey) -> Option<&PromptEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn by_key_mut(&mut self, key: PromptKey) -> Option<&mut PromptEntry> {
        self.entries.iter_mut().find(|e| e.key == key)
    }

    /// Content list in order, exactly as edited locally
    pub fn contents(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.content.clone()).collect()
    }

    /// Merge the service's collection into the local one.
    ///
    /// Synced entries take the service's content and order. Local work the
    /// service may not reflect yet (drafts, edits, failed or in-flight
    /// writes, writes confirmed since the refresh was issued) is kept, and
    /// records deleted since then are skipped.
    pub fn reconcile(&mut self, records: Vec<PromptRecord>) {
        let mut local = std::mem::take(&mut self.entries);
        let settled = std::mem::take(&mut self.settled_during_refresh);
        let deleted = std::mem::take(&mut self.deleted_during_refresh);
        let keeps_local =
            |e: &PromptEntry| e.sync != SyncStatus::Synced || settled.contains(&e.key);

        let mut entries = Vec::with_capacity(records.len() + local.len());
        for record in records {
            if deleted.contains(&record.id) {
                continue;
            }
            match local.iter().position(|e| e.id.as_ref() == Some(&record.id)) {
                Some(i) => {
                    let mut entry = local.remove(i);
                    if !keeps_local(&entry) {
                        entry.content = record.content;
                    }
                    entries.push(entry);
                }
                None => entries.push(PromptEntry {
                    key: self.allocate_key(),
                    id: Some(record.id),
                    content: record.content,
                    sync: SyncStatus::Synced,
                }),
            }
        }
        // Synced entries the service no longer has are gone
        entries.extend(local.into_iter().filter(keeps_local));
        self.entries = entries;
    }

    /// A refresh failed or was discarded; nothing is waiting for the notes
    pub fn forget_refresh(&mut self) {
        self.settled_during_refresh.clear();
        self.deleted_during_refresh.clear();
    }

    /// Remember a write confirmed while a refresh is outstanding
    pub fn note_settled_during_refresh(&mut self, key: PromptKey) {
        self.settled_during_refresh.insert(key);
    }

    /// Remember a delete confirmed while a refresh is outstanding
    pub fn note_deleted_during_refresh(&mut self, id: PromptId) {
        self.deleted_during_refresh.insert(id);
    }

    pub fn add_blank(&mut self) -> PromptKey {
        let key = self.allocate_key();
        self.entries.push(PromptEntry {
            key,
            id: None,
            content: String::new(),
            sync: SyncStatus::Draft,
        });
        key
    }

    /// Local edit. In-flight writes keep their status; their completion
    /// notices the divergence.
    pub fn edit(&mut self, index: usize, text: String) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        entry.content = text;
        if !entry.sync.is_in_flight() {
            entry.sync = entry.resting_status();
        }
        true
    }

    /// Service accepted a create. `sent` is the content that was submitted.
    pub fn confirm_saved(&mut self, key: PromptKey, record: PromptRecord, sent: &str) -> bool {
        let Some(entry) = self.by_key_mut(key) else {
            return false;
        };
        entry.id = Some(record.id);
        if entry.content == sent {
            entry.content = record.content;
            entry.sync = SyncStatus::Synced;
        } else {
            entry.sync = SyncStatus::Modified;
        }
        true
    }

    /// Service accepted an update of `sent`
    pub fn confirm_updated(&mut self, key: PromptKey, sent: &str) -> bool {
        let Some(entry) = self.by_key_mut(key) else {
            return false;
        };
        entry.sync = if entry.content == sent {
            SyncStatus::Synced
        } else {
            SyncStatus::Modified
        };
        true
    }

    pub fn mark(&mut self, key: PromptKey, sync: SyncStatus) -> bool {
        let Some(entry) = self.by_key_mut(key) else {
            return false;
        };
        entry.sync = sync;
        true
    }

    pub fn mark_failed(&mut self, key: PromptKey, op: PromptOp, message: String) -> bool {
        self.mark(key, SyncStatus::Failed { op, message })
    }

    pub fn remove(&mut self, key: PromptKey) -> Option<PromptEntry> {
        let index = self.position(key)?;
        Some(self.entries.remove(index))
    }

    /// Drop every entry. Keys keep counting so late completions for the
    /// dropped entries cannot land on new ones.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.forget_refresh();
    }

    fn allocate_key(&mut self) -> PromptKey {
        let key = PromptKey(self.next_key);
        self.next_key += 1;
        key
    }
}
