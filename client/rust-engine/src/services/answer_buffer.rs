use std::collections::BTreeMap;

use crate::models::{AnswerPatch, SavedAnswer};

/// One locally held answer. `dirty` means the value has not yet been
/// acknowledged by a successful flush. Entries are never deleted: a value
/// can be emptied but the key persists for the life of the session.
#[derive(Debug, Clone)]
pub struct AnswerEntry {
    pub value: String,
    pub dirty: bool,
    rev: u64,
}

/// A dirty entry captured by `snapshot_dirty`. Carries the revision it was
/// captured at so acknowledgements only clear entries the learner has not
/// edited again while the flush was in flight.
#[derive(Debug, Clone)]
pub struct PendingAnswer {
    pub task_number: u32,
    pub value: String,
    pub(crate) rev: u64,
}

impl PendingAnswer {
    pub fn to_patch(&self) -> AnswerPatch {
        AnswerPatch {
            task_number: self.task_number,
            value: self.value.clone(),
        }
    }
}

/// In-memory mapping from task number to the current answer value.
///
/// Mutated only by the session's own loop; the remote submission record is
/// written exclusively through the autosave publisher or the submission
/// gate.
#[derive(Debug, Default)]
pub struct AnswerBuffer {
    entries: BTreeMap<u32, AnswerEntry>,
    next_rev: u64,
}

impl AnswerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds entries from a previously saved submission. Restored answers
    /// are already persisted, so they start clean.
    pub fn restore(&mut self, saved: &[SavedAnswer]) {
        for answer in saved {
            self.next_rev += 1;
            self.entries.insert(
                answer.task_number,
                AnswerEntry {
                    value: answer.value.clone(),
                    dirty: false,
                    rev: self.next_rev,
                },
            );
        }
    }

    /// Records an edit and marks the entry dirty.
    pub fn set(&mut self, task_number: u32, value: String) {
        self.next_rev += 1;
        self.entries.insert(
            task_number,
            AnswerEntry {
                value,
                dirty: true,
                rev: self.next_rev,
            },
        );
    }

    /// Returns all dirty entries without clearing them.
    pub fn snapshot_dirty(&self) -> Vec<PendingAnswer> {
        self.entries
            .iter()
            .filter(|(_, e)| e.dirty)
            .map(|(task_number, e)| PendingAnswer {
                task_number: *task_number,
                value: e.value.clone(),
                rev: e.rev,
            })
            .collect()
    }

    /// Clears the dirty flag for exactly the flushed entries. An entry
    /// edited after the snapshot was taken has a newer revision and stays
    /// dirty for the next cycle.
    pub fn acknowledge(&mut self, flushed: &[PendingAnswer]) {
        for pending in flushed {
            if let Some(entry) = self.entries.get_mut(&pending.task_number) {
                if entry.rev == pending.rev {
                    entry.dirty = false;
                }
            }
        }
    }

    pub fn get(&self, task_number: u32) -> Option<&str> {
        self.entries.get(&task_number).map(|e| e.value.as_str())
    }

    pub fn is_answered(&self, task_number: u32) -> bool {
        self.entries
            .get(&task_number)
            .is_some_and(|e| !e.value.trim().is_empty())
    }

    pub fn answered_count(&self) -> u32 {
        self.entries
            .values()
            .filter(|e| !e.value.trim().is_empty())
            .count() as u32
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|e| e.dirty).count()
    }
}
