//! CommitPointer - per-partition offset of the last committed record

use std::collections::BTreeMap;

use crate::RecordHandle;

/// Offsets of the most recently persisted-and-committed record per partition
///
/// Never moves backwards and never moves past a record that was not
/// persisted; the ingestion loop only advances it after a commit that
/// followed a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPointer {
    offsets: BTreeMap<i32, i64>,
}

impl CommitPointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last committed offset for `partition`
    pub fn get(&self, partition: i32) -> Option<i64> {
        self.offsets.get(&partition).copied()
    }

    /// Advance to `handle`
    ///
    /// Returns `false` (and leaves the pointer untouched) when `handle` is
    /// not ahead of the current position.
    pub fn advance(&mut self, handle: &RecordHandle) -> bool {
        match self.offsets.get(&handle.partition) {
            Some(&current) if current >= handle.offset => false,
            _ => {
                self.offsets.insert(handle.partition, handle.offset);
                true
            }
        }
    }

    /// `(partition, offset)` pairs in partition order
    pub fn iter(&self) -> impl Iterator<Item = (i32, i64)> + '_ {
        self.offsets.iter().map(|(p, o)| (*p, *o))
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
