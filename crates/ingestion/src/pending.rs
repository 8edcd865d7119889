//! Redelivery slot shared by the log clients

use contracts::{IngestRecord, RecordHandle};

/// The last delivered record that has not been released yet
///
/// Poll hands it out again until the loop releases it (after a successful
/// write) or the commit for the same handle succeeds.
#[derive(Debug, Default)]
pub(crate) struct PendingRecord {
    record: Option<IngestRecord>,
}

impl PendingRecord {
    /// Remember a freshly delivered record
    pub(crate) fn hold(&mut self, record: &IngestRecord) {
        self.record = Some(record.clone());
    }

    /// Copy of the held record, if any
    pub(crate) fn redeliver(&self) -> Option<IngestRecord> {
        self.record.clone()
    }

    /// Drop the held record when it is the one at `handle`
    pub(crate) fn release(&mut self, handle: &RecordHandle) -> bool {
        if self
            .record
            .as_ref()
            .is_some_and(|held| held.handle == *handle)
        {
            self.record = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) {
        self.record = None;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.record.is_none()
    }
}
