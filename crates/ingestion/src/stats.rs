//! Statistics of one loop run

use std::time::Duration;

use contracts::CommitPointer;

/// Counters collected by the ingestion loop
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// Records returned by poll, redeliveries included
    pub records_received: u64,

    /// Polls that elapsed without a record
    pub idle_polls: u64,

    /// Polls that failed
    pub poll_errors: u64,

    /// Successful writes
    pub persisted: u64,

    /// Failed writes (left uncommitted)
    pub persist_failures: u64,

    /// Successful offset commits
    pub commits: u64,

    /// Failed offset commits after a successful write
    pub commit_failures: u64,

    /// Run duration
    pub duration: Duration,

    /// Offsets committed by this run
    pub commit_pointer: CommitPointer,
}

impl LoopStats {
    /// Records per second that made it into the store
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.persisted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Failed writes as a percentage of write attempts
    pub fn failure_rate(&self) -> f64 {
        let total = self.persisted + self.persist_failures;
        if total > 0 {
            (self.persist_failures as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}
