//! Mapping between BullMQ job states and the normalized taxonomy.

use crate::observability::models::QueueJobStatus;

/// Redis data structure backing a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    List,
    SortedSet,
}

/// The BullMQ collections a job id can sit in.
///
/// Several collections share one normalized status: `wait`, `paused`,
/// `prioritized` and `waiting-children` all hold pending jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Wait,
    Paused,
    Prioritized,
    WaitingChildren,
    Active,
    Completed,
    Failed,
    Delayed,
}

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::Wait,
        Bucket::Paused,
        Bucket::Prioritized,
        Bucket::WaitingChildren,
        Bucket::Active,
        Bucket::Completed,
        Bucket::Failed,
        Bucket::Delayed,
    ];

    /// Collections read, in order, when listing jobs of `status`.
    pub fn for_status(status: QueueJobStatus) -> &'static [Bucket] {
        match status {
            QueueJobStatus::Pending => &[
                Bucket::Wait,
                Bucket::Paused,
                Bucket::Prioritized,
                Bucket::WaitingChildren,
            ],
            QueueJobStatus::Processing => &[Bucket::Active],
            QueueJobStatus::Completed => &[Bucket::Completed],
            QueueJobStatus::Failed => &[Bucket::Failed],
            QueueJobStatus::Delayed => &[Bucket::Delayed],
        }
    }

    /// Key suffix, which is also BullMQ's native state name for the bucket.
    pub fn suffix(&self) -> &'static str {
        match self {
            Bucket::Wait => "wait",
            Bucket::Paused => "paused",
            Bucket::Prioritized => "prioritized",
            Bucket::WaitingChildren => "waiting-children",
            Bucket::Active => "active",
            Bucket::Completed => "completed",
            Bucket::Failed => "failed",
            Bucket::Delayed => "delayed",
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Bucket::Wait | Bucket::Paused | Bucket::Active => Collection::List,
            Bucket::Prioritized
            | Bucket::WaitingChildren
            | Bucket::Completed
            | Bucket::Failed
            | Bucket::Delayed => Collection::SortedSet,
        }
    }

    /// Normalized status of jobs read from this bucket.
    pub fn status(&self) -> QueueJobStatus {
        normalize_state(self.suffix())
    }
}

/// Maps a BullMQ state name onto the normalized taxonomy.
///
/// Unknown states become `Pending` so no job disappears from the totals.
pub fn normalize_state(native: &str) -> QueueJobStatus {
    match native {
        "wait" | "waiting" | "paused" | "prioritized" | "waiting-children" => {
            QueueJobStatus::Pending
        }
        "active" => QueueJobStatus::Processing,
        "completed" => QueueJobStatus::Completed,
        "failed" => QueueJobStatus::Failed,
        "delayed" => QueueJobStatus::Delayed,
        _ => QueueJobStatus::Pending,
    }
}
