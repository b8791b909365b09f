//! BullMQ Redis key layout.
//!
//! Every queue owns an id counter at `<prefix>:<queue>:id`, which is what
//! discovery scans for. Buckets and job hashes hang off the same
//! `<prefix>:<queue>:` namespace:
//!
//! | key                          | type       | contents                    |
//! |------------------------------|------------|-----------------------------|
//! | `<prefix>:<queue>:id`        | string     | last issued job id          |
//! | `<prefix>:<queue>:wait`      | list       | waiting job ids             |
//! | `<prefix>:<queue>:prioritized` | sorted set | waiting ids with a priority |
//! | `<prefix>:<queue>:waiting-children` | sorted set | parents awaiting children |
//! | `<prefix>:<queue>:active`    | list       | job ids being processed     |
//! | `<prefix>:<queue>:completed` | sorted set | finished job ids            |
//! | `<prefix>:<queue>:failed`    | sorted set | failed job ids              |
//! | `<prefix>:<queue>:delayed`   | sorted set | job ids scheduled for later |
//! | `<prefix>:<queue>:paused`    | list       | waiting ids while paused    |
//! | `<prefix>:<queue>:<jobId>`   | hash       | job record                  |

use super::state::Bucket;

pub const DEFAULT_PREFIX: &str = "bull";

const ID_SUFFIX: &str = "id";

/// Key builder/parser bound to one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BullKeys {
    prefix: String,
}

impl BullKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// SCAN MATCH pattern for queue id keys.
    pub fn id_pattern(&self) -> String {
        format!("{}:*:{}", self.prefix, ID_SUFFIX)
    }

    /// Extracts the queue name from `<prefix>:<queue>:id`.
    ///
    /// The queue segment must be non-empty and colon-free; anything else is
    /// not a queue id key and yields `None`.
    pub fn parse_id_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(self.prefix.as_str())?.strip_prefix(':')?;
        let queue = rest.strip_suffix(ID_SUFFIX)?.strip_suffix(':')?;
        if queue.is_empty() || queue.contains(':') {
            return None;
        }
        Some(queue)
    }

    pub fn bucket(&self, queue: &str, bucket: Bucket) -> String {
        format!("{}:{}:{}", self.prefix, queue, bucket.suffix())
    }

    /// The paused list; its presence marks the queue as paused.
    pub fn paused_marker(&self, queue: &str) -> String {
        self.bucket(queue, Bucket::Paused)
    }

    pub fn job(&self, queue: &str, job_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, queue, job_id)
    }
}

impl Default for BullKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
