//! BullMQ inspection operations.
//!
//! Discovery, stats and job listing against any [`KeyspaceStore`]. These
//! functions never open or close connections themselves; the provider hands
//! them a store scoped to the current operation.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::debug;

use super::keys::BullKeys;
use super::state::{Bucket, Collection};
use super::store::KeyspaceStore;
use crate::backend::error::ProviderError;
use crate::observability::models::{Job, ProviderType, QueueInfo, QueueJobStatus, QueueStats};

/// SCAN cursor that both starts and ends an iteration.
const SCAN_SENTINEL: &str = "0";

// ============================================================================
// Discovery
// ============================================================================

/// Walks the keyspace with SCAN until the cursor returns to `"0"`.
///
/// Pages may repeat keys, so names are collected into a set; the result is
/// sorted. Keys that don't fit `<prefix>:<queue>:id` are skipped.
pub async fn discover_queues<S>(
    store: &S,
    keys: &BullKeys,
    scan_count: usize,
) -> Result<Vec<String>, ProviderError>
where
    S: KeyspaceStore + ?Sized,
{
    let pattern = keys.id_pattern();
    let mut queues = BTreeSet::new();
    let mut cursor = SCAN_SENTINEL.to_string();
    let mut pages = 0usize;

    loop {
        let (next, matched) = store.scan_page(&cursor, &pattern, scan_count).await?;
        pages += 1;
        for key in &matched {
            if let Some(queue) = keys.parse_id_key(key) {
                queues.insert(queue.to_string());
            }
        }
        if next == SCAN_SENTINEL {
            break;
        }
        cursor = next;
    }

    debug!(pattern = %pattern, pages, queues = queues.len(), "queue discovery complete");
    Ok(queues.into_iter().collect())
}

// ============================================================================
// Stats
// ============================================================================

async fn bucket_len<S>(store: &S, keys: &BullKeys, queue: &str, bucket: Bucket) -> u64
where
    S: KeyspaceStore + ?Sized,
{
    let key = keys.bucket(queue, bucket);
    let result = match bucket.collection() {
        Collection::List => store.list_len(&key).await,
        Collection::SortedSet => store.sorted_set_len(&key).await,
    };
    result.unwrap_or_else(|e| {
        debug!(key = %key, error = %e, "bucket unreadable, counting as zero");
        0
    })
}

/// Reads every bucket size concurrently plus the pause marker.
///
/// Bucket sizes are summed per normalized status, so jobs sitting in the
/// paused list or the prioritized set count as pending.
pub async fn queue_stats<S>(
    store: &S,
    keys: &BullKeys,
    provider: &str,
    queue: &str,
) -> QueueInfo
where
    S: KeyspaceStore + ?Sized,
{
    let paused_key = keys.paused_marker(queue);
    let (sizes, paused) = tokio::join!(
        join_all(
            Bucket::ALL
                .iter()
                .map(|bucket| async move { (*bucket, bucket_len(store, keys, queue, *bucket).await) })
        ),
        store.exists(&paused_key),
    );

    let paused = paused.unwrap_or_else(|e| {
        debug!(key = %paused_key, error = %e, "pause marker unreadable, assuming running");
        false
    });

    let count = |status: QueueJobStatus| -> u64 {
        sizes
            .iter()
            .filter(|(bucket, _)| bucket.status() == status)
            .map(|(_, len)| len)
            .sum()
    };

    let stats = QueueStats {
        pending: count(QueueJobStatus::Pending),
        processing: count(QueueJobStatus::Processing),
        completed: count(QueueJobStatus::Completed),
        failed: count(QueueJobStatus::Failed),
        delayed: Some(count(QueueJobStatus::Delayed)),
    };

    let mut metadata = Map::new();
    metadata.insert("paused".to_string(), Value::Bool(paused));
    metadata.insert("prefix".to_string(), Value::String(keys.prefix().to_string()));

    QueueInfo::new(queue, provider, ProviderType::RedisBullmq, stats, metadata)
}

// ============================================================================
// Jobs
// ============================================================================

/// Lists up to `limit` jobs from the buckets backing `status`.
///
/// Buckets are read in order until `limit` ids are collected. Lists are read
/// oldest first, sorted sets newest first. Job records that have vanished or
/// cannot be read are skipped; only a failed id read fails the listing.
pub async fn fetch_jobs<S>(
    store: &S,
    keys: &BullKeys,
    provider: &str,
    queue: &str,
    status: QueueJobStatus,
    limit: usize,
) -> Result<Vec<Job>, ProviderError>
where
    S: KeyspaceStore + ?Sized,
{
    let mut ids: Vec<(Bucket, String)> = Vec::new();
    for bucket in Bucket::for_status(status) {
        let remaining = limit.saturating_sub(ids.len());
        if remaining == 0 {
            break;
        }
        let bucket_key = keys.bucket(queue, *bucket);
        let stop = range_stop(remaining);
        let page = match bucket.collection() {
            Collection::List => store.list_range(&bucket_key, 0, stop).await?,
            Collection::SortedSet => store.sorted_set_rev_range(&bucket_key, 0, stop).await?,
        };
        ids.extend(page.into_iter().take(remaining).map(|id| (*bucket, id)));
    }

    let mut jobs = Vec::with_capacity(ids.len());
    for (bucket, id) in ids {
        let fields = match store.hash_get_all(&keys.job(queue, &id)).await {
            Ok(fields) => fields,
            Err(e) => {
                debug!(queue = %queue, job_id = %id, error = %e, "job record unreadable, skipping");
                continue;
            }
        };
        if fields.is_empty() {
            debug!(queue = %queue, job_id = %id, "job record vanished, skipping");
            continue;
        }
        jobs.push(job_from_hash(id, queue, provider, bucket.status(), fields));
    }

    Ok(jobs)
}

/// Inclusive stop index for a range of `count` elements starting at 0.
fn range_stop(count: usize) -> isize {
    isize::try_from(count).unwrap_or(isize::MAX).saturating_sub(1)
}

/// Projects a BullMQ job hash into a [`Job`].
///
/// Fields consumed by the normalized shape are removed; whatever remains is
/// kept verbatim in `provider_metadata`.
pub fn job_from_hash(
    id: String,
    queue: &str,
    provider: &str,
    status: QueueJobStatus,
    mut fields: HashMap<String, String>,
) -> Job {
    let data = fields
        .remove("data")
        .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
        .unwrap_or(Value::Null);

    let created_at = fields.get("timestamp").and_then(|v| parse_millis(v));
    let delay = fields
        .get("delay")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|d| *d > 0);
    let scheduled_for = match (fields.get("timestamp"), delay) {
        (Some(ts), Some(delay)) => ts
            .parse::<i64>()
            .ok()
            .and_then(|ts| millis_to_datetime(ts.saturating_add(delay))),
        _ => None,
    };
    fields.remove("timestamp");

    let processed_at = fields.remove("processedOn").and_then(|v| parse_millis(&v));
    let finished_at = fields.remove("finishedOn").and_then(|v| parse_millis(&v));
    let (completed_at, failed_at) = match status {
        QueueJobStatus::Completed => (finished_at, None),
        QueueJobStatus::Failed => (None, finished_at),
        _ => (None, None),
    };

    let attempts = fields
        .remove("attemptsMade")
        .and_then(|v| v.parse::<u32>().ok());
    let max_attempts = fields
        .get("opts")
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|opts| opts.get("attempts").and_then(Value::as_u64))
        .map(|n| n.min(u32::MAX as u64) as u32);

    let error = fields.remove("failedReason").filter(|s| !s.is_empty());
    let stacktrace = fields
        .remove("stacktrace")
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .filter(|lines| !lines.is_empty());

    // Object-valued progress has no normalized form and stays in metadata.
    let progress = fields
        .get("progress")
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 100.0).round() as u8);
    if progress.is_some() {
        fields.remove("progress");
    }

    let provider_metadata: Map<String, Value> = fields
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect();

    Job {
        id,
        queue: queue.to_string(),
        provider: provider.to_string(),
        status,
        data,
        created_at,
        processed_at,
        completed_at,
        failed_at,
        scheduled_for,
        attempts,
        max_attempts,
        error,
        stacktrace,
        progress,
        provider_metadata,
    }
}

fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<i64>().ok().and_then(millis_to_datetime)
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
