//! Process-level search counters.
//!
//! Purely observational: nothing in the search pipeline reads these values,
//! so dropping the recorder changes what is reported, never what is served.

use crate::query::{CacheKey, SearchKind};
use dashmap::DashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::info;

/// Emit a summary log line every this many normalized requests.
const SUMMARY_EVERY: u64 = 10;

#[derive(Default)]
struct Counters {
    total_api_calls: AtomicU64,
    distance_calls: AtomicU64,
    volume_calls: AtomicU64,
    normalized_requests: AtomicU64,
    unique_keys: DashSet<String>,
    /// Unix millis of the last reset.
    started_at_ms: AtomicI64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallMetrics {
    pub total: u64,
    pub by_type: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationMetrics {
    pub total_requests: u64,
    pub unique_keys: u64,
    /// Share of requests that could have been served from cache, in percent
    /// with one decimal.
    pub cache_hit_potential_percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub api_calls: ApiCallMetrics,
    pub normalization: NormalizationMetrics,
    pub uptime_seconds: i64,
}

/// Running search counters. Clone-cheap; clones share state.
#[derive(Clone)]
pub struct MetricsRecorder {
    inner: Arc<Counters>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let counters = Counters::default();
        counters
            .started_at_ms
            .store(now_ms(), Ordering::Relaxed);
        Self {
            inner: Arc::new(counters),
        }
    }

    pub fn record_api_call(&self, kind: SearchKind) {
        self.inner.total_api_calls.fetch_add(1, Ordering::Relaxed);
        let per_type = match kind {
            SearchKind::Distance => &self.inner.distance_calls,
            SearchKind::Volume => &self.inner.volume_calls,
        };
        per_type.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_normalized_request(&self, key: &CacheKey) {
        let total = self.inner.normalized_requests.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.unique_keys.insert(key.as_str().to_owned());

        if total % SUMMARY_EVERY == 0 {
            let snapshot = self.snapshot();
            info!(
                total_requests = snapshot.normalization.total_requests,
                unique_keys = snapshot.normalization.unique_keys,
                cache_hit_potential = snapshot.normalization.cache_hit_potential_percent,
                uptime_secs = snapshot.uptime_seconds,
                "normalization summary"
            );
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        let total_requests = c.normalized_requests.load(Ordering::Relaxed);
        let unique_keys = c.unique_keys.len() as u64;

        let by_type = BTreeMap::from([
            (
                SearchKind::Distance.as_str(),
                c.distance_calls.load(Ordering::Relaxed),
            ),
            (
                SearchKind::Volume.as_str(),
                c.volume_calls.load(Ordering::Relaxed),
            ),
        ]);

        MetricsSnapshot {
            api_calls: ApiCallMetrics {
                total: c.total_api_calls.load(Ordering::Relaxed),
                by_type,
            },
            normalization: NormalizationMetrics {
                total_requests,
                unique_keys,
                cache_hit_potential_percent: hit_potential(total_requests, unique_keys),
            },
            uptime_seconds: (now_ms() - c.started_at_ms.load(Ordering::Relaxed)) / 1000,
        }
    }

    /// Zero every counter and forget all observed keys.
    pub fn reset(&self) {
        let c = &self.inner;
        c.total_api_calls.store(0, Ordering::Relaxed);
        c.distance_calls.store(0, Ordering::Relaxed);
        c.volume_calls.store(0, Ordering::Relaxed);
        c.normalized_requests.store(0, Ordering::Relaxed);
        c.unique_keys.clear();
        c.started_at_ms.store(now_ms(), Ordering::Relaxed);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn hit_potential(total: u64, unique: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Unique can briefly exceed total while a reset races a record call.
    let repeats = total.saturating_sub(unique) as f64;
    (repeats / total as f64 * 1000.0).round() / 10.0
}
