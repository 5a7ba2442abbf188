//! The metrics aggregator: turns a list of chat sessions into display-ready
//! dashboard summaries.
//!
//! All reads are memoized for five minutes in per-operation caches keyed by
//! a content fingerprint of the session list. Headline counters are
//! high-water marks persisted through [`MetricsStorage`]; they only move up
//! until [`DashboardService::reset_cumulative_metrics`] is called. Storage
//! and time are injected so the whole module runs deterministically in tests.
//!
//! No operation here returns an error: malformed input degrades to zeros,
//! and storage failures are warned once and otherwise ignored.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::TtlCache;
use crate::models::{self, CHART_PALETTE};
use crate::storage::{FileStorage, MetricsStorage};
use crate::types::{
    ChatSession, DashboardMetrics, DashboardSnapshot, ModelUsageData, TimeSeriesData, UsageCounters,
    UsageData,
};
use crate::utils::{fast_hash, warn_once};

/// Storage keys for the two persisted high-water-mark documents.
pub const METRICS_KEY: &str = "dashboard-metrics";
pub const USAGE_KEY: &str = "usage-data";

/// Fixed byte estimates for fields whose serialized size is not worth
/// measuring per session.
const RESPONSE_TIME_BYTES: u64 = 4;
const TIMESTAMP_BYTES: u64 = 8;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Inner {
    /// Model id -> palette color, populated lazily in first-seen order.
    colors: HashMap<String, &'static str>,
    cumulative: DashboardMetrics,
    counters: UsageCounters,
    metrics_cache: TtlCache<DashboardMetrics>,
    usage_cache: TtlCache<UsageData>,
    model_table_cache: TtlCache<Vec<ModelUsageData>>,
    timeline_cache: TtlCache<Vec<TimeSeriesData>>,
    legend_cache: TtlCache<Vec<String>>,
}

impl Inner {
    /// The k-th distinct model ever seen gets `CHART_PALETTE[(k-1) % 10]`;
    /// a model keeps its color for the lifetime of the service.
    fn assign_color(&mut self, model: &str) -> &'static str {
        if let Some(&color) = self.colors.get(model) {
            return color;
        }
        let color = CHART_PALETTE[self.colors.len() % CHART_PALETTE.len()];
        self.colors.insert(model.to_string(), color);
        color
    }
}

pub struct DashboardService {
    storage: Box<dyn MetricsStorage>,
    clock: Box<dyn Clock>,
    inner: Mutex<Inner>,
}

impl DashboardService {
    pub fn new(storage: Box<dyn MetricsStorage>, clock: Box<dyn Clock>) -> Self {
        let cumulative: DashboardMetrics = load_document(storage.as_ref(), METRICS_KEY);
        let counters: UsageCounters = load_document(storage.as_ref(), USAGE_KEY);

        Self {
            storage,
            clock,
            inner: Mutex::new(Inner {
                colors: HashMap::new(),
                cumulative,
                counters,
                metrics_cache: TtlCache::new(),
                usage_cache: TtlCache::new(),
                model_table_cache: TtlCache::new(),
                timeline_cache: TtlCache::new(),
                legend_cache: TtlCache::new(),
            }),
        }
    }

    /// Production wiring: file-backed storage under `~/.fiesta`, wall clock.
    pub fn with_default_storage() -> anyhow::Result<Self> {
        let storage = FileStorage::default_dir()?;
        Ok(Self::new(Box::new(storage), Box::new(SystemClock)))
    }

    /// Headline counters, ratcheted against everything this installation has
    /// ever seen and persisted after every call.
    pub fn dashboard_metrics(&self, sessions: &[ChatSession]) -> DashboardMetrics {
        let now = self.clock.now();
        let key = cache_key("dashboard_metrics", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.metrics_cache.get(&key, now) {
            return cached;
        }

        let merged = inner.cumulative.merge_max(&compute_dashboard_metrics(sessions));
        inner.cumulative = merged.clone();
        self.persist_document(METRICS_KEY, &merged);
        inner.metrics_cache.insert(key, merged.clone(), now);
        merged
    }

    /// API-call and comparison counters (ratcheted) plus the current
    /// estimated storage footprint (never ratcheted).
    pub fn usage_data(&self, sessions: &[ChatSession]) -> UsageData {
        let now = self.clock.now();
        let key = cache_key("usage_data", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.usage_cache.get(&key, now) {
            return cached;
        }

        let count = sessions.len() as u64;
        let merged = inner.counters.merge_max(&UsageCounters {
            api_calls: count,
            comparisons: count,
        });
        inner.counters = merged.clone();
        self.persist_document(USAGE_KEY, &merged);

        let usage = UsageData {
            api_calls: merged.api_calls,
            comparisons: merged.comparisons,
            storage_mb: estimate_storage_mb(sessions),
        };
        inner.usage_cache.insert(key, usage.clone(), now);
        usage
    }

    /// Mean attributed response time per model, ascending (fastest first).
    ///
    /// A session's total `response_time` is split evenly across its selected
    /// models; sessions without a time, or without models, contribute
    /// nothing.
    pub fn response_time_data(&self, sessions: &[ChatSession]) -> Vec<ModelUsageData> {
        let now = self.clock.now();
        let key = cache_key("response_time", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.model_table_cache.get(&key, now) {
            return cached;
        }

        let mut rows = Vec::new();
        for (model, avg) in average_shares(&response_time_shares(sessions)) {
            rows.push(ModelUsageData {
                name: models::display_name(&model),
                value: avg,
                color: inner.assign_color(&model).to_string(),
            });
        }
        rows.sort_by(|a, b| a.value.total_cmp(&b.value));

        inner.model_table_cache.insert(key, rows.clone(), now);
        rows
    }

    /// Alias kept for chart consumers that ask for a "distribution".
    pub fn response_time_distribution_data(&self, sessions: &[ChatSession]) -> Vec<ModelUsageData> {
        self.response_time_data(sessions)
    }

    /// How many comparisons each model took part in, descending.
    pub fn messages_typed_data(&self, sessions: &[ChatSession]) -> Vec<ModelUsageData> {
        let now = self.clock.now();
        let key = cache_key("messages_typed", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.model_table_cache.get(&key, now) {
            return cached;
        }

        let mut rows = Vec::new();
        for (model, count) in model_occurrences(sessions) {
            rows.push(ModelUsageData {
                name: models::display_name(&model),
                value: count as f64,
                color: inner.assign_color(&model).to_string(),
            });
        }
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));

        inner.model_table_cache.insert(key, rows.clone(), now);
        rows
    }

    /// Synthetic per-model processing figure that shrinks with usage:
    /// `max(0.1, 1.0 - 0.05 * count)`, ascending.
    pub fn model_processing_time_data(&self, sessions: &[ChatSession]) -> Vec<ModelUsageData> {
        let now = self.clock.now();
        let key = cache_key("model_processing", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.model_table_cache.get(&key, now) {
            return cached;
        }

        let mut rows = Vec::new();
        for (model, count) in model_occurrences(sessions) {
            let value = (1.0 - count as f64 * 0.05).max(0.1);
            rows.push(ModelUsageData {
                name: models::display_name(&model),
                value,
                color: inner.assign_color(&model).to_string(),
            });
        }
        rows.sort_by(|a, b| a.value.total_cmp(&b.value));

        inner.model_table_cache.insert(key, rows.clone(), now);
        rows
    }

    /// Per-day timeline of mean attributed response times. One row per UTC
    /// calendar date; each row only carries keys for models that have a
    /// nonzero average that day.
    pub fn line_chart_data(&self, sessions: &[ChatSession]) -> Vec<TimeSeriesData> {
        let now = self.clock.now();
        let key = cache_key("line_chart", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.timeline_cache.get(&key, now) {
            return cached;
        }

        let mut by_date: BTreeMap<String, Vec<&ChatSession>> = BTreeMap::new();
        for session in sessions {
            let date = session.timestamp.format("%Y-%m-%d").to_string();
            by_date.entry(date).or_default().push(session);
        }

        let mut rows = Vec::with_capacity(by_date.len());
        for (date, day_sessions) in by_date {
            let mut values = BTreeMap::new();
            for (model, avg) in average_shares(&response_time_shares(day_sessions)) {
                values.insert(models::display_name(&model), avg);
            }
            rows.push(TimeSeriesData {
                period: date,
                values,
            });
        }

        inner.timeline_cache.insert(key, rows.clone(), now);
        rows
    }

    /// Legend for the timeline: distinct display labels across all selected
    /// models, in first-seen order.
    pub fn line_chart_metrics(&self, sessions: &[ChatSession]) -> Vec<String> {
        let now = self.clock.now();
        let key = cache_key("line_chart_metrics", sessions);
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.legend_cache.get(&key, now) {
            return cached;
        }

        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for session in sessions {
            for model in &session.selected_models {
                let label = models::display_name(model);
                if seen.insert(label.clone()) {
                    labels.push(label);
                }
            }
        }

        inner.legend_cache.insert(key, labels.clone(), now);
        labels
    }

    /// Run every aggregation once and bundle the results for JSON output.
    pub fn snapshot(&self, sessions: &[ChatSession], include_sessions: bool) -> DashboardSnapshot {
        DashboardSnapshot {
            metrics: self.dashboard_metrics(sessions),
            usage: self.usage_data(sessions),
            response_times: self.response_time_data(sessions),
            messages_typed: self.messages_typed_data(sessions),
            processing_times: self.model_processing_time_data(sessions),
            timeline: self.line_chart_data(sessions),
            timeline_models: self.line_chart_metrics(sessions),
            sessions: include_sessions.then(|| sessions.to_vec()),
        }
    }

    /// Stable chart color for a model id (assigning one if unseen).
    pub fn model_color(&self, model: &str) -> String {
        self.inner.lock().assign_color(model).to_string()
    }

    /// Drop every memoized aggregate. Call after any store mutation so the
    /// next read recomputes from fresh data.
    pub fn clear_cache(&self) {
        let mut inner = self.inner.lock();
        inner.metrics_cache.clear();
        inner.usage_cache.clear();
        inner.model_table_cache.clear();
        inner.timeline_cache.clear();
        inner.legend_cache.clear();
    }

    /// Zero both ratchets and persist the zeroed state. Used by
    /// account-deletion flows.
    pub fn reset_cumulative_metrics(&self) {
        let mut inner = self.inner.lock();
        inner.cumulative = DashboardMetrics::default();
        inner.counters = UsageCounters::default();
        self.persist_document(METRICS_KEY, &inner.cumulative);
        self.persist_document(USAGE_KEY, &inner.counters);
    }

    fn persist_document<T: Serialize>(&self, key: &str, value: &T) {
        let serialized = match simd_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn_once(format!("⚠️  Could not serialize {key}: {e}"));
                return;
            }
        };
        if let Err(e) = self.storage.set(key, &serialized) {
            warn_once(format!("⚠️  Could not persist {key}: {e}"));
        }
    }
}

fn load_document<T: DeserializeOwned + Default>(storage: &dyn MetricsStorage, key: &str) -> T {
    match storage.get(key) {
        Ok(Some(raw)) => {
            let mut bytes = raw.into_bytes();
            match simd_json::from_slice(&mut bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn_once(format!("⚠️  Ignoring corrupt {key} document: {e}"));
                    T::default()
                }
            }
        }
        Ok(None) => T::default(),
        Err(e) => {
            warn_once(format!("⚠️  Could not read {key}: {e}"));
            T::default()
        }
    }
}

/// Content fingerprint of the session list. Two different sets of equal
/// size never produce the same key.
fn cache_key(operation: &str, sessions: &[ChatSession]) -> String {
    let mut buf = Vec::with_capacity(sessions.len() * 48);
    for session in sessions {
        buf.extend_from_slice(session.id.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&session.timestamp.timestamp_millis().to_le_bytes());
        buf.extend_from_slice(&(session.responses.len() as u64).to_le_bytes());
        buf.extend_from_slice(&session.response_time.unwrap_or(0.0).to_le_bytes());
        if let Some(best) = &session.best_response {
            buf.extend_from_slice(best.as_bytes());
        }
        buf.push(0);
        for model in &session.selected_models {
            buf.extend_from_slice(model.as_bytes());
            buf.push(b',');
        }
        buf.push(b';');
    }
    format!(
        "{operation}_{:016x}_{}",
        fast_hash(&buf),
        sessions.len()
    )
}

fn compute_dashboard_metrics(sessions: &[ChatSession]) -> DashboardMetrics {
    let total_comparisons = sessions.len() as u64;

    let models_analyzed = sessions
        .iter()
        .flat_map(|s| s.selected_models.iter())
        .collect::<HashSet<_>>()
        .len() as u64;

    let total_responses: u64 = sessions.iter().map(|s| s.responses.len() as u64).sum();

    // Placeholder ratio of comparisons to individual responses, capped at 100.
    let accuracy_score = if total_responses > 0 {
        ((total_comparisons as f64 / total_responses as f64) * 100.0)
            .round()
            .min(100.0) as u64
    } else {
        0
    };

    // Placeholder saturating counter: min(100, total_comparisons).
    let api_usage = total_comparisons.min(100);

    DashboardMetrics {
        total_comparisons,
        models_analyzed,
        accuracy_score,
        api_usage,
    }
}

fn estimate_session_bytes(session: &ChatSession) -> u64 {
    let responses_bytes = match simd_json::to_string(&session.responses) {
        Ok(serialized) => serialized.len() as u64,
        // Rough per-entry estimate if serialization ever fails.
        Err(_) => session.responses.len() as u64 * 100,
    };
    let models_bytes: u64 = session.selected_models.iter().map(|m| m.len() as u64).sum();

    session.message.len() as u64
        + responses_bytes
        + session.id.len() as u64
        + session.best_response.as_deref().map_or(0, |b| b.len() as u64)
        + RESPONSE_TIME_BYTES
        + TIMESTAMP_BYTES
        + models_bytes
}

fn estimate_storage_mb(sessions: &[ChatSession]) -> f64 {
    let total: u64 = sessions.iter().map(estimate_session_bytes).sum();
    total as f64 / (1024.0 * 1024.0)
}

/// Per-model lists of evenly attributed time shares. Guarded: only sessions
/// with both a total time and at least one selected model contribute.
fn response_time_shares<'a>(
    sessions: impl IntoIterator<Item = &'a ChatSession>,
) -> BTreeMap<String, Vec<f64>> {
    let mut shares: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for session in sessions {
        if let Some(total) = session.response_time
            && !session.selected_models.is_empty()
        {
            let share = total / session.selected_models.len() as f64;
            for model in &session.selected_models {
                shares.entry(model.clone()).or_default().push(share);
            }
        }
    }
    shares
}

/// Mean of each model's shares, rounded to 2 decimals. Models whose mean
/// rounds to zero are dropped.
fn average_shares(shares: &BTreeMap<String, Vec<f64>>) -> Vec<(String, f64)> {
    let mut averages = Vec::new();
    for (model, times) in shares {
        if times.is_empty() {
            continue;
        }
        let avg = round2(times.iter().sum::<f64>() / times.len() as f64);
        if avg > 0.0 {
            averages.push((model.clone(), avg));
        }
    }
    averages
}

/// Occurrence count of each model across all `selected_models` lists.
fn model_occurrences(sessions: &[ChatSession]) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for session in sessions {
        for model in &session.selected_models {
            *counts.entry(model.clone()).or_insert(0) += 1;
        }
    }
    counts
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
