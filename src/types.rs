use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One model's answer within a comparison round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: String,
    pub content: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock seconds this model took to answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

/// One prompt plus the set of model responses gathered for it.
///
/// `responses.len()` need not equal `selected_models.len()` — a model can
/// fail before producing a response entry. Aggregation code must tolerate
/// both directions of mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub responses: Vec<ModelResponse>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub selected_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_response: Option<String>,
    /// Total wall-clock seconds for the whole round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

/// Headline dashboard counters. Every field is a high-water mark: values
/// only move up across calls until an explicit reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_comparisons: u64,
    pub models_analyzed: u64,
    pub accuracy_score: u64,
    pub api_usage: u64,
}

impl DashboardMetrics {
    /// Ratchet merge: keep the larger of each counter.
    pub fn merge_max(&self, newer: &DashboardMetrics) -> DashboardMetrics {
        DashboardMetrics {
            total_comparisons: self.total_comparisons.max(newer.total_comparisons),
            models_analyzed: self.models_analyzed.max(newer.models_analyzed),
            accuracy_score: self.accuracy_score.max(newer.accuracy_score),
            api_usage: self.api_usage.max(newer.api_usage),
        }
    }
}

/// Persisted portion of the usage figures. `storage_mb` is not part of this
/// record: it reflects current usage, never a high-water mark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub api_calls: u64,
    pub comparisons: u64,
}

impl UsageCounters {
    pub fn merge_max(&self, newer: &UsageCounters) -> UsageCounters {
        UsageCounters {
            api_calls: self.api_calls.max(newer.api_calls),
            comparisons: self.comparisons.max(newer.comparisons),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageData {
    pub api_calls: u64,
    pub comparisons: u64,
    /// Estimated size of the serialized session set, in megabytes.
    pub storage_mb: f64,
}

/// Display-ready per-model statistic with its assigned chart color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsageData {
    pub name: String,
    pub value: f64,
    pub color: String,
}

/// One timeline row: a calendar date plus dynamic per-model values keyed by
/// display label. Models with no data that day carry no key (not zero).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    pub period: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

/// Everything the dashboard shows, bundled for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub metrics: DashboardMetrics,
    pub usage: UsageData,
    pub response_times: Vec<ModelUsageData>,
    pub messages_typed: Vec<ModelUsageData>,
    pub processing_times: Vec<ModelUsageData>,
    pub timeline: Vec<TimeSeriesData>,
    pub timeline_models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<ChatSession>>,
}

/// Envelope the session store returns for mutating calls.
#[derive(Debug, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionListResponse {
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
}
