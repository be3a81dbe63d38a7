//! Usage log entries and aggregates

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::api_key::ApiKeyId;
use crate::domain::model::ModelId;
use crate::domain::DomainError;

/// Longest input summary kept on an entry
pub const MAX_INPUT_SUMMARY_CHARS: usize = 500;

/// Opaque usage log identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageLogId(Uuid);

impl UsageLogId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for UsageLogId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::invalid_id(format!("Invalid usage log id '{}'", s)))
    }
}

impl std::fmt::Display for UsageLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 2xx responses count as successful calls
pub fn is_success_status(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}

/// One call made with an API key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub id: UsageLogId,
    pub api_key_id: ApiKeyId,
    pub model_id: ModelId,
    pub input_summary: Option<String>,
    pub response_time_ms: u64,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
}

impl UsageLogEntry {
    /// Create a new entry timestamped now
    pub fn new(
        api_key_id: ApiKeyId,
        model_id: ModelId,
        response_time_ms: u64,
        status_code: u16,
    ) -> Self {
        Self {
            id: UsageLogId::generate(),
            api_key_id,
            model_id,
            input_summary: None,
            response_time_ms,
            status_code,
            created_at: Utc::now(),
        }
    }

    /// Attach a summary of the call input, truncated on a char boundary
    pub fn with_input_summary(mut self, summary: impl Into<String>) -> Self {
        let summary: String = summary.into();
        self.input_summary = Some(summary.chars().take(MAX_INPUT_SUMMARY_CHARS).collect());
        self
    }

    /// Override the timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_success(&self) -> bool {
        is_success_status(self.status_code)
    }
}

/// Aggregated statistics over a set of entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of calls
    pub total: u64,
    /// Number of calls with a 2xx status
    pub success_count: u64,
    /// Mean latency in milliseconds, 0 when there are no calls
    pub avg_response_time: f64,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the aggregate
    pub fn add(&mut self, entry: &UsageLogEntry) {
        self.total += 1;

        if entry.is_success() {
            self.success_count += 1;
        }

        // Running mean
        let prev_total = self.avg_response_time * (self.total - 1) as f64;
        self.avg_response_time = (prev_total + entry.response_time_ms as f64) / self.total as f64;
    }

    /// Percentage of successful calls in [0, 100]; 0 when there are no calls
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        self.success_count as f64 * 100.0 / self.total as f64
    }
}

impl<'a> FromIterator<&'a UsageLogEntry> for UsageStats {
    fn from_iter<I: IntoIterator<Item = &'a UsageLogEntry>>(iter: I) -> Self {
        let mut stats = Self::new();
        for entry in iter {
            stats.add(entry);
        }
        stats
    }
}

/// Statistics for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model_id: ModelId,
    pub stats: UsageStats,
}

/// Call count for one UTC calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(latency: u64, status: u16) -> UsageLogEntry {
        UsageLogEntry::new(ApiKeyId::generate(), ModelId::generate(), latency, status)
    }

    #[test]
    fn test_success_status_range() {
        assert!(is_success_status(200));
        assert!(is_success_status(204));
        assert!(is_success_status(299));
        assert!(!is_success_status(199));
        assert!(!is_success_status(300));
        assert!(!is_success_status(500));
    }

    #[test]
    fn test_empty_stats_have_zero_rate() {
        let stats = UsageStats::new();

        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.avg_response_time, 0.0);
    }

    #[test]
    fn test_stats_aggregate() {
        let entries = [entry(100, 200), entry(200, 201), entry(300, 500)];
        let stats: UsageStats = entries.iter().collect();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.success_count, 2);
        assert!((stats.avg_response_time - 200.0).abs() < 1e-9);
        assert!((stats.success_rate() - 66.666_666).abs() < 0.001);
    }

    #[test]
    fn test_input_summary_truncated() {
        let long = "é".repeat(MAX_INPUT_SUMMARY_CHARS + 20);
        let entry = entry(10, 200).with_input_summary(long);

        assert_eq!(
            entry.input_summary.unwrap().chars().count(),
            MAX_INPUT_SUMMARY_CHARS
        );
    }
}
