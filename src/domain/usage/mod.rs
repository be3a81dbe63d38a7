//! Usage log domain
//!
//! Append-only call records made against API keys, and the statistics
//! derived from them per key, per model and per developer.

mod record;
mod repository;

pub use record::{
    is_success_status, DailyUsage, ModelUsage, UsageLogEntry, UsageLogId, UsageStats,
    MAX_INPUT_SUMMARY_CHARS,
};
pub use repository::{UsageLogRepository, UsageQuery};

#[cfg(test)]
pub use repository::MockUsageLogRepository;
