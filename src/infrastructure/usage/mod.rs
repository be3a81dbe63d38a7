//! Usage log infrastructure
//!
//! Repository backends for the append-only usage log and the service that
//! meters calls and aggregates them.

mod in_memory;
mod postgres;
mod service;

pub use in_memory::InMemoryUsageLogRepository;
pub use postgres::PostgresUsageLogRepository;
pub use service::{
    CallRecord, DeveloperStats, ModelUsagePage, ModelUsageReport, RecordedCall, UsageService,
    UserUsageEntry, DAILY_WINDOW_DAYS,
};
