pub mod core;
pub mod metrics;

pub use self::core::{
    DatabaseSyncReport, DatabaseSyncService, ENTRY_MODIFIED_MESSAGE, ENTRY_NOT_CREATED_MESSAGE,
    SyncDependencies,
};
pub use metrics::{SyncMetrics, SyncMetricsSnapshot};

#[cfg(test)]
mod tests;
