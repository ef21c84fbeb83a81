pub mod entry_merge;
pub mod entry_service;
pub mod field_registry;
pub mod sync_service;

pub use entry_merge::EntryMergeHelper;
pub use entry_service::{EntrySaveResult, EntryService};
pub use field_registry::{DefaultFieldHandler, FieldHandlerRegistry, FileFieldHandler};
pub use sync_service::{DatabaseSyncReport, DatabaseSyncService, SyncDependencies};
