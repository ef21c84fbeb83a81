pub mod database;
pub mod entry;
pub mod entry_event;
pub mod field;
pub mod pending_action;
pub mod sync_result;

pub use database::DatabaseInfo;
pub use entry::Entry;
pub use entry_event::{AutoSyncedEvent, EntryEvent};
pub use field::{
    AttachedFile, EntryContents, EntryFieldData, FieldContent, FieldDefinition, FieldNotification,
    FormInput, LocalFile, RemoteFile, SearchFieldData, StoredFiles, SubfieldData,
};
pub use pending_action::{PendingAction, PendingActionDraft};
pub use sync_result::SyncResult;
