pub mod entities;
pub mod value_objects;

pub use entities::{
    AutoSyncedEvent, DatabaseInfo, Entry, EntryEvent, PendingAction, PendingActionDraft,
    SyncResult,
};
pub use value_objects::{EntryAction, EntryId};
