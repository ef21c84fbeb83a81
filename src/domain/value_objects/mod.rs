pub mod entry_action;
pub mod entry_id;

pub use entry_action::EntryAction;
pub use entry_id::EntryId;
