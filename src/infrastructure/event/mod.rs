pub mod entry_event_bus;

pub use entry_event_bus::EntryEventBus;
