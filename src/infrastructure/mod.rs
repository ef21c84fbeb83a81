pub mod cache;
pub mod database;
pub mod event;
pub mod offline;
pub mod remote;
pub mod storage;
