pub mod cache;
pub mod entry_gateway;
pub mod field_handler;
pub mod file_store;
pub mod network;
pub mod offline_store;
pub mod rpc;

pub use cache::ReadCache;
pub use entry_gateway::{
    AddEntryResponse, EditEntryResponse, EntryGateway, FileUploader, GatewayError,
};
pub use field_handler::FieldHandler;
pub use file_store::{EntryFieldFolder, OfflineFileStore};
pub use network::NetworkStatus;
pub use offline_store::{OfflineEntryStore, SyncTimeStore};
pub use rpc::{RpcClient, RpcError};
