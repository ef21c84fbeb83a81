pub mod network_monitor;
pub mod rpc_gateway;
mod wire;

pub use network_monitor::NetworkMonitor;
pub use rpc_gateway::RpcEntryGateway;
