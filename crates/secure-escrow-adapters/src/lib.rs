pub mod config;
pub mod devnet;
pub mod eip1193;
pub mod storage;

pub use config::{EscrowAdapterConfig, RuntimeProfile};
pub use devnet::{DevnetAdapter, DevnetEscrowHandle, DEFAULT_DEV_ACCOUNT};
pub use eip1193::Eip1193Adapter;
pub use storage::{FileStorageAdapter, MemoryStorageAdapter};
