pub mod domain;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod session;
pub mod state_machine;

pub use domain::{
    ApprovedEvent, EscrowRecord, EscrowStatus, NewEscrowForm, NewEscrowInput, Signer, TxReceipt,
};
pub use persistence::{decode_records, encode_records, EscrowStore, ESCROWS_KEY};
pub use ports::{
    ApprovalSubscription, EscrowContractPort, EscrowHandle, PortError, StoragePort, WalletPort,
};
pub use registry::{EscrowRegistry, RegistryConfig};
pub use session::WalletSession;
pub use state_machine::{escrow_transition, EscrowAction, StateTransition};
