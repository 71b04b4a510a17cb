use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{ApprovedEvent, Signer, TxReceipt};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("rejected by wallet: {0}")]
    Rejected(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("no live contract handle for {0}; reconnect before acting on it")]
    HandleUnavailable(Address),
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait WalletPort: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError>;
    async fn get_balance(&self, account: Address) -> Result<U256, PortError>;
    async fn signer(&self) -> Result<Signer, PortError>;
}

/// Deploys escrow contracts and re-binds to already deployed ones.
#[async_trait]
pub trait EscrowContractPort: Send + Sync {
    type Handle: EscrowHandle;

    async fn deploy(
        &self,
        signer: &Signer,
        arbiter: Address,
        beneficiary: Address,
        value: U256,
    ) -> Result<Self::Handle, PortError>;

    async fn attach(&self, address: Address) -> Result<Self::Handle, PortError>;
}

/// Live binding to one deployed escrow contract.
#[async_trait]
pub trait EscrowHandle: Send + Sync {
    fn address(&self) -> Address;
    fn deployment_tx(&self) -> Option<B256>;
    async fn wait_deployed(&self, confirmations: u64) -> Result<TxReceipt, PortError>;
    async fn approve(&self, signer: &Signer) -> Result<B256, PortError>;
    async fn wait_for_tx(&self, tx_hash: B256, confirmations: u64)
        -> Result<TxReceipt, PortError>;
    fn subscribe_approved(&self) -> Result<ApprovalSubscription, PortError>;
}

/// Whole-value key/value storage; `write` replaces the previous value.
pub trait StoragePort: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, PortError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PortError>;
}

/// Receiving side of an `Approved` listener. Dropping or cancelling it closes the
/// channel; emitters prune closed listeners.
#[derive(Debug)]
pub struct ApprovalSubscription {
    contract: Address,
    events: mpsc::UnboundedReceiver<ApprovedEvent>,
}

impl ApprovalSubscription {
    pub fn new(contract: Address, events: mpsc::UnboundedReceiver<ApprovedEvent>) -> Self {
        Self { contract, events }
    }

    /// Creates a connected sender/subscription pair for `contract`.
    pub fn channel(contract: Address) -> (mpsc::UnboundedSender<ApprovedEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(contract, rx))
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Non-blocking poll. `Ok(None)` means nothing yet; `Err` means the emitter is gone.
    pub fn try_next(&mut self) -> Result<Option<ApprovedEvent>, PortError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(PortError::Transport(format!(
                "approved listener for {} disconnected",
                self.contract
            ))),
        }
    }

    pub async fn next(&mut self) -> Option<ApprovedEvent> {
        self.events.recv().await
    }

    pub fn cancel(mut self) {
        self.events.close();
    }
}
