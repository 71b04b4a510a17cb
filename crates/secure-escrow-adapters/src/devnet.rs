//! In-process chain backing the deterministic runtime.
//!
//! Mirrors the escrow contract: the depositor funds it at deployment, only the
//! arbiter may call `approve`, and a successful approval pays the held balance to
//! the beneficiary and emits `Approved(balance)`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use secure_escrow_core::{
    ApprovalSubscription, ApprovedEvent, EscrowContractPort, EscrowHandle, PortError, Signer,
    TxReceipt, WalletPort,
};

pub const DEFAULT_DEV_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";

#[derive(Debug, Clone)]
pub struct DevnetAdapter {
    state: Arc<Mutex<DevnetState>>,
}

#[derive(Debug)]
struct DevnetState {
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    block_number: u64,
    contracts: HashMap<Address, DevContract>,
    mined: HashMap<B256, MinedTx>,
    reject_next: bool,
    drop_next_deployment: bool,
}

#[derive(Debug)]
struct DevContract {
    arbiter: Address,
    beneficiary: Address,
    depositor: Address,
    balance: U256,
    approved: bool,
    deploy_tx: B256,
    listeners: Vec<UnboundedSender<ApprovedEvent>>,
}

#[derive(Debug, Clone, Copy)]
struct MinedTx {
    block_number: u64,
    success: bool,
}

impl Default for DevnetState {
    fn default() -> Self {
        let account: Address = DEFAULT_DEV_ACCOUNT
            .parse()
            .expect("valid built-in deterministic account");
        let mut balances = HashMap::new();
        balances.insert(
            account,
            parse_ether("100").expect("valid built-in starting balance"),
        );
        Self {
            accounts: vec![account],
            balances,
            nonces: HashMap::new(),
            block_number: 0,
            contracts: HashMap::new(),
            mined: HashMap::new(),
            reject_next: false,
            drop_next_deployment: false,
        }
    }
}

impl DevnetState {
    fn take_rejection(&mut self) -> Result<(), PortError> {
        if std::mem::take(&mut self.reject_next) {
            return Err(PortError::Rejected("user rejected the request".to_owned()));
        }
        Ok(())
    }

    fn next_nonce(&mut self, sender: Address) -> u64 {
        let nonce = self.nonces.entry(sender).or_insert(0);
        let current = *nonce;
        *nonce = nonce.saturating_add(1);
        current
    }

    fn mine(&mut self, tx_hash: B256, success: bool) {
        self.block_number = self.block_number.saturating_add(1);
        self.mined.insert(
            tx_hash,
            MinedTx {
                block_number: self.block_number,
                success,
            },
        );
    }

    fn contract(&self, address: Address) -> Result<&DevContract, PortError> {
        self.contracts
            .get(&address)
            .ok_or_else(|| PortError::NotFound(format!("no escrow contract at {address}")))
    }
}

impl Default for DevnetAdapter {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(DevnetState::default())),
        }
    }
}

impl DevnetAdapter {
    fn lock(&self) -> Result<MutexGuard<'_, DevnetState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("devnet lock poisoned: {e}")))
    }

    pub fn block_number(&self) -> Result<u64, PortError> {
        Ok(self.lock()?.block_number)
    }

    pub fn balance_of(&self, account: Address) -> Result<U256, PortError> {
        Ok(self
            .lock()?
            .balances
            .get(&account)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    pub fn is_approved(&self, contract: Address) -> Result<bool, PortError> {
        Ok(self.lock()?.contract(contract)?.approved)
    }

    pub fn debug_set_accounts(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.lock()?.accounts = accounts;
        Ok(())
    }

    pub fn debug_fund(&self, account: Address, amount: U256) -> Result<(), PortError> {
        let mut g = self.lock()?;
        let balance = g.balances.entry(account).or_insert(U256::ZERO);
        *balance = balance.saturating_add(amount);
        Ok(())
    }

    /// The next wallet request (accounts, deploy or approve) is declined by the user.
    pub fn debug_reject_next(&self) -> Result<(), PortError> {
        self.lock()?.reject_next = true;
        Ok(())
    }

    /// The next deployment is broadcast but never mined.
    pub fn debug_drop_next_deployment(&self) -> Result<(), PortError> {
        self.lock()?.drop_next_deployment = true;
        Ok(())
    }

    fn handle(&self, address: Address, deploy_tx: Option<B256>) -> DevnetEscrowHandle {
        DevnetEscrowHandle {
            state: Arc::clone(&self.state),
            address,
            deploy_tx,
        }
    }
}

#[async_trait]
impl WalletPort for DevnetAdapter {
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        let mut g = self.lock()?;
        g.take_rejection()?;
        Ok(g.accounts.clone())
    }

    async fn get_balance(&self, account: Address) -> Result<U256, PortError> {
        self.balance_of(account)
    }

    async fn signer(&self) -> Result<Signer, PortError> {
        let g = self.lock()?;
        let address = g
            .accounts
            .first()
            .copied()
            .ok_or_else(|| PortError::Policy("NO_CONNECTED_ACCOUNT".to_owned()))?;
        Ok(Signer { address })
    }
}

#[async_trait]
impl EscrowContractPort for DevnetAdapter {
    type Handle = DevnetEscrowHandle;

    async fn deploy(
        &self,
        signer: &Signer,
        arbiter: Address,
        beneficiary: Address,
        value: U256,
    ) -> Result<Self::Handle, PortError> {
        let mut g = self.lock()?;
        g.take_rejection()?;

        let depositor = signer.address;
        let available = g.balances.get(&depositor).copied().unwrap_or(U256::ZERO);
        if available < value {
            return Err(PortError::Validation(format!(
                "insufficient funds: {depositor} holds {available} wei, deposit needs {value}"
            )));
        }

        let nonce = g.next_nonce(depositor);
        let address = depositor.create(nonce);
        let deploy_tx = tx_hash("deploy", depositor, nonce);

        if std::mem::take(&mut g.drop_next_deployment) {
            tracing::debug!(contract = %address, %deploy_tx, "devnet dropped deployment");
            return Ok(self.handle(address, Some(deploy_tx)));
        }

        g.balances.insert(depositor, available - value);
        g.contracts.insert(
            address,
            DevContract {
                arbiter,
                beneficiary,
                depositor,
                balance: value,
                approved: false,
                deploy_tx,
                listeners: Vec::new(),
            },
        );
        g.mine(deploy_tx, true);
        tracing::debug!(
            contract = %address,
            %deploy_tx,
            block = g.block_number,
            "devnet deployed escrow"
        );
        Ok(self.handle(address, Some(deploy_tx)))
    }

    async fn attach(&self, address: Address) -> Result<Self::Handle, PortError> {
        self.lock()?.contract(address)?;
        Ok(self.handle(address, None))
    }
}

#[derive(Debug, Clone)]
pub struct DevnetEscrowHandle {
    state: Arc<Mutex<DevnetState>>,
    address: Address,
    deploy_tx: Option<B256>,
}

impl DevnetEscrowHandle {
    fn lock(&self) -> Result<MutexGuard<'_, DevnetState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("devnet lock poisoned: {e}")))
    }

    /// Depositor recorded by the contract at deployment.
    pub fn depositor(&self) -> Result<Address, PortError> {
        Ok(self.lock()?.contract(self.address)?.depositor)
    }
}

#[async_trait]
impl EscrowHandle for DevnetEscrowHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn deployment_tx(&self) -> Option<B256> {
        self.deploy_tx
    }

    async fn wait_deployed(&self, confirmations: u64) -> Result<TxReceipt, PortError> {
        let tx = match self.deploy_tx {
            Some(tx) => tx,
            None => {
                let g = self.lock()?;
                g.contract(self.address)?.deploy_tx
            }
        };
        self.wait_for_tx(tx, confirmations).await
    }

    async fn approve(&self, signer: &Signer) -> Result<B256, PortError> {
        let mut g = self.lock()?;
        g.take_rejection()?;

        let nonce = g.next_nonce(signer.address);
        let tx = tx_hash("approve", signer.address, nonce);
        let contract = g
            .contracts
            .get_mut(&self.address)
            .ok_or_else(|| PortError::NotFound(format!("no escrow contract at {}", self.address)))?;

        if contract.arbiter != signer.address {
            tracing::debug!(
                contract = %self.address,
                caller = %signer.address,
                "devnet approve reverted: caller is not the arbiter"
            );
            g.mine(tx, false);
            return Ok(tx);
        }

        let released = std::mem::take(&mut contract.balance);
        let beneficiary = contract.beneficiary;
        contract.approved = true;
        let event = ApprovedEvent {
            contract: self.address,
            released,
        };
        contract
            .listeners
            .retain(|listener| listener.send(event).is_ok());

        let balance = g.balances.entry(beneficiary).or_insert(U256::ZERO);
        *balance = balance.saturating_add(released);
        g.mine(tx, true);
        Ok(tx)
    }

    async fn wait_for_tx(&self, tx_hash: B256, confirmations: u64) -> Result<TxReceipt, PortError> {
        tokio::task::yield_now().await;
        let mut g = self.lock()?;
        let mined = g
            .mined
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| PortError::Reverted(format!("transaction {tx_hash} was dropped")))?;
        // Auto-mine until the requested depth is reached.
        let target = mined
            .block_number
            .saturating_add(confirmations.max(1))
            .saturating_sub(1);
        if g.block_number < target {
            g.block_number = target;
        }
        Ok(TxReceipt {
            tx_hash,
            block_number: mined.block_number,
            confirmations: g.block_number - mined.block_number + 1,
            success: mined.success,
        })
    }

    fn subscribe_approved(&self) -> Result<ApprovalSubscription, PortError> {
        let mut g = self.lock()?;
        let contract = g
            .contracts
            .get_mut(&self.address)
            .ok_or_else(|| PortError::NotFound(format!("no escrow contract at {}", self.address)))?;
        let (sender, subscription) = ApprovalSubscription::channel(self.address);
        contract.listeners.retain(|listener| !listener.is_closed());
        contract.listeners.push(sender);
        Ok(subscription)
    }
}

fn tx_hash(kind: &str, sender: Address, nonce: u64) -> B256 {
    let mut seed = Vec::with_capacity(kind.len() + 28);
    seed.extend_from_slice(kind.as_bytes());
    seed.extend_from_slice(sender.as_slice());
    seed.extend_from_slice(&nonce.to_be_bytes());
    keccak256(seed)
}
