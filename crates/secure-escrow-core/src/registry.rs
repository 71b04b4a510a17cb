use std::collections::HashMap;

use alloy::primitives::utils::format_ether;
use alloy::primitives::Address;

use crate::domain::{EscrowRecord, NewEscrowInput};
use crate::persistence::EscrowStore;
use crate::ports::{
    ApprovalSubscription, EscrowContractPort, EscrowHandle, PortError, StoragePort, WalletPort,
};
use crate::session::WalletSession;
use crate::state_machine::{escrow_transition, EscrowAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub deploy_confirmations: u64,
    pub approve_confirmations: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            deploy_confirmations: 1,
            approve_confirmations: 1,
        }
    }
}

/// Tracks escrows from deployment to approval.
///
/// Records are durable and keyed by contract address. Live contract handles and
/// `Approved` listeners are ephemeral: a registry rebuilt from storage has records
/// but no handles until [`EscrowRegistry::reattach`] is called for them.
pub struct EscrowRegistry<C, S>
where
    C: EscrowContractPort,
    S: StoragePort,
{
    contracts: C,
    store: EscrowStore<S>,
    config: RegistryConfig,
    records: Vec<EscrowRecord>,
    handles: HashMap<Address, C::Handle>,
    listeners: HashMap<Address, ApprovalSubscription>,
    unsaved_approvals: Vec<Address>,
}

impl<C, S> EscrowRegistry<C, S>
where
    C: EscrowContractPort,
    S: StoragePort,
{
    pub fn new(contracts: C, storage: S) -> Self {
        Self::with_config(contracts, storage, RegistryConfig::default())
    }

    pub fn with_config(contracts: C, storage: S, config: RegistryConfig) -> Self {
        let store = EscrowStore::new(storage);
        let records = store.load();
        tracing::info!(count = records.len(), "escrow registry loaded");
        Self {
            contracts,
            store,
            config,
            records,
            handles: HashMap::new(),
            listeners: HashMap::new(),
            unsaved_approvals: Vec::new(),
        }
    }

    pub fn records(&self) -> &[EscrowRecord] {
        &self.records
    }

    pub fn get(&self, address: Address) -> Option<&EscrowRecord> {
        self.records.iter().find(|r| r.contract_address == address)
    }

    pub fn has_live_handle(&self, address: Address) -> bool {
        self.handles.contains_key(&address)
    }

    pub fn pending_listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn store(&self) -> &EscrowStore<S> {
        &self.store
    }

    /// Deploys a new escrow and records it once the deployment confirms.
    pub async fn create<W: WalletPort>(
        &mut self,
        session: &mut WalletSession<W>,
        input: NewEscrowInput,
    ) -> Result<EscrowRecord, PortError> {
        let handle = self
            .contracts
            .deploy(
                session.signer(),
                input.arbiter,
                input.beneficiary,
                input.deposit,
            )
            .await?;
        let address = handle.address();
        let receipt = handle.wait_deployed(self.config.deploy_confirmations).await?;
        if !receipt.success {
            return Err(PortError::Reverted(format!(
                "deployment of {address} failed in tx {}",
                receipt.tx_hash
            )));
        }
        if self.get(address).is_some() {
            tracing::warn!(
                contract = %address,
                deploy_tx = %receipt.tx_hash,
                "deployed contract collides with a registered escrow and is not tracked"
            );
            return Err(PortError::Conflict(format!(
                "escrow already registered: {address}"
            )));
        }

        let record = EscrowRecord::new(address, input.arbiter, input.beneficiary, input.deposit);
        let mut next = self.records.clone();
        next.push(record.clone());
        if let Err(e) = self.store.save(&next) {
            tracing::warn!(
                contract = %address,
                deploy_tx = %receipt.tx_hash,
                error = %e,
                "deployed escrow could not be persisted and is not tracked"
            );
            return Err(e);
        }
        self.records = next;
        self.handles.insert(address, handle);
        tracing::info!(
            contract = %address,
            arbiter = %record.arbiter,
            beneficiary = %record.beneficiary,
            deposit = %format_ether(record.deposit_value),
            "escrow created"
        );

        // The escrow exists on chain and on disk at this point; a stale balance is cosmetic.
        if let Err(e) = session.refresh_balance().await {
            tracing::warn!(error = %e, "balance refresh after create failed");
        }
        Ok(record)
    }

    /// Submits the approval transaction for `address` and waits for it to confirm.
    pub async fn request_approval<W: WalletPort>(
        &mut self,
        session: &WalletSession<W>,
        address: Address,
    ) -> Result<EscrowRecord, PortError> {
        let record = self
            .get(address)
            .ok_or_else(|| PortError::NotFound(format!("escrow not found: {address}")))?;
        if record.status.is_terminal() {
            tracing::debug!(contract = %address, "escrow already approved");
            return Ok(record.clone());
        }

        let handle = self
            .handles
            .get(&address)
            .ok_or(PortError::HandleUnavailable(address))?;
        if !self.listeners.contains_key(&address) {
            let subscription = handle.subscribe_approved()?;
            self.listeners.insert(address, subscription);
        }

        let tx_hash = handle.approve(session.signer()).await?;
        tracing::info!(contract = %address, %tx_hash, "approval submitted");
        let receipt = handle
            .wait_for_tx(tx_hash, self.config.approve_confirmations)
            .await?;
        if !receipt.success {
            return Err(PortError::Reverted(format!(
                "approval of {address} failed in tx {tx_hash}"
            )));
        }

        let drained = self.process_notifications();
        let record = self.on_approved(address)?;
        drained?;
        Ok(record)
    }

    /// Marks the escrow at `address` approved and persists the list.
    ///
    /// The in-memory record only changes once the new list is stored, so a failed
    /// save leaves the escrow `NotApproved` and a retry writes it again.
    pub fn on_approved(&mut self, address: Address) -> Result<EscrowRecord, PortError> {
        let index = self
            .records
            .iter()
            .position(|r| r.contract_address == address)
            .ok_or_else(|| PortError::NotFound(format!("escrow not found: {address}")))?;
        let (status, transition) =
            escrow_transition(self.records[index].status, EscrowAction::Approve);
        if !transition.changed() {
            tracing::debug!(contract = %address, reason = transition.reason, "approval replayed");
            return Ok(self.records[index].clone());
        }

        let mut next = self.records.clone();
        next[index].status = status;
        self.store.save(&next)?;
        self.records = next;
        self.unsaved_approvals.retain(|a| *a != address);
        tracing::info!(contract = %address, reason = transition.reason, "escrow approved");
        Ok(self.records[index].clone())
    }

    /// Applies every `Approved` notification delivered so far. Listeners that fired or
    /// lost their emitter are dropped.
    ///
    /// A notification whose approval could not be persisted is kept and retried on
    /// the next call; the first such error is returned after all others are applied.
    pub fn process_notifications(&mut self) -> Result<usize, PortError> {
        let mut fired = std::mem::take(&mut self.unsaved_approvals);
        let mut closed = Vec::new();
        for (address, subscription) in self.listeners.iter_mut() {
            match subscription.try_next() {
                Ok(Some(event)) => {
                    tracing::debug!(
                        contract = %address,
                        released = %format_ether(event.released),
                        "approved notification"
                    );
                    if !fired.contains(address) {
                        fired.push(*address);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(contract = %address, error = %e, "dropping approved listener");
                    closed.push(*address);
                }
            }
        }
        for address in closed {
            self.listeners.remove(&address);
        }

        let mut applied = 0;
        let mut first_error = None;
        for address in fired {
            if let Some(subscription) = self.listeners.remove(&address) {
                subscription.cancel();
            }
            match self.on_approved(address) {
                Ok(_) => applied += 1,
                Err(e) => {
                    tracing::warn!(
                        contract = %address,
                        error = %e,
                        "approval not persisted, will retry"
                    );
                    if !self.unsaved_approvals.contains(&address) {
                        self.unsaved_approvals.push(address);
                    }
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    /// Approvals that were observed on chain but not yet persisted.
    pub fn unsaved_approvals(&self) -> &[Address] {
        &self.unsaved_approvals
    }

    /// Rebinds a live handle for a persisted escrow, e.g. after a restart.
    pub async fn reattach(&mut self, address: Address) -> Result<(), PortError> {
        if self.get(address).is_none() {
            return Err(PortError::NotFound(format!("escrow not found: {address}")));
        }
        let handle = self.contracts.attach(address).await?;
        self.handles.insert(address, handle);
        tracing::info!(contract = %address, "contract handle reattached");
        Ok(())
    }

    /// Reattaches every escrow that still awaits approval and has no live handle.
    pub async fn reattach_pending(&mut self) -> Result<usize, PortError> {
        let pending: Vec<Address> = self
            .records
            .iter()
            .filter(|r| !r.status.is_terminal() && !self.handles.contains_key(&r.contract_address))
            .map(|r| r.contract_address)
            .collect();
        for address in &pending {
            self.reattach(*address).await?;
        }
        Ok(pending.len())
    }
}
