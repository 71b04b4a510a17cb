//! Bridge between the text shell and the escrow workspace crates.
//! This must remain the only shell-facing boundary for escrow operations.

use std::path::PathBuf;

use alloy::primitives::Address;

use secure_escrow_adapters::{
    DevnetAdapter, Eip1193Adapter, EscrowAdapterConfig, FileStorageAdapter,
};
use secure_escrow_core::{EscrowRecord, EscrowRegistry, NewEscrowForm, PortError, WalletSession};

use crate::table::EscrowRow;

type EscrowSession = WalletSession<Eip1193Adapter>;
type Registry = EscrowRegistry<DevnetAdapter, FileStorageAdapter>;

pub struct EscrowBridge {
    session: EscrowSession,
    registry: Registry,
}

impl EscrowBridge {
    /// Connects the wallet and loads the persisted escrows. Handles for escrows from
    /// earlier runs are not restored; see [`EscrowBridge::reattach`].
    pub async fn connect(config: &EscrowAdapterConfig) -> Result<Self, PortError> {
        let devnet = DevnetAdapter::default();
        let wallet = Eip1193Adapter::with_config_and_devnet(config.clone(), devnet.clone());
        if wallet.is_proxy() {
            tracing::warn!(
                "wallet is served by the JSON-RPC proxy; escrow contracts still run on the local devnet"
            );
        }
        let storage = FileStorageAdapter::new(storage_dir(config));
        tracing::info!(dir = %storage.root().display(), "escrow storage");

        let session = WalletSession::connect(wallet).await?;
        let registry = EscrowRegistry::with_config(devnet, storage, config.registry_config());
        Ok(Self { session, registry })
    }

    pub fn account(&self) -> Address {
        self.session.account()
    }

    pub fn balance_ether(&self) -> String {
        self.session.balance_ether()
    }

    pub async fn refresh_balance(&mut self) -> Result<String, PortError> {
        self.session.refresh_balance().await?;
        Ok(self.session.balance_ether())
    }

    pub async fn create(&mut self, form: &NewEscrowForm) -> Result<EscrowRecord, PortError> {
        let input = form.parse()?;
        self.registry.create(&mut self.session, input).await
    }

    pub async fn approve(&mut self, address: Address) -> Result<EscrowRecord, PortError> {
        self.registry.process_notifications()?;
        self.registry.request_approval(&self.session, address).await
    }

    pub async fn reattach(&mut self, address: Address) -> Result<(), PortError> {
        self.registry.reattach(address).await
    }

    /// Picks up approvals made by the arbiter from another session.
    pub fn poll(&mut self) -> Result<usize, PortError> {
        self.registry.process_notifications()
    }

    pub fn rows(&self) -> Vec<EscrowRow> {
        self.registry
            .records()
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let live = self.registry.has_live_handle(record.contract_address);
                EscrowRow::from_record(i, record, live)
            })
            .collect()
    }
}

fn storage_dir(config: &EscrowAdapterConfig) -> PathBuf {
    config.storage_dir.clone().unwrap_or_else(|| {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".secure-escrow")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secure_escrow_adapters::DEFAULT_DEV_ACCOUNT;

    fn config_in(dir: &std::path::Path) -> EscrowAdapterConfig {
        EscrowAdapterConfig {
            storage_dir: Some(dir.to_path_buf()),
            ..EscrowAdapterConfig::default()
        }
    }

    #[tokio::test]
    async fn create_and_approve_through_the_bridge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut bridge = EscrowBridge::connect(&config_in(dir.path()))
            .await
            .expect("connect");
        assert_eq!(bridge.account().to_string(), DEFAULT_DEV_ACCOUNT);
        assert_eq!(bridge.balance_ether(), "100.000000000000000000");

        // The connected account arbitrates its own escrow so it may approve it.
        let form = NewEscrowForm {
            arbiter: DEFAULT_DEV_ACCOUNT.to_owned(),
            beneficiary: "0x000000000000000000000000000000000000CAFE".to_owned(),
            amount: "1".to_owned(),
        };
        let record = bridge.create(&form).await.expect("create");
        assert_eq!(bridge.balance_ether(), "99.000000000000000000");

        let rows = bridge.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action_label, "Not Approved");
        assert!(rows[0].actionable);

        bridge
            .approve(record.contract_address)
            .await
            .expect("approve");
        let rows = bridge.rows();
        assert_eq!(rows[0].action_label, "Approved");
        assert!(!rows[0].actionable);
    }

    #[tokio::test]
    async fn reconnect_restores_records_without_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = config_in(dir.path());
        let address = {
            let mut bridge = EscrowBridge::connect(&cfg).await.expect("connect");
            let form = NewEscrowForm {
                arbiter: DEFAULT_DEV_ACCOUNT.to_owned(),
                beneficiary: "0x000000000000000000000000000000000000CAFE".to_owned(),
                amount: "0.5".to_owned(),
            };
            bridge.create(&form).await.expect("create").contract_address
        };

        let mut bridge = EscrowBridge::connect(&cfg).await.expect("reconnect");
        let rows = bridge.rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].actionable);
        assert!(!rows[0].handle_live);

        let err = bridge.approve(address).await.expect_err("handle is gone");
        assert!(matches!(err, PortError::HandleUnavailable(a) if a == address));
    }
}
