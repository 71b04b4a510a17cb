use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};

use crate::domain::Signer;
use crate::ports::{PortError, WalletPort};

/// Connected wallet state. Built once on a user-initiated connect and passed by
/// reference to whatever needs the account, balance or signer.
#[derive(Debug)]
pub struct WalletSession<W: WalletPort> {
    wallet: W,
    account: Address,
    balance: U256,
    signer: Signer,
}

impl<W: WalletPort> WalletSession<W> {
    pub async fn connect(wallet: W) -> Result<Self, PortError> {
        let account = wallet
            .request_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Policy("NO_CONNECTED_ACCOUNT".to_owned()))?;
        let balance = wallet.get_balance(account).await?;
        let signer = wallet.signer().await?;
        tracing::info!(%account, balance = %format_ether(balance), "wallet connected");
        Ok(Self {
            wallet,
            account,
            balance,
            signer,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn balance_ether(&self) -> String {
        format_ether(self.balance)
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub async fn refresh_balance(&mut self) -> Result<U256, PortError> {
        self.balance = self.wallet.get_balance(self.account).await?;
        Ok(self.balance)
    }
}
