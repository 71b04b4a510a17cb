use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    #[serde(rename = "Not Approved")]
    NotApproved,
    #[serde(rename = "Approved")]
    Approved,
}

impl EscrowStatus {
    /// Label shown to the user, identical to the persisted form.
    pub fn label(&self) -> &'static str {
        match self {
            EscrowStatus::NotApproved => "Not Approved",
            EscrowStatus::Approved => "Approved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Approved)
    }
}

/// One deployed escrow contract as mirrored in local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    #[serde(rename = "address")]
    pub contract_address: Address,
    pub arbiter: Address,
    pub beneficiary: Address,
    #[serde(rename = "value", with = "decimal_u256")]
    pub deposit_value: U256,
    pub status: EscrowStatus,
}

impl EscrowRecord {
    pub fn new(
        contract_address: Address,
        arbiter: Address,
        beneficiary: Address,
        deposit_value: U256,
    ) -> Self {
        Self {
            contract_address,
            arbiter,
            beneficiary,
            deposit_value,
            status: EscrowStatus::NotApproved,
        }
    }

    pub fn deposit_ether(&self) -> String {
        format_ether(self.deposit_value)
    }
}

/// Parameters for a new escrow deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEscrowInput {
    pub arbiter: Address,
    pub beneficiary: Address,
    pub deposit: U256,
}

/// Raw form fields as typed by the user; `amount` is denominated in ether.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEscrowForm {
    pub arbiter: String,
    pub beneficiary: String,
    pub amount: String,
}

impl NewEscrowForm {
    pub fn parse(&self) -> Result<NewEscrowInput, PortError> {
        let arbiter: Address = self
            .arbiter
            .trim()
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid arbiter address: {e}")))?;
        let beneficiary: Address = self
            .beneficiary
            .trim()
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid beneficiary address: {e}")))?;
        let deposit = parse_ether(self.amount.trim())
            .map_err(|e| PortError::Validation(format!("invalid deposit amount: {e}")))?;
        Ok(NewEscrowInput {
            arbiter,
            beneficiary,
            deposit,
        })
    }
}

/// Payload of the contract's `Approved(uint)` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovedEvent {
    pub contract: Address,
    pub released: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub confirmations: u64,
    pub success: bool,
}

/// Signing capability handed out by the wallet; identifies the sending account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub address: Address,
}

mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(D::Error::custom("empty decimal amount"));
        }
        U256::from_str_radix(&raw, 10)
            .map_err(|e| D::Error::custom(format!("invalid decimal amount {raw:?}: {e}")))
    }
}
