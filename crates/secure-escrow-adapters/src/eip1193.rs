use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::Value;

use secure_escrow_core::{PortError, Signer, WalletPort};

use crate::{DevnetAdapter, EscrowAdapterConfig};

/// JSON-RPC error code for "user rejected the request".
const USER_REJECTED: i64 = 4001;

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic(DevnetAdapter),
    Proxy(ProxyRuntime),
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Default)]
struct ProviderState {
    accounts: Vec<Address>,
    request_seq: u64,
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(EscrowAdapterConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: EscrowAdapterConfig) -> Self {
        Self::with_config_and_devnet(config, DevnetAdapter::default())
    }

    /// Like [`Eip1193Adapter::with_config`], but the deterministic fallback shares
    /// `devnet` so the wallet sees balances moved by deployed escrows.
    pub fn with_config_and_devnet(config: EscrowAdapterConfig, devnet: DevnetAdapter) -> Self {
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = std::time::Duration::from_millis(config.rpc_timeout_ms);
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        tracing::warn!(error = %e, "EIP-1193 proxy unavailable, using devnet");
                        ProviderMode::Deterministic(devnet)
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic(devnet)
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    pub fn deterministic(devnet: DevnetAdapter) -> Self {
        Self {
            mode: ProviderMode::Deterministic(devnet),
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.mode, ProviderMode::Proxy(_))
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn cached_accounts(&self) -> Result<Vec<Address>, PortError> {
        let g = self
            .state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))?;
        Ok(g.accounts.clone())
    }

    fn next_request_id(&self) -> Result<u64, PortError> {
        let mut g = self
            .state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))?;
        g.request_seq = g.request_seq.saturating_add(1);
        Ok(g.request_seq)
    }

    async fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let proxy = match &self.mode {
            ProviderMode::Proxy(proxy) => proxy,
            ProviderMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic(_) => {
                return Err(PortError::NotImplemented(
                    "eip1193 proxy runtime not enabled",
                ))
            }
        };

        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id()?,
            "method": method,
            "params": params,
        });
        tracing::debug!(method, "eip1193 proxy request");
        let response = proxy
            .client
            .post(&proxy.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            if err.get("code").and_then(Value::as_i64) == Some(USER_REJECTED) {
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("user rejected the request");
                return Err(PortError::Rejected(message.to_owned()));
            }
            return Err(PortError::Transport(format!(
                "eip1193 proxy returned error: {err}"
            )));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }
}

#[async_trait]
impl WalletPort for Eip1193Adapter {
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.check_mode()?;

        let accounts = match &self.mode {
            ProviderMode::Deterministic(devnet) => devnet.request_accounts().await?,
            _ => {
                let result = self
                    .proxy_call("eth_requestAccounts", serde_json::json!([]))
                    .await?;
                parse_accounts(&result)?
            }
        };

        let mut g = self
            .state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))?;
        if g.accounts != accounts {
            tracing::info!(count = accounts.len(), "wallet accounts changed");
        }
        g.accounts = accounts.clone();
        Ok(accounts)
    }

    async fn get_balance(&self, account: Address) -> Result<U256, PortError> {
        self.check_mode()?;

        if let ProviderMode::Deterministic(devnet) = &self.mode {
            return devnet.get_balance(account).await;
        }
        let result = self
            .proxy_call(
                "eth_getBalance",
                serde_json::json!([account.to_string(), "latest"]),
            )
            .await?;
        json_quantity_to_u256(&result)
    }

    async fn signer(&self) -> Result<Signer, PortError> {
        self.check_mode()?;

        if let ProviderMode::Deterministic(devnet) = &self.mode {
            return devnet.signer().await;
        }
        let mut accounts = self.cached_accounts()?;
        if accounts.is_empty() {
            accounts = self.request_accounts().await?;
        }
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| PortError::Policy("NO_CONNECTED_ACCOUNT".to_owned()))?;
        Ok(Signer { address })
    }
}

fn parse_accounts(result: &Value) -> Result<Vec<Address>, PortError> {
    let arr = result
        .as_array()
        .ok_or_else(|| PortError::Transport("eth_requestAccounts: array expected".to_owned()))?;
    let mut accounts = Vec::with_capacity(arr.len());
    for item in arr {
        let raw = item
            .as_str()
            .ok_or_else(|| PortError::Transport("eth_requestAccounts: string expected".to_owned()))?;
        let parsed: Address = raw
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid account address: {e}")))?;
        accounts.push(parsed);
    }
    Ok(accounts)
}

fn json_quantity_to_u256(value: &Value) -> Result<U256, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(U256::from(n));
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("quantity must be string or number".to_owned()))?;
    parse_quantity_str(s)
}

pub(crate) fn parse_quantity_str(raw: &str) -> Result<U256, PortError> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err(PortError::Validation("empty hex quantity".to_owned()));
        }
        U256::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex quantity: {e}")))
    } else {
        U256::from_str_radix(raw, 10)
            .map_err(|e| PortError::Validation(format!("invalid quantity: {e}")))
    }
}
