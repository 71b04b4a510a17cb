use std::path::PathBuf;

use secure_escrow_core::RegistryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct EscrowAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub eip1193_proxy_url: Option<String>,
    pub rpc_timeout_ms: u64,
    pub storage_dir: Option<PathBuf>,
    pub deploy_confirmations: u64,
    pub approve_confirmations: u64,
}

impl Default for EscrowAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            eip1193_proxy_url: None,
            rpc_timeout_ms: 15_000,
            storage_dir: None,
            deploy_confirmations: 1,
            approve_confirmations: 1,
        }
    }
}

impl EscrowAdapterConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var("SECURE_ESCROW_PROFILE") {
            if raw.eq_ignore_ascii_case("production") || raw.eq_ignore_ascii_case("prod") {
                cfg.runtime_profile = RuntimeProfile::Production;
            }
        }
        if let Ok(url) = std::env::var("SECURE_ESCROW_RPC_PROXY_URL") {
            if !url.trim().is_empty() {
                cfg.eip1193_proxy_url = Some(url.trim().to_owned());
            }
        }
        if let Ok(dir) = std::env::var("SECURE_ESCROW_STORAGE_DIR") {
            if !dir.trim().is_empty() {
                cfg.storage_dir = Some(PathBuf::from(dir.trim()));
            }
        }
        if let Some(n) = env_u64("SECURE_ESCROW_CONFIRMATIONS") {
            // Zero confirmations would record escrows that never made it on chain.
            let n = n.max(1);
            cfg.deploy_confirmations = n;
            cfg.approve_confirmations = n;
        }
        if let Some(ms) = env_u64("SECURE_ESCROW_HTTP_TIMEOUT_MS") {
            cfg.rpc_timeout_ms = ms;
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            deploy_confirmations: self.deploy_confirmations,
            approve_confirmations: self.approve_confirmations,
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring malformed numeric env var");
            None
        }
    }
}
