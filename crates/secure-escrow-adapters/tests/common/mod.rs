#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, U256};

use secure_escrow_adapters::{DevnetAdapter, Eip1193Adapter, MemoryStorageAdapter, DEFAULT_DEV_ACCOUNT};
use secure_escrow_core::{EscrowRegistry, NewEscrowInput, PortError, StoragePort, WalletSession};

pub type TestSession = WalletSession<Eip1193Adapter>;

pub struct Harness<S: StoragePort + Clone = MemoryStorageAdapter> {
    pub devnet: DevnetAdapter,
    pub storage: S,
    pub session: TestSession,
    pub registry: EscrowRegistry<DevnetAdapter, S>,
}

impl<S: StoragePort + Clone> Harness<S> {
    /// Registry as it would look after a restart: same chain and storage, no handles.
    pub fn reloaded_registry(&self) -> EscrowRegistry<DevnetAdapter, S> {
        EscrowRegistry::new(self.devnet.clone(), self.storage.clone())
    }
}

pub async fn harness() -> Harness {
    harness_with_storage(MemoryStorageAdapter::default()).await
}

pub async fn harness_with_storage<S: StoragePort + Clone>(storage: S) -> Harness<S> {
    let devnet = DevnetAdapter::default();
    let session = WalletSession::connect(Eip1193Adapter::deterministic(devnet.clone()))
        .await
        .expect("connect wallet");
    let registry = EscrowRegistry::new(devnet.clone(), storage.clone());
    Harness {
        devnet,
        storage,
        session,
        registry,
    }
}

/// In-memory storage whose writes can be switched off, like a full disk.
#[derive(Debug, Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorageAdapter,
    failing: Arc<AtomicBool>,
}

impl FlakyStorage {
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl StoragePort for FlakyStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Storage("disk full".to_owned()));
        }
        self.inner.write(key, value)
    }
}

pub fn depositor() -> Address {
    DEFAULT_DEV_ACCOUNT.parse().expect("valid depositor address")
}

pub fn arbiter_address() -> Address {
    "0x000000000000000000000000000000000000aAaA"
        .parse()
        .expect("valid arbiter address")
}

pub fn beneficiary_address() -> Address {
    "0x000000000000000000000000000000000000bBbB"
        .parse()
        .expect("valid beneficiary address")
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000_000u64)
}

/// Escrow whose arbiter is the connected account, so the session can approve it.
pub fn self_arbitrated(deposit: U256) -> NewEscrowInput {
    NewEscrowInput {
        arbiter: depositor(),
        beneficiary: beneficiary_address(),
        deposit,
    }
}

pub fn third_party_arbitrated(deposit: U256) -> NewEscrowInput {
    NewEscrowInput {
        arbiter: arbiter_address(),
        beneficiary: beneficiary_address(),
        deposit,
    }
}
