mod common;

use std::collections::HashSet;

use alloy::primitives::Address;

use secure_escrow_core::{EscrowStatus, PortError, StoragePort, ESCROWS_KEY};

use common::{
    arbiter_address, beneficiary_address, depositor, ether, harness, self_arbitrated,
    third_party_arbitrated,
};

#[tokio::test]
async fn create_appends_not_approved_record_and_persists_it() {
    let mut h = harness().await;

    let record = h
        .registry
        .create(&mut h.session, third_party_arbitrated(ether(1)))
        .await
        .expect("create escrow");

    assert_eq!(record.arbiter, arbiter_address());
    assert_eq!(record.beneficiary, beneficiary_address());
    assert_eq!(record.deposit_value, ether(1));
    assert_eq!(record.status, EscrowStatus::NotApproved);
    assert_eq!(h.registry.records(), &[record.clone()]);
    assert!(h.registry.has_live_handle(record.contract_address));

    let raw = h
        .storage
        .read(ESCROWS_KEY)
        .expect("read storage")
        .expect("escrows persisted");
    let persisted: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(persisted[0]["value"], "1000000000000000000");
    assert_eq!(persisted[0]["status"], "Not Approved");
    let persisted_arbiter: Address = persisted[0]["arbiter"]
        .as_str()
        .expect("arbiter string")
        .parse()
        .expect("arbiter address");
    assert_eq!(persisted_arbiter, arbiter_address());

    assert_eq!(h.session.balance(), ether(99));
}

#[tokio::test]
async fn distinct_deployments_yield_unique_records() {
    let mut h = harness().await;

    for n in 1..=5u64 {
        h.registry
            .create(&mut h.session, third_party_arbitrated(ether(n)))
            .await
            .expect("create escrow");
    }

    assert_eq!(h.registry.records().len(), 5);
    let unique: HashSet<_> = h
        .registry
        .records()
        .iter()
        .map(|r| r.contract_address)
        .collect();
    assert_eq!(unique.len(), 5);
    assert_eq!(h.session.balance(), ether(100 - 15));
}

#[tokio::test]
async fn approval_marks_record_approved_and_releases_funds() {
    let mut h = harness().await;
    let record = h
        .registry
        .create(&mut h.session, self_arbitrated(ether(2)))
        .await
        .expect("create escrow");
    let address = record.contract_address;

    let approved = h
        .registry
        .request_approval(&h.session, address)
        .await
        .expect("approve escrow");

    assert_eq!(approved.status, EscrowStatus::Approved);
    assert_eq!(h.registry.get(address).map(|r| r.status), Some(EscrowStatus::Approved));
    assert_eq!(h.registry.pending_listener_count(), 0);
    assert!(h.devnet.is_approved(address).expect("contract state"));
    assert_eq!(
        h.devnet.balance_of(beneficiary_address()).expect("balance"),
        ether(2)
    );

    let persisted = h.registry.store().load();
    assert_eq!(persisted[0].status, EscrowStatus::Approved);
}

#[tokio::test]
async fn approving_an_approved_escrow_submits_nothing() {
    let mut h = harness().await;
    let address = h
        .registry
        .create(&mut h.session, self_arbitrated(ether(1)))
        .await
        .expect("create escrow")
        .contract_address;
    h.registry
        .request_approval(&h.session, address)
        .await
        .expect("first approval");

    let block = h.devnet.block_number().expect("block");
    let again = h
        .registry
        .request_approval(&h.session, address)
        .await
        .expect("second approval is a no-op");
    assert_eq!(again.status, EscrowStatus::Approved);
    assert_eq!(h.devnet.block_number().expect("block"), block);
}

#[tokio::test]
async fn on_approved_is_idempotent() {
    let mut h = harness().await;
    let address = h
        .registry
        .create(&mut h.session, third_party_arbitrated(ether(1)))
        .await
        .expect("create escrow")
        .contract_address;

    let first = h.registry.on_approved(address).expect("first notification");
    let second = h.registry.on_approved(address).expect("second notification");
    assert_eq!(first.status, EscrowStatus::Approved);
    assert_eq!(second, first);
    assert_eq!(h.registry.records().len(), 1);
}

#[tokio::test]
async fn reloaded_registry_surfaces_missing_handle() {
    let mut h = harness().await;
    let address = h
        .registry
        .create(&mut h.session, self_arbitrated(ether(1)))
        .await
        .expect("create escrow")
        .contract_address;
    let before = h.storage.read(ESCROWS_KEY).expect("read storage");

    let mut reloaded = h.reloaded_registry();
    assert_eq!(reloaded.records(), h.registry.records());
    assert!(!reloaded.has_live_handle(address));

    let err = reloaded
        .request_approval(&h.session, address)
        .await
        .expect_err("no live handle after reload");
    assert!(matches!(err, PortError::HandleUnavailable(a) if a == address));
    assert_eq!(
        reloaded.get(address).map(|r| r.status),
        Some(EscrowStatus::NotApproved)
    );
    assert_eq!(h.storage.read(ESCROWS_KEY).expect("read storage"), before);
    assert!(!h.devnet.is_approved(address).expect("contract state"));
}

#[tokio::test]
async fn reattach_restores_the_approval_path() {
    let mut h = harness().await;
    let address = h
        .registry
        .create(&mut h.session, self_arbitrated(ether(1)))
        .await
        .expect("create escrow")
        .contract_address;

    let mut reloaded = h.reloaded_registry();
    assert_eq!(reloaded.reattach_pending().await.expect("reattach"), 1);
    assert!(reloaded.has_live_handle(address));

    let approved = reloaded
        .request_approval(&h.session, address)
        .await
        .expect("approve after reattach");
    assert_eq!(approved.status, EscrowStatus::Approved);
    assert_eq!(reloaded.reattach_pending().await.expect("nothing left"), 0);
}

#[tokio::test]
async fn unknown_addresses_are_not_found() {
    let mut h = harness().await;
    let stranger = depositor().create(99);

    let err = h
        .registry
        .request_approval(&h.session, stranger)
        .await
        .expect_err("unknown escrow");
    assert!(matches!(err, PortError::NotFound(_)));
    assert!(matches!(
        h.registry.on_approved(stranger),
        Err(PortError::NotFound(_))
    ));
    assert!(matches!(
        h.registry.reattach(stranger).await,
        Err(PortError::NotFound(_))
    ));
}
