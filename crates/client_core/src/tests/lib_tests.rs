use ledger::MemoryLedger;

use super::*;

fn test_params() -> SignatureParams {
    SignatureParams {
        public_key: "0xabc".into(),
        contract_address: "0xcontract".into(),
        chain_id: 8009,
        start_timestamp: 1_700_000_000,
        duration_days: 30,
    }
}

fn fast_options() -> ClientOptions {
    ClientOptions {
        reveal_delay: Duration::ZERO,
        ..ClientOptions::default()
    }
}

fn client_with(
    store: Arc<dyn LedgerStore>,
    wallet: Arc<dyn WalletSession>,
    options: ClientOptions,
) -> Arc<AllocationClient> {
    AllocationClient::new_with_dependencies(
        store,
        wallet,
        Arc::new(FheStubCipher),
        options,
        test_params(),
    )
}

async fn seed_record(
    store: &MemoryLedger,
    id: &str,
    voter: &str,
    timestamp: i64,
    status: AllocationStatus,
) {
    let envelope = AllocationEnvelope {
        amount: FheStubCipher.encrypt(42.0),
        timestamp,
        voter: voter.to_string(),
        status,
        is_saboteur: false,
    };
    store
        .set_data(
            &record_key(id),
            serde_json::to_vec(&envelope).expect("encode"),
        )
        .await
        .expect("seed record");
}

async fn seed_index(store: &MemoryLedger, ids: &[&str]) {
    store
        .set_data(INDEX_KEY, serde_json::to_vec(ids).expect("encode"))
        .await
        .expect("seed index");
}

async fn stored_envelope(store: &MemoryLedger, id: &str) -> AllocationEnvelope {
    let bytes = store.get_data(&record_key(id)).await.expect("get");
    serde_json::from_slice(&bytes).expect("decode stored record")
}

/// Ledger whose writes are refused by the signing layer.
struct RejectingLedger;

#[async_trait]
impl LedgerStore for RejectingLedger {
    async fn is_available(&self) -> Result<bool, LedgerError> {
        Ok(true)
    }

    async fn get_data(&self, _key: &str) -> Result<Vec<u8>, LedgerError> {
        Ok(Vec::new())
    }

    async fn set_data(&self, _key: &str, _value: Vec<u8>) -> Result<(), LedgerError> {
        Err(LedgerError::Rejected)
    }
}

/// Wallet that is connected but refuses every signature request.
struct RefusingWallet;

#[async_trait]
impl WalletSession for RefusingWallet {
    fn address(&self) -> Option<String> {
        Some("0xrefuser".to_string())
    }

    async fn sign_message(&self, _message: &str) -> Result<String, WalletError> {
        Err(WalletError::Rejected)
    }
}

#[tokio::test]
async fn refresh_sorts_by_timestamp_descending() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0x1", 100, AllocationStatus::Pending).await;
    seed_record(&store, "b", "0x1", 300, AllocationStatus::Pending).await;
    seed_record(&store, "c", "0x1", 200, AllocationStatus::Pending).await;
    seed_index(&store, &["a", "b", "c"]).await;

    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());
    client.refresh().await.expect("refresh");

    let snapshot = client.snapshot().await;
    let timestamps: Vec<i64> = snapshot.allocations.iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![300, 200, 100]);
    assert!(snapshot.loaded);
    assert!(!snapshot.refreshing);
}

#[tokio::test]
async fn refresh_is_idempotent_without_intervening_writes() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0x1", 100, AllocationStatus::Pending).await;
    seed_record(&store, "b", "0x2", 300, AllocationStatus::Approved).await;
    seed_index(&store, &["a", "b"]).await;

    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());
    client.refresh().await.expect("first refresh");
    let first = client.snapshot().await.allocations;
    client.refresh().await.expect("second refresh");
    let second = client.snapshot().await.allocations;
    assert_eq!(first, second);
}

#[tokio::test]
async fn refresh_skips_absent_and_malformed_records() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "good", "0x1", 100, AllocationStatus::Pending).await;
    store
        .set_data(&record_key("broken"), b"{not json".to_vec())
        .await
        .expect("seed malformed");
    // "ghost" is indexed but has no record at all.
    seed_index(&store, &["good", "ghost", "broken"]).await;

    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());
    client.refresh().await.expect("refresh");

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.allocations.len(), 1);
    assert_eq!(snapshot.allocations[0].id.as_str(), "good");
}

#[tokio::test]
async fn refresh_treats_malformed_index_as_empty() {
    let store = Arc::new(MemoryLedger::new());
    store
        .set_data(INDEX_KEY, b"definitely not json".to_vec())
        .await
        .expect("seed index");

    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());
    client.refresh().await.expect("refresh must not fail");

    let snapshot = client.snapshot().await;
    assert!(snapshot.allocations.is_empty());
    assert!(snapshot.loaded);
}

#[tokio::test]
async fn refresh_skips_when_ledger_reports_unavailable() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0x1", 100, AllocationStatus::Pending).await;
    seed_index(&store, &["a"]).await;
    store.set_available(false);

    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());
    client.refresh().await.expect("refresh");

    let snapshot = client.snapshot().await;
    assert!(!snapshot.loaded);
    assert!(snapshot.allocations.is_empty());
    assert!(!snapshot.refreshing);
}

#[tokio::test]
async fn submit_requires_connected_wallet() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(store.clone(), Arc::new(MissingWallet), fast_options());

    let err = client.submit_vote(42.0, false).await.expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::WalletNotConnected)
    ));
    // Precondition failures never reach the ledger.
    assert!(store.get_data(INDEX_KEY).await.expect("get").is_empty());
}

#[tokio::test]
async fn submit_writes_pending_record_and_appends_index() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(
        store.clone(),
        Arc::new(StaticWallet::new("0xV0ter")),
        fast_options(),
    );

    let record = client.submit_vote(42.0, true).await.expect("submit");
    assert_eq!(record.status, AllocationStatus::Pending);
    assert_eq!(record.voter, "0xV0ter");
    assert!(record.is_saboteur);
    assert!(record.encrypted_amount.starts_with("FHE-"));

    let ids: Vec<String> =
        serde_json::from_slice(&store.get_data(INDEX_KEY).await.expect("get")).expect("index");
    assert_eq!(ids, vec![record.id.0.clone()]);

    let envelope = stored_envelope(&store, record.id.as_str()).await;
    assert_eq!(envelope.status, AllocationStatus::Pending);
    assert_eq!(envelope.amount, record.encrypted_amount);
    assert!(envelope.is_saboteur);

    // Submit triggers a full reload.
    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.allocations.len(), 1);
    assert_eq!(snapshot.allocations[0].id, record.id);
}

#[tokio::test]
async fn second_submit_appends_to_existing_index() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(
        store.clone(),
        Arc::new(StaticWallet::new("0x1")),
        fast_options(),
    );

    let first = client.submit_vote(1.0, false).await.expect("first");
    let second = client.submit_vote(2.0, false).await.expect("second");

    let ids: Vec<String> =
        serde_json::from_slice(&store.get_data(INDEX_KEY).await.expect("get")).expect("index");
    assert_eq!(ids, vec![first.id.0, second.id.0]);
}

#[tokio::test]
async fn submit_maps_rejected_write_to_user_rejection_notice() {
    let client = client_with(
        Arc::new(RejectingLedger),
        Arc::new(StaticWallet::new("0x1")),
        fast_options(),
    );
    let mut rx = client.subscribe_events();

    client.submit_vote(42.0, false).await.expect_err("must fail");

    let notice = client.current_notice().await.expect("error notice");
    assert_eq!(notice.status, NoticeStatus::Error);
    assert_eq!(notice.message, "Transaction rejected by user");

    // pending notice, error notice, then the fault.
    let mut fault = None;
    while let Ok(event) = rx.try_recv() {
        if let ClientEvent::Fault(f) = event {
            fault = Some(f);
        }
    }
    let fault = fault.expect("fault event");
    assert_eq!(fault.code, ErrorCode::Rejected);
}

#[tokio::test]
async fn approve_marks_record_approved() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0x1", 100, AllocationStatus::Pending).await;
    seed_index(&store, &["a"]).await;
    let client = client_with(
        store.clone(),
        Arc::new(StaticWallet::new("0x1")),
        fast_options(),
    );

    let record = client
        .approve(&AllocationId("a".into()))
        .await
        .expect("approve");
    assert_eq!(record.status, AllocationStatus::Approved);
    assert_eq!(
        stored_envelope(&store, "a").await.status,
        AllocationStatus::Approved
    );
    assert_eq!(
        client.snapshot().await.allocations[0].status,
        AllocationStatus::Approved
    );
}

#[tokio::test]
async fn reject_marks_record_rejected() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0x1", 100, AllocationStatus::Pending).await;
    seed_index(&store, &["a"]).await;
    let client = client_with(
        store.clone(),
        Arc::new(StaticWallet::new("0x1")),
        fast_options(),
    );

    client
        .reject(&AllocationId("a".into()))
        .await
        .expect("reject");
    assert_eq!(
        stored_envelope(&store, "a").await.status,
        AllocationStatus::Rejected
    );
}

#[tokio::test]
async fn approve_missing_record_fails_with_not_found() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());

    let err = client
        .approve(&AllocationId("nope".into()))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::AllocationNotFound(_))
    ));
    let notice = client.current_notice().await.expect("error notice");
    assert_eq!(notice.status, NoticeStatus::Error);
}

#[tokio::test]
async fn transition_overwrites_terminal_record_by_default() {
    // Documents the unguarded behavior: without the authorization option the
    // mutator happily rewrites an already-approved record.
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0xsomeoneelse", 100, AllocationStatus::Approved).await;
    seed_index(&store, &["a"]).await;
    let client = client_with(
        store.clone(),
        Arc::new(StaticWallet::new("0x1")),
        fast_options(),
    );

    client
        .reject(&AllocationId("a".into()))
        .await
        .expect("unguarded overwrite");
    assert_eq!(
        stored_envelope(&store, "a").await.status,
        AllocationStatus::Rejected
    );
}

#[tokio::test]
async fn authorization_guard_blocks_foreign_caller() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0xowner", 100, AllocationStatus::Pending).await;
    seed_index(&store, &["a"]).await;
    let options = ClientOptions {
        enforce_voter_authorization: true,
        ..fast_options()
    };
    let client = client_with(store.clone(), Arc::new(StaticWallet::new("0xintruder")), options);

    let err = client
        .approve(&AllocationId("a".into()))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::NotAuthorized { .. })
    ));
    assert_eq!(
        stored_envelope(&store, "a").await.status,
        AllocationStatus::Pending
    );
}

#[tokio::test]
async fn authorization_guard_blocks_terminal_transition() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0xOwner", 100, AllocationStatus::Approved).await;
    seed_index(&store, &["a"]).await;
    let options = ClientOptions {
        enforce_voter_authorization: true,
        ..fast_options()
    };
    // Address comparison is case-insensitive, so the owner passes that check
    // and hits the transition guard.
    let client = client_with(store, Arc::new(StaticWallet::new("0xowner")), options);

    let err = client
        .reject(&AllocationId("a".into()))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::IllegalTransition { .. })
    ));
}

#[tokio::test]
async fn decrypt_round_trips_value_after_consent_signature() {
    let client = client_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(StaticWallet::new("0x1")),
        fast_options(),
    );
    let encrypted = FheStubCipher.encrypt(123.5);
    let value = client
        .decrypt_with_signature(&encrypted)
        .await
        .expect("decrypt");
    assert_eq!(value, Some(123.5));
}

#[tokio::test]
async fn decrypt_returns_none_when_signature_refused() {
    let client = client_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(RefusingWallet),
        fast_options(),
    );
    let encrypted = FheStubCipher.encrypt(1.0);
    let value = client
        .decrypt_with_signature(&encrypted)
        .await
        .expect("no error on refusal");
    assert_eq!(value, None);
}

#[tokio::test]
async fn decrypt_requires_connected_wallet() {
    let client = client_with(
        Arc::new(MemoryLedger::new()),
        Arc::new(MissingWallet),
        fast_options(),
    );
    let err = client
        .decrypt_with_signature("FHE-NDI=")
        .await
        .expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::WalletNotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn success_notice_auto_dismisses_after_ttl() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());

    client.submit_vote(42.0, false).await.expect("submit");
    let notice = client.current_notice().await.expect("success notice");
    assert_eq!(notice.status, NoticeStatus::Success);

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(client.current_notice().await.is_none());
}

#[tokio::test]
async fn stale_dismissal_cannot_clear_a_newer_notice() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());

    client.submit_vote(1.0, false).await.expect("first submit");
    let first = client.current_notice().await.expect("first notice");
    client.submit_vote(2.0, false).await.expect("second submit");
    let second = client.current_notice().await.expect("second notice");
    assert!(second.seq > first.seq);

    client.dismiss_notice_if_current(first.seq).await;
    assert_eq!(client.current_notice().await, Some(second.clone()));

    client.dismiss_notice_if_current(second.seq).await;
    assert!(client.current_notice().await.is_none());
}

#[tokio::test]
async fn voter_history_returns_connected_wallet_records() {
    let store = Arc::new(MemoryLedger::new());
    seed_record(&store, "a", "0xAAA", 100, AllocationStatus::Pending).await;
    seed_record(&store, "b", "0xBBB", 200, AllocationStatus::Pending).await;
    seed_record(&store, "c", "0xaaa", 300, AllocationStatus::Approved).await;
    seed_index(&store, &["a", "b", "c"]).await;

    let client = client_with(store, Arc::new(StaticWallet::new("0xAaA")), fast_options());
    client.refresh().await.expect("refresh");

    let history = client.voter_history().await;
    let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"]);
}

#[tokio::test]
async fn clear_drops_cache_and_notice() {
    let store = Arc::new(MemoryLedger::new());
    let client = client_with(store, Arc::new(StaticWallet::new("0x1")), fast_options());
    client.submit_vote(42.0, false).await.expect("submit");

    client.clear().await;

    let snapshot = client.snapshot().await;
    assert!(snapshot.allocations.is_empty());
    assert!(!snapshot.loaded);
    assert!(client.current_notice().await.is_none());
}
