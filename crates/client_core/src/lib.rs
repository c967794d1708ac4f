use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ledger::{LedgerError, LedgerStore};
use shared::{
    domain::{
        AllocationId, AllocationRecord, AllocationStatus, Notice, NoticeStatus, StatusFilter,
        VoteStats,
    },
    error::{ClientFault, ErrorCode},
    protocol::{record_key, AllocationEnvelope, INDEX_KEY},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
    time::Duration,
};
use tracing::{info, warn};

pub mod cipher;
pub mod presenter;
pub mod signature;

pub use cipher::{AmountCipher, FheStubCipher};
pub use signature::SignatureParams;

const DEFAULT_SUCCESS_NOTICE_TTL: Duration = Duration::from_secs(2);
const DEFAULT_ERROR_NOTICE_TTL: Duration = Duration::from_secs(3);
const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("allocation {0} not found")]
    AllocationNotFound(AllocationId),
    #[error("caller {caller} is not the voter for allocation {id}")]
    NotAuthorized { id: AllocationId, caller: String },
    #[error("allocation {id} is already {status}")]
    IllegalTransition {
        id: AllocationId,
        status: AllocationStatus,
    },
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("user rejected transaction")]
    Rejected,
    #[error("wallet unavailable")]
    Unavailable,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Connected wallet boundary. `address` returning `None` means no wallet is
/// connected; every mutating or revealing operation checks this first.
#[async_trait]
pub trait WalletSession: Send + Sync {
    fn address(&self) -> Option<String>;
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;
}

/// Dev/test wallet with a fixed address that signs everything it is asked to.
pub struct StaticWallet {
    address: String,
}

impl StaticWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl WalletSession for StaticWallet {
    fn address(&self) -> Option<String> {
        Some(self.address.clone())
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        Ok(STANDARD.encode(message.as_bytes()))
    }
}

/// Null object for the disconnected state.
pub struct MissingWallet;

#[async_trait]
impl WalletSession for MissingWallet {
    fn address(&self) -> Option<String> {
        None
    }

    async fn sign_message(&self, _message: &str) -> Result<String, WalletError> {
        Err(WalletError::Unavailable)
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// When set, approve/reject require the caller to be the record's voter
    /// and the record to still be pending. Off by default, matching the
    /// deployed behavior where the contract is trusted to enforce this.
    pub enforce_voter_authorization: bool,
    pub success_notice_ttl: Duration,
    pub error_notice_ttl: Duration,
    /// Pause between the consent signature and the revealed value.
    pub reveal_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            enforce_voter_authorization: false,
            success_notice_ttl: DEFAULT_SUCCESS_NOTICE_TTL,
            error_notice_ttl: DEFAULT_ERROR_NOTICE_TTL,
            reveal_delay: DEFAULT_REVEAL_DELAY,
        }
    }
}

/// Server-synchronized slice of state: the decoded allocation list plus the
/// refresh flag. Rebuilt wholesale on every load.
#[derive(Debug, Clone, Default)]
pub struct SyncedState {
    pub allocations: Vec<AllocationRecord>,
    pub refreshing: bool,
    pub loaded: bool,
}

struct ViewState {
    notice: Option<Notice>,
    notice_seq: u64,
    dismiss_task: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    AllocationsRefreshed { count: usize },
    NoticeChanged(Option<Notice>),
    Fault(ClientFault),
}

/// The allocation view model: loads vote records from the ledger, submits
/// and transitions them, and derives filtered views for display.
pub struct AllocationClient {
    ledger: Arc<dyn LedgerStore>,
    wallet: Arc<dyn WalletSession>,
    cipher: Arc<dyn AmountCipher>,
    options: ClientOptions,
    signature_params: SignatureParams,
    synced: RwLock<SyncedState>,
    view: Mutex<ViewState>,
    events: broadcast::Sender<ClientEvent>,
}

impl AllocationClient {
    pub fn new(ledger: Arc<dyn LedgerStore>, wallet: Arc<dyn WalletSession>) -> Arc<Self> {
        Self::new_with_dependencies(
            ledger,
            wallet,
            Arc::new(FheStubCipher),
            ClientOptions::default(),
            SignatureParams::generate("0x0", 0),
        )
    }

    pub fn new_with_dependencies(
        ledger: Arc<dyn LedgerStore>,
        wallet: Arc<dyn WalletSession>,
        cipher: Arc<dyn AmountCipher>,
        options: ClientOptions,
        signature_params: SignatureParams,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            ledger,
            wallet,
            cipher,
            options,
            signature_params,
            synced: RwLock::new(SyncedState::default()),
            view: Mutex::new(ViewState {
                notice: None,
                notice_seq: 0,
                dismiss_task: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn signature_params(&self) -> &SignatureParams {
        &self.signature_params
    }

    pub async fn snapshot(&self) -> SyncedState {
        self.synced.read().await.clone()
    }

    pub async fn current_notice(&self) -> Option<Notice> {
        self.view.lock().await.notice.clone()
    }

    /// Reloads the allocation list from the ledger. Malformed entries are
    /// skipped with a diagnostic; an index or transport failure leaves the
    /// previous list in place. The refreshing flag is cleared on every path.
    pub async fn refresh(&self) -> Result<()> {
        self.synced.write().await.refreshing = true;
        let outcome = self.load_allocations().await;
        let mut synced = self.synced.write().await;
        synced.refreshing = false;
        match outcome {
            Ok(Some(list)) => {
                let count = list.len();
                synced.allocations = list;
                synced.loaded = true;
                drop(synced);
                let _ = self
                    .events
                    .send(ClientEvent::AllocationsRefreshed { count });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                drop(synced);
                warn!("vote: refresh failed: {err:#}");
                Err(err)
            }
        }
    }

    async fn load_allocations(&self) -> Result<Option<Vec<AllocationRecord>>> {
        let available = self
            .ledger
            .is_available()
            .await
            .context("ledger availability probe failed")?;
        if !available {
            info!("vote: ledger not available, skipping refresh");
            return Ok(None);
        }

        let ids = self.read_index().await?;
        let mut list = Vec::with_capacity(ids.len());
        for id in ids {
            let key = record_key(&id);
            let bytes = match self.ledger.get_data(&key).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(key = %key, "vote: failed to read allocation record: {err}");
                    continue;
                }
            };
            if bytes.is_empty() {
                warn!(key = %key, "vote: indexed allocation record is absent");
                continue;
            }
            match serde_json::from_slice::<AllocationEnvelope>(&bytes) {
                Ok(envelope) => list.push(envelope.into_record(AllocationId(id))),
                Err(err) => {
                    warn!(key = %key, "vote: skipping malformed allocation record: {err}");
                }
            }
        }
        // Most recent first; the stable sort keeps fetch order for ties.
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(Some(list))
    }

    async fn read_index(&self) -> Result<Vec<String>> {
        let bytes = self
            .ledger
            .get_data(INDEX_KEY)
            .await
            .context("failed to read allocation index")?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_slice::<Vec<String>>(&bytes) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                warn!("vote: malformed allocation index, treating as empty: {err}");
                Ok(Vec::new())
            }
        }
    }

    /// Encodes the amount, writes a fresh pending record, appends its id to
    /// the index and reloads. Returns the record as submitted.
    pub async fn submit_vote(
        self: &Arc<Self>,
        amount: f64,
        is_saboteur: bool,
    ) -> Result<AllocationRecord> {
        let Some(voter) = self.wallet.address() else {
            return self.fail_precondition().await;
        };
        self.show_notice(NoticeStatus::Pending, "Encrypting vote with Zama FHE...")
            .await;
        match self.submit_vote_inner(&voter, amount, is_saboteur).await {
            Ok(record) => {
                self.show_notice(NoticeStatus::Success, "Encrypted vote submitted!")
                    .await;
                if let Err(err) = self.refresh().await {
                    warn!("vote: refresh after submit failed: {err:#}");
                }
                self.schedule_notice_dismissal(self.options.success_notice_ttl)
                    .await;
                Ok(record)
            }
            Err(err) => self.fail_operation("Submission failed", err).await,
        }
    }

    async fn submit_vote_inner(
        &self,
        voter: &str,
        amount: f64,
        is_saboteur: bool,
    ) -> Result<AllocationRecord> {
        let record = AllocationRecord {
            id: AllocationId::generate(),
            encrypted_amount: self.cipher.encrypt(amount),
            timestamp: chrono::Utc::now().timestamp(),
            voter: voter.to_string(),
            status: AllocationStatus::Pending,
            is_saboteur,
        };
        let envelope = AllocationEnvelope::from_record(&record);
        let bytes = serde_json::to_vec(&envelope).context("failed to encode allocation record")?;
        self.ledger
            .set_data(&record_key(record.id.as_str()), bytes)
            .await
            .context("failed to write allocation record")?;

        // Read-modify-write with no compare-and-swap: two concurrent
        // submitters can drop each other's id. Last index write wins.
        let mut ids = self.read_index().await?;
        ids.push(record.id.0.clone());
        let index_bytes = serde_json::to_vec(&ids).context("failed to encode allocation index")?;
        self.ledger
            .set_data(INDEX_KEY, index_bytes)
            .await
            .context("failed to write allocation index")?;

        info!(allocation_id = %record.id, voter = %record.voter, "vote: submitted");
        Ok(record)
    }

    pub async fn approve(self: &Arc<Self>, id: &AllocationId) -> Result<AllocationRecord> {
        self.transition(id, AllocationStatus::Approved, "Vote approved!", "Approval failed")
            .await
    }

    pub async fn reject(self: &Arc<Self>, id: &AllocationId) -> Result<AllocationRecord> {
        self.transition(id, AllocationStatus::Rejected, "Vote rejected!", "Rejection failed")
            .await
    }

    async fn transition(
        self: &Arc<Self>,
        id: &AllocationId,
        target: AllocationStatus,
        success_message: &str,
        failure_prefix: &str,
    ) -> Result<AllocationRecord> {
        let Some(caller) = self.wallet.address() else {
            return self.fail_precondition().await;
        };
        self.show_notice(NoticeStatus::Pending, "Processing encrypted vote...")
            .await;
        match self.transition_inner(id, target, &caller).await {
            Ok(record) => {
                self.show_notice(NoticeStatus::Success, success_message).await;
                if let Err(err) = self.refresh().await {
                    warn!("vote: refresh after status update failed: {err:#}");
                }
                self.schedule_notice_dismissal(self.options.success_notice_ttl)
                    .await;
                Ok(record)
            }
            Err(err) => self.fail_operation(failure_prefix, err).await,
        }
    }

    async fn transition_inner(
        &self,
        id: &AllocationId,
        target: AllocationStatus,
        caller: &str,
    ) -> Result<AllocationRecord> {
        let key = record_key(id.as_str());
        let bytes = self
            .ledger
            .get_data(&key)
            .await
            .context("failed to read allocation record")?;
        if bytes.is_empty() {
            return Err(ClientError::AllocationNotFound(id.clone()).into());
        }
        let mut envelope: AllocationEnvelope = serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed allocation record under {key}"))?;

        if self.options.enforce_voter_authorization {
            if !envelope.voter.eq_ignore_ascii_case(caller) {
                return Err(ClientError::NotAuthorized {
                    id: id.clone(),
                    caller: caller.to_string(),
                }
                .into());
            }
            if envelope.status.is_terminal() {
                return Err(ClientError::IllegalTransition {
                    id: id.clone(),
                    status: envelope.status,
                }
                .into());
            }
        }

        envelope.status = target;
        let bytes = serde_json::to_vec(&envelope).context("failed to encode allocation record")?;
        self.ledger
            .set_data(&key, bytes)
            .await
            .context("failed to write allocation record")?;
        info!(allocation_id = %id, status = %target, "vote: status updated");
        Ok(envelope.into_record(id.clone()))
    }

    /// Signature-gated reveal of an encoded amount. The signature is never
    /// verified; any signing failure yields `None` with no partial state.
    pub async fn decrypt_with_signature(&self, encrypted: &str) -> Result<Option<f64>> {
        if self.wallet.address().is_none() {
            return Err(ClientError::WalletNotConnected.into());
        }
        let message = self.signature_params.consent_message();
        if let Err(err) = self.wallet.sign_message(&message).await {
            warn!("vote: decrypt consent signature refused: {err}");
            return Ok(None);
        }
        if !self.options.reveal_delay.is_zero() {
            tokio::time::sleep(self.options.reveal_delay).await;
        }
        let value = self
            .cipher
            .decrypt(encrypted)
            .context("failed to decode encrypted amount")?;
        Ok(Some(value))
    }

    pub async fn stats(&self) -> VoteStats {
        presenter::stats(&self.synced.read().await.allocations)
    }

    pub async fn history_for(&self, address: &str) -> Vec<AllocationRecord> {
        presenter::history_for(&self.synced.read().await.allocations, address)
    }

    /// History of the connected wallet; empty when disconnected.
    pub async fn voter_history(&self) -> Vec<AllocationRecord> {
        match self.wallet.address() {
            Some(address) => self.history_for(&address).await,
            None => Vec::new(),
        }
    }

    pub async fn filtered(&self, search_term: &str, filter: StatusFilter) -> Vec<AllocationRecord> {
        presenter::filtered(&self.synced.read().await.allocations, search_term, filter)
    }

    /// Drops the cached list and any live notice, e.g. when the embedding
    /// view unmounts.
    pub async fn clear(&self) {
        *self.synced.write().await = SyncedState::default();
        let mut view = self.view.lock().await;
        if let Some(task) = view.dismiss_task.take() {
            task.abort();
        }
        view.notice = None;
    }

    async fn show_notice(&self, status: NoticeStatus, message: impl Into<String>) -> u64 {
        let mut view = self.view.lock().await;
        if let Some(task) = view.dismiss_task.take() {
            task.abort();
        }
        view.notice_seq += 1;
        let notice = Notice {
            seq: view.notice_seq,
            status,
            message: message.into(),
        };
        view.notice = Some(notice.clone());
        let _ = self.events.send(ClientEvent::NoticeChanged(Some(notice)));
        view.notice_seq
    }

    /// Schedules the current notice to clear after `after`. The task is tied
    /// to the notice's sequence number, so a notice shown later can never be
    /// clobbered by a stale timer.
    async fn schedule_notice_dismissal(self: &Arc<Self>, after: Duration) {
        let mut view = self.view.lock().await;
        let Some(seq) = view.notice.as_ref().map(|notice| notice.seq) else {
            return;
        };
        if let Some(task) = view.dismiss_task.take() {
            task.abort();
        }
        let client = Arc::clone(self);
        view.dismiss_task = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            client.dismiss_notice_if_current(seq).await;
        }));
    }

    pub async fn dismiss_notice_if_current(&self, seq: u64) {
        let mut view = self.view.lock().await;
        if view.notice.as_ref().is_some_and(|notice| notice.seq == seq) {
            view.notice = None;
            view.dismiss_task = None;
            let _ = self.events.send(ClientEvent::NoticeChanged(None));
        }
    }

    async fn fail_precondition(&self) -> Result<AllocationRecord> {
        let err = anyhow::Error::from(ClientError::WalletNotConnected);
        let _ = self.events.send(ClientEvent::Fault(ClientFault::new(
            ErrorCode::WalletNotConnected,
            "Please connect wallet first",
        )));
        Err(err)
    }

    async fn fail_operation(
        self: &Arc<Self>,
        prefix: &str,
        err: anyhow::Error,
    ) -> Result<AllocationRecord> {
        let message = failure_message(prefix, &err);
        self.show_notice(NoticeStatus::Error, message.clone()).await;
        self.schedule_notice_dismissal(self.options.error_notice_ttl)
            .await;
        let _ = self
            .events
            .send(ClientEvent::Fault(ClientFault::new(fault_code(&err), message)));
        Err(err)
    }
}

fn failure_message(prefix: &str, err: &anyhow::Error) -> String {
    if is_user_rejection(err) {
        "Transaction rejected by user".to_string()
    } else {
        format!("{prefix}: {err:#}")
    }
}

fn is_user_rejection(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<LedgerError>()
            .is_some_and(|e| matches!(e, LedgerError::Rejected))
            || cause
                .downcast_ref::<WalletError>()
                .is_some_and(|e| matches!(e, WalletError::Rejected))
    })
}

fn fault_code(err: &anyhow::Error) -> ErrorCode {
    if is_user_rejection(err) {
        return ErrorCode::Rejected;
    }
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::WalletNotConnected) => ErrorCode::WalletNotConnected,
        Some(ClientError::AllocationNotFound(_)) => ErrorCode::NotFound,
        Some(_) => ErrorCode::Internal,
        None => {
            if err
                .chain()
                .any(|cause| {
                    cause
                        .downcast_ref::<LedgerError>()
                        .is_some_and(|e| matches!(e, LedgerError::Unavailable))
                })
            {
                ErrorCode::Unavailable
            } else {
                ErrorCode::Internal
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
