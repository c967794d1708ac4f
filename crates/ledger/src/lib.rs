use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

mod http;

pub use http::HttpLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable")]
    Unavailable,
    #[error("user rejected transaction")]
    Rejected,
    #[error("ledger transport failure: {0}")]
    Transport(String),
}

/// Key-value boundary to the external ledger. Durable state and any
/// consensus rules live on the other side of this trait; the client only
/// reads and overwrites whole values.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Readiness probe; a `false` here gates loading entirely.
    async fn is_available(&self) -> Result<bool, LedgerError>;

    /// Returns zero-length bytes when the key is absent.
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError>;

    /// Idempotent overwrite. There is no compare-and-swap: concurrent
    /// writers race and the last write wins.
    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;
}

/// In-process ledger used by tests and the demo mode of the CLI.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    available: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn is_available(&self) -> Result<bool, LedgerError> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned().unwrap_or_default())
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Null object for wiring a client without a ledger; every call fails.
pub struct MissingLedger;

#[async_trait]
impl LedgerStore for MissingLedger {
    async fn is_available(&self) -> Result<bool, LedgerError> {
        Err(LedgerError::Unavailable)
    }

    async fn get_data(&self, _key: &str) -> Result<Vec<u8>, LedgerError> {
        Err(LedgerError::Unavailable)
    }

    async fn set_data(&self, _key: &str, _value: Vec<u8>) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
