use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::{LedgerError, LedgerStore};

/// Ledger backed by a key-value gateway over HTTP: `GET /health`,
/// `GET /kv/{key}` (404 means absent) and `PUT /kv/{key}` with a raw body.
/// A 403 on write means the signing layer refused the transaction.
pub struct HttpLedger {
    http: Client,
    base_url: String,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn kv_url(&self, key: &str) -> String {
        format!("{}/kv/{key}", self.base_url)
    }
}

fn transport(err: reqwest::Error) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

#[async_trait]
impl LedgerStore for HttpLedger {
    async fn is_available(&self) -> Result<bool, LedgerError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(transport)?;
        Ok(response.status().is_success())
    }

    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        let response = self
            .http
            .get(self.kv_url(key))
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = response.error_for_status().map_err(transport)?;
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        let response = self
            .http
            .put(self.kv_url(key))
            .body(value)
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::FORBIDDEN {
            return Err(LedgerError::Rejected);
        }
        response.error_for_status().map_err(transport)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
