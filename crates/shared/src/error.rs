use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    WalletNotConnected,
    NotFound,
    Rejected,
    Unavailable,
    Internal,
}

/// Failure surfaced to an embedding UI alongside the transient notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFault {
    pub code: ErrorCode,
    pub message: String,
}

impl ClientFault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
