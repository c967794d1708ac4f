use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque allocation-vote identifier: creation millis plus a random suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationId(pub String);

impl AllocationId {
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = &Uuid::new_v4().simple().to_string()[..7];
        Self(format!("{millis}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl AllocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStatus::Pending => "pending",
            AllocationStatus::Approved => "approved",
            AllocationStatus::Rejected => "rejected",
        }
    }

    /// Status transitions are one-way: a record leaves `pending` exactly once.
    pub fn is_terminal(self) -> bool {
        !matches!(self, AllocationStatus::Pending)
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub fn matches(self, status: AllocationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == AllocationStatus::Pending,
            StatusFilter::Approved => status == AllocationStatus::Approved,
            StatusFilter::Rejected => status == AllocationStatus::Rejected,
        }
    }
}

/// One allocation vote as held in the client cache. Everything except
/// `status` is immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: AllocationId,
    pub encrypted_amount: String,
    /// Unix seconds, set at creation.
    pub timestamp: i64,
    /// Wallet address of the submitter.
    pub voter: String,
    pub status: AllocationStatus,
    pub is_saboteur: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeStatus {
    Pending,
    Success,
    Error,
}

/// Transient user-visible feedback. The sequence number identifies the
/// notice so a dismissal scheduled for an older notice cannot clear a
/// newer one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub seq: u64,
    pub status: NoticeStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteStats {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
    pub saboteurs: usize,
}
