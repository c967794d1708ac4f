use serde::{Deserialize, Serialize};

use crate::domain::{AllocationId, AllocationRecord, AllocationStatus};

/// Well-known ledger key holding the JSON array of allocation ids.
pub const INDEX_KEY: &str = "allocation_keys";

/// Ledger key for a single allocation record.
pub fn record_key(id: &str) -> String {
    format!("allocation_{id}")
}

/// Persisted shape of one allocation vote. The encoded amount travels as
/// `amount` on the wire; `status` and `isSaboteur` default so records written
/// before those fields existed still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEnvelope {
    pub amount: String,
    pub timestamp: i64,
    pub voter: String,
    #[serde(default)]
    pub status: AllocationStatus,
    #[serde(default)]
    pub is_saboteur: bool,
}

impl AllocationEnvelope {
    pub fn from_record(record: &AllocationRecord) -> Self {
        Self {
            amount: record.encrypted_amount.clone(),
            timestamp: record.timestamp,
            voter: record.voter.clone(),
            status: record.status,
            is_saboteur: record.is_saboteur,
        }
    }

    pub fn into_record(self, id: AllocationId) -> AllocationRecord {
        AllocationRecord {
            id,
            encrypted_amount: self.amount,
            timestamp: self.timestamp,
            voter: self.voter,
            status: self.status,
            is_saboteur: self.is_saboteur,
        }
    }
}
