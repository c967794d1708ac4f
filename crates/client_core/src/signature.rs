use chrono::Utc;
use uuid::Uuid;

const PUBLIC_KEY_HEX_CHARS: usize = 2000;
const DEFAULT_DURATION_DAYS: u32 = 30;

/// Fixed parameters embedded in the decrypt consent message. The signature
/// requested over this message is never verified; it exists to force a
/// wallet interaction before a value is revealed.
#[derive(Debug, Clone)]
pub struct SignatureParams {
    pub public_key: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl SignatureParams {
    pub fn generate(contract_address: impl Into<String>, chain_id: u64) -> Self {
        Self {
            public_key: synthetic_public_key(),
            contract_address: contract_address.into(),
            chain_id,
            start_timestamp: Utc::now().timestamp(),
            duration_days: DEFAULT_DURATION_DAYS,
        }
    }

    pub fn consent_message(&self) -> String {
        format!(
            "publickey:{}\ncontractAddresses:{}\ncontractsChainId:{}\nstartTimestamp:{}\ndurationDays:{}",
            self.public_key,
            self.contract_address,
            self.chain_id,
            self.start_timestamp,
            self.duration_days
        )
    }
}

/// Synthetic 0x-prefixed hex string standing in for a reveal public key.
/// Random but not secret.
fn synthetic_public_key() -> String {
    let mut key = String::with_capacity(2 + PUBLIC_KEY_HEX_CHARS);
    key.push_str("0x");
    while key.len() < 2 + PUBLIC_KEY_HEX_CHARS {
        key.push_str(Uuid::new_v4().simple().to_string().as_str());
    }
    key.truncate(2 + PUBLIC_KEY_HEX_CHARS);
    key
}
