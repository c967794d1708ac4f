use std::{collections::HashMap, fs, time::Duration};

use client_core::ClientOptions;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the ledger gateway. `None` runs against an in-memory
    /// ledger, useful for trying the commands offline.
    pub ledger_url: Option<String>,
    pub wallet_address: Option<String>,
    pub contract_address: String,
    pub chain_id: u64,
    pub enforce_voter_authorization: bool,
    pub success_notice_ms: u64,
    pub error_notice_ms: u64,
    pub reveal_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_url: None,
            wallet_address: None,
            contract_address: "0x0000000000000000000000000000000000000000".into(),
            chain_id: 8009,
            enforce_voter_authorization: false,
            success_notice_ms: 2_000,
            error_notice_ms: 3_000,
            reveal_delay_ms: 1_500,
        }
    }
}

impl Settings {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            enforce_voter_authorization: self.enforce_voter_authorization,
            success_notice_ttl: Duration::from_millis(self.success_notice_ms),
            error_notice_ttl: Duration::from_millis(self.error_notice_ms),
            reveal_delay: Duration::from_millis(self.reveal_delay_ms),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            for (key, value) in &file_cfg {
                apply_entry(&mut settings, key, value);
            }
        }
    }

    for key in [
        "ledger_url",
        "wallet_address",
        "contract_address",
        "chain_id",
        "enforce_voter_authorization",
        "success_notice_ms",
        "error_notice_ms",
        "reveal_delay_ms",
    ] {
        if let Ok(value) = std::env::var(format!("APP__{}", key.to_uppercase())) {
            apply_entry(&mut settings, key, &value);
        }
    }

    settings
}

fn apply_entry(settings: &mut Settings, key: &str, value: &str) {
    match key {
        "ledger_url" => settings.ledger_url = Some(value.to_string()),
        "wallet_address" => settings.wallet_address = Some(value.to_string()),
        "contract_address" => settings.contract_address = value.to_string(),
        "chain_id" => {
            if let Ok(parsed) = value.parse() {
                settings.chain_id = parsed;
            }
        }
        "enforce_voter_authorization" => {
            if let Ok(parsed) = value.parse() {
                settings.enforce_voter_authorization = parsed;
            }
        }
        "success_notice_ms" => {
            if let Ok(parsed) = value.parse() {
                settings.success_notice_ms = parsed;
            }
        }
        "error_notice_ms" => {
            if let Ok(parsed) = value.parse() {
                settings.error_notice_ms = parsed;
            }
        }
        "reveal_delay_ms" => {
            if let Ok(parsed) = value.parse() {
                settings.reveal_delay_ms = parsed;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_known_keys_and_ignores_the_rest() {
        let mut settings = Settings::default();
        apply_entry(&mut settings, "ledger_url", "http://localhost:8545");
        apply_entry(&mut settings, "chain_id", "1");
        apply_entry(&mut settings, "enforce_voter_authorization", "true");
        apply_entry(&mut settings, "no_such_key", "whatever");

        assert_eq!(settings.ledger_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(settings.chain_id, 1);
        assert!(settings.enforce_voter_authorization);
    }

    #[test]
    fn unparsable_numbers_keep_the_default() {
        let mut settings = Settings::default();
        apply_entry(&mut settings, "chain_id", "not a number");
        assert_eq!(settings.chain_id, 8009);
    }

    #[test]
    fn client_options_carry_the_configured_timings() {
        let settings = Settings {
            success_notice_ms: 10,
            error_notice_ms: 20,
            reveal_delay_ms: 0,
            ..Settings::default()
        };
        let options = settings.client_options();
        assert_eq!(options.success_notice_ttl, Duration::from_millis(10));
        assert_eq!(options.error_notice_ttl, Duration::from_millis(20));
        assert!(options.reveal_delay.is_zero());
    }
}
