use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Marker carried by every value produced by [`FheStubCipher`].
pub const FHE_PREFIX: &str = "FHE-";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("payload is not a number: {0}")]
    Number(#[from] std::num::ParseFloatError),
}

/// Reversible encoding of a vote amount. This is the seam where a genuine
/// encryption provider plugs in; nothing in the record lifecycle depends on
/// the concrete transform.
pub trait AmountCipher: Send + Sync {
    fn encrypt(&self, value: f64) -> String;
    fn decrypt(&self, encrypted: &str) -> Result<f64, CipherError>;
}

/// Placeholder transform standing in for an FHE backend: the decimal string
/// base64-encoded behind a fixed prefix. Not cryptography.
pub struct FheStubCipher;

impl AmountCipher for FheStubCipher {
    fn encrypt(&self, value: f64) -> String {
        format!("{FHE_PREFIX}{}", STANDARD.encode(value.to_string()))
    }

    fn decrypt(&self, encrypted: &str) -> Result<f64, CipherError> {
        let Some(payload) = encrypted.strip_prefix(FHE_PREFIX) else {
            // Values written before the prefix existed are plain decimals.
            return Ok(encrypted.parse::<f64>()?);
        };
        let decoded = String::from_utf8(STANDARD.decode(payload)?)?;
        Ok(decoded.parse::<f64>()?)
    }
}

#[cfg(test)]
#[path = "tests/cipher_tests.rs"]
mod tests;
