// =============================================================================
// Transaction PIN — six-digit withdrawal password
// =============================================================================
//
// The PIN is never stored. We keep a random salt and HMAC-SHA256(salt, pin),
// and verification compares digests in constant time.
// =============================================================================

use rand::RngCore;
use thiserror::Error;

use crate::crypto::{constant_time_eq, hmac_sha256};

pub const PIN_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("Password must be 6 digits.")]
    InvalidFormat,
    #[error("Passwords do not match.")]
    Mismatch,
}

#[derive(Clone)]
pub struct TransactionPin {
    salt: [u8; 16],
    digest: Vec<u8>,
}

impl std::fmt::Debug for TransactionPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TransactionPin(..)")
    }
}

impl TransactionPin {
    /// Validate and seal a new PIN. `confirm` must repeat `pin` exactly.
    pub fn set(pin: &str, confirm: &str) -> Result<Self, PinError> {
        if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PinError::InvalidFormat);
        }
        if pin != confirm {
            return Err(PinError::Mismatch);
        }

        let mut salt = [0u8; 16];
        rand::rng().fill_bytes(&mut salt);
        let digest = hmac_sha256(&salt, pin.as_bytes());
        Ok(Self { salt, digest })
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let digest = hmac_sha256(&self.salt, candidate.as_bytes());
        constant_time_eq(&digest, &self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_verify() {
        let pin = TransactionPin::set("482913", "482913").unwrap();
        assert!(pin.verify("482913"));
        assert!(!pin.verify("482914"));
        assert!(!pin.verify(""));
    }

    #[test]
    fn rejects_bad_format_and_mismatch() {
        assert_eq!(TransactionPin::set("12345", "12345").unwrap_err(), PinError::InvalidFormat);
        assert_eq!(TransactionPin::set("12a456", "12a456").unwrap_err(), PinError::InvalidFormat);
        assert_eq!(TransactionPin::set("1234567", "1234567").unwrap_err(), PinError::InvalidFormat);
        assert_eq!(TransactionPin::set("123456", "654321").unwrap_err(), PinError::Mismatch);
    }

    #[test]
    fn same_pin_salts_differently() {
        let a = TransactionPin::set("000000", "000000").unwrap();
        let b = TransactionPin::set("000000", "000000").unwrap();
        assert_ne!(a.digest, b.digest);
        assert!(a.verify("000000") && b.verify("000000"));
    }

    #[test]
    fn sealed_digest_is_full_length() {
        let pin = TransactionPin::set("271828", "271828").unwrap();
        assert_eq!(pin.digest.len(), 32);
        assert_eq!(pin.digest, hmac_sha256(&pin.salt, b"271828"));
    }
}
