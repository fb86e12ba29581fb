//! Signing credentials
//!
//! A [`PrivateKey`] wraps the raw secret read from the environment. The raw
//! value is only reachable through [`PrivateKey::expose`] and the hand-off
//! serialization; `Debug` and `Display` always print a masked form.

use crate::config::ConfigError;
use serde::{Serialize, Serializer};
use std::fmt;

/// Number of hex digits in a secp256k1 private key
const KEY_HEX_LEN: usize = 64;

/// How many trailing characters the masked form keeps visible
const VISIBLE_SUFFIX: usize = 4;

/// Secret signing key for a network account
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    /// Wrap a raw key. No format check is done here; see [`PrivateKey::check_format`].
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw secret, for handing to the signer
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form safe for logs and summaries, e.g. `0x****c123`
    pub fn masked(&self) -> String {
        let hex = self.0.strip_prefix("0x").unwrap_or(&self.0);
        let chars: Vec<char> = hex.chars().collect();

        // Short keys would be fully revealed by the suffix, so hide them entirely
        if chars.len() <= VISIBLE_SUFFIX * 2 {
            return "0x****".to_string();
        }

        let suffix: String = chars[chars.len() - VISIBLE_SUFFIX..].iter().collect();
        format!("0x****{}", suffix)
    }

    /// Check that the key is 32 bytes of hex, with an optional `0x` prefix
    pub fn check_format(&self) -> Result<(), ConfigError> {
        let hex = self.0.strip_prefix("0x").unwrap_or(&self.0);

        if hex.len() != KEY_HEX_LEN {
            return Err(ConfigError::MalformedCredential(format!(
                "expected {} hex digits, found {}",
                KEY_HEX_LEN,
                hex.len()
            )));
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::MalformedCredential(
                "key contains non-hex characters".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&self.masked()).finish()
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

// The external tool expects the bare key string in `accounts`
impl Serialize for PrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
