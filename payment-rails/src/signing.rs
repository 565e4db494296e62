//! Keyed-hash request signing

use crate::{Error, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// HMAC-SHA256
    #[serde(rename = "SHA256")]
    HmacSha256,
    /// HMAC-SHA512
    #[serde(rename = "SHA512")]
    HmacSha512,
}

impl SignatureMethod {
    /// Header value
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethod::HmacSha256 => "SHA256",
            SignatureMethod::HmacSha512 => "SHA512",
        }
    }
}

/// Detached payload signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Algorithm
    pub method: SignatureMethod,
    /// Lowercase hex digest
    pub value: String,
}

/// Sign `payload` bytes with `secret`
pub fn sign(method: SignatureMethod, secret: &str, payload: &[u8]) -> Result<Signature> {
    let value = match method {
        SignatureMethod::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|e| Error::Config(format!("invalid signing key: {}", e)))?;
            mac.update(payload);
            hex::encode(mac.finalize().into_bytes())
        }
        SignatureMethod::HmacSha512 => {
            let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
                .map_err(|e| Error::Config(format!("invalid signing key: {}", e)))?;
            mac.update(payload);
            hex::encode(mac.finalize().into_bytes())
        }
    };

    Ok(Signature { method, value })
}

/// Sign the compact JSON encoding of `payload`
pub fn sign_json(
    method: SignatureMethod,
    secret: &str,
    payload: &serde_json::Value,
) -> Result<Signature> {
    let bytes = serde_json::to_vec(payload)?;
    sign(method, secret, &bytes)
}
