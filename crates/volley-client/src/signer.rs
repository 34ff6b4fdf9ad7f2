//! HMAC-SHA256 request signing.
//!
//! The signature covers the exact query string that goes on the wire, in
//! parameter insertion order. Values are percent-encoded before signing so
//! the signed bytes and the sent bytes never diverge.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ClientError, ClientResult};

type HmacSha256 = Hmac<Sha256>;

/// `key=value&...` in the given order, values percent-encoded.
pub fn canonical_query<K: AsRef<str>>(params: &[(K, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex-encoded HMAC-SHA256 of `query` keyed by `secret`.
pub fn sign_query(secret: &str, query: &str) -> ClientResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Signing(e.to_string()))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
