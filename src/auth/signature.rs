//! HMAC-SHA256 signature verification for signed session cookies.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the HMAC-SHA256 of `payload` keyed with `secret`.
#[cfg(test)]
pub(crate) fn sign(payload: &str, secret: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Check `signature` against the HMAC-SHA256 of `payload` under `secret`.
///
/// The comparison runs in constant time over the expected tag length.
/// Any length or content mismatch yields `false`.
pub fn verify(payload: &str, secret: &str, signature: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(signature).is_ok()
}
