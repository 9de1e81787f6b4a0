use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest of `data` as raw bytes.
pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HMAC-SHA-256 of `message` under `key` as raw bytes.
pub(crate) fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Constant-time check that `tag` is the HMAC-SHA-256 of `message` under `key`.
pub(crate) fn hmac_sha256_verify(key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}

/// Decodes a signature rendered as lowercase hex. Telegram renders tags in
/// lowercase and the comparison is against that exact rendering, so an
/// uppercase (or mixed-case) copy of a correct tag does not verify.
pub(crate) fn decode_lowercase_hex(tag: &str) -> Option<Vec<u8>> {
    if tag.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    hex::decode(tag).ok()
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this can only fail if the crypto
    // backend itself is broken. That is a deployment problem, not request
    // input, and it should stop the process.
    HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length")
}
