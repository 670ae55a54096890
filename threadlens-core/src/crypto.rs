//! Decryption of sealed mapping blobs.
//!
//! Wire format: `nonce (12 bytes) || AES-256-GCM ciphertext (tag included)`.
//! The plaintext is gzip-compressed UTF-8 JSON. The 32-byte key travels in
//! the URL fragment as URL-safe base64 without padding, so it never reaches
//! the server that stores the blob.

use std::io::Read;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use flate2::read::GzDecoder;

use crate::error::RetrieveError;

pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Splits `url#key` into the fetchable URL and the optional key fragment.
pub fn split_key(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, key)) if !key.is_empty() => (base, Some(key)),
        Some((base, _)) => (base, None),
        None => (url, None),
    }
}

/// Decodes a base64url key, tolerating trailing padding.
///
/// # Errors
///
/// `InvalidKey` unless the key decodes to exactly [`KEY_LEN`] bytes.
pub fn decode_key(key_b64: &str) -> Result<[u8; KEY_LEN], RetrieveError> {
    let trimmed = key_b64.trim();
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed.trim_end_matches('='))
        .or_else(|_| URL_SAFE.decode(trimmed))
        .map_err(|_| RetrieveError::InvalidKey)?;
    bytes.try_into().map_err(|_| RetrieveError::InvalidKey)
}

/// Decrypts and inflates a sealed blob, returning the plaintext bytes.
///
/// # Errors
///
/// - `InvalidKey` if the key is not 32 bytes of base64url.
/// - `InvalidBlob` if the blob cannot hold a nonce.
/// - `DecryptFailure` if authentication fails (wrong key or tampered data).
/// - `Decompress` if the plaintext is not gzip.
pub fn open_blob(blob: &[u8], key_b64: &str) -> Result<Vec<u8>, RetrieveError> {
    let key = decode_key(key_b64)?;
    if blob.len() < NONCE_LEN {
        return Err(RetrieveError::InvalidBlob);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| RetrieveError::InvalidKey)?;
    let compressed = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| RetrieveError::DecryptFailure)?;

    gunzip(&compressed)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, RetrieveError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(RetrieveError::Decompress)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_key_handles_missing_and_empty_fragment() {
        assert_eq!(split_key("https://a.test/blob/x#k"), ("https://a.test/blob/x", Some("k")));
        assert_eq!(split_key("https://a.test/blob/x#"), ("https://a.test/blob/x", None));
        assert_eq!(split_key("https://a.test/gm/x"), ("https://a.test/gm/x", None));
    }

    #[test]
    fn short_key_is_rejected() {
        let key = URL_SAFE_NO_PAD.encode([7u8; 16]);
        assert!(matches!(decode_key(&key), Err(RetrieveError::InvalidKey)));
    }

    #[test]
    fn padded_key_is_accepted() {
        let key = URL_SAFE.encode([7u8; KEY_LEN]);
        assert_eq!(decode_key(&key).unwrap(), [7u8; KEY_LEN]);
    }
}
