//! Encoding helpers shared across the vault formats.
//!
//! The master-key record uses plain base64; subdirectory-layout filenames use
//! url-safe base64 with padding; vault-configuration token segments use
//! url-safe base64 without padding; flat-layout filenames and directory
//! shards use RFC 4648 base32.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use data_encoding::BASE32;

pub fn b64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn b64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(input)
}

pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

pub fn b64url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE.decode(input)
}

pub fn b64url_nopad_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64url_nopad_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input)
}

pub fn base32_encode(data: &[u8]) -> String {
    BASE32.encode(data)
}

pub fn base32_decode(input: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
    BASE32.decode(input.as_bytes())
}
