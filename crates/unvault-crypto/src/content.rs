//! Streaming authenticated decryption of file bodies
//!
//! Encrypted file format (binary, bit-exact):
//! ```text
//! header: [16-byte nonce][40-byte ciphertext payload][32-byte HMAC-SHA256 tag]
//!         payload plaintext bytes 8..40 are the per-file content key
//! body:   chunks of [16-byte chunk nonce][<=32768-byte ciphertext][32-byte tag]
//! ```
//! Header MAC input: `nonce ‖ payload`. Chunk `i` MAC input:
//! `header nonce ‖ i as u64 BE ‖ chunk nonce ‖ ciphertext`. Both are keyed by
//! the mac key and verified before any decryption, so unauthenticated
//! plaintext is never released. The payload and the chunks decrypt with
//! AES-256-CTR (128-bit counter block) under the master key and the content
//! key respectively.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use unvault_core::{VaultError, VaultResult};

use crate::kdf::VaultKeys;
use crate::KEY_SIZE;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const HEADER_NONCE_LEN: usize = 16;
pub const HEADER_PAYLOAD_LEN: usize = 40;
pub const MAC_LEN: usize = 32;
pub const HEADER_LEN: usize = HEADER_NONCE_LEN + HEADER_PAYLOAD_LEN + MAC_LEN;

pub const CHUNK_NONCE_LEN: usize = 16;
pub const CHUNK_PLAINTEXT_LEN: usize = 32 * 1024;
pub const CHUNK_OVERHEAD: usize = CHUNK_NONCE_LEN + MAC_LEN;
pub const CHUNK_CIPHERTEXT_LEN: usize = CHUNK_PLAINTEXT_LEN + CHUNK_OVERHEAD;

/// Cooperative cancellation flag, checked once per chunk. Clone freely and
/// flip from another thread; the decrypt loop stops at the next chunk
/// boundary with [`VaultError::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A verified, decrypted file header: the nonce and the per-file content key.
pub struct FileHeader {
    nonce: [u8; HEADER_NONCE_LEN],
    content_key: [u8; KEY_SIZE],
}

impl FileHeader {
    pub fn nonce(&self) -> &[u8; HEADER_NONCE_LEN] {
        &self.nonce
    }

    pub fn content_key(&self) -> &[u8; KEY_SIZE] {
        &self.content_key
    }
}

impl Drop for FileHeader {
    fn drop(&mut self) {
        self.content_key.zeroize();
    }
}

impl std::fmt::Debug for FileHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHeader")
            .field("nonce", &self.nonce)
            .field("content_key", &"[REDACTED]")
            .finish()
    }
}

fn mac_keyed(mac_key: &[u8; KEY_SIZE]) -> HmacSha256 {
    HmacSha256::new_from_slice(mac_key).expect("HMAC accepts keys of any length")
}

fn aes_ctr(key: &[u8; KEY_SIZE], nonce: &[u8], buf: &mut [u8]) {
    let mut cipher = Aes256Ctr::new(key.into(), GenericArray::from_slice(nonce));
    cipher.apply_keystream(buf);
}

/// Verify and decrypt a raw 88-byte file header.
pub fn decrypt_header(raw: &[u8], keys: &VaultKeys) -> VaultResult<FileHeader> {
    if raw.len() != HEADER_LEN {
        return Err(VaultError::IntegrityCheckFailed("truncated file header"));
    }
    let (nonce, rest) = raw.split_at(HEADER_NONCE_LEN);
    let (payload, tag) = rest.split_at(HEADER_PAYLOAD_LEN);

    let mut mac = mac_keyed(keys.mac_key());
    mac.update(nonce);
    mac.update(payload);
    mac.verify_slice(tag)
        .map_err(|_| VaultError::IntegrityCheckFailed("file header"))?;

    let mut cleartext = [0u8; HEADER_PAYLOAD_LEN];
    cleartext.copy_from_slice(payload);
    aes_ctr(keys.master_key(), nonce, &mut cleartext);

    // Bytes 0..8 of the payload are reserved; 8..40 are the content key.
    let mut content_key = [0u8; KEY_SIZE];
    content_key.copy_from_slice(&cleartext[8..HEADER_PAYLOAD_LEN]);
    cleartext.zeroize();

    let mut header_nonce = [0u8; HEADER_NONCE_LEN];
    header_nonce.copy_from_slice(nonce);
    Ok(FileHeader {
        nonce: header_nonce,
        content_key,
    })
}

/// Decrypt a whole encrypted file from `reader` into `writer`, one chunk at
/// a time. Returns the number of plaintext bytes written.
///
/// Every chunk is authenticated before its plaintext leaves this function;
/// on any mismatch the call fails with [`VaultError::IntegrityCheckFailed`]
/// and the caller must discard whatever was already written.
pub fn decrypt_stream<R, W>(
    keys: &VaultKeys,
    reader: &mut R,
    writer: &mut W,
    cancel: &CancelToken,
) -> VaultResult<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut header_raw = [0u8; HEADER_LEN];
    if read_full(reader, &mut header_raw)? != HEADER_LEN {
        return Err(VaultError::IntegrityCheckFailed("truncated file header"));
    }
    let header = decrypt_header(&header_raw, keys)?;

    let mut chunk = vec![0u8; CHUNK_CIPHERTEXT_LEN];
    let mut written = 0u64;
    for index in 0u64.. {
        if cancel.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        let n = read_full(reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        if n < CHUNK_OVERHEAD {
            return Err(VaultError::IntegrityCheckFailed("truncated content chunk"));
        }
        let (nonce, rest) = chunk[..n].split_at(CHUNK_NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - MAC_LEN);

        let mut mac = mac_keyed(keys.mac_key());
        mac.update(header.nonce());
        mac.update(&index.to_be_bytes());
        mac.update(nonce);
        mac.update(ciphertext);
        mac.verify_slice(tag)
            .map_err(|_| VaultError::IntegrityCheckFailed("content chunk"))?;

        let mut plaintext = ciphertext.to_vec();
        aes_ctr(header.content_key(), nonce, &mut plaintext);
        writer.write_all(&plaintext)?;
        written += plaintext.len() as u64;
        plaintext.zeroize();
    }
    writer.flush()?;
    Ok(written)
}

/// Plaintext size of an encrypted file, computed from its on-disk length.
/// `None` when the length cannot belong to a well-formed file.
pub fn plaintext_len(encrypted_len: u64) -> Option<u64> {
    let body = encrypted_len.checked_sub(HEADER_LEN as u64)?;
    let full = body / CHUNK_CIPHERTEXT_LEN as u64;
    let tail = body % CHUNK_CIPHERTEXT_LEN as u64;
    if tail != 0 && tail < CHUNK_OVERHEAD as u64 {
        return None;
    }
    let tail_plaintext = tail.saturating_sub(CHUNK_OVERHEAD as u64);
    Some(full * CHUNK_PLAINTEXT_LEN as u64 + tail_plaintext)
}

/// Encrypt `plaintext` into the on-disk file format with fresh random
/// nonces and content key. Fixture support for tests and tooling; the
/// session API exposes no write path.
pub fn encrypt_bytes(keys: &VaultKeys, plaintext: &[u8]) -> Vec<u8> {
    let mut rng = rand::thread_rng();

    let mut header_nonce = [0u8; HEADER_NONCE_LEN];
    rng.fill_bytes(&mut header_nonce);
    let mut content_key = [0u8; KEY_SIZE];
    rng.fill_bytes(&mut content_key);

    let mut payload = [0u8; HEADER_PAYLOAD_LEN];
    payload[..8].fill(0xFF);
    payload[8..].copy_from_slice(&content_key);
    aes_ctr(keys.master_key(), &header_nonce, &mut payload);

    let mut mac = mac_keyed(keys.mac_key());
    mac.update(&header_nonce);
    mac.update(&payload);
    let header_tag = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(HEADER_LEN + plaintext.len() + CHUNK_OVERHEAD);
    out.extend_from_slice(&header_nonce);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&header_tag);

    for (index, block) in plaintext.chunks(CHUNK_PLAINTEXT_LEN).enumerate() {
        let mut chunk_nonce = [0u8; CHUNK_NONCE_LEN];
        rng.fill_bytes(&mut chunk_nonce);

        let mut ciphertext = block.to_vec();
        aes_ctr(&content_key, &chunk_nonce, &mut ciphertext);

        let mut mac = mac_keyed(keys.mac_key());
        mac.update(&header_nonce);
        mac.update(&(index as u64).to_be_bytes());
        mac.update(&chunk_nonce);
        mac.update(&ciphertext);
        let tag = mac.finalize().into_bytes();

        out.extend_from_slice(&chunk_nonce);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&tag);
    }

    content_key.zeroize();
    out
}

fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> VaultKeys {
        VaultKeys::new([0x11u8; KEY_SIZE], [0x22u8; KEY_SIZE])
    }

    fn decrypt_all(keys: &VaultKeys, encrypted: &[u8]) -> VaultResult<Vec<u8>> {
        let mut out = Vec::new();
        decrypt_stream(keys, &mut &encrypted[..], &mut out, &CancelToken::new())?;
        Ok(out)
    }

    #[test]
    fn roundtrip_small() {
        let keys = test_keys();
        let encrypted = encrypt_bytes(&keys, b"hello vault");
        assert_eq!(decrypt_all(&keys, &encrypted).unwrap(), b"hello vault");
    }

    #[test]
    fn roundtrip_empty_file_has_header_only() {
        let keys = test_keys();
        let encrypted = encrypt_bytes(&keys, b"");
        assert_eq!(encrypted.len(), HEADER_LEN);
        assert_eq!(decrypt_all(&keys, &encrypted).unwrap(), b"");
    }

    #[test]
    fn roundtrip_across_chunk_boundaries() {
        let keys = test_keys();
        for len in [1, CHUNK_PLAINTEXT_LEN - 1, CHUNK_PLAINTEXT_LEN, CHUNK_PLAINTEXT_LEN + 1] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let encrypted = encrypt_bytes(&keys, &plaintext);
            assert_eq!(decrypt_all(&keys, &encrypted).unwrap(), plaintext, "len {len}");
        }
    }

    #[test]
    fn header_tamper_is_rejected_before_any_output() {
        let keys = test_keys();
        let mut encrypted = encrypt_bytes(&keys, b"some content");
        encrypted[HEADER_NONCE_LEN + 3] ^= 0x01;

        let mut out = Vec::new();
        let result = decrypt_stream(&keys, &mut &encrypted[..], &mut out, &CancelToken::new());
        assert!(matches!(result, Err(VaultError::IntegrityCheckFailed(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn chunk_tamper_stops_at_last_verified_chunk() {
        let keys = test_keys();
        let plaintext: Vec<u8> = (0..CHUNK_PLAINTEXT_LEN + 500).map(|i| (i % 199) as u8).collect();
        let mut encrypted = encrypt_bytes(&keys, &plaintext);

        // Flip a ciphertext byte inside the second chunk
        let second_chunk = HEADER_LEN + CHUNK_CIPHERTEXT_LEN + CHUNK_NONCE_LEN + 10;
        encrypted[second_chunk] ^= 0xFF;

        let mut out = Vec::new();
        let result = decrypt_stream(&keys, &mut &encrypted[..], &mut out, &CancelToken::new());
        assert!(matches!(result, Err(VaultError::IntegrityCheckFailed("content chunk"))));
        assert_eq!(out, &plaintext[..CHUNK_PLAINTEXT_LEN]);
    }

    #[test]
    fn tag_tamper_is_rejected() {
        let keys = test_keys();
        let mut encrypted = encrypt_bytes(&keys, b"tagged");
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x80;
        assert!(matches!(
            decrypt_all(&keys, &encrypted),
            Err(VaultError::IntegrityCheckFailed("content chunk"))
        ));
    }

    #[test]
    fn wrong_keys_fail_header_check() {
        let encrypted = encrypt_bytes(&test_keys(), b"content");
        let other = VaultKeys::new([0x33u8; KEY_SIZE], [0x44u8; KEY_SIZE]);
        assert!(matches!(
            decrypt_all(&other, &encrypted),
            Err(VaultError::IntegrityCheckFailed("file header"))
        ));
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        let keys = test_keys();
        let encrypted = encrypt_bytes(&keys, b"0123456789");
        let truncated = &encrypted[..encrypted.len() - 20];
        assert!(matches!(
            decrypt_all(&keys, truncated),
            Err(VaultError::IntegrityCheckFailed(_))
        ));
    }

    #[test]
    fn cancellation_stops_before_first_chunk() {
        let keys = test_keys();
        let encrypted = encrypt_bytes(&keys, b"never delivered");
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut out = Vec::new();
        let result = decrypt_stream(&keys, &mut &encrypted[..], &mut out, &cancel);
        assert!(matches!(result, Err(VaultError::Cancelled)));
        assert!(out.is_empty());
    }

    #[test]
    fn plaintext_len_matches_encrypt_arithmetic() {
        let keys = test_keys();
        for len in [0usize, 1, 100, CHUNK_PLAINTEXT_LEN, CHUNK_PLAINTEXT_LEN * 2 + 77] {
            let encrypted = encrypt_bytes(&keys, &vec![0u8; len]);
            assert_eq!(plaintext_len(encrypted.len() as u64), Some(len as u64), "len {len}");
        }
        // Shorter than a header cannot be a vault file
        assert_eq!(plaintext_len(10), None);
        // A dangling 10-byte tail cannot hold a nonce and a tag
        assert_eq!(plaintext_len(HEADER_LEN as u64 + 10), None);
    }
}
