//! Deterministic filename codec and directory-id addressing
//!
//! Filenames are encrypted with AES-SIV keyed by mac‖master. The owning
//! directory's id is the associated data, so a name only decrypts under its
//! own parent: a wrong branch of the tree, or a tampered vault, fails
//! authentication instead of yielding garbage.
//!
//! A directory's physical location is derived from its id alone:
//! `d/` + split2(base32(sha1(siv_seal(id)))). The root's id is the empty
//! string, so the root shard is computable before any traversal.

use aes_siv::aead::generic_array::GenericArray;
use aes_siv::siv::Aes256Siv;
use aes_siv::KeyInit;
use sha1::{Digest, Sha1};
use zeroize::Zeroize;

use unvault_core::{VaultError, VaultResult};

use crate::codec;
use crate::SIV_KEY_SIZE;

/// AES-SIV filename cipher bound to one vault's siv key.
pub struct NameCipher {
    siv_key: [u8; SIV_KEY_SIZE],
}

impl NameCipher {
    pub fn new(siv_key: [u8; SIV_KEY_SIZE]) -> Self {
        Self { siv_key }
    }

    // Aes256Siv seal/open take &mut self, so a fresh instance per call keeps
    // the public API &self and the cipher shareable across threads.
    fn cipher(&self) -> Aes256Siv {
        Aes256Siv::new(GenericArray::from_slice(&self.siv_key))
    }

    /// Deterministically encrypt a display name under its directory's id.
    pub fn encrypt_name(&self, name: &str, dir_id: &str) -> VaultResult<Vec<u8>> {
        self.cipher()
            .encrypt([dir_id.as_bytes()], name.as_bytes())
            .map_err(|_| VaultError::IntegrityCheckFailed("filename seal"))
    }

    /// Decrypt and authenticate a raw name ciphertext under its directory's id.
    pub fn decrypt_name(&self, ciphertext: &[u8], dir_id: &str) -> VaultResult<String> {
        let plaintext = self
            .cipher()
            .decrypt([dir_id.as_bytes()], ciphertext)
            .map_err(|_| VaultError::IntegrityCheckFailed("filename authentication"))?;
        String::from_utf8(plaintext)
            .map_err(|_| VaultError::IntegrityCheckFailed("filename utf-8"))
    }

    /// Seal a directory id with no associated data. Input to shard addressing.
    pub fn seal_dir_id(&self, dir_id: &str) -> VaultResult<Vec<u8>> {
        self.cipher()
            .encrypt(std::iter::empty::<&[u8]>(), dir_id.as_bytes())
            .map_err(|_| VaultError::IntegrityCheckFailed("directory id seal"))
    }

    /// Shard location of a directory id: `(first two chars, remaining 30)`
    /// of base32(sha1(seal(id))), joined under `d/` by the caller.
    pub fn dir_id_shard(&self, dir_id: &str) -> VaultResult<(String, String)> {
        let sealed = self.seal_dir_id(dir_id)?;
        let digest = Sha1::digest(&sealed);
        let encoded = codec::base32_encode(&digest);
        Ok((encoded[..2].to_string(), encoded[2..].to_string()))
    }
}

impl Drop for NameCipher {
    fn drop(&mut self) {
        self.siv_key.zeroize();
    }
}

impl std::fmt::Debug for NameCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameCipher")
            .field("siv_key", &"[REDACTED]")
            .finish()
    }
}
