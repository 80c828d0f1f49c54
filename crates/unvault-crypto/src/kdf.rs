//! Key derivation: password → scrypt KEK → unwrapped vault keys
//!
//! The master-key record stores both vault keys wrapped with RFC 3394 AES
//! key wrap under a KEK derived from the password. The wrap algorithm carries
//! its own integrity check, so a failed unwrap is the practical signal for a
//! wrong password.

use aes::Aes256;
use aes_kw::Kek;
use scrypt::Params;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use zeroize::Zeroize;

use unvault_core::{VaultError, VaultResult};

use crate::codec;
use crate::masterkey::MasterKeyRecord;
use crate::{KEY_SIZE, SIV_KEY_SIZE};

const WRAPPED_KEY_LEN: usize = KEY_SIZE + 8;

/// The unwrapped key material of an opened vault.
///
/// Derived once per session, immutable, held only in memory. Zeroized on
/// drop so secrets do not linger.
pub struct VaultKeys {
    master_key: [u8; KEY_SIZE],
    mac_key: [u8; KEY_SIZE],
}

impl VaultKeys {
    pub fn new(master_key: [u8; KEY_SIZE], mac_key: [u8; KEY_SIZE]) -> Self {
        Self { master_key, mac_key }
    }

    pub fn master_key(&self) -> &[u8; KEY_SIZE] {
        &self.master_key
    }

    pub fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac_key
    }

    /// AES-SIV requires a double-length key: mac key first, then master key.
    pub fn siv_key(&self) -> [u8; SIV_KEY_SIZE] {
        let mut key = [0u8; SIV_KEY_SIZE];
        key[..KEY_SIZE].copy_from_slice(&self.mac_key);
        key[KEY_SIZE..].copy_from_slice(&self.master_key);
        key
    }

    /// Signing key for the vault-configuration token: master key first.
    pub fn config_token_key(&self) -> [u8; SIV_KEY_SIZE] {
        let mut key = [0u8; SIV_KEY_SIZE];
        key[..KEY_SIZE].copy_from_slice(&self.master_key);
        key[KEY_SIZE..].copy_from_slice(&self.mac_key);
        key
    }
}

impl Drop for VaultKeys {
    fn drop(&mut self) {
        self.master_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl std::fmt::Debug for VaultKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKeys")
            .field("master_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the 256-bit key-encryption key with scrypt (p = 1).
///
/// The record stores the cost parameter N itself, not its log; N must be a
/// power of two.
pub fn derive_kek(
    password: &SecretString,
    salt: &[u8],
    cost_param: u64,
    block_size: u32,
) -> VaultResult<[u8; KEY_SIZE]> {
    if cost_param < 2 || !cost_param.is_power_of_two() {
        return Err(VaultError::MasterKeyMalformed(format!(
            "scrypt cost parameter {cost_param} is not a power of two"
        )));
    }
    let log_n = cost_param.trailing_zeros() as u8;
    let params = Params::new(log_n, block_size, 1, KEY_SIZE)
        .map_err(|e| VaultError::MasterKeyMalformed(format!("scrypt parameters rejected: {e}")))?;

    let mut kek = [0u8; KEY_SIZE];
    scrypt::scrypt(password.expose_secret().as_bytes(), salt, &params, &mut kek)
        .map_err(|e| VaultError::MasterKeyMalformed(format!("scrypt output length: {e}")))?;
    Ok(kek)
}

/// Unwrap a single RFC 3394-wrapped 256-bit key.
///
/// An integrity failure here almost always means the password was wrong.
pub fn unwrap_key(kek: &[u8; KEY_SIZE], wrapped: &[u8]) -> VaultResult<[u8; KEY_SIZE]> {
    if wrapped.len() != WRAPPED_KEY_LEN {
        return Err(VaultError::MasterKeyMalformed(format!(
            "wrapped key is {} bytes, expected {WRAPPED_KEY_LEN}",
            wrapped.len()
        )));
    }
    let kek = Kek::<Aes256>::from(*kek);
    let mut key = [0u8; KEY_SIZE];
    kek.unwrap(wrapped, &mut key)
        .map_err(|_| VaultError::WrongPasswordOrCorruptKey)?;
    Ok(key)
}

/// Unlock a master-key record: derive the KEK and unwrap both vault keys.
pub fn unlock(record: &MasterKeyRecord, password: &SecretString) -> VaultResult<VaultKeys> {
    let salt = codec::b64_decode(&record.scrypt_salt)
        .map_err(|e| VaultError::MasterKeyMalformed(format!("scrypt salt: {e}")))?;
    let wrapped_primary = codec::b64_decode(&record.primary_master_key)
        .map_err(|e| VaultError::MasterKeyMalformed(format!("primary master key: {e}")))?;
    let wrapped_mac = codec::b64_decode(&record.hmac_master_key)
        .map_err(|e| VaultError::MasterKeyMalformed(format!("hmac master key: {e}")))?;

    let mut kek = derive_kek(
        password,
        &salt,
        record.scrypt_cost_param,
        record.scrypt_block_size,
    )?;
    let unwrapped = unwrap_key(&kek, &wrapped_primary)
        .and_then(|master| unwrap_key(&kek, &wrapped_mac).map(|mac| (master, mac)));
    kek.zeroize();

    let (master_key, mac_key) = unwrapped?;
    debug!(version = record.version, "vault keys unwrapped");
    Ok(VaultKeys::new(master_key, mac_key))
}
