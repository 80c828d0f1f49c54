//! The on-disk master-key record (`masterkey.cryptomator`)
//!
//! A JSON object carrying the scrypt parameters and the two wrapped keys:
//! ```json
//! {
//!   "scryptSalt": "base64", "scryptCostParam": 32768, "scryptBlockSize": 8,
//!   "primaryMasterKey": "base64(AES-KW)", "hmacMasterKey": "base64(AES-KW)",
//!   "versionMac": "base64", "version": 7
//! }
//! ```
//! Loaded once per open; read-only thereafter.

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use unvault_core::{VaultError, VaultResult};

/// Flat-layout vault generation.
pub const VERSION_V6: u32 = 6;
/// Subdirectory-layout vault generation.
pub const VERSION_V7: u32 = 7;
/// Sentinel: the real format lives in the signed vault configuration.
/// Observed behavior only — no other sentinel/format pairing is accepted.
pub const VERSION_DEFERRED: u32 = 999;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterKeyRecord {
    pub scrypt_salt: String,
    pub scrypt_cost_param: u64,
    pub scrypt_block_size: u32,
    pub primary_master_key: String,
    pub hmac_master_key: String,
    /// MAC over the version field; carried but not checked when reading.
    #[serde(default)]
    pub version_mac: Option<String>,
    pub version: u32,
}

impl MasterKeyRecord {
    pub fn load(path: &Path) -> VaultResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VaultError::MasterKeyMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| VaultError::MasterKeyMalformed(e.to_string()))
    }
}
