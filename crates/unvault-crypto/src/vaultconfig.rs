//! Signed vault-configuration token (`vault.cryptomator`)
//!
//! Three dot-separated base64url segments: header, claims, signature.
//! Structurally a signed token, but restricted to HMAC-SHA-{256,384,512};
//! the signing key is master‖mac, derived from the already-unwrapped vault
//! keys rather than from the password. The header's `kid` names the
//! master-key file, which may redirect away from the default name.

use std::path::Path;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Sha256, Sha384, Sha512};

use unvault_core::{VaultError, VaultResult};

use crate::codec;
use crate::SIV_KEY_SIZE;

/// Vault format accepted when the master-key file defers (version 999).
pub const FORMAT_V8: u32 = 8;

/// Cipher combination this reader can stream-decrypt.
pub const CIPHER_COMBO_CTRMAC: &str = "SIV_CTRMAC";

const KID_SCHEME: &str = "masterkeyfile";

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfigHeader {
    /// Key identifier, `masterkeyfile:<relative path>`.
    pub kid: String,
    #[serde(default)]
    pub typ: Option<String>,
    /// Signature algorithm name, e.g. `HS256`.
    pub alg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigClaims {
    pub format: u32,
    #[serde(default)]
    pub shortening_threshold: Option<u32>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub cipher_combo: Option<String>,
}

/// A parsed (not yet verified) vault-configuration token.
#[derive(Debug, Clone)]
pub struct VaultConfigToken {
    pub header: VaultConfigHeader,
    pub claims: VaultConfigClaims,
    signing_input: String,
    signature: Vec<u8>,
}

impl VaultConfigToken {
    pub fn load(path: &Path) -> VaultResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(token: &str) -> VaultResult<Self> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => {
                    return Err(VaultError::VaultConfigInvalid(
                        "expected three dot-separated segments".to_string(),
                    ));
                }
            };

        let header_json = codec::b64url_nopad_decode(header_b64)
            .map_err(|e| VaultError::VaultConfigInvalid(format!("header encoding: {e}")))?;
        let header: VaultConfigHeader = serde_json::from_slice(&header_json)
            .map_err(|e| VaultError::VaultConfigInvalid(format!("header: {e}")))?;

        let claims_json = codec::b64url_nopad_decode(claims_b64)
            .map_err(|e| VaultError::VaultConfigInvalid(format!("claims encoding: {e}")))?;
        let claims: VaultConfigClaims = serde_json::from_slice(&claims_json)
            .map_err(|e| VaultError::VaultConfigInvalid(format!("claims: {e}")))?;

        let signature = codec::b64url_nopad_decode(signature_b64)
            .map_err(|e| VaultError::VaultConfigInvalid(format!("signature encoding: {e}")))?;

        Ok(Self {
            header,
            claims,
            signing_input: format!("{header_b64}.{claims_b64}"),
            signature,
        })
    }

    /// Master-key file named by `kid`, relative to the vault root.
    pub fn master_key_file(&self) -> VaultResult<&str> {
        match self.header.kid.split_once(':') {
            Some((KID_SCHEME, rel)) if !rel.is_empty() => Ok(rel),
            _ => Err(VaultError::VaultConfigInvalid(format!(
                "unsupported key id {:?}",
                self.header.kid
            ))),
        }
    }

    /// Verify the token's HMAC with the master‖mac signing key. The vault
    /// must not be opened when this fails.
    pub fn verify(&self, key: &[u8; SIV_KEY_SIZE]) -> VaultResult<()> {
        match self.header.alg.as_str() {
            "HS256" => self.verify_with::<Hmac<Sha256>>(key),
            "HS384" => self.verify_with::<Hmac<Sha384>>(key),
            "HS512" => self.verify_with::<Hmac<Sha512>>(key),
            other => Err(VaultError::VaultConfigUnsupportedAlgorithm(other.to_string())),
        }
    }

    fn verify_with<M: Mac + KeyInit>(&self, key: &[u8]) -> VaultResult<()> {
        let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
        mac.update(self.signing_input.as_bytes());
        mac.verify_slice(&self.signature)
            .map_err(|_| VaultError::VaultConfigSignatureInvalid)
    }
}
