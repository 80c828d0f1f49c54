//! Session lifecycle: unlock, verify, select the layout generation
//!
//! Open order matters: an unverified configuration token is consulted only
//! for the master-key file name, the keys are unlocked, and the token is
//! then verified with the derived signing key before anything else happens.
//! A bad signature means the vault does not open at all.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::{info, warn};

use unvault_core::{FolderEntry, VaultError, VaultResult};
use unvault_crypto::content::{self, CancelToken};
use unvault_crypto::kdf::{self, VaultKeys};
use unvault_crypto::masterkey::{MasterKeyRecord, VERSION_DEFERRED, VERSION_V6, VERSION_V7};
use unvault_crypto::names::NameCipher;
use unvault_crypto::vaultconfig::{VaultConfigToken, CIPHER_COMBO_CTRMAC, FORMAT_V8};

use crate::layout::{DirLayout, FlatLayout, SubdirLayout};
use crate::resolver::Resolver;

pub const MASTER_KEY_FILE: &str = "masterkey.cryptomator";
pub const VAULT_CONFIG_FILE: &str = "vault.cryptomator";

/// An opened, read-only vault session.
///
/// Immutable after open; safe to share across threads for concurrent
/// read-only use. Never writes to the vault.
pub struct Vault {
    keys: VaultKeys,
    resolver: Resolver,
}

impl Vault {
    /// Unlock a vault: derive and unwrap keys, verify the configuration
    /// token when present, and select the traversal layout.
    pub fn open(vault_path: &Path, password: &SecretString) -> VaultResult<Self> {
        let config_path = vault_path.join(VAULT_CONFIG_FILE);
        let token = if config_path.is_file() {
            Some(VaultConfigToken::load(&config_path)?)
        } else {
            None
        };

        let master_key_path = match &token {
            Some(token) => vault_path.join(token.master_key_file()?),
            None => vault_path.join(MASTER_KEY_FILE),
        };
        let record = MasterKeyRecord::load(&master_key_path)?;
        let keys = kdf::unlock(&record, password)?;

        if let Some(token) = &token {
            token.verify(&keys.config_token_key())?;
            if let Some(combo) = token.claims.cipher_combo.as_deref() {
                if combo != CIPHER_COMBO_CTRMAC {
                    warn!(
                        cipher_combo = combo,
                        "vault declares an unexpected cipher combination; file contents may not decrypt"
                    );
                }
            }
        }

        let layout: Box<dyn DirLayout> = match record.version {
            VERSION_V6 => Box::new(FlatLayout),
            VERSION_V7 => Box::new(SubdirLayout),
            VERSION_DEFERRED => {
                let token = token.as_ref().ok_or_else(|| {
                    VaultError::VaultConfigInvalid(
                        "master key defers to a vault configuration that is missing".to_string(),
                    )
                })?;
                // Format 8 kept the v7 tree layout unchanged
                if token.claims.format == FORMAT_V8 {
                    Box::new(SubdirLayout)
                } else {
                    return Err(VaultError::UnsupportedVaultFormat(token.claims.format));
                }
            }
            version => return Err(VaultError::UnsupportedVaultVersion(version)),
        };

        let names = NameCipher::new(keys.siv_key());
        let resolver = Resolver::new(vault_path.to_path_buf(), names, layout)?;
        info!(
            vault = %vault_path.display(),
            version = record.version,
            "vault unlocked"
        );
        Ok(Self { keys, resolver })
    }

    /// Child folders of a virtual directory, with a lazy-population probe.
    pub fn list_folders(&self, virtual_dir: &str) -> VaultResult<Vec<FolderEntry>> {
        self.resolver.list_folders(virtual_dir)
    }

    /// Virtual paths of the child folders only.
    pub fn list_dirs(&self, virtual_dir: &str) -> VaultResult<Vec<String>> {
        Ok(self
            .list_folders(virtual_dir)?
            .into_iter()
            .map(|folder| folder.virtual_path)
            .collect())
    }

    /// Virtual paths of the files directly inside a virtual directory.
    pub fn list_files(&self, virtual_dir: &str) -> VaultResult<Vec<String>> {
        self.resolver.list_files(virtual_dir)
    }

    /// Physical (encrypted) file backing a virtual file path.
    pub fn resolve_physical_path(&self, virtual_file: &str) -> VaultResult<PathBuf> {
        self.resolver.find_file(virtual_file)
    }

    /// Decrypt a file into any writer. Returns plaintext bytes written; on
    /// failure the sink holds only chunks that verified, and the caller must
    /// discard them.
    pub fn decrypt_to_writer<W: Write>(&self, virtual_file: &str, sink: &mut W) -> VaultResult<u64> {
        self.decrypt_to_writer_with_cancel(virtual_file, sink, &CancelToken::new())
    }

    /// [`Self::decrypt_to_writer`] with a cooperative cancellation token,
    /// checked at every chunk boundary.
    pub fn decrypt_to_writer_with_cancel<W: Write>(
        &self,
        virtual_file: &str,
        sink: &mut W,
        cancel: &CancelToken,
    ) -> VaultResult<u64> {
        let physical = self.resolver.find_file(virtual_file)?;
        let mut reader = BufReader::new(File::open(&physical)?);
        content::decrypt_stream(&self.keys, &mut reader, sink, cancel)
    }

    /// Decrypt a file to a local path. A partially written destination is
    /// removed when decryption fails, so no unauthenticated or truncated
    /// plaintext is left behind.
    pub fn decrypt_to_file(&self, virtual_file: &str, out_path: &Path) -> VaultResult<u64> {
        let mut writer = BufWriter::new(File::create(out_path)?);
        match self.decrypt_to_writer(virtual_file, &mut writer) {
            Ok(written) => {
                info!(virtual_file, bytes = written, "decrypted");
                Ok(written)
            }
            Err(e) => {
                drop(writer);
                let _ = std::fs::remove_file(out_path);
                Err(e)
            }
        }
    }
}
