//! Synthetic vault construction shared by the integration tests.
//!
//! Fixtures are built with the engine's own primitives plus a handful of
//! dev-dependencies (AES-KW wrap, HMAC token signing) so every byte on disk
//! matches the formats the reader expects.

#![allow(dead_code)] // each test binary uses a subset of the helpers

use std::path::{Path, PathBuf};

use aes::Aes256;
use aes_kw::Kek;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use data_encoding::BASE32;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha384, Sha512};

use unvault_crypto::content;
use unvault_crypto::kdf::{self, VaultKeys};
use unvault_crypto::names::NameCipher;

pub const PASSWORD: &str = "correcthorsebatterystaple";
pub const MASTER: [u8; 32] = [0x11; 32];
pub const MAC: [u8; 32] = [0x22; 32];

const SALT: [u8; 16] = [0x5A; 16];
// Tiny scrypt cost so the suite stays fast
const SCRYPT_COST: u64 = 16;
const SCRYPT_BLOCK: u32 = 8;

pub fn keys() -> VaultKeys {
    VaultKeys::new(MASTER, MAC)
}

pub fn names() -> NameCipher {
    NameCipher::new(keys().siv_key())
}

pub fn password() -> SecretString {
    SecretString::from(PASSWORD)
}

/// Write a master-key record unlockable with [`PASSWORD`].
pub fn write_master_key(dir: &Path, file_name: &str, version: u32) {
    let kek = kdf::derive_kek(&password(), &SALT, SCRYPT_COST, SCRYPT_BLOCK).unwrap();
    let kek = Kek::<Aes256>::from(kek);
    let mut wrapped_primary = [0u8; 40];
    kek.wrap(&MASTER, &mut wrapped_primary).unwrap();
    let mut wrapped_mac = [0u8; 40];
    kek.wrap(&MAC, &mut wrapped_mac).unwrap();

    let record = serde_json::json!({
        "scryptSalt": STANDARD.encode(SALT),
        "scryptCostParam": SCRYPT_COST,
        "scryptBlockSize": SCRYPT_BLOCK,
        "primaryMasterKey": STANDARD.encode(wrapped_primary),
        "hmacMasterKey": STANDARD.encode(wrapped_mac),
        "versionMac": STANDARD.encode([0u8; 32]),
        "version": version,
    });
    if let Some(parent) = dir.join(file_name).parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(
        dir.join(file_name),
        serde_json::to_string_pretty(&record).unwrap(),
    )
    .unwrap();
}

fn hmac_sign<M: Mac + KeyInit>(key: &[u8], input: &str) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).unwrap();
    mac.update(input.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Sign and write a vault-configuration token whose `kid` names
/// `masterkey_file`.
pub fn write_vault_config(dir: &Path, alg: &str, format: u32, masterkey_file: &str, key: &[u8]) {
    let header =
        format!(r#"{{"kid":"masterkeyfile:{masterkey_file}","typ":"JWT","alg":"{alg}"}}"#);
    let claims = format!(
        r#"{{"format":{format},"shorteningThreshold":220,"jti":"fixture","cipherCombo":"SIV_CTRMAC"}}"#
    );
    let input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );
    let signature = match alg {
        "HS256" => hmac_sign::<Hmac<Sha256>>(key, &input),
        "HS384" => hmac_sign::<Hmac<Sha384>>(key, &input),
        "HS512" => hmac_sign::<Hmac<Sha512>>(key, &input),
        other => panic!("fixture cannot sign with {other}"),
    };
    std::fs::write(
        dir.join("vault.cryptomator"),
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature)),
    )
    .unwrap();
}

pub fn fresh_dir_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Builds subdirectory-layout (v7/v8) vault trees.
pub struct V7Builder {
    pub root: PathBuf,
}

impl V7Builder {
    /// A v7 vault with its master-key record and root shard in place.
    pub fn new(root: &Path) -> Self {
        write_master_key(root, "masterkey.cryptomator", 7);
        Self::bare(root)
    }

    /// Only the tree, no master-key record; for v8 fixtures that add their
    /// own record and configuration token.
    pub fn bare(root: &Path) -> Self {
        let builder = Self {
            root: root.to_path_buf(),
        };
        builder.create_shard("");
        builder
    }

    pub fn shard(&self, dir_id: &str) -> PathBuf {
        let (hi, rest) = names().dir_id_shard(dir_id).unwrap();
        self.root.join("d").join(hi).join(rest)
    }

    fn create_shard(&self, dir_id: &str) -> PathBuf {
        let shard = self.shard(dir_id);
        std::fs::create_dir_all(&shard).unwrap();
        shard
    }

    fn encrypted_name(&self, name: &str, parent_id: &str) -> String {
        let ciphertext = names().encrypt_name(name, parent_id).unwrap();
        format!("{}.c9r", URL_SAFE.encode(ciphertext))
    }

    pub fn add_dir(&self, parent_id: &str, name: &str, dir_id: &str) {
        let entry = self.shard(parent_id).join(self.encrypted_name(name, parent_id));
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("dir.c9r"), dir_id).unwrap();
        self.create_shard(dir_id);
    }

    /// Returns the physical path of the written content file.
    pub fn add_file(&self, parent_id: &str, name: &str, contents: &[u8]) -> PathBuf {
        let entry = self.shard(parent_id).join(self.encrypted_name(name, parent_id));
        std::fs::write(&entry, content::encrypt_bytes(&keys(), contents)).unwrap();
        entry
    }

    /// Store a file through the long-name container mechanism regardless of
    /// the name's actual length.
    pub fn add_long_file(&self, parent_id: &str, name: &str, contents: &[u8]) -> PathBuf {
        let full = self.encrypted_name(name, parent_id);
        let container = self.long_container(parent_id, &full);
        std::fs::write(container.join("name.c9s"), format!("{full}\n")).unwrap();
        let content_file = container.join("contents.c9r");
        std::fs::write(&content_file, content::encrypt_bytes(&keys(), contents)).unwrap();
        content_file
    }

    pub fn add_long_dir(&self, parent_id: &str, name: &str, dir_id: &str) {
        let full = self.encrypted_name(name, parent_id);
        let container = self.long_container(parent_id, &full);
        std::fs::write(container.join("name.c9s"), format!("{full}\n")).unwrap();
        std::fs::write(container.join("dir.c9r"), dir_id).unwrap();
        self.create_shard(dir_id);
    }

    fn long_container(&self, parent_id: &str, full_name: &str) -> PathBuf {
        let hash = BASE32.encode(&Sha1::digest(full_name.as_bytes()));
        let container = self.shard(parent_id).join(format!("{hash}.c9s"));
        std::fs::create_dir_all(&container).unwrap();
        container
    }
}

/// Builds flat-layout (v6) vault trees.
pub struct V6Builder {
    pub root: PathBuf,
}

impl V6Builder {
    pub fn new(root: &Path) -> Self {
        write_master_key(root, "masterkey.cryptomator", 6);
        let builder = Self {
            root: root.to_path_buf(),
        };
        builder.create_shard("");
        builder
    }

    pub fn shard(&self, dir_id: &str) -> PathBuf {
        let (hi, rest) = names().dir_id_shard(dir_id).unwrap();
        self.root.join("d").join(hi).join(rest)
    }

    fn create_shard(&self, dir_id: &str) -> PathBuf {
        let shard = self.shard(dir_id);
        std::fs::create_dir_all(&shard).unwrap();
        shard
    }

    fn encrypted_name(&self, name: &str, parent_id: &str) -> String {
        BASE32.encode(&names().encrypt_name(name, parent_id).unwrap())
    }

    pub fn add_dir(&self, parent_id: &str, name: &str, dir_id: &str) {
        let marker = self
            .shard(parent_id)
            .join(format!("0{}", self.encrypted_name(name, parent_id)));
        std::fs::write(marker, dir_id).unwrap();
        self.create_shard(dir_id);
    }

    pub fn add_file(&self, parent_id: &str, name: &str, contents: &[u8]) -> PathBuf {
        let entry = self.shard(parent_id).join(self.encrypted_name(name, parent_id));
        std::fs::write(&entry, content::encrypt_bytes(&keys(), contents)).unwrap();
        entry
    }

    /// Store a file through the `m/` pointer tree regardless of the name's
    /// actual length.
    pub fn add_long_file(&self, parent_id: &str, name: &str, contents: &[u8]) -> PathBuf {
        let full = self.encrypted_name(name, parent_id);
        let pointer_name = format!("{}.lng", BASE32.encode(&Sha1::digest(full.as_bytes())));

        let pointer_dir = self
            .root
            .join("m")
            .join(&pointer_name[..2])
            .join(&pointer_name[2..4]);
        std::fs::create_dir_all(&pointer_dir).unwrap();
        std::fs::write(pointer_dir.join(&pointer_name), format!("{full}\n")).unwrap();

        let entry = self.shard(parent_id).join(&pointer_name);
        std::fs::write(&entry, content::encrypt_bytes(&keys(), contents)).unwrap();
        entry
    }
}
