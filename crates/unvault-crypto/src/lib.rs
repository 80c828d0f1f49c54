//! unvault-crypto: cryptography for reading encrypted vaults
//!
//! Key hierarchy of an opened vault:
//! ```text
//! password ──scrypt(salt, N, r, p=1)──► KEK (256-bit)
//!   ├── master key (256-bit, AES-KW unwrapped from the master-key file)
//!   └── mac key    (256-bit, AES-KW unwrapped from the master-key file)
//!        ├── siv key          = mac ‖ master   (filenames, AES-SIV)
//!        ├── token signing key = master ‖ mac  (vault-configuration HMAC)
//!        └── per-file content key (decrypted out of each file's own header)
//! ```
//!
//! Modules, leaf first:
//! - `codec`: base64 / base64url / base32 helpers
//! - `masterkey`: the on-disk master-key record
//! - `kdf`: KEK derivation and key unwrap into [`kdf::VaultKeys`]
//! - `vaultconfig`: signed vault-configuration token verification
//! - `names`: deterministic filename codec and directory-id addressing
//! - `content`: streaming authenticated decryption of file bodies

pub mod codec;
pub mod content;
pub mod kdf;
pub mod masterkey;
pub mod names;
pub mod vaultconfig;

pub use content::{decrypt_stream, plaintext_len, CancelToken, FileHeader};
pub use kdf::{unlock, VaultKeys};
pub use masterkey::MasterKeyRecord;
pub use names::NameCipher;
pub use vaultconfig::VaultConfigToken;

/// Size of the master and mac keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the AES-SIV key (mac key ‖ master key)
pub const SIV_KEY_SIZE: usize = 2 * KEY_SIZE;
