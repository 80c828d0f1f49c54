//! unvault-fs: read-only sessions over encrypted vaults
//!
//! [`Vault::open`] unlocks a vault (scrypt KDF, key unwrap, optional signed
//! configuration) and selects the on-disk layout generation once; every
//! listing or decrypt call then re-walks the virtual hierarchy from the root
//! against the live filesystem. There is deliberately no caching of resolved
//! paths: lookups stay correct against a vault that changes between calls.
//!
//! Sessions are immutable after open and never write to the vault, so one
//! session can serve concurrent read-only callers without locking.

pub mod layout;
mod resolver;
pub mod session;

pub use session::Vault;
pub use unvault_core::{FolderEntry, VaultError, VaultResult};
pub use unvault_crypto::content::CancelToken;
