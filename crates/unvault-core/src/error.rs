use std::path::PathBuf;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Every way opening or reading a vault can fail. Callers branch on the
/// variant, never on the message text.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("master key file not found: {0}")]
    MasterKeyMissing(PathBuf),

    #[error("master key file is malformed: {0}")]
    MasterKeyMalformed(String),

    #[error("vault version {0} is unsupported")]
    UnsupportedVaultVersion(u32),

    #[error("cannot unwrap vault keys: wrong password or corrupt master key file")]
    WrongPasswordOrCorruptKey,

    #[error("vault configuration is invalid: {0}")]
    VaultConfigInvalid(String),

    #[error("vault configuration signature does not match")]
    VaultConfigSignatureInvalid,

    #[error("vault configuration signature algorithm {0:?} is unsupported")]
    VaultConfigUnsupportedAlgorithm(String),

    #[error("vault format {0} is unsupported")]
    UnsupportedVaultFormat(u32),

    #[error("invalid virtual path: {0:?}")]
    InvalidPath(String),

    #[error("no such entry in vault: {0:?}")]
    PathNotFound(String),

    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
