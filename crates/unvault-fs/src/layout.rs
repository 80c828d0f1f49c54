//! Per-generation on-disk layout capabilities
//!
//! The two vault generations store the same logical tree differently:
//!
//! ```text
//! flat (v6)                         subdirectory (v7/v8)
//! d/XX/YYY.../<base32>              d/XX/YYY.../<base64url>.c9r          file
//! d/XX/YYY.../0<base32>             d/XX/YYY.../<base64url>.c9r/dir.c9r  dir
//! d/XX/YYY.../<hash>.lng            d/XX/YYY.../<hash>.c9s/              long name
//!   name in m/<2>/<2>/<hash>.lng      name in <hash>.c9s/name.c9s
//!                                     file content in <hash>.c9s/contents.c9r
//! ```
//!
//! The resolver walks both through one algorithm; a [`DirLayout`] answers the
//! four questions that differ. Selected once per session at open.

use std::path::{Path, PathBuf};

use unvault_core::{VaultError, VaultResult};
use unvault_crypto::codec;

/// Marker byte prefixing directory entries in the flat layout.
const FLAT_DIR_MARKER: char = '0';
/// Long-name pointer suffix in the flat layout.
const FLAT_LONG_SUFFIX: &str = ".lng";
/// Long-name pointer tree of the flat layout.
const FLAT_LONG_DIR: &str = "m";

/// Entry suffix of the subdirectory layout.
const SUBDIR_ENTRY_SUFFIX: &str = ".c9r";
/// Long-name container suffix of the subdirectory layout.
const SUBDIR_LONG_SUFFIX: &str = ".c9s";
/// Directory-id pointer file inside a directory entry.
const SUBDIR_DIR_ID_FILE: &str = "dir.c9r";
/// Full-name file inside a long-name container.
const SUBDIR_LONG_NAME_FILE: &str = "name.c9s";
/// Content file inside a long-named file container.
const SUBDIR_LONG_CONTENTS_FILE: &str = "contents.c9r";

/// How one layout generation answers the resolver's structural questions.
pub trait DirLayout: Send + Sync {
    /// Does this physical entry represent a virtual directory?
    fn is_directory(&self, entry: &Path) -> bool;

    /// File holding the 36-char directory id of a directory entry.
    fn dir_id_file(&self, entry: &Path) -> PathBuf;

    /// Encoded name ciphertext of an entry, following long-name indirection.
    /// For directory entries the marker is already stripped.
    fn encoded_name(&self, vault_root: &Path, entry: &Path) -> VaultResult<String>;

    /// Decode an encoded ciphertext string into raw AES-SIV bytes.
    fn decode_name(&self, encoded: &str) -> VaultResult<Vec<u8>>;

    /// Physical file holding the encrypted content of a file entry.
    fn content_file(&self, entry: &Path) -> PathBuf;
}

fn file_name(entry: &Path) -> String {
    entry
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First line of a small pointer file, trailing newline removed.
pub(crate) fn read_first_line(path: &Path) -> VaultResult<String> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw.lines().next().unwrap_or_default().to_string())
}

/// Flat layout: entries are plain files, directories are marker files whose
/// single line is the directory id.
pub struct FlatLayout;

impl DirLayout for FlatLayout {
    fn is_directory(&self, entry: &Path) -> bool {
        file_name(entry).starts_with(FLAT_DIR_MARKER)
    }

    fn dir_id_file(&self, entry: &Path) -> PathBuf {
        // The marker file itself carries the id
        entry.to_path_buf()
    }

    fn encoded_name(&self, vault_root: &Path, entry: &Path) -> VaultResult<String> {
        let mut name = file_name(entry);
        if let Some(stripped) = name.strip_prefix(FLAT_DIR_MARKER) {
            name = stripped.to_string();
        }
        if name.ends_with(FLAT_LONG_SUFFIX) {
            if name.len() < 4 {
                return Err(VaultError::IntegrityCheckFailed("long name pointer"));
            }
            let pointer = vault_root
                .join(FLAT_LONG_DIR)
                .join(&name[..2])
                .join(&name[2..4])
                .join(&name);
            name = read_first_line(&pointer)?;
        }
        Ok(name)
    }

    fn decode_name(&self, encoded: &str) -> VaultResult<Vec<u8>> {
        codec::base32_decode(encoded)
            .map_err(|_| VaultError::IntegrityCheckFailed("base32 filename encoding"))
    }

    fn content_file(&self, entry: &Path) -> PathBuf {
        entry.to_path_buf()
    }
}

/// Subdirectory layout: entries are subdirectories (directories, or long-name
/// containers) and `.c9r` files.
pub struct SubdirLayout;

impl SubdirLayout {
    fn is_long_container(&self, entry: &Path) -> bool {
        file_name(entry).ends_with(SUBDIR_LONG_SUFFIX)
    }

    /// A `.c9s` container with an embedded contents file is a long-named
    /// file, not a directory.
    fn is_long_file_container(&self, entry: &Path) -> bool {
        self.is_long_container(entry) && entry.join(SUBDIR_LONG_CONTENTS_FILE).is_file()
    }
}

impl DirLayout for SubdirLayout {
    fn is_directory(&self, entry: &Path) -> bool {
        entry.is_dir() && !self.is_long_file_container(entry)
    }

    fn dir_id_file(&self, entry: &Path) -> PathBuf {
        entry.join(SUBDIR_DIR_ID_FILE)
    }

    fn encoded_name(&self, _vault_root: &Path, entry: &Path) -> VaultResult<String> {
        let name = file_name(entry);
        if name.ends_with(SUBDIR_LONG_SUFFIX) {
            return read_first_line(&entry.join(SUBDIR_LONG_NAME_FILE));
        }
        Ok(name)
    }

    fn decode_name(&self, encoded: &str) -> VaultResult<Vec<u8>> {
        let trimmed = encoded.strip_suffix(SUBDIR_ENTRY_SUFFIX).unwrap_or(encoded);
        codec::b64url_decode(trimmed)
            .map_err(|_| VaultError::IntegrityCheckFailed("base64 filename encoding"))
    }

    fn content_file(&self, entry: &Path) -> PathBuf {
        if self.is_long_container(entry) {
            entry.join(SUBDIR_LONG_CONTENTS_FILE)
        } else {
            entry.to_path_buf()
        }
    }
}
