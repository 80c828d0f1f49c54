use serde::{Deserialize, Serialize};

/// A child folder of a virtual directory, as returned by folder listings.
///
/// `has_children` is a non-recursive probe of the folder's physical shard so
/// UIs can defer population of tree nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Decrypted display name.
    pub name: String,
    /// Full virtual path, `/`-separated, relative to the vault root.
    pub virtual_path: String,
    /// Whether the folder's physical directory holds any entry at all.
    pub has_children: bool,
}
