//! Virtual-to-physical resolution over the content-addressed tree
//!
//! Resolution walks from the root toward the target one level at a time: at
//! each physical directory, classify entries via the session's layout,
//! decrypt candidate names under the current directory's id, and descend on
//! the first case-insensitive match (siblings never decrypt to the same
//! name). Directory nodes are recomputed on every call and never cached.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use unvault_core::{FolderEntry, VaultError, VaultResult};
use unvault_crypto::names::NameCipher;

use crate::layout::{read_first_line, DirLayout};

const DATA_DIR: &str = "d";
const SEPARATOR: char = '/';

/// One step of a traversal: a virtual directory bound to its physical shard.
#[derive(Debug, Clone)]
struct DirNode {
    virtual_path: String,
    physical_path: PathBuf,
    /// Id of this directory: associated data for its children's names and
    /// seed of its own shard location. Empty for the root.
    dir_id: String,
}

pub(crate) struct Resolver {
    vault_root: PathBuf,
    names: NameCipher,
    layout: Box<dyn DirLayout>,
    root_physical: PathBuf,
}

impl Resolver {
    pub fn new(
        vault_root: PathBuf,
        names: NameCipher,
        layout: Box<dyn DirLayout>,
    ) -> VaultResult<Self> {
        let (hi, rest) = names.dir_id_shard("")?;
        let root_physical = vault_root.join(DATA_DIR).join(hi).join(rest);
        debug!(root = %root_physical.display(), "computed physical root shard");
        Ok(Self {
            vault_root,
            names,
            layout,
            root_physical,
        })
    }

    fn root_node(&self) -> DirNode {
        DirNode {
            virtual_path: String::new(),
            physical_path: self.root_physical.clone(),
            dir_id: String::new(),
        }
    }

    fn shard_path(&self, dir_id: &str) -> VaultResult<PathBuf> {
        let (hi, rest) = self.names.dir_id_shard(dir_id)?;
        Ok(self.vault_root.join(DATA_DIR).join(hi).join(rest))
    }

    /// Split a virtual path into segments. A doubled separator is invalid;
    /// one leading separator is tolerated; the empty path is the root.
    fn segments(virtual_path: &str) -> VaultResult<Vec<&str>> {
        if virtual_path.contains("//") {
            return Err(VaultError::InvalidPath(virtual_path.to_string()));
        }
        let trimmed = virtual_path.strip_prefix(SEPARATOR).unwrap_or(virtual_path);
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(trimmed.split(SEPARATOR).collect())
    }

    fn decrypt_entry_name(&self, parent: &DirNode, entry: &Path) -> VaultResult<String> {
        let encoded = self.layout.encoded_name(&self.vault_root, entry)?;
        let raw = self.layout.decode_name(&encoded)?;
        self.names.decrypt_name(&raw, &parent.dir_id)
    }

    /// Build the child node for a directory entry: decrypt its name, read
    /// its id from the pointer file, derive its own shard.
    fn child_dir(&self, parent: &DirNode, entry: &Path) -> VaultResult<DirNode> {
        let name = self.decrypt_entry_name(parent, entry)?;
        let dir_id = read_first_line(&self.layout.dir_id_file(entry))?;
        let physical_path = self.shard_path(&dir_id)?;
        Ok(DirNode {
            virtual_path: join_virtual(&parent.virtual_path, &name),
            physical_path,
            dir_id,
        })
    }

    /// Walk from the root to the directory named by `segments`.
    fn walk(&self, segments: &[&str]) -> VaultResult<DirNode> {
        let mut node = self.root_node();
        for segment in segments {
            node = self.descend(node, segment)?;
        }
        Ok(node)
    }

    fn descend(&self, node: DirNode, segment: &str) -> VaultResult<DirNode> {
        let wanted = segment.to_lowercase();
        for entry in fs::read_dir(&node.physical_path)? {
            let path = entry?.path();
            if !self.layout.is_directory(&path) {
                continue;
            }
            let child = self.child_dir(&node, &path)?;
            if child.virtual_name_matches(&wanted) {
                debug!(virtual_path = %child.virtual_path, "descending");
                return Ok(child);
            }
        }
        Err(VaultError::PathNotFound(join_virtual(
            &node.virtual_path,
            segment,
        )))
    }

    pub fn list_files(&self, virtual_dir: &str) -> VaultResult<Vec<String>> {
        let segments = Self::segments(virtual_dir)?;
        let dir = self.walk(&segments)?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir.physical_path)? {
            let path = entry?.path();
            if self.layout.is_directory(&path) {
                continue;
            }
            let name = self.decrypt_entry_name(&dir, &path)?;
            files.push(join_virtual(&dir.virtual_path, &name));
        }
        Ok(files)
    }

    pub fn list_folders(&self, virtual_dir: &str) -> VaultResult<Vec<FolderEntry>> {
        let segments = Self::segments(virtual_dir)?;
        let dir = self.walk(&segments)?;

        let mut folders = Vec::new();
        for entry in fs::read_dir(&dir.physical_path)? {
            let path = entry?.path();
            if !self.layout.is_directory(&path) {
                continue;
            }
            let child = self.child_dir(&dir, &path)?;
            let has_children = self.has_children(&child.physical_path);
            folders.push(FolderEntry {
                name: basename(&child.virtual_path).to_string(),
                virtual_path: child.virtual_path,
                has_children,
            });
        }
        Ok(folders)
    }

    /// Physical content file backing a virtual file path.
    pub fn find_file(&self, virtual_path: &str) -> VaultResult<PathBuf> {
        let segments = Self::segments(virtual_path)?;
        let Some((target, parents)) = segments.split_last() else {
            return Err(VaultError::InvalidPath(virtual_path.to_string()));
        };
        let dir = self.walk(parents)?;

        let wanted = target.to_lowercase();
        for entry in fs::read_dir(&dir.physical_path)? {
            let path = entry?.path();
            if self.layout.is_directory(&path) {
                continue;
            }
            let name = self.decrypt_entry_name(&dir, &path)?;
            if name.to_lowercase() == wanted {
                return Ok(self.layout.content_file(&path));
            }
        }
        Err(VaultError::PathNotFound(virtual_path.to_string()))
    }

    /// Non-recursive probe: does the folder's physical shard hold anything?
    fn has_children(&self, physical: &Path) -> bool {
        match fs::read_dir(physical) {
            Ok(mut entries) => entries.next().is_some(),
            Err(e) => {
                debug!(path = %physical.display(), error = %e, "child probe failed");
                false
            }
        }
    }
}

impl DirNode {
    fn virtual_name_matches(&self, wanted_lower: &str) -> bool {
        basename(&self.virtual_path).to_lowercase() == wanted_lower
    }
}

fn basename(virtual_path: &str) -> &str {
    virtual_path
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or(virtual_path)
}

fn join_virtual(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}
