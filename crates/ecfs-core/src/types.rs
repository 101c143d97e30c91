use serde::{Deserialize, Serialize};

/// Type of a filesystem object, as far as encryption policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    /// Device nodes, FIFOs, sockets. Never encrypted.
    Other,
}

impl FileKind {
    /// Whether objects of this kind can carry an encryption policy.
    pub fn is_encryptable(self) -> bool {
        matches!(self, FileKind::Regular | FileKind::Directory | FileKind::Symlink)
    }
}

/// Directory-index hash pair of an entry, passed through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirHash {
    pub hash: u32,
    pub minor_hash: u32,
}

impl DirHash {
    pub fn new(hash: u32, minor_hash: u32) -> Self {
        Self { hash, minor_hash }
    }
}
