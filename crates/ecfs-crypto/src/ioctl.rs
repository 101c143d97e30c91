//! Control surface: set and query the policy of an open object.

use std::sync::Arc;

use ecfs_core::{EcfsError, EcfsResult};

use crate::crypt::NameCrypt;
use crate::inode::Inode;
use crate::manager::policies_equal;
use crate::policy::{EncryptionPolicy, POLICY_V1};

/// Identity of the caller issuing a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    /// May act on objects owned by others.
    pub cap_fowner: bool,
}

impl Credentials {
    pub fn user(uid: u32) -> Self {
        Self {
            uid,
            cap_fowner: false,
        }
    }

    pub fn root() -> Self {
        Self {
            uid: 0,
            cap_fowner: true,
        }
    }

    fn owns(&self, inode: &Inode) -> bool {
        self.cap_fowner || self.uid == inode.owner_uid()
    }
}

/// An object opened by the caller, and whether its mount accepts writes.
#[derive(Debug, Clone)]
pub struct OpenFile {
    inode: Arc<Inode>,
    writable_mount: bool,
}

impl OpenFile {
    pub fn new(inode: Arc<Inode>, writable_mount: bool) -> Self {
        Self {
            inode,
            writable_mount,
        }
    }

    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    pub fn is_writable(&self) -> bool {
        self.writable_mount
    }
}

impl NameCrypt {
    /// Apply the policy in `arg` to the directory behind `file`, or confirm
    /// that it already has exactly that policy.
    pub fn ioctl_set_policy(&self, file: &OpenFile, cred: &Credentials, arg: &[u8]) -> EcfsResult<()> {
        let policy = EncryptionPolicy::from_bytes(arg)?;
        let inode = file.inode();

        if !cred.owns(inode) {
            return Err(EcfsError::PermissionDenied(format!(
                "uid {} does not own inode {}",
                cred.uid,
                inode.ino()
            )));
        }
        if !file.is_writable() {
            return Err(EcfsError::PermissionDenied("read-only mount".into()));
        }

        let _guard = inode.lock_policy();
        match self.get_policy(inode) {
            Err(EcfsError::NotEncrypted { .. }) => {
                if !inode.is_dir() {
                    return Err(EcfsError::NotADirectory { ino: inode.ino() });
                }
                if inode.is_deleted() {
                    return Err(EcfsError::ObjectDeleted { ino: inode.ino() });
                }
                if !self.store().empty_dir(inode) {
                    return Err(EcfsError::DirectoryNotEmpty { ino: inode.ino() });
                }
                self.set_encryption_policy(inode, &policy)
            }
            Err(EcfsError::CorruptPolicy { ino, reason }) => {
                tracing::warn!(ino, %reason, "refusing to replace unreadable policy");
                Err(EcfsError::AlreadyEncrypted { ino })
            }
            Err(e) => Err(e),
            Ok(existing) if policies_equal(&existing, &policy) => Ok(()),
            Ok(_) => Err(EcfsError::PolicyMismatch { ino: inode.ino() }),
        }
    }

    /// The v1 policy of `file` in its 12-byte layout.
    pub fn ioctl_get_policy(&self, file: &OpenFile) -> EcfsResult<Vec<u8>> {
        let policy = self.get_policy(file.inode())?;
        if policy.version() != POLICY_V1 {
            return Err(EcfsError::InvalidInput(format!(
                "policy v{} needs the extended query",
                policy.version()
            )));
        }
        Ok(policy.to_bytes())
    }

    /// `[8: policy size LE][policy]` for any version, provided the policy
    /// fits in `capacity` bytes.
    pub fn ioctl_get_policy_ex(&self, file: &OpenFile, capacity: usize) -> EcfsResult<Vec<u8>> {
        let policy = self.get_policy(file.inode())?;
        let size = policy.size();
        if size > capacity {
            return Err(EcfsError::Overflow {
                needed: size,
                capacity,
            });
        }

        let mut out = Vec::with_capacity(8 + size);
        out.extend_from_slice(&(size as u64).to_le_bytes());
        out.extend_from_slice(&policy.to_bytes());
        Ok(out)
    }
}
