//! The filesystem object as seen by the encryption layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use ecfs_core::FileKind;

use crate::policy::EncryptionPolicy;
use crate::transform::NameTransform;
use crate::NONCE_SIZE;

/// Resolved per-file key material: the keyed transform plus the policy and
/// nonce it was derived for. Present only while the master key is available.
pub struct CryptInfo {
    policy: EncryptionPolicy,
    nonce: [u8; NONCE_SIZE],
    transform: Arc<dyn NameTransform>,
}

impl CryptInfo {
    pub fn new(
        policy: EncryptionPolicy,
        nonce: [u8; NONCE_SIZE],
        transform: Arc<dyn NameTransform>,
    ) -> Self {
        Self {
            policy,
            nonce,
            transform,
        }
    }

    pub fn policy(&self) -> &EncryptionPolicy {
        &self.policy
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn flags(&self) -> u8 {
        self.policy.flags()
    }

    pub fn transform(&self) -> &dyn NameTransform {
        self.transform.as_ref()
    }
}

impl std::fmt::Debug for CryptInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptInfo")
            .field("policy", &self.policy)
            .field("transform", &"[REDACTED]")
            .finish()
    }
}

/// A filesystem object. The filesystem driver owns it; this layer reads its
/// type and flags and caches resolved key material on it.
#[derive(Debug)]
pub struct Inode {
    ino: u64,
    kind: FileKind,
    owner_uid: u32,
    encrypted: AtomicBool,
    casefolded: bool,
    deleted: AtomicBool,
    /// Written at most once, then shared by every reader.
    crypt_info: OnceLock<Arc<CryptInfo>>,
    policy_lock: Mutex<()>,
}

impl Inode {
    pub fn new(ino: u64, kind: FileKind, owner_uid: u32) -> Self {
        Self {
            ino,
            kind,
            owner_uid,
            encrypted: AtomicBool::new(false),
            casefolded: false,
            deleted: AtomicBool::new(false),
            crypt_info: OnceLock::new(),
            policy_lock: Mutex::new(()),
        }
    }

    /// Mark the object as carrying an encryption context (when loading it from disk).
    pub fn encrypted(self) -> Self {
        self.encrypted.store(true, Ordering::Release);
        self
    }

    /// Use case-insensitive name comparison in this directory.
    pub fn casefolded(mut self) -> Self {
        self.casefolded = true;
        self
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn owner_uid(&self) -> u32 {
        self.owner_uid
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted.load(Ordering::Acquire)
    }

    pub(crate) fn set_encrypted(&self) {
        self.encrypted.store(true, Ordering::Release);
    }

    pub fn is_casefolded(&self) -> bool {
        self.casefolded
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub fn crypt_info(&self) -> Option<&Arc<CryptInfo>> {
        self.crypt_info.get()
    }

    pub fn has_encryption_key(&self) -> bool {
        self.crypt_info.get().is_some()
    }

    /// Install resolved key material unless another thread got there first.
    /// Returns whichever `CryptInfo` ended up attached.
    pub(crate) fn install_crypt_info(&self, info: Arc<CryptInfo>) -> &Arc<CryptInfo> {
        let mut won = false;
        let installed = self.crypt_info.get_or_init(|| {
            won = true;
            info
        });
        if !won {
            tracing::trace!(ino = self.ino, "lost crypt info install race, discarding ours");
        }
        installed
    }

    /// Serialise policy writes against policy reads on this object.
    pub fn lock_policy(&self) -> MutexGuard<'_, ()> {
        self.policy_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
