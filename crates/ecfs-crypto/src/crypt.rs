//! The filename-encryption service: storage, key and digest collaborators
//! bundled together, plus key resolution for an object.

use std::sync::Arc;

use ecfs_core::{EcfsError, EcfsResult};

use crate::digest::{shared_digest, NameDigest};
use crate::inode::{CryptInfo, Inode};
use crate::keys::KeyProvider;
use crate::manager::supported_policy;
use crate::policy::{EncryptionContext, MAX_CONTEXT_SIZE};
use crate::store::ContextStore;

pub struct NameCrypt {
    store: Arc<dyn ContextStore>,
    keys: Arc<dyn KeyProvider>,
    digest: &'static dyn NameDigest,
}

impl NameCrypt {
    /// Build the service over a filesystem's context store and a key source.
    /// No-key names use the process-wide SHA-256 handle.
    pub fn new(store: Arc<dyn ContextStore>, keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            store,
            keys,
            digest: shared_digest(),
        }
    }

    pub fn with_digest(mut self, digest: &'static dyn NameDigest) -> Self {
        self.digest = digest;
        self
    }

    pub fn store(&self) -> &dyn ContextStore {
        self.store.as_ref()
    }

    pub(crate) fn digest(&self) -> &dyn NameDigest {
        self.digest
    }

    pub fn max_namelen(&self) -> usize {
        self.store.max_namelen()
    }

    /// Read and decode the stored context of `inode`.
    pub(crate) fn read_context(&self, inode: &Inode) -> EcfsResult<EncryptionContext> {
        let mut buf = [0u8; MAX_CONTEXT_SIZE];
        let len = match self.store.get_context(inode, &mut buf) {
            Ok(len) => len,
            Err(EcfsError::BufferTooSmall { needed, .. }) => {
                return Err(EcfsError::CorruptPolicy {
                    ino: inode.ino(),
                    reason: format!("stored context is {needed} bytes"),
                })
            }
            Err(e) => return Err(e),
        };
        let data = buf.get(..len).ok_or_else(|| EcfsError::CorruptPolicy {
            ino: inode.ino(),
            reason: format!("store reported {len} bytes"),
        })?;
        EncryptionContext::from_bytes(inode.ino(), data)
    }

    /// Resolve and cache the per-file key of `inode`.
    ///
    /// Succeeds without installing anything when the master key is absent;
    /// callers check [`Inode::has_encryption_key`] afterwards.
    pub fn get_encryption_info(&self, inode: &Inode) -> EcfsResult<()> {
        if inode.has_encryption_key() {
            return Ok(());
        }
        if !inode.is_encrypted() {
            return Err(EcfsError::NotEncrypted { ino: inode.ino() });
        }

        let ctx = self.read_context(inode)?;
        let policy = ctx.policy();
        if !supported_policy(&policy, inode) {
            return Err(EcfsError::CorruptPolicy {
                ino: inode.ino(),
                reason: "stored policy is not supported".into(),
            });
        }

        let Some(transform) = self.keys.resolve(&policy, ctx.nonce())? else {
            tracing::debug!(ino = inode.ino(), "master key not present");
            return Ok(());
        };
        inode.install_crypt_info(Arc::new(CryptInfo::new(policy, *ctx.nonce(), transform)));
        tracing::debug!(ino = inode.ino(), "encryption key resolved");
        Ok(())
    }
}

impl std::fmt::Debug for NameCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameCrypt")
            .field("max_namelen", &self.store.max_namelen())
            .finish_non_exhaustive()
    }
}
