//! Policy lifecycle: validate, persist, read back, compare, inherit.

use std::any::Any;

use ecfs_core::{EcfsError, EcfsResult};

use crate::crypt::NameCrypt;
use crate::inode::Inode;
use crate::policy::{mode, EncryptionContext, EncryptionPolicy, FLAGS_PAD_MASK, FLAG_DIRECT_KEY};

/// Whether `policy` may be applied to (or read from) `inode`.
pub fn supported_policy(policy: &EncryptionPolicy, inode: &Inode) -> bool {
    let EncryptionPolicy::V1(p) = policy else {
        tracing::warn!(
            ino = inode.ino(),
            version = policy.version(),
            "unsupported encryption policy version"
        );
        return false;
    };

    if !mode::valid_pair(p.contents_mode, p.filenames_mode) {
        tracing::warn!(
            ino = inode.ino(),
            contents = mode::name(p.contents_mode),
            filenames = mode::name(p.filenames_mode),
            "unsupported encryption modes"
        );
        return false;
    }
    if p.flags & !(FLAGS_PAD_MASK | FLAG_DIRECT_KEY) != 0 {
        tracing::warn!(ino = inode.ino(), flags = p.flags, "unsupported encryption flags");
        return false;
    }
    if p.flags & FLAG_DIRECT_KEY != 0 {
        tracing::warn!(ino = inode.ino(), "direct-key policies are not supported");
        return false;
    }
    if inode.is_casefolded() {
        tracing::warn!(ino = inode.ino(), "encryption is incompatible with case folding");
        return false;
    }
    true
}

pub fn policies_equal(a: &EncryptionPolicy, b: &EncryptionPolicy) -> bool {
    a.version() == b.version() && a.to_bytes() == b.to_bytes()
}

impl NameCrypt {
    /// Persist a fresh context for `policy` on `inode`. The caller holds the
    /// inode's policy lock and has checked that no policy exists yet.
    pub fn set_encryption_policy(&self, inode: &Inode, policy: &EncryptionPolicy) -> EcfsResult<()> {
        if !supported_policy(policy, inode) {
            return Err(EcfsError::Unsupported(format!(
                "encryption policy v{} on inode {}",
                policy.version(),
                inode.ino()
            )));
        }

        let ctx = EncryptionContext::new_from_policy(policy);
        self.store().set_context(inode, &ctx.to_bytes(), None)?;
        inode.set_encrypted();
        tracing::info!(
            ino = inode.ino(),
            filenames = mode::name(policy.filenames_mode()),
            padding = policy.padding(),
            "encryption policy set"
        );
        Ok(())
    }

    pub fn get_policy(&self, inode: &Inode) -> EcfsResult<EncryptionPolicy> {
        if let Some(ci) = inode.crypt_info() {
            return Ok(*ci.policy());
        }
        if !inode.is_encrypted() {
            return Err(EcfsError::NotEncrypted { ino: inode.ino() });
        }
        Ok(self.read_context(inode)?.policy())
    }

    /// Whether `child` may live in `parent`: everything under an encrypted
    /// directory must be encrypted with the same policy. Fails closed.
    pub fn has_permitted_context(&self, parent: &Inode, child: &Inode) -> bool {
        if !child.kind().is_encryptable() || !parent.is_encrypted() {
            return true;
        }
        if !child.is_encrypted() {
            return false;
        }

        let policies = self
            .get_encryption_info(parent)
            .and_then(|()| self.get_encryption_info(child))
            .and_then(|()| Ok((self.get_policy(parent)?, self.get_policy(child)?)));

        match policies {
            Ok((p, c)) => {
                let same = policies_equal(&p, &c);
                if !same {
                    tracing::warn!(
                        parent = parent.ino(),
                        child = child.ino(),
                        "policy of child differs from its parent"
                    );
                }
                same
            }
            Err(e) => {
                tracing::warn!(
                    parent = parent.ino(),
                    child = child.ino(),
                    error = %e,
                    "cannot compare encryption policies"
                );
                false
            }
        }
    }

    /// Give a newly created `child` of `parent` the parent's policy with a
    /// fresh nonce. `aux` is handed to the store unchanged.
    pub fn inherit_context(
        &self,
        parent: &Inode,
        child: &Inode,
        aux: Option<&dyn Any>,
        preload: bool,
    ) -> EcfsResult<()> {
        self.get_encryption_info(parent)?;
        let ci = parent
            .crypt_info()
            .ok_or(EcfsError::KeyUnavailable { ino: parent.ino() })?;

        let ctx = EncryptionContext::new_from_policy(ci.policy());
        self.store().set_context(child, &ctx.to_bytes(), aux)?;
        child.set_encrypted();
        tracing::debug!(parent = parent.ino(), child = child.ino(), "context inherited");

        if preload {
            self.get_encryption_info(child)?;
        }
        Ok(())
    }
}
