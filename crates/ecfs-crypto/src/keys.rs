//! Master keys and per-file key resolution.
//!
//! The encryption layer never sees master keys directly. It asks a
//! [`KeyProvider`] to turn (policy, nonce) into a keyed [`NameTransform`], or
//! to report that the master key is not present.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use ecfs_core::{EcfsError, EcfsResult};

use crate::policy::{mode, EncryptionPolicy};
use crate::transform::{Aes128CtsTransform, Aes256CtsTransform, NameTransform};
use crate::{KEY_SIZE, NONCE_SIZE};

/// A 256-bit master key. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Resolves the per-file transform for an object.
pub trait KeyProvider: Send + Sync {
    /// `Ok(None)` means the master key named by `policy` is not present;
    /// the object stays accessible only through no-key names.
    fn resolve(
        &self,
        policy: &EncryptionPolicy,
        nonce: &[u8; NONCE_SIZE],
    ) -> EcfsResult<Option<Arc<dyn NameTransform>>>;
}

/// In-memory keyring mapping key descriptors/identifiers to master keys.
#[derive(Debug, Default)]
pub struct Keyring {
    keys: RwLock<HashMap<Vec<u8>, MasterKey>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&self, spec: &[u8], key: MasterKey) {
        tracing::debug!(spec = %hex::encode(spec), "master key added");
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.to_vec(), key);
    }

    /// Returns whether a key was present. Objects that already resolved
    /// their key keep it until they are evicted.
    pub fn remove_key(&self, spec: &[u8]) -> bool {
        let removed = self
            .keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(spec)
            .is_some();
        if removed {
            tracing::debug!(spec = %hex::encode(spec), "master key removed");
        }
        removed
    }

    pub fn contains(&self, spec: &[u8]) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(spec)
    }
}

impl KeyProvider for Keyring {
    fn resolve(
        &self,
        policy: &EncryptionPolicy,
        nonce: &[u8; NONCE_SIZE],
    ) -> EcfsResult<Option<Arc<dyn NameTransform>>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let Some(master) = keys.get(policy.master_key_spec()) else {
            return Ok(None);
        };
        let mut file_key = derive_file_key(master, policy.filenames_mode(), nonce)?;
        let transform = filenames_transform(policy.filenames_mode(), &file_key);
        file_key.zeroize();
        transform.map(Some)
    }
}

/// Keyed filename transform for `filenames_mode`. The AES-128 mode keys on
/// the first half of the derived key.
pub fn filenames_transform(
    filenames_mode: u8,
    file_key: &[u8; KEY_SIZE],
) -> EcfsResult<Arc<dyn NameTransform>> {
    let transform: Arc<dyn NameTransform> = match filenames_mode {
        mode::AES_256_CTS => Arc::new(Aes256CtsTransform::new(file_key)?),
        mode::AES_128_CTS => Arc::new(Aes128CtsTransform::new(&file_key[..16])?),
        other => {
            tracing::warn!(mode = other, "no filename cipher for mode");
            return Err(EcfsError::Unsupported(format!(
                "filenames mode {} ({other}) has no cipher",
                mode::name(other)
            )));
        }
    };
    Ok(transform)
}

/// Derive the per-file filename key from the master key via HKDF-SHA256,
/// salted with the object's nonce and bound to the filenames mode.
pub fn derive_file_key(
    master: &MasterKey,
    filenames_mode: u8,
    nonce: &[u8; NONCE_SIZE],
) -> anyhow::Result<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(Some(nonce), master.as_bytes());
    let info = [b"ecfs-filenames".as_slice(), &[filenames_mode]].concat();
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(&info, &mut okm)
        .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
    Ok(okm)
}
