//! No-key names: the presentation of an encrypted entry when its key is absent.
//!
//! ```text
//! [4: hash LE][4: minor hash LE][149: leading ciphertext][32: sha256 of the rest]
//! ```
//!
//! Ciphertext names of up to 149 bytes are carried whole (the short form,
//! 9..=157 bytes). Longer ones keep their first 149 bytes and replace the
//! rest with its digest (the long form, always the full 189 bytes).

use ecfs_core::{DirHash, EcfsError, EcfsResult};

use crate::codec::{self, encoded_len};
use crate::digest::{NameDigest, DIGEST_SIZE};

pub const NOKEY_HASH_SIZE: usize = 8;
pub const NOKEY_BYTES: usize = 149;
pub const NOKEY_NAME_MAX: usize = NOKEY_HASH_SIZE + NOKEY_BYTES + DIGEST_SIZE;

/// Largest short-form record.
pub const NOKEY_SHORT_MAX: usize = NOKEY_HASH_SIZE + NOKEY_BYTES;

/// Longest presented form; anything longer cannot be a no-key name.
pub const NOKEY_ENCODED_MAX: usize = encoded_len(NOKEY_NAME_MAX);

const _: () = assert!(NOKEY_ENCODED_MAX <= 255);

#[derive(Clone, PartialEq, Eq)]
pub struct NoKeyName {
    dirhash: [u32; 2],
    bytes: [u8; NOKEY_BYTES],
    sha256: [u8; DIGEST_SIZE],
    /// Number of meaningful bytes in the serialized record.
    size: usize,
}

impl NoKeyName {
    /// Build the record for ciphertext `name`. The hash pair is recorded only
    /// when a non-zero major hash was supplied.
    pub fn build(
        name: &[u8],
        hash: Option<DirHash>,
        digest: &dyn NameDigest,
    ) -> EcfsResult<Self> {
        let dirhash = match hash {
            Some(h) if h.hash != 0 => [h.hash, h.minor_hash],
            _ => [0, 0],
        };

        let mut bytes = [0u8; NOKEY_BYTES];
        let mut sha256 = [0u8; DIGEST_SIZE];
        let size = if name.len() <= NOKEY_BYTES {
            bytes[..name.len()].copy_from_slice(name);
            NOKEY_HASH_SIZE + name.len()
        } else {
            bytes.copy_from_slice(&name[..NOKEY_BYTES]);
            sha256 = digest
                .digest(&name[NOKEY_BYTES..])
                .map_err(|e| EcfsError::CipherFailure {
                    op: "digest",
                    ino: 0,
                    reason: e.to_string(),
                })?;
            NOKEY_NAME_MAX
        };

        Ok(Self {
            dirhash,
            bytes,
            sha256,
            size,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        out.extend_from_slice(&self.dirhash[0].to_le_bytes());
        out.extend_from_slice(&self.dirhash[1].to_le_bytes());
        if self.is_digested() {
            out.extend_from_slice(&self.bytes);
            out.extend_from_slice(&self.sha256);
        } else {
            out.extend_from_slice(&self.bytes[..self.size - NOKEY_HASH_SIZE]);
        }
        out
    }

    pub fn encode(&self) -> String {
        codec::encode(&self.to_bytes())
    }

    /// Parse a presented no-key name. Every malformed input is `NameNotFound`:
    /// the caller asked for an entry that cannot exist.
    pub fn decode(presented: &[u8]) -> EcfsResult<Self> {
        if presented.len() > NOKEY_ENCODED_MAX {
            return Err(EcfsError::NameNotFound);
        }
        let raw = codec::decode(presented).map_err(|_| EcfsError::NameNotFound)?;
        Self::from_record(&raw)
    }

    fn from_record(raw: &[u8]) -> EcfsResult<Self> {
        let size = raw.len();
        let short = (NOKEY_HASH_SIZE + 1..=NOKEY_SHORT_MAX).contains(&size);
        if !short && size != NOKEY_NAME_MAX {
            return Err(EcfsError::NameNotFound);
        }

        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        let dirhash = [word(0), word(4)];

        let mut bytes = [0u8; NOKEY_BYTES];
        let mut sha256 = [0u8; DIGEST_SIZE];
        if short {
            bytes[..size - NOKEY_HASH_SIZE].copy_from_slice(&raw[NOKEY_HASH_SIZE..]);
        } else {
            bytes.copy_from_slice(&raw[NOKEY_HASH_SIZE..NOKEY_SHORT_MAX]);
            sha256.copy_from_slice(&raw[NOKEY_SHORT_MAX..]);
        }

        Ok(Self {
            dirhash,
            bytes,
            sha256,
            size,
        })
    }

    pub fn dirhash(&self) -> DirHash {
        DirHash::new(self.dirhash[0], self.dirhash[1])
    }

    /// The ciphertext bytes carried verbatim: the whole name for the short
    /// form, the first 149 bytes for the long form.
    pub fn leading_bytes(&self) -> &[u8] {
        if self.is_digested() {
            &self.bytes
        } else {
            &self.bytes[..self.size - NOKEY_HASH_SIZE]
        }
    }

    pub fn digest(&self) -> Option<&[u8; DIGEST_SIZE]> {
        self.is_digested().then_some(&self.sha256)
    }

    pub fn is_digested(&self) -> bool {
        self.size == NOKEY_NAME_MAX
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `disk_name` is the stored ciphertext this record stands for.
    pub fn matches(&self, disk_name: &[u8], digest: &dyn NameDigest) -> bool {
        if !self.is_digested() {
            return disk_name == self.leading_bytes();
        }
        if disk_name.len() <= NOKEY_BYTES || disk_name[..NOKEY_BYTES] != self.bytes {
            return false;
        }
        match digest.digest(&disk_name[NOKEY_BYTES..]) {
            Ok(d) => d == self.sha256,
            Err(e) => {
                tracing::warn!(error = %e, "digest failed while matching no-key name");
                false
            }
        }
    }
}

impl std::fmt::Debug for NoKeyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoKeyName")
            .field("dirhash", &self.dirhash)
            .field("size", &self.size)
            .field("digested", &self.is_digested())
            .finish()
    }
}
