//! Encryption policies (user-facing) and encryption contexts (persisted).
//!
//! Policy layouts as exchanged with callers:
//! ```text
//! v1: [1: version=0][1: contents mode][1: filenames mode][1: flags][8: key descriptor]
//! v2: [1: version=2][1: contents mode][1: filenames mode][1: flags][4: reserved][16: key identifier]
//! ```
//!
//! Context layouts as stored by the filesystem:
//! ```text
//! v1: [1: version=1][1: contents][1: filenames][1: flags][8: key descriptor][16: nonce]
//! v2: [1: version=2][1: contents][1: filenames][1: flags][4: reserved][16: key identifier][16: nonce]
//! ```

use rand::RngCore;

use ecfs_core::{EcfsError, EcfsResult};

use crate::NONCE_SIZE;

pub const POLICY_V1: u8 = 0;
pub const POLICY_V2: u8 = 2;
pub const CONTEXT_V1: u8 = 1;
pub const CONTEXT_V2: u8 = 2;

pub const KEY_DESCRIPTOR_SIZE: usize = 8;
pub const KEY_IDENTIFIER_SIZE: usize = 16;

pub const POLICY_V1_SIZE: usize = 4 + KEY_DESCRIPTOR_SIZE;
pub const POLICY_V2_SIZE: usize = 4 + 4 + KEY_IDENTIFIER_SIZE;
pub const CONTEXT_V1_SIZE: usize = POLICY_V1_SIZE + NONCE_SIZE;
pub const CONTEXT_V2_SIZE: usize = POLICY_V2_SIZE + NONCE_SIZE;

/// Largest context any version can produce; sizes read buffers.
pub const MAX_CONTEXT_SIZE: usize = CONTEXT_V2_SIZE;

pub const FLAGS_PAD_4: u8 = 0x00;
pub const FLAGS_PAD_8: u8 = 0x01;
pub const FLAGS_PAD_16: u8 = 0x02;
pub const FLAGS_PAD_32: u8 = 0x03;
pub const FLAGS_PAD_MASK: u8 = 0x03;
pub const FLAG_DIRECT_KEY: u8 = 0x04;

/// Encryption mode identifiers.
pub mod mode {
    pub const INVALID: u8 = 0;
    pub const AES_256_XTS: u8 = 1;
    pub const AES_256_CTS: u8 = 4;
    pub const AES_128_CBC: u8 = 5;
    pub const AES_128_CTS: u8 = 6;
    pub const ADIANTUM: u8 = 9;

    /// Parse a mode from its configuration name (`aes-256-xts` etc.).
    pub fn from_name(name: &str) -> Option<u8> {
        match name.to_ascii_lowercase().as_str() {
            "aes-256-xts" => Some(AES_256_XTS),
            "aes-256-cts" => Some(AES_256_CTS),
            "aes-128-cbc" => Some(AES_128_CBC),
            "aes-128-cts" => Some(AES_128_CTS),
            "adiantum" => Some(ADIANTUM),
            _ => None,
        }
    }

    pub fn name(mode: u8) -> &'static str {
        match mode {
            AES_256_XTS => "aes-256-xts",
            AES_256_CTS => "aes-256-cts",
            AES_128_CBC => "aes-128-cbc",
            AES_128_CTS => "aes-128-cts",
            ADIANTUM => "adiantum",
            _ => "unknown",
        }
    }

    /// Contents/filenames combinations that may be used together.
    pub fn valid_pair(contents: u8, filenames: u8) -> bool {
        matches!(
            (contents, filenames),
            (AES_256_XTS, AES_256_CTS) | (AES_128_CBC, AES_128_CTS) | (ADIANTUM, ADIANTUM)
        )
    }
}

/// Flags value selecting `padding` bytes of filename padding, if valid.
pub fn padding_flags(padding: u8) -> Option<u8> {
    match padding {
        4 => Some(FLAGS_PAD_4),
        8 => Some(FLAGS_PAD_8),
        16 => Some(FLAGS_PAD_16),
        32 => Some(FLAGS_PAD_32),
        _ => None,
    }
}

/// Filename padding multiple selected by `flags`.
pub fn padding_bytes(flags: u8) -> usize {
    4 << (flags & FLAGS_PAD_MASK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyV1 {
    pub contents_mode: u8,
    pub filenames_mode: u8,
    pub flags: u8,
    pub master_key_descriptor: [u8; KEY_DESCRIPTOR_SIZE],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyV2 {
    pub contents_mode: u8,
    pub filenames_mode: u8,
    pub flags: u8,
    pub reserved: [u8; 4],
    pub master_key_identifier: [u8; KEY_IDENTIFIER_SIZE],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionPolicy {
    V1(PolicyV1),
    V2(PolicyV2),
}

/// Layout size of a policy with the given version tag.
pub fn policy_size(version: u8) -> Option<usize> {
    match version {
        POLICY_V1 => Some(POLICY_V1_SIZE),
        POLICY_V2 => Some(POLICY_V2_SIZE),
        _ => None,
    }
}

impl EncryptionPolicy {
    pub fn version(&self) -> u8 {
        match self {
            EncryptionPolicy::V1(_) => POLICY_V1,
            EncryptionPolicy::V2(_) => POLICY_V2,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            EncryptionPolicy::V1(_) => POLICY_V1_SIZE,
            EncryptionPolicy::V2(_) => POLICY_V2_SIZE,
        }
    }

    pub fn contents_mode(&self) -> u8 {
        match self {
            EncryptionPolicy::V1(p) => p.contents_mode,
            EncryptionPolicy::V2(p) => p.contents_mode,
        }
    }

    pub fn filenames_mode(&self) -> u8 {
        match self {
            EncryptionPolicy::V1(p) => p.filenames_mode,
            EncryptionPolicy::V2(p) => p.filenames_mode,
        }
    }

    pub fn flags(&self) -> u8 {
        match self {
            EncryptionPolicy::V1(p) => p.flags,
            EncryptionPolicy::V2(p) => p.flags,
        }
    }

    /// Key descriptor (v1) or identifier (v2) naming the master key.
    pub fn master_key_spec(&self) -> &[u8] {
        match self {
            EncryptionPolicy::V1(p) => &p.master_key_descriptor,
            EncryptionPolicy::V2(p) => &p.master_key_identifier,
        }
    }

    pub fn padding(&self) -> usize {
        padding_bytes(self.flags())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.version());
        out.push(self.contents_mode());
        out.push(self.filenames_mode());
        out.push(self.flags());
        match self {
            EncryptionPolicy::V1(p) => out.extend_from_slice(&p.master_key_descriptor),
            EncryptionPolicy::V2(p) => {
                out.extend_from_slice(&p.reserved);
                out.extend_from_slice(&p.master_key_identifier);
            }
        }
        out
    }

    /// Parse a caller-supplied policy. Bytes beyond the version's layout are ignored.
    pub fn from_bytes(data: &[u8]) -> EcfsResult<Self> {
        let version = *data
            .first()
            .ok_or_else(|| EcfsError::InvalidInput("empty policy".into()))?;
        let size = policy_size(version).ok_or_else(|| {
            EcfsError::InvalidInput(format!("unknown policy version {version}"))
        })?;
        if data.len() < size {
            return Err(EcfsError::InvalidInput(format!(
                "policy v{version} needs {size} bytes, got {}",
                data.len()
            )));
        }
        let (contents_mode, filenames_mode, flags) = (data[1], data[2], data[3]);
        Ok(match version {
            POLICY_V1 => EncryptionPolicy::V1(PolicyV1 {
                contents_mode,
                filenames_mode,
                flags,
                master_key_descriptor: fixed(&data[4..POLICY_V1_SIZE]),
            }),
            _ => EncryptionPolicy::V2(PolicyV2 {
                contents_mode,
                filenames_mode,
                flags,
                reserved: fixed(&data[4..8]),
                master_key_identifier: fixed(&data[8..POLICY_V2_SIZE]),
            }),
        })
    }
}

/// Persisted per-object record of a policy plus the object's nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionContext {
    V1 {
        policy: PolicyV1,
        nonce: [u8; NONCE_SIZE],
    },
    V2 {
        policy: PolicyV2,
        nonce: [u8; NONCE_SIZE],
    },
}

impl EncryptionContext {
    /// Build a context for a new object, with a freshly generated nonce.
    pub fn new_from_policy(policy: &EncryptionPolicy) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self::with_nonce(policy, nonce)
    }

    pub fn with_nonce(policy: &EncryptionPolicy, nonce: [u8; NONCE_SIZE]) -> Self {
        match *policy {
            EncryptionPolicy::V1(policy) => EncryptionContext::V1 { policy, nonce },
            EncryptionPolicy::V2(policy) => EncryptionContext::V2 { policy, nonce },
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            EncryptionContext::V1 { .. } => CONTEXT_V1,
            EncryptionContext::V2 { .. } => CONTEXT_V2,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            EncryptionContext::V1 { .. } => CONTEXT_V1_SIZE,
            EncryptionContext::V2 { .. } => CONTEXT_V2_SIZE,
        }
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        match self {
            EncryptionContext::V1 { nonce, .. } | EncryptionContext::V2 { nonce, .. } => nonce,
        }
    }

    pub fn policy(&self) -> EncryptionPolicy {
        match *self {
            EncryptionContext::V1 { policy, .. } => EncryptionPolicy::V1(policy),
            EncryptionContext::V2 { policy, .. } => EncryptionPolicy::V2(policy),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.policy().to_bytes();
        out[0] = self.version();
        out.extend_from_slice(self.nonce());
        out
    }

    /// Decode a stored context. `ino` only labels the error.
    pub fn from_bytes(ino: u64, data: &[u8]) -> EcfsResult<Self> {
        let corrupt = |reason: String| EcfsError::CorruptPolicy { ino, reason };
        let version = *data
            .first()
            .ok_or_else(|| corrupt("empty encryption context".into()))?;
        let expected = match version {
            CONTEXT_V1 => CONTEXT_V1_SIZE,
            CONTEXT_V2 => CONTEXT_V2_SIZE,
            other => return Err(corrupt(format!("unknown context version {other}"))),
        };
        if data.len() != expected {
            return Err(corrupt(format!(
                "context v{version} is {expected} bytes, got {}",
                data.len()
            )));
        }

        let (contents_mode, filenames_mode, flags) = (data[1], data[2], data[3]);
        let nonce = fixed(&data[expected - NONCE_SIZE..]);
        Ok(match version {
            CONTEXT_V1 => EncryptionContext::V1 {
                policy: PolicyV1 {
                    contents_mode,
                    filenames_mode,
                    flags,
                    master_key_descriptor: fixed(&data[4..POLICY_V1_SIZE]),
                },
                nonce,
            },
            _ => EncryptionContext::V2 {
                policy: PolicyV2 {
                    contents_mode,
                    filenames_mode,
                    flags,
                    reserved: fixed(&data[4..8]),
                    master_key_identifier: fixed(&data[8..POLICY_V2_SIZE]),
                },
                nonce,
            },
        })
    }
}

/// Copy a slice whose length the caller has already checked into an array.
fn fixed<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(src);
    out
}
